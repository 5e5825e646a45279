use crate::chunk_io::{ChunkDeserializationError, ChunkSerializationError};
use crate::handshake::HandshakeError;
use crate::messages::{MessageDeserializationError, MessageSerializationError};
use std::io;
use thiserror::Error;

/// An enumeration for all errors that can bring a connection down.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("Handshake did not complete in time")]
    HandshakeTimeout,

    #[error("Failed to deserialize inbound chunk data: {0}")]
    ChunkDeserialization(#[from] ChunkDeserializationError),

    #[error("Failed to serialize outbound message: {0}")]
    ChunkSerialization(#[from] ChunkSerializationError),

    #[error("Failed to serialize a message payload: {0}")]
    MessageSerialization(#[from] MessageSerializationError),

    /// A protocol control message had a recognized type id but malformed
    /// contents.  Unlike unparseable session messages this is fatal, since
    /// the transport cannot know what the peer meant to change.
    #[error("Received a malformed protocol control message: {0}")]
    MalformedControlMessage(MessageDeserializationError),

    /// The connection was closed, either by the peer or by cancellation.
    #[error("The connection has closed")]
    Disconnected,

    #[error("{0}")]
    Io(#[from] io::Error),
}
