use crate::messages::MessageSerializationError;
use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while
/// serializing RTMP messages into chunks.
#[derive(Debug, Error)]
pub enum ChunkSerializationError {
    /// The message being serialized is larger than the 24 bit length field
    /// can describe.
    #[error("The message has a length of {size} bytes, over the allowed maximum of 16777215 bytes")]
    MessageTooLong { size: usize },

    /// The chunk stream id has no wire representation (only 2 through
    /// 65599 can be encoded in a basic header).
    #[error("Chunk stream id {chunk_stream_id} is outside the encodable range of 2 through 65599")]
    InvalidChunkStreamId { chunk_stream_id: u32 },

    /// The maximum chunk size must be a non-zero 31 bit number.
    #[error("Requested an invalid max chunk size of {chunk_size} (must be between 1 and 2147483647)")]
    InvalidMaxChunkSize { chunk_size: u32 },

    #[error("Failed to create a SetChunkSize message: {0}")]
    SetChunkSizeMessageCreationFailure(#[from] MessageSerializationError),

    #[error("{0}")]
    Io(#[from] io::Error),
}
