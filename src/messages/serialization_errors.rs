use std::io;
use thiserror::Error;

/// An enumeration for all errors that can occur when turning a typed
/// message into a raw message payload.
#[derive(Debug, Error)]
pub enum MessageSerializationError {
    /// Chunk sizes can only be 31 bit values
    #[error("Invalid chunk size specified")]
    InvalidChunkSize,

    #[error("{0}")]
    Io(#[from] io::Error),
}
