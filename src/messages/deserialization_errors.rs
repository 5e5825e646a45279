use std::io;
use thiserror::Error;

/// An enumeration for all errors that can occur when turning a raw
/// message payload into a typed message.
#[derive(Debug, Error)]
pub enum MessageDeserializationError {
    /// The payload's bytes do not match the layout its type id requires
    #[error("The message's data could not be parsed into the expected format")]
    InvalidMessageFormat,

    #[error("{0}")]
    Io(#[from] io::Error),
}
