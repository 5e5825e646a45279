use std::io;
use thiserror::Error;

/// An enumeration defining all the possible errors that could occur while
/// deserializing RTMP chunks.
#[derive(Debug, Error)]
pub enum ChunkDeserializationError {
    /// A chunk arrived with a compressed header (type 1, 2, or 3) on a
    /// chunk stream that has never carried a type 0 chunk, so there is no
    /// previous header to borrow the missing fields from.
    #[error("Received a compressed chunk header on csid {csid} with no previous chunk to fill in the missing fields")]
    NoPreviousChunkOnStream { csid: u32 },

    /// The peer declared a message larger than we are willing to buffer.
    #[error("Message on csid {csid} declares a length of {declared_length} bytes, over the {max_size} byte limit")]
    MessageTooLarge {
        csid: u32,
        declared_length: u32,
        max_size: usize,
    },

    /// A new header declared a different message length while a message on
    /// the same chunk stream was still being reassembled.  There is no way
    /// to resynchronize after this.
    #[error("Header on csid {csid} declares {new_length} bytes while a {in_progress_length} byte message is still incomplete")]
    MessageLengthChangedMidStream {
        csid: u32,
        in_progress_length: u32,
        new_length: u32,
    },

    /// The maximum chunk size must be a non-zero 31 bit number.
    #[error("Requested an invalid max chunk size of {chunk_size} (must be between 1 and 2147483647)")]
    InvalidMaxChunkSize { chunk_size: usize },

    #[error("{0}")]
    Io(#[from] io::Error),
}
