use crate::chunk_io::ChunkSerializationError;
use crate::time::RtmpTimestamp;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

/// Chunk stream ids 0 and 1 are reserved to mark the 2 and 3 byte basic
/// header encodings, so 2 is the smallest id that can appear on the wire.
pub const MIN_CHUNK_STREAM_ID: u32 = 2;

/// The 3 byte basic header encodes `csid - 64` in 16 bits, putting the
/// ceiling at 65535 + 64.
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

/// An enumeration of the four levels of header compression a chunk can be
/// sent with.  Every format other than `Full` borrows fields from the
/// previous chunk sent on the same chunk stream.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum ChunkHeaderFormat {
    /// Type 0: all 11 header bytes present, timestamp is absolute
    Full,

    /// Type 1: timestamp delta, message length, and type id present (7
    /// bytes); message stream id inherited
    TimeDeltaWithoutMessageStreamId,

    /// Type 2: timestamp delta only (3 bytes); everything else inherited
    TimeDeltaOnly,

    /// Type 3: no message header; every field inherited verbatim
    Empty,
}

/// Represents the decompressed header of an RTMP chunk
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChunkHeader {
    pub chunk_stream_id: u32,
    /// The absolute timestamp of the message this chunk belongs to
    pub timestamp: RtmpTimestamp,
    /// The raw value of the 24 bit timestamp field (a delta for type 1 and
    /// type 2 headers).  `0xFFFFFF` here means the real timestamp was
    /// carried in the 4 byte extended field.
    pub timestamp_field: u32,
    pub message_length: u32,
    pub message_type_id: u8,
    pub message_stream_id: u32,
}

impl ChunkHeader {
    pub fn new() -> ChunkHeader {
        ChunkHeader {
            chunk_stream_id: 0,
            timestamp: RtmpTimestamp::new(0),
            timestamp_field: 0,
            message_length: 0,
            message_type_id: 0,
            message_stream_id: 0,
        }
    }
}

impl Default for ChunkHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// The outcome of decoding a basic header from a possibly incomplete
/// buffer.  Running out of bytes is a normal outcome, not an error.
#[derive(Eq, PartialEq, Debug)]
pub(crate) enum BasicHeaderDecodeResult {
    NotEnoughBytes,
    Decoded {
        format: ChunkHeaderFormat,
        chunk_stream_id: u32,
        bytes_consumed: usize,
    },
}

const FORMAT_MASK: u8 = 0b1100_0000;
const CSID_MASK: u8 = 0b0011_1111;

/// Decodes the 1, 2, or 3 byte basic header at the start of the buffer.
/// The low 6 bits of the first byte either carry the chunk stream id
/// directly (2 through 63), or the marker 0 (one extra byte, ids 64
/// through 319) or 1 (two extra little endian bytes, ids 320 through
/// 65599).
pub(crate) fn decode_basic_header(buffer: &[u8]) -> BasicHeaderDecodeResult {
    let first_byte = match buffer.first() {
        Some(byte) => *byte,
        None => return BasicHeaderDecodeResult::NotEnoughBytes,
    };

    let format = match first_byte & FORMAT_MASK {
        0b0000_0000 => ChunkHeaderFormat::Full,
        0b0100_0000 => ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId,
        0b1000_0000 => ChunkHeaderFormat::TimeDeltaOnly,
        _ => ChunkHeaderFormat::Empty,
    };

    match first_byte & CSID_MASK {
        0 => {
            if buffer.len() < 2 {
                return BasicHeaderDecodeResult::NotEnoughBytes;
            }

            BasicHeaderDecodeResult::Decoded {
                format,
                chunk_stream_id: u32::from(buffer[1]) + 64,
                bytes_consumed: 2,
            }
        }

        1 => {
            if buffer.len() < 3 {
                return BasicHeaderDecodeResult::NotEnoughBytes;
            }

            let id = u32::from(buffer[1]) + u32::from(buffer[2]) * 256;
            BasicHeaderDecodeResult::Decoded {
                format,
                chunk_stream_id: id + 64,
                bytes_consumed: 3,
            }
        }

        id => BasicHeaderDecodeResult::Decoded {
            format,
            chunk_stream_id: u32::from(id),
            bytes_consumed: 1,
        },
    }
}

/// Encodes a basic header in its smallest form for the given chunk stream
/// id.  Ids outside 2..=65599 have no wire representation.
pub(crate) fn encode_basic_header(
    format: ChunkHeaderFormat,
    chunk_stream_id: u32,
    bytes: &mut dyn Write,
) -> Result<(), ChunkSerializationError> {
    let format_bits = match format {
        ChunkHeaderFormat::Full => 0b0000_0000,
        ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => 0b0100_0000,
        ChunkHeaderFormat::TimeDeltaOnly => 0b1000_0000,
        ChunkHeaderFormat::Empty => 0b1100_0000,
    };

    match chunk_stream_id {
        2..=63 => bytes.write_u8(format_bits | chunk_stream_id as u8)?,

        64..=319 => {
            bytes.write_u8(format_bits)?;
            bytes.write_u8((chunk_stream_id - 64) as u8)?;
        }

        320..=65599 => {
            bytes.write_u8(format_bits | 1)?;
            bytes.write_u16::<LittleEndian>((chunk_stream_id - 64) as u16)?;
        }

        _ => {
            return Err(ChunkSerializationError::InvalidChunkStreamId { chunk_stream_id });
        }
    }

    Ok(())
}
