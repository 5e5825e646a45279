use super::chunk_header::{encode_basic_header, ChunkHeader, ChunkHeaderFormat};
use super::ChunkSerializationError;
use crate::messages::{MessagePayload, RtmpMessage, CONTROL_CHUNK_STREAM_ID};
use crate::time::RtmpTimestamp;
use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use std::cmp::min;
use std::collections::HashMap;
use std::io::{Cursor, Write};

/// Every connection starts with this chunk size until we announce a new
/// one via SetChunkSize.
const INITIAL_MAX_CHUNK_SIZE: u32 = 128;

/// The maximum chunk size is a 31 bit value.
const MAX_ALLOWED_CHUNK_SIZE: u32 = 2_147_483_647;

/// Timestamps at or past this value do not fit the 24 bit field and move
/// to the 4 byte extended field.
const EXTENDED_TIMESTAMP_MARKER: u32 = 0xFF_FFFF;

/// The message length field is 24 bits wide.
const MAX_MESSAGE_LENGTH: usize = 16_777_215;

/// A fully serialized group of chunks, ready to go over the wire.  One
/// packet holds every chunk of a single message, in order, so writing the
/// packet's bytes in one go preserves the protocol's interleaving rules.
#[derive(Eq, PartialEq, Debug)]
pub struct Packet {
    pub bytes: Vec<u8>,
}

/// Turns complete messages into wire chunks.
///
/// The serializer slices each message's payload at the current outbound
/// chunk size, picks the most compressed header format the previous chunk
/// on the same chunk stream allows, and remembers what it sent so the next
/// message can compress against it.  It is per-connection state: chunks it
/// produces only make sense to the peer that has seen all of them, in
/// order.
pub struct ChunkSerializer {
    max_chunk_size: u32,
    previous_headers: HashMap<u32, ChunkHeader>,
}

impl ChunkSerializer {
    pub fn new() -> ChunkSerializer {
        ChunkSerializer {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
            previous_headers: HashMap::new(),
        }
    }

    /// Changes the maximum size of the chunks this serializer produces.
    /// The returned packet carries the SetChunkSize announcement and must
    /// be sent to the peer before any chunk produced at the new size.
    pub fn set_max_chunk_size(
        &mut self,
        new_size: u32,
        time: RtmpTimestamp,
    ) -> Result<Packet, ChunkSerializationError> {
        if new_size == 0 || new_size > MAX_ALLOWED_CHUNK_SIZE {
            return Err(ChunkSerializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        // The announcement itself must go out at the old chunk size
        let message = RtmpMessage::SetChunkSize { size: new_size };
        let payload = message.into_message_payload(time, 0)?;
        let packet = self.serialize(CONTROL_CHUNK_STREAM_ID, &payload, false)?;

        self.max_chunk_size = new_size;
        Ok(packet)
    }

    pub fn max_chunk_size(&self) -> u32 {
        self.max_chunk_size
    }

    /// Serializes a message into one or more chunks on the given chunk
    /// stream.  `force_uncompressed` forces a full type 0 header even when
    /// compression is possible, which some peers need right after the
    /// handshake.
    pub fn serialize(
        &mut self,
        chunk_stream_id: u32,
        message: &MessagePayload,
        force_uncompressed: bool,
    ) -> Result<Packet, ChunkSerializationError> {
        if message.data.len() > MAX_MESSAGE_LENGTH {
            return Err(ChunkSerializationError::MessageTooLong {
                size: message.data.len(),
            });
        }

        let mut bytes = Cursor::new(Vec::new());

        // A zero length message is still one (body-less) chunk
        let mut start = 0;
        let mut is_first_chunk = true;
        loop {
            let end = min(start + self.max_chunk_size as usize, message.data.len());
            self.add_chunk(
                &mut bytes,
                chunk_stream_id,
                message,
                force_uncompressed,
                !is_first_chunk,
                &message.data[start..end],
            )?;

            start = end;
            is_first_chunk = false;
            if start >= message.data.len() {
                break;
            }
        }

        Ok(Packet {
            bytes: bytes.into_inner(),
        })
    }

    fn add_chunk(
        &mut self,
        bytes: &mut Cursor<Vec<u8>>,
        chunk_stream_id: u32,
        message: &MessagePayload,
        force_uncompressed: bool,
        is_continuation: bool,
        data: &[u8],
    ) -> Result<(), ChunkSerializationError> {
        let mut header = ChunkHeader {
            chunk_stream_id,
            timestamp: message.timestamp,
            timestamp_field: 0,
            message_length: message.data.len() as u32,
            message_type_id: message.type_id,
            message_stream_id: message.message_stream_id,
        };

        let format = if is_continuation {
            ChunkHeaderFormat::Empty
        } else if force_uncompressed {
            ChunkHeaderFormat::Full
        } else {
            match self.previous_headers.get(&chunk_stream_id) {
                None => ChunkHeaderFormat::Full,
                Some(previous) => select_format(&mut header, previous),
            }
        };

        encode_basic_header(format, chunk_stream_id, bytes)?;
        add_timestamp_field(bytes, format, &header)?;
        add_message_length_and_type_id(bytes, format, &header)?;
        add_message_stream_id(bytes, format, &header)?;
        add_extended_timestamp(bytes, format, &header)?;
        bytes.write_all(data)?;

        // Continuation chunks repeat the first chunk's header, so only the
        // first chunk of a message updates the baseline.
        if !is_continuation {
            self.previous_headers.insert(chunk_stream_id, header);
        }

        Ok(())
    }
}

impl Default for ChunkSerializer {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the most compressed header format the previous chunk allows, and
/// fills in the timestamp delta where one applies.
fn select_format(current: &mut ChunkHeader, previous: &ChunkHeader) -> ChunkHeaderFormat {
    if current.message_stream_id != previous.message_stream_id {
        return ChunkHeaderFormat::Full;
    }

    if current.timestamp < previous.timestamp {
        // A delta can't express time going backwards; start over
        return ChunkHeaderFormat::Full;
    }

    current.timestamp_field = (current.timestamp - previous.timestamp).value;

    if current.message_type_id != previous.message_type_id
        || current.message_length != previous.message_length
    {
        return ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId;
    }

    if current.timestamp != previous.timestamp {
        return ChunkHeaderFormat::TimeDeltaOnly;
    }

    ChunkHeaderFormat::Empty
}

fn add_timestamp_field(
    bytes: &mut Cursor<Vec<u8>>,
    format: ChunkHeaderFormat,
    header: &ChunkHeader,
) -> Result<(), ChunkSerializationError> {
    if format == ChunkHeaderFormat::Empty {
        return Ok(());
    }

    let value = if header.timestamp.value >= EXTENDED_TIMESTAMP_MARKER {
        EXTENDED_TIMESTAMP_MARKER
    } else {
        match format {
            ChunkHeaderFormat::Full => header.timestamp.value,
            _ => header.timestamp_field,
        }
    };

    bytes.write_u24::<BigEndian>(value)?;
    Ok(())
}

fn add_message_length_and_type_id(
    bytes: &mut Cursor<Vec<u8>>,
    format: ChunkHeaderFormat,
    header: &ChunkHeader,
) -> Result<(), ChunkSerializationError> {
    match format {
        ChunkHeaderFormat::Full | ChunkHeaderFormat::TimeDeltaWithoutMessageStreamId => {
            bytes.write_u24::<BigEndian>(header.message_length)?;
            bytes.write_u8(header.message_type_id)?;
            Ok(())
        }

        _ => Ok(()),
    }
}

fn add_message_stream_id(
    bytes: &mut Cursor<Vec<u8>>,
    format: ChunkHeaderFormat,
    header: &ChunkHeader,
) -> Result<(), ChunkSerializationError> {
    if format != ChunkHeaderFormat::Full {
        return Ok(());
    }

    // Message stream ids are the one little endian field in the protocol
    bytes.write_u32::<LittleEndian>(header.message_stream_id)?;
    Ok(())
}

fn add_extended_timestamp(
    bytes: &mut Cursor<Vec<u8>>,
    format: ChunkHeaderFormat,
    header: &ChunkHeader,
) -> Result<(), ChunkSerializationError> {
    if format == ChunkHeaderFormat::Empty {
        return Ok(());
    }

    if header.timestamp.value < EXTENDED_TIMESTAMP_MARKER {
        return Ok(());
    }

    // The extended field carries the absolute timestamp even for delta
    // header formats
    bytes.write_u32::<BigEndian>(header.timestamp.value)?;
    Ok(())
}
