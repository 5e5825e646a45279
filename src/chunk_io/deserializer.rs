use super::chunk_header::{
    decode_basic_header, BasicHeaderDecodeResult, ChunkHeader, ChunkHeaderFormat,
};
use super::ChunkDeserializationError;
use crate::messages::MessagePayload;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use bytes::BytesMut;
use std::cmp::min;
use std::collections::HashMap;
use std::io::Cursor;
use std::mem;

/// Every connection starts with this chunk size until a SetChunkSize
/// message says otherwise.
const INITIAL_MAX_CHUNK_SIZE: usize = 128;

/// The maximum chunk size is a 31 bit value.
const MAX_ALLOWED_CHUNK_SIZE: usize = 2_147_483_647;

/// 24 bit timestamp fields hold this marker when the real timestamp lives
/// in the 4 byte extended field.
const EXTENDED_TIMESTAMP_MARKER: u32 = 0xFF_FFFF;

/// By default refuse messages longer than the 24 bit length field maximum.
const DEFAULT_MAX_MESSAGE_SIZE: usize = 16_777_215;

#[derive(Eq, PartialEq, Debug, Copy, Clone)]
enum ParseStage {
    BasicHeader,
    Timestamp,
    MessageLength,
    MessageTypeId,
    MessageStreamId,
    ExtendedTimestamp,
    MessageBody,
}

#[derive(Eq, PartialEq, Debug)]
enum StageResult {
    Success,
    NotEnoughBytes,
}

/// A message being accumulated from chunks on one chunk stream
struct ReassemblyState {
    declared_length: u32,
    body: BytesMut,
}

/// Reads RTMP chunks from raw bytes and reassembles them into complete
/// messages.
///
/// An instance is per-connection state: it tracks the previous header seen
/// on every chunk stream (compressed headers borrow fields from it) and a
/// partial message per chunk stream, so chunks of different messages can
/// interleave freely.
///
/// Bytes are pushed in with [`get_next_message`](Self::get_next_message);
/// unconsumed bytes are buffered internally.  Since a single call's input
/// may contain more than one message, callers should keep calling with an
/// empty slice until `None` comes back:
///
/// ```
/// # use rtmp_transport::chunk_io::{ChunkDeserializer, ChunkSerializer};
/// # use rtmp_transport::messages::MessagePayload;
/// # use rtmp_transport::time::RtmpTimestamp;
/// # use bytes::Bytes;
/// let mut serializer = ChunkSerializer::new();
/// let payload = MessagePayload {
///     timestamp: RtmpTimestamp::new(50),
///     type_id: 8,
///     message_stream_id: 1,
///     data: Bytes::from(vec![1, 2, 3]),
/// };
/// let packet = serializer.serialize(20, &payload, false).unwrap();
///
/// let mut deserializer = ChunkDeserializer::new();
/// let mut input = &packet.bytes[..];
/// while let Some(message) = deserializer.get_next_message(input).unwrap() {
///     assert_eq!(message, payload);
///     input = &[];
/// }
/// ```
pub struct ChunkDeserializer {
    max_chunk_size: usize,
    max_message_size: usize,
    buffer: BytesMut,
    current_stage: ParseStage,
    current_format: ChunkHeaderFormat,
    current_header: ChunkHeader,
    previous_headers: HashMap<u32, ChunkHeader>,
    in_progress: HashMap<u32, ReassemblyState>,
}

impl ChunkDeserializer {
    pub fn new() -> ChunkDeserializer {
        ChunkDeserializer {
            max_chunk_size: INITIAL_MAX_CHUNK_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            buffer: BytesMut::with_capacity(4096),
            current_stage: ParseStage::BasicHeader,
            current_format: ChunkHeaderFormat::Full,
            current_header: ChunkHeader::new(),
            previous_headers: HashMap::new(),
            in_progress: HashMap::new(),
        }
    }

    /// Processes the passed in bytes, returning the next complete message
    /// found (if any).  Leftover bytes are buffered for later calls.
    pub fn get_next_message(
        &mut self,
        bytes: &[u8],
    ) -> Result<Option<MessagePayload>, ChunkDeserializationError> {
        self.buffer.extend_from_slice(bytes);

        let mut message = None;
        loop {
            let result = match self.current_stage {
                ParseStage::BasicHeader => self.form_header()?,
                ParseStage::Timestamp => self.get_timestamp()?,
                ParseStage::MessageLength => self.get_message_length()?,
                ParseStage::MessageTypeId => self.get_message_type_id()?,
                ParseStage::MessageStreamId => self.get_message_stream_id()?,
                ParseStage::ExtendedTimestamp => self.get_extended_timestamp()?,
                ParseStage::MessageBody => self.get_message_body(&mut message)?,
            };

            if result == StageResult::NotEnoughBytes || message.is_some() {
                break;
            }
        }

        Ok(message)
    }

    /// Changes the maximum size the peer is allowed to make each chunk.
    /// This must be called the moment an inbound SetChunkSize message is
    /// seen, before any further bytes are processed, or chunk boundaries
    /// will be computed wrongly.
    pub fn set_max_chunk_size(
        &mut self,
        new_size: usize,
    ) -> Result<(), ChunkDeserializationError> {
        // A zero chunk size would make every body read consume nothing and
        // leave the parser re-reading payload bytes as headers
        if new_size == 0 || new_size > MAX_ALLOWED_CHUNK_SIZE {
            return Err(ChunkDeserializationError::InvalidMaxChunkSize {
                chunk_size: new_size,
            });
        }

        self.max_chunk_size = new_size;
        Ok(())
    }

    /// Changes the largest message length this deserializer will agree to
    /// buffer.  Anything larger fails closed.
    pub fn set_max_message_size(&mut self, new_size: usize) {
        self.max_message_size = new_size;
    }

    /// Throws away the partially reassembled message (if any) on the given
    /// chunk stream, in response to an inbound Abort message.  Returns true
    /// if partial data was actually dropped.
    pub fn abort_chunk_stream(&mut self, chunk_stream_id: u32) -> bool {
        self.in_progress.remove(&chunk_stream_id).is_some()
    }

    fn form_header(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        let (format, csid, bytes_consumed) = match decode_basic_header(&self.buffer[..]) {
            BasicHeaderDecodeResult::NotEnoughBytes => return Ok(StageResult::NotEnoughBytes),
            BasicHeaderDecodeResult::Decoded {
                format,
                chunk_stream_id,
                bytes_consumed,
            } => (format, chunk_stream_id, bytes_consumed),
        };

        // A full header starts fresh; every other format borrows the fields
        // it omits from the last chunk seen on this chunk stream.
        self.current_header = match format {
            ChunkHeaderFormat::Full => {
                let mut header = ChunkHeader::new();
                header.chunk_stream_id = csid;
                header
            }

            _ => match self.previous_headers.remove(&csid) {
                Some(header) => header,
                None => return Err(ChunkDeserializationError::NoPreviousChunkOnStream { csid }),
            },
        };

        let _ = self.buffer.split_to(bytes_consumed);
        self.current_format = format;
        self.current_stage = ParseStage::Timestamp;
        Ok(StageResult::Success)
    }

    fn get_timestamp(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        if self.current_format == ChunkHeaderFormat::Empty {
            // Type 3 chunks inherit every field verbatim, including the
            // timestamp, and never carry an extended timestamp.
            self.current_stage = ParseStage::MessageBody;
            return Ok(StageResult::Success);
        }

        if self.buffer.len() < 3 {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(3);
        let field = Cursor::new(bytes).read_u24::<BigEndian>()?;

        self.current_header.timestamp_field = field;
        if field < EXTENDED_TIMESTAMP_MARKER {
            match self.current_format {
                ChunkHeaderFormat::Full => self.current_header.timestamp.set(field),
                _ => self.current_header.timestamp = self.current_header.timestamp + field,
            }
        }

        self.current_stage = ParseStage::MessageLength;
        Ok(StageResult::Success)
    }

    fn get_message_length(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        if self.current_format == ChunkHeaderFormat::TimeDeltaOnly {
            self.current_stage = ParseStage::MessageTypeId;
            return Ok(StageResult::Success);
        }

        if self.buffer.len() < 3 {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(3);
        self.current_header.message_length = Cursor::new(bytes).read_u24::<BigEndian>()?;
        self.current_stage = ParseStage::MessageTypeId;
        Ok(StageResult::Success)
    }

    fn get_message_type_id(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        if self.current_format == ChunkHeaderFormat::TimeDeltaOnly {
            self.current_stage = ParseStage::MessageStreamId;
            return Ok(StageResult::Success);
        }

        if self.buffer.is_empty() {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(1);
        self.current_header.message_type_id = bytes[0];
        self.current_stage = ParseStage::MessageStreamId;
        Ok(StageResult::Success)
    }

    fn get_message_stream_id(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        if self.current_format != ChunkHeaderFormat::Full {
            self.current_stage = ParseStage::ExtendedTimestamp;
            return Ok(StageResult::Success);
        }

        if self.buffer.len() < 4 {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(4);
        self.current_header.message_stream_id =
            Cursor::new(bytes).read_u32::<LittleEndian>()?;
        self.current_stage = ParseStage::ExtendedTimestamp;
        Ok(StageResult::Success)
    }

    fn get_extended_timestamp(&mut self) -> Result<StageResult, ChunkDeserializationError> {
        if self.current_header.timestamp_field < EXTENDED_TIMESTAMP_MARKER {
            self.current_stage = ParseStage::MessageBody;
            return Ok(StageResult::Success);
        }

        if self.buffer.len() < 4 {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(4);
        let timestamp = Cursor::new(bytes).read_u32::<BigEndian>()?;

        // The extended field carries the full absolute timestamp, replacing
        // whatever was accumulated, for delta headers as well.
        self.current_header.timestamp.set(timestamp);
        self.current_stage = ParseStage::MessageBody;
        Ok(StageResult::Success)
    }

    fn get_message_body(
        &mut self,
        message: &mut Option<MessagePayload>,
    ) -> Result<StageResult, ChunkDeserializationError> {
        let csid = self.current_header.chunk_stream_id;
        let declared_length = self.current_header.message_length;

        if declared_length as usize > self.max_message_size {
            return Err(ChunkDeserializationError::MessageTooLarge {
                csid,
                declared_length,
                max_size: self.max_message_size,
            });
        }

        if let Some(state) = self.in_progress.get(&csid) {
            if state.declared_length != declared_length {
                return Err(ChunkDeserializationError::MessageLengthChangedMidStream {
                    csid,
                    in_progress_length: state.declared_length,
                    new_length: declared_length,
                });
            }
        }

        let state = self.in_progress.entry(csid).or_insert_with(|| ReassemblyState {
            declared_length,
            body: BytesMut::with_capacity(declared_length as usize),
        });

        let bytes_remaining = state.declared_length as usize - state.body.len();
        let chunk_length = min(bytes_remaining, self.max_chunk_size);
        if self.buffer.len() < chunk_length {
            return Ok(StageResult::NotEnoughBytes);
        }

        let bytes = self.buffer.split_to(chunk_length);
        state.body.extend_from_slice(&bytes[..]);
        let is_complete = state.body.len() == state.declared_length as usize;

        if is_complete {
            if let Some(state) = self.in_progress.remove(&csid) {
                *message = Some(MessagePayload {
                    timestamp: self.current_header.timestamp,
                    type_id: self.current_header.message_type_id,
                    message_stream_id: self.current_header.message_stream_id,
                    data: state.body.freeze(),
                });
            }
        }

        // This chunk's (decompressed) header becomes the baseline for the
        // next compressed header on this chunk stream.
        let header = mem::replace(&mut self.current_header, ChunkHeader::new());
        self.previous_headers.insert(csid, header);
        self.current_stage = ParseStage::BasicHeader;
        Ok(StageResult::Success)
    }
}

impl Default for ChunkDeserializer {
    fn default() -> Self {
        Self::new()
    }
}
