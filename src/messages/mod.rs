//! The protocol control messages the transport engine understands, plus
//! the raw payload type every message passes through on its way to or
//! from the chunk layer.
//!
//! RTMP reserves message type ids 1 through 6 for messages that steer the
//! transport itself (chunk sizing, aborts, acknowledgements, and window
//! management); those are modeled here as [`RtmpMessage`] variants with
//! their wire codecs.  Everything else (AMF commands, audio, video, user
//! control events) is payload as far as this crate is concerned and
//! surfaces as [`RtmpMessage::Unknown`] unless a richer [`PayloadCodec`]
//! is plugged in.

mod deserialization_errors;
mod message_payload;
mod serialization_errors;
mod types;

pub use self::deserialization_errors::MessageDeserializationError;
pub use self::message_payload::MessagePayload;
pub use self::serialization_errors::MessageSerializationError;

use crate::time::RtmpTimestamp;
use bytes::Bytes;

/// Protocol control messages always travel on this chunk stream.
pub const CONTROL_CHUNK_STREAM_ID: u32 = 2;

/// Protocol control messages always travel on this message stream.
pub const CONTROL_MESSAGE_STREAM_ID: u32 = 0;

/// Events and commands that can be sent or received via a SetPeerBandwidth
/// message, controlling how strictly the receiver should honor the new
/// window.
#[derive(Eq, PartialEq, Debug, Copy, Clone)]
pub enum PeerBandwidthLimitType {
    /// The receiver should limit its output to the window size
    Hard,

    /// The receiver may limit its output to the window size, or to the
    /// previous window if that was smaller
    Soft,

    /// Treat as hard if the previous limit was hard, otherwise ignore
    Dynamic,
}

/// An enumeration of all types of messages the transport engine can
/// handle by itself.
#[derive(PartialEq, Debug, Clone)]
pub enum RtmpMessage {
    /// A message type this crate has no codec for.  The payload is passed
    /// through untouched.
    Unknown { type_id: u8, data: Bytes },

    /// Announces a new maximum chunk size for subsequent chunks from the
    /// sender
    SetChunkSize { size: u32 },

    /// Tells the receiver to throw away a partially received message on
    /// the given chunk stream
    Abort { stream_id: u32 },

    /// Reports how many bytes have been received since the last
    /// acknowledgement
    Acknowledgement { sequence_number: u32 },

    /// Announces how many bytes the sender will accept before it expects
    /// an acknowledgement back
    WindowAcknowledgement { size: u32 },

    /// Asks the peer to limit its output bandwidth
    SetPeerBandwidth {
        size: u32,
        limit_type: PeerBandwidthLimitType,
    },
}

impl RtmpMessage {
    /// Serializes the message into a raw payload ready for chunking
    pub fn into_message_payload(
        self,
        timestamp: RtmpTimestamp,
        message_stream_id: u32,
    ) -> Result<MessagePayload, MessageSerializationError> {
        MessagePayload::from_rtmp_message(self, timestamp, message_stream_id)
    }

    /// The message type id used to denote this message on the wire
    pub fn get_message_type_id(&self) -> u8 {
        match *self {
            RtmpMessage::Unknown { type_id, .. } => type_id,
            RtmpMessage::SetChunkSize { .. } => 1,
            RtmpMessage::Abort { .. } => 2,
            RtmpMessage::Acknowledgement { .. } => 3,
            RtmpMessage::WindowAcknowledgement { .. } => 5,
            RtmpMessage::SetPeerBandwidth { .. } => 6,
        }
    }

    /// True for the message type ids the transport layer must act on
    /// itself rather than hand to the session layer.
    pub fn is_protocol_control_type(type_id: u8) -> bool {
        matches!(type_id, 1 | 2 | 3 | 5 | 6)
    }
}

/// Interprets message payloads once the transport has reassembled them,
/// and produces payloads for outbound typed messages.  The transport
/// engine itself never looks past a payload's `type_id`; a codec supplied
/// by the session layer gives the bytes meaning.
pub trait PayloadCodec {
    type Message: Send + 'static;

    /// Builds a typed message from a complete inbound payload.  An error
    /// here is not fatal to the connection; the payload is surfaced to the
    /// session layer as unparseable instead.
    fn parse(&mut self, payload: &MessagePayload)
        -> Result<Self::Message, MessageDeserializationError>;

    /// Turns a typed message back into a raw payload for chunking
    fn serialize(
        &mut self,
        message: Self::Message,
    ) -> Result<MessagePayload, MessageSerializationError>;
}

/// The codec for the control messages defined by this crate.  Control
/// messages always travel on message stream 0 with a zero timestamp.
/// Richer session layers will usually wrap or replace this with a codec
/// for their own message type.
pub struct ControlPayloadCodec;

impl PayloadCodec for ControlPayloadCodec {
    type Message = RtmpMessage;

    fn parse(
        &mut self,
        payload: &MessagePayload,
    ) -> Result<RtmpMessage, MessageDeserializationError> {
        payload.to_rtmp_message()
    }

    fn serialize(
        &mut self,
        message: RtmpMessage,
    ) -> Result<MessagePayload, MessageSerializationError> {
        message.into_message_payload(RtmpTimestamp::new(0), CONTROL_MESSAGE_STREAM_ID)
    }
}
