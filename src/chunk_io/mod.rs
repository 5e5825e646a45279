//! This module provides serialization and deserialization of RTMP chunks.
//!
//! A message is split into one or more chunks, each at most the negotiated
//! chunk size.  Chunks from different messages can interleave as long as
//! the messages travel on different chunk streams, and headers compress
//! against the previous chunk sent on the same chunk stream.  Both ends of
//! that process live here: [`ChunkSerializer`] turns a
//! [`MessagePayload`](crate::messages::MessagePayload) into wire bytes and
//! [`ChunkDeserializer`] reassembles wire bytes back into complete
//! payloads.
//!
//! Both types are stateful per connection and perform no I/O.

mod chunk_header;
mod deserialization_errors;
mod deserializer;
mod serialization_errors;
mod serializer;

pub use self::chunk_header::{ChunkHeader, ChunkHeaderFormat};
pub use self::chunk_header::{MAX_CHUNK_STREAM_ID, MIN_CHUNK_STREAM_ID};
pub use self::deserialization_errors::ChunkDeserializationError;
pub use self::deserializer::ChunkDeserializer;
pub use self::serialization_errors::ChunkSerializationError;
pub use self::serializer::{ChunkSerializer, Packet};
