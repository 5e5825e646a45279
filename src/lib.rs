/*!
Transport-layer implementation of the RTMP chunk protocol.

This crate covers the wire mechanics of a single RTMP connection: the
three-way handshake, splitting messages into bounded chunks interleaved
across chunk streams, reassembling inbound chunks into complete messages,
and windowed acknowledgement bookkeeping.

The codec layers (`handshake`, `chunk_io`, `messages`) are push-based and
perform no I/O of their own, so they can be driven from any byte source.
The `transport` module pumps them over an async byte stream with bounded
buffering, per-message write completion, and cooperative cancellation.

Payload interpretation (AMF command encoding, audio/video data, FLV) is
deliberately out of scope; payloads pass through as opaque bytes and are
handed to a [`messages::PayloadCodec`] implementation supplied by the
session layer.
*/

pub mod chunk_io;
pub mod handshake;
pub mod messages;
pub mod time;
pub mod transport;
