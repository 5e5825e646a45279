use std::io;
use thiserror::Error;

/// An enumeration for all errors that can occur while performing a handshake
/// with a peer.  Every one of these is fatal to the connection; RTMP has no
/// handshake retry.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// The peer asked to speak an RTMP version older than 3, which is no
    /// longer supported by anyone.
    #[error("Peer requested unsupported RTMP version {version}")]
    UnsupportedVersion { version: u8 },

    /// Version bytes above 31 do not correspond to any RTMP revision and
    /// usually mean the peer is not speaking RTMP at all (e.g. an HTTP
    /// request hitting the wrong port).
    #[error("Peer sent invalid RTMP version byte {version}")]
    BadVersionByte { version: u8 },

    /// The four bytes after the peer's epoch must be all zeroes in a plain
    /// handshake.
    #[error("The must-be-zero field of the peer's first packet was not zero")]
    NonZeroTimeField,

    /// The peer's final packet did not echo back the epoch we sent it.
    #[error("Peer's handshake ack did not echo our epoch")]
    IncorrectPeerEpoch,

    /// The peer's final packet did not echo back the random bytes we sent
    /// it, so we cannot trust that it actually received our packet.
    #[error("Peer's handshake ack did not echo our random data")]
    IncorrectRandomData,

    #[error("{0}")]
    Io(#[from] io::Error),
}
