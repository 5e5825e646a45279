//! Async pumps that bridge the push-based codecs to a real byte stream.
//!
//! A connection owns two background tasks: a receive pump that reads from
//! the transport, feeds the chunk deserializer, applies protocol control
//! messages, and delivers everything else on a bounded channel; and a send
//! pump that drains a bounded write queue into the transport.  The
//! [`Multiplexer`] is the shared, clonable entry point into that write
//! queue.  All loops observe a shared cancellation token, so dropping or
//! shutting down the [`Connection`] tears everything down promptly.

mod connection;
mod errors;
mod multiplexer;
mod window;

pub use self::connection::{Connection, ConnectionConfig, InboundEvent};
pub use self::errors::ConnectionError;
pub use self::multiplexer::Multiplexer;
pub use self::window::WindowTracker;
