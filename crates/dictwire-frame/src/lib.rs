//! Framed message transport for dictwire.
//!
//! A [`MessageStream`] owns one connected transport handle and exchanges
//! whole [`Message`](dictwire_codec::Message)s over it:
//! - Send encodes and writes the full frame, looping on partial writes
//! - Receive reads the 4-byte length header, then exactly that many payload
//!   bytes, with bounded-time waits and cooperative cancellation
//!
//! No partial reads, no buffer management in user code.

pub mod config;
pub mod error;
pub mod stream;

pub use config::{FrameConfig, DEFAULT_MAX_PAYLOAD};
pub use error::{FrameError, Result};
pub use stream::MessageStream;
