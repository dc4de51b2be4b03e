//! TCP transport glue for dictwire.
//!
//! Provides the byte-stream capability the framing layer builds on:
//! - [`WireStream`] — a connected TCP stream with readiness waits and a
//!   shared cancellation flag
//! - [`TcpTransport`] — bind/accept/connect lifecycle
//!
//! This is the lowest layer of dictwire. Everything else builds on top of
//! the [`WireStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::{ShutdownHandle, WireStream};
pub use tcp::{ListenerShutdownHandle, TcpTransport};
