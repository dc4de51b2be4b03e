//! Typed binary dictionary messaging over TCP.
//!
//! dictwire exchanges typed key/value dictionaries over a TCP connection
//! using a length-prefixed binary wire format, with bounded-time receives
//! and cooperative cancellation.
//!
//! # Crate Structure
//!
//! - [`codec`] — Pure message encode/decode (no I/O)
//! - [`transport`] — TCP connection lifecycle, readiness waits, cancellation
//! - [`frame`] — Whole-message send/receive over a connected stream

/// Re-export codec types.
pub mod codec {
    pub use dictwire_codec::*;
}

/// Re-export transport types.
pub mod transport {
    pub use dictwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dictwire_frame::*;
}
