use std::time::Duration;

use dictwire_codec::CodecError;
use dictwire_transport::TransportError;

/// Errors that can occur while sending or receiving framed messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Encoding or decoding the message failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The peer declared a payload larger than the configured maximum.
    #[error("declared payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Reading the 4-byte length header failed.
    #[error("header reception failed: {0}")]
    HeaderReception(#[source] TransportError),

    /// Reading the payload failed.
    #[error("payload reception failed: {0}")]
    PayloadReception(#[source] TransportError),

    /// The connection closed before a complete frame was exchanged.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// The receive timeout expired before the stream became readable.
    #[error("receive timed out after {0:?}")]
    TimedOut(Duration),

    /// The operation observed the cancellation flag.
    #[error("operation cancelled by shutdown")]
    Cancelled,

    /// An I/O error occurred while writing a frame.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A transport operation outside the send/receive paths failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
