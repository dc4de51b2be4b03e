use std::time::Duration;

/// Default maximum accepted payload size: 16 MiB.
///
/// The wire format itself allows payloads up to 4 GiB; the cap is enforced
/// before any payload byte is read or allocated.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration for a message stream.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum accepted payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Default receive timeout. `None` blocks until a frame or disconnect.
    pub recv_timeout: Option<Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            recv_timeout: None,
        }
    }
}
