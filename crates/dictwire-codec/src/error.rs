/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// A key exceeds the 16-bit key length field.
    #[error("key too long ({len} bytes, max {max})")]
    KeyTooLong { len: usize, max: usize },

    /// A string/binary value exceeds the 32-bit value length field.
    #[error("value too large ({len} bytes, max {max})")]
    ValueTooLarge { len: usize, max: usize },

    /// The encoded payload exceeds the 32-bit frame length field.
    #[error("payload too large ({len} bytes, max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// The input is shorter than the 4-byte length header.
    #[error("message too short ({len} bytes, need at least 4)")]
    TooShort { len: usize },

    /// The input ends before the declared payload length.
    #[error("incomplete message (declared {declared} payload bytes, got {actual})")]
    Incomplete { declared: usize, actual: usize },

    /// The input extends past the declared payload length.
    #[error("oversized message (declared {declared} payload bytes, got {actual})")]
    Oversized { declared: usize, actual: usize },

    /// An entry field runs past the end of the payload.
    #[error("truncated entry at offset {offset} (needs {needed} bytes)")]
    Truncated { offset: usize, needed: usize },

    /// The type tag is not one of the five defined tags.
    #[error("unknown type tag {tag}")]
    UnknownType { tag: u8 },

    /// A key or string value is not valid UTF-8.
    #[error("invalid utf-8 in {field} at offset {offset}")]
    InvalidUtf8 { field: &'static str, offset: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;
