//! Typed key/value dictionary codec for the dictwire protocol.
//!
//! A [`Message`] maps string keys to typed [`Value`]s. On the wire a message
//! is a 4-byte big-endian payload length followed by a concatenation of
//! entries, each entry being:
//! - A 2-byte big-endian key length
//! - The raw key bytes (UTF-8)
//! - A 1-byte type tag
//! - The value bytes (8-byte big-endian scalar, or 4-byte big-endian length
//!   plus that many bytes)
//!
//! Encoding and decoding are pure functions with no I/O. Every length field
//! read from the wire is validated against the remaining input before it is
//! used.

pub mod codec;
pub mod error;
pub mod message;
pub mod value;

pub use codec::{decode_message, encode_message, HEADER_SIZE, KEY_LEN_SIZE, SCALAR_SIZE, VALUE_LEN_SIZE};
pub use error::{CodecError, Result};
pub use message::Message;
pub use value::{Value, TAG_BINARY, TAG_FLOAT64, TAG_INT64, TAG_STRING, TAG_UINT64};
