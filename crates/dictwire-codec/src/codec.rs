use bytes::{BufMut, BytesMut};

use crate::error::{CodecError, Result};
use crate::message::Message;
use crate::value::{Value, TAG_BINARY, TAG_FLOAT64, TAG_INT64, TAG_STRING, TAG_UINT64};

/// Frame header: 4-byte big-endian payload length.
pub const HEADER_SIZE: usize = 4;
/// Entry key length field: 2 bytes big-endian.
pub const KEY_LEN_SIZE: usize = 2;
/// String/binary value length field: 4 bytes big-endian.
pub const VALUE_LEN_SIZE: usize = 4;
/// Wire size of int64/uint64/float64 values.
pub const SCALAR_SIZE: usize = 8;

const MAX_KEY_LEN: usize = u16::MAX as usize;
const MAX_VALUE_LEN: usize = u32::MAX as usize;
const MAX_PAYLOAD_LEN: usize = u32::MAX as usize;

/// Encode a message into the wire format, appending to `dst`.
///
/// Wire format (all fields big-endian):
/// ```text
/// ┌──────────────┬─────────────────────────────────────────────┐
/// │ PayloadLen   │ Entry*                                      │
/// │ (4B)         │ KeyLen(2B) Key TypeTag(1B) Value            │
/// └──────────────┴─────────────────────────────────────────────┘
/// ```
/// Scalar values are 8 bytes (float64 as its IEEE-754 bit pattern);
/// string/binary values are a 4-byte length followed by that many bytes.
///
/// Entries are emitted in the message's key order, so the same message
/// always produces the same bytes. An empty message encodes to 4 zero bytes.
pub fn encode_message(msg: &Message, dst: &mut BytesMut) -> Result<()> {
    let mut payload = BytesMut::new();

    for (key, value) in msg {
        if key.len() > MAX_KEY_LEN {
            return Err(CodecError::KeyTooLong {
                len: key.len(),
                max: MAX_KEY_LEN,
            });
        }
        payload.put_u16(key.len() as u16);
        payload.put_slice(key.as_bytes());
        payload.put_u8(value.tag());

        match value {
            Value::Int64(v) => payload.put_i64(*v),
            Value::UInt64(v) => payload.put_u64(*v),
            Value::Float64(v) => payload.put_u64(v.to_bits()),
            Value::String(v) => {
                if v.len() > MAX_VALUE_LEN {
                    return Err(CodecError::ValueTooLarge {
                        len: v.len(),
                        max: MAX_VALUE_LEN,
                    });
                }
                payload.put_u32(v.len() as u32);
                payload.put_slice(v.as_bytes());
            }
            Value::Binary(v) => {
                if v.len() > MAX_VALUE_LEN {
                    return Err(CodecError::ValueTooLarge {
                        len: v.len(),
                        max: MAX_VALUE_LEN,
                    });
                }
                payload.put_u32(v.len() as u32);
                payload.put_slice(v);
            }
        }
    }

    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u32(payload.len() as u32);
    dst.put_slice(&payload);
    Ok(())
}

/// Decode a complete wire frame into a message.
///
/// The input must be exactly one frame: a decoder never accepts trailing
/// bytes past the declared payload length, and never returns a partially
/// populated message; any validation failure aborts the whole decode.
/// Duplicate keys are legal on the wire; the last entry wins.
pub fn decode_message(src: &[u8]) -> Result<Message> {
    if src.len() < HEADER_SIZE {
        return Err(CodecError::TooShort { len: src.len() });
    }

    let declared = u32::from_be_bytes(src[..HEADER_SIZE].try_into().unwrap()) as usize;
    let actual = src.len() - HEADER_SIZE;
    if actual < declared {
        return Err(CodecError::Incomplete { declared, actual });
    }
    if actual > declared {
        return Err(CodecError::Oversized { declared, actual });
    }

    let end = HEADER_SIZE + declared;
    let mut msg = Message::new();
    let mut offset = HEADER_SIZE;

    while offset < end {
        let key_len = {
            let bytes = take(src, &mut offset, KEY_LEN_SIZE)?;
            u16::from_be_bytes(bytes.try_into().unwrap()) as usize
        };
        let key_offset = offset;
        let key_bytes = take(src, &mut offset, key_len)?;
        let key = std::str::from_utf8(key_bytes)
            .map_err(|_| CodecError::InvalidUtf8 {
                field: "key",
                offset: key_offset,
            })?
            .to_string();

        let tag = take(src, &mut offset, 1)?[0];
        let value = match tag {
            TAG_INT64 => {
                let bytes = take(src, &mut offset, SCALAR_SIZE)?;
                Value::Int64(i64::from_be_bytes(bytes.try_into().unwrap()))
            }
            TAG_UINT64 => {
                let bytes = take(src, &mut offset, SCALAR_SIZE)?;
                Value::UInt64(u64::from_be_bytes(bytes.try_into().unwrap()))
            }
            TAG_FLOAT64 => {
                let bytes = take(src, &mut offset, SCALAR_SIZE)?;
                Value::Float64(f64::from_bits(u64::from_be_bytes(bytes.try_into().unwrap())))
            }
            TAG_STRING => {
                let len = {
                    let bytes = take(src, &mut offset, VALUE_LEN_SIZE)?;
                    u32::from_be_bytes(bytes.try_into().unwrap()) as usize
                };
                let data_offset = offset;
                let data = take(src, &mut offset, len)?;
                Value::String(
                    std::str::from_utf8(data)
                        .map_err(|_| CodecError::InvalidUtf8 {
                            field: "string value",
                            offset: data_offset,
                        })?
                        .to_string(),
                )
            }
            TAG_BINARY => {
                let len = {
                    let bytes = take(src, &mut offset, VALUE_LEN_SIZE)?;
                    u32::from_be_bytes(bytes.try_into().unwrap()) as usize
                };
                Value::Binary(take(src, &mut offset, len)?.to_vec())
            }
            other => return Err(CodecError::UnknownType { tag: other }),
        };

        msg.insert(key, value);
    }

    Ok(msg)
}

/// Bounds-checked slice of `needed` bytes at `offset`, advancing `offset`.
///
/// `src` ends exactly at the payload boundary, so this check is also the
/// entry-boundary invariant: no field can read past the declared length.
fn take<'a>(src: &'a [u8], offset: &mut usize, needed: usize) -> Result<&'a [u8]> {
    let start = *offset;
    let end = start
        .checked_add(needed)
        .ok_or(CodecError::Truncated { offset: start, needed })?;
    let bytes = src
        .get(start..end)
        .ok_or(CodecError::Truncated { offset: start, needed })?;
    *offset = end;
    Ok(bytes)
}
