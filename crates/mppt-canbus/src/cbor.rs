//! The slice of CBOR the chargers speak: a one-entry map with a 16-bit key and a single
//! scalar value. Everything is big-endian on the wire.
//!
//! ```text
//! 0xA1            map(1)
//! 0x19 KH KL      uint16 key (object id)
//! <value>         0xFA + f32 | 0x19 + i16 | 0x00..=0x17 | 0xF4 / 0xF5
//! ```

use crate::error::{DecodeError, EncodeError};

pub const MAP_ONE: u8 = 0xA1;
pub const UINT16_FOLLOWS: u8 = 0x19;
pub const FLOAT32: u8 = 0xFA;
pub const FALSE: u8 = 0xF4;
pub const TRUE: u8 = 0xF5;
pub const SMALL_UINT_MAX: u8 = 0x17;

/// Map marker, key marker and the two key bytes.
pub const HEADER_LEN: usize = 4;

/// Longest entry: header, float tag and four value bytes. One more than a classic frame.
pub const MAX_ENTRY_LEN: usize = HEADER_LEN + 5;

/// Converts a host float to its IEEE-754 bytes in network (big-endian) order.
pub fn encode_f32_be(value: f32) -> [u8; 4] {
    value.to_bits().to_be_bytes()
}

/// Inverse of [`encode_f32_be`]; independent of host byte order.
pub fn decode_f32_be(bytes: [u8; 4]) -> f32 {
    f32::from_bits(u32::from_be_bytes(bytes))
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Float(f32),
    Int16(i16),
    SmallUint(u8),
    Bool(bool),
}

/// One decoded key/value pair.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Entry {
    pub key: u16,
    pub value: Value,
}

/// An encoded single-entry map.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Payload {
    buf: [u8; MAX_ENTRY_LEN],
    len: usize,
}

impl Payload {
    fn with_header(key: u16) -> Self {
        let [hi, lo] = key.to_be_bytes();
        let mut buf = [0u8; MAX_ENTRY_LEN];
        buf[..HEADER_LEN].copy_from_slice(&[MAP_ONE, UINT16_FOLLOWS, hi, lo]);
        Self {
            buf,
            len: HEADER_LEN,
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Header with no value, used for the node-id query in discovery.
pub fn encode_key(key: u16) -> Payload {
    Payload::with_header(key)
}

pub fn encode_bool(key: u16, value: bool) -> Payload {
    let mut out = Payload::with_header(key);
    out.push(&[if value { TRUE } else { FALSE }]);
    out
}

pub fn encode_f32(key: u16, value: f32) -> Payload {
    let mut out = Payload::with_header(key);
    out.push(&[FLOAT32]);
    out.push(&encode_f32_be(value));
    out
}

pub fn encode_i16(key: u16, value: i16) -> Payload {
    let mut out = Payload::with_header(key);
    out.push(&[UINT16_FOLLOWS]);
    out.push(&value.to_be_bytes());
    out
}

pub fn encode_small_uint(key: u16, value: u8) -> Result<Payload, EncodeError> {
    if value > SMALL_UINT_MAX {
        return Err(EncodeError::SmallUintOutOfRange(value));
    }
    let mut out = Payload::with_header(key);
    out.push(&[value]);
    Ok(out)
}

pub fn encode_entry(key: u16, value: Value) -> Result<Payload, EncodeError> {
    match value {
        Value::Float(v) => Ok(encode_f32(key, v)),
        Value::Int16(v) => Ok(encode_i16(key, v)),
        Value::SmallUint(v) => encode_small_uint(key, v),
        Value::Bool(b) => Ok(encode_bool(key, b)),
    }
}

/// Decodes a one-entry telemetry map. Booleans are never published by the chargers and
/// are reported as an unsupported tag.
pub fn decode_entry(data: &[u8]) -> Result<Entry, DecodeError> {
    if data.len() <= HEADER_LEN {
        return Err(DecodeError::TooShort { len: data.len() });
    }
    if data[0] != MAP_ONE || data[1] != UINT16_FOLLOWS {
        return Err(DecodeError::BadHeader {
            got: [data[0], data[1]],
        });
    }
    let key = u16::from_be_bytes([data[2], data[3]]);
    let tag = data[HEADER_LEN];
    let body = &data[HEADER_LEN + 1..];
    let value = match tag {
        FLOAT32 => {
            let raw: [u8; 4] = body
                .get(..4)
                .and_then(|b| b.try_into().ok())
                .ok_or(DecodeError::Truncated {
                    tag,
                    len: data.len(),
                })?;
            Value::Float(decode_f32_be(raw))
        }
        UINT16_FOLLOWS => {
            let raw: [u8; 2] = body
                .get(..2)
                .and_then(|b| b.try_into().ok())
                .ok_or(DecodeError::Truncated {
                    tag,
                    len: data.len(),
                })?;
            Value::Int16(i16::from_be_bytes(raw))
        }
        0..=SMALL_UINT_MAX => Value::SmallUint(tag),
        other => return Err(DecodeError::UnsupportedTag(other)),
    };
    Ok(Entry { key, value })
}
