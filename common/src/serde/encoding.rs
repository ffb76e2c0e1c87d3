//! Value encoding/decoding primitives.
//!
//! All fixed-width integers are encoded little-endian. Decoders take a
//! `&mut &[u8]` and advance it past the consumed bytes, so composite
//! decoders can chain field reads without tracking offsets themselves.

use bytes::BytesMut;

/// Error produced by encoding or decoding a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub message: String,
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Trait for types that can be encoded to bytes.
pub trait Encode {
    fn encode(&self, buf: &mut BytesMut);
}

/// Trait for types that can be decoded from bytes.
pub trait Decode: Sized {
    fn decode(buf: &mut &[u8]) -> Result<Self, EncodingError>;
}

impl Encode for u8 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&[*self]);
    }
}

impl Decode for u8 {
    fn decode(buf: &mut &[u8]) -> Result<Self, EncodingError> {
        if buf.is_empty() {
            return Err(EncodingError {
                message: "Buffer too short for u8".to_string(),
            });
        }
        let value = buf[0];
        *buf = &buf[1..];
        Ok(value)
    }
}

impl Encode for u32 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u32 {
    fn decode(buf: &mut &[u8]) -> Result<Self, EncodingError> {
        if buf.len() < 4 {
            return Err(EncodingError {
                message: "Buffer too short for u32".to_string(),
            });
        }
        let value = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        *buf = &buf[4..];
        Ok(value)
    }
}

impl Encode for u64 {
    fn encode(&self, buf: &mut BytesMut) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode(buf: &mut &[u8]) -> Result<Self, EncodingError> {
        if buf.len() < 8 {
            return Err(EncodingError {
                message: "Buffer too short for u64".to_string(),
            });
        }
        let value = u64::from_le_bytes([
            buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
        ]);
        *buf = &buf[8..];
        Ok(value)
    }
}

/// Decode a little-endian u64, advancing the slice.
pub fn decode_u64(buf: &mut &[u8]) -> Result<u64, EncodingError> {
    u64::decode(buf)
}
