//! Byte encoding of payload values.
//!
//! The codec is a bijection between [`Value`] graphs and byte strings,
//! backed by postcard. The framing layer never looks inside payloads;
//! encoding and decoding happen strictly outside it. Decode failures
//! surface as [`RompError::Codec`](crate::RompError::Codec), which server
//! dispatch converts into an EXCEPTION reply.

use crate::protocol::error::Result;
use crate::protocol::value::Value;

/// Encodes a value into its payload byte form.
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Ok(postcard::to_stdvec(value)?)
}

/// Decodes a payload back into a value. A payload holds exactly one value;
/// the frame header's length field delimits it.
pub fn decode(bytes: &[u8]) -> Result<Value> {
    Ok(postcard::from_bytes(bytes)?)
}
