//! Hex-JSON value codec
//!
//! Nodes encode every integer as a *quantity* (`0x` + lowercase hex, no leading
//! zeros, `0x0` for zero) and every opaque byte string as *data* (`0x` + an even
//! number of hex digits, `0x` when empty). The functions here are the single place
//! where those conventions are enforced; all typed wrappers go through them.

use bytes::Bytes;
use num_bigint::BigUint;

use crate::{CodecError, Quantity};

/// Encode a quantity in canonical wire form
pub fn encode_quantity(value: &Quantity) -> String {
    format!("0x{}", value.as_biguint().to_str_radix(16))
}

/// Decode a wire quantity
///
/// Rejects a missing `0x` prefix, an empty digit string, non-hex digits and
/// leading zeros (other than the literal `0x0`).
pub fn decode_quantity(s: &str) -> Result<Quantity, CodecError> {
    let digits = strip_prefix(s)?;
    if digits.is_empty() {
        return Err(CodecError::malformed(s, "quantity has no digits"));
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(CodecError::malformed(s, "quantity has leading zeros"));
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CodecError::malformed(s, "non-hex character"));
    }
    BigUint::parse_bytes(digits.as_bytes(), 16)
        .map(Quantity::from)
        .ok_or_else(|| CodecError::malformed(s, "non-hex character"))
}

/// Encode opaque bytes as wire data
pub fn encode_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

/// Decode wire data into bytes
pub fn decode_data(s: &str) -> Result<Bytes, CodecError> {
    let digits = strip_prefix(s)?;
    if digits.is_empty() {
        return Ok(Bytes::new());
    }
    if digits.len() % 2 != 0 {
        return Err(CodecError::malformed(s, "odd number of hex digits"));
    }
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|_| CodecError::malformed(s, "non-hex character"))
}

/// Decode wire data that must be exactly `N` bytes long (hashes, addresses)
pub fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], CodecError> {
    let bytes = decode_data(s)?;
    if bytes.len() != N {
        return Err(CodecError::malformed(s, "unexpected byte length"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decode a boolean result
///
/// Nodes answer with JSON `true`/`false`; a handful of older clients send the
/// quantities `0x0`/`0x1` instead, which are accepted as well.
pub fn decode_bool(value: &serde_json::Value) -> Result<bool, CodecError> {
    match value {
        serde_json::Value::Bool(b) => Ok(*b),
        serde_json::Value::String(s) => {
            let q = decode_quantity(s)?;
            match q.to_u64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(CodecError::malformed(s, "boolean quantity out of range")),
            }
        }
        other => Err(CodecError::malformed(&other.to_string(), "expected a boolean")),
    }
}

fn strip_prefix(s: &str) -> Result<&str, CodecError> {
    s.strip_prefix("0x")
        .ok_or_else(|| CodecError::malformed(s, "missing 0x prefix"))
}
