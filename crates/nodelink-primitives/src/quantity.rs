//! Arbitrary-precision non-negative integers

use std::fmt;
use std::ops::Add;
use std::str::FromStr;

use num_bigint::{BigInt, BigUint};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{decode_quantity, encode_quantity};
use crate::CodecError;

/// Non-negative integer of unbounded width
///
/// Balances, gas prices and block numbers on some chains exceed 64 bits, so every
/// integer crossing the wire is held as a `BigUint`. Checked narrowing helpers
/// exist for callers that know their value is small (nonces, chain ids).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Quantity(BigUint);

impl Quantity {
    /// The value zero
    pub fn zero() -> Self {
        Quantity(BigUint::default())
    }

    /// The value one
    pub fn one() -> Self {
        Quantity(BigUint::from(1u8))
    }

    /// True if this is zero
    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    /// Borrow the underlying integer
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Unwrap into the underlying integer
    pub fn into_biguint(self) -> BigUint {
        self.0
    }

    /// Narrow to `u64`, or `None` if the value does not fit
    pub fn to_u64(&self) -> Option<u64> {
        u64::try_from(&self.0).ok()
    }

    /// Narrow to `u128`, or `None` if the value does not fit
    pub fn to_u128(&self) -> Option<u128> {
        u128::try_from(&self.0).ok()
    }

    /// Minimal big-endian bytes; empty for zero
    pub fn to_be_bytes(&self) -> Vec<u8> {
        if self.is_zero() {
            Vec::new()
        } else {
            self.0.to_bytes_be()
        }
    }

    /// Interpret big-endian bytes (leading zeros allowed)
    pub fn from_be_bytes(bytes: &[u8]) -> Self {
        Quantity(BigUint::from_bytes_be(bytes))
    }

    /// Canonical wire form (`0x0`, `0x1f`, ...)
    pub fn to_hex(&self) -> String {
        encode_quantity(self)
    }

    /// Parse the canonical wire form
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        decode_quantity(s)
    }

    /// `self - other`, or `None` if it would go below zero
    pub fn checked_sub(&self, other: &Quantity) -> Option<Quantity> {
        if self.0 < other.0 {
            None
        } else {
            Some(Quantity(&self.0 - &other.0))
        }
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Quantity {
                fn from(value: $t) -> Self {
                    Quantity(BigUint::from(value))
                }
            }
        )*
    };
}

impl_from_unsigned!(u8, u16, u32, u64, u128, usize);

impl From<BigUint> for Quantity {
    fn from(value: BigUint) -> Self {
        Quantity(value)
    }
}

impl From<Quantity> for BigUint {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl TryFrom<BigInt> for Quantity {
    type Error = CodecError;

    fn try_from(value: BigInt) -> Result<Self, Self::Error> {
        value
            .to_biguint()
            .map(Quantity)
            .ok_or_else(|| CodecError::NegativeQuantity(value.to_string()))
    }
}

impl TryFrom<i64> for Quantity {
    type Error = CodecError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quantity::try_from(BigInt::from(value))
    }
}

impl TryFrom<i128> for Quantity {
    type Error = CodecError;

    fn try_from(value: i128) -> Result<Self, Self::Error> {
        Quantity::try_from(BigInt::from(value))
    }
}

impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0 + rhs.0)
    }
}

impl Add<u64> for Quantity {
    type Output = Quantity;

    fn add(self, rhs: u64) -> Quantity {
        Quantity(self.0 + rhs)
    }
}

impl Add<u64> for &Quantity {
    type Output = Quantity;

    fn add(self, rhs: u64) -> Quantity {
        Quantity(&self.0 + rhs)
    }
}

impl FromStr for Quantity {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_quantity(s)
    }
}

impl fmt::Debug for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Quantity({})", self.to_hex())
    }
}

/// Decimal rendering
impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_quantity(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "rlp")]
mod rlp_impl {
    use super::*;
    use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

    impl Encodable for Quantity {
        fn rlp_append(&self, s: &mut RlpStream) {
            s.encoder().encode_value(&self.to_be_bytes());
        }
    }

    impl Decodable for Quantity {
        fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
            rlp.decoder().decode_value(|bytes| {
                if bytes.first() == Some(&0) {
                    return Err(DecoderError::RlpInvalidIndirection);
                }
                Ok(Quantity::from_be_bytes(bytes))
            })
        }
    }
}
