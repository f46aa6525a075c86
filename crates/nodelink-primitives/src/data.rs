//! Opaque byte strings (code, call data, signatures, proofs)

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{decode_data, encode_data};
use crate::CodecError;

/// Byte string carried on the wire as `0x`-prefixed even-length hex
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteData(Bytes);

impl ByteData {
    /// Empty data (`0x`)
    pub fn new() -> Self {
        ByteData(Bytes::new())
    }

    /// Wire form
    pub fn to_hex(&self) -> String {
        encode_data(&self.0)
    }

    /// Parse the wire form
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        decode_data(s).map(ByteData)
    }

    /// Underlying buffer
    pub fn bytes(&self) -> &Bytes {
        &self.0
    }

    /// Unwrap into the underlying buffer
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for ByteData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for ByteData {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for ByteData {
    fn from(bytes: Bytes) -> Self {
        ByteData(bytes)
    }
}

impl From<Vec<u8>> for ByteData {
    fn from(bytes: Vec<u8>) -> Self {
        ByteData(Bytes::from(bytes))
    }
}

impl From<&[u8]> for ByteData {
    fn from(bytes: &[u8]) -> Self {
        ByteData(Bytes::copy_from_slice(bytes))
    }
}

impl From<ByteData> for Bytes {
    fn from(data: ByteData) -> Self {
        data.0
    }
}

impl FromStr for ByteData {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ByteData::from_hex(s)
    }
}

impl fmt::Debug for ByteData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteData({})", self.to_hex())
    }
}

impl fmt::Display for ByteData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for ByteData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ByteData {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ByteData::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "rlp")]
mod rlp_impl {
    use super::*;
    use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

    impl Encodable for ByteData {
        fn rlp_append(&self, s: &mut RlpStream) {
            s.encoder().encode_value(&self.0);
        }
    }

    impl Decodable for ByteData {
        fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
            rlp.decoder()
                .decode_value(|bytes| Ok(ByteData::from(bytes)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_data() {
        let data = ByteData::new();
        assert!(data.is_empty());
        assert_eq!(data.to_hex(), "0x");
        assert_eq!(ByteData::from_hex("0x").unwrap(), data);
    }

    #[test]
    fn test_deref_and_conversions() {
        let data = ByteData::from(vec![0xde, 0xad]);
        assert_eq!(data.len(), 2);
        assert_eq!(&data[..], &[0xde, 0xad]);
        let bytes: Bytes = data.clone().into();
        assert_eq!(bytes.as_ref(), &[0xde, 0xad]);
        assert_eq!(data.to_string(), "0xdead");
    }

    #[test]
    fn test_serde() {
        let data: ByteData = serde_json::from_str("\"0x6080\"").unwrap();
        assert_eq!(&data[..], &[0x60, 0x80]);
        assert_eq!(serde_json::to_string(&data).unwrap(), "\"0x6080\"");
        assert!(serde_json::from_str::<ByteData>("\"0x608\"").is_err());
        assert!(serde_json::from_str::<ByteData>("\"6080\"").is_err());
    }
}
