//! Block references for state reads and filter ranges

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::decode_quantity;
use crate::{CodecError, Quantity};

/// Which chain state a read (or a filter bound) applies to
///
/// Equality is structural: `Number(0)` and `Earliest` are different variants even
/// though most nodes resolve both to the genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum BlockReference {
    /// Genesis block
    Earliest,
    /// Most recent mined block
    #[default]
    Latest,
    /// Pending state, including not-yet-mined transactions
    Pending,
    /// Explicit block number
    Number(Quantity),
}

impl BlockReference {
    /// Wire form: the lowercase tag, or the block number as a quantity
    pub fn serialize(&self) -> String {
        match self {
            BlockReference::Earliest => "earliest".to_string(),
            BlockReference::Latest => "latest".to_string(),
            BlockReference::Pending => "pending".to_string(),
            BlockReference::Number(n) => n.to_hex(),
        }
    }

    /// Explicit block number, if this is one
    pub fn as_number(&self) -> Option<&Quantity> {
        match self {
            BlockReference::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl From<u64> for BlockReference {
    fn from(number: u64) -> Self {
        BlockReference::Number(Quantity::from(number))
    }
}

impl From<Quantity> for BlockReference {
    fn from(number: Quantity) -> Self {
        BlockReference::Number(number)
    }
}

impl FromStr for BlockReference {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earliest" => Ok(BlockReference::Earliest),
            "latest" => Ok(BlockReference::Latest),
            "pending" => Ok(BlockReference::Pending),
            _ if s.starts_with("0x") => decode_quantity(s).map(BlockReference::Number),
            _ => Err(CodecError::InvalidBlockTag(s.to_string())),
        }
    }
}

impl fmt::Display for BlockReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BlockReference::serialize(self))
    }
}

impl Serialize for BlockReference {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BlockReference::serialize(self))
    }
}

impl<'de> Deserialize<'de> for BlockReference {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_serialize_lowercase() {
        assert_eq!(BlockReference::Earliest.serialize(), "earliest");
        assert_eq!(BlockReference::Latest.serialize(), "latest");
        assert_eq!(BlockReference::Pending.serialize(), "pending");
    }

    #[test]
    fn test_number_serializes_as_quantity() {
        assert_eq!(BlockReference::from(0).serialize(), "0x0");
        assert_eq!(BlockReference::from(100).serialize(), "0x64");
    }

    #[test]
    fn test_genesis_number_is_not_earliest() {
        let genesis = BlockReference::from(0);
        assert_ne!(genesis, BlockReference::Earliest);
        assert_ne!(genesis.serialize(), BlockReference::Earliest.serialize());
    }

    #[test]
    fn test_parse() {
        assert_eq!("pending".parse::<BlockReference>().unwrap(), BlockReference::Pending);
        assert_eq!("0x10".parse::<BlockReference>().unwrap(), BlockReference::from(16));
        assert!("LATEST".parse::<BlockReference>().is_err());
        assert!("safe".parse::<BlockReference>().is_err());
        assert!("0x010".parse::<BlockReference>().is_err());
    }

    #[test]
    fn test_serde_json() {
        let json = serde_json::to_value(BlockReference::from(255)).unwrap();
        assert_eq!(json, serde_json::json!("0xff"));
        let back: BlockReference = serde_json::from_value(json).unwrap();
        assert_eq!(back, BlockReference::from(255));
    }

    #[test]
    fn test_default_is_latest() {
        assert_eq!(BlockReference::default(), BlockReference::Latest);
    }
}
