//! Codec property tests
//!
//! Round trips must be exact for every value, including ones far beyond 64 bits.

use nodelink_primitives::codec::{decode_data, decode_quantity, encode_data, encode_quantity};
use nodelink_primitives::{BigUint, BlockReference, ByteData, Quantity};
use proptest::prelude::*;

proptest! {
    #[test]
    fn quantity_roundtrip_u128(n in any::<u128>()) {
        let q = Quantity::from(n);
        let wire = encode_quantity(&q);
        prop_assert_eq!(decode_quantity(&wire).unwrap(), q);
    }

    #[test]
    fn quantity_roundtrip_wide(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        let q = Quantity::from(BigUint::from_bytes_be(&bytes));
        let wire = encode_quantity(&q);
        prop_assert_eq!(decode_quantity(&wire).unwrap(), q);
    }

    #[test]
    fn quantity_has_no_leading_zeros(n in any::<u128>()) {
        let wire = encode_quantity(&Quantity::from(n));
        let digits = wire.strip_prefix("0x").unwrap();
        prop_assert!(!digits.is_empty());
        prop_assert!(n == 0 || !digits.starts_with('0'));
        prop_assert_eq!(digits.to_lowercase(), digits);
    }

    #[test]
    fn data_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let wire = encode_data(&bytes);
        let decoded = decode_data(&wire).unwrap();
        prop_assert_eq!(&decoded[..], &bytes[..]);
    }

    #[test]
    fn block_number_wire_form_is_quantity(n in any::<u64>()) {
        let r = BlockReference::from(n);
        prop_assert_eq!(r.serialize(), encode_quantity(&Quantity::from(n)));
    }
}

#[test]
fn zero_encodes_as_single_digit() {
    assert_eq!(encode_quantity(&Quantity::zero()), "0x0");
    assert_eq!(decode_quantity("0x0").unwrap(), Quantity::zero());
}

#[test]
fn empty_data_encodes_as_bare_prefix() {
    assert_eq!(encode_data(&[]), "0x");
    assert_eq!(ByteData::from_hex("0x").unwrap(), ByteData::new());
}

#[test]
fn balance_beyond_u256_survives() {
    // 2^300, wider than any fixed-width machine type
    let wire = format!("0x1{}", "0".repeat(75));
    let q = decode_quantity(&wire).unwrap();
    assert_eq!(q.as_biguint().bits(), 301);
    assert_eq!(encode_quantity(&q), wire);
}

#[test]
fn genesis_number_and_earliest_are_distinct_on_the_wire() {
    assert_eq!(BlockReference::from(0).serialize(), "0x0");
    assert_eq!(BlockReference::Earliest.serialize(), "earliest");
    assert_ne!(BlockReference::from(0), BlockReference::Earliest);
}
