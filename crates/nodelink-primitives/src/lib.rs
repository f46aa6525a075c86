//! # nodelink-primitives
//!
//! Wire-level value types for talking to a node over JSON-RPC.
//!
//! - [`Quantity`] - arbitrary-precision non-negative integer (`0x`-hex, no leading zeros)
//! - [`ByteData`] - opaque byte string (`0x`-hex, even length)
//! - [`Address`], [`H256`] - fixed-length byte strings
//! - [`BlockReference`] - earliest / latest / pending / explicit number
//! - [`codec`] - the encode/decode functions behind all of the above

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod block;
pub mod codec;
mod data;
mod error;
mod hash;
mod quantity;

pub use address::Address;
pub use block::BlockReference;
pub use data::ByteData;
pub use error::CodecError;
pub use hash::H256;
pub use quantity::Quantity;

// Re-export so downstream crates share one bignum type
pub use num_bigint::BigUint;
