//! # nodelink-crypto
//!
//! The signing capability behind transaction submission.
//!
//! - Keccak-256 hashing (plus the personal-message prefix)
//! - Recoverable ECDSA signing over secp256k1, low-s normalised
//! - Public key recovery and address derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{hash_message, keccak256};
pub use signature::{
    public_key_to_address, recover_address, recover_public_key, sign_prehash, verify, PrivateKey,
    PublicKey, RecoverableSignature,
};
