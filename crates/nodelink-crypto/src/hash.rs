//! Keccak-256 hashing

use nodelink_primitives::H256;
use sha3::{Digest, Keccak256};

/// Compute Keccak-256 hash of the input data
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    H256::from_bytes(hasher.finalize().into())
}

/// Hash a message the way `eth_sign` / `personal_sign` do
///
/// keccak256("\x19Ethereum Signed Message:\n" ++ len(message) ++ message)
pub fn hash_message(message: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    H256::from_bytes(hasher.finalize().into())
}
