//! Recoverable secp256k1 signatures

use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};
use nodelink_primitives::{Address, H256};

use crate::{keccak256, CryptoError};

/// Secret signing key (32 bytes)
pub type PrivateKey = SigningKey;

/// Public verification key
pub type PublicKey = VerifyingKey;

/// ECDSA signature plus the parity bit needed to recover the signer
///
/// `recovery_id` is the raw 0/1 parity. Callers that need the legacy 27/28 or
/// an EIP-155 `v` derive it themselves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// r component (32 bytes, big-endian)
    pub r: [u8; 32],
    /// s component (32 bytes, big-endian, always in the lower half of the curve order)
    pub s: [u8; 32],
    /// y-parity of the ephemeral point (0 or 1)
    pub recovery_id: u8,
}

impl RecoverableSignature {
    /// 65-byte `r || s || v` form with `v` in {27, 28}
    pub fn to_rsv_bytes(&self) -> Result<[u8; 65], CryptoError> {
        if self.recovery_id > 1 {
            return Err(CryptoError::InvalidRecoveryId(self.recovery_id));
        }
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.recovery_id + 27;
        Ok(bytes)
    }

    /// Check that s is in the lower half of the curve order
    pub fn is_low_s(&self) -> bool {
        match self.to_k256() {
            Ok(sig) => sig.normalize_s().is_none(),
            Err(_) => false,
        }
    }

    fn to_k256(&self) -> Result<K256Signature, CryptoError> {
        let r: k256::FieldBytes = self.r.into();
        let s: k256::FieldBytes = self.s.into();
        K256Signature::from_scalars(r, s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// Sign a 32-byte digest, normalising to low-s
pub fn sign_prehash(
    digest: &H256,
    private_key: &PrivateKey,
) -> Result<RecoverableSignature, CryptoError> {
    let (mut signature, mut recovery_id) = private_key
        .sign_prehash_recoverable(digest.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    // s -> n - s mirrors R, so the parity flips with it
    if let Some(normalized) = signature.normalize_s() {
        signature = normalized;
        recovery_id = RecoveryId::new(!recovery_id.is_y_odd(), recovery_id.is_x_reduced());
    }

    Ok(RecoverableSignature {
        r: signature.r().to_bytes().into(),
        s: signature.s().to_bytes().into(),
        recovery_id: recovery_id.to_byte() & 1,
    })
}

/// Verify a signature against a digest and public key; high-s is rejected
pub fn verify(
    digest: &H256,
    signature: &RecoverableSignature,
    public_key: &PublicKey,
) -> Result<bool, CryptoError> {
    use k256::ecdsa::signature::hazmat::PrehashVerifier;

    if !signature.is_low_s() {
        return Ok(false);
    }
    let sig = signature.to_k256()?;
    Ok(public_key.verify_prehash(digest.as_bytes(), &sig).is_ok())
}

/// Recover the public key that produced `signature` over `digest`
pub fn recover_public_key(
    digest: &H256,
    signature: &RecoverableSignature,
) -> Result<PublicKey, CryptoError> {
    let sig = signature.to_k256()?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id)
        .ok_or(CryptoError::InvalidRecoveryId(signature.recovery_id))?;

    VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer's address
pub fn recover_address(
    digest: &H256,
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    recover_public_key(digest, signature).map(|key| public_key_to_address(&key))
}

/// Address = last 20 bytes of keccak256(uncompressed public key without the 0x04 tag)
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::random(&mut OsRng);
        let digest = keccak256(b"test message");

        let signature = sign_prehash(&digest, &key).unwrap();
        assert!(signature.is_low_s());
        assert!(signature.recovery_id <= 1);
        assert!(verify(&digest, &signature, key.verifying_key()).unwrap());
    }

    #[test]
    fn test_recover_public_key() {
        let key = SigningKey::random(&mut OsRng);
        let digest = keccak256(b"test message");

        let signature = sign_prehash(&digest, &key).unwrap();
        let recovered = recover_public_key(&digest, &signature).unwrap();
        assert_eq!(key.verifying_key(), &recovered);
    }

    #[test]
    fn test_low_s_for_many_keys() {
        for _ in 0..16 {
            let key = SigningKey::random(&mut OsRng);
            let signature = sign_prehash(&keccak256(b"test"), &key).unwrap();
            assert!(signature.is_low_s());
            assert_eq!(
                recover_address(&keccak256(b"test"), &signature).unwrap(),
                public_key_to_address(key.verifying_key())
            );
        }
    }

    #[test]
    fn test_reject_high_s() {
        let key = SigningKey::random(&mut OsRng);
        let digest = keccak256(b"test");
        let mut signature = sign_prehash(&digest, &key).unwrap();
        signature.s = [0x7F; 32];
        signature.s[0] = 0xFE;
        assert!(!verify(&digest, &signature, key.verifying_key()).unwrap());
    }

    #[test]
    fn test_invalid_recovery_id() {
        let key = SigningKey::random(&mut OsRng);
        let digest = keccak256(b"test");
        let mut signature = sign_prehash(&digest, &key).unwrap();
        signature.recovery_id = 9;
        assert!(matches!(
            recover_public_key(&digest, &signature),
            Err(CryptoError::InvalidRecoveryId(9))
        ));
    }

    #[test]
    fn test_rsv_bytes() {
        let key = SigningKey::random(&mut OsRng);
        let signature = sign_prehash(&keccak256(b"x"), &key).unwrap();
        let bytes = signature.to_rsv_bytes().unwrap();
        assert_eq!(&bytes[..32], &signature.r);
        assert!(bytes[64] == 27 || bytes[64] == 28);
    }

    #[test]
    fn test_rsv_bytes_rejects_out_of_range_parity() {
        let key = SigningKey::random(&mut OsRng);
        let mut signature = sign_prehash(&keccak256(b"x"), &key).unwrap();
        for bad in [2u8, 229, u8::MAX] {
            signature.recovery_id = bad;
            assert!(matches!(
                signature.to_rsv_bytes(),
                Err(CryptoError::InvalidRecoveryId(id)) if id == bad
            ));
        }
    }
}
