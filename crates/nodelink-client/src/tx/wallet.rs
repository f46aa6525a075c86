//! The signing capability and an in-memory key holder

use k256::ecdsa::SigningKey;
use nodelink_crypto::{
    hash_message, public_key_to_address, sign_prehash, PrivateKey, PublicKey,
    RecoverableSignature,
};
use nodelink_primitives::{Address, H256};
use rand::rngs::OsRng;
use zeroize::Zeroize;

use crate::ClientError;

/// Something that can produce recoverable signatures for one account
///
/// Implement this for hardware wallets, remote signers or keystores; the lifecycle
/// only ever hands it 32-byte digests.
pub trait Signer: Send + Sync {
    /// Account whose key produces the signatures
    fn address(&self) -> Address;

    /// Sign a 32-byte digest
    fn sign_hash(&self, hash: &H256) -> Result<RecoverableSignature, ClientError>;
}

/// Wallet holding a private key in memory
///
/// Clone is not implemented; build a second wallet from the same key if needed.
pub struct Wallet {
    private_key: PrivateKey,
    address: Address,
}

impl Wallet {
    /// Create a new random wallet
    pub fn new_random() -> Self {
        Self::from_signing_key(SigningKey::random(&mut OsRng))
    }

    fn from_signing_key(private_key: PrivateKey) -> Self {
        let address = public_key_to_address(private_key.verifying_key());
        Self {
            private_key,
            address,
        }
    }

    /// Create a wallet from a 32-byte private key
    pub fn from_private_key(key: &[u8; 32]) -> Result<Self, ClientError> {
        let private_key = SigningKey::from_slice(key)
            .map_err(|e| ClientError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self::from_signing_key(private_key))
    }

    /// Create a wallet from a hex-encoded private key, with or without `0x`
    pub fn from_private_key_hex(hex: &str) -> Result<Self, ClientError> {
        let hex = hex.strip_prefix("0x").unwrap_or(hex);
        let mut bytes = hex::decode(hex)?;
        if bytes.len() != 32 {
            let len = bytes.len();
            bytes.zeroize();
            return Err(ClientError::InvalidPrivateKey(format!(
                "expected 32 bytes, got {len}"
            )));
        }

        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes);
        bytes.zeroize();

        let result = Self::from_private_key(&key);
        key.zeroize();
        result
    }

    /// Get the wallet's address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Get the wallet's public key
    pub fn public_key(&self) -> &PublicKey {
        self.private_key.verifying_key()
    }

    /// Sign a 32-byte digest
    pub fn sign_hash(&self, hash: &H256) -> Result<RecoverableSignature, ClientError> {
        Ok(sign_prehash(hash, &self.private_key)?)
    }

    /// Sign with the `\x19Ethereum Signed Message:\n{len}` prefix
    pub fn sign_message(&self, message: &[u8]) -> Result<RecoverableSignature, ClientError> {
        self.sign_hash(&hash_message(message))
    }
}

impl Signer for Wallet {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_hash(&self, hash: &H256) -> Result<RecoverableSignature, ClientError> {
        Wallet::sign_hash(self, hash)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodelink_crypto::{keccak256, recover_address};

    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const DEV_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

    #[test]
    fn test_wallet_random() {
        assert_ne!(Wallet::new_random().address(), Address::ZERO);
    }

    #[test]
    fn test_wallet_from_hex() {
        let wallet = Wallet::from_private_key_hex(DEV_KEY).unwrap();
        assert_eq!(wallet.address().to_hex(), DEV_ADDRESS);

        let bare = Wallet::from_private_key_hex(&DEV_KEY[2..]).unwrap();
        assert_eq!(bare.address(), wallet.address());
    }

    #[test]
    fn test_wallet_rejects_bad_keys() {
        assert!(matches!(
            Wallet::from_private_key_hex("0x1234"),
            Err(ClientError::InvalidPrivateKey(_))
        ));
        assert!(Wallet::from_private_key(&[0u8; 32]).is_err());
        assert!(Wallet::from_private_key_hex("0xzz").is_err());
    }

    #[test]
    fn test_signer_recovers_to_address() {
        let wallet = Wallet::from_private_key_hex(DEV_KEY).unwrap();
        let signer: &dyn Signer = &wallet;
        let digest = keccak256(b"hello");
        let signature = signer.sign_hash(&digest).unwrap();
        assert_eq!(recover_address(&digest, &signature).unwrap(), signer.address());
    }

    #[test]
    fn test_sign_message_uses_prefix() {
        let wallet = Wallet::new_random();
        let signature = wallet.sign_message(b"Apples").unwrap();
        assert_eq!(
            recover_address(&hash_message(b"Apples"), &signature).unwrap(),
            wallet.address()
        );
    }

    #[test]
    fn test_debug_hides_key() {
        let wallet = Wallet::from_private_key_hex(DEV_KEY).unwrap();
        let debug = format!("{wallet:?}");
        assert!(!debug.contains("ac0974"));
    }
}
