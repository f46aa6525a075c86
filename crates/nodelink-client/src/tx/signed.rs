//! EIP-155 signed legacy transactions

use bytes::Bytes;
use nodelink_crypto::{keccak256, recover_address, RecoverableSignature};
use nodelink_primitives::{Address, ByteData, Quantity, H256};
use rlp::{Rlp, RlpStream};

use super::{RawTransaction, Signer};
use crate::ClientError;

/// Signed transaction with its canonical encoding and hash
///
/// Immutable: the encoding and hash are computed once at signing time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    raw: RawTransaction,
    chain_id: u64,
    v: u64,
    signature: RecoverableSignature,
    encoded: Bytes,
    hash: H256,
}

/// Sign `raw` for `chain_id`; the request itself is left untouched
pub fn sign_transaction(
    raw: &RawTransaction,
    chain_id: u64,
    signer: &dyn Signer,
) -> Result<SignedTransaction, ClientError> {
    if chain_id == 0 {
        return Err(ClientError::InvalidChainId(
            "chain id 0 gives no replay protection".to_string(),
        ));
    }
    let digest = signing_hash(raw, chain_id);
    let signature = signer.sign_hash(&digest)?;
    SignedTransaction::assemble(raw.clone(), chain_id, signature)
}

/// keccak256(rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0]))
pub(crate) fn signing_hash(raw: &RawTransaction, chain_id: u64) -> H256 {
    let mut stream = RlpStream::new_list(9);
    append_fields(&mut stream, raw);
    stream.append(&chain_id);
    stream.append(&0u8);
    stream.append(&0u8);
    keccak256(&stream.out())
}

fn append_fields(stream: &mut RlpStream, raw: &RawTransaction) {
    stream.append(&raw.nonce);
    stream.append(&raw.gas_price);
    stream.append(&raw.gas_limit);
    match &raw.to {
        Some(to) => stream.append(to),
        None => stream.append_empty_data(),
    };
    stream.append(&raw.value);
    stream.append(&raw.data);
}

fn eip155_v(recovery_id: u8, chain_id: u64) -> Result<u64, ClientError> {
    if recovery_id > 1 {
        return Err(ClientError::Signing(format!("recovery id {recovery_id} is not a parity bit")));
    }
    chain_id
        .checked_mul(2)
        .and_then(|v| v.checked_add(35 + u64::from(recovery_id)))
        .ok_or_else(|| ClientError::InvalidChainId(format!("{chain_id} overflows v")))
}

fn word(value: &Quantity) -> Result<[u8; 32], ClientError> {
    let bytes = value.to_be_bytes();
    if bytes.len() > 32 {
        return Err(ClientError::Decode(format!("{value:x} is wider than 32 bytes")));
    }
    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

impl SignedTransaction {
    fn assemble(
        raw: RawTransaction,
        chain_id: u64,
        signature: RecoverableSignature,
    ) -> Result<Self, ClientError> {
        let v = eip155_v(signature.recovery_id, chain_id)?;

        let mut stream = RlpStream::new_list(9);
        append_fields(&mut stream, &raw);
        stream.append(&v);
        stream.append(&Quantity::from_be_bytes(&signature.r));
        stream.append(&Quantity::from_be_bytes(&signature.s));
        let encoded = stream.out().freeze();
        let hash = keccak256(&encoded);

        Ok(Self {
            raw,
            chain_id,
            v,
            signature,
            encoded,
            hash,
        })
    }

    /// Parse a raw EIP-155 transaction (as sent to `eth_sendRawTransaction`)
    pub fn decode(bytes: &[u8]) -> Result<Self, ClientError> {
        let rlp = Rlp::new(bytes);
        let decode = |e: rlp::DecoderError| ClientError::Decode(format!("transaction rlp: {e}"));

        if !rlp.is_list() || rlp.item_count().map_err(decode)? != 9 {
            return Err(ClientError::Decode(
                "transaction rlp: expected a 9-item list".to_string(),
            ));
        }

        let to_item = rlp.at(3).map_err(decode)?;
        let to = if to_item.is_empty() {
            None
        } else {
            Some(to_item.as_val::<Address>().map_err(decode)?)
        };

        let raw = RawTransaction {
            nonce: rlp.val_at(0).map_err(decode)?,
            gas_price: rlp.val_at(1).map_err(decode)?,
            gas_limit: rlp.val_at(2).map_err(decode)?,
            to,
            value: rlp.val_at(4).map_err(decode)?,
            data: rlp.val_at::<ByteData>(5).map_err(decode)?,
        };

        let v: u64 = rlp.val_at(6).map_err(decode)?;
        if v < 35 {
            return Err(ClientError::InvalidChainId(format!(
                "v = {v} carries no chain id"
            )));
        }
        let chain_id = (v - 35) / 2;
        let signature = RecoverableSignature {
            r: word(&rlp.val_at::<Quantity>(7).map_err(decode)?)?,
            s: word(&rlp.val_at::<Quantity>(8).map_err(decode)?)?,
            recovery_id: ((v - 35) % 2) as u8,
        };

        let decoded = Self::assemble(raw, chain_id, signature)?;
        if decoded.encoded.as_ref() != bytes {
            return Err(ClientError::Decode(
                "transaction rlp is not canonical".to_string(),
            ));
        }
        Ok(decoded)
    }

    /// The unsigned fields
    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    /// Chain id bound into the signature
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// EIP-155 `v` = recovery id + chain id * 2 + 35
    pub fn v(&self) -> u64 {
        self.v
    }

    /// Signature r
    pub fn r(&self) -> &[u8; 32] {
        &self.signature.r
    }

    /// Signature s (low-s)
    pub fn s(&self) -> &[u8; 32] {
        &self.signature.s
    }

    /// Canonical RLP encoding
    pub fn encoded(&self) -> &Bytes {
        &self.encoded
    }

    /// `0x`-hex of the encoding
    pub fn raw_hex(&self) -> String {
        nodelink_primitives::codec::encode_data(&self.encoded)
    }

    /// keccak256 of the encoding
    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Recover the sender from the signature
    pub fn sender(&self) -> Result<Address, ClientError> {
        let digest = signing_hash(&self.raw, self.chain_id);
        Ok(recover_address(&digest, &self.signature)?)
    }
}
