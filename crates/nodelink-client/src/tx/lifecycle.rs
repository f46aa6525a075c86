//! Nonce, broadcast and receipt confirmation

use std::time::Duration;

use nodelink_primitives::{Address, BlockReference, Quantity, H256};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::{sign_transaction, RawTransaction, SignedTransaction, Signer, TxBuilder};
use crate::client::NodeClient;
use crate::types::{CallRequest, TransactionReceipt};
use crate::ClientError;

/// How long to wait for a receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptPolicy {
    /// Sleep between lookups
    pub poll_interval: Duration,
    /// Lookups before giving up (at least 1)
    pub max_attempts: u32,
    /// Optional wall-clock cap, checked before each sleep
    pub deadline: Option<Duration>,
}

impl ReceiptPolicy {
    /// Poll every `poll_interval`, at most `max_attempts` times
    pub fn new(poll_interval: Duration, max_attempts: u32) -> Self {
        Self {
            poll_interval,
            max_attempts: max_attempts.max(1),
            deadline: None,
        }
    }

    /// Also stop once `deadline` has elapsed
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl Default for ReceiptPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 40)
    }
}

/// Where a transaction is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Built, not signed
    Unsigned,
    /// Signed, not sent
    Signed,
    /// Accepted by the node, no receipt yet
    Broadcast,
    /// Receipt polling gave up but the node still knows the transaction
    Pending,
    /// Receipt seen
    Confirmed,
    /// Receipt polling gave up and the node no longer knows the transaction
    Dropped,
}

/// A transaction and what is known about it, from unsigned to settled
#[derive(Debug, Clone)]
pub struct TrackedTransaction {
    raw: RawTransaction,
    signed: Option<SignedTransaction>,
    hash: Option<H256>,
    state: TxState,
    receipt: Option<TransactionReceipt>,
}

impl TrackedTransaction {
    /// Start tracking a transaction that is not signed yet
    pub fn new(raw: RawTransaction) -> Self {
        Self {
            raw,
            signed: None,
            hash: None,
            state: TxState::Unsigned,
            receipt: None,
        }
    }

    /// Unsigned fields
    pub fn raw(&self) -> &RawTransaction {
        &self.raw
    }

    /// Local hash once signed; the node's hash once broadcast
    pub fn hash(&self) -> Option<H256> {
        self.hash
    }

    /// Current state
    pub fn state(&self) -> TxState {
        self.state
    }

    /// The signed transaction, once signed
    pub fn signed(&self) -> Option<&SignedTransaction> {
        self.signed.as_ref()
    }

    /// Receipt, once confirmed
    pub fn receipt(&self) -> Option<&TransactionReceipt> {
        self.receipt.as_ref()
    }
}

/// Result of re-checking a receipt against the current chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Still in the same block, `depth` blocks deep (1 = head)
    Confirmed {
        /// Blocks on top of and including the receipt's block
        depth: Quantity,
    },
    /// Now included in a different block
    Reorged {
        /// Block hash in the receipt we had
        previous: H256,
        /// Block hash the node reports now
        current: H256,
    },
    /// The node no longer has a receipt
    Removed,
}

/// Drives transactions from signing to confirmation against one node
///
/// Nonces are read, not reserved: two managers (or two tasks) sending from the same
/// account at once can pick the same nonce, and the node will reject one of them.
#[derive(Debug, Clone)]
pub struct TransactionManager {
    client: NodeClient,
    policy: ReceiptPolicy,
}

impl TransactionManager {
    /// Manager with the default receipt policy
    pub fn new(client: NodeClient) -> Self {
        Self {
            client,
            policy: ReceiptPolicy::default(),
        }
    }

    /// Replace the receipt policy
    pub fn with_policy(mut self, policy: ReceiptPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Client in use
    pub fn client(&self) -> &NodeClient {
        &self.client
    }

    /// Receipt policy in use
    pub fn policy(&self) -> &ReceiptPolicy {
        &self.policy
    }

    /// Next nonce for `account`, counting pending transactions
    pub async fn next_nonce(&self, account: &Address) -> Result<Quantity, ClientError> {
        self.client
            .get_transaction_count(account, BlockReference::Pending)
            .await
    }

    /// Sign for the node's chain
    pub async fn sign(
        &self,
        raw: &RawTransaction,
        signer: &dyn Signer,
    ) -> Result<SignedTransaction, ClientError> {
        let chain_id = self.client.chain_id().await?;
        sign_transaction(raw, chain_id, signer)
    }

    /// Submit a signed transaction; returns the hash the node reports
    pub async fn broadcast(&self, signed: &SignedTransaction) -> Result<H256, ClientError> {
        let hash = match self.client.send_raw_transaction(signed.encoded()).await {
            Ok(hash) => hash,
            Err(ClientError::Rpc { code, message, .. }) => {
                warn!(local_hash = %signed.hash(), code, reason = %message, "transaction rejected");
                return Err(ClientError::SubmissionRejected {
                    code,
                    reason: message,
                });
            }
            Err(e) => return Err(e),
        };

        if hash != signed.hash() {
            warn!(local_hash = %signed.hash(), node_hash = %hash, "node reported a different transaction hash");
        }
        info!(%hash, nonce = %signed.raw().nonce, "transaction broadcast");
        Ok(hash)
    }

    /// Poll for a receipt until one appears or `policy` is exhausted
    ///
    /// Performs at most `policy.max_attempts` lookups and sleeps only between them.
    /// Lookup errors from the node are logged and count as an attempt; decode errors
    /// are returned at once. Dropping the future stops polling; it does not un-send
    /// anything.
    pub async fn await_receipt(
        &self,
        hash: &H256,
        policy: &ReceiptPolicy,
    ) -> Result<TransactionReceipt, ClientError> {
        let started = Instant::now();
        let max_attempts = policy.max_attempts.max(1);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.client.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    info!(%hash, block = %receipt.block_number, attempts, "transaction confirmed");
                    return Ok(receipt);
                }
                Ok(None) => debug!(%hash, attempts, "receipt not available yet"),
                Err(e @ (ClientError::Rpc { .. } | ClientError::Transport(_))) => {
                    warn!(%hash, attempts, error = %e, "receipt lookup failed");
                }
                Err(e) => return Err(e),
            }

            if attempts >= max_attempts {
                break;
            }
            if let Some(deadline) = policy.deadline {
                if started.elapsed() + policy.poll_interval > deadline {
                    break;
                }
            }
            sleep(policy.poll_interval).await;
        }

        Err(ClientError::ConfirmationTimeout {
            hash: *hash,
            attempts,
        })
    }

    /// Move an `Unsigned` transaction to `Signed`; later states are left alone
    pub async fn sign_tracked(
        &self,
        tracked: &mut TrackedTransaction,
        signer: &dyn Signer,
    ) -> Result<(), ClientError> {
        if tracked.state != TxState::Unsigned {
            return Ok(());
        }
        let signed = self.sign(&tracked.raw, signer).await?;
        tracked.hash = Some(signed.hash());
        tracked.signed = Some(signed);
        tracked.state = TxState::Signed;
        Ok(())
    }

    /// Broadcast a signed transaction and move it to `Broadcast`
    pub async fn broadcast_tracked(&self, tracked: &mut TrackedTransaction) -> Result<(), ClientError> {
        let signed = tracked
            .signed
            .as_ref()
            .ok_or(ClientError::MissingField("signature"))?;
        let hash = self.broadcast(signed).await?;
        tracked.hash = Some(hash);
        tracked.state = TxState::Broadcast;
        Ok(())
    }

    /// Sign and broadcast
    pub async fn submit(
        &self,
        raw: &RawTransaction,
        signer: &dyn Signer,
    ) -> Result<TrackedTransaction, ClientError> {
        let mut tracked = TrackedTransaction::new(raw.clone());
        self.sign_tracked(&mut tracked, signer).await?;
        self.broadcast_tracked(&mut tracked).await?;
        Ok(tracked)
    }

    /// Wait for a tracked transaction's receipt with the manager's policy
    ///
    /// On timeout the state becomes `Pending` or `Dropped` depending on whether the
    /// node still knows the hash, and the timeout error is returned.
    pub async fn confirm(&self, tracked: &mut TrackedTransaction) -> Result<(), ClientError> {
        let hash = match (tracked.state, tracked.hash) {
            (TxState::Unsigned | TxState::Signed, _) | (_, None) => {
                return Err(ClientError::MissingField("broadcast hash"))
            }
            (_, Some(hash)) => hash,
        };
        match self.await_receipt(&hash, &self.policy).await {
            Ok(receipt) => {
                tracked.receipt = Some(receipt);
                tracked.state = TxState::Confirmed;
                Ok(())
            }
            Err(timeout @ ClientError::ConfirmationTimeout { .. }) => {
                tracked.state = match self.client.get_transaction_by_hash(&hash).await {
                    Ok(None) => TxState::Dropped,
                    _ => TxState::Pending,
                };
                debug!(%hash, state = ?tracked.state, "receipt polling gave up");
                Err(timeout)
            }
            Err(e) => Err(e),
        }
    }

    /// Fill in what the builder lacks from the node, then sign, broadcast and confirm
    ///
    /// Nonce comes from `eth_getTransactionCount(.., "pending")`, gas price from
    /// `eth_gasPrice` and gas limit from `eth_estimateGas`.
    pub async fn send(
        &self,
        mut builder: TxBuilder,
        signer: &dyn Signer,
    ) -> Result<TrackedTransaction, ClientError> {
        let from = signer.address();
        if !builder.has_nonce() {
            builder = builder.nonce(self.next_nonce(&from).await?);
        }
        if !builder.has_gas_price() {
            builder = builder.gas_price(self.client.gas_price().await?);
        }
        if !builder.has_gas_limit() {
            let estimate = CallRequest {
                from: Some(from),
                to: builder.recipient(),
                value: Some(builder.call_value().clone()),
                data: Some(builder.call_data().clone()),
                ..Default::default()
            };
            builder = builder.gas_limit(self.client.estimate_gas(&estimate).await?);
        }

        let raw = builder.build()?;
        let mut tracked = self.submit(&raw, signer).await?;
        self.confirm(&mut tracked).await?;
        Ok(tracked)
    }

    /// Re-read a receipt to see whether it survived reorganisations
    pub async fn confirmations(
        &self,
        receipt: &TransactionReceipt,
    ) -> Result<Confirmation, ClientError> {
        let current = match self
            .client
            .get_transaction_receipt(&receipt.transaction_hash)
            .await?
        {
            Some(current) => current,
            None => return Ok(Confirmation::Removed),
        };

        if current.block_hash != receipt.block_hash {
            return Ok(Confirmation::Reorged {
                previous: receipt.block_hash,
                current: current.block_hash,
            });
        }

        let head = self.client.block_number().await?;
        let depth = head
            .checked_sub(&current.block_number)
            .map(|d| d + 1u64)
            .unwrap_or_else(Quantity::zero);
        Ok(Confirmation::Confirmed { depth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::tx::Wallet;
    use serde_json::{json, Value};

    const HASH: &str = "0x5e5f3ad6e5d17c9b2ab8e4ff1b4c1a8a2f8c7d6e5f4a3b2c1d0e9f8a7b6c5d4e";
    const BLOCK_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const BLOCK_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn receipt(block_hash: &str, block_number: &str) -> Value {
        json!({
            "transactionHash": HASH,
            "transactionIndex": "0x0",
            "blockHash": block_hash,
            "blockNumber": block_number,
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "logs": [],
            "status": "0x1"
        })
    }

    fn manager() -> (MockTransport, TransactionManager) {
        let mock = MockTransport::new();
        let client = NodeClient::with_transport(mock.clone()).with_chain_id(1337);
        (mock, TransactionManager::new(client))
    }

    #[test]
    fn test_policy_min_one_attempt() {
        assert_eq!(ReceiptPolicy::new(Duration::from_millis(1), 0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_next_nonce_reads_pending() {
        let (mock, manager) = manager();
        mock.set_response("eth_getTransactionCount", json!("0x7"));
        let nonce = manager.next_nonce(&Address::ZERO).await.unwrap();
        assert_eq!(nonce, Quantity::from(7u64));
        assert_eq!(mock.calls()[0].params[1], json!("pending"));
    }

    #[tokio::test]
    async fn test_broadcast_rejection() {
        let (mock, manager) = manager();
        mock.set_error("eth_sendRawTransaction", -32000, "nonce too low");
        let wallet = Wallet::new_random();
        let raw = RawTransaction::transfer(0u64, 1u64, 21_000u64, Address::ZERO, 0u64);
        let signed = manager.sign(&raw, &wallet).await.unwrap();

        match manager.broadcast(&signed).await {
            Err(ClientError::SubmissionRejected { code, reason }) => {
                assert_eq!(code, -32000);
                assert_eq!(reason, "nonce too low");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broadcast_sends_encoding() {
        let (mock, manager) = manager();
        let wallet = Wallet::new_random();
        let raw = RawTransaction::transfer(0u64, 1u64, 21_000u64, Address::ZERO, 0u64);
        let signed = manager.sign(&raw, &wallet).await.unwrap();
        mock.set_response("eth_sendRawTransaction", json!(signed.hash().to_hex()));

        let hash = manager.broadcast(&signed).await.unwrap();
        assert_eq!(hash, signed.hash());
        assert_eq!(mock.calls().last().unwrap().params[0], json!(signed.raw_hex()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_are_retried() {
        let (mock, manager) = manager();
        mock.push_error("eth_getTransactionReceipt", -32000, "header not found");
        mock.push_transport_failure("eth_getTransactionReceipt", "connection reset");
        mock.push_response("eth_getTransactionReceipt", receipt(BLOCK_A, "0x10"));

        let hash = H256::from_hex(HASH).unwrap();
        let found = manager
            .await_receipt(&hash, &ReceiptPolicy::new(Duration::from_secs(1), 5))
            .await
            .unwrap();
        assert_eq!(found.transaction_hash, hash);
        assert_eq!(mock.call_count("eth_getTransactionReceipt"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_error_is_not_retried() {
        let (mock, manager) = manager();
        mock.set_response("eth_getTransactionReceipt", json!({"bogus": true}));
        let err = manager
            .await_receipt(&H256::ZERO, &ReceiptPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
        assert_eq!(mock.call_count("eth_getTransactionReceipt"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_early() {
        let (mock, manager) = manager();
        mock.set_response("eth_getTransactionReceipt", Value::Null);
        let policy = ReceiptPolicy::new(Duration::from_secs(1), 100)
            .with_deadline(Duration::from_millis(2500));

        let err = manager.await_receipt(&H256::ZERO, &policy).await.unwrap_err();
        assert!(matches!(err, ClientError::ConfirmationTimeout { attempts: 3, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_confirm_marks_dropped() {
        let (mock, manager) = manager();
        let wallet = Wallet::new_random();
        mock.set_response("eth_sendRawTransaction", json!(HASH));
        mock.set_response("eth_getTransactionReceipt", Value::Null);
        mock.set_response("eth_getTransactionByHash", Value::Null);

        let raw = RawTransaction::transfer(0u64, 1u64, 21_000u64, Address::ZERO, 0u64);
        let manager = manager.with_policy(ReceiptPolicy::new(Duration::from_millis(10), 2));
        let mut tracked = manager.submit(&raw, &wallet).await.unwrap();
        assert_eq!(tracked.state(), TxState::Broadcast);

        assert!(manager.confirm(&mut tracked).await.is_err());
        assert_eq!(tracked.state(), TxState::Dropped);
    }

    #[tokio::test]
    async fn test_tracked_states_in_order() {
        let (mock, manager) = manager();
        let wallet = Wallet::new_random();
        let raw = RawTransaction::transfer(0u64, 1u64, 21_000u64, Address::ZERO, 0u64);
        let mut tracked = TrackedTransaction::new(raw.clone());
        assert_eq!(tracked.state(), TxState::Unsigned);
        assert!(tracked.hash().is_none());
        assert!(manager.confirm(&mut tracked).await.is_err());
        assert!(matches!(
            manager.broadcast_tracked(&mut tracked).await,
            Err(ClientError::MissingField("signature"))
        ));

        manager.sign_tracked(&mut tracked, &wallet).await.unwrap();
        assert_eq!(tracked.state(), TxState::Signed);
        let local = tracked.signed().unwrap().hash();
        assert_eq!(tracked.hash(), Some(local));
        assert_eq!(tracked.raw(), &raw);
        assert_eq!(mock.call_count("eth_sendRawTransaction"), 0);

        mock.set_response("eth_sendRawTransaction", json!(local.to_hex()));
        manager.broadcast_tracked(&mut tracked).await.unwrap();
        assert_eq!(tracked.state(), TxState::Broadcast);

        // already signed
        manager.sign_tracked(&mut tracked, &wallet).await.unwrap();
        assert_eq!(tracked.state(), TxState::Broadcast);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_stops_polling() {
        let (mock, manager) = manager();
        mock.set_response("eth_getTransactionReceipt", Value::Null);
        let policy = ReceiptPolicy::new(Duration::from_secs(1), 1_000);

        let waiter = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.await_receipt(&H256::ZERO, &policy).await })
        };
        while mock.call_count("eth_getTransactionReceipt") < 2 {
            tokio::time::advance(Duration::from_millis(100)).await;
        }
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());

        let seen = mock.call_count("eth_getTransactionReceipt");
        tokio::time::advance(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(mock.call_count("eth_getTransactionReceipt"), seen);
    }

    #[tokio::test]
    async fn test_confirmations() {
        let (mock, manager) = manager();
        let original: TransactionReceipt = serde_json::from_value(receipt(BLOCK_A, "0xfe")).unwrap();

        mock.push_response("eth_getTransactionReceipt", receipt(BLOCK_A, "0xfe"));
        assert_eq!(
            manager.confirmations(&original).await.unwrap(),
            Confirmation::Confirmed { depth: Quantity::from(3u64) }
        );

        mock.push_response("eth_getTransactionReceipt", receipt(BLOCK_B, "0xff"));
        assert!(matches!(
            manager.confirmations(&original).await.unwrap(),
            Confirmation::Reorged { .. }
        ));

        mock.push_response("eth_getTransactionReceipt", Value::Null);
        assert_eq!(manager.confirmations(&original).await.unwrap(), Confirmation::Removed);
    }
}
