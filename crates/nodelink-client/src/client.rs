//! NodeClient - typed wrappers over the node's JSON-RPC surface

use std::sync::Arc;

use nodelink_primitives::codec::{decode_bool, encode_data};
use nodelink_primitives::{Address, BlockReference, ByteData, Quantity, H256};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::channel::RpcChannel;
use crate::transport::{MockTransport, Transport};
use crate::types::{
    AccountProof, Block, CallRequest, FilterChanges, FilterCriteria, LogEntry, SyncStatus,
    Transaction, TransactionReceipt, TransactionRequest, Work,
};
use crate::ClientError;

#[cfg(feature = "http")]
use crate::config::ClientConfig;
#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// Client for a single node
///
/// Cheap to clone; clones share the channel (and its request-id counter) and the
/// cached chain id.
#[derive(Clone, Debug)]
pub struct NodeClient {
    channel: RpcChannel,
    chain_id: Arc<OnceCell<u64>>,
}

impl NodeClient {
    /// Connect over HTTP and fetch the chain id
    #[cfg(feature = "http")]
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        let client = Self::with_transport(HttpTransport::new(url));
        client.chain_id().await?;
        Ok(client)
    }

    /// Build an HTTP client from config; the chain id is fetched lazily when not configured
    #[cfg(feature = "http")]
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = HttpTransport::with_timeout(&config.rpc_url, config.request_timeout())?;
        let client = Self::with_transport(transport);
        Ok(match config.chain_id {
            Some(id) => client.with_chain_id(id),
            None => client,
        })
    }

    /// Client backed by a default [`MockTransport`] on chain 1
    pub fn new_mock() -> Self {
        Self::with_transport(MockTransport::new()).with_chain_id(1)
    }

    /// Client over a custom transport
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self::with_channel(RpcChannel::new(transport))
    }

    /// Client over an existing channel
    pub fn with_channel(channel: RpcChannel) -> Self {
        Self {
            channel,
            chain_id: Arc::new(OnceCell::new()),
        }
    }

    /// Pin the chain id instead of asking the node
    pub fn with_chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Arc::new(OnceCell::new_with(Some(chain_id)));
        self
    }

    /// Underlying channel, for methods without a typed wrapper
    pub fn channel(&self) -> &RpcChannel {
        &self.channel
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, ClientError> {
        self.channel.request(method, params).await
    }

    async fn quantity(&self, method: &str, params: Vec<Value>) -> Result<Quantity, ClientError> {
        let result: String = self.request(method, params).await?;
        Ok(Quantity::from_hex(&result)?)
    }

    async fn optional_quantity(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Option<Quantity>, ClientError> {
        let result: Option<String> = self.request(method, params).await?;
        Ok(result.map(|s| Quantity::from_hex(&s)).transpose()?)
    }

    async fn data(&self, method: &str, params: Vec<Value>) -> Result<ByteData, ClientError> {
        let result: String = self.request(method, params).await?;
        Ok(ByteData::from_hex(&result)?)
    }

    async fn hash(&self, method: &str, params: Vec<Value>) -> Result<H256, ClientError> {
        let result: String = self.request(method, params).await?;
        Ok(H256::from_hex(&result)?)
    }

    async fn boolean(&self, method: &str, params: Vec<Value>) -> Result<bool, ClientError> {
        let result = self.channel.call(method, params).await?;
        Ok(decode_bool(&result)?)
    }

    // ==================== web3 / net ====================

    /// Node software version
    pub async fn client_version(&self) -> Result<String, ClientError> {
        self.request("web3_clientVersion", vec![]).await
    }

    /// Keccak-256 computed by the node
    pub async fn sha3(&self, data: &[u8]) -> Result<H256, ClientError> {
        self.hash("web3_sha3", vec![Value::String(encode_data(data))])
            .await
    }

    /// Network id (decimal string)
    pub async fn net_version(&self) -> Result<String, ClientError> {
        self.request("net_version", vec![]).await
    }

    /// Whether the node accepts peer connections
    pub async fn net_listening(&self) -> Result<bool, ClientError> {
        self.boolean("net_listening", vec![]).await
    }

    /// Connected peers
    pub async fn net_peer_count(&self) -> Result<Quantity, ClientError> {
        self.quantity("net_peerCount", vec![]).await
    }

    // ==================== Chain Info ====================

    /// Protocol version as reported by the node
    pub async fn protocol_version(&self) -> Result<String, ClientError> {
        self.request("eth_protocolVersion", vec![]).await
    }

    /// Sync state
    pub async fn syncing(&self) -> Result<SyncStatus, ClientError> {
        self.request("eth_syncing", vec![]).await
    }

    /// Mining reward address
    pub async fn coinbase(&self) -> Result<Address, ClientError> {
        let result: String = self.request("eth_coinbase", vec![]).await?;
        Ok(Address::from_hex(&result)?)
    }

    /// Whether the node is mining
    pub async fn mining(&self) -> Result<bool, ClientError> {
        self.boolean("eth_mining", vec![]).await
    }

    /// Hashes per second
    pub async fn hashrate(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_hashrate", vec![]).await
    }

    /// Current gas price in wei
    pub async fn gas_price(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_gasPrice", vec![]).await
    }

    /// Accounts the node holds keys for
    pub async fn accounts(&self) -> Result<Vec<Address>, ClientError> {
        self.request("eth_accounts", vec![]).await
    }

    /// Latest block number
    pub async fn block_number(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_blockNumber", vec![]).await
    }

    /// Chain id, asked once and cached
    pub async fn chain_id(&self) -> Result<u64, ClientError> {
        self.chain_id
            .get_or_try_init(|| self.fetch_chain_id())
            .await
            .copied()
    }

    async fn fetch_chain_id(&self) -> Result<u64, ClientError> {
        let id = self.quantity("eth_chainId", vec![]).await?;
        id.to_u64()
            .ok_or_else(|| ClientError::InvalidChainId(format!("{id} does not fit in 64 bits")))
    }

    /// Blob base fee (Cancun and later)
    pub async fn blob_base_fee(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_blobBaseFee", vec![]).await
    }

    // ==================== State Reads ====================

    /// Balance in wei
    pub async fn get_balance(
        &self,
        address: &Address,
        block: BlockReference,
    ) -> Result<Quantity, ClientError> {
        self.quantity(
            "eth_getBalance",
            vec![Value::String(address.to_hex()), Value::String(block.serialize())],
        )
        .await
    }

    /// Raw 32-byte storage word at `position`
    pub async fn get_storage_at(
        &self,
        address: &Address,
        position: &Quantity,
        block: BlockReference,
    ) -> Result<ByteData, ClientError> {
        self.data(
            "eth_getStorageAt",
            vec![
                Value::String(address.to_hex()),
                Value::String(position.to_hex()),
                Value::String(block.serialize()),
            ],
        )
        .await
    }

    /// Nonce (number of transactions sent) of an address
    pub async fn get_transaction_count(
        &self,
        address: &Address,
        block: BlockReference,
    ) -> Result<Quantity, ClientError> {
        self.quantity(
            "eth_getTransactionCount",
            vec![Value::String(address.to_hex()), Value::String(block.serialize())],
        )
        .await
    }

    /// Contract code; empty for externally owned accounts
    pub async fn get_code(
        &self,
        address: &Address,
        block: BlockReference,
    ) -> Result<ByteData, ClientError> {
        self.data(
            "eth_getCode",
            vec![Value::String(address.to_hex()), Value::String(block.serialize())],
        )
        .await
    }

    /// Execute a read-only call
    pub async fn call(
        &self,
        request: &CallRequest,
        block: BlockReference,
    ) -> Result<ByteData, ClientError> {
        self.data(
            "eth_call",
            vec![serde_json::to_value(request)?, Value::String(block.serialize())],
        )
        .await
    }

    /// Gas estimate for a call or transaction
    pub async fn estimate_gas(&self, request: &CallRequest) -> Result<Quantity, ClientError> {
        self.quantity("eth_estimateGas", vec![serde_json::to_value(request)?])
            .await
    }

    /// Merkle proof for an account and some of its storage slots
    pub async fn get_proof(
        &self,
        address: &Address,
        storage_keys: &[H256],
        block: BlockReference,
    ) -> Result<AccountProof, ClientError> {
        self.request(
            "eth_getProof",
            vec![
                Value::String(address.to_hex()),
                serde_json::to_value(storage_keys)?,
                Value::String(block.serialize()),
            ],
        )
        .await
    }

    // ==================== Blocks ====================

    /// Block by hash; `full` selects full transaction objects over hashes
    pub async fn get_block_by_hash(
        &self,
        hash: &H256,
        full: bool,
    ) -> Result<Option<Block>, ClientError> {
        self.request(
            "eth_getBlockByHash",
            vec![Value::String(hash.to_hex()), Value::Bool(full)],
        )
        .await
    }

    /// Block by number or tag
    pub async fn get_block_by_number(
        &self,
        block: BlockReference,
        full: bool,
    ) -> Result<Option<Block>, ClientError> {
        self.request(
            "eth_getBlockByNumber",
            vec![Value::String(block.serialize()), Value::Bool(full)],
        )
        .await
    }

    /// Transaction count of a block; None if the block is unknown
    pub async fn get_block_transaction_count_by_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<Quantity>, ClientError> {
        self.optional_quantity(
            "eth_getBlockTransactionCountByHash",
            vec![Value::String(hash.to_hex())],
        )
        .await
    }

    /// Transaction count of a block; None if the block is unknown
    pub async fn get_block_transaction_count_by_number(
        &self,
        block: BlockReference,
    ) -> Result<Option<Quantity>, ClientError> {
        self.optional_quantity(
            "eth_getBlockTransactionCountByNumber",
            vec![Value::String(block.serialize())],
        )
        .await
    }

    /// Uncle count of a block; None if the block is unknown
    pub async fn get_uncle_count_by_block_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<Quantity>, ClientError> {
        self.optional_quantity(
            "eth_getUncleCountByBlockHash",
            vec![Value::String(hash.to_hex())],
        )
        .await
    }

    /// Uncle count of a block; None if the block is unknown
    pub async fn get_uncle_count_by_block_number(
        &self,
        block: BlockReference,
    ) -> Result<Option<Quantity>, ClientError> {
        self.optional_quantity(
            "eth_getUncleCountByBlockNumber",
            vec![Value::String(block.serialize())],
        )
        .await
    }

    /// Uncle header at `index`
    pub async fn get_uncle_by_block_hash_and_index(
        &self,
        hash: &H256,
        index: &Quantity,
    ) -> Result<Option<Block>, ClientError> {
        self.request(
            "eth_getUncleByBlockHashAndIndex",
            vec![Value::String(hash.to_hex()), Value::String(index.to_hex())],
        )
        .await
    }

    /// Uncle header at `index`
    pub async fn get_uncle_by_block_number_and_index(
        &self,
        block: BlockReference,
        index: &Quantity,
    ) -> Result<Option<Block>, ClientError> {
        self.request(
            "eth_getUncleByBlockNumberAndIndex",
            vec![Value::String(block.serialize()), Value::String(index.to_hex())],
        )
        .await
    }

    // ==================== Transactions ====================

    /// Transaction by hash; None if unknown (never sent, or dropped from the pool)
    pub async fn get_transaction_by_hash(
        &self,
        hash: &H256,
    ) -> Result<Option<Transaction>, ClientError> {
        self.request(
            "eth_getTransactionByHash",
            vec![Value::String(hash.to_hex())],
        )
        .await
    }

    /// Transaction at `index` in a block
    pub async fn get_transaction_by_block_hash_and_index(
        &self,
        hash: &H256,
        index: &Quantity,
    ) -> Result<Option<Transaction>, ClientError> {
        self.request(
            "eth_getTransactionByBlockHashAndIndex",
            vec![Value::String(hash.to_hex()), Value::String(index.to_hex())],
        )
        .await
    }

    /// Transaction at `index` in a block
    pub async fn get_transaction_by_block_number_and_index(
        &self,
        block: BlockReference,
        index: &Quantity,
    ) -> Result<Option<Transaction>, ClientError> {
        self.request(
            "eth_getTransactionByBlockNumberAndIndex",
            vec![Value::String(block.serialize()), Value::String(index.to_hex())],
        )
        .await
    }

    /// Receipt; None until the transaction is mined
    pub async fn get_transaction_receipt(
        &self,
        hash: &H256,
    ) -> Result<Option<TransactionReceipt>, ClientError> {
        self.request(
            "eth_getTransactionReceipt",
            vec![Value::String(hash.to_hex())],
        )
        .await
    }

    /// Submit a signed, RLP-encoded transaction
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<H256, ClientError> {
        self.hash(
            "eth_sendRawTransaction",
            vec![Value::String(encode_data(raw))],
        )
        .await
    }

    /// Ask the node to sign and submit; many nodes refuse this outright
    pub async fn send_transaction(&self, request: &TransactionRequest) -> Result<H256, ClientError> {
        self.hash("eth_sendTransaction", vec![serde_json::to_value(request)?])
            .await
    }

    /// Node-side `eth_sign` with an unlocked account
    pub async fn sign(&self, address: &Address, message: &[u8]) -> Result<ByteData, ClientError> {
        self.data(
            "eth_sign",
            vec![Value::String(address.to_hex()), Value::String(encode_data(message))],
        )
        .await
    }

    // ==================== Filters & Logs ====================

    /// Install a log filter; returns its id
    pub async fn new_filter(&self, criteria: &FilterCriteria) -> Result<Quantity, ClientError> {
        self.quantity("eth_newFilter", vec![serde_json::to_value(criteria)?])
            .await
    }

    /// Install a new-block filter
    pub async fn new_block_filter(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_newBlockFilter", vec![]).await
    }

    /// Install a pending-transaction filter
    pub async fn new_pending_transaction_filter(&self) -> Result<Quantity, ClientError> {
        self.quantity("eth_newPendingTransactionFilter", vec![])
            .await
    }

    /// Changes since the previous poll of `id`
    pub async fn get_filter_changes(&self, id: &Quantity) -> Result<FilterChanges, ClientError> {
        self.request("eth_getFilterChanges", vec![Value::String(id.to_hex())])
            .await
    }

    /// Every log matching the filter, regardless of earlier polls
    pub async fn get_filter_logs(&self, id: &Quantity) -> Result<Vec<LogEntry>, ClientError> {
        self.request("eth_getFilterLogs", vec![Value::String(id.to_hex())])
            .await
    }

    /// Remove a filter; false if the node did not know it
    pub async fn uninstall_filter(&self, id: &Quantity) -> Result<bool, ClientError> {
        self.boolean("eth_uninstallFilter", vec![Value::String(id.to_hex())])
            .await
    }

    /// Stateless log query
    pub async fn get_logs(&self, criteria: &FilterCriteria) -> Result<Vec<LogEntry>, ClientError> {
        self.request("eth_getLogs", vec![serde_json::to_value(criteria)?])
            .await
    }

    // ==================== Mining ====================

    /// Current proof-of-work package
    pub async fn get_work(&self) -> Result<Work, ClientError> {
        self.request("eth_getWork", vec![]).await
    }

    /// Submit a proof-of-work solution
    pub async fn submit_work(
        &self,
        nonce: [u8; 8],
        pow_hash: &H256,
        mix_digest: &H256,
    ) -> Result<bool, ClientError> {
        self.boolean(
            "eth_submitWork",
            vec![
                Value::String(encode_data(&nonce)),
                Value::String(pow_hash.to_hex()),
                Value::String(mix_digest.to_hex()),
            ],
        )
        .await
    }

    /// Report a miner's hashrate
    pub async fn submit_hashrate(&self, hashrate: &H256, id: &H256) -> Result<bool, ClientError> {
        self.boolean(
            "eth_submitHashrate",
            vec![Value::String(hashrate.to_hex()), Value::String(id.to_hex())],
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mock_client() -> (MockTransport, NodeClient) {
        let mock = MockTransport::new();
        (mock.clone(), NodeClient::with_transport(mock))
    }

    #[tokio::test]
    async fn test_mock_chain_id() {
        let client = NodeClient::new_mock();
        assert_eq!(client.chain_id().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_chain_id_is_cached() {
        let (mock, client) = mock_client();
        mock.set_response("eth_chainId", json!("0x539"));
        assert_eq!(client.chain_id().await.unwrap(), 1337);
        assert_eq!(client.clone().chain_id().await.unwrap(), 1337);
        assert_eq!(mock.call_count("eth_chainId"), 1);
    }

    #[tokio::test]
    async fn test_gas_price_and_balance() {
        let client = NodeClient::new_mock();
        assert_eq!(client.gas_price().await.unwrap(), Quantity::from(1_000_000_000u64));
        let balance = client
            .get_balance(&Address::ZERO, BlockReference::Latest)
            .await
            .unwrap();
        assert_eq!(balance, Quantity::from(1_000_000_000_000_000_000u128));
    }

    #[tokio::test]
    async fn test_params_wire_form() {
        let (mock, client) = mock_client();
        client
            .get_transaction_count(&Address::ZERO, BlockReference::from(0))
            .await
            .unwrap();
        let call = mock.calls().pop().unwrap();
        assert_eq!(call.method, "eth_getTransactionCount");
        assert_eq!(
            call.params,
            vec![json!("0x0000000000000000000000000000000000000000"), json!("0x0")]
        );
    }

    #[tokio::test]
    async fn test_malformed_quantity_result() {
        let (mock, client) = mock_client();
        mock.set_response("eth_blockNumber", json!("0x0100"));
        let err = client.block_number().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedHex(_)));
    }

    #[tokio::test]
    async fn test_net_listening_bool() {
        let (mock, client) = mock_client();
        mock.set_response("net_listening", json!(true));
        assert!(client.net_listening().await.unwrap());
    }

    #[tokio::test]
    async fn test_missing_block_is_none() {
        let (mock, client) = mock_client();
        mock.set_response("eth_getBlockByHash", Value::Null);
        let block = client.get_block_by_hash(&H256::ZERO, false).await.unwrap();
        assert!(block.is_none());
    }

    #[tokio::test]
    async fn test_unsupported_method() {
        let client = NodeClient::new_mock();
        let err = client.coinbase().await.unwrap_err();
        assert!(err.is_method_not_found());
    }
}
