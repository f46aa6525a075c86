//! Typed request and response objects for the node API

use nodelink_primitives::{Address, BlockReference, ByteData, Quantity, H256};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Call request for `eth_call` and `eth_estimateGas`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequest {
    /// Sender address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient address (None for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Quantity>,
    /// Gas price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Quantity>,
    /// Value to transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    /// Input data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ByteData>,
}

impl CallRequest {
    /// Call `to` with `data`
    pub fn new(to: Address, data: impl Into<ByteData>) -> Self {
        Self {
            to: Some(to),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Set sender
    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }
}

/// Transaction for node-side signing (`eth_sendTransaction`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender; must be an account the node holds keys for
    pub from: Address,
    /// Recipient (None for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<Quantity>,
    /// Gas price
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<Quantity>,
    /// Value to transfer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Quantity>,
    /// Input data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ByteData>,
    /// Sender nonce
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Quantity>,
}

/// Block as returned by `eth_getBlockBy*` and `eth_getUncleBy*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block number; null while pending
    pub number: Option<Quantity>,
    /// Block hash; null while pending
    pub hash: Option<H256>,
    /// Parent hash
    pub parent_hash: H256,
    /// Proof-of-work nonce
    #[serde(default)]
    pub nonce: Option<ByteData>,
    /// Hash of the uncle list
    pub sha3_uncles: H256,
    /// Bloom filter of the block's logs
    #[serde(default)]
    pub logs_bloom: Option<ByteData>,
    /// Transactions trie root
    pub transactions_root: H256,
    /// State trie root
    pub state_root: H256,
    /// Receipts trie root
    pub receipts_root: H256,
    /// Beneficiary
    #[serde(default)]
    pub miner: Option<Address>,
    /// Difficulty
    #[serde(default)]
    pub difficulty: Option<Quantity>,
    /// Total difficulty up to this block
    #[serde(default)]
    pub total_difficulty: Option<Quantity>,
    /// Extra data
    #[serde(default)]
    pub extra_data: ByteData,
    /// Size in bytes
    #[serde(default)]
    pub size: Option<Quantity>,
    /// Gas limit
    pub gas_limit: Quantity,
    /// Gas used
    pub gas_used: Quantity,
    /// Unix timestamp
    pub timestamp: Quantity,
    /// Transaction hashes or full objects, depending on the request flag
    #[serde(default)]
    pub transactions: BlockTransactions,
    /// Uncle hashes
    #[serde(default)]
    pub uncles: Vec<H256>,
    /// Base fee (London and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<Quantity>,
    /// Mix hash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mix_hash: Option<H256>,
}

/// Transactions of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockTransactions {
    /// Hash-only form (`full = false`)
    Hashes(Vec<H256>),
    /// Full transaction objects (`full = true`)
    Full(Vec<Transaction>),
}

impl Default for BlockTransactions {
    fn default() -> Self {
        BlockTransactions::Hashes(Vec::new())
    }
}

impl BlockTransactions {
    /// Number of transactions
    pub fn len(&self) -> usize {
        match self {
            BlockTransactions::Hashes(h) => h.len(),
            BlockTransactions::Full(t) => t.len(),
        }
    }

    /// Whether the block has no transactions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hashes, whichever form was returned
    pub fn hashes(&self) -> Vec<H256> {
        match self {
            BlockTransactions::Hashes(h) => h.clone(),
            BlockTransactions::Full(t) => t.iter().map(|tx| tx.hash).collect(),
        }
    }
}

/// Transaction object as returned by `eth_getTransactionBy*`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash
    pub hash: H256,
    /// Sender nonce
    pub nonce: Quantity,
    /// Containing block; null while pending
    pub block_hash: Option<H256>,
    /// Containing block number; null while pending
    pub block_number: Option<Quantity>,
    /// Position in the block; null while pending
    pub transaction_index: Option<Quantity>,
    /// Sender
    pub from: Address,
    /// Recipient; null for contract creation
    pub to: Option<Address>,
    /// Value transferred
    pub value: Quantity,
    /// Gas price
    #[serde(default)]
    pub gas_price: Option<Quantity>,
    /// Gas limit
    pub gas: Quantity,
    /// Call data
    pub input: ByteData,
    /// Signature v
    #[serde(default)]
    pub v: Option<Quantity>,
    /// Signature r
    #[serde(default)]
    pub r: Option<Quantity>,
    /// Signature s
    #[serde(default)]
    pub s: Option<Quantity>,
    /// Chain id, when the node reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<Quantity>,
    /// Envelope type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<Quantity>,
}

/// Receipt as returned by `eth_getTransactionReceipt`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Position in the block
    pub transaction_index: Quantity,
    /// Containing block hash
    pub block_hash: H256,
    /// Containing block number
    pub block_number: Quantity,
    /// Sender
    #[serde(default)]
    pub from: Option<Address>,
    /// Recipient; null for contract creation
    #[serde(default)]
    pub to: Option<Address>,
    /// Gas used by this and all preceding transactions in the block
    pub cumulative_gas_used: Quantity,
    /// Gas used by this transaction
    pub gas_used: Quantity,
    /// Created contract, if any
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Emitted logs
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    /// Bloom filter of the logs
    #[serde(default)]
    pub logs_bloom: Option<ByteData>,
    /// 1 for success, 0 for failure (Byzantium and later)
    #[serde(default)]
    pub status: Option<Quantity>,
    /// Post-transaction state root (before Byzantium)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<H256>,
    /// Price actually paid per gas
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_gas_price: Option<Quantity>,
}

impl TransactionReceipt {
    /// Execution outcome, or None for pre-Byzantium receipts without a status
    pub fn is_success(&self) -> Option<bool> {
        self.status.as_ref().map(|s| !s.is_zero())
    }
}

/// Event log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// True when the log was dropped by a chain reorganisation
    #[serde(default)]
    pub removed: bool,
    /// Position in the block; null while pending
    #[serde(default)]
    pub log_index: Option<Quantity>,
    /// Transaction position in the block
    #[serde(default)]
    pub transaction_index: Option<Quantity>,
    /// Emitting transaction
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    /// Containing block hash
    #[serde(default)]
    pub block_hash: Option<H256>,
    /// Containing block number
    #[serde(default)]
    pub block_number: Option<Quantity>,
    /// Emitting contract
    pub address: Address,
    /// Non-indexed arguments
    pub data: ByteData,
    /// Indexed arguments, topic 0 first
    #[serde(default)]
    pub topics: Vec<H256>,
}

/// Identity of a log within the chain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LogKey {
    /// Containing block hash
    pub block_hash: Option<H256>,
    /// Transaction position in the block
    pub transaction_index: Option<Quantity>,
    /// Log position in the block
    pub log_index: Option<Quantity>,
}

impl LogKey {
    /// Whether every position field is known; pending logs leave them null
    pub fn is_complete(&self) -> bool {
        self.block_hash.is_some() && self.transaction_index.is_some() && self.log_index.is_some()
    }
}

impl LogEntry {
    /// Dedup key: (block hash, transaction index, log index)
    pub fn key(&self) -> LogKey {
        LogKey {
            block_hash: self.block_hash,
            transaction_index: self.transaction_index.clone(),
            log_index: self.log_index.clone(),
        }
    }
}

/// `eth_syncing` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Node is at head
    NotSyncing,
    /// Node is catching up
    Syncing(SyncProgress),
}

/// Sync progress counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Block the sync started at
    pub starting_block: Quantity,
    /// Current block
    pub current_block: Quantity,
    /// Estimated highest block
    pub highest_block: Quantity,
}

impl SyncStatus {
    /// Whether the node is syncing
    pub fn is_syncing(&self) -> bool {
        matches!(self, SyncStatus::Syncing(_))
    }
}

impl<'de> Deserialize<'de> for SyncStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Progress(SyncProgress),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Ok(SyncStatus::NotSyncing),
            Raw::Flag(true) => Err(serde::de::Error::custom(
                "eth_syncing returned true without progress",
            )),
            Raw::Progress(p) => Ok(SyncStatus::Syncing(p)),
        }
    }
}

/// `eth_getProof` result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProof {
    /// Account
    pub address: Address,
    /// Balance
    pub balance: Quantity,
    /// Code hash
    pub code_hash: H256,
    /// Nonce
    pub nonce: Quantity,
    /// Storage trie root
    pub storage_hash: H256,
    /// Merkle proof of the account, root first
    pub account_proof: Vec<ByteData>,
    /// One proof per requested slot
    #[serde(default)]
    pub storage_proof: Vec<StorageProof>,
}

/// Proof of one storage slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    /// Slot key, echoed as the caller sent it
    pub key: String,
    /// Slot value
    pub value: Quantity,
    /// Merkle proof, root first
    pub proof: Vec<ByteData>,
}

/// `eth_getWork` result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    /// Header pow-hash
    pub pow_hash: H256,
    /// Seed hash for the DAG
    pub seed_hash: H256,
    /// Boundary condition (target)
    pub boundary: H256,
    /// Block number, if the node sends a fourth element
    pub number: Option<Quantity>,
}

impl<'de> Deserialize<'de> for Work {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        let items = Vec::<String>::deserialize(deserializer)?;
        if items.len() < 3 {
            return Err(D::Error::invalid_length(items.len(), &"at least 3 work items"));
        }
        let hash = |s: &str| H256::from_hex(s).map_err(D::Error::custom);
        Ok(Work {
            pow_hash: hash(&items[0])?,
            seed_hash: hash(&items[1])?,
            boundary: hash(&items[2])?,
            number: items
                .get(3)
                .map(|n| Quantity::from_hex(n).map_err(D::Error::custom))
                .transpose()?,
        })
    }
}

/// `eth_getFilterChanges` result
///
/// An empty array is ambiguous on the wire and decodes as `Hashes`; callers that
/// know the filter kind normalise it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterChanges {
    /// New block or pending-transaction hashes
    Hashes(Vec<H256>),
    /// New log entries
    Logs(Vec<LogEntry>),
}

impl FilterChanges {
    /// Number of entries
    pub fn len(&self) -> usize {
        match self {
            FilterChanges::Hashes(h) => h.len(),
            FilterChanges::Logs(l) => l.len(),
        }
    }

    /// Whether nothing changed since the last poll
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log entries; empty for hash results
    pub fn into_logs(self) -> Vec<LogEntry> {
        match self {
            FilterChanges::Logs(l) => l,
            FilterChanges::Hashes(_) => Vec::new(),
        }
    }

    /// Hashes; empty for log results
    pub fn into_hashes(self) -> Vec<H256> {
        match self {
            FilterChanges::Hashes(h) => h,
            FilterChanges::Logs(_) => Vec::new(),
        }
    }
}

/// One position in a topic filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// Wildcard (`null`)
    Any,
    /// Exact match
    Single(H256),
    /// Match any of these
    OneOf(Vec<H256>),
}

impl Serialize for TopicFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TopicFilter::Any => serializer.serialize_none(),
            TopicFilter::Single(h) => h.serialize(serializer),
            TopicFilter::OneOf(hs) => hs.serialize(serializer),
        }
    }
}

impl From<H256> for TopicFilter {
    fn from(h: H256) -> Self {
        TopicFilter::Single(h)
    }
}

/// Log filter criteria for `eth_newFilter` and `eth_getLogs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Lower bound (inclusive); node default is `latest`
    pub from_block: Option<BlockReference>,
    /// Upper bound (inclusive); node default is `latest`
    pub to_block: Option<BlockReference>,
    /// Emitting contracts; empty matches any
    pub address: Vec<Address>,
    /// Positional topic filters
    pub topics: Vec<TopicFilter>,
}

impl FilterCriteria {
    /// Empty criteria (matches everything in `latest`)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lower bound
    pub fn from_block(mut self, block: impl Into<BlockReference>) -> Self {
        self.from_block = Some(block.into());
        self
    }

    /// Set the upper bound
    pub fn to_block(mut self, block: impl Into<BlockReference>) -> Self {
        self.to_block = Some(block.into());
        self
    }

    /// Add an emitting contract
    pub fn address(mut self, address: Address) -> Self {
        self.address.push(address);
        self
    }

    /// Set the filter for topic position `index`, padding earlier positions with `Any`
    pub fn topic(mut self, index: usize, filter: impl Into<TopicFilter>) -> Self {
        if self.topics.len() <= index {
            self.topics.resize(index + 1, TopicFilter::Any);
        }
        self.topics[index] = filter.into();
        self
    }

    /// Match an event signature (topic 0)
    pub fn event(self, signature: H256) -> Self {
        self.topic(0, signature)
    }
}

impl Serialize for FilterCriteria {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(from) = &self.from_block {
            map.serialize_entry("fromBlock", from)?;
        }
        if let Some(to) = &self.to_block {
            map.serialize_entry("toBlock", to)?;
        }
        match self.address.as_slice() {
            [] => {}
            [single] => map.serialize_entry("address", single)?,
            many => map.serialize_entry("address", many)?,
        }
        if !self.topics.is_empty() {
            map.serialize_entry("topics", &self.topics)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HASH_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const HASH_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn test_call_request_skips_none() {
        let req = CallRequest::new(Address::ZERO, vec![0x01, 0x02]);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["to"], json!("0x0000000000000000000000000000000000000000"));
        assert_eq!(json["data"], json!("0x0102"));
        assert!(json.get("from").is_none());
        assert!(json.get("gasPrice").is_none());
    }

    #[test]
    fn test_transaction_request_camel_case() {
        let req = TransactionRequest {
            from: Address::ZERO,
            gas_price: Some(Quantity::from(1u64)),
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["gasPrice"], json!("0x1"));
    }

    #[test]
    fn test_filter_criteria_wire_form() {
        let a = H256::from_hex(HASH_A).unwrap();
        let b = H256::from_hex(HASH_B).unwrap();
        let criteria = FilterCriteria::new()
            .from_block(BlockReference::Earliest)
            .to_block(10u64)
            .address(Address::ZERO)
            .topic(1, TopicFilter::OneOf(vec![a, b]));

        let json = serde_json::to_value(&criteria).unwrap();
        assert_eq!(
            json,
            json!({
                "fromBlock": "earliest",
                "toBlock": "0xa",
                "address": "0x0000000000000000000000000000000000000000",
                "topics": [null, [HASH_A, HASH_B]],
            })
        );
    }

    #[test]
    fn test_filter_criteria_empty() {
        assert_eq!(serde_json::to_value(FilterCriteria::new()).unwrap(), json!({}));
    }

    #[test]
    fn test_filter_changes_shapes() {
        let empty: FilterChanges = serde_json::from_value(json!([])).unwrap();
        assert!(empty.is_empty());

        let hashes: FilterChanges = serde_json::from_value(json!([HASH_A])).unwrap();
        assert_eq!(hashes.into_hashes().len(), 1);

        let logs: FilterChanges = serde_json::from_value(json!([{
            "address": "0x0000000000000000000000000000000000000000",
            "data": "0x",
            "topics": [HASH_B],
            "logIndex": "0x0",
            "blockHash": HASH_A
        }]))
        .unwrap();
        assert!(matches!(logs, FilterChanges::Logs(ref l) if l.len() == 1));
    }

    #[test]
    fn test_sync_status() {
        let s: SyncStatus = serde_json::from_value(json!(false)).unwrap();
        assert!(!s.is_syncing());

        let s: SyncStatus = serde_json::from_value(json!({
            "startingBlock": "0x0",
            "currentBlock": "0x10",
            "highestBlock": "0x20"
        }))
        .unwrap();
        assert!(s.is_syncing());
    }

    #[test]
    fn test_work_from_array() {
        let w: Work = serde_json::from_value(json!([HASH_A, HASH_B, HASH_A])).unwrap();
        assert_eq!(w.seed_hash, H256::from_hex(HASH_B).unwrap());
        assert!(w.number.is_none());
        assert!(serde_json::from_value::<Work>(json!([HASH_A])).is_err());
    }

    #[test]
    fn test_receipt_status() {
        let receipt: TransactionReceipt = serde_json::from_value(json!({
            "transactionHash": HASH_A,
            "transactionIndex": "0x0",
            "blockHash": HASH_B,
            "blockNumber": "0x1",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208",
            "logs": [],
            "status": "0x1"
        }))
        .unwrap();
        assert_eq!(receipt.is_success(), Some(true));
        assert!(receipt.contract_address.is_none());
    }

    #[test]
    fn test_receipt_rejects_malformed_quantity() {
        let result = serde_json::from_value::<TransactionReceipt>(json!({
            "transactionHash": HASH_A,
            "transactionIndex": "0x00",
            "blockHash": HASH_B,
            "blockNumber": "0x1",
            "cumulativeGasUsed": "0x5208",
            "gasUsed": "0x5208"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_block_hash_only_transactions() {
        let block: Block = serde_json::from_value(json!({
            "number": "0x1",
            "hash": HASH_A,
            "parentHash": HASH_B,
            "sha3Uncles": HASH_A,
            "transactionsRoot": HASH_A,
            "stateRoot": HASH_A,
            "receiptsRoot": HASH_A,
            "extraData": "0x",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x0",
            "timestamp": "0x5f5e100",
            "transactions": [HASH_B],
            "uncles": []
        }))
        .unwrap();
        assert_eq!(block.transactions.len(), 1);
        assert_eq!(block.transactions.hashes(), vec![H256::from_hex(HASH_B).unwrap()]);
    }
}
