//! # nodelink-client
//!
//! Typed client runtime for a blockchain node's JSON-RPC interface.
//!
//! ## Features
//!
//! - **RpcChannel**: request/response correlation, awaited or detached
//! - **NodeClient**: one typed method per node operation
//! - **TransactionManager**: nonce, signing, broadcast and receipt confirmation
//! - **FilterSubscription**: server-side filters, incremental polling, log dedup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nodelink_client::{NodeClient, ReceiptPolicy, TransactionManager, TxBuilder, Wallet};
//! use nodelink_primitives::{Address, BlockReference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NodeClient::connect("http://localhost:8545").await?;
//!     let wallet = Wallet::new_random();
//!
//!     let balance = client.get_balance(&wallet.address(), BlockReference::Latest).await?;
//!     println!("balance: {balance} wei");
//!
//!     let to = Address::from_hex("0x742d35Cc6634C0532925a3b844Bc9e7595f0aB3d")?;
//!     let manager = TransactionManager::new(client).with_policy(ReceiptPolicy::default());
//!     let tracked = manager
//!         .send(TxBuilder::new().to(to).value(1_000_000_000_000_000_000u128), &wallet)
//!         .await?;
//!     println!("mined in block {:?}", tracked.receipt().map(|r| &r.block_number));
//!     Ok(())
//! }
//! ```
//!
//! ## Watching Logs
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use nodelink_client::{FilterCriteria, FilterSubscription, LogWatcher, NodeClient};
//! use nodelink_primitives::BlockReference;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NodeClient::connect("http://localhost:8545").await?;
//!     let subscription = FilterSubscription::new(client);
//!     let handle = subscription
//!         .install(&FilterCriteria::new().from_block(BlockReference::Earliest))
//!         .await?;
//!
//!     let mut watcher = LogWatcher::new(&subscription, handle, Duration::from_secs(1));
//!     let logs = watcher.next_non_empty().await?;
//!     println!("{} new logs", logs.len());
//!
//!     subscription.close().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod channel;
mod client;
mod config;
mod error;
mod filter;
mod transport;
pub mod tx;
pub mod types;

pub use channel::{PendingCall, RpcChannel};
pub use client::NodeClient;
pub use config::ClientConfig;
pub use error::{error_code, ClientError};
pub use filter::{FilterHandle, FilterKind, FilterSubscription, LogDeduplicator, LogWatcher};
pub use transport::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse, MockTransport, Transport};
pub use tx::{
    sign_transaction, Confirmation, RawTransaction, ReceiptPolicy, SignedTransaction, Signer,
    TrackedTransaction, TransactionManager, TxBuilder, TxState, Wallet,
};
pub use types::{
    Block, CallRequest, FilterChanges, FilterCriteria, LogEntry, SyncStatus, TopicFilter,
    Transaction, TransactionReceipt, TransactionRequest,
};

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Re-export primitives for convenience
pub use nodelink_primitives::{Address, BlockReference, ByteData, Quantity, H256};
