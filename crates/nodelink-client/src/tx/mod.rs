//! Transaction lifecycle: build, sign, broadcast, confirm

mod builder;
mod lifecycle;
mod signed;
mod wallet;

pub use builder::{RawTransaction, TxBuilder};
pub use lifecycle::{Confirmation, ReceiptPolicy, TrackedTransaction, TransactionManager, TxState};
pub use signed::{sign_transaction, SignedTransaction};
pub use wallet::{Signer, Wallet};
