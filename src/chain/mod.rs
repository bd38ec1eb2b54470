//! Chain module - the JSON-RPC client surface used by the submission engine
//!
//! The `ChainRpc` trait is the seam between the driver and the network: it
//! is implemented by `ChainProvider` against real HTTP endpoints and by
//! scripted stubs in tests.

pub mod provider;

pub use provider::ChainProvider;

use crate::error::MinterResult;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Client operations the submission engine needs from a chain node
#[async_trait]
pub trait ChainRpc {
    /// Confirmed + pending transaction count for an account (nonce seed)
    async fn transaction_count(&self, address: Address) -> MinterResult<u64>;

    /// Current network gas price
    async fn gas_price(&self) -> MinterResult<U256>;

    /// Broadcast a signed raw transaction, returning its hash
    async fn send_raw_transaction(&self, raw: Bytes) -> MinterResult<H256>;

    /// Receipt for a transaction, `None` while it is not yet included
    async fn transaction_receipt(&self, tx_hash: H256) -> MinterResult<Option<TransactionReceipt>>;
}
