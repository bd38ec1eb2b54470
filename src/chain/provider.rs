//! Chain provider with multi-RPC support and automatic read failover

use crate::chain::ChainRpc;
use crate::config::ChainConfig;
use crate::error::{MinterError, MinterResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Selector of the ERC-20 `decimals()` view call
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

/// Largest decimal scale whose power of ten still fits in a U256
const MAX_DECIMALS: u32 = 77;

/// Multi-provider wrapper over the configured RPC endpoints
///
/// Read calls rotate to the next endpoint on failure. Raw transaction
/// submission never fails over: re-broadcasting through another endpoint
/// after an ambiguous error could double-spend the nonce slot.
pub struct ChainProvider {
    config: ChainConfig,
    http_providers: Vec<Provider<Http>>,
    current_provider: AtomicUsize,
}

impl ChainProvider {
    /// Connect to the configured endpoints and verify the node is reachable
    pub async fn connect(config: ChainConfig) -> MinterResult<Self> {
        let mut http_providers = Vec::new();

        for url in &config.rpc_urls {
            match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => {
                    let provider = provider.interval(Duration::from_millis(100));
                    http_providers.push(provider);
                    debug!("Added HTTP provider: {}", url);
                }
                Err(e) => {
                    warn!("Failed to create provider for {}: {}", url, e);
                }
            }
        }

        if http_providers.is_empty() {
            return Err(MinterError::Connection(
                "No valid RPC providers".to_string(),
            ));
        }

        let provider = Self {
            config,
            http_providers,
            current_provider: AtomicUsize::new(0),
        };

        // A failed block-number probe on every endpoint is a fatal setup error
        let block = provider.probe_block_number().await?;
        info!(
            "Connected to chain {} at block {}",
            provider.config.chain_id, block
        );

        Ok(provider)
    }

    /// Get the active HTTP provider
    fn http(&self) -> &Provider<Http> {
        let idx = self.current_provider.load(Ordering::Relaxed);
        &self.http_providers[idx % self.http_providers.len()]
    }

    /// Switch to the next available provider
    fn failover(&self) {
        let current = self.current_provider.load(Ordering::Relaxed);
        let next = (current + 1) % self.http_providers.len();
        self.current_provider.store(next, Ordering::Relaxed);
        warn!("Chain {} failover to provider {}", self.config.chain_id, next);
    }

    /// Current block number, trying each endpoint once
    async fn probe_block_number(&self) -> MinterResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_block_number().await {
                Ok(block) => return Ok(block.as_u64()),
                Err(e) => {
                    warn!("Failed to get block number: {}", e);
                    self.failover();
                }
            }
        }

        Err(MinterError::Connection("All providers failed".to_string()))
    }

    /// Query the token's `decimals()` at startup, falling back to the
    /// configured default when the call fails or returns nonsense
    pub async fn token_decimals(&self, contract: Address, default: u32) -> u32 {
        let call: TypedTransaction = TransactionRequest::new()
            .to(contract)
            .data(DECIMALS_SELECTOR.to_vec())
            .into();

        match self.http().call(&call, None).await {
            Ok(output) if output.len() >= 32 => {
                let value = U256::from_big_endian(&output[..32]);
                if value <= U256::from(MAX_DECIMALS) {
                    let decimals = value.as_u32();
                    info!("Token decimals: {}", decimals);
                    decimals
                } else {
                    warn!(
                        "decimals() returned implausible value {}, using default {}",
                        value, default
                    );
                    default
                }
            }
            Ok(_) => {
                warn!("decimals() returned short data, using default {}", default);
                default
            }
            Err(e) => {
                warn!("decimals() call failed, using default {}: {}", default, e);
                default
            }
        }
    }
}

#[async_trait]
impl ChainRpc for ChainProvider {
    async fn transaction_count(&self, address: Address) -> MinterResult<u64> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_transaction_count(address, None).await {
                Ok(count) => return Ok(count.as_u64()),
                Err(e) => {
                    warn!("Failed to get transaction count: {}", e);
                    self.failover();
                }
            }
        }

        Err(MinterError::Connection(
            "All providers failed to get transaction count".to_string(),
        ))
    }

    async fn gas_price(&self) -> MinterResult<U256> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_gas_price().await {
                Ok(price) => {
                    debug!("Gas price: {}", price);
                    return Ok(price);
                }
                Err(e) => {
                    warn!("Failed to get gas price: {}", e);
                    self.failover();
                }
            }
        }

        Err(MinterError::Connection(
            "All providers failed to get gas price".to_string(),
        ))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> MinterResult<H256> {
        // No failover here: the current endpoint may have accepted the
        // transaction before erroring back
        self.http()
            .send_raw_transaction(raw)
            .await
            .map(|pending| pending.tx_hash())
            .map_err(|e| MinterError::Submission(e.to_string()))
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> MinterResult<Option<TransactionReceipt>> {
        for _ in 0..self.http_providers.len() {
            match self.http().get_transaction_receipt(tx_hash).await {
                Ok(receipt) => return Ok(receipt),
                Err(e) => {
                    warn!("Failed to get receipt for {:?}: {}", tx_hash, e);
                    self.failover();
                }
            }
        }

        Err(MinterError::Receipt(
            "All providers failed to get receipt".to_string(),
        ))
    }
}
