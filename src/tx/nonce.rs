//! Nonce sequencing for one signing account
//!
//! The sequencer is seeded exactly once per batch run from the chain's
//! authoritative transaction count and is the sole source of truth for
//! "next nonce" afterwards. Re-querying mid-run would race against the
//! node's view of our own pending transactions.

use crate::chain::ChainRpc;
use crate::error::{MinterError, MinterResult};

use ethers::types::Address;
use tracing::debug;

/// Hands out unique, strictly increasing nonces in submission order
#[derive(Debug)]
pub struct NonceSequencer {
    next: u64,
}

impl NonceSequencer {
    /// Seed the sequencer from the chain, before any submission
    pub async fn seed<C: ChainRpc>(chain: &C, address: Address) -> MinterResult<Self> {
        let count = chain
            .transaction_count(address)
            .await
            .map_err(|e| MinterError::NonceSeed(e.to_string()))?;

        debug!("Initial account nonce: {}", count);
        Ok(Self::starting_at(count))
    }

    /// Sequencer starting at a known nonce
    pub fn starting_at(seed: u64) -> Self {
        Self { next: seed }
    }

    /// Next nonce to use
    pub fn current(&self) -> u64 {
        self.next
    }

    /// Consume the current ordering slot
    pub fn advance(&mut self) {
        self.next += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_out_consecutive_nonces() {
        let mut seq = NonceSequencer::starting_at(7);
        assert_eq!(seq.current(), 7);
        seq.advance();
        assert_eq!(seq.current(), 8);
        seq.advance();
        seq.advance();
        assert_eq!(seq.current(), 10);
    }

    #[test]
    fn current_does_not_consume() {
        let seq = NonceSequencer::starting_at(0);
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.current(), 0);
    }
}
