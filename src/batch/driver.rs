//! The submission driver - per-request state machine over one nonce sequence
//!
//! Requests are processed strictly one at a time in record order. Each
//! request runs `Parsed -> Validated -> NonceAssigned -> Built -> Signed ->
//! Sent -> (Confirmed | Reverted)` and reaches exactly one terminal outcome
//! before the driver advances. Failures are caught at the per-request
//! boundary and returned as tagged outcomes; only setup failures abort the
//! batch.

use crate::batch::records::{MintRequest, RawRecord};
use crate::chain::ChainRpc;
use crate::config::MinterConfig;
use crate::error::{MinterError, MinterResult};
use crate::tx::{NonceSequencer, TxBuilder};

use ethers::types::{TransactionReceipt, H256, U64};
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Pipeline stage at which a request failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validate,
    Build,
    Sign,
    Send,
    Confirm,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Build => "build",
            Stage::Sign => "sign",
            Stage::Send => "send",
            Stage::Confirm => "confirm",
        };
        f.write_str(name)
    }
}

/// Terminal outcome of one mint request
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Included on-chain and executed successfully
    Confirmed { tx_hash: H256, block_number: u64 },
    /// Included on-chain but execution reverted; not a process fault
    Reverted { tx_hash: H256 },
    /// Failed before inclusion, at the tagged stage
    Failed { stage: Stage, error: MinterError },
}

impl SubmissionOutcome {
    fn failed(stage: Stage, error: MinterError) -> Self {
        SubmissionOutcome::Failed { stage, error }
    }
}

/// One report row: record identity plus its terminal outcome
#[derive(Debug)]
pub struct EntryReport {
    /// 1-based position in the record source
    pub entry: usize,
    pub recipient: Option<String>,
    pub amount: Option<u128>,
    /// Ordering slot consumed by this entry, if any
    pub nonce: Option<u64>,
    pub outcome: SubmissionOutcome,
}

/// Record identity carried through the per-request pipeline
struct EntryIdentity {
    entry: usize,
    recipient: Option<String>,
    amount: Option<u128>,
}

impl EntryIdentity {
    fn unvalidated(entry: usize, record: &RawRecord) -> Self {
        Self {
            entry,
            recipient: Some(record.recipient.clone()),
            amount: None,
        }
    }

    fn validated(entry: usize, request: &MintRequest) -> Self {
        Self {
            entry,
            recipient: Some(request.recipient_display()),
            amount: Some(request.amount),
        }
    }

    fn unreadable(entry: usize) -> Self {
        Self {
            entry,
            recipient: None,
            amount: None,
        }
    }

    fn report(self, nonce: Option<u64>, outcome: SubmissionOutcome) -> EntryReport {
        EntryReport {
            entry: self.entry,
            recipient: self.recipient,
            amount: self.amount,
            nonce,
            outcome,
        }
    }
}

/// Summary of a completed batch run
#[derive(Debug)]
pub struct BatchReport {
    pub starting_nonce: u64,
    pub next_nonce: u64,
    pub entries: Vec<EntryReport>,
}

impl BatchReport {
    pub fn confirmed(&self) -> usize {
        self.count(|o| matches!(o, SubmissionOutcome::Confirmed { .. }))
    }

    pub fn reverted(&self) -> usize {
        self.count(|o| matches!(o, SubmissionOutcome::Reverted { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, SubmissionOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SubmissionOutcome) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Sequential submission driver for one signing account
///
/// Exclusively owns the chain handle, sequencer, and builder for the run's
/// duration; there is no concurrent submission and no shared mutable state.
pub struct SubmissionDriver<C> {
    chain: C,
    builder: TxBuilder,
    sequencer: NonceSequencer,
    decimals: u32,
    courtesy_delay: Duration,
    receipt_poll_interval: Duration,
}

impl<C: ChainRpc> SubmissionDriver<C> {
    pub fn new(
        chain: C,
        builder: TxBuilder,
        sequencer: NonceSequencer,
        decimals: u32,
        config: &MinterConfig,
    ) -> Self {
        Self {
            chain,
            builder,
            sequencer,
            decimals,
            courtesy_delay: Duration::from_millis(config.courtesy_delay_ms),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
        }
    }

    /// Drive every record to a terminal outcome, in order
    pub async fn run<I>(&mut self, records: I) -> BatchReport
    where
        I: IntoIterator<Item = MinterResult<RawRecord>>,
    {
        let starting_nonce = self.sequencer.current();
        let mut entries = Vec::new();

        for (index, row) in records.into_iter().enumerate() {
            let entry = index + 1;

            let report = match row {
                Ok(record) => self.process(entry, record).await,
                Err(error) => EntryIdentity::unreadable(entry)
                    .report(None, SubmissionOutcome::failed(Stage::Validate, error)),
            };

            self.log_entry(&report);
            entries.push(report);

            // Courtesy pause between entries, to be polite to the endpoint
            sleep(self.courtesy_delay).await;
        }

        BatchReport {
            starting_nonce,
            next_nonce: self.sequencer.current(),
            entries,
        }
    }

    /// Run one request through the pipeline to its terminal outcome
    async fn process(&mut self, entry: usize, record: RawRecord) -> EntryReport {
        let request = match MintRequest::parse(&record) {
            Ok(request) => request,
            Err(error) => {
                // Validation failures never capture a nonce
                return EntryIdentity::unvalidated(entry, &record)
                    .report(None, SubmissionOutcome::failed(Stage::Validate, error));
            }
        };

        let identity = EntryIdentity::validated(entry, &request);
        info!(
            "Preparing to mint {} tokens to {}",
            request.amount,
            request.recipient_display()
        );

        // Reserved for this request; consumed only once a send is attempted
        let nonce = self.sequencer.current();

        let scaled = match request.scaled(self.decimals) {
            Ok(scaled) => scaled,
            Err(error) => {
                return identity.report(None, SubmissionOutcome::failed(Stage::Build, error))
            }
        };

        // Gas price is refreshed per entry; it drifts over a long batch
        let gas_price = match self.chain.gas_price().await {
            Ok(price) => price,
            Err(error) => {
                return identity.report(None, SubmissionOutcome::failed(Stage::Build, error))
            }
        };

        let tx = self
            .builder
            .build_mint(request.recipient, scaled, nonce, gas_price);

        let raw = match self.builder.sign(&tx).await {
            Ok(raw) => raw,
            Err(error) => {
                return identity.report(None, SubmissionOutcome::failed(Stage::Sign, error))
            }
        };

        let sent = self.chain.send_raw_transaction(raw).await;

        // The ordering slot is consumed whether or not the node errored
        // back: it may have accepted the transaction before failing
        self.sequencer.advance();

        let tx_hash = match sent {
            Ok(tx_hash) => tx_hash,
            Err(error) => {
                return identity.report(Some(nonce), SubmissionOutcome::failed(Stage::Send, error))
            }
        };

        info!("Transaction sent: {:?} (nonce {})", tx_hash, nonce);

        let receipt = match self.wait_for_receipt(tx_hash).await {
            Ok(receipt) => receipt,
            Err(error) => {
                return identity
                    .report(Some(nonce), SubmissionOutcome::failed(Stage::Confirm, error))
            }
        };

        let outcome = if receipt.status == Some(U64::one()) {
            SubmissionOutcome::Confirmed {
                tx_hash,
                block_number: receipt.block_number.map(|b| b.as_u64()).unwrap_or_default(),
            }
        } else {
            SubmissionOutcome::Reverted { tx_hash }
        };

        identity.report(Some(nonce), outcome)
    }

    /// Block until the network reports inclusion
    ///
    /// No deadline: a non-responsive node stalls the driver here. The poll
    /// interval is configurable so a future deadline contract has a seam.
    async fn wait_for_receipt(&self, tx_hash: H256) -> MinterResult<TransactionReceipt> {
        loop {
            if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
                return Ok(receipt);
            }
            sleep(self.receipt_poll_interval).await;
        }
    }

    fn log_entry(&self, report: &EntryReport) {
        let recipient = report.recipient.as_deref().unwrap_or("<unreadable>");
        let amount = report
            .amount
            .map(|a| a.to_string())
            .unwrap_or_else(|| "?".to_string());
        match &report.outcome {
            SubmissionOutcome::Confirmed {
                tx_hash,
                block_number,
            } => {
                info!(
                    "Entry {}: minted {} to {}, confirmed in block {} ({:?})",
                    report.entry, amount, recipient, block_number, tx_hash
                );
            }
            SubmissionOutcome::Reverted { tx_hash } => {
                warn!(
                    "Entry {}: mint of {} to {} reverted on-chain ({:?})",
                    report.entry, amount, recipient, tx_hash
                );
            }
            SubmissionOutcome::Failed { stage, error } => {
                warn!(
                    "Entry {}: mint of {} to {} failed at {}: {}",
                    report.entry, amount, recipient, stage, error
                );
            }
        }
    }
}
