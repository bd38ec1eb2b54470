//! Batch Minter - sequential token-mint submission for one signing account
//!
//! Reads (recipient, quantity) pairs from a CSV file and issues one mint
//! transaction per entry, in order, from a single account. Per-entry
//! failures are reported and skipped; only setup failures abort the run.

use anyhow::{Context, Result};
use tracing::{info, warn};

mod batch;
mod chain;
mod config;
mod error;
mod tx;

use batch::{RecordSource, SubmissionDriver};
use chain::ChainProvider;
use config::Settings;
use tx::{NonceSequencer, TxBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    info!("Starting batch-minter v{}", env!("CARGO_PKG_VERSION"));

    // Fatal setup phase: configuration, node, wallet, nonce seed. Nothing
    // is submitted if any of these fail.
    let settings = Settings::load()?;

    let provider = ChainProvider::connect(settings.chain.clone())
        .await
        .context("Failed to connect to the chain")?;

    let builder = TxBuilder::from_settings(&settings).context("Failed to set up signing")?;

    let contract = settings.token.parsed_contract_address()?;
    let decimals = provider
        .token_decimals(contract, settings.token.default_decimals)
        .await;

    let sequencer = NonceSequencer::seed(&provider, builder.sender())
        .await
        .context("Failed to query the initial account nonce")?;
    info!("Initial account nonce: {}", sequencer.current());

    let records = RecordSource::open(&settings.minter.recipients_csv)
        .context("Failed to open the recipients file")?;

    // Submission phase: per-entry failures are reported, never propagated
    let mut driver = SubmissionDriver::new(provider, builder, sequencer, decimals, &settings.minter);
    let report = driver.run(records.records()).await;

    info!(
        "Batch finished: {} entries, {} confirmed, {} reverted, {} failed",
        report.entries.len(),
        report.confirmed(),
        report.reverted(),
        report.failed()
    );
    info!(
        "Nonce slots consumed: {}..{}",
        report.starting_nonce, report.next_nonce
    );
    if report.reverted() + report.failed() > 0 {
        warn!("Some entries did not mint; prune confirmed rows before re-running");
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,batch_minter=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
