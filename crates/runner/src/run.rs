//! Top-level orchestration of one stress run.

use std::path::PathBuf;

use alloy_primitives::Bytes;
use eyre::{WrapErr, bail};
use surge_rpc::NodeClient;
use surge_wallet::AccountSet;
use tracing::{info, warn};

use crate::collector::{Collector, aggregate};
use crate::engine::prepare_transactions;
use crate::fund::distribute_native;
use crate::progress::LogProgress;
use crate::report::{RunReport, print_tables, write_report};
use crate::workload::{EoaWorkload, Erc20Workload, Erc721Workload, Workload};

/// Workload selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Native transfers between sub-accounts.
    Eoa,
    /// ERC-20 transfers against a deployed token.
    Erc20,
    /// ERC-721 mints against a deployed collection.
    Erc721,
}

/// Everything one run needs, assembled by the CLI.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// JSON-RPC endpoint of the node under test.
    pub endpoint: String,
    /// BIP-39 phrase funding the run.
    pub mnemonic: String,
    /// Sub-account count K.
    pub sub_accounts: usize,
    /// Transaction count N.
    pub transactions: u64,
    /// Submission batch size B.
    pub batch_size: usize,
    /// Workload mode.
    pub mode: Mode,
    /// Optional path for the JSON report.
    pub output: Option<PathBuf>,
}

/// Runs the full pipeline: fund, construct, submit, measure, report.
pub async fn run(config: RunConfig) -> eyre::Result<()> {
    match config.mode {
        Mode::Eoa => execute(config, EoaWorkload::new()).await,
        Mode::Erc20 => execute(config, Erc20Workload::new()).await,
        Mode::Erc721 => execute(config, Erc721Workload::new()).await,
    }
}

async fn execute<W: Workload>(config: RunConfig, mut workload: W) -> eyre::Result<()> {
    let progress = LogProgress::default();

    let client = NodeClient::connect(&config.endpoint).wrap_err("Invalid JSON-RPC endpoint")?;
    let chain_id = client.chain_id().await.wrap_err("Failed to reach the node")?;
    info!(endpoint = %client.endpoint(), chain_id, "Connected");

    let mut accounts =
        AccountSet::derive(&config.mnemonic, config.sub_accounts, config.transactions as usize)?;
    if accounts.subs.is_empty() {
        info!("No transactions requested, no stat data to collect");
        return Ok(());
    }
    info!(root = %accounts.root.address(), sub_accounts = accounts.subs.len(), "Accounts derived");

    let root_nonce = client.transaction_count(accounts.root.address()).await?;
    accounts.root.set_nonce(root_nonce);

    workload.fetch_gas_price(&client).await?;
    workload.init(&client, &mut accounts, chain_id).await?;
    workload.estimate_base_gas(&client, &accounts).await?;
    info!("{}", workload.start_message());

    let required = workload.required_balance(config.transactions)?;
    let ready = distribute_native(
        &client,
        &mut accounts,
        required,
        workload.gas_price()?,
        chain_id,
        &progress,
    )
    .await?;
    if ready.is_empty() {
        bail!("no sub-account is funded for the workload");
    }

    let ready = workload
        .distribute_assets(&client, &mut accounts, &ready, config.transactions, chain_id, &progress)
        .await?;
    if ready.is_empty() {
        bail!("no sub-account received workload assets");
    }
    info!(ready = ready.len(), "Sub-accounts ready");

    let signed = prepare_transactions(
        &client,
        &workload,
        &mut accounts,
        &ready,
        config.transactions,
        chain_id,
        &progress,
    )
    .await?;
    if signed.is_empty() {
        bail!("every transaction failed to sign");
    }

    let raw: Vec<Bytes> = signed.iter().map(|tx| tx.raw.clone()).collect();
    let submission = client.submit_transactions(&raw, config.batch_size).await;
    info!(
        accepted = submission.accepted(),
        rejected = submission.errors.len(),
        "Submission finished"
    );
    if submission.hashes.is_empty() {
        for error in &submission.errors {
            warn!("{error}");
        }
        bail!("the node accepted none of the transactions");
    }

    let collector = Collector::new(&client, config.batch_size);
    collector.wait_for_drain(submission.accepted()).await;

    let (records, mut errors) =
        collector.collect_receipts(&submission.hashes, config.transactions, &progress).await?;
    errors.extend(submission.errors);
    info!(receipts = records.len(), errors = errors.len(), "Receipts collected");

    let blocks = collector.reconstruct_blocks(&records).await?;
    let stats = aggregate(blocks);

    if stats.is_empty() {
        info!("No blocks observed, no stat data to report");
        return Ok(());
    }

    print_tables(&stats, &errors);

    if let Some(path) = &config.output {
        let report = RunReport::from(&stats);
        write_report(path, &report).wrap_err("Failed to write the report")?;
        info!(path = %path.display(), "Report written");
    }

    Ok(())
}
