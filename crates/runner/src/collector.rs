//! Post-submission reconciliation: mempool drain, receipt gathering, and
//! block-level throughput statistics.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use alloy_consensus::BlockHeader;
use alloy_primitives::B256;
use alloy_rpc_types_eth::Block;
use surge_rpc::NodeClient;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::RunnerError;
use crate::progress::ProgressObserver;

/// Cadence of `txpool_status` polls during the drain phase.
const DRAIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Drain deadline floor.
const DRAIN_MIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Drain deadline per submitted transaction.
const DRAIN_TIMEOUT_PER_TX: Duration = Duration::from_millis(500);

/// Longest wait for a fresh block between receipt sweeps.
const NEW_BLOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-hash deadline in the individual fallback phase.
const FALLBACK_RECEIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// An included transaction, populated only from a successful receipt fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxRecord {
    /// Transaction hash.
    pub hash: B256,
    /// Including block number (0 means unincluded).
    pub block_number: u64,
}

/// Timing and utilization facts about one observed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRecord {
    /// Block number.
    pub number: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
    /// Transactions included in the block.
    pub tx_count: u64,
    /// Gas consumed by the block.
    pub gas_used: u64,
    /// Block gas cap.
    pub gas_limit: u64,
    /// Whole seconds between this block and its parent.
    pub block_time: u64,
}

impl BlockRecord {
    /// Gas utilization percent with two fixed decimals.
    pub fn utilization(&self) -> f64 {
        if self.gas_limit == 0 {
            return 0.0;
        }
        (self.gas_used as u128 * 10_000 / self.gas_limit as u128) as f64 / 100.0
    }

    /// Throughput of this block, undefined for a zero block time.
    pub fn tx_per_sec(&self) -> Option<f64> {
        (self.block_time > 0).then(|| self.tx_count as f64 / self.block_time as f64)
    }
}

/// Aggregated throughput figures over the observed block set.
#[derive(Debug, Clone, PartialEq)]
pub struct RunStats {
    /// `⌈Σ tx_count / Σ block_time⌉`, 0 when no time was observed.
    pub avg_tps: u64,
    /// Slowest per-block throughput (zero-time blocks excluded).
    pub min_tps: f64,
    /// Fastest per-block throughput (zero-time blocks excluded).
    pub max_tps: f64,
    /// Mean per-block gas utilization percent.
    pub avg_utilization: f64,
    /// Total transactions across the observed blocks.
    pub total_included: u64,
    /// Aggregate denominator in seconds.
    pub total_block_time: u64,
    /// Observed blocks sorted by number.
    pub blocks: Vec<BlockRecord>,
}

impl RunStats {
    /// True when no block was observed at all.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Folds block records into run-level statistics.
///
/// A block with a zero block time cannot yield a finite rate: it is skipped
/// for min/max and contributes one second to the aggregate denominator so
/// its transactions still count toward the average.
pub fn aggregate(mut blocks: Vec<BlockRecord>) -> RunStats {
    blocks.sort_unstable_by_key(|b| b.number);

    let mut total_included = 0u64;
    let mut total_block_time = 0u64;
    let mut min_tps = f64::MAX;
    let mut max_tps = 0f64;
    let mut utilization_sum = 0f64;

    for block in &blocks {
        total_included += block.tx_count;
        total_block_time += block.block_time.max(1);
        utilization_sum += block.utilization();
        if let Some(tps) = block.tx_per_sec() {
            min_tps = min_tps.min(tps);
            max_tps = max_tps.max(tps);
        }
    }

    let avg_tps =
        if total_block_time == 0 { 0 } else { total_included.div_ceil(total_block_time) };
    let avg_utilization =
        if blocks.is_empty() { 0.0 } else { utilization_sum / blocks.len() as f64 };

    RunStats {
        avg_tps,
        min_tps: if min_tps == f64::MAX { 0.0 } else { min_tps },
        max_tps,
        avg_utilization,
        total_included,
        total_block_time,
        blocks,
    }
}

/// Gathers receipts and block facts after submission.
#[derive(Debug)]
pub struct Collector<'a> {
    client: &'a NodeClient,
    batch_size: usize,
}

impl<'a> Collector<'a> {
    /// Creates a collector reusing the submission batch size.
    pub fn new(client: &'a NodeClient, batch_size: usize) -> Self {
        Self { client, batch_size: batch_size.max(1) }
    }

    /// Polls `txpool_status` until the pool is empty or the deadline passes.
    ///
    /// Nodes without the method surface polling errors; those are treated
    /// as transient and the deadline alone bounds the phase.
    pub async fn wait_for_drain(&self, submitted: usize) {
        let deadline = DRAIN_TIMEOUT_PER_TX
            .saturating_mul(submitted as u32)
            .max(DRAIN_MIN_TIMEOUT);
        let started = Instant::now();
        info!(submitted, timeout_secs = deadline.as_secs(), "Waiting for mempool drain");

        loop {
            match self.client.txpool_status().await {
                Ok(status) if status.is_drained() => {
                    info!("Mempool drained");
                    return;
                }
                Ok(status) => {
                    debug!(pending = status.pending, queued = status.queued, "Mempool not empty")
                }
                Err(err) => debug!(error = %err, "txpool_status unavailable, relying on deadline"),
            }

            if started.elapsed() >= deadline {
                warn!("Mempool did not drain before the deadline, continuing");
                return;
            }
            sleep(DRAIN_POLL_INTERVAL).await;
        }
    }

    /// Fetches receipts for every submitted hash.
    ///
    /// Runs batched sweeps paced by new blocks within a `⌈2.5% × N⌉` budget,
    /// then falls back to polling stragglers one by one. Every input hash
    /// ends up either in the returned records or in the error list. A
    /// reverted receipt (`status == 0x0`) aborts with
    /// [`RunnerError::ExecutionFailed`].
    pub async fn collect_receipts(
        &self,
        hashes: &[B256],
        transactions: u64,
        progress: &dyn ProgressObserver,
    ) -> Result<(Vec<TxRecord>, Vec<String>), RunnerError> {
        let mut outstanding: Vec<B256> = hashes.to_vec();
        let mut records = Vec::with_capacity(hashes.len());
        let mut errors = Vec::new();

        let budget = sweep_budget(transactions);
        for sweep in 0..budget {
            if outstanding.is_empty() {
                break;
            }
            debug!(sweep, outstanding = outstanding.len(), "Receipt sweep");

            let results = self.client.fetch_receipts(&outstanding, self.batch_size).await;
            let mut still_outstanding = Vec::new();
            for (hash, summary) in results {
                match summary {
                    Some(receipt) if !receipt.is_success() => {
                        return Err(RunnerError::ExecutionFailed(hash));
                    }
                    Some(receipt) if receipt.block_number() > 0 => {
                        records.push(TxRecord { hash, block_number: receipt.block_number() });
                    }
                    _ => still_outstanding.push(hash),
                }
            }
            outstanding = still_outstanding;

            if !outstanding.is_empty() && sweep + 1 < budget {
                self.wait_for_new_block().await;
            }
        }

        if !outstanding.is_empty() {
            info!(outstanding = outstanding.len(), "Falling back to individual receipt polls");
        }
        let total = outstanding.len();
        for (i, hash) in outstanding.into_iter().enumerate() {
            progress.on_item_started("receipt", i, total);
            match self.client.wait_for_receipt(hash, FALLBACK_RECEIPT_TIMEOUT).await {
                Ok(receipt) if !receipt.is_success() => {
                    return Err(RunnerError::ExecutionFailed(hash));
                }
                Ok(receipt) => {
                    records.push(TxRecord { hash, block_number: receipt.block_number() })
                }
                Err(err) => errors.push(format!("no receipt for {hash}: {err}")),
            }
            progress.on_item_completed("receipt", i, total);
        }

        Ok((records, errors))
    }

    /// Fetches every block referenced by the records (plus parents for
    /// timestamps) and derives per-block timing facts.
    pub async fn reconstruct_blocks(
        &self,
        records: &[TxRecord],
    ) -> Result<Vec<BlockRecord>, RunnerError> {
        let numbers: BTreeSet<u64> =
            records.iter().filter(|r| r.block_number > 0).map(|r| r.block_number).collect();

        let mut cache: HashMap<u64, Block> = HashMap::new();
        let mut blocks = Vec::with_capacity(numbers.len());
        for &number in &numbers {
            let Some(block) = self.block_cached(&mut cache, number).await? else {
                warn!(number, "Referenced block not found, skipping");
                continue;
            };
            let timestamp = block.header.timestamp();
            let tx_count = block.transactions.len() as u64;
            let gas_used = block.header.gas_used();
            let gas_limit = block.header.gas_limit();

            let block_time = if number == 0 {
                0
            } else {
                match self.block_cached(&mut cache, number - 1).await? {
                    Some(parent) => timestamp.abs_diff(parent.header.timestamp()),
                    None => 0,
                }
            };

            blocks.push(BlockRecord { number, timestamp, tx_count, gas_used, gas_limit, block_time });
        }
        Ok(blocks)
    }

    async fn block_cached<'b>(
        &self,
        cache: &'b mut HashMap<u64, Block>,
        number: u64,
    ) -> Result<Option<&'b Block>, RunnerError> {
        if !cache.contains_key(&number) {
            match self.client.block_by_number(number).await? {
                Some(block) => {
                    cache.insert(number, block);
                }
                None => return Ok(None),
            }
        }
        Ok(cache.get(&number))
    }

    /// Waits until the chain head advances, bounded by [`NEW_BLOCK_TIMEOUT`].
    async fn wait_for_new_block(&self) {
        let Ok(start) = self.client.block_number().await else {
            sleep(Duration::from_secs(1)).await;
            return;
        };
        let deadline = Instant::now() + NEW_BLOCK_TIMEOUT;
        while Instant::now() < deadline {
            sleep(Duration::from_millis(500)).await;
            if let Ok(now) = self.client.block_number().await {
                if now > start {
                    return;
                }
            }
        }
        debug!("No new block before the pacing deadline");
    }
}

/// Batched sweep budget: 2.5% of the transaction count, at least one.
const fn sweep_budget(transactions: u64) -> usize {
    let budget = transactions.div_ceil(40);
    if budget == 0 { 1 } else { budget as usize }
}
