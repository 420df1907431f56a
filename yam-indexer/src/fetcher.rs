//! RPC log fetching and sync orchestration.
//!
//! A sync round:
//! 1. Opens the [`ParquetStore`] and reads the cursor.
//! 2. Walks from the cursor to `tip - confirmations` in checkpoint spans,
//!    querying `eth_getLogs` in adaptive batches.
//! 3. Fills missing block timestamps, decodes the logs and maps them into
//!    the store.
//! 4. Flushes the store, then advances and saves the cursor.
//!
//! The store is always flushed before the cursor moves, so a crash between
//! the two only causes logs to be delivered again; upserts keyed by
//! `tx hash + log index` absorb the replay.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use anyhow::{Context, Result, anyhow, bail};
use yam::{Mapper, RecordStore, events};

use crate::config::Config;
use crate::cursor::Cursor;
use crate::store::ParquetStore;

/// Per-request timeout for RPC calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Delay between consecutive RPC calls to avoid rate-limiting.
const INTER_BATCH_DELAY: Duration = Duration::from_millis(100);

/// Blocks processed between two store flushes and cursor saves.
const CHECKPOINT_SPAN: u64 = 50_000;

/// Tracks `eth_getLogs` batch size with an adaptive ceiling.
///
/// On success the size doubles toward the ceiling; on error the ceiling
/// is permanently lowered so the RPC's actual limit is learned once.
#[derive(Debug)]
struct Batcher {
    size: u64,
    ceiling: u64,
}

impl Batcher {
    const DEFAULT: u64 = 2_000;
    const MIN: u64 = 10;

    const fn new() -> Self {
        Self {
            size: Self::DEFAULT,
            ceiling: Self::DEFAULT,
        }
    }

    /// Grow toward the learned ceiling after a successful request.
    fn grow(&mut self) {
        self.size = (self.size * 2).min(self.ceiling);
    }

    /// Shrink and lower the ceiling after a failed request.
    /// Returns `false` when already at the minimum (caller should bail).
    fn shrink(&mut self) -> bool {
        if self.size <= Self::MIN {
            return false;
        }
        self.ceiling = (self.size / 2).max(Self::MIN);
        self.size = self.ceiling;
        true
    }
}

/// Maximum consecutive RPC errors before giving up.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Progress is logged every N batches.
const PROGRESS_INTERVAL: u64 = 50;

/// Fetch all logs from `address` in `[from, to]` using adaptive batches.
async fn fetch_logs<P: Provider>(
    provider: &P,
    address: Address,
    from: u64,
    to: u64,
) -> Result<Vec<Log>> {
    let mut logs = Vec::new();
    let mut block = from;
    let mut batch = Batcher::new();
    let mut count = 0u64;
    let mut errors = 0u32;

    while block <= to {
        let end = (block + batch.size - 1).min(to);
        let filter = Filter::new()
            .address(address)
            .from_block(block)
            .to_block(end);

        let result = tokio::time::timeout(REQUEST_TIMEOUT, provider.get_logs(&filter))
            .await
            .map_err(|_| anyhow!("request timed out"))
            .and_then(|r| r.map_err(|e| anyhow!("{e}")));

        match result {
            Ok(new) => {
                errors = 0;
                logs.extend(new);
                batch.grow();
                block = end + 1;
                count += 1;
                if count.is_multiple_of(PROGRESS_INTERVAL) {
                    tracing::info!(batch = count, block, progress = %pct(block, from, to), "fetching");
                }
                tokio::time::sleep(INTER_BATCH_DELAY).await;
            }
            Err(e) => {
                errors += 1;
                if errors >= MAX_CONSECUTIVE_ERRORS {
                    bail!("{errors} consecutive errors at block {block}: {e}");
                }
                if !batch.shrink() {
                    bail!("failed at min batch size (block {block}): {e}");
                }
                tracing::warn!(block, batch_size = batch.size, error = %e, "retrying");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }

    Ok(logs)
}

/// Format progress as a percentage string.
fn pct(current: u64, from: u64, to: u64) -> String {
    if to <= from {
        return "100%".into();
    }
    let ratio = (current - from) as f64 / (to - from) as f64 * 100.0;
    format!("{ratio:.0}%")
}

/// Set `block_timestamp` on logs whose RPC response left it out.
///
/// Each distinct block is fetched once.
async fn fill_timestamps<P: Provider>(provider: &P, logs: &mut [Log]) -> Result<()> {
    let missing: BTreeSet<u64> = logs
        .iter()
        .filter(|l| l.block_timestamp.is_none())
        .filter_map(|l| l.block_number)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let mut timestamps = HashMap::with_capacity(missing.len());
    for number in missing {
        let block = tokio::time::timeout(
            REQUEST_TIMEOUT,
            provider.get_block_by_number(BlockNumberOrTag::Number(number)),
        )
        .await
        .with_context(|| format!("get_block_by_number({number}) timed out"))?
        .with_context(|| format!("get_block_by_number({number}) failed"))?
        .with_context(|| format!("block {number} not found"))?;
        timestamps.insert(number, block.header.timestamp);
    }

    for log in logs.iter_mut().filter(|l| l.block_timestamp.is_none()) {
        log.block_timestamp = log.block_number.and_then(|n| timestamps.get(&n).copied());
    }
    Ok(())
}

/// Decode `logs` and map every YAM event into `store`.
///
/// Logs flagged `removed` (dropped by a reorg before we saw them) and logs
/// of unrelated events are skipped. Returns the number of records written.
///
/// # Errors
///
/// Fails on the first malformed log or store error; nothing after it is
/// written.
pub fn ingest<S: RecordStore>(logs: &[Log], store: S) -> yam::Result<usize> {
    let mut mapper = Mapper::new(store);
    let mut written = 0;
    for log in logs {
        if log.removed {
            tracing::warn!(tx = ?log.transaction_hash, log_index = ?log.log_index, "skipping removed log");
            continue;
        }
        if let Some(event) = events::decode(log)? {
            mapper.handle(&event)?;
            written += 1;
        }
    }
    Ok(written)
}

/// Index `[from, to]` into `store`, checkpointing every [`CHECKPOINT_SPAN`] blocks.
async fn index_range<P: Provider>(
    provider: &P,
    config: &Config,
    store: &mut ParquetStore,
    cursor: &mut Cursor,
    data_dir: &Path,
    from: u64,
    to: u64,
) -> Result<()> {
    let mut span_from = from;
    while span_from <= to {
        let span_to = span_from.saturating_add(CHECKPOINT_SPAN - 1).min(to);

        let mut logs = fetch_logs(provider, config.contract, span_from, span_to).await?;
        fill_timestamps(provider, &mut logs).await?;
        let written = ingest(&logs, &mut *store)?;
        store.flush()?;

        cursor.advance(span_from, span_to);
        cursor.save(data_dir)?;
        tracing::info!(
            from = span_from,
            to = span_to,
            logs = logs.len(),
            records = written,
            total = store.records().len(),
            "checkpoint"
        );

        span_from = span_to + 1;
    }
    Ok(())
}

/// Synchronize the data directory with automatic RPC fallback.
///
/// Tries each RPC in `rpcs` in order. On failure the next endpoint is
/// attempted; the cursor and upsert semantics ensure no data is duplicated.
///
/// `from_block` forces the start block (re-indexing a range); otherwise
/// the run resumes after the cursor, or starts at `config.start_block`.
///
/// # Errors
///
/// Returns an error only if *all* RPCs fail, or if `rpcs` is empty.
pub async fn sync(
    config: &Config,
    data_dir: &Path,
    rpcs: &[String],
    from_block: Option<u64>,
) -> Result<()> {
    let mut last_err = None;

    for (i, rpc_url) in rpcs.iter().enumerate() {
        match try_sync(config, data_dir, rpc_url, from_block).await {
            Ok(()) => return Ok(()),
            Err(e) => {
                if let Some(next) = rpcs.get(i + 1) {
                    tracing::warn!(rpc = %rpc_url, next = %next, error = %e, "RPC failed, falling back");
                } else {
                    tracing::error!(rpc = %rpc_url, error = %e, "last RPC failed");
                }
                last_err = Some(e);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("no RPC endpoint configured")))
}

/// Attempt a full sync using a single RPC endpoint.
async fn try_sync(
    config: &Config,
    data_dir: &Path,
    rpc_url: &str,
    from_block: Option<u64>,
) -> Result<()> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating {}", data_dir.display()))?;

    tracing::info!(chain_id = config.chain_id, rpc = rpc_url, "connecting");

    let provider = ProviderBuilder::new().connect_http(
        rpc_url
            .parse()
            .with_context(|| format!("invalid RPC URL: {rpc_url}"))?,
    );

    let latest = tokio::time::timeout(REQUEST_TIMEOUT, provider.get_block_number())
        .await
        .context("get_block_number timed out")?
        .context("get_block_number failed")?;
    let target = latest.saturating_sub(config.confirmations);

    let mut cursor = Cursor::load(data_dir)?.unwrap_or_default();
    let start = from_block.unwrap_or_else(|| {
        if cursor.ranges.is_empty() {
            config.start_block
        } else {
            cursor.last_block + 1
        }
    });

    if start > target {
        tracing::info!(latest, target, "already up to date");
        return Ok(());
    }

    tracing::info!(from = start, to = target, blocks = target - start + 1, "syncing");

    let mut store = ParquetStore::open(data_dir)?;
    index_range(&provider, config, &mut store, &mut cursor, data_dir, start, target).await?;

    tracing::info!(last_block = cursor.last_block, records = store.records().len(), "sync complete");
    Ok(())
}

/// Keep syncing every `config.poll_interval()` until Ctrl-C.
///
/// A failed round is logged and retried on the next tick.
///
/// # Errors
///
/// Returns an error if the Ctrl-C handler cannot be installed.
pub async fn follow(
    config: &Config,
    data_dir: &Path,
    rpcs: &[String],
    from_block: Option<u64>,
) -> Result<()> {
    follow_until(config, data_dir, rpcs, from_block, tokio::signal::ctrl_c()).await
}

/// Sync repeatedly until `shutdown` resolves.
///
/// Shutdown also aborts a round in progress. Records are flushed before the
/// cursor moves, so the aborted span is fetched again next time.
async fn follow_until<F>(
    config: &Config,
    data_dir: &Path,
    rpcs: &[String],
    mut from_block: Option<u64>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = std::io::Result<()>>,
{
    tokio::pin!(shutdown);
    loop {
        let round = sync(config, data_dir, rpcs, from_block.take());
        tokio::select! {
            signal = &mut shutdown => {
                signal.context("listening for Ctrl-C")?;
                tracing::info!("shutting down, sync round aborted");
                return Ok(());
            }
            result = round => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "sync round failed");
                }
            }
        }

        tokio::select! {
            signal = &mut shutdown => {
                signal.context("listening for Ctrl-C")?;
                tracing::info!("shutting down");
                return Ok(());
            }
            () = tokio::time::sleep(config.poll_interval()) => {}
        }
    }
}
