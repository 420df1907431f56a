//! RealT YAM event indexer CLI.
//!
//! Fetches YAM exchange logs over JSON-RPC, stores one record per event as
//! Parquet files and answers simple queries over them.
//!
//! # Usage
//!
//! ```bash
//! # Index from the last checkpoint (or the deployment block) to the tip
//! yam-indexer sync --data-dir ./data
//!
//! # Keep indexing new blocks until Ctrl-C
//! yam-indexer sync --data-dir ./data --follow
//!
//! # Re-index from a given block with a custom RPC endpoint
//! yam-indexer sync --from-block 30000000 --rpc https://my-rpc.example.com
//!
//! # Inspect stored records
//! yam-indexer show --block 30000123
//! yam-indexer status --offer-id 4242
//!
//! # Trades of an account during 2024
//! yam-indexer report --account 0x… --from 2024-01-01T00:00:00Z --to 2024-12-31T23:59:59Z
//! ```

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, B256, U256};
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use yam::{AnyRecord, Side};
use yam_indexer::config::Config;
use yam_indexer::cursor::Cursor;
use yam_indexer::fetcher;
use yam_indexer::store::ParquetStore;

/// RealT YAM exchange event indexer.
#[derive(Debug, Parser)]
#[command(name = "yam-indexer", version, about)]
struct Cli {
    /// Directory holding the Parquet record files and the cursor.
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch new YAM events and store them as records.
    Sync {
        /// Path to the TOML configuration file.
        #[arg(long, default_value = "config.toml")]
        config: PathBuf,

        /// Use this RPC endpoint instead of the configured list.
        #[arg(long)]
        rpc: Option<String>,

        /// Start from this block instead of the cursor.
        #[arg(long)]
        from_block: Option<u64>,

        /// Keep polling for new blocks until interrupted.
        #[arg(long)]
        follow: bool,
    },

    /// Print stored records as JSON lines.
    Show(Selector),

    /// Print the history and derived status of an offer.
    Status {
        /// Offer identifier assigned by the contract.
        #[arg(long)]
        offer_id: u64,
    },

    /// Print the accepted offers of one or more accounts as JSON lines.
    Report {
        /// Account to report on (repeatable).
        #[arg(long = "account", required = true)]
        accounts: Vec<Address>,

        /// Which side of the trades to include.
        #[arg(long, value_enum, default_value_t = SideArg::Both)]
        side: SideArg,

        /// Start of the window (RFC 3339, inclusive).
        #[arg(long)]
        from: DateTime<Utc>,

        /// End of the window (RFC 3339, inclusive).
        #[arg(long)]
        to: DateTime<Utc>,
    },
}

/// Trade side accepted by `report --side`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SideArg {
    Buyer,
    Seller,
    Both,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buyer => Self::Buyer,
            SideArg::Seller => Self::Seller,
            SideArg::Both => Self::Both,
        }
    }
}

/// Which records `show` prints.
#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
struct Selector {
    /// Record id (`<tx hash>-<log index>`).
    #[arg(long)]
    id: Option<String>,

    /// All records of a transaction.
    #[arg(long)]
    tx: Option<String>,

    /// All records of a block.
    #[arg(long)]
    block: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Sync {
            config,
            rpc,
            from_block,
            follow,
        } => cmd_sync(&cli.data_dir, &config, rpc.as_deref(), from_block, follow).await,
        Command::Show(selector) => cmd_show(&cli.data_dir, &selector),
        Command::Status { offer_id } => cmd_status(&cli.data_dir, offer_id),
        Command::Report {
            accounts,
            side,
            from,
            to,
        } => cmd_report(&cli.data_dir, &accounts, side.into(), from, to),
    }
}

/// Execute the `sync` subcommand.
async fn cmd_sync(
    data_dir: &Path,
    config_path: &Path,
    rpc_override: Option<&str>,
    from_block: Option<u64>,
    follow: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let rpcs = config.rpcs(rpc_override);

    if let Some(from) = from_block.filter(|b| *b < config.start_block) {
        bail!("--from-block {from} is before the contract deployment block {}", config.start_block);
    }

    tracing::info!(
        contract = %config.contract,
        rpcs = rpcs.len(),
        data_dir = %data_dir.display(),
        follow,
        "starting sync"
    );

    if follow {
        fetcher::follow(&config, data_dir, &rpcs, from_block).await
    } else {
        fetcher::sync(&config, data_dir, &rpcs, from_block).await
    }
}

/// Execute the `show` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
fn cmd_show(data_dir: &Path, selector: &Selector) -> Result<()> {
    let store = ParquetStore::open(data_dir)?;
    let records = store.records();

    let hits: Vec<&AnyRecord> = if let Some(id) = &selector.id {
        records.get(id).into_iter().collect()
    } else if let Some(tx) = &selector.tx {
        let hash: B256 = tx.parse().with_context(|| format!("invalid transaction hash {tx}"))?;
        records.by_transaction(&hash)
    } else if let Some(block) = selector.block {
        records.by_block(block)
    } else {
        bail!("one of --id, --tx or --block is required");
    };

    for record in &hits {
        println!("{}", serde_json::to_string(record)?);
    }
    tracing::debug!(matches = hits.len(), "show complete");
    Ok(())
}

/// Execute the `status` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
fn cmd_status(data_dir: &Path, offer_id: u64) -> Result<()> {
    let store = ParquetStore::open(data_dir)?;
    let offer_id = U256::from(offer_id);

    let history = store.records().by_offer(offer_id);
    if history.is_empty() {
        bail!("no records for offer {offer_id}");
    }

    println!("{:<20} {:<10} {:<14} ID", "Time (UTC)", "Block", "Event");
    println!("{}", "-".repeat(100));
    for record in &history {
        let ctx = record.context();
        let time = i64::try_from(ctx.timestamp)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map_or_else(|| ctx.timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        println!(
            "{:<20} {:<10} {:<14} {}",
            time,
            ctx.block_number,
            record.kind().as_str(),
            record.id()
        );
    }

    let status = store
        .records()
        .offer_status(offer_id)
        .map_or("unknown", |s| s.as_str());
    println!("\nOffer {offer_id}: {status}");

    if let Some(cursor) = Cursor::load(data_dir)? {
        println!("Indexed up to block {}", cursor.last_block);
    }
    Ok(())
}

/// Execute the `report` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
fn cmd_report(
    data_dir: &Path,
    accounts: &[Address],
    side: Side,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<()> {
    if from > to {
        bail!("--from {from} is after --to {to}");
    }
    let from_ts = u64::try_from(from.timestamp()).with_context(|| format!("--from {from} is before 1970"))?;
    let to_ts = u64::try_from(to.timestamp()).with_context(|| format!("--to {to} is before 1970"))?;

    let store = ParquetStore::open(data_dir)?;
    let trades = store.records().accepted_by_account(accounts, side, from_ts, to_ts);
    for trade in &trades {
        println!("{}", serde_json::to_string(trade)?);
    }
    tracing::info!(accounts = accounts.len(), %side, trades = trades.len(), "report complete");
    Ok(())
}
