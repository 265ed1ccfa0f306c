// crates/annex-daemon/src/main.rs
//
// Binary entrypoint for the Annex flywheel daemon.
//
// Initializes tracing, parses CLI arguments, loads configuration, opens the
// store, and resumes (or creates) the comptroller. Then either serves
// transactions from stdin against a live block clock, replays a transaction
// file, or prints the stored state.

mod actor;
mod config;
mod events;
mod input;
mod scheduler;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use actor::{load_or_genesis, FlywheelActor, FlywheelHandle};
use config::DaemonConfig;
use events::FlywheelNotice;
use scheduler::BlockClock;

use annex_core::AccountId;
use annex_flywheel::{ActivitySource, Ann, LedgerSnapshot, RewardVault};
use annex_store::{FlywheelStore, MemoryStore, RocksStore};

/// Annex flywheel daemon: accrues and pays ANN rewards for market activity.
#[derive(Parser, Debug)]
#[command(name = "annex-daemon", version = "0.1.0", about = "Annex reward flywheel daemon")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "~/.annex/config.toml")]
    config: String,

    /// Override the data directory from the config file.
    #[arg(long)]
    data_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read JSON-lines transactions from stdin and apply them at the current
    /// block-clock height.
    Serve,
    /// Apply every transaction in a JSON-lines file, in order.
    Replay {
        /// File of transactions, one JSON object per line.
        path: String,
        /// Run against an in-memory store; nothing is written to disk.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the stored state.
    Inspect {
        /// Show one account's balances instead of the summary.
        #[arg(long)]
        account: Option<AccountId>,
    },
    /// Print stored receipts.
    Receipts {
        #[arg(long, default_value_t = 0)]
        from: u64,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration from TOML file, falling back to defaults if the file
    // is not found.
    let config_result = DaemonConfig::load(&args.config);
    let mut daemon_config = match &config_result {
        Ok(cfg) => cfg.clone(),
        Err(_) => DaemonConfig::default(),
    };

    // Initialize tracing subscriber for structured logging. RUST_LOG wins over
    // the configured level. Logs go to stderr; stdout carries results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&daemon_config.log_level)
                }),
        )
        .init();

    match config_result {
        Ok(_) => tracing::info!("Loaded configuration from {}", args.config),
        Err(e) => tracing::warn!(
            "Could not load config from {}: {}. Using defaults.",
            args.config,
            e
        ),
    }

    // CLI --data-dir flag overrides the config file value.
    if let Some(dir) = args.data_dir {
        daemon_config.data_dir = dir;
    }

    tracing::info!("Annex Flywheel Daemon v0.1.0");
    tracing::info!("Data directory: {}", daemon_config.data_dir);

    match args.command {
        Command::Serve => {
            let store: Arc<dyn FlywheelStore> =
                Arc::new(RocksStore::open(&daemon_config.db_path())?);
            serve(&daemon_config, store).await?;
        }
        Command::Replay { path, dry_run } => {
            let store: Arc<dyn FlywheelStore> = if dry_run {
                tracing::info!("Dry run: using in-memory store");
                Arc::new(MemoryStore::new())
            } else {
                Arc::new(RocksStore::open(&daemon_config.db_path())?)
            };
            replay(&daemon_config, store, &path).await?;
        }
        Command::Inspect { account } => {
            let store = RocksStore::open_read_only(&daemon_config.db_path())?;
            match store.load_snapshot().await? {
                Some(snapshot) => inspect(&snapshot, account)?,
                None => println!("no snapshot stored under {}", daemon_config.data_dir),
            }
        }
        Command::Receipts { from, limit } => {
            let store = RocksStore::open_read_only(&daemon_config.db_path())?;
            for receipt in store.list_receipts(from, limit).await? {
                println!("{}", serde_json::to_string(&receipt)?);
            }
        }
    }

    tracing::info!("Annex daemon shut down gracefully");
    Ok(())
}

/// Start the actor over `store`, resuming from its snapshot if there is one.
type Started = (FlywheelHandle, broadcast::Sender<FlywheelNotice>, u64);

async fn start_actor(
    config: &DaemonConfig,
    store: Arc<dyn FlywheelStore>,
) -> Result<Started, Box<dyn std::error::Error>> {
    let comptroller = load_or_genesis(store.as_ref(), config.genesis()).await?;
    let height = comptroller.height();
    let (notice_tx, _) = broadcast::channel::<FlywheelNotice>(config.event_buffer.max(1));
    let (handle, _task) = FlywheelActor::spawn(comptroller, store, notice_tx.clone(), 64);
    Ok((handle, notice_tx, height))
}

async fn serve(
    config: &DaemonConfig,
    store: Arc<dyn FlywheelStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (handle, notice_tx, height) = start_actor(config, store).await?;

    // Log every notice from a separate subscriber.
    let mut notices = notice_tx.subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(FlywheelNotice::Committed { seq, block, op, events }) => {
                    tracing::info!(seq, block, op = %op, events = events.len(), "committed");
                }
                Ok(FlywheelNotice::Rejected { block, op, code, message }) => {
                    tracing::warn!(block, op = %op, code = %code, "rejected: {}", message);
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("Notice subscriber lagged by {} messages", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let (clock, heights) = BlockClock::new(height, config.block_interval_ms);
    let clock_task = tokio::spawn(async move { clock.run().await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let submission = match input::parse_line(&line) {
                    Ok(Some(submission)) => submission,
                    Ok(None) => continue,
                    Err(e) => {
                        print_error("invalid_input", &e.to_string());
                        continue;
                    }
                };
                let clock_height = *heights.borrow();
                let height = submission.block.unwrap_or(clock_height);
                match handle.apply(height, submission.tx).await {
                    Ok(receipt) => println!("{}", serde_json::to_string(&receipt)?),
                    Err(e) => print_error(e.code(), &e.to_string()),
                }
            }
        }
    }

    drop(heights);
    let _ = clock_task.await;
    Ok(())
}

async fn replay(
    config: &DaemonConfig,
    store: Arc<dyn FlywheelStore>,
    path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = tokio::fs::read_to_string(config::expand_tilde(path)).await?;
    let (handle, _notices, mut height) = start_actor(config, store).await?;

    let (mut applied, mut rejected) = (0u64, 0u64);
    for (number, line) in contents.lines().enumerate() {
        let Some(submission) = input::parse_line(line)
            .map_err(|e| format!("{}:{}: {}", path, number + 1, e))?
        else {
            continue;
        };
        height = submission.block.unwrap_or(height);
        match handle.apply(height, submission.tx).await {
            Ok(_) => applied += 1,
            Err(e) => {
                rejected += 1;
                tracing::warn!("{}:{}: {} ({})", path, number + 1, e, e.code());
            }
        }
    }

    let status = handle.status().await?;
    tracing::info!(applied, rejected, height = status.height, "replay finished");
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

fn inspect(
    snapshot: &LedgerSnapshot,
    account: Option<AccountId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let c = &snapshot.comptroller;
    match account {
        Some(account) => {
            println!("account     {}", account);
            println!("ANN balance {}", Ann(c.balance_of(&account)));
            println!("accrued     {}", Ann(c.accrued(&account)));
            for (market, entry) in c.ledger().markets() {
                let activity = c.activity().account_activity(market, &account);
                let checkpoint = c
                    .ledger()
                    .checkpoint(market, &account)
                    .map(|index| index.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<16} {:<7} activity {} checkpoint {}",
                    market, entry.kind, activity, checkpoint
                );
            }
        }
        None => {
            let totals = c.totals();
            println!("height        {}", c.height());
            println!("digest        {}", snapshot.digest()?);
            println!("admin         {}", c.config().admin());
            println!("emission rate {}", c.config().emission_rate());
            println!(
                "reward pool   {} ({})",
                c.reward_pool(),
                Ann(c.token().balance_of(&c.reward_pool()))
            );
            println!(
                "treasury      {} ({}, owner {})",
                c.treasury().account(),
                Ann(c.treasury().balance(c.token())),
                c.treasury().owner()
            );
            println!("emitted       {}", Ann(totals.emitted));
            println!("discarded     {}", Ann(totals.discarded));
            println!("paid          {}", Ann(totals.paid));
            println!("owed          {}", Ann(c.ledger().total_accrued()?));
            for (market, entry) in c.ledger().markets() {
                let (total, holders) = c
                    .activity()
                    .market(market)
                    .map(|book| (book.total, book.balances.len()))
                    .unwrap_or((0, 0));
                println!(
                    "  {:<16} {:<7} {:<8} index {} @ {} total {} holders {}",
                    market,
                    entry.kind,
                    if entry.eligible { "eligible" } else { "delisted" },
                    entry.state.index,
                    entry.state.block,
                    total,
                    holders
                );
            }
        }
    }
    Ok(())
}

fn print_error(code: &str, message: &str) {
    println!(
        "{}",
        serde_json::json!({ "error": code, "message": message })
    );
}
