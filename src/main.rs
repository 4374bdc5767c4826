use clap::Parser;
use minibank_ledger::application::accounts::AccountService;
use minibank_ledger::application::engine::LedgerEngine;
use minibank_ledger::application::history::{DEFAULT_PER_PAGE, HistoryQuery, Page};
use minibank_ledger::config::EngineConfig;
use minibank_ledger::domain::account::AccountId;
use minibank_ledger::domain::caller::Caller;
use minibank_ledger::domain::ports::{AccountStore, AuditSinkBox, LedgerStoreBox};
use minibank_ledger::infrastructure::audit::{JsonLinesAuditSink, TracingAuditSink};
use minibank_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use minibank_ledger::infrastructure::rate_limit::RateLimiter;
#[cfg(feature = "storage-rocksdb")]
use minibank_ledger::infrastructure::rocksdb::RocksDbLedgerStore;
use minibank_ledger::interfaces::csv::account_writer::AccountWriter;
use minibank_ledger::interfaces::csv::batch::{BatchProcessor, OPERATOR};
use minibank_ledger::interfaces::csv::command_reader::CommandReader;
use minibank_ledger::interfaces::csv::record_writer::RecordWriter;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input ledger commands CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Engine settings (TOML). Defaults apply when omitted.
    #[arg(long, env = "MINIBANK_CONFIG")]
    config: Option<PathBuf>,

    /// Append audit events to this JSON-lines file instead of the log.
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Print this account's history instead of the account table.
    #[arg(long)]
    history: Option<u64>,

    #[arg(long, default_value_t = 1)]
    page: usize,

    #[arg(long, default_value_t = DEFAULT_PER_PAGE)]
    per_page: usize,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "minibank_ledger=info,audit=info".into()),
        )
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn open_store(db_path: Option<&Path>, config: &EngineConfig) -> Result<LedgerStoreBox> {
    let lock_timeout = config.store.lock_timeout();
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = RocksDbLedgerStore::open_with_lock_timeout(path, lock_timeout)
                .into_diagnostic()?;
            info!(path = %path.display(), "using RocksDB storage");
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "persistent storage requested via --db-path, but the 'storage-rocksdb' feature is not enabled; falling back to in-memory storage"
            );
            Ok(Arc::new(InMemoryLedgerStore::with_lock_timeout(lock_timeout)))
        }
        None => Ok(Arc::new(InMemoryLedgerStore::with_lock_timeout(lock_timeout))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).into_diagnostic()?,
        None => EngineConfig::default(),
    };
    let store = open_store(cli.db_path.as_deref(), &config)?;
    let audit: AuditSinkBox = match &cli.audit_log {
        Some(path) => Arc::new(JsonLinesAuditSink::open(path).await.into_diagnostic()?),
        None => Arc::new(TracingAuditSink),
    };

    let engine = LedgerEngine::new(Arc::clone(&store), &config).with_audit(Arc::clone(&audit));
    let accounts = AccountService::new(Arc::clone(&store)).with_audit(audit);
    let limiter = config.rate_limit.clone().map(RateLimiter::start);
    let mut batch = BatchProcessor::new(engine, accounts);
    if let Some(limiter) = &limiter {
        batch = batch.with_rate_limiter(Arc::clone(limiter));
    }

    // Process commands
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = CommandReader::new(file);
    let (mut applied, mut rejected) = (0usize, 0usize);
    for (index, command) in reader.commands().enumerate() {
        let row = index + 1;
        match command {
            Ok(command) => match batch.apply(command).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    rejected += 1;
                    warn!(row, kind = ?e.kind(), error = %e, "command rejected");
                }
            },
            Err(e) => {
                rejected += 1;
                warn!(row, error = %e, "unreadable command");
            }
        }
    }
    info!(applied, rejected, "batch finished");

    if let Some(limiter) = limiter {
        limiter.shutdown().await;
    }

    let stdout = io::stdout();
    match cli.history {
        Some(account) => {
            let query = HistoryQuery::new(store);
            let records = query
                .history(
                    &Caller::admin(OPERATOR),
                    AccountId(account),
                    Page::new(cli.page, cli.per_page),
                )
                .await
                .into_diagnostic()?;
            let mut writer = RecordWriter::new(stdout.lock());
            writer.write_records(&records).into_diagnostic()?;
        }
        None => {
            let accounts = store.all_accounts().await.into_diagnostic()?;
            let mut writer = AccountWriter::new(stdout.lock());
            writer.write_accounts(accounts).into_diagnostic()?;
        }
    }

    Ok(())
}
