//! gastos-sync daemon and CLI
//!
//! Wires the offline sync core together: local store, mutation queue, sync
//! engine, connectivity monitor and the HTTP sink. Subcommands exercise the
//! core operations; `run` starts the long-lived monitor.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use gastos_sync::config::Config;
use gastos_sync::model::ExpenseFields;
use gastos_sync::network::{self, ConnectivityMonitor, SyncNotice};
use gastos_sync::queue::MutationQueue;
use gastos_sync::records::RecordRepository;
use gastos_sync::service::ExpenseService;
use gastos_sync::storage::LocalStore;
use gastos_sync::sync::{HttpSink, RemoteSink, SyncEngine};

#[derive(Parser)]
#[command(name = "gastos-sync")]
#[command(about = "Offline-first sync core for the Gastos expense tracker")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "gastos-sync.toml")]
    config: String,

    /// Data directory
    #[arg(short, long, env = "GASTOS_DATA_DIR")]
    data_dir: Option<String>,

    /// Remote sink URL (overrides config file)
    #[arg(long, env = "GASTOS_API_URL")]
    api_url: Option<String>,

    /// Access PIN (overrides config file)
    #[arg(long, env = "GASTOS_PIN")]
    pin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record a new expense
    Add {
        /// ISO date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Expense category
        #[arg(long)]
        category: String,
        /// Amount in reais, e.g. 50.00
        #[arg(long)]
        amount: f64,
        /// Payment method
        #[arg(long)]
        payment: String,
        /// Essential spending
        #[arg(long)]
        essential: bool,
        /// Fixed/recurring expense
        #[arg(long)]
        recurring: bool,
    },

    /// List the historical record set
    List,

    /// Show mutations waiting to sync
    Pending,

    /// Drain the pending queue once
    Sync,

    /// Delete a record by id
    Delete {
        /// Record id
        #[arg(long)]
        id: Uuid,
    },

    /// Import records from a JSON backup
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// Export the historical set to JSON
    Export {
        /// Path to write
        file: PathBuf,
    },

    /// Run the connectivity monitor until interrupted
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("gastos_sync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = if std::path::Path::new(&cli.config).exists() {
        let content = std::fs::read_to_string(&cli.config)
            .with_context(|| format!("reading config file {}", cli.config))?;
        toml::from_str(&content).context("parsing config file")?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    if let Some(data_dir) = cli.data_dir {
        config.node.data_dir = PathBuf::from(data_dir);
    }
    if let Some(api_url) = cli.api_url {
        config.remote.api_url = api_url;
    }
    if let Some(pin) = cli.pin {
        config.remote.pin = pin;
    }

    let store = Arc::new(LocalStore::open(
        &config.node.data_dir,
        &config.node.instance_name,
    )?);
    let repo = Arc::new(RecordRepository::new(store.clone()));
    let queue = Arc::new(MutationQueue::new(store));
    let engine = Arc::new(SyncEngine::new(queue.clone()));
    let sink: Arc<dyn RemoteSink> = Arc::new(HttpSink::new(
        config.remote.api_url.clone(),
        Duration::from_secs(config.remote.timeout_secs),
    ));

    // One-shot commands assume connectivity; the sink reports failures and
    // failed writes land in the queue either way.
    let (online_tx, online_rx) = network::connectivity_channel(true);

    let service = ExpenseService::new(
        repo.clone(),
        queue.clone(),
        engine.clone(),
        sink.clone(),
        online_rx.clone(),
        config.remote.pin.clone(),
    );

    match cli.command {
        Command::Add {
            date,
            category,
            amount,
            payment,
            essential,
            recurring,
        } => {
            let fields = ExpenseFields {
                date: sheet_date(&date),
                category,
                amount: format_brl(amount),
                payment_method: payment,
                essential,
                recurring,
            };
            let outcome = service.save(fields, date).await?;
            if outcome.offline {
                println!(
                    "Saved locally; {} mutation(s) waiting to sync",
                    outcome.pending
                );
            } else if outcome.backlog_synced > 0 {
                println!(
                    "Saved; {} queued mutation(s) synced along the way",
                    outcome.backlog_synced
                );
            } else {
                println!("Saved");
            }
        }

        Command::List => {
            for record in repo.list().await? {
                println!(
                    "{}  {}  {:<20} {:>12}  {}",
                    record.id,
                    record.date_iso,
                    record.fields.category,
                    record.fields.amount,
                    record.fields.payment_method,
                );
            }
        }

        Command::Pending => {
            let pending = queue.list_pending().await?;
            println!("{} mutation(s) pending", pending.len());
            for entry in pending {
                println!("  {}  {:?}", entry.timestamp, entry.payload.action);
            }
        }

        Command::Sync => {
            let report = engine.drain_and_sync(sink.as_ref()).await?;
            println!(
                "synced: {}  failed: {}  still pending: {}",
                report.succeeded, report.failed, report.still_pending
            );
        }

        Command::Delete { id } => {
            if service.delete(id).await? {
                println!("Deleted {id}");
            } else {
                println!("No record with id {id}");
            }
        }

        Command::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let count = service.import_json(&json).await?;
            println!("Imported {count} record(s)");
        }

        Command::Export { file } => {
            let json = service.export_json().await?;
            std::fs::write(&file, json)
                .with_context(|| format!("writing {}", file.display()))?;
            println!("Exported to {}", file.display());
        }

        Command::Run => {
            run_monitor(&config, engine, queue, sink, online_tx, online_rx).await?;
        }
    }

    Ok(())
}

/// Start the probe (when configured), perform the optional startup drain and
/// run the monitor loop, printing notices as they arrive.
async fn run_monitor(
    config: &Config,
    engine: Arc<SyncEngine>,
    queue: Arc<MutationQueue>,
    sink: Arc<dyn RemoteSink>,
    online_tx: tokio::sync::watch::Sender<bool>,
    online_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<()> {
    if let Some(probe_url) = config.sync.probe_url.clone() {
        let timeout = Duration::from_secs(config.remote.timeout_secs);
        let interval = Duration::from_secs(config.sync.probe_interval_secs);

        // Seed the initial state from the environment before anyone acts on it
        let initially_online = network::probe_once(&probe_url, timeout).await;
        online_tx.send_replace(initially_online);

        tokio::spawn(network::run_probe(probe_url, interval, timeout, online_tx));
    }

    if config.sync.drain_on_start && *online_rx.borrow() {
        match engine.drain_and_sync(sink.as_ref()).await {
            Ok(report) if report.succeeded > 0 => {
                info!(synced = report.succeeded, "Startup drain synced backlog");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Startup drain failed"),
        }
    }

    let (notice_tx, mut notice_rx) = mpsc::channel(32);
    let monitor = ConnectivityMonitor::new(online_rx, engine, queue, sink, notice_tx);
    tokio::spawn(monitor.run());

    info!("Monitor running, Ctrl-C to stop");
    loop {
        tokio::select! {
            Some(notice) = notice_rx.recv() => match notice {
                SyncNotice::Synced { count } => {
                    println!("{count} offline expense(s) synced");
                }
                SyncNotice::PendingChanged { pending } => {
                    println!("{pending} mutation(s) still pending");
                }
                SyncNotice::ConnectivityChanged { online } => {
                    println!("connectivity: {}", if online { "online" } else { "offline" });
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                break;
            }
        }
    }
    Ok(())
}

/// Convert an ISO date (YYYY-MM-DD) to the spreadsheet's M/D/YYYY format.
fn sheet_date(iso: &str) -> String {
    let mut parts = iso.splitn(3, '-');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(y), Some(m), Some(d)) if !y.is_empty() => format!(
            "{}/{}/{}",
            m.trim_start_matches('0'),
            d.trim_start_matches('0'),
            y
        ),
        _ => iso.to_string(),
    }
}

/// Format an amount the way the spreadsheet expects, e.g. 1234.5 → "R$ 1.234,50".
fn format_brl(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let units = cents / 100;
    let rem = (cents % 100).abs();

    let digits = units.abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    let sign = if units < 0 { "-" } else { "" };
    format!("R$ {sign}{grouped},{rem:02}")
}
