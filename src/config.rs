//! Command line and environment configuration, and the wiring of stores and
//! clients it selects.

use crate::application::cards::CardService;
use crate::application::orchestrator::{ChargeGuard, ChargeOrchestrator, DEFAULT_REMOTE_TIMEOUT};
use crate::domain::card::{CardId, CardStatus};
use crate::domain::charge::{ChargeId, Metadata};
use crate::domain::ports::{CardServiceClientBox, CardStoreBox, ChargeStoreBox};
use crate::error::Result;
use crate::infrastructure::card_client::{HttpCardClient, LocalCardClient};
use crate::infrastructure::in_memory::{InMemoryCardStore, InMemoryChargeStore};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Parser)]
#[command(author, version, about = "Virtual card issuing and charging", long_about = None)]
pub struct Cli {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, global = true, env = "GHOSTPAY_DB_PATH")]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an HTTP service
    #[command(subcommand)]
    Serve(ServeCommand),
    /// Manage cards directly against the card store
    #[command(subcommand)]
    Card(CardCommand),
    /// Run charges and inspect them
    #[command(subcommand)]
    Charge(ChargeCommand),
}

#[derive(Debug, Subcommand)]
pub enum ServeCommand {
    /// The card service endpoint (/cards)
    CardService {
        #[command(flatten)]
        listen: ListenArgs,
        #[arg(long, env = "CARD_SERVICE_PORT", default_value_t = 3001)]
        port: u16,
    },
    /// The charge service (/charges), talking to a remote card service
    ChargeService {
        #[command(flatten)]
        listen: ListenArgs,
        #[arg(long, env = "CHARGE_SERVICE_PORT", default_value_t = 3002)]
        port: u16,
        #[arg(long, env = "CARD_SERVICE_URL", default_value = "http://localhost:3001")]
        card_service_url: String,
        #[command(flatten)]
        charging: ChargeArgs,
    },
    /// Both services in one process, sharing the store
    Standalone {
        #[command(flatten)]
        listen: ListenArgs,
        #[arg(long, env = "GHOSTPAY_PORT", default_value_t = 3000)]
        port: u16,
        #[command(flatten)]
        charging: ChargeArgs,
    },
}

#[derive(Debug, Args)]
pub struct ListenArgs {
    #[arg(long, env = "GHOSTPAY_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,
}

#[derive(Debug, Clone, Args)]
pub struct ChargeArgs {
    /// Bound on each call to the card service, in milliseconds
    #[arg(long, env = "CARD_SERVICE_TIMEOUT_MS", default_value_t = 5000,
          value_parser = clap::value_parser!(u64).range(1..))]
    pub remote_timeout_ms: u64,

    /// Mark cards used with a plain overwrite instead of compare-and-swap
    #[arg(long)]
    pub unguarded: bool,
}

impl Default for ChargeArgs {
    fn default() -> Self {
        Self {
            remote_timeout_ms: DEFAULT_REMOTE_TIMEOUT.as_millis() as u64,
            unguarded: false,
        }
    }
}

impl ChargeArgs {
    pub fn remote_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_timeout_ms)
    }

    pub fn guard(&self) -> ChargeGuard {
        if self.unguarded {
            ChargeGuard::Unguarded
        } else {
            ChargeGuard::CompareAndSwap
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CardCommand {
    /// Issue a new card
    Create {
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        /// JSON object attached to the card
        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
    },
    /// Show a card (masked)
    Get { id: String },
    /// Move an active card to expired or cancelled
    Retire {
        id: CardId,
        #[arg(long)]
        status: CardStatus,
    },
}

#[derive(Debug, Subcommand)]
pub enum ChargeCommand {
    /// Charge a card
    Create {
        #[arg(long)]
        card_id: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        currency: String,
        #[arg(long)]
        description: Option<String>,
        /// JSON object attached to the charge
        #[arg(long, value_parser = parse_metadata)]
        metadata: Option<Metadata>,
        /// Use a remote card service instead of the local card store
        #[arg(long, env = "CARD_SERVICE_URL")]
        card_service_url: Option<String>,
        #[command(flatten)]
        charging: ChargeArgs,
    },
    /// Show a charge
    Get { id: ChargeId },
    /// List the charges recorded against a card
    List {
        #[arg(long)]
        card_id: CardId,
    },
}

fn parse_metadata(raw: &str) -> std::result::Result<Metadata, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err("metadata must be a JSON object".to_string()),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

/// Card and charge stores selected by the configuration.
pub struct Stores {
    pub cards: CardStoreBox,
    pub charges: ChargeStoreBox,
}

/// Opens the stores at `db_path`, or in-memory ones when no path is given.
#[cfg(feature = "storage-rocksdb")]
pub fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    use crate::infrastructure::rocksdb::RocksDBStore;

    if let Some(path) = db_path {
        let store = RocksDBStore::open(path)?;
        return Ok(Stores {
            cards: Box::new(store.clone()),
            charges: Box::new(store),
        });
    }
    Ok(in_memory_stores())
}

/// Opens the stores at `db_path`, or in-memory ones when no path is given.
#[cfg(not(feature = "storage-rocksdb"))]
pub fn open_stores(db_path: Option<&Path>) -> Result<Stores> {
    if db_path.is_some() {
        warn!(
            "Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(in_memory_stores())
}

fn in_memory_stores() -> Stores {
    Stores {
        cards: Box::new(InMemoryCardStore::new()),
        charges: Box::new(InMemoryChargeStore::new()),
    }
}

/// Builds a charge orchestrator around `cards`.
pub fn orchestrator(
    cards: CardServiceClientBox,
    charges: ChargeStoreBox,
    charging: &ChargeArgs,
) -> ChargeOrchestrator {
    if charging.unguarded {
        warn!("concurrent charges against one card are not serialized (--unguarded)");
    }
    ChargeOrchestrator::new(cards, charges)
        .with_remote_timeout(charging.remote_timeout())
        .with_guard(charging.guard())
}

/// Wires a card service and an orchestrator that reaches it in-process.
pub fn local_services(stores: Stores, charging: &ChargeArgs) -> (Arc<CardService>, ChargeOrchestrator) {
    let service = Arc::new(CardService::new(stores.cards));
    let client = Box::new(LocalCardClient::new(Arc::clone(&service)));
    let orchestrator = orchestrator(client, stores.charges, charging);
    (service, orchestrator)
}

/// Builds an orchestrator that reaches the card service at `url`.
pub fn remote_orchestrator(
    url: &str,
    charges: ChargeStoreBox,
    charging: &ChargeArgs,
) -> Result<ChargeOrchestrator> {
    let client = HttpCardClient::new(url, charging.remote_timeout())?;
    Ok(orchestrator(Box::new(client), charges, charging))
}
