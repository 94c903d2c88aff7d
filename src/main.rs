//! autocheckout - automatic parking checkout engine
//!
//! Runs the engine against in-memory collaborators: a seeded lot with a
//! sensor-enabled zone, ready to receive position and sensor traffic. The
//! production deployment embeds [`autocheckout::services::CheckoutEngine`]
//! behind the HTTP layer instead.
//!
//! Module structure:
//! - `domain/` - Core business types (Checkout, Ticket, ZoneConfig, geo)
//! - `io/` - Collaborator trait boundaries and in-memory implementations
//! - `services/` - Business logic (Engine, Tracker, Coordinator, Zones)
//! - `infra/` - Infrastructure (Config)

use autocheckout::domain::ticket::ParkingId;
use autocheckout::domain::zone::{DetectionMode, GeoPoint, SensorId, ZoneConfig};
use autocheckout::infra::Config;
use autocheckout::io::memory::{
    InMemoryCheckoutStore, InMemoryInventory, InMemoryTicketStore, RecordingNotifier,
    StaticZoneStore,
};
use autocheckout::io::stores::SystemClock;
use autocheckout::services::{CheckoutEngine, Collaborators, TokioScheduler};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Automatic parking checkout engine
#[derive(Parser, Debug)]
#[command(name = "autocheckout", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to the CONFIG_FILE
    /// environment variable, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for full event visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git_hash = env!("GIT_HASH"), "autocheckout starting");

    let args = Args::parse();
    let config_path = Config::resolve_config_path(args.config.as_deref());
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        site_id = %config.site_id(),
        rate_per_hour = %config.rate_per_hour(),
        max_samples = %config.max_samples(),
        sweep_interval_secs = %config.sweep_interval_secs(),
        "config_loaded"
    );

    // Demo collaborators; a real deployment provides database-backed stores
    let tickets = Arc::new(InMemoryTicketStore::new());
    let checkouts = Arc::new(InMemoryCheckoutStore::with_tickets(tickets.clone()));
    let inventory = Arc::new(InMemoryInventory::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let harbor = ParkingId("harbor-lot".to_string());
    inventory.add_lot(harbor.clone(), "Harbor Lot", 120);
    checkouts.register_lot_name(harbor.clone(), "Harbor Lot");

    let zone_store = StaticZoneStore::new(vec![ZoneConfig::new(
        harbor,
        DetectionMode::Hybrid,
        GeoPoint { lat: 64.1466, lng: -21.9426 },
    )
    .with_sensor(SensorId("S1".to_string()))]);

    let engine = CheckoutEngine::new(
        &config,
        Collaborators {
            tickets,
            checkouts,
            inventory,
            notifier,
            scheduler: Arc::new(TokioScheduler),
            clock: Arc::new(SystemClock),
        },
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    engine.start(&zone_store, shutdown_rx).await;

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");
    let _ = shutdown_tx.send(true);

    info!("autocheckout shutdown complete");
    Ok(())
}
