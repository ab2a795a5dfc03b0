//! Run the live simulator on a generated demo network.
//!
//! Subscribes one in-process listener to the statistics topic and logs what
//! it receives, until Ctrl-C.

use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use traffic_core::demo::synthetic_network;
use traffic_core::params::GeoBounds;
use traffic_core::traffic::TrafficProfileKind;
use traffic_core::{SystemClock, Topic};
use traffic_live::{Connection, ConnectionId, LiveConfig, Payload, SendError, TrafficService};

#[derive(Parser, Debug)]
#[command(name = "traffic_live", about = "Live city traffic simulator")]
struct LiveArgs {
    /// Seconds between ticks
    #[arg(long, env = "TRAFFIC_INTERVAL_SECS", default_value_t = 5.0)]
    interval_secs: f64,

    /// Pause after a failed tick
    #[arg(long, env = "TRAFFIC_RECOVERY_SECS", default_value_t = 5.0)]
    recovery_secs: f64,

    /// Seconds between keep-alive messages
    #[arg(long, env = "TRAFFIC_HEARTBEAT_SECS", default_value_t = 30.0)]
    heartbeat_secs: f64,

    /// RNG seed; random when unset
    #[arg(long, env = "TRAFFIC_SEED")]
    seed: Option<u64>,

    /// Roads in the generated network
    #[arg(long, env = "TRAFFIC_ROAD_COUNT", default_value_t = 40)]
    road_count: usize,

    /// Use a flat time-of-day profile instead of the rush-hour one
    #[arg(long)]
    flat_profile: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl LiveArgs {
    fn config(&self) -> LiveConfig {
        let profile = if self.flat_profile {
            TrafficProfileKind::Flat
        } else {
            TrafficProfileKind::Shenzhen
        };
        let config = LiveConfig::default()
            .with_interval_secs(self.interval_secs)
            .with_recovery_secs(self.recovery_secs)
            .with_heartbeat_secs(self.heartbeat_secs)
            .with_road_count(self.road_count)
            .with_profile(profile);
        match self.seed {
            Some(seed) => config.with_seed(seed),
            None => config,
        }
    }
}

/// Logs a one-line summary of each statistics message.
struct LogConnection {
    id: ConnectionId,
}

#[async_trait]
impl Connection for LogConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), SendError> {
        let data = &payload["data"];
        info!(
            total_vehicles = %data["totalVehicles"],
            average_speed = %data["averageSpeed"],
            congestion_index = %data["congestionIndex"],
            "statistics"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let args = LiveArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    if let Err(e) = run(args).await {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

async fn run(args: LiveArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config();
    let network = synthetic_network(
        config.seed.unwrap_or_else(rand::random),
        config.road_count,
        &GeoBounds::default(),
    );
    info!(
        roads = network.roads.len(),
        districts = network.districts.len(),
        interval_secs = config.interval_secs,
        seed = ?config.seed,
        "starting traffic service"
    );

    let service = TrafficService::new(
        config,
        &network.roads,
        &network.districts,
        Arc::new(SystemClock),
    )?;
    service
        .subscribe(Topic::Statistics, Arc::new(LogConnection { id: ConnectionId::next() }))
        .await?;
    service.start()?;
    let heartbeat = service.spawn_heartbeat()?;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    heartbeat.stop();
    service.shutdown().await;
    Ok(())
}
