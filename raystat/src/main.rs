use raystat::config;
use raystat::models::{ConnectionStatus, StatsSnapshot};
use raystat::services::engine::{SimulationEngine, StatsEngine};
use raystat::services::stats::{StatsEvent, StatsService, XrayStatsService};
use raystat::services::SharedTunnelMonitor;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = config::load_config();
    info!(
        "Monitoring inbound '{}' via 127.0.0.1:{}",
        config.inbound_tag, config.socks_port
    );

    let monitor = Arc::new(SharedTunnelMonitor::new());
    let engine: Arc<dyn StatsEngine> = Arc::new(SimulationEngine::new(&config.inbound_tag));
    let service = XrayStatsService::new(engine, monitor.clone(), &config);
    let mut events = service.subscribe();

    monitor.set_status(ConnectionStatus::Connected).await;
    service.start().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(StatsEvent::Updated(snapshot)) => print_snapshot(&snapshot),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    }

    service.stop().await;
    monitor.set_status(ConnectionStatus::Disconnected).await;
}

fn print_snapshot(snapshot: &StatsSnapshot) {
    for row in snapshot.display() {
        println!("{:<16} {}", row.label, row.value);
    }
    println!();
}
