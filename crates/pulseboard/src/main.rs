use std::sync::Arc;

use livewire::RealTimeDistributor;
use pulseboard::bridge::ScoreBridge;
use pulseboard::config::PulseboardConfig;
use pulseboard::store::MemoryResponseStore;
use pulseboard::telemetry;
use scorecard::ScoreAggregator;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Config is read before the subscriber exists, hence eprintln here.
    let config_path = PulseboardConfig::path_from_env();
    eprintln!("loading pulseboard configuration from {}", config_path);
    let config = PulseboardConfig::load_or_default(&config_path)?;

    telemetry::init_logging();
    info!(path = %config_path, "configuration loaded");

    let store = Arc::new(MemoryResponseStore::new());
    let aggregator = Arc::new(ScoreAggregator::new(config.scoring.clone(), &config.lexicon));
    let distributor = RealTimeDistributor::from_config(config.live.clone());

    let bridge = ScoreBridge::new(store, aggregator, distributor.clone());
    bridge.attach();

    let token = config.resolved_token();
    let mode = distributor.initialize(&token).await;
    info!(%mode, "realtime distribution initialized");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, disconnecting");
    distributor.disconnect().await;

    Ok(())
}
