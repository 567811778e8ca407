//! Console front end for the coin ticker
//!
//! Wires the REST client, WebSocket feed and network probe into a
//! supervisor and renders its state as plain text.

pub mod commands;
pub mod render;

use std::sync::Arc;

use ticker_core::TickerConfig;
use ticker_price_feed::{
    AssetsClient, ConnectionSupervisor, FeedConfig, PriceFeedClient, ProbeNetworkMonitor,
    SupervisorConfig,
};

pub use commands::{Command, UnknownCommand};
pub use render::{render_screen, sparkline};

/// Build a supervisor backed by the real network collaborators
pub fn build_supervisor(config: &TickerConfig) -> anyhow::Result<ConnectionSupervisor> {
    let source = AssetsClient::from_config(config)?;
    let feed = PriceFeedClient::new(FeedConfig::from(config))?;
    let network = ProbeNetworkMonitor::from_config(config);

    Ok(ConnectionSupervisor::new(
        SupervisorConfig::from(config),
        Arc::new(source),
        Arc::new(feed),
        Arc::new(network),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticker_core::SupervisorPhase;

    #[test]
    fn test_build_supervisor_from_defaults() {
        let supervisor = build_supervisor(&TickerConfig::default()).unwrap();
        assert_eq!(supervisor.phase(), SupervisorPhase::Idle);
        assert_eq!(supervisor.config().assets.len(), 4);
        assert_eq!(supervisor.config().chart_asset, "bitcoin");
    }

    #[test]
    fn test_build_supervisor_rejects_bad_stream_url() {
        let config = TickerConfig {
            stream_url: "http://ws.coincap.io/prices".to_string(),
            ..Default::default()
        };
        assert!(build_supervisor(&config).is_err());
    }
}
