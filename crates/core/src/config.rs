//! Configuration types

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ConfigError, ConfigResult};

/// Default config file name, looked up without extension
pub const DEFAULT_CONFIG_FILE: &str = "ticker";

/// Complete ticker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerConfig {
    /// Base URL of the REST price API
    pub rest_url: String,
    /// WebSocket endpoint pushing price updates
    pub stream_url: String,
    /// Asset symbols to track, in display order
    pub assets: Vec<String>,
    /// Asset whose price history feeds the chart
    pub chart_asset: String,
    /// Number of recent prices kept for the chart
    pub chart_window: usize,
    pub chart_interval_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub reconnect_base_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    /// A session must stay up this long before reconnect backoff resets
    pub stable_session_ms: u64,
    /// `host:port` probed to decide whether the network is back
    pub probe_addr: String,
    pub probe_interval_ms: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            rest_url: "https://api.coincap.io".to_string(),
            stream_url: "wss://ws.coincap.io/prices".to_string(),
            assets: vec![
                "bitcoin".to_string(),
                "ethereum".to_string(),
                "monero".to_string(),
                "litecoin".to_string(),
            ],
            chart_asset: "bitcoin".to_string(),
            chart_window: 10,
            chart_interval_ms: 1_000,
            ping_interval_ms: 5_000,
            pong_timeout_ms: 5_000,
            connect_timeout_ms: 30_000,
            request_timeout_ms: 10_000,
            reconnect_base_delay_ms: 1_000,
            reconnect_max_delay_ms: 60_000,
            stable_session_ms: 10_000,
            probe_addr: "ws.coincap.io:443".to_string(),
            probe_interval_ms: 2_000,
        }
    }
}

impl TickerConfig {
    /// Load from the default file (or `TICKER_CONFIG`) and `TICKER_*` env vars
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var("TICKER_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load from an optional file at `path`, then apply env overrides
    pub fn load_from(path: &str) -> ConfigResult<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("TICKER")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("assets"),
            )
            .build()?;

        let config: TickerConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.assets.is_empty() {
            return Err(ConfigError::Invalid("no assets configured".to_string()));
        }
        if self.assets.iter().any(|a| a.trim().is_empty()) {
            return Err(ConfigError::Invalid("empty asset symbol".to_string()));
        }
        if !self.assets.contains(&self.chart_asset) {
            return Err(ConfigError::Invalid(format!(
                "chart asset {} is not among tracked assets",
                self.chart_asset
            )));
        }
        if self.chart_window == 0 {
            return Err(ConfigError::Invalid("chart_window must be at least 1".to_string()));
        }

        let intervals = [
            ("chart_interval_ms", self.chart_interval_ms),
            ("ping_interval_ms", self.ping_interval_ms),
            ("pong_timeout_ms", self.pong_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("request_timeout_ms", self.request_timeout_ms),
            ("probe_interval_ms", self.probe_interval_ms),
        ];
        if let Some((name, _)) = intervals.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be non-zero", name)));
        }

        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(ConfigError::Invalid(
                "reconnect_max_delay_ms is below reconnect_base_delay_ms".to_string(),
            ));
        }

        Ok(())
    }

    pub fn chart_interval(&self) -> Duration {
        Duration::from_millis(self.chart_interval_ms)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }

    pub fn reconnect_max_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_delay_ms)
    }

    pub fn stable_session(&self) -> Duration {
        Duration::from_millis(self.stable_session_ms)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TickerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chart_asset, "bitcoin");
        assert_eq!(config.chart_window, 10);
        assert_eq!(config.chart_interval(), Duration::from_secs(1));
        assert_eq!(config.stable_session(), Duration::from_secs(10));
    }

    #[test]
    fn test_chart_asset_must_be_tracked() {
        let config = TickerConfig {
            chart_asset: "dogecoin".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = TickerConfig {
            chart_window: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = TickerConfig {
            ping_interval_ms: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ping_interval_ms"));
    }

    #[test]
    fn test_empty_assets_rejected() {
        let config = TickerConfig {
            assets: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!(
            "ticker-config-test-{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "assets = [\"bitcoin\", \"ethereum\"]\nchart_window = 20\n",
        )
        .unwrap();

        let config = TickerConfig::load_from(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.assets, vec!["bitcoin", "ethereum"]);
        assert_eq!(config.chart_window, 20);
        assert_eq!(config.stream_url, TickerConfig::default().stream_url);
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = TickerConfig::load_from("/nonexistent/ticker-config").unwrap();
        assert_eq!(config.assets.len(), 4);
    }
}
