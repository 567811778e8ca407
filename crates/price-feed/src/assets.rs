//! REST client for the initial full price snapshot

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use ticker_core::{AssetPrice, LoadError, LoadResult, TickerConfig};

/// One-shot source of every tracked asset's current price
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch current prices for `assets`. An empty result is an error.
    async fn fetch_all(&self, assets: &[String]) -> LoadResult<Vec<AssetPrice>>;
}

/// Response body of `GET /v2/assets`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetsResponse {
    #[serde(default)]
    pub data: Option<Vec<AssetItem>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "priceUsd")]
    pub price_usd: Option<serde_json::Value>,
}

impl AssetsResponse {
    /// Convert to asset prices.
    ///
    /// Items without an id are skipped and unreadable prices become 0.
    pub fn into_prices(self) -> LoadResult<Vec<AssetPrice>> {
        let prices: Vec<AssetPrice> = self
            .data
            .unwrap_or_default()
            .into_iter()
            .filter_map(|item| {
                let id = item.id?;
                let price = item.price_usd.as_ref().and_then(parse_price).unwrap_or(0.0);
                Some(AssetPrice::new(id, price))
            })
            .collect();

        if prices.is_empty() {
            return Err(LoadError::NoAssets);
        }
        Ok(prices)
    }
}

fn parse_price(value: &serde_json::Value) -> Option<f64> {
    let price = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

/// HTTP client for the assets endpoint
#[derive(Debug, Clone)]
pub struct AssetsClient {
    http: reqwest::Client,
    base_url: String,
}

impl AssetsClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> LoadResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LoadError::Request(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &TickerConfig) -> LoadResult<Self> {
        Self::new(config.rest_url.clone(), config.request_timeout())
    }

    fn assets_url(&self) -> String {
        format!("{}/v2/assets", self.base_url)
    }
}

#[async_trait]
impl SnapshotSource for AssetsClient {
    async fn fetch_all(&self, assets: &[String]) -> LoadResult<Vec<AssetPrice>> {
        let url = self.assets_url();
        debug!("Fetching {} assets from {}", assets.len(), url);

        let response = self
            .http
            .get(&url)
            .query(&[("ids", assets.join(","))])
            .send()
            .await
            .map_err(|e| LoadError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status(status.as_u16()));
        }

        let body: AssetsResponse = response
            .json()
            .await
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let prices = body.into_prices()?;
        info!("Fetched {} asset prices", prices.len());
        Ok(prices)
    }
}
