//! WebSocket price feed implementation

use futures::Stream;
use futures_util::{SinkExt, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

use ticker_core::{AssetPrice, PartialUpdate, PriceFeedError, PriceFeedResult, TickerConfig};

/// Boxed stream of partial updates handed out by a feed
pub type UpdateStream = Pin<Box<dyn Stream<Item = PartialUpdate> + Send>>;

/// Updates buffered between the socket task and the consumer
const UPDATE_BUFFER: usize = 256;

/// Feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub ws_url: String,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::from(&TickerConfig::default())
    }
}

impl From<&TickerConfig> for FeedConfig {
    fn from(config: &TickerConfig) -> Self {
        Self {
            ws_url: config.stream_url.clone(),
            ping_interval: config.ping_interval(),
            pong_timeout: config.pong_timeout(),
            connect_timeout: config.connect_timeout(),
        }
    }
}

/// Source of streaming price updates.
///
/// A subscription is single-use: once the stream ends, call `subscribe`
/// again for a fresh connection.
pub trait PriceFeed: Send + Sync {
    fn subscribe(&self, assets: &[String]) -> UpdateStream;
}

/// Streaming price client over a WebSocket
#[derive(Debug, Clone)]
pub struct PriceFeedClient {
    config: FeedConfig,
    base_url: Url,
}

impl PriceFeedClient {
    pub fn new(config: FeedConfig) -> PriceFeedResult<Self> {
        let base_url = Url::parse(&config.ws_url)
            .map_err(|e| PriceFeedError::InvalidUrl(format!("{}: {}", config.ws_url, e)))?;

        match base_url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(PriceFeedError::InvalidUrl(format!(
                    "unsupported scheme {}",
                    other
                )))
            }
        }

        Ok(Self { config, base_url })
    }

    /// Stream URL scoped to the given assets
    pub fn stream_url(&self, assets: &[String]) -> Url {
        let mut url = self.base_url.clone();
        url.query_pairs_mut().append_pair("assets", &assets.join(","));
        url
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }
}

impl PriceFeed for PriceFeedClient {
    fn subscribe(&self, assets: &[String]) -> UpdateStream {
        let url = self.stream_url(assets);
        Box::pin(FeedSubscription::new(url, self.config.clone()))
    }
}

/// A single feed connection exposed as a stream.
///
/// The socket is opened on first poll and closed when the subscription is
/// dropped.
pub struct FeedSubscription {
    pending: Option<(Url, FeedConfig, mpsc::Sender<PartialUpdate>)>,
    updates_rx: mpsc::Receiver<PartialUpdate>,
    task: Option<JoinHandle<()>>,
}

impl FeedSubscription {
    fn new(url: Url, config: FeedConfig) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(UPDATE_BUFFER);
        Self {
            pending: Some((url, config, updates_tx)),
            updates_rx,
            task: None,
        }
    }
}

impl Stream for FeedSubscription {
    type Item = PartialUpdate;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some((url, config, updates_tx)) = self.pending.take() {
            self.task = Some(tokio::spawn(run_connection(url, config, updates_tx)));
        }
        self.updates_rx.poll_recv(cx)
    }
}

impl Drop for FeedSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.task.take() {
            handle.abort();
        }
    }
}

async fn run_connection(url: Url, config: FeedConfig, updates_tx: mpsc::Sender<PartialUpdate>) {
    match connect_and_listen(&url, &config, &updates_tx).await {
        Ok(()) => debug!("Price feed consumer went away, closing {}", url),
        Err(e) => warn!("Price feed {} stopped: {}", url, e),
    }
}

/// Drive one connection until it fails or the consumer goes away.
///
/// `Ok` means the receiving side was dropped; every other exit is an error
/// describing why the feed ended.
async fn connect_and_listen(
    url: &Url,
    config: &FeedConfig,
    updates_tx: &mpsc::Sender<PartialUpdate>,
) -> PriceFeedResult<()> {
    info!("Connecting to price feed at {}", url);

    let (ws_stream, _) = time::timeout(config.connect_timeout, connect_async(url.as_str()))
        .await
        .map_err(|_| PriceFeedError::ConnectTimeout(config.connect_timeout.as_millis() as u64))?
        .map_err(|e| PriceFeedError::ConnectionFailed(e.to_string()))?;
    let (mut write, mut read) = ws_stream.split();

    info!("Connected to price feed");

    let mut ping_interval =
        time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
    ping_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut awaiting_pong = false;
    let pong_deadline = time::sleep(config.pong_timeout);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match decode_prices(&text) {
                            Ok(update) if update.is_empty() => {
                                debug!("No usable prices in message");
                            }
                            Ok(update) => {
                                if updates_tx.send(update).await.is_err() {
                                    return Ok(());
                                }
                            }
                            Err(e) => warn!("Skipping message: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        write
                            .send(Message::Pong(data))
                            .await
                            .map_err(|e| PriceFeedError::Protocol(e.to_string()))?;
                    }
                    Some(Ok(Message::Pong(_))) => {
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                            .unwrap_or_else(|| "no close frame".to_string());
                        return Err(PriceFeedError::Closed(reason));
                    }
                    Some(Ok(other)) => {
                        debug!("Ignoring {} frame", frame_kind(&other));
                    }
                    Some(Err(e)) => return Err(PriceFeedError::Protocol(e.to_string())),
                    None => return Err(PriceFeedError::Disconnected),
                }
            }

            _ = ping_interval.tick(), if !awaiting_pong => {
                write
                    .send(Message::Ping(Vec::new()))
                    .await
                    .map_err(|e| PriceFeedError::Protocol(e.to_string()))?;
                awaiting_pong = true;
                pong_deadline.as_mut().reset(Instant::now() + config.pong_timeout);
            }

            () = &mut pong_deadline, if awaiting_pong => {
                let _ = write.close().await;
                return Err(PriceFeedError::KeepAliveTimeout(
                    config.pong_timeout.as_millis() as u64,
                ));
            }
        }

        if updates_tx.is_closed() {
            return Ok(());
        }
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "raw",
    }
}

/// Decode one feed message into a partial update.
///
/// The message must be a flat JSON object mapping symbols to prices.
/// Entries whose price does not parse as a finite, non-negative number are
/// left out; only a message that is not an object at all is an error.
pub fn decode_prices(text: &str) -> PriceFeedResult<PartialUpdate> {
    let json: serde_json::Value =
        serde_json::from_str(text).map_err(|e| PriceFeedError::InvalidMessage(e.to_string()))?;

    let entries = match json {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(PriceFeedError::InvalidMessage(format!(
                "expected object, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut prices = Vec::with_capacity(entries.len());
    for (symbol, value) in entries {
        match parse_price(&value) {
            Some(price) => prices.push(AssetPrice::new(symbol, price)),
            None => debug!("Dropping unparsable price for {}: {}", symbol, value),
        }
    }

    Ok(PartialUpdate::new(prices))
}

fn parse_price(value: &serde_json::Value) -> Option<f64> {
    let price = match value {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok()?,
        serde_json::Value::Number(n) => n.as_f64()?,
        _ => return None,
    };

    (price.is_finite() && price >= 0.0).then_some(price)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
