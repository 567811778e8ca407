//! Connection supervisor - owns the feed lifecycle
//!
//! Loads the initial snapshot, keeps a feed subscription running, merges
//! updates into the price state and reconnects when the network returns.

use futures_util::StreamExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use ticker_core::{
    CoinsState, ConnectivityState, PartialUpdate, ScreenState, Snapshot, SupervisorPhase,
    TickerConfig,
};

use crate::analyzer::{RollingWindow, DEFAULT_WINDOW};
use crate::assets::SnapshotSource;
use crate::feeds::PriceFeed;
use crate::network::{ListenerId, NetworkMonitor};
use crate::state::PriceStateStore;

/// Supervisor configuration
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub assets: Vec<String>,
    pub chart_asset: String,
    pub chart_window: usize,
    pub chart_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub reconnect_max_delay: Duration,
    /// Uptime after which a session counts as healthy and backoff resets
    pub stable_session: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            assets: vec![
                "bitcoin".to_string(),
                "ethereum".to_string(),
                "monero".to_string(),
                "litecoin".to_string(),
            ],
            chart_asset: "bitcoin".to_string(),
            chart_window: DEFAULT_WINDOW,
            chart_interval: Duration::from_secs(1),
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(60),
            stable_session: Duration::from_secs(10),
        }
    }
}

impl From<&TickerConfig> for SupervisorConfig {
    fn from(config: &TickerConfig) -> Self {
        Self {
            assets: config.assets.clone(),
            chart_asset: config.chart_asset.clone(),
            chart_window: config.chart_window,
            chart_interval: config.chart_interval(),
            reconnect_base_delay: config.reconnect_base_delay(),
            reconnect_max_delay: config.reconnect_max_delay(),
            stable_session: config.stable_session(),
        }
    }
}

/// Delay before the next network-triggered reconnect.
///
/// No delay after a healthy session; afterwards the base delay doubles per
/// consecutive failed attempt, plus up to half the base as jitter, capped
/// at `max`.
pub fn backoff_delay(failed_attempts: u32, base: Duration, max: Duration) -> Duration {
    if failed_attempts == 0 || base.is_zero() {
        return Duration::ZERO;
    }

    let exp = (failed_attempts - 1).min(10);
    let delay = base.saturating_mul(1u32 << exp);
    let jitter_ms = rand::random::<u64>() % (base.as_millis() as u64 / 2 + 1);

    delay.saturating_add(Duration::from_millis(jitter_ms)).min(max)
}

/// Background tasks and control state, guarded by one lock
#[derive(Default)]
struct Tasks {
    loader: Option<JoinHandle<()>>,
    feed: Option<JoinHandle<()>>,
    chart: Option<JoinHandle<()>>,
    listener: Option<ListenerId>,
    /// Backoff sleep before a network-triggered reopen
    pending_reconnect: Option<JoinHandle<()>>,
    /// Bumped for every subscription so stale feed tasks can be told apart
    generation: u64,
    /// Consecutive sessions that ended before becoming stable
    failed_attempts: u32,
    reconnect_count: u64,
    shut_down: bool,
}

struct Inner {
    config: SupervisorConfig,
    source: Arc<dyn SnapshotSource>,
    feed: Arc<dyn PriceFeed>,
    network: Arc<dyn NetworkMonitor>,
    store: PriceStateStore,
    window: Mutex<RollingWindow>,
    screen_tx: watch::Sender<ScreenState>,
    phase_tx: watch::Sender<SupervisorPhase>,
    tasks: Mutex<Tasks>,
}

/// Orchestrates initial load, streaming, and reconnection.
///
/// Dropping the supervisor tears everything down.
pub struct ConnectionSupervisor {
    inner: Arc<Inner>,
}

impl ConnectionSupervisor {
    pub fn new(
        config: SupervisorConfig,
        source: Arc<dyn SnapshotSource>,
        feed: Arc<dyn PriceFeed>,
        network: Arc<dyn NetworkMonitor>,
    ) -> Self {
        let (screen_tx, _) = watch::channel(ScreenState::default());
        let (phase_tx, _) = watch::channel(SupervisorPhase::Idle);
        let window = RollingWindow::new(config.chart_window);

        Self {
            inner: Arc::new(Inner {
                config,
                source,
                feed,
                network,
                store: PriceStateStore::new(),
                window: Mutex::new(window),
                screen_tx,
                phase_tx,
                tasks: Mutex::new(Tasks::default()),
            }),
        }
    }

    /// Begin the initial load. Must be called from within a tokio runtime.
    pub fn start(&self) -> bool {
        info!("Starting connection supervisor");
        self.inner.start_load()
    }

    /// User action: load the initial snapshot again after a failure
    pub fn retry_initial_load(&self) -> bool {
        info!("Retrying initial price load");
        self.inner.start_load()
    }

    /// User action: reopen the feed right away while disconnected
    pub fn reconnect(&self) -> bool {
        self.inner.manual_reconnect()
    }

    /// Cancel all tasks and drop any pending network listener
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Observe UI state
    pub fn state(&self) -> watch::Receiver<ScreenState> {
        self.inner.screen_tx.subscribe()
    }

    pub fn screen(&self) -> ScreenState {
        self.inner.screen_tx.borrow().clone()
    }

    pub fn phase(&self) -> SupervisorPhase {
        *self.inner.phase_tx.borrow()
    }

    pub fn phase_changes(&self) -> watch::Receiver<SupervisorPhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.store.current()
    }

    pub fn store(&self) -> &PriceStateStore {
        &self.inner.store
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.inner.config
    }

    /// Stats
    pub fn stats(&self) -> SupervisorStats {
        let tasks = self.inner.tasks.lock();
        let window = self.inner.window.lock();
        SupervisorStats {
            phase: self.phase(),
            reconnect_count: tasks.reconnect_count,
            failed_attempts: tasks.failed_attempts,
            listener_registered: tasks.listener.is_some(),
            reconnect_pending: tasks.pending_reconnect.is_some(),
            chart_running: tasks.chart.is_some(),
            chart_prices_recorded: window.recorded(),
            merge_count: self.inner.store.stats().merge_count,
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        self.inner.shutdown();
    }
}

/// Supervisor statistics
#[derive(Debug, Clone)]
pub struct SupervisorStats {
    pub phase: SupervisorPhase,
    pub reconnect_count: u64,
    pub failed_attempts: u32,
    pub listener_registered: bool,
    pub reconnect_pending: bool,
    pub chart_running: bool,
    pub chart_prices_recorded: u64,
    pub merge_count: u64,
}

impl Inner {
    fn phase(&self) -> SupervisorPhase {
        *self.phase_tx.borrow()
    }

    fn set_phase(&self, phase: SupervisorPhase) {
        let changed = self.phase_tx.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
        if changed {
            debug!("Supervisor phase -> {}", phase);
        }
    }

    fn set_connectivity(&self, connectivity: ConnectivityState) {
        self.screen_tx.send_if_modified(|screen| {
            if screen.connectivity == connectivity {
                return false;
            }
            screen.connectivity = connectivity;
            true
        });
    }

    fn set_coins(&self, coins: CoinsState) {
        self.screen_tx.send_modify(|screen| screen.coins = coins);
    }

    fn start_load(self: &Arc<Self>) -> bool {
        let mut tasks = self.tasks.lock();
        let phase = self.phase();
        if tasks.shut_down || !phase.can_load() {
            debug!("Initial load ignored in phase {}", phase);
            return false;
        }

        self.set_phase(SupervisorPhase::LoadingInitial);
        self.set_coins(CoinsState::Loading);

        let inner = Arc::clone(self);
        tasks.loader = Some(tokio::spawn(async move {
            inner.run_initial_load().await;
        }));
        true
    }

    async fn run_initial_load(self: Arc<Self>) {
        let result = self.source.fetch_all(&self.config.assets).await;

        let mut tasks = self.tasks.lock();
        tasks.loader = None;
        if tasks.shut_down || self.phase() != SupervisorPhase::LoadingInitial {
            return;
        }

        match result {
            Ok(prices) => {
                let snapshot = self.store.load(prices);
                info!("Loaded {} asset prices", snapshot.len());
                self.set_coins(CoinsState::Downloaded(snapshot));
                self.open_subscription(&mut tasks);
            }
            Err(e) => {
                error!("Initial price load failed: {}", e);
                self.set_phase(SupervisorPhase::LoadFailed);
                self.set_coins(CoinsState::LoadingFailed);
            }
        }
    }

    /// Enter Streaming: spawn the feed consumer and the chart task
    fn open_subscription(self: &Arc<Self>, tasks: &mut Tasks) {
        if let Some(id) = tasks.listener.take() {
            self.network.unregister(id);
        }
        if let Some(handle) = tasks.pending_reconnect.take() {
            handle.abort();
        }
        if let Some(handle) = tasks.feed.take() {
            handle.abort();
        }

        tasks.generation += 1;
        let generation = tasks.generation;
        self.set_phase(SupervisorPhase::Streaming);

        let inner = Arc::clone(self);
        tasks.feed = Some(tokio::spawn(async move {
            inner.run_feed(generation).await;
        }));

        if let Some(handle) = tasks.chart.take() {
            handle.abort();
        }
        let inner = Arc::clone(self);
        tasks.chart = Some(tokio::spawn(async move {
            inner.run_chart().await;
        }));
    }

    async fn run_feed(self: Arc<Self>, generation: u64) {
        let mut updates = self.feed.subscribe(&self.config.assets);
        {
            let tasks = self.tasks.lock();
            if tasks.shut_down || tasks.generation != generation {
                return;
            }
            self.set_connectivity(ConnectivityState::Connected);
        }
        info!("Streaming prices for {} assets", self.config.assets.len());

        let opened_at = Instant::now();
        let mut received = 0u64;
        while let Some(update) = updates.next().await {
            received += 1;
            self.apply_update(&update);
        }
        drop(updates);

        self.on_feed_ended(generation, received, opened_at.elapsed());
    }

    fn apply_update(&self, update: &PartialUpdate) {
        let before = self.store.current();
        let snapshot = self.store.merge(update);
        if Arc::ptr_eq(&before, &snapshot) {
            return;
        }

        let chart_asset = &self.config.chart_asset;
        if let Some(price) = update.price_of(chart_asset) {
            if snapshot.contains(chart_asset) {
                self.window.lock().record_price(price);
            }
        }

        self.set_coins(CoinsState::Downloaded(snapshot));
    }

    async fn run_chart(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.config.chart_interval);
        loop {
            ticker.tick().await;
            let chart = self.window.lock().compute_stats();
            self.screen_tx.send_if_modified(|screen| {
                if screen.chart == chart {
                    return false;
                }
                screen.chart = chart;
                true
            });
        }
    }

    fn on_feed_ended(self: &Arc<Self>, generation: u64, received: u64, uptime: Duration) {
        let mut tasks = self.tasks.lock();
        if tasks.shut_down || tasks.generation != generation {
            return;
        }

        tasks.feed = None;
        if let Some(handle) = tasks.chart.take() {
            handle.abort();
        }
        if received > 0 && uptime >= self.config.stable_session {
            tasks.failed_attempts = 0;
        } else {
            tasks.failed_attempts = tasks.failed_attempts.saturating_add(1);
        }

        self.set_phase(SupervisorPhase::Disconnected);
        self.set_connectivity(ConnectivityState::Disconnected);
        warn!(
            "Price feed ended after {} updates in {}ms, waiting for network",
            received,
            uptime.as_millis()
        );

        self.register_network_listener(&mut tasks);
    }

    fn register_network_listener(self: &Arc<Self>, tasks: &mut Tasks) {
        if tasks.listener.is_some() {
            return;
        }

        let weak: Weak<Inner> = Arc::downgrade(self);
        let generation = tasks.generation;
        let runtime = Handle::current();

        let id = self.network.register(Box::new(move || {
            // Hop onto the runtime so the callback never runs under our lock
            runtime.spawn(async move {
                match weak.upgrade() {
                    Some(inner) => inner.on_network_available(generation),
                    None => debug!("Network available after supervisor teardown"),
                }
            });
        }));

        tasks.listener = Some(id);
        debug!("Waiting for network via listener {}", id.value());
    }

    fn on_network_available(self: &Arc<Self>, generation: u64) {
        let mut tasks = self.tasks.lock();
        if tasks.shut_down
            || tasks.generation != generation
            || self.phase() != SupervisorPhase::Disconnected
        {
            debug!("Ignoring stale network notification");
            return;
        }

        if let Some(id) = tasks.listener.take() {
            self.network.unregister(id);
        }

        let delay = backoff_delay(
            tasks.failed_attempts,
            self.config.reconnect_base_delay,
            self.config.reconnect_max_delay,
        );
        tasks.reconnect_count += 1;

        if delay.is_zero() {
            info!("Network available, reopening price feed");
            self.open_subscription(&mut tasks);
            return;
        }

        // Phase stays Disconnected until the delay elapses
        info!("Network available, reopening price feed in {}ms", delay.as_millis());
        let inner = Arc::clone(self);
        tasks.pending_reconnect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.finish_delayed_reconnect(generation);
        }));
    }

    fn finish_delayed_reconnect(self: &Arc<Self>, generation: u64) {
        let mut tasks = self.tasks.lock();
        if tasks.shut_down
            || tasks.generation != generation
            || self.phase() != SupervisorPhase::Disconnected
        {
            return;
        }

        // Our own handle; dropping it detaches instead of aborting
        tasks.pending_reconnect = None;
        self.open_subscription(&mut tasks);
    }

    fn manual_reconnect(self: &Arc<Self>) -> bool {
        let mut tasks = self.tasks.lock();
        let phase = self.phase();
        if tasks.shut_down || phase != SupervisorPhase::Disconnected {
            debug!("Reconnect ignored in phase {}", phase);
            return false;
        }

        info!("Manual reconnect requested");
        tasks.reconnect_count += 1;
        self.open_subscription(&mut tasks);
        true
    }

    fn shutdown(&self) {
        let mut tasks = self.tasks.lock();
        if tasks.shut_down {
            return;
        }
        tasks.shut_down = true;

        let handles = [
            tasks.loader.take(),
            tasks.pending_reconnect.take(),
            tasks.feed.take(),
            tasks.chart.take(),
        ];
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
        if let Some(id) = tasks.listener.take() {
            self.network.unregister(id);
        }

        self.set_connectivity(ConnectivityState::Disconnected);
        self.set_phase(SupervisorPhase::Idle);
        info!("Connection supervisor stopped");
    }
}
