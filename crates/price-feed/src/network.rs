//! Network availability notifications
//!
//! Callbacks are one-shot: each registration fires at most once and is then
//! forgotten by the monitor.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use ticker_core::TickerConfig;

/// Callback run once when the network becomes reachable
pub type NetworkCallback = Box<dyn FnOnce() + Send + 'static>;

/// Handle identifying one registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Platform facility reporting when internet access returns
pub trait NetworkMonitor: Send + Sync {
    fn register(&self, callback: NetworkCallback) -> ListenerId;

    /// Drop a registration. Unknown or already-fired ids are ignored.
    fn unregister(&self, id: ListenerId);
}

/// Monitor that probes TCP reachability of a host until it answers
#[derive(Debug)]
pub struct ProbeNetworkMonitor {
    probe_addr: String,
    probe_interval: Duration,
    connect_timeout: Duration,
    next_id: AtomicU64,
    probes: Arc<Mutex<HashMap<ListenerId, JoinHandle<()>>>>,
}

impl ProbeNetworkMonitor {
    pub fn new(probe_addr: impl Into<String>, probe_interval: Duration) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            probe_interval,
            connect_timeout: probe_interval.max(Duration::from_secs(1)),
            next_id: AtomicU64::new(1),
            probes: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn from_config(config: &TickerConfig) -> Self {
        Self::new(config.probe_addr.clone(), config.probe_interval())
    }

    /// Number of registrations that have not fired yet
    pub fn pending(&self) -> usize {
        self.probes.lock().len()
    }

    async fn reachable(addr: &str, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

impl NetworkMonitor for ProbeNetworkMonitor {
    fn register(&self, callback: NetworkCallback) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let addr = self.probe_addr.clone();
        let interval = self.probe_interval;
        let timeout = self.connect_timeout;
        let probes = Arc::clone(&self.probes);

        // Hold the lock across spawn so the task cannot remove its entry
        // before it has been inserted
        let mut guard = self.probes.lock();
        let handle = tokio::spawn(async move {
            loop {
                if Self::reachable(&addr, timeout).await {
                    break;
                }
                tokio::time::sleep(interval).await;
            }

            // Still registered means nobody cancelled us
            if probes.lock().remove(&id).is_some() {
                info!("Network reachable again via {}", addr);
                callback();
            }
        });
        guard.insert(id, handle);
        drop(guard);

        debug!("Registered network listener {}", id.value());
        id
    }

    fn unregister(&self, id: ListenerId) {
        if let Some(handle) = self.probes.lock().remove(&id) {
            handle.abort();
            debug!("Unregistered network listener {}", id.value());
        }
    }
}

impl Drop for ProbeNetworkMonitor {
    fn drop(&mut self) {
        for (_, handle) in self.probes.lock().drain() {
            handle.abort();
        }
    }
}
