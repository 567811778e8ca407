//! Copy-on-write price state
//!
//! The current snapshot lives behind a watch channel: readers clone an
//! `Arc<Snapshot>` without locking, the single writer swaps in a new one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use ticker_core::{AssetPrice, PartialUpdate, Snapshot};

/// Authoritative in-memory snapshot of all tracked assets
#[derive(Debug)]
pub struct PriceStateStore {
    snapshot_tx: watch::Sender<Arc<Snapshot>>,

    /// Stats
    merge_count: AtomicU64,
    dropped_count: AtomicU64,
}

impl PriceStateStore {
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(Snapshot::empty()));
        Self {
            snapshot_tx,
            merge_count: AtomicU64::new(0),
            dropped_count: AtomicU64::new(0),
        }
    }

    /// Replace the whole snapshot with a fresh price list
    pub fn load(&self, initial: Vec<AssetPrice>) -> Arc<Snapshot> {
        let version = self.snapshot_tx.borrow().version() + 1;
        let snapshot = Arc::new(Snapshot::from_assets(initial, version));
        self.snapshot_tx.send_replace(Arc::clone(&snapshot));
        debug!("Loaded snapshot v{} with {} assets", version, snapshot.len());
        snapshot
    }

    /// Merge a partial update and return the resulting snapshot.
    ///
    /// Symbols that are not in the snapshot are dropped. Observers are only
    /// notified when at least one price changed hands.
    pub fn merge(&self, update: &PartialUpdate) -> Arc<Snapshot> {
        let mut merged = None;

        self.snapshot_tx.send_if_modified(|current| {
            match current.merged_with(update) {
                Some(next) => {
                    let next = Arc::new(next);
                    *current = Arc::clone(&next);
                    merged = Some(next);
                    true
                }
                None => false,
            }
        });

        match merged {
            Some(snapshot) => {
                self.merge_count.fetch_add(1, Ordering::Relaxed);
                let dropped = update
                    .iter()
                    .filter(|p| !snapshot.contains(&p.symbol))
                    .count();
                self.record_dropped(dropped);
                snapshot
            }
            None => {
                self.record_dropped(update.len());
                self.current()
            }
        }
    }

    /// Latest snapshot
    pub fn current(&self) -> Arc<Snapshot> {
        self.snapshot_tx.borrow().clone()
    }

    /// Observe the current snapshot and every later one
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshot_tx.subscribe()
    }

    pub fn price_of(&self, symbol: &str) -> Option<f64> {
        self.snapshot_tx.borrow().price_of(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.snapshot_tx.borrow().contains(symbol)
    }

    fn record_dropped(&self, dropped: usize) {
        if dropped > 0 {
            debug!("Dropped {} price(s) for untracked assets", dropped);
            self.dropped_count.fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    /// Stats
    pub fn stats(&self) -> PriceStateStats {
        let snapshot = self.snapshot_tx.borrow();
        PriceStateStats {
            asset_count: snapshot.len(),
            version: snapshot.version(),
            merge_count: self.merge_count.load(Ordering::Relaxed),
            dropped_count: self.dropped_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for PriceStateStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about price state
#[derive(Debug, Clone)]
pub struct PriceStateStats {
    pub asset_count: usize,
    pub version: u64,
    pub merge_count: u64,
    pub dropped_count: u64,
}
