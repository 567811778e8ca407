//! Live coin price streaming
//!
//! Features:
//! - Initial snapshot over REST, incremental updates over WebSocket
//! - Copy-on-write snapshot shared with any number of readers
//! - Rolling-window chart statistics for one asset
//! - Reconnection driven by network availability with backoff

pub mod analyzer;
pub mod assets;
pub mod feeds;
pub mod network;
pub mod state;
pub mod supervisor;

pub use analyzer::{RollingWindow, DEFAULT_WINDOW};
pub use assets::{AssetsClient, SnapshotSource};
pub use feeds::{decode_prices, FeedConfig, PriceFeed, PriceFeedClient, UpdateStream};
pub use network::{ListenerId, NetworkCallback, NetworkMonitor, ProbeNetworkMonitor};
pub use state::{PriceStateStats, PriceStateStore};
pub use supervisor::{backoff_delay, ConnectionSupervisor, SupervisorConfig, SupervisorStats};
