//! Error types

use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Initial snapshot download errors
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Response contained no assets")]
    NoAssets,
}

/// Price feed errors.
///
/// Every variant ends a subscription; none of them escape it.
#[derive(Debug, Error)]
pub enum PriceFeedError {
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    #[error("WebSocket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Timeout connecting after {0}ms")]
    ConnectTimeout(u64),

    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    #[error("Closed by server: {0}")]
    Closed(String),

    #[error("Feed disconnected")]
    Disconnected,

    #[error("No pong within {0}ms")]
    KeepAliveTimeout(u64),

    #[error("Invalid message format: {0}")]
    InvalidMessage(String),
}

/// Result type alias
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type LoadResult<T> = Result<T, LoadError>;
pub type PriceFeedResult<T> = Result<T, PriceFeedError>;
