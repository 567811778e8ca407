//! UI-facing state

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::Snapshot;

/// Progress of the initial price download
#[derive(Debug, Clone, PartialEq)]
pub enum CoinsState {
    Loading,
    LoadingFailed,
    Downloaded(Arc<Snapshot>),
}

impl CoinsState {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            CoinsState::Downloaded(snapshot) => Some(snapshot),
            CoinsState::Loading | CoinsState::LoadingFailed => None,
        }
    }
}

/// Whether the streaming feed is currently attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    Connected,
    Disconnected,
}

impl ConnectivityState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectivityState::Connected => "connected",
            ConnectivityState::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Chart statistics for the tracked asset.
///
/// `dots` are positions in `[0, 1]`: 0 sits at `max`, 1 sits at `min`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub min: f64,
    pub max: f64,
    pub dots: Vec<f64>,
}

/// Everything a front end needs to render
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenState {
    pub coins: CoinsState,
    pub connectivity: ConnectivityState,
    pub chart: Option<ChartData>,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            coins: CoinsState::Loading,
            connectivity: ConnectivityState::Disconnected,
            chart: None,
        }
    }
}

/// Lifecycle phase of the connection supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SupervisorPhase {
    Idle,
    LoadingInitial,
    LoadFailed,
    Streaming,
    Disconnected,
}

impl SupervisorPhase {
    pub fn name(&self) -> &'static str {
        match self {
            SupervisorPhase::Idle => "idle",
            SupervisorPhase::LoadingInitial => "loading_initial",
            SupervisorPhase::LoadFailed => "load_failed",
            SupervisorPhase::Streaming => "streaming",
            SupervisorPhase::Disconnected => "disconnected",
        }
    }

    /// Phases from which an initial load may be started
    pub fn can_load(&self) -> bool {
        matches!(self, SupervisorPhase::Idle | SupervisorPhase::LoadFailed)
    }
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
