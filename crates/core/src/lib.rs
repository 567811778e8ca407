//! Core types and utilities for the coin ticker
//!
//! This crate provides shared types used across all components:
//! - Asset prices, partial updates and snapshots
//! - UI-facing screen state and supervisor phases
//! - Runtime configuration
//! - Error types

pub mod types;
pub mod screen;
pub mod config;
pub mod errors;

pub use types::*;
pub use screen::*;
pub use config::*;
pub use errors::*;
