//! Teo Common
//!
//! Shared utilities for the Teonet node host crates.
//!
//! This crate provides:
//! - Component-based structured logging with node name and peer context
//! - Level-checked logging macros (`log_info!`, `log_warn!`, ...)

#[macro_use]
mod macros;

pub mod logging;

pub use logging::{Component, LogPrefix, Logger, UNNAMED_NODE};
