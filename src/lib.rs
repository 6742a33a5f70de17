//! Cloud Health
//!
//! An HTTP service that probes the Google Cloud services an application
//! depends on, concurrently, and reports per-dependency status and latency.

/// HTTP routes: service info, dependency health and liveness
pub mod api;

/// Startup wiring of credentials, project settings and probes
pub mod bootstrap;

/// Build-time information (timestamp, target, compiler)
pub mod build_info;

/// Command-line interface
pub mod cli;

/// Layered configuration (files, platform variables, HEALTH_ overrides)
pub mod config;

pub mod error;

/// Probe model, aggregation engine and reporting
pub mod health;

pub mod logging;

/// axum server lifecycle
pub mod server;

pub use error::{HealthError, Result};
