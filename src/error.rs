//! Error types for the aggregation engine and service plumbing
//!
//! Failures inside a probe body never show up here: they are contained by the
//! isolation wrapper and reported as unhealthy results. These variants cover
//! registration mistakes, engine defects and startup problems.

use thiserror::Error;

/// Errors raised by the engine and the service around it
#[derive(Debug, Error)]
pub enum HealthError {
    /// Two probes were registered under the same name
    #[error("probe `{0}` is already registered")]
    DuplicateProbe(String),

    /// A probe task could not be joined (cancelled by the runtime, not a probe failure)
    #[error("probe task `{probe}` failed to join")]
    Join {
        probe: String,
        #[source]
        source: tokio::task::JoinError,
    },

    /// Configuration could not be loaded or deserialized
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration loaded but is not usable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The shared HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The tracing subscriber could not be installed
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = HealthError> = std::result::Result<T, E>;
