//! Dependency health aggregation
//!
//! A [`Probe`] checks one external dependency. The [`Aggregator`] runs every
//! registered probe concurrently, contains their failures and merges the
//! results into an [`AggregateReport`] whose overall status is healthy only
//! when every probe is.
//!
//! # Example
//!
//! ```no_run
//! use cloud_health::health::{Aggregator, FnProbe, ProbeRegistry, TracingObserver};
//!
//! # async fn demo() -> cloud_health::error::Result<()> {
//! let registry = ProbeRegistry::new()
//!     .register(FnProbe::new("cache", |ctx| async move {
//!         ctx.record("keys", 42);
//!         Ok(())
//!     }))?;
//!
//! let report = Aggregator::new(registry)
//!     .with_observer(TracingObserver)
//!     .run_all()
//!     .await?;
//!
//! if report.is_healthy() {
//!     println!("All dependencies operational!");
//! }
//! # Ok(())
//! # }
//! ```

pub mod check;
pub mod checks;
pub mod reporter;
pub mod runner;

pub use check::{Details, FnProbe, Probe, ProbeContext, ProbeResult, ProbeStatus, TIMEOUT_ERROR};
pub use reporter::{ReportObserver, TracingObserver, format_report, print_report};
pub use runner::{AggregateReport, Aggregator, ProbeRegistry, run_isolated};

use crate::error::Result;

/// Aggregator over every Google Cloud probe, logging each run
pub fn google_cloud_aggregator(api: &checks::GoogleApi) -> Result<Aggregator> {
    let registry = checks::google_cloud_probes(api)?;
    Ok(Aggregator::new(registry).with_observer(TracingObserver))
}
