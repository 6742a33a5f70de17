//! Core probe trait and result types

use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Probe-specific structured data, opaque to the aggregator
pub type Details = IndexMap<String, Value>;

/// Error message reserved for probes cut off by a deadline
pub const TIMEOUT_ERROR: &str = "timeout";

const UNKNOWN_FAILURE: &str = "probe failed without a message";

/// Status of a single probe execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// The dependency answered the probe successfully
    Healthy,
    /// The probe failed, panicked or timed out
    Unhealthy,
}

impl ProbeStatus {
    /// Returns true if the probe succeeded
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeStatus::Healthy)
    }

    /// Returns true if the probe failed
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, ProbeStatus::Unhealthy)
    }

    /// Wire form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeStatus::Healthy => "healthy",
            ProbeStatus::Unhealthy => "unhealthy",
        }
    }

    /// Returns the status as a colored string
    pub fn as_colored_str(&self) -> String {
        use colored::Colorize;
        match self {
            ProbeStatus::Healthy => "HEALTHY".green().to_string(),
            ProbeStatus::Unhealthy => "UNHEALTHY".red().to_string(),
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one probe execution
///
/// Built only through [`ProbeResult::healthy`], [`ProbeResult::unhealthy`] and
/// [`ProbeResult::timed_out`], so a healthy result never carries an error and an
/// unhealthy one always carries a non-empty one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    status: ProbeStatus,
    latency_ms: f64,
    timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Details>,
}

impl ProbeResult {
    /// Creates a healthy result for a probe started at `start`
    pub fn healthy(start: Instant, details: Details) -> Self {
        Self::finish(start, ProbeStatus::Healthy, None, details)
    }

    /// Creates an unhealthy result for a probe started at `start`
    ///
    /// Blank messages are replaced so the error is never empty.
    pub fn unhealthy(start: Instant, error: impl Into<String>, details: Details) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = UNKNOWN_FAILURE.to_string();
        }
        Self::finish(start, ProbeStatus::Unhealthy, Some(error), details)
    }

    /// Creates the result synthesized for a probe that missed its deadline
    pub fn timed_out(start: Instant) -> Self {
        Self::unhealthy(start, TIMEOUT_ERROR, Details::new())
    }

    fn finish(
        start: Instant,
        status: ProbeStatus,
        error: Option<String>,
        details: Details,
    ) -> Self {
        Self {
            status,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            timestamp: Utc::now(),
            error,
            details: (!details.is_empty()).then_some(details),
        }
    }

    pub fn status(&self) -> ProbeStatus {
        self.status
    }

    /// Wall-clock duration of the probe call in milliseconds
    pub fn latency_ms(&self) -> f64 {
        self.latency_ms
    }

    /// When the result was finalized
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn details(&self) -> Option<&Details> {
        self.details.as_ref()
    }

    /// Returns true if this result was synthesized for a missed deadline
    pub fn is_timeout(&self) -> bool {
        self.error.as_deref() == Some(TIMEOUT_ERROR)
    }
}

/// Per-execution scratchpad handed to a probe body
///
/// Details recorded here survive a later failure of the same probe, so a probe
/// that acquires several resources should record what it learned before each
/// step that can fail. Every execution gets a fresh context; contexts are never
/// shared between probes.
#[derive(Debug, Clone, Default)]
pub struct ProbeContext {
    details: Arc<Mutex<Details>>,
}

impl ProbeContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a detail, replacing any previous value under the same key
    pub fn record(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Returns a copy of everything recorded so far
    pub fn snapshot(&self) -> Details {
        self.lock().clone()
    }

    // A probe that panicked mid-record leaves the map usable
    fn lock(&self) -> MutexGuard<'_, Details> {
        self.details.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A named check of one external dependency
///
/// Implementations report failure by returning an error (or even panicking);
/// the aggregator turns either into an unhealthy [`ProbeResult`]. Probes run
/// concurrently with each other and must not block the async runtime.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Unique name of the dependency, used as the report key
    fn name(&self) -> &str;

    /// Performs the check
    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()>;
}

/// Adapts an async closure into a [`Probe`]
///
/// ```no_run
/// use cloud_health::health::{FnProbe, ProbeRegistry};
///
/// let registry = ProbeRegistry::new()
///     .register(FnProbe::new("cache", |ctx| async move {
///         ctx.record("keys", 42);
///         Ok(())
///     }))
///     .unwrap();
/// ```
pub struct FnProbe<F> {
    name: String,
    f: F,
}

impl<F, Fut> FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(ProbeContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
        (self.f)(ctx.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_result_has_no_error() {
        let result = ProbeResult::healthy(Instant::now(), Details::new());

        assert!(result.status().is_healthy());
        assert!(result.error().is_none());
        assert!(result.details().is_none());
        assert!(result.latency_ms() >= 0.0);
    }

    #[test]
    fn blank_error_is_replaced() {
        let result = ProbeResult::unhealthy(Instant::now(), "  ", Details::new());

        assert!(result.status().is_unhealthy());
        assert_eq!(result.error(), Some(UNKNOWN_FAILURE));
    }

    #[test]
    fn timed_out_uses_reserved_message() {
        let result = ProbeResult::timed_out(Instant::now());

        assert!(result.is_timeout());
        assert_eq!(result.error(), Some("timeout"));
    }

    #[test]
    fn serializes_wire_shape() {
        let mut details = Details::new();
        details.insert("buckets".to_string(), serde_json::json!(["a"]));
        let result = ProbeResult::healthy(Instant::now(), details);

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["latency_ms"].is_f64());
        assert!(json["timestamp"].is_string());
        assert!(json.get("error").is_none());
        assert_eq!(json["details"]["buckets"][0], "a");
    }

    #[test]
    fn context_keeps_latest_value() {
        let ctx = ProbeContext::new();
        ctx.record("step", "connect");
        ctx.record("step", "write");
        ctx.record("rows", 3);

        let details = ctx.snapshot();
        assert_eq!(details.len(), 2);
        assert_eq!(ctx.get("step"), Some(Value::from("write")));
        assert_eq!(details.get_index(1).map(|(k, _)| k.as_str()), Some("rows"));
    }

    struct Marker;

    #[async_trait]
    impl Probe for Marker {
        fn name(&self) -> &str {
            "marker"
        }

        async fn run(&self, ctx: &ProbeContext) -> anyhow::Result<()> {
            ctx.record("seen", true);
            Ok(())
        }
    }

    #[tokio::test]
    async fn name_and_run_are_the_whole_probe_surface() {
        let probe: &dyn Probe = &Marker;
        let ctx = ProbeContext::new();

        probe.run(&ctx).await.unwrap();

        assert_eq!(probe.name(), "marker");
        assert_eq!(ctx.get("seen"), Some(Value::Bool(true)));
    }

    #[test]
    fn status_display() {
        assert_eq!(ProbeStatus::Healthy.to_string(), "healthy");
        assert_eq!(ProbeStatus::Unhealthy.to_string(), "unhealthy");
    }
}
