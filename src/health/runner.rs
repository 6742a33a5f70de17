//! Concurrent aggregation of probe results

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use indexmap::IndexMap;
use serde::Serialize;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, warn};

use super::check::{Probe, ProbeContext, ProbeResult, ProbeStatus};
use super::reporter::ReportObserver;
use crate::error::{HealthError, Result};

/// Merged results of one aggregation run
#[derive(Debug, Clone, Serialize)]
pub struct AggregateReport {
    overall_status: ProbeStatus,
    results: IndexMap<String, ProbeResult>,
}

impl AggregateReport {
    /// Builds a report, keeping the iteration order of `results`
    ///
    /// The overall status is healthy only if every result is healthy, which
    /// makes an empty report healthy.
    pub fn from_results(results: impl IntoIterator<Item = (String, ProbeResult)>) -> Self {
        let results: IndexMap<_, _> = results.into_iter().collect();
        let overall_status = if results.values().all(|r| r.status().is_healthy()) {
            ProbeStatus::Healthy
        } else {
            ProbeStatus::Unhealthy
        };

        Self {
            overall_status,
            results,
        }
    }

    pub fn overall_status(&self) -> ProbeStatus {
        self.overall_status
    }

    /// Returns true if every probe was healthy
    pub fn is_healthy(&self) -> bool {
        self.overall_status.is_healthy()
    }

    /// Per-probe results in registration order
    pub fn results(&self) -> &IndexMap<String, ProbeResult> {
        &self.results
    }

    pub fn into_results(self) -> IndexMap<String, ProbeResult> {
        self.results
    }

    pub fn get(&self, name: &str) -> Option<&ProbeResult> {
        self.results.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeResult)> {
        self.results.iter().map(|(name, result)| (name.as_str(), result))
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn healthy_count(&self) -> usize {
        self.results
            .values()
            .filter(|r| r.status().is_healthy())
            .count()
    }

    pub fn unhealthy_count(&self) -> usize {
        self.total() - self.healthy_count()
    }

    /// Process exit code for this report: 0 = healthy, 1 = unhealthy
    pub fn exit_code(&self) -> i32 {
        if self.is_healthy() { 0 } else { 1 }
    }
}

/// Ordered set of probes with unique names
#[derive(Clone, Default)]
pub struct ProbeRegistry {
    probes: Vec<Arc<dyn Probe>>,
}

impl ProbeRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a probe, rejecting a name that is already taken
    pub fn register<P: Probe + 'static>(mut self, probe: P) -> Result<Self> {
        self.insert(Arc::new(probe))?;
        Ok(self)
    }

    /// Adds a shared probe, rejecting a name that is already taken
    pub fn insert(&mut self, probe: Arc<dyn Probe>) -> Result<()> {
        if self.probes.iter().any(|p| p.name() == probe.name()) {
            return Err(HealthError::DuplicateProbe(probe.name().to_string()));
        }
        self.probes.push(probe);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// Probe names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.probes.iter().map(|p| p.name())
    }
}

/// Runs one probe and converts every possible outcome into a [`ProbeResult`]
///
/// Errors and panics raised by the probe body are contained here. Details the
/// probe recorded before failing are kept on the unhealthy result.
pub async fn run_isolated(probe: &dyn Probe) -> ProbeResult {
    let ctx = ProbeContext::new();
    let start = Instant::now();

    let outcome = AssertUnwindSafe(probe.run(&ctx)).catch_unwind().await;
    let details = ctx.snapshot();

    match outcome {
        Ok(Ok(())) => ProbeResult::healthy(start, details),
        Ok(Err(err)) => ProbeResult::unhealthy(start, format!("{err:#}"), details),
        Err(payload) => ProbeResult::unhealthy(
            start,
            format!("probe panicked: {}", panic_message(payload.as_ref())),
            details,
        ),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Fans out to every registered probe and merges the results
///
/// Every probe runs in its own tokio task, so the wall-clock cost of a run is
/// that of the slowest probe. No per-probe timeout is applied by
/// [`Aggregator::run_all`]; callers that need one use
/// [`Aggregator::run_all_within`].
#[derive(Clone)]
pub struct Aggregator {
    probes: Arc<[Arc<dyn Probe>]>,
    observers: Vec<Arc<dyn ReportObserver>>,
}

impl Aggregator {
    pub fn new(registry: ProbeRegistry) -> Self {
        Self {
            probes: registry.probes.into(),
            observers: Vec::new(),
        }
    }

    /// Attaches an observer notified after every run
    pub fn with_observer<O: ReportObserver + 'static>(mut self, observer: O) -> Self {
        self.observers.push(Arc::new(observer));
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    /// Runs every probe to completion
    ///
    /// Probe failures are data in the report. An error is returned only when
    /// a probe task cannot be joined at all. Dropping the returned future
    /// aborts every probe still running.
    pub async fn run_all(&self) -> Result<AggregateReport> {
        let mut run = self.spawn_all();

        while let Some(joined) = run.tasks.join_next().await {
            run.complete(joined)?;
        }

        Ok(self.assemble(run.slots, None))
    }

    /// Runs every probe, giving up on stragglers once `deadline` has elapsed
    ///
    /// Probes still running at the deadline are aborted and reported as
    /// unhealthy with the `"timeout"` error. Results that completed in time are
    /// kept as they are.
    pub async fn run_all_within(&self, deadline: Duration) -> Result<AggregateReport> {
        let start = Instant::now();
        let expires_at = tokio::time::Instant::now() + deadline;
        let mut run = self.spawn_all();

        loop {
            let joined = match tokio::time::timeout_at(expires_at, run.tasks.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) | Err(_) => break,
            };
            run.complete(joined)?;
        }
        run.tasks.abort_all();

        for (probe, slot) in self.probes.iter().zip(&run.slots) {
            if slot.is_none() {
                warn!(probe = %probe.name(), deadline_ms = deadline.as_millis() as u64, "Probe did not finish before the deadline");
            }
        }

        Ok(self.assemble(run.slots, Some(start)))
    }

    // All tasks are spawned before any is awaited
    fn spawn_all(&self) -> ProbeRun {
        debug!(probes = self.probes.len(), "Launching probes");

        let mut run = ProbeRun {
            tasks: JoinSet::new(),
            names: HashMap::with_capacity(self.probes.len()),
            slots: (0..self.probes.len()).map(|_| None).collect(),
        };

        for (index, probe) in self.probes.iter().enumerate() {
            let probe = Arc::clone(probe);
            let name = probe.name().to_string();
            let handle = run
                .tasks
                .spawn(async move { (index, run_isolated(probe.as_ref()).await) });
            run.names.insert(handle.id(), name);
        }

        run
    }

    // Slots left empty are stragglers cut off at the deadline
    fn assemble(&self, slots: Vec<Option<ProbeResult>>, started: Option<Instant>) -> AggregateReport {
        let results = self
            .probes
            .iter()
            .zip(slots)
            .filter_map(|(probe, slot)| {
                let result = slot.or_else(|| started.map(ProbeResult::timed_out))?;
                Some((probe.name().to_string(), result))
            })
            .collect::<Vec<_>>();

        self.notify(results)
    }

    fn notify(&self, results: Vec<(String, ProbeResult)>) -> AggregateReport {
        let report = AggregateReport::from_results(results);

        for observer in &self.observers {
            let notified =
                std::panic::catch_unwind(AssertUnwindSafe(|| observer.observe(&report)));
            if notified.is_err() {
                warn!("Report observer panicked; ignoring");
            }
        }

        report
    }
}

/// Probe tasks of one run, aborted together when dropped
struct ProbeRun {
    tasks: JoinSet<(usize, ProbeResult)>,
    names: HashMap<task::Id, String>,
    slots: Vec<Option<ProbeResult>>,
}

impl ProbeRun {
    fn complete(&mut self, joined: std::result::Result<(usize, ProbeResult), JoinError>) -> Result<()> {
        let (index, result) = joined.map_err(|source| HealthError::Join {
            probe: self.names.get(&source.id()).cloned().unwrap_or_default(),
            source,
        })?;
        self.slots[index] = Some(result);
        Ok(())
    }
}
