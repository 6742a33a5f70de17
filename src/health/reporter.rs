//! Formatting and reporting for aggregate results

use colored::Colorize;
use tabled::{
    builder::Builder,
    settings::{Alignment, Modify, Style, object::Rows},
};
use tracing::{error, info};

use super::check::ProbeResult;
use super::runner::AggregateReport;

/// Side-effecting hook run after every aggregation
///
/// Observers cannot fail the aggregation: a panicking observer is caught and
/// ignored by the aggregator.
pub trait ReportObserver: Send + Sync {
    fn observe(&self, report: &AggregateReport);
}

/// Emits one structured log record per probe and one summary record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ReportObserver for TracingObserver {
    fn observe(&self, report: &AggregateReport) {
        for (name, result) in report.iter() {
            log_probe_result(name, result);
        }
        log_summary(report);
    }
}

/// Logs a single probe result, at error level when unhealthy
pub fn log_probe_result(service: &str, result: &ProbeResult) {
    let details = result
        .details()
        .and_then(|details| serde_json::to_string(details).ok());

    if result.status().is_unhealthy() {
        error!(
            service,
            status = %result.status(),
            latency_ms = result.latency_ms(),
            error = result.error(),
            details = details.as_deref(),
            "Health check failed for {service}"
        );
    } else {
        info!(
            service,
            status = %result.status(),
            latency_ms = result.latency_ms(),
            details = details.as_deref(),
            "Health check passed for {service}"
        );
    }
}

/// Logs the overall status with every service's status
pub fn log_summary(report: &AggregateReport) {
    let service_statuses: serde_json::Map<String, serde_json::Value> = report
        .iter()
        .map(|(name, result)| (name.to_string(), result.status().as_str().into()))
        .collect();

    info!(
        overall_status = %report.overall_status(),
        service_statuses = %serde_json::Value::Object(service_statuses),
        healthy = report.healthy_count(),
        unhealthy = report.unhealthy_count(),
        "Overall health check status"
    );
}

/// Formats a report as a pretty table
pub fn format_report(report: &AggregateReport) -> String {
    let mut builder = Builder::default();

    builder.push_record(["Probe", "Status", "Latency", "Error"]);

    for (name, result) in report.iter() {
        let latency = format!("{:.1} ms", result.latency_ms());
        builder.push_record([
            name,
            &result.status().as_colored_str(),
            &latency,
            result.error().unwrap_or(""),
        ]);
    }

    let mut table = builder.build();
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    let mut output = String::new();
    output.push_str(&table.to_string());
    output.push('\n');

    output.push_str(&format_summary(report));

    output
}

fn format_summary(report: &AggregateReport) -> String {
    let mut summary = String::new();

    summary.push_str(&format!("\n{}\n", "Summary".bold().underline()));
    summary.push_str(&format!("  Total probes: {}\n", report.total()));
    summary.push_str(&format!(
        "  {} Healthy: {}\n",
        "✓".green(),
        report.healthy_count()
    ));

    if report.unhealthy_count() > 0 {
        summary.push_str(&format!(
            "  {} Unhealthy: {}\n",
            "✗".red(),
            report.unhealthy_count()
        ));
    }

    summary.push('\n');
    if report.is_healthy() {
        summary.push_str(&format!("  {}\n", "Overall: HEALTHY".green().bold()));
    } else {
        summary.push_str(&format!("  {}\n", "Overall: UNHEALTHY".red().bold()));
    }

    summary
}

/// Prints a report to stdout, followed by each probe's details
pub fn print_report(report: &AggregateReport) {
    println!("{}", format_report(report));

    for (name, result) in report.iter() {
        if let Some(details) = result.details() {
            let rendered = serde_json::to_string_pretty(details).unwrap_or_default();
            println!("\n{} Details:", name.bold());
            println!("{rendered}");
        }
    }
}
