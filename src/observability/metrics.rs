//! Metrics collection and exposition.
//!
//! # Metrics
//! - `config_updates_total` (counter): update attempts by outcome
//! - `config_rollbacks_total` (counter): snapshot rollbacks
//! - `config_snapshots_total` (counter): manual snapshots
//! - `config_cache_hits_total` / `config_cache_misses_total` (counters)
//! - `config_cache_evictions_total` (counter)
//! - `config_cache_entries` (gauge): current entry count
//! - `flag_evaluations_total` (counter): by flag and result
//! - `config_reloads_total` (counter): by source and outcome

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter. Must be called from within a Tokio
/// runtime; recording is a no-op until this runs.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_update(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!("config_updates_total", "outcome" => outcome).increment(1);
}

pub fn record_rollback() {
    counter!("config_rollbacks_total").increment(1);
}

pub fn record_snapshot() {
    counter!("config_snapshots_total").increment(1);
}

pub fn record_cache_hit() {
    counter!("config_cache_hits_total").increment(1);
}

pub fn record_cache_miss() {
    counter!("config_cache_misses_total").increment(1);
}

pub fn record_cache_eviction() {
    counter!("config_cache_evictions_total").increment(1);
}

pub fn record_cache_size(entries: usize) {
    gauge!("config_cache_entries").set(entries as f64);
}

pub fn record_flag_evaluation(flag: &str, enabled: bool) {
    let result = if enabled { "enabled" } else { "disabled" };
    counter!("flag_evaluations_total", "flag" => flag.to_string(), "result" => result).increment(1);
}

pub fn record_reload(source: &str, outcome: &str) {
    counter!(
        "config_reloads_total",
        "source" => source.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
