//! Per-probe metrics registry.

use std::io::Write;

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;

use crate::probe::ProbeResult;

/// Namespace shared by every probe metric.
pub const NAMESPACE: &str = "restic";

const SNAPSHOT_LABELS: &[&str] = &["hostname", "paths", "tags"];

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Gauges describing one probe.
///
/// A fresh instance is built for every request and dropped once the
/// response is written, so label sets from one target never show up in
/// another target's scrape.
pub struct ProbeMetrics {
    registry: Registry,

    snapshot_time: GaugeVec,
    total_file_count: GaugeVec,
    total_size: GaugeVec,
    lock_time: GaugeVec,
}

fn gauge_vec(
    subsystem: &str,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<GaugeVec, MetricsError> {
    let opts = Opts::new(name, help)
        .namespace(NAMESPACE)
        .subsystem(subsystem);
    Ok(GaugeVec::new(opts, labels)?)
}

impl ProbeMetrics {
    /// Creates a new isolated registry with all probe metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let snapshot_time = gauge_vec(
            "snapshots",
            "latest_time",
            "Time of the latest snapshot",
            SNAPSHOT_LABELS,
        )?;
        let total_file_count = gauge_vec(
            "stats",
            "latest_total_nfiles",
            "Number of files",
            SNAPSHOT_LABELS,
        )?;
        let total_size = gauge_vec(
            "stats",
            "latest_total_size",
            "Total Size",
            SNAPSHOT_LABELS,
        )?;
        // Label-less, but a vec so that "no lock" renders no sample at all
        // instead of a zero.
        let lock_time = gauge_vec("locks", "latest_time", "Time of the latest lock", &[])?;

        registry.register(Box::new(total_size.clone()))?;
        registry.register(Box::new(total_file_count.clone()))?;
        registry.register(Box::new(snapshot_time.clone()))?;
        registry.register(Box::new(lock_time.clone()))?;

        Ok(Self {
            registry,
            snapshot_time,
            total_file_count,
            total_size,
            lock_time,
        })
    }

    /// Sets gauges from a probe result.
    ///
    /// Only the first snapshot is used for labels and the timestamp. With no
    /// snapshots the labeled gauges stay empty.
    pub fn record(&self, result: &ProbeResult) {
        if result.locked {
            self.lock_time
                .with_label_values(&[])
                .set(current_unix_time());
        }

        let Some(snapshot) = result.representative() else {
            tracing::debug!("No matching snapshot; labeled gauges left empty");
            return;
        };

        let paths = snapshot.paths_label();
        let tags = snapshot.tags_label();
        let labels = [snapshot.hostname.as_str(), paths.as_str(), tags.as_str()];

        self.total_size
            .with_label_values(&labels)
            .set(result.stats.total_size as f64);
        self.total_file_count
            .with_label_values(&labels)
            .set(result.stats.total_file_count as f64);
        self.snapshot_time
            .with_label_values(&labels)
            .set(snapshot.time.timestamp() as f64);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Writes all metrics in Prometheus text format.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), MetricsError> {
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), writer)?;
        Ok(())
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Builds a throwaway registry for `result` and renders it.
pub fn render(result: &ProbeResult) -> Result<String, MetricsError> {
    let metrics = ProbeMetrics::new()?;
    metrics.record(result);
    metrics.encode()
}

fn current_unix_time() -> f64 {
    let now = chrono::Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_micros()) / 1e6
}
