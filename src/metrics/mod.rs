//! Prometheus rendering and the HTTP surface.
//!
//! # Probe Metrics
//!
//! Rendered by `/probe` from a registry that lives for one request only.
//! The first three carry `hostname`, `paths` (joined with `:`) and `tags`
//! (joined with `,`) from the first matching snapshot.
//!
//! - `restic_snapshots_latest_time` - Unix time of the latest snapshot
//! - `restic_stats_latest_total_nfiles` - Number of files in it
//! - `restic_stats_latest_total_size` - Total size in bytes
//! - `restic_locks_latest_time` - Probe time, present only while the repository is locked
//!
//! # Exporter Metrics
//!
//! Rendered by `/metrics`.
//!
//! - `restic_exporter_probes_total{outcome}` - Probe requests by outcome
//! - `restic_exporter_probe_duration_seconds` - Probe latency
//! - `restic_exporter_build_info{version}` - Always 1
//!
//! # Example
//!
//! ```no_run
//! use restic_exporter::metrics::render;
//! use restic_exporter::probe::ProbeResult;
//!
//! let body = render(&ProbeResult::default()).expect("Failed to render");
//! print!("{body}");
//! ```

mod collector;
mod exporter;
mod server;

pub use collector::{render, MetricsError, ProbeMetrics, NAMESPACE};
pub use exporter::{ExporterMetrics, ProbeOutcome};
pub use server::{create_router, AppState, MetricsServer, ServerError};
