//! Restic Probe Exporter Library
//!
//! A Prometheus exporter in the blackbox style: every scrape of `/probe`
//! runs restic against the configured repository and reports lock
//! presence plus statistics and metadata of the latest matching snapshot.
//!
//! # Architecture
//!
//! ```text
//! /probe?target=&tags=&path=
//!     → ProbeParameters (validation)
//!     → Prober (list locks → stats latest → snapshots latest)
//!     → ProbeMetrics (fresh registry) → text exposition
//! ```
//!
//! # Design Principles
//!
//! - **Per-request registries**: probe gauges are never shared between scrapes
//! - **All or nothing**: any restic failure fails the scrape; no partial metrics
//! - **Never locks**: restic always runs with `--no-lock`
//! - **Explicit configuration**: resolved once at startup and passed down
//!
//! # Example
//!
//! ```no_run
//! use restic_exporter::{
//!     config::ExporterConfig,
//!     metrics::MetricsServer,
//!     probe::ResticCommand,
//! };
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ExporterConfig::new("/usr/bin/restic", "/var/cache/restic");
//! let server = MetricsServer::new(&config, ResticCommand::new(&config.restic_bin))?;
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod metrics;
pub mod probe;

// Re-export commonly used types at crate root
pub use config::{ConfigError, ExporterConfig};
pub use metrics::{MetricsServer, ProbeMetrics};
pub use probe::{ProbeError, ProbeParameters, ProbeResult, Prober, ResticCommand, ToolRunner};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
