//! Probe pipeline.
//!
//! A probe turns one `/probe` request into three restic invocations and
//! decodes their output:
//!
//! ```text
//! ProbeQuery → ProbeParameters → list locks → stats latest → snapshots latest → ProbeResult
//! ```
//!
//! Nothing here outlives the request. Any failure aborts the whole probe;
//! partial results are never returned.

mod command;
mod params;
mod prober;
mod snapshot;
#[cfg(test)]
pub(crate) mod testing;

pub use command::{
    base_args, build_args, filter_args, Invocation, ResticCommand, ToolOutput, ToolRunner,
};
pub use params::{ProbeParameters, ProbeQuery};
pub use prober::Prober;
pub use snapshot::{ProbeResult, Snapshot, SnapshotStats};

use thiserror::Error;

/// Errors that abort a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("target, tags or path parameter is missing")]
    MissingParameter,

    #[error("failed to run restic {invocation}: {source}")]
    Spawn {
        invocation: Invocation,
        #[source]
        source: std::io::Error,
    },

    #[error("restic {invocation} exited with status {status:?}: {stderr}")]
    ExternalTool {
        invocation: Invocation,
        status: Option<i32>,
        stderr: String,
    },

    #[error("failed to decode output of restic {invocation} as {expected}: {source}")]
    Decode {
        invocation: Invocation,
        expected: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("probe cancelled after {0:?}")]
    Cancelled(std::time::Duration),
}

impl ProbeError {
    /// Whether the caller, rather than the exporter or restic, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingParameter)
    }
}
