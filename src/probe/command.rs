//! Restic invocations.
//!
//! Argument lists are built here, and [`ToolRunner`] is the seam between
//! the prober and the operating system so tests can replay fixtures
//! instead of spawning restic.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::ProbeParameters;

/// The three restic calls made by one probe, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Invocation {
    ListLocks,
    StatsLatest,
    SnapshotsLatest,
}

impl Invocation {
    /// Subcommand tokens passed ahead of the flags.
    pub fn subcommand(self) -> [&'static str; 2] {
        match self {
            Self::ListLocks => ["list", "locks"],
            Self::StatsLatest => ["stats", "latest"],
            Self::SnapshotsLatest => ["snapshots", "latest"],
        }
    }

    /// Human-readable name for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListLocks => "list locks",
            Self::StatsLatest => "stats latest",
            Self::SnapshotsLatest => "snapshots latest",
        }
    }
}

impl std::fmt::Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags shared by every invocation. `--no-lock` keeps the exporter from
/// ever taking a repository lock.
pub fn base_args(cache_dir: &Path) -> Vec<String> {
    vec![
        "--cache-dir".to_string(),
        cache_dir.to_string_lossy().into_owned(),
        "--json".to_string(),
        "--no-lock".to_string(),
    ]
}

/// Base flags plus the snapshot filters. Absent filters add nothing.
pub fn filter_args(cache_dir: &Path, params: &ProbeParameters) -> Vec<String> {
    let mut args = base_args(cache_dir);
    if let Some(host) = params.target() {
        args.push("--host".to_string());
        args.push(host.to_string());
    }
    if let Some(path) = params.path() {
        args.push("--path".to_string());
        args.push(path.to_string());
    }
    for tag in params.tags() {
        args.push("--tag".to_string());
        args.push(tag.clone());
    }
    args
}

/// Full argument list for one invocation, subcommand first.
pub fn build_args(invocation: Invocation, cache_dir: &Path, params: &ProbeParameters) -> Vec<String> {
    let flags = match invocation {
        Invocation::ListLocks => base_args(cache_dir),
        Invocation::StatsLatest | Invocation::SnapshotsLatest => filter_args(cache_dir, params),
    };
    invocation
        .subcommand()
        .iter()
        .map(|s| s.to_string())
        .chain(flags)
        .collect()
}

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ToolOutput {
    /// Standard error as lossy UTF-8, trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

impl From<std::process::Output> for ToolOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            status: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Runs the backup tool with a given argument list.
///
/// Dropping the returned future must stop the underlying process.
pub trait ToolRunner: Send + Sync + 'static {
    fn run(&self, args: Vec<String>) -> impl Future<Output = io::Result<ToolOutput>> + Send;
}

/// Spawns the real restic binary.
#[derive(Debug, Clone)]
pub struct ResticCommand {
    bin: PathBuf,
}

impl ResticCommand {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }
}

impl ToolRunner for ResticCommand {
    fn run(&self, args: Vec<String>) -> impl Future<Output = io::Result<ToolOutput>> + Send {
        let mut cmd = Command::new(&self.bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::trace!(bin = %self.bin.display(), ?args, "Spawning restic");

        async move { cmd.output().await.map(ToolOutput::from) }
    }
}
