//! Data decoded from restic's `--json` output.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Output of `restic stats latest --json`.
///
/// Restic reports more fields than these; the rest are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SnapshotStats {
    /// Restored size of the snapshot in bytes.
    pub total_size: u64,
    /// Number of files in the snapshot.
    pub total_file_count: u64,
}

/// One entry of `restic snapshots latest --json`.
///
/// Restic omits `parent`, `tags` and sometimes `tree`/`username` when they
/// are empty; those decode as empty values.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Snapshot {
    pub time: DateTime<Utc>,
    #[serde(default)]
    pub parent: String,
    #[serde(default)]
    pub tree: String,
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub username: String,
    pub id: String,
    #[serde(default)]
    pub short_id: String,
}

impl Snapshot {
    /// Paths joined the way they are exported as a label.
    pub fn paths_label(&self) -> String {
        self.paths.join(":")
    }

    /// Tags joined the way they are exported as a label.
    pub fn tags_label(&self) -> String {
        self.tags.join(",")
    }
}

/// Everything one probe learned about the repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub stats: SnapshotStats,
    /// Snapshots in the order restic returned them.
    pub snapshots: Vec<Snapshot>,
    /// Whether `restic list locks` printed anything.
    pub locked: bool,
}

impl ProbeResult {
    /// The snapshot used for labels and the timestamp value.
    pub fn representative(&self) -> Option<&Snapshot> {
        self.snapshots.first()
    }
}
