//! Fixture runner shared by unit tests.

use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::sync::Mutex;

use super::{Invocation, ToolOutput, ToolRunner};

pub const STATS: &str = r#"{"total_size":123456789,"total_file_count":4242}"#;
pub const SNAPSHOTS: &str = r#"[{"time":"2024-03-01T01:00:05Z","tree":"t","paths":["/etc","/srv"],"tags":["daily"],"hostname":"nas01","username":"root","id":"abcdef0123","short_id":"abcdef01"}]"#;

/// Replays canned outputs keyed by subcommand and records every call.
#[derive(Default)]
pub struct FakeRunner {
    outputs: HashMap<Invocation, ToolOutput>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn ok(mut self, invocation: Invocation, stdout: &str) -> Self {
        self.outputs.insert(
            invocation,
            ToolOutput {
                status: Some(0),
                success: true,
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
            },
        );
        self
    }

    pub fn fail(mut self, invocation: Invocation, stderr: &str) -> Self {
        self.outputs.insert(
            invocation,
            ToolOutput {
                status: Some(1),
                success: false,
                stdout: Vec::new(),
                stderr: stderr.as_bytes().to_vec(),
            },
        );
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn invocation_of(args: &[String]) -> Invocation {
    match (args[0].as_str(), args[1].as_str()) {
        ("list", "locks") => Invocation::ListLocks,
        ("stats", "latest") => Invocation::StatsLatest,
        ("snapshots", "latest") => Invocation::SnapshotsLatest,
        other => panic!("unexpected invocation {other:?}"),
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, args: Vec<String>) -> impl Future<Output = io::Result<ToolOutput>> + Send {
        let output = self
            .outputs
            .get(&invocation_of(&args))
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no fixture"));
        self.calls.lock().unwrap().push(args);
        async move { output }
    }
}

/// Runner answering every invocation successfully with the fixtures above.
pub fn healthy_runner() -> FakeRunner {
    FakeRunner::default()
        .ok(Invocation::ListLocks, "")
        .ok(Invocation::StatsLatest, STATS)
        .ok(Invocation::SnapshotsLatest, SNAPSHOTS)
}
