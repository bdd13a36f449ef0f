//! Probe orchestration.

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{
    build_args, Invocation, ProbeError, ProbeParameters, ProbeResult, Snapshot, SnapshotStats,
    ToolOutput, ToolRunner,
};
use crate::config::ExporterConfig;

/// Runs probes against restic through a [`ToolRunner`].
///
/// Holds only immutable configuration, so one instance serves any number
/// of concurrent requests.
pub struct Prober<R> {
    runner: R,
    cache_dir: PathBuf,
    timeout: Duration,
}

impl<R: ToolRunner> Prober<R> {
    /// Creates a prober using the cache directory and timeout from `config`.
    pub fn new(runner: R, config: &ExporterConfig) -> Self {
        Self {
            runner,
            cache_dir: config.cache_dir.clone(),
            timeout: config.probe_timeout,
        }
    }

    /// Returns the underlying runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Runs a full probe bounded by the configured timeout.
    ///
    /// When the deadline passes, the in-flight restic process is dropped
    /// and with it killed.
    pub async fn probe(&self, params: &ProbeParameters) -> Result<ProbeResult, ProbeError> {
        match tokio::time::timeout(self.timeout, self.run(params)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.timeout,
                    host = params.target(),
                    "Probe timed out"
                );
                Err(ProbeError::Cancelled(self.timeout))
            }
        }
    }

    async fn run(&self, params: &ProbeParameters) -> Result<ProbeResult, ProbeError> {
        let locks = self.invoke(Invocation::ListLocks, params).await?;
        let locked = !locks.stdout.is_empty();

        let stats: SnapshotStats = self
            .decode(Invocation::StatsLatest, params, "stats object")
            .await?;
        let snapshots: Vec<Snapshot> = self
            .decode(Invocation::SnapshotsLatest, params, "snapshot list")
            .await?;

        tracing::debug!(
            host = params.target(),
            path = params.path(),
            tags = ?params.tags(),
            locked,
            snapshots = snapshots.len(),
            "Probe completed"
        );

        Ok(ProbeResult {
            stats,
            snapshots,
            locked,
        })
    }

    async fn invoke(
        &self,
        invocation: Invocation,
        params: &ProbeParameters,
    ) -> Result<ToolOutput, ProbeError> {
        let args = build_args(invocation, &self.cache_dir, params);
        let output = self.runner.run(args).await.map_err(|source| {
            tracing::error!(%invocation, error = %source, "Failed to run restic");
            ProbeError::Spawn { invocation, source }
        })?;

        if !output.success {
            let stderr = output.stderr_text();
            tracing::warn!(
                %invocation,
                status = ?output.status,
                stderr = %stderr,
                "Restic exited with failure"
            );
            return Err(ProbeError::ExternalTool {
                invocation,
                status: output.status,
                stderr,
            });
        }

        Ok(output)
    }

    async fn decode<T: DeserializeOwned>(
        &self,
        invocation: Invocation,
        params: &ProbeParameters,
        expected: &'static str,
    ) -> Result<T, ProbeError> {
        let output = self.invoke(invocation, params).await?;
        serde_json::from_slice(&output.stdout).map_err(|source| {
            tracing::warn!(
                %invocation,
                expected,
                error = %source,
                "Unexpected restic output; check the restic version"
            );
            ProbeError::Decode {
                invocation,
                expected,
                source,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::testing::{healthy_runner, invocation_of, FakeRunner};
    use crate::probe::ProbeQuery;
    use std::io;

    fn prober(runner: FakeRunner) -> Prober<FakeRunner> {
        Prober::new(runner, &ExporterConfig::new("restic", "/cache"))
    }

    fn host(target: &str) -> ProbeParameters {
        ProbeParameters::from_query(ProbeQuery {
            target: Some(target.to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_probe_decodes_fixtures() {
        let prober = prober(healthy_runner());
        let result = prober.probe(&host("nas01")).await.unwrap();

        assert!(!result.locked);
        assert_eq!(result.stats.total_size, 123_456_789);
        assert_eq!(result.stats.total_file_count, 4242);
        assert_eq!(result.snapshots.len(), 1);
        assert_eq!(result.representative().unwrap().hostname, "nas01");
    }

    #[tokio::test]
    async fn test_invocations_run_in_order() {
        let prober = prober(healthy_runner());
        prober.probe(&host("nas01")).await.unwrap();

        let order: Vec<Invocation> = prober
            .runner()
            .calls()
            .iter()
            .map(|args| invocation_of(args))
            .collect();
        assert_eq!(
            order,
            [
                Invocation::ListLocks,
                Invocation::StatsLatest,
                Invocation::SnapshotsLatest
            ]
        );
    }

    #[tokio::test]
    async fn test_any_lock_output_means_locked() {
        let runner = healthy_runner().ok(Invocation::ListLocks, "not even json");
        let result = prober(runner).probe(&host("nas01")).await.unwrap();
        assert!(result.locked);
    }

    #[tokio::test]
    async fn test_failure_at_each_invocation_aborts() {
        for failing in [
            Invocation::ListLocks,
            Invocation::StatsLatest,
            Invocation::SnapshotsLatest,
        ] {
            let runner = healthy_runner().fail(failing, "Fatal: unable to open repository");
            let prober = prober(runner);
            match prober.probe(&host("nas01")).await {
                Err(ProbeError::ExternalTool {
                    invocation, stderr, ..
                }) => {
                    assert_eq!(invocation, failing);
                    assert_eq!(stderr, "Fatal: unable to open repository");
                }
                other => panic!("expected ExternalTool error, got {other:?}"),
            }
            // nothing after the failing step runs
            let last = prober.runner().calls().last().map(|a| invocation_of(a));
            assert_eq!(last, Some(failing));
        }
    }

    #[tokio::test]
    async fn test_malformed_output_is_decode_error() {
        let runner = healthy_runner().ok(Invocation::SnapshotsLatest, r#"{"not":"a list"}"#);
        assert!(matches!(
            prober(runner).probe(&host("nas01")).await,
            Err(ProbeError::Decode {
                invocation: Invocation::SnapshotsLatest,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_empty_snapshot_list_is_not_an_error() {
        let runner = healthy_runner().ok(Invocation::SnapshotsLatest, "[]");
        let result = prober(runner).probe(&host("nas01")).await.unwrap();
        assert!(result.representative().is_none());
    }

    struct HangingRunner;

    impl ToolRunner for HangingRunner {
        fn run(
            &self,
            _args: Vec<String>,
        ) -> impl std::future::Future<Output = io::Result<ToolOutput>> + Send {
            std::future::pending()
        }
    }

    #[tokio::test]
    async fn test_timeout_cancels_probe() {
        let mut config = ExporterConfig::new("restic", "/cache");
        config.probe_timeout = Duration::from_millis(20);
        let prober = Prober::new(HangingRunner, &config);

        assert!(matches!(
            prober.probe(&host("nas01")).await,
            Err(ProbeError::Cancelled(_))
        ));
    }

    /// Runs a shell script through the real process runner, whatever
    /// arguments the prober asks for.
    #[cfg(unix)]
    struct ShellScript {
        shell: crate::probe::ResticCommand,
        script: String,
    }

    #[cfg(unix)]
    impl ToolRunner for ShellScript {
        fn run(
            &self,
            _args: Vec<String>,
        ) -> impl std::future::Future<Output = io::Result<ToolOutput>> + Send {
            self.shell
                .run(vec!["-c".to_string(), self.script.clone()])
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_real_process() {
        let marker = std::env::temp_dir().join(format!(
            "restic-exporter-kill-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&marker);

        let mut config = ExporterConfig::new("sh", "/cache");
        config.probe_timeout = Duration::from_millis(100);
        let runner = ShellScript {
            shell: crate::probe::ResticCommand::new("sh"),
            script: format!("sleep 1; touch '{}'", marker.display()),
        };
        let prober = Prober::new(runner, &config);

        assert!(matches!(
            prober.probe(&host("nas01")).await,
            Err(ProbeError::Cancelled(_))
        ));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!marker.exists(), "restic process outlived the probe");
    }
}
