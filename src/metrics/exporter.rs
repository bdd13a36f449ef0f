//! Exporter self-metrics served on `/metrics`.
//!
//! These describe the exporter process and never carry probe labels.

use std::time::Duration;

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use super::MetricsError;

const NAMESPACE: &str = "restic_exporter";

/// How a probe request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Success,
    Invalid,
    Failed,
    Cancelled,
}

impl ProbeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Process-wide exporter metrics.
pub struct ExporterMetrics {
    registry: Registry,
    probes_total: IntCounterVec,
    probe_duration: Histogram,
}

impl ExporterMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let probes_total = IntCounterVec::new(
            Opts::new("probes_total", "Probe requests handled, by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        let probe_duration = Histogram::with_opts(
            HistogramOpts::new(
                "probe_duration_seconds",
                "Time spent running restic for one probe",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;
        let build_info = IntGaugeVec::new(
            Opts::new("build_info", "Exporter build information").namespace(NAMESPACE),
            &["version"],
        )?;
        build_info
            .with_label_values(&[crate::VERSION])
            .set(1);

        registry.register(Box::new(probes_total.clone()))?;
        registry.register(Box::new(probe_duration.clone()))?;
        registry.register(Box::new(build_info))?;

        // Pre-create every outcome so rates start from zero.
        for outcome in [
            ProbeOutcome::Success,
            ProbeOutcome::Invalid,
            ProbeOutcome::Failed,
            ProbeOutcome::Cancelled,
        ] {
            probes_total.with_label_values(&[outcome.as_str()]);
        }

        Ok(Self {
            registry,
            probes_total,
            probe_duration,
        })
    }

    /// Records a finished probe. `elapsed` is `None` when restic never ran.
    pub fn observe(&self, outcome: ProbeOutcome, elapsed: Option<Duration>) {
        self.probes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
        if let Some(elapsed) = elapsed {
            self.probe_duration.observe(elapsed.as_secs_f64());
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcomes_counted() {
        let metrics = ExporterMetrics::new().unwrap();
        metrics.observe(ProbeOutcome::Success, Some(Duration::from_millis(300)));
        metrics.observe(ProbeOutcome::Invalid, None);
        metrics.observe(ProbeOutcome::Success, Some(Duration::from_millis(200)));

        let output = metrics.encode().unwrap();
        assert!(output.contains(r#"restic_exporter_probes_total{outcome="success"} 2"#));
        assert!(output.contains(r#"restic_exporter_probes_total{outcome="invalid"} 1"#));
        assert!(output.contains(r#"restic_exporter_probes_total{outcome="failed"} 0"#));
        assert!(output.contains("restic_exporter_probe_duration_seconds_count 2"));
    }

    #[test]
    fn test_build_info() {
        let output = ExporterMetrics::new().unwrap().encode().unwrap();
        assert!(output.contains(&format!(
            r#"restic_exporter_build_info{{version="{}"}} 1"#,
            crate::VERSION
        )));
    }
}
