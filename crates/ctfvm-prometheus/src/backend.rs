use std::time::Duration;

use ctfvm_core::{LifecycleMetrics, ProvisionOutcome, TeardownReason};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder, proto::MetricFamily,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus: {0}")]
    Prometheus(#[from] prometheus::Error),
    #[error("metrics text is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Lifecycle counters registered on their own registry.
///
/// Clones share the same collectors.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    provisions: IntCounterVec,
    teardowns: IntCounterVec,
    renewals: IntCounter,
    active: IntGauge,
    provision_duration: Histogram,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let provisions = IntCounterVec::new(
            Opts::new("ctfvm_provisions_total", "Provision attempts by outcome"),
            &["outcome"],
        )?;
        let teardowns = IntCounterVec::new(
            Opts::new("ctfvm_teardowns_total", "Workload teardowns by reason and outcome"),
            &["reason", "outcome"],
        )?;
        let renewals = IntCounter::new("ctfvm_renewals_total", "Successful workload renewals")?;
        let active = IntGauge::new("ctfvm_active_workloads", "Workloads currently registered")?;
        let provision_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ctfvm_provision_duration_seconds",
                "Time spent provisioning a workload, image build included",
            )
            .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        registry.register(Box::new(provisions.clone()))?;
        registry.register(Box::new(teardowns.clone()))?;
        registry.register(Box::new(renewals.clone()))?;
        registry.register(Box::new(active.clone()))?;
        registry.register(Box::new(provision_duration.clone()))?;

        Ok(Self {
            registry,
            provisions,
            teardowns,
            renewals,
            active,
            provision_duration,
        })
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Render every collector in the Prometheus text exposition format.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

impl LifecycleMetrics for PrometheusMetrics {
    fn record_provision(&self, outcome: ProvisionOutcome, elapsed: Duration) {
        self.provisions
            .with_label_values(&[outcome.as_label()])
            .inc();
        if outcome != ProvisionOutcome::Failed {
            self.provision_duration.observe(elapsed.as_secs_f64());
        }
    }

    fn record_teardown(&self, reason: TeardownReason, ok: bool) {
        let outcome = if ok { "ok" } else { "error" };
        self.teardowns
            .with_label_values(&[reason.as_label(), outcome])
            .inc();
    }

    fn record_renewal(&self) {
        self.renewals.inc();
    }

    fn set_active_workloads(&self, count: usize) {
        self.active.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}
