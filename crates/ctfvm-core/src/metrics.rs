//! Metrics seam for the lifecycle manager.
//!
//! The core only reports events; `ctfvm-prometheus` turns them into series.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// Image built and a fresh container started.
    Created,
    /// A running container with the workload's name was taken over.
    Adopted,
    Failed,
}

impl ProvisionOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            ProvisionOutcome::Created => "created",
            ProvisionOutcome::Adopted => "adopted",
            ProvisionOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownReason {
    Stopped,
    Expired,
}

impl TeardownReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            TeardownReason::Stopped => "stopped",
            TeardownReason::Expired => "expired",
        }
    }
}

pub trait LifecycleMetrics: Send + Sync + 'static {
    fn record_provision(&self, _outcome: ProvisionOutcome, _elapsed: Duration) {}
    fn record_teardown(&self, _reason: TeardownReason, _ok: bool) {}
    fn record_renewal(&self) {}
    fn set_active_workloads(&self, _count: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl LifecycleMetrics for NoopMetrics {}
