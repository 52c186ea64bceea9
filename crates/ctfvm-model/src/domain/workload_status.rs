use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle phase of a workload as seen by status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkloadStatus {
    /// Image build or container start in progress.
    Provisioning,
    /// Running with an armed expiry timer.
    Active,
    /// Teardown has started; the workload is about to disappear.
    Expiring,
}

impl WorkloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadStatus::Provisioning => "provisioning",
            WorkloadStatus::Active => "active",
            WorkloadStatus::Expiring => "expiring",
        }
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
