use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{ChallengeId, TeamId, WorkloadStatus};

/// Read-only snapshot of a provisioned workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadInfo {
    /// Identifier assigned by the container runtime.
    pub runtime_id: String,
    /// Container name, `ctf-<tag>-team-<team>`.
    pub name: String,
    /// Hostname the edge router forwards to the container.
    pub hostname: String,
    pub status: WorkloadStatus,
    pub team_id: TeamId,
    pub challenge_id: ChallengeId,
    /// When the workload is torn down unless renewed.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn expires_at_is_rfc3339() {
        let info = WorkloadInfo {
            runtime_id: "abc".into(),
            name: "ctf-web-x-team-1".into(),
            hostname: "web-x-team-1.ctf.local".into(),
            status: WorkloadStatus::Active,
            team_id: 1,
            challenge_id: 4,
            expires_at: datetime!(2025-03-01 12:30:00 UTC),
        };

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["expiresAt"], "2025-03-01T12:30:00Z");
        assert_eq!(json["runtimeId"], "abc");
        assert_eq!(json["status"], "active");
    }
}
