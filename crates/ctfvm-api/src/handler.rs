use async_trait::async_trait;
use ctfvm_catalog::ArtifactInfo;
use ctfvm_model::{Challenge, ChallengeId, TeamId, WorkloadInfo};

use crate::error::ApiError;

/// Workload and artifact API handler.
///
/// Transports (the axum router) call through this trait so alternative
/// backends or decorators (auth, rate limiting) can be slotted in.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Provision or renew the team's workload for a challenge.
    async fn start_workload(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, ApiError>;

    async fn stop_workload(&self, team_id: TeamId, challenge_id: ChallengeId)
    -> Result<(), ApiError>;

    async fn renew_workload(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, ApiError>;

    async fn list_workloads(&self) -> Vec<WorkloadInfo>;

    async fn list_artifacts(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<(Challenge, Vec<ArtifactInfo>), ApiError>;

    /// Artifact metadata and an open handle to stream it from.
    async fn get_artifact(
        &self,
        challenge_id: ChallengeId,
        name: &str,
    ) -> Result<(ArtifactInfo, tokio::fs::File), ApiError>;
}
