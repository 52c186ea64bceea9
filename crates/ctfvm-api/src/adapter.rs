use std::sync::Arc;

use async_trait::async_trait;
use ctfvm_catalog::{ArtifactInfo, ArtifactStore, Catalog};
use ctfvm_core::LifecycleManager;
use ctfvm_model::{Challenge, ChallengeId, TeamId, WorkloadInfo};

use crate::{error::ApiError, handler::ApiHandler};

/// [`ApiHandler`] backed by a catalog and the lifecycle manager.
///
/// Resolves ids against the catalog, derives the challenge tag and
/// delegates workload operations to [`LifecycleManager`].
pub struct LifecycleApiAdapter {
    catalog: Arc<dyn Catalog>,
    manager: LifecycleManager,
    artifacts: ArtifactStore,
}

impl LifecycleApiAdapter {
    pub fn new(catalog: Arc<dyn Catalog>, manager: LifecycleManager) -> Self {
        let artifacts = ArtifactStore::new(manager.config().challenges_root.clone());
        Self {
            catalog,
            manager,
            artifacts,
        }
    }

    async fn challenge(&self, id: ChallengeId) -> Result<Challenge, ApiError> {
        if id == 0 {
            return Err(ApiError::InvalidRequest("Invalid challenge ID".into()));
        }
        self.catalog
            .challenge(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Challenge with ID {id} not found")))
    }
}

fn require_ids(team_id: TeamId, challenge_id: ChallengeId) -> Result<(), ApiError> {
    if team_id == 0 || challenge_id == 0 {
        return Err(ApiError::InvalidRequest(
            "Missing required parameters: teamId and challengeId".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ApiHandler for LifecycleApiAdapter {
    async fn start_workload(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, ApiError> {
        require_ids(team_id, challenge_id)?;
        if !self.catalog.team_exists(team_id).await? {
            return Err(ApiError::NotFound(format!("Team with ID {team_id} not found")));
        }
        let challenge = self.challenge(challenge_id).await?;
        let tag = challenge.tag()?;
        Ok(self.manager.start(team_id, challenge_id, &tag).await?)
    }

    async fn stop_workload(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> Result<(), ApiError> {
        require_ids(team_id, challenge_id)?;
        let tag = self.challenge(challenge_id).await?.tag()?;
        Ok(self.manager.stop(team_id, challenge_id, &tag).await?)
    }

    async fn renew_workload(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, ApiError> {
        require_ids(team_id, challenge_id)?;
        let tag = self.challenge(challenge_id).await?.tag()?;
        Ok(self.manager.renew(team_id, challenge_id, &tag).await?)
    }

    async fn list_workloads(&self) -> Vec<WorkloadInfo> {
        self.manager.list()
    }

    async fn list_artifacts(
        &self,
        challenge_id: ChallengeId,
    ) -> Result<(Challenge, Vec<ArtifactInfo>), ApiError> {
        let challenge = self.challenge(challenge_id).await?;
        let artifacts = self.artifacts.list(&challenge.tag()?).await?;
        Ok((challenge, artifacts))
    }

    async fn get_artifact(
        &self,
        challenge_id: ChallengeId,
        name: &str,
    ) -> Result<(ArtifactInfo, tokio::fs::File), ApiError> {
        let challenge = self.challenge(challenge_id).await?;
        let info = self.artifacts.get(&challenge.tag()?, name).await?;
        let file = self.artifacts.open(&info).await?;
        Ok((info, file))
    }
}
