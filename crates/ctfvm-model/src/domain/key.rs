use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ChallengeTag, TeamId};

/// Identity of at most one live workload: a team paired with a challenge tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadKey {
    pub team_id: TeamId,
    pub tag: ChallengeTag,
}

impl WorkloadKey {
    pub fn new(team_id: TeamId, tag: impl Into<ChallengeTag>) -> Self {
        Self {
            team_id,
            tag: tag.into(),
        }
    }

    /// Runtime container name, `ctf-<tag>-team-<team>`.
    #[inline]
    pub fn container_name(&self) -> String {
        derive_key(self.team_id, self.tag.as_str())
    }

    /// Public hostname routed to the container, `<tag>-team-<team>.<domain>`.
    pub fn hostname(&self, base_domain: &str) -> String {
        format!("{}-team-{}.{}", self.tag, self.team_id, base_domain)
    }

    /// Image reference the challenge build is tagged with.
    pub fn image_ref(&self) -> String {
        format!("ctf/{}", self.tag)
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/team-{}", self.tag, self.team_id)
    }
}

/// Container name for a team and tag.
#[inline]
pub fn derive_key(team_id: TeamId, tag: &str) -> String {
    format!("ctf-{tag}-team-{team_id}")
}
