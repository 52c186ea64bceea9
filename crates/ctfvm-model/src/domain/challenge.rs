use serde::{Deserialize, Serialize};

use crate::{ChallengeId, ChallengeTag, ModelError, TeamId};

/// Challenge metadata as held by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: String,
    #[serde(default)]
    pub points: u32,
    #[serde(default)]
    pub flag: String,
    /// Whether the challenge ships a `Dockerfile` and gets a per-team workload.
    #[serde(default)]
    pub requires_vm: bool,
}

impl Challenge {
    /// Tag for this challenge, rejecting metadata that cannot name a workload.
    pub fn tag(&self) -> Result<ChallengeTag, ModelError> {
        ChallengeTag::validated(&self.category, &self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: TeamId,
    #[serde(default)]
    pub name: String,
}
