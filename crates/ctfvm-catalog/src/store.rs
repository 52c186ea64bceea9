use std::{fs, path::Path};

use async_trait::async_trait;
use ctfvm_model::{Challenge, ChallengeId, Team, TeamId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::CatalogError;

/// Read access to challenge and team metadata.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    async fn challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, CatalogError>;
    async fn team_exists(&self, id: TeamId) -> Result<bool, CatalogError>;
}

/// On-disk catalog document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogData {
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub challenges: Vec<Challenge>,
}

impl CatalogData {
    pub fn read(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read(path).map_err(|e| CatalogError::io(path, e))?;
        serde_json::from_slice(&raw).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read `path`, or start empty when it does not exist yet.
    pub fn read_or_default(path: &Path) -> Result<Self, CatalogError> {
        if path.exists() {
            Self::read(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn write_pretty(&self, path: &Path) -> Result<(), CatalogError> {
        let mut raw = serde_json::to_vec_pretty(self).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        raw.push(b'\n');
        fs::write(path, raw).map_err(|e| CatalogError::io(path, e))
    }

    pub fn challenge(&self, id: ChallengeId) -> Option<&Challenge> {
        self.challenges.iter().find(|c| c.id == id)
    }
}

/// Catalog loaded once from a JSON file.
#[derive(Debug, Clone, Default)]
pub struct FileCatalog {
    data: CatalogData,
}

impl FileCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let data = CatalogData::read(path)?;
        info!(
            path = %path.display(),
            teams = data.teams.len(),
            challenges = data.challenges.len(),
            "catalog loaded"
        );
        Ok(Self { data })
    }

    pub fn from_data(data: CatalogData) -> Self {
        Self { data }
    }
}

#[async_trait]
impl Catalog for FileCatalog {
    async fn challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, CatalogError> {
        Ok(self.data.challenge(id).cloned())
    }

    async fn team_exists(&self, id: TeamId) -> Result<bool, CatalogError> {
        Ok(self.data.teams.iter().any(|t| t.id == id))
    }
}
