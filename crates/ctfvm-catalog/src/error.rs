use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("challenge directory not found: {0}")]
    ChallengeDirNotFound(PathBuf),
    #[error("artifact not found: {0}")]
    ArtifactNotFound(String),
    #[error("invalid artifact name: {0}")]
    InvalidArtifactName(String),
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CatalogError::ChallengeDirNotFound(_) | CatalogError::ArtifactNotFound(_)
        )
    }
}
