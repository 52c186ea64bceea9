use ctfvm_model::{ModelError, WorkloadKey};
use thiserror::Error;

use crate::runtime::RuntimeError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("workload {0} not found")]
    WorkloadNotFound(WorkloadKey),

    #[error("challenge directory for {0} not found")]
    ChallengeNotFound(String),

    #[error("challenge misconfigured: {0}")]
    ChallengeMisconfigured(String),

    #[error("runtime failure for {key}: {source}")]
    Runtime {
        key: WorkloadKey,
        #[source]
        source: RuntimeError,
    },

    #[error("operation on {0} was interrupted before completing")]
    Interrupted(WorkloadKey),
}

impl CoreError {
    pub(crate) fn runtime(key: &WorkloadKey, source: RuntimeError) -> Self {
        CoreError::Runtime {
            key: key.clone(),
            source,
        }
    }

    /// True for every flavour of "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::WorkloadNotFound(_) | CoreError::ChallengeNotFound(_)
        )
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::ChallengeMisconfigured(msg) => CoreError::ChallengeMisconfigured(msg),
        }
    }
}
