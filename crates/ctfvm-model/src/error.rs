use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("challenge misconfigured: {0}")]
    ChallengeMisconfigured(String),
}
