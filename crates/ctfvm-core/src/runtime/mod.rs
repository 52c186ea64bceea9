//! Capability interface to the container runtime.
//!
//! The lifecycle manager never talks to a runtime directly; it drives an
//! `Arc<dyn Runtime>`. `ctfvm-docker` provides the Docker implementation and
//! [`MemoryRuntime`] keeps everything in process for tests and dry runs.

use std::{collections::HashMap, path::PathBuf, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

mod memory;
pub use memory::MemoryRuntime;

/// Name of the build file expected at the root of a challenge directory.
pub const DOCKERFILE: &str = "Dockerfile";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("image build failed: {0}")]
    BuildFailed(String),
    #[error("container create failed: {0}")]
    CreateFailed(String),
    #[error("container start failed: {0}")]
    StartFailed(String),
    #[error("container teardown failed: {0}")]
    TeardownFailed(String),
    #[error("container lookup failed: {0}")]
    Lookup(String),
}

/// Image build request.
#[derive(Debug, Clone)]
pub struct BuildSpec {
    /// Directory sent to the runtime as build context.
    pub context_dir: PathBuf,
    /// Build file path relative to `context_dir`.
    pub dockerfile: String,
    /// Tag applied to the resulting image.
    pub image_ref: String,
}

/// Container create request.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    pub image: String,
    pub name: String,
    pub network: String,
    pub labels: HashMap<String, String>,
}

/// Container as reported by a name lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeContainer {
    pub id: String,
    pub name: String,
    pub running: bool,
}

#[async_trait]
pub trait Runtime: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Build an image from a directory and return its reference.
    async fn build_image(&self, spec: &BuildSpec) -> Result<String, RuntimeError>;

    /// Create and start a container, returning the runtime id.
    ///
    /// A container that was created but failed to start must be removed
    /// before `StartFailed` is returned.
    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Graceful stop followed by a forced remove.
    ///
    /// Fails only when both the stop and the forced remove fail.
    async fn stop_and_remove(&self, id: &str, grace: Duration) -> Result<(), RuntimeError>;

    /// Exact-name lookup across running and stopped containers.
    async fn find_by_name(&self, name: &str) -> Result<Option<RuntimeContainer>, RuntimeError>;
}

/// Edge-router labels binding `hostname` to the container's service port.
pub fn routing_labels(name: &str, hostname: &str) -> HashMap<String, String> {
    HashMap::from([
        ("traefik.enable".to_string(), "true".to_string()),
        (
            format!("traefik.http.routers.{name}.rule"),
            format!("Host(`{hostname}`)"),
        ),
        (
            format!("traefik.http.services.{name}.loadbalancer.server.port"),
            ctfvm_model::SERVICE_PORT.to_string(),
        ),
    ])
}
