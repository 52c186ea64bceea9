use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use bollard::{
    Docker,
    container::{
        Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
        StartContainerOptions, StopContainerOptions,
    },
    errors::Error as DockerError,
    image::BuildImageOptions,
    models::{ContainerSummary, HostConfig},
};
use ctfvm_core::{BuildSpec, ContainerSpec, Runtime, RuntimeContainer, RuntimeError};
use futures::StreamExt;
use tracing::{debug, info, trace, warn};

use crate::context::pack_dir;

/// Runtime backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform's default socket and ping the daemon.
    pub async fn connect() -> Result<Self, RuntimeError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| RuntimeError::Lookup(format!("connect to docker: {e}")))?;
        docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Lookup(format!("docker is not reachable: {e}")))?;
        info!("connected to docker daemon");
        Ok(Self { docker })
    }

    async fn remove(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
    }
}

#[async_trait]
impl Runtime for DockerRuntime {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<String, RuntimeError> {
        let dir = spec.context_dir.clone();
        let context = tokio::task::spawn_blocking(move || pack_dir(&dir))
            .await
            .map_err(|e| RuntimeError::BuildFailed(format!("pack build context: {e}")))?
            .map_err(|e| {
                RuntimeError::BuildFailed(format!(
                    "pack build context {}: {e}",
                    spec.context_dir.display()
                ))
            })?;
        debug!(image = %spec.image_ref, bytes = context.len(), "build context packed");

        let options = BuildImageOptions {
            dockerfile: spec.dockerfile.as_str(),
            t: spec.image_ref.as_str(),
            rm: true,
            ..Default::default()
        };
        let mut stream = self
            .docker
            .build_image(options, None, Some(context.into()));

        while let Some(item) = stream.next().await {
            match item {
                Ok(info) => {
                    if let Some(line) = info.stream {
                        let line = line.trim();
                        if !line.is_empty() {
                            trace!(image = %spec.image_ref, "{line}");
                        }
                    }
                    if let Some(error) = info.error {
                        return Err(RuntimeError::BuildFailed(error));
                    }
                }
                Err(e) => return Err(RuntimeError::BuildFailed(e.to_string())),
            }
        }

        info!(image = %spec.image_ref, "image built");
        Ok(spec.image_ref.clone())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let config = Config {
            image: Some(spec.image.clone()),
            labels: Some(spec.labels.clone()),
            host_config: Some(HostConfig {
                network_mode: Some(spec.network.clone()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.as_str(),
                    platform: None,
                }),
                config,
            )
            .await
            .map_err(|e| RuntimeError::CreateFailed(e.to_string()))?;
        for warning in &created.warnings {
            warn!(name = %spec.name, "{warning}");
        }

        if let Err(e) = self
            .docker
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await
        {
            if let Err(cleanup) = self.remove(&created.id).await {
                warn!(id = %created.id, error = %cleanup, "could not remove container after failed start");
            }
            return Err(RuntimeError::StartFailed(e.to_string()));
        }

        debug!(id = %created.id, name = %spec.name, "container started");
        Ok(created.id)
    }

    async fn stop_and_remove(&self, id: &str, grace: Duration) -> Result<(), RuntimeError> {
        let t = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        let stopped = self
            .docker
            .stop_container(id, Some(StopContainerOptions { t }))
            .await;
        let removed = self.remove(id).await;
        teardown_outcome(id, stopped, removed)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<RuntimeContainer>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![format!("^/{name}$")]);

        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| RuntimeError::Lookup(e.to_string()))?;

        Ok(containers
            .into_iter()
            .find_map(|summary| exact_match(summary, name)))
    }
}

/// Teardown fails only when the container could be neither stopped nor removed.
///
/// 304 from stop means it was already stopped; 404 from remove means it is already gone.
fn teardown_outcome(
    id: &str,
    stopped: Result<(), DockerError>,
    removed: Result<(), DockerError>,
) -> Result<(), RuntimeError> {
    let stop_err = match stopped {
        Ok(()) => None,
        Err(e) if status_of(&e) == Some(304) => None,
        Err(e) => Some(e),
    };
    match (stop_err, removed) {
        (_, Ok(())) => {
            debug!(%id, "container removed");
            Ok(())
        }
        (_, Err(e)) if status_of(&e) == Some(404) => {
            debug!(%id, "container already gone");
            Ok(())
        }
        (None, Err(e)) => {
            warn!(%id, error = %e, "container stopped but not removed");
            Ok(())
        }
        (Some(stop), Err(remove)) => Err(RuntimeError::TeardownFailed(format!(
            "stop: {stop}; remove: {remove}"
        ))),
    }
}

fn status_of(e: &DockerError) -> Option<u16> {
    match e {
        DockerError::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Docker's name filter is a regex over `/name`; re-check the exact name anyway.
fn exact_match(summary: ContainerSummary, name: &str) -> Option<RuntimeContainer> {
    let names = summary.names.unwrap_or_default();
    if !names
        .iter()
        .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    {
        return None;
    }
    Some(RuntimeContainer {
        id: summary.id?,
        name: name.to_string(),
        running: summary.state.as_deref() == Some("running"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, name: &str, state: &str) -> ContainerSummary {
        ContainerSummary {
            id: Some(id.into()),
            names: Some(vec![format!("/{name}")]),
            state: Some(state.into()),
            ..Default::default()
        }
    }

    fn server_error(status_code: u16) -> DockerError {
        DockerError::DockerResponseServerError {
            status_code,
            message: format!("status {status_code}"),
        }
    }

    #[test]
    fn teardown_fails_only_when_stop_and_remove_both_fail() {
        let cases = [
            (Ok(()), Ok(()), true),
            (Ok(()), Err(500), true),
            (Err(304), Err(500), true),
            (Err(500), Ok(()), true),
            (Err(500), Err(404), true),
            (Err(404), Err(404), true),
            (Err(500), Err(500), false),
            (Err(500), Err(409), false),
        ];
        for (stop, remove, ok) in cases {
            let result = teardown_outcome(
                "abc",
                stop.map_err(server_error),
                remove.map_err(server_error),
            );
            assert_eq!(result.is_ok(), ok, "stop={stop:?} remove={remove:?}");
        }
    }

    #[test]
    fn teardown_failure_reports_both_errors() {
        let err = teardown_outcome("abc", Err(server_error(500)), Err(server_error(409)))
            .unwrap_err();
        let RuntimeError::TeardownFailed(msg) = err else {
            panic!("unexpected error: {err}");
        };
        assert!(msg.contains("stop:") && msg.contains("remove:"), "{msg}");
    }

    #[test]
    fn exact_match_ignores_prefix_collisions() {
        let s = summary("abc", "ctf-web-x-team-12", "running");
        assert!(exact_match(s, "ctf-web-x-team-1").is_none());
    }

    #[test]
    fn exact_match_reads_state() {
        let found = exact_match(summary("abc", "ctf-web-x-team-1", "running"), "ctf-web-x-team-1")
            .unwrap();
        assert_eq!(found.id, "abc");
        assert!(found.running);

        let stopped =
            exact_match(summary("def", "ctf-web-x-team-1", "exited"), "ctf-web-x-team-1").unwrap();
        assert!(!stopped.running);
    }

    #[test]
    fn summary_without_id_is_skipped() {
        let mut s = summary("abc", "ctf-web-x-team-1", "running");
        s.id = None;
        assert!(exact_match(s, "ctf-web-x-team-1").is_none());
    }
}
