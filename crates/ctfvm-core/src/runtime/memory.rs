use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tracing::{debug, trace};

use super::{BuildSpec, ContainerSpec, Runtime, RuntimeContainer, RuntimeError};

/// In-process runtime that only keeps bookkeeping.
///
/// Used for dry runs (`RUNTIME=memory`) and as the test double for the
/// lifecycle manager. Every step can be made to fail on demand.
#[derive(Default)]
pub struct MemoryRuntime {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    containers: HashMap<String, MemContainer>,
    images: HashSet<String>,
    next_id: u64,
    builds: usize,
    creates: usize,
    faults: Faults,
    build_delay: Option<Duration>,
    start_delay: Option<Duration>,
    teardown_delay: Option<Duration>,
}

#[derive(Default, Clone, Copy)]
struct Faults {
    build: bool,
    create: bool,
    start: bool,
    teardown: bool,
    leak_on_start_failure: bool,
}

#[derive(Debug, Clone)]
struct MemContainer {
    name: String,
    image: String,
    network: String,
    labels: HashMap<String, String>,
    running: bool,
}

impl MemoryRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_build(&self, on: bool) {
        self.lock().faults.build = on;
    }

    pub fn fail_create(&self, on: bool) {
        self.lock().faults.create = on;
    }

    pub fn fail_start(&self, on: bool) {
        self.lock().faults.start = on;
    }

    pub fn fail_teardown(&self, on: bool) {
        self.lock().faults.teardown = on;
    }

    /// Leave the created container behind when start fails, like a runtime
    /// client that does not clean up after itself.
    pub fn leak_on_start_failure(&self, on: bool) {
        self.lock().faults.leak_on_start_failure = on;
    }

    /// Make every image build take this long.
    pub fn set_build_delay(&self, delay: Duration) {
        self.lock().build_delay = Some(delay);
    }

    /// Hold every successful start this long after the container exists.
    pub fn set_start_delay(&self, delay: Duration) {
        self.lock().start_delay = Some(delay);
    }

    /// Hold every teardown this long before the container is removed.
    pub fn set_teardown_delay(&self, delay: Duration) {
        self.lock().teardown_delay = Some(delay);
    }

    /// Insert a running container directly, as if left over from an earlier process.
    pub fn insert_orphan(&self, name: &str, running: bool) -> String {
        let mut inner = self.lock();
        let id = inner.allocate_id();
        inner.containers.insert(
            id.clone(),
            MemContainer {
                name: name.to_string(),
                image: String::new(),
                network: String::new(),
                labels: HashMap::new(),
                running,
            },
        );
        id
    }

    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.lock().containers.values().any(|c| c.name == name)
    }

    pub fn labels_of(&self, name: &str) -> Option<HashMap<String, String>> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.labels.clone())
    }

    pub fn network_of(&self, name: &str) -> Option<String> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.network.clone())
    }

    pub fn image_of(&self, name: &str) -> Option<String> {
        self.lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .map(|c| c.image.clone())
    }

    pub fn build_count(&self) -> usize {
        self.lock().builds
    }

    pub fn create_count(&self) -> usize {
        self.lock().creates
    }
}

impl MemoryInner {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem-{:012x}", self.next_id)
    }

    fn create(&mut self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        if self.faults.create {
            return Err(RuntimeError::CreateFailed("injected create failure".into()));
        }
        if !self.images.contains(&spec.image) {
            return Err(RuntimeError::CreateFailed(format!(
                "no such image: {}",
                spec.image
            )));
        }
        if self.containers.values().any(|c| c.name == spec.name) {
            return Err(RuntimeError::CreateFailed(format!(
                "name {} already in use",
                spec.name
            )));
        }

        let id = self.allocate_id();
        self.creates += 1;
        self.containers.insert(
            id.clone(),
            MemContainer {
                name: spec.name.clone(),
                image: spec.image.clone(),
                network: spec.network.clone(),
                labels: spec.labels.clone(),
                running: false,
            },
        );

        if self.faults.start {
            if !self.faults.leak_on_start_failure {
                self.containers.remove(&id);
            }
            return Err(RuntimeError::StartFailed("injected start failure".into()));
        }

        if let Some(c) = self.containers.get_mut(&id) {
            c.running = true;
        }
        debug!(%id, name = %spec.name, "container started");
        Ok(id)
    }
}

#[async_trait]
impl Runtime for MemoryRuntime {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn build_image(&self, spec: &BuildSpec) -> Result<String, RuntimeError> {
        let delay = self.lock().build_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let build_file = spec.context_dir.join(&spec.dockerfile);
        if !build_file.is_file() {
            return Err(RuntimeError::BuildFailed(format!(
                "{} not found",
                build_file.display()
            )));
        }

        let mut inner = self.lock();
        inner.builds += 1;
        if inner.faults.build {
            return Err(RuntimeError::BuildFailed("injected build failure".into()));
        }
        inner.images.insert(spec.image_ref.clone());
        trace!(image = %spec.image_ref, "image recorded");
        Ok(spec.image_ref.clone())
    }

    async fn create_and_start(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let id = self.lock().create(spec)?;
        let delay = self.lock().start_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(id)
    }

    async fn stop_and_remove(&self, id: &str, _grace: Duration) -> Result<(), RuntimeError> {
        let delay = self.lock().teardown_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.lock();
        if inner.faults.teardown {
            return Err(RuntimeError::TeardownFailed("injected teardown failure".into()));
        }
        inner
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RuntimeError::TeardownFailed(format!("no such container: {id}")))
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<RuntimeContainer>, RuntimeError> {
        Ok(self
            .lock()
            .containers
            .iter()
            .find(|(_, c)| c.name == name)
            .map(|(id, c)| RuntimeContainer {
                id: id.clone(),
                name: c.name.clone(),
                running: c.running,
            }))
    }
}
