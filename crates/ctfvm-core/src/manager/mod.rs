//! Workload lifecycle: provision, renew, stop and expire.
//!
//! Every mutation of a key happens while holding that key's exclusive
//! section, so at most one workload per key exists and timer firing and
//! renewal can never interleave. Runtime calls run inside the section of
//! the key they concern and never block other keys. Each section runs on
//! its own task, so a caller that goes away cannot leave it half done.

use std::{
    future::Future,
    path::PathBuf,
    sync::{Arc, Weak},
    time::Instant,
};

use ctfvm_model::{
    ChallengeId, ChallengeTag, TeamId, WorkloadInfo, WorkloadKey, WorkloadStatus,
};
use time::OffsetDateTime;
use tracing::{Instrument, debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::{
    error::CoreError,
    expiry::{ExpiryScheduler, ExpiryTimer},
    locks::KeyLocks,
    metrics::{LifecycleMetrics, NoopMetrics, ProvisionOutcome, TeardownReason},
    runtime::{
        BuildSpec, ContainerSpec, DOCKERFILE, Runtime, RuntimeContainer, RuntimeError,
        routing_labels,
    },
    state::{WorkloadRecord, WorkloadRegistry},
};

mod config;
pub use config::LifecycleConfig;

/// Owner of every workload and its expiry timer.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct LifecycleManager {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Arc<dyn Runtime>,
    config: LifecycleConfig,
    locks: KeyLocks<WorkloadKey>,
    registry: WorkloadRegistry,
    scheduler: ExpiryScheduler,
    metrics: Arc<dyn LifecycleMetrics>,
}

impl LifecycleManager {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        config: LifecycleConfig,
        metrics: Arc<dyn LifecycleMetrics>,
    ) -> Self {
        let scheduler = ExpiryScheduler::new(config.ttl);
        info!(
            runtime = runtime.name(),
            ttl_secs = config.ttl.as_secs(),
            network = %config.network,
            "lifecycle manager ready"
        );
        Self {
            inner: Arc::new(Inner {
                runtime,
                config,
                locks: KeyLocks::new(),
                registry: WorkloadRegistry::new(),
                scheduler,
                metrics,
            }),
        }
    }

    pub fn new_default(runtime: Arc<dyn Runtime>, config: LifecycleConfig) -> Self {
        Self::new(runtime, config, Arc::new(NoopMetrics))
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.inner.config
    }

    /// Provision the workload for `(team_id, tag)`, or renew it if it already exists.
    ///
    /// The work runs to completion even if the returned future is dropped.
    #[instrument(level = "info", skip(self, tag), fields(team = team_id, tag = %tag))]
    pub async fn start(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
        tag: &ChallengeTag,
    ) -> Result<WorkloadInfo, CoreError> {
        let key = WorkloadKey::new(team_id, tag.clone());
        self.detached(key, move |this, key| async move {
            this.start_locked(key, challenge_id).await
        })
        .await
    }

    /// Tear down the workload for `(team_id, tag)`.
    ///
    /// Local bookkeeping is dropped even when the runtime teardown fails.
    /// The teardown runs to completion even if the returned future is dropped.
    #[instrument(level = "info", skip(self, tag), fields(team = team_id, tag = %tag))]
    pub async fn stop(
        &self,
        team_id: TeamId,
        _challenge_id: ChallengeId,
        tag: &ChallengeTag,
    ) -> Result<(), CoreError> {
        let key = WorkloadKey::new(team_id, tag.clone());
        self.detached(key, |this, key| async move { this.stop_locked(key).await })
            .await
    }

    /// Push the expiry of `(team_id, tag)` out by one TTL.
    ///
    /// A workload missing from the registry but present in the runtime is
    /// adopted with a fresh timer.
    #[instrument(level = "info", skip(self, tag), fields(team = team_id, tag = %tag))]
    pub async fn renew(
        &self,
        team_id: TeamId,
        challenge_id: ChallengeId,
        tag: &ChallengeTag,
    ) -> Result<WorkloadInfo, CoreError> {
        let key = WorkloadKey::new(team_id, tag.clone());
        self.detached(key, move |this, key| async move {
            this.renew_locked(key, challenge_id).await
        })
        .await
    }

    /// Snapshot of the workload for `(team_id, tag)`, if active.
    pub fn get(&self, team_id: TeamId, tag: &ChallengeTag) -> Option<WorkloadInfo> {
        self.inner
            .registry
            .get(&WorkloadKey::new(team_id, tag.clone()))
    }

    /// Phase of `(team_id, tag)`, including in-flight provisions and teardowns.
    pub fn status(&self, team_id: TeamId, tag: &ChallengeTag) -> Option<WorkloadStatus> {
        self.inner
            .registry
            .status(&WorkloadKey::new(team_id, tag.clone()))
    }

    pub fn list(&self) -> Vec<WorkloadInfo> {
        self.inner.registry.list()
    }

    /// Disarm every expiry timer. Workloads keep running.
    pub fn shutdown(&self) {
        let cancelled = self.inner.registry.cancel_timers();
        info!(cancelled, "expiry timers disarmed");
    }

    /// Run one keyed operation on its own task and wait for it.
    ///
    /// Dropping the caller's future detaches the task instead of cancelling
    /// it, so a section that has begun always reaches register or teardown.
    async fn detached<T, F, Fut>(&self, key: WorkloadKey, op: F) -> Result<T, CoreError>
    where
        T: Send + 'static,
        F: FnOnce(LifecycleManager, WorkloadKey) -> Fut,
        Fut: Future<Output = Result<T, CoreError>> + Send + 'static,
    {
        let task = tokio::spawn(op(self.clone(), key.clone()).in_current_span());
        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {
                warn!("lifecycle task aborted");
                Err(CoreError::Interrupted(key))
            }
        }
    }

    // ---- internals; callers hold the key's section ----

    async fn start_locked(
        &self,
        key: WorkloadKey,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, CoreError> {
        let _section = self.inner.locks.acquire(&key).await;

        if let Some(info) = self.renew_local(&key) {
            debug!("workload already active, deadline extended");
            self.inner.metrics.record_renewal();
            return Ok(info);
        }

        let _provisioning = self.inner.registry.begin_provisioning(&key);
        let started = Instant::now();
        let result = self.provision(&key, challenge_id).await;

        let outcome = match &result {
            Ok((_, outcome)) => *outcome,
            Err(e) => {
                warn!(error = %e, "provisioning failed");
                ProvisionOutcome::Failed
            }
        };
        self.inner
            .metrics
            .record_provision(outcome, started.elapsed());
        self.report_active();

        result.map(|(info, _)| info)
    }

    async fn stop_locked(&self, key: WorkloadKey) -> Result<(), CoreError> {
        let _section = self.inner.locks.acquire(&key).await;

        let (record, _expiring) = self.inner.registry.begin_teardown(&key);
        self.report_active();

        let runtime_id = match record {
            Some(record) => record.runtime_id.clone(),
            None => match self.lookup(&key).await? {
                Some(found) => {
                    debug!(runtime_id = %found.id, "no local record, stopping container found by name");
                    found.id
                }
                None => return Err(CoreError::WorkloadNotFound(key)),
            },
        };

        let result = self
            .inner
            .runtime
            .stop_and_remove(&runtime_id, self.inner.config.stop_grace)
            .await;
        self.inner
            .metrics
            .record_teardown(TeardownReason::Stopped, result.is_ok());

        result.map_err(|source| CoreError::runtime(&key, source))?;
        info!(%runtime_id, "workload stopped");
        Ok(())
    }

    async fn renew_locked(
        &self,
        key: WorkloadKey,
        challenge_id: ChallengeId,
    ) -> Result<WorkloadInfo, CoreError> {
        let _section = self.inner.locks.acquire(&key).await;

        let info = match self.renew_local(&key) {
            Some(info) => info,
            None => {
                let found = self
                    .lookup(&key)
                    .await?
                    .ok_or_else(|| CoreError::WorkloadNotFound(key.clone()))?;
                debug!(runtime_id = %found.id, "adopting workload found by name");
                let info = self.register(&key, found.id, challenge_id);
                self.report_active();
                info
            }
        };

        self.inner.metrics.record_renewal();
        debug!(expires_at = %info.expires_at, "workload renewed");
        Ok(info)
    }


    async fn provision(
        &self,
        key: &WorkloadKey,
        challenge_id: ChallengeId,
    ) -> Result<(WorkloadInfo, ProvisionOutcome), CoreError> {
        let runtime = &self.inner.runtime;
        let config = &self.inner.config;

        if let Some(orphan) = self.lookup(key).await? {
            if orphan.running {
                info!(runtime_id = %orphan.id, "adopting running container left by an earlier process");
                let info = self.register(key, orphan.id, challenge_id);
                return Ok((info, ProvisionOutcome::Adopted));
            }
            warn!(runtime_id = %orphan.id, "removing stopped container before provisioning");
            runtime
                .stop_and_remove(&orphan.id, config.stop_grace)
                .await
                .map_err(|source| CoreError::runtime(key, source))?;
        }

        let context_dir = self.build_context(key)?;
        let image = runtime
            .build_image(&BuildSpec {
                context_dir,
                dockerfile: DOCKERFILE.to_string(),
                image_ref: key.image_ref(),
            })
            .await
            .map_err(|source| CoreError::runtime(key, source))?;
        debug!(%image, "image built");

        let name = key.container_name();
        let hostname = key.hostname(&config.base_domain);
        let spec = ContainerSpec {
            image,
            labels: routing_labels(&name, &hostname),
            network: config.network.clone(),
            name,
        };

        let runtime_id = match runtime.create_and_start(&spec).await {
            Ok(id) => id,
            Err(source) => {
                if matches!(source, RuntimeError::StartFailed(_)) {
                    self.purge_by_name(key).await;
                }
                return Err(CoreError::runtime(key, source));
            }
        };

        let info = self.register(key, runtime_id, challenge_id);
        info!(runtime_id = %info.runtime_id, hostname = %info.hostname, "workload provisioned");
        Ok((info, ProvisionOutcome::Created))
    }

    fn build_context(&self, key: &WorkloadKey) -> Result<PathBuf, CoreError> {
        let dir = self.inner.config.challenge_dir(key.tag.as_str());
        if !dir.is_dir() {
            return Err(CoreError::ChallengeNotFound(key.tag.to_string()));
        }
        if !dir.join(DOCKERFILE).is_file() {
            return Err(CoreError::ChallengeMisconfigured(format!(
                "{DOCKERFILE} not found for challenge {}",
                key.tag
            )));
        }
        Ok(dir)
    }

    /// Remove anything left under the workload's name after a failed create/start.
    async fn purge_by_name(&self, key: &WorkloadKey) {
        match self.lookup(key).await {
            Ok(Some(leftover)) => {
                warn!(runtime_id = %leftover.id, "removing container left by failed start");
                if let Err(e) = self
                    .inner
                    .runtime
                    .stop_and_remove(&leftover.id, self.inner.config.stop_grace)
                    .await
                {
                    error!(error = %e, runtime_id = %leftover.id, "rollback failed; container may be orphaned");
                }
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "rollback lookup failed"),
        }
    }

    async fn lookup(&self, key: &WorkloadKey) -> Result<Option<RuntimeContainer>, CoreError> {
        self.inner
            .runtime
            .find_by_name(&key.container_name())
            .await
            .map_err(|source| CoreError::runtime(key, source))
    }

    /// Insert a record for a running container and arm its timer.
    fn register(
        &self,
        key: &WorkloadKey,
        runtime_id: String,
        challenge_id: ChallengeId,
    ) -> WorkloadInfo {
        let record = WorkloadRecord {
            runtime_id,
            name: key.container_name(),
            hostname: key.hostname(&self.inner.config.base_domain),
            team_id: key.team_id,
            challenge_id,
            expires_at: self.next_deadline(),
            timer: self.arm_timer(key),
        };
        self.inner.registry.insert(key.clone(), record)
    }

    fn renew_local(&self, key: &WorkloadKey) -> Option<WorkloadInfo> {
        if !self.inner.registry.contains(key) {
            return None;
        }
        self.inner
            .registry
            .rearm(key, self.arm_timer(key), self.next_deadline())
    }

    fn next_deadline(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc() + self.inner.config.ttl
    }

    fn arm_timer(&self, key: &WorkloadKey) -> ExpiryTimer {
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let key = key.clone();
        self.inner.scheduler.arm(move |timer_id| async move {
            if let Some(inner) = weak.upgrade() {
                LifecycleManager { inner }.expire(key, timer_id).await;
            }
        })
    }

    #[instrument(level = "info", skip(self, key), fields(team = key.team_id, tag = %key.tag, timer = %timer_id))]
    async fn expire(&self, key: WorkloadKey, timer_id: Uuid) {
        let _section = self.inner.locks.acquire(&key).await;

        let Some((record, _expiring)) = self.inner.registry.begin_expiry(&key, timer_id) else {
            trace!("timer superseded by renew or stop");
            return;
        };
        self.report_active();
        info!(runtime_id = %record.runtime_id, "workload expired, tearing down");

        let result = self
            .inner
            .runtime
            .stop_and_remove(&record.runtime_id, self.inner.config.stop_grace)
            .await;
        self.inner
            .metrics
            .record_teardown(TeardownReason::Expired, result.is_ok());

        if let Err(e) = result {
            error!(error = %e, runtime_id = %record.runtime_id, "expiry teardown failed; container may be orphaned");
        }
    }

    fn report_active(&self) {
        self.inner
            .metrics
            .set_active_workloads(self.inner.registry.len());
    }
}

#[cfg(test)]
mod tests;
