use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use ctfvm_model::{ChallengeId, TeamId, WorkloadInfo, WorkloadKey, WorkloadStatus};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::expiry::ExpiryTimer;

/// Bookkeeping for one provisioned workload.
///
/// Owned by the registry; the armed timer is cancelled when the record is dropped.
#[derive(Debug)]
pub(crate) struct WorkloadRecord {
    pub runtime_id: String,
    pub name: String,
    pub hostname: String,
    pub team_id: TeamId,
    pub challenge_id: ChallengeId,
    pub expires_at: OffsetDateTime,
    pub timer: ExpiryTimer,
}

impl WorkloadRecord {
    fn info(&self, status: WorkloadStatus) -> WorkloadInfo {
        WorkloadInfo {
            runtime_id: self.runtime_id.clone(),
            name: self.name.clone(),
            hostname: self.hostname.clone(),
            status,
            team_id: self.team_id,
            challenge_id: self.challenge_id,
            expires_at: self.expires_at,
        }
    }
}

/// In-memory workload registry.
///
/// Readers take the shared lock only; writers must additionally hold the
/// key's exclusive section from [`crate::KeyLocks`].
#[derive(Clone)]
pub struct WorkloadRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

struct RegistryInner {
    /// Active workloads indexed by key.
    records: HashMap<WorkloadKey, WorkloadRecord>,
    /// Keys with a provision or teardown in flight.
    transitions: HashMap<WorkloadKey, WorkloadStatus>,
}

impl WorkloadRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(RegistryInner {
                records: HashMap::new(),
                transitions: HashMap::new(),
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, key: WorkloadKey, record: WorkloadRecord) -> WorkloadInfo {
        let info = record.info(WorkloadStatus::Active);
        self.write().records.insert(key, record);
        info
    }

    pub fn contains(&self, key: &WorkloadKey) -> bool {
        self.read().records.contains_key(key)
    }

    /// Swap in a freshly armed timer and a new deadline.
    ///
    /// The previous timer is dropped, which cancels it.
    pub(crate) fn rearm(
        &self,
        key: &WorkloadKey,
        timer: ExpiryTimer,
        expires_at: OffsetDateTime,
    ) -> Option<WorkloadInfo> {
        let mut inner = self.write();
        let record = inner.records.get_mut(key)?;
        record.timer = timer;
        record.expires_at = expires_at;
        Some(record.info(WorkloadStatus::Active))
    }

    /// Remove the record (if any) and mark the key as expiring until the
    /// returned guard is dropped.
    pub(crate) fn begin_teardown(
        &self,
        key: &WorkloadKey,
    ) -> (Option<WorkloadRecord>, TransitionGuard) {
        let mut inner = self.write();
        let record = inner.records.remove(key);
        inner
            .transitions
            .insert(key.clone(), WorkloadStatus::Expiring);
        (record, self.transition_guard(key))
    }

    /// Like [`Self::begin_teardown`], but only when the record is still armed
    /// with `timer_id`. A renewal or stop that got there first wins.
    pub(crate) fn begin_expiry(
        &self,
        key: &WorkloadKey,
        timer_id: Uuid,
    ) -> Option<(WorkloadRecord, TransitionGuard)> {
        let mut inner = self.write();
        if inner.records.get(key)?.timer.id() != timer_id {
            return None;
        }
        let record = inner.records.remove(key)?;
        inner
            .transitions
            .insert(key.clone(), WorkloadStatus::Expiring);
        Some((record, self.transition_guard(key)))
    }

    /// Mark the key as provisioning until the returned guard is dropped.
    pub(crate) fn begin_provisioning(&self, key: &WorkloadKey) -> TransitionGuard {
        self.write()
            .transitions
            .insert(key.clone(), WorkloadStatus::Provisioning);
        self.transition_guard(key)
    }

    fn transition_guard(&self, key: &WorkloadKey) -> TransitionGuard {
        TransitionGuard {
            registry: self.clone(),
            key: key.clone(),
        }
    }

    /// Snapshot of an active workload.
    pub fn get(&self, key: &WorkloadKey) -> Option<WorkloadInfo> {
        let inner = self.read();
        inner.records.get(key).map(|r| {
            let status = inner
                .transitions
                .get(key)
                .copied()
                .unwrap_or(WorkloadStatus::Active);
            r.info(status)
        })
    }

    /// Current phase of a key, including in-flight provisions and teardowns.
    pub fn status(&self, key: &WorkloadKey) -> Option<WorkloadStatus> {
        let inner = self.read();
        inner
            .transitions
            .get(key)
            .copied()
            .or_else(|| inner.records.get(key).map(|_| WorkloadStatus::Active))
    }

    /// All active workloads, ordered by key.
    pub fn list(&self) -> Vec<WorkloadInfo> {
        let inner = self.read();
        let mut entries: Vec<_> = inner.records.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
            .into_iter()
            .map(|(_, r)| r.info(WorkloadStatus::Active))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cancel every armed timer without touching the records.
    pub fn cancel_timers(&self) -> usize {
        let inner = self.read();
        for record in inner.records.values() {
            record.timer.cancel();
        }
        inner.records.len()
    }
}

impl Default for WorkloadRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears a key's in-flight status on drop.
pub(crate) struct TransitionGuard {
    registry: WorkloadRegistry,
    key: WorkloadKey,
}

impl Drop for TransitionGuard {
    fn drop(&mut self) {
        self.registry.write().transitions.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expiry::ExpiryScheduler;
    use std::time::Duration;

    fn timer() -> ExpiryTimer {
        ExpiryScheduler::new(Duration::from_secs(3600)).arm(|_| async {})
    }

    fn record(key: &WorkloadKey) -> WorkloadRecord {
        WorkloadRecord {
            runtime_id: format!("id-{}", key.team_id),
            name: key.container_name(),
            hostname: key.hostname("ctf.local"),
            team_id: key.team_id,
            challenge_id: 9,
            expires_at: OffsetDateTime::now_utc(),
            timer: timer(),
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(1, "web-x");

        let info = reg.insert(key.clone(), record(&key));
        assert_eq!(info.status, WorkloadStatus::Active);
        assert_eq!(reg.get(&key).unwrap().name, "ctf-web-x-team-1");
        assert_eq!(reg.status(&key), Some(WorkloadStatus::Active));
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn rearm_cancels_previous_timer() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(1, "web-x");
        let rec = record(&key);
        let old_token = rec.timer.token_for_tests();
        reg.insert(key.clone(), rec);

        let later = OffsetDateTime::now_utc() + time::Duration::minutes(5);
        let info = reg.rearm(&key, timer(), later).unwrap();
        assert_eq!(info.expires_at, later);
        assert!(old_token.is_cancelled());
    }

    #[tokio::test]
    async fn rearm_missing_key_returns_none() {
        let reg = WorkloadRegistry::new();
        assert!(reg.rearm(&WorkloadKey::new(1, "web-x"), timer(), OffsetDateTime::now_utc()).is_none());
    }

    #[tokio::test]
    async fn begin_teardown_marks_expiring_until_guard_drops() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(1, "web-x");
        reg.insert(key.clone(), record(&key));

        let (rec, guard) = reg.begin_teardown(&key);
        assert!(rec.is_some());
        assert!(!reg.contains(&key));
        assert_eq!(reg.status(&key), Some(WorkloadStatus::Expiring));

        drop(guard);
        assert_eq!(reg.status(&key), None);
    }

    #[tokio::test]
    async fn begin_expiry_requires_matching_timer() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(1, "web-x");
        let rec = record(&key);
        let armed = rec.timer.id();
        reg.insert(key.clone(), rec);

        assert!(reg.begin_expiry(&key, Uuid::new_v4()).is_none());
        assert!(reg.contains(&key));

        let (rec, _guard) = reg.begin_expiry(&key, armed).unwrap();
        assert_eq!(rec.timer.id(), armed);
        assert!(!reg.contains(&key));
    }

    #[tokio::test]
    async fn provisioning_status_without_record() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(2, "cry-rsa");

        let guard = reg.begin_provisioning(&key);
        assert_eq!(reg.status(&key), Some(WorkloadStatus::Provisioning));
        assert!(reg.get(&key).is_none());
        drop(guard);
        assert_eq!(reg.status(&key), None);
    }

    #[tokio::test]
    async fn list_is_sorted_by_key() {
        let reg = WorkloadRegistry::new();
        for team in [3, 1, 2] {
            let key = WorkloadKey::new(team, "web-x");
            reg.insert(key.clone(), record(&key));
        }
        let teams: Vec<_> = reg.list().into_iter().map(|i| i.team_id).collect();
        assert_eq!(teams, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn cancel_timers_keeps_records() {
        let reg = WorkloadRegistry::new();
        let key = WorkloadKey::new(1, "web-x");
        let rec = record(&key);
        let token = rec.timer.token_for_tests();
        reg.insert(key.clone(), rec);

        assert_eq!(reg.cancel_timers(), 1);
        assert!(token.is_cancelled());
        assert!(reg.contains(&key));
    }
}
