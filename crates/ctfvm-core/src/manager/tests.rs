use std::{fs, sync::Arc, time::Duration};

use ctfvm_model::{ChallengeTag, WorkloadStatus};
use tempfile::TempDir;

use super::*;
use crate::{CoreError, MemoryRuntime, RuntimeError};

const TTL: Duration = Duration::from_secs(60);

struct Fixture {
    _root: TempDir,
    runtime: Arc<MemoryRuntime>,
    manager: LifecycleManager,
}

fn fixture() -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let web = root.path().join("challenges").join("web-x");
    fs::create_dir_all(&web).unwrap();
    fs::write(web.join("Dockerfile"), "FROM nginx:alpine\n").unwrap();
    fs::create_dir_all(root.path().join("challenges").join("fns-plain")).unwrap();

    let runtime = Arc::new(MemoryRuntime::new());
    let config = LifecycleConfig {
        ttl: TTL,
        challenges_root: root.path().to_path_buf(),
        ..Default::default()
    };
    let manager = LifecycleManager::new_default(runtime.clone(), config);
    Fixture {
        _root: root,
        runtime,
        manager,
    }
}

fn web() -> ChallengeTag {
    ChallengeTag::from("web-x")
}

#[tokio::test(start_paused = true)]
async fn start_provisions_workload() {
    let fx = fixture();
    let info = fx.manager.start(7, 3, &web()).await.unwrap();

    assert_eq!(info.name, "ctf-web-x-team-7");
    assert_eq!(info.hostname, "web-x-team-7.ctf.local");
    assert_eq!(info.status, WorkloadStatus::Active);
    assert_eq!(info.team_id, 7);
    assert_eq!(info.challenge_id, 3);

    assert_eq!(fx.runtime.image_of("ctf-web-x-team-7").as_deref(), Some("ctf/web-x"));
    assert_eq!(fx.runtime.network_of("ctf-web-x-team-7").as_deref(), Some("ctf-network"));
    let labels = fx.runtime.labels_of("ctf-web-x-team-7").unwrap();
    assert_eq!(
        labels["traefik.http.routers.ctf-web-x-team-7.rule"],
        "Host(`web-x-team-7.ctf.local`)"
    );
    assert_eq!(fx.manager.get(7, &web()), Some(info));
}

#[tokio::test(start_paused = true)]
async fn second_start_renews_same_workload() {
    let fx = fixture();
    let first = fx.manager.start(1, 3, &web()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let second = fx.manager.start(1, 3, &web()).await.unwrap();

    assert_eq!(first.runtime_id, second.runtime_id);
    assert!(second.expires_at >= first.expires_at);
    assert_eq!(fx.runtime.create_count(), 1);
    assert_eq!(fx.runtime.build_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_create_one_container() {
    let fx = fixture();
    fx.runtime.set_build_delay(Duration::from_millis(20));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = fx.manager.clone();
        handles.push(tokio::spawn(async move { manager.start(2, 3, &web()).await }));
    }

    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().unwrap().runtime_id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(fx.runtime.create_count(), 1);
    assert_eq!(fx.runtime.container_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn workload_expires_after_ttl() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();

    tokio::time::sleep(TTL - Duration::from_secs(1)).await;
    assert!(fx.manager.get(1, &web()).is_some());
    assert!(fx.runtime.contains_name("ctf-web-x-team-1"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(fx.manager.get(1, &web()).is_none());
    assert_eq!(fx.manager.status(1, &web()), None);
    assert!(!fx.runtime.contains_name("ctf-web-x-team-1"));
}

#[tokio::test(start_paused = true)]
async fn renew_before_fire_wins() {
    let fx = fixture();
    let first = fx.manager.start(1, 3, &web()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(50)).await;
    let renewed = fx.manager.renew(1, 3, &web()).await.unwrap();
    assert_eq!(renewed.runtime_id, first.runtime_id);
    assert!(renewed.expires_at >= first.expires_at);

    // Past the original deadline, before the renewed one.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert!(fx.manager.get(1, &web()).is_some());
    assert!(fx.runtime.contains_name("ctf-web-x-team-1"));

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(fx.manager.get(1, &web()).is_none());
    assert!(!fx.runtime.contains_name("ctf-web-x-team-1"));
}

#[tokio::test(start_paused = true)]
async fn renew_after_expiry_is_not_found() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    tokio::time::sleep(TTL + Duration::from_secs(1)).await;

    let err = fx.manager.renew(1, 3, &web()).await.unwrap_err();
    assert!(matches!(err, CoreError::WorkloadNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn stop_removes_workload() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();

    fx.manager.stop(1, 3, &web()).await.unwrap();
    assert!(fx.manager.get(1, &web()).is_none());
    assert_eq!(fx.runtime.container_count(), 0);

    let err = fx.manager.stop(1, 3, &web()).await.unwrap_err();
    assert!(matches!(err, CoreError::WorkloadNotFound(_)));
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_expiry() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    fx.manager.stop(1, 3, &web()).await.unwrap();

    // A new workload under the same key must not be hit by the old timer.
    tokio::time::sleep(Duration::from_secs(30)).await;
    fx.manager.start(1, 3, &web()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(fx.manager.get(1, &web()).is_some());
}

#[tokio::test(start_paused = true)]
async fn stop_teardown_failure_still_drops_record() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    fx.runtime.fail_teardown(true);

    let err = fx.manager.stop(1, 3, &web()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Runtime {
            source: RuntimeError::TeardownFailed(_),
            ..
        }
    ));
    assert!(fx.manager.get(1, &web()).is_none());
}

#[tokio::test(start_paused = true)]
async fn expiry_teardown_failure_is_swallowed() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    fx.runtime.fail_teardown(true);

    tokio::time::sleep(TTL + Duration::from_secs(1)).await;
    assert!(fx.manager.get(1, &web()).is_none());
    assert!(fx.runtime.contains_name("ctf-web-x-team-1"));
}

#[tokio::test(start_paused = true)]
async fn start_failure_rolls_back_leaked_container() {
    let fx = fixture();
    fx.runtime.fail_start(true);
    fx.runtime.leak_on_start_failure(true);

    let err = fx.manager.start(1, 3, &web()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Runtime {
            source: RuntimeError::StartFailed(_),
            ..
        }
    ));
    assert!(!fx.runtime.contains_name("ctf-web-x-team-1"));
    assert!(fx.manager.get(1, &web()).is_none());
    assert_eq!(fx.manager.status(1, &web()), None);
}

#[tokio::test(start_paused = true)]
async fn build_failure_leaves_nothing() {
    let fx = fixture();
    fx.runtime.fail_build(true);

    let err = fx.manager.start(1, 3, &web()).await.unwrap_err();
    assert!(matches!(
        err,
        CoreError::Runtime {
            source: RuntimeError::BuildFailed(_),
            ..
        }
    ));
    assert_eq!(fx.runtime.container_count(), 0);
    assert!(fx.manager.list().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_challenge_directory() {
    let fx = fixture();
    let err = fx
        .manager
        .start(1, 3, &ChallengeTag::from("web-nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ChallengeNotFound(_)));
    assert!(err.is_not_found());
}

#[tokio::test(start_paused = true)]
async fn missing_dockerfile_is_misconfiguration() {
    let fx = fixture();
    let err = fx
        .manager
        .start(1, 3, &ChallengeTag::from("fns-plain"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::ChallengeMisconfigured(_)));
    assert_eq!(fx.runtime.build_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn start_adopts_running_orphan() {
    let fx = fixture();
    let orphan = fx.runtime.insert_orphan("ctf-web-x-team-4", true);

    let info = fx.manager.start(4, 3, &web()).await.unwrap();
    assert_eq!(info.runtime_id, orphan);
    assert_eq!(fx.runtime.build_count(), 0);
    assert_eq!(fx.runtime.container_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn start_replaces_stopped_orphan() {
    let fx = fixture();
    let orphan = fx.runtime.insert_orphan("ctf-web-x-team-4", false);

    let info = fx.manager.start(4, 3, &web()).await.unwrap();
    assert_ne!(info.runtime_id, orphan);
    assert_eq!(fx.runtime.create_count(), 1);
    assert_eq!(fx.runtime.container_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn status_reports_provisioning_during_build() {
    let fx = fixture();
    fx.runtime.set_build_delay(Duration::from_secs(10));

    let manager = fx.manager.clone();
    let pending = tokio::spawn(async move { manager.start(1, 3, &web()).await });

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fx.manager.status(1, &web()), Some(WorkloadStatus::Provisioning));
    assert!(fx.manager.get(1, &web()).is_none());

    pending.await.unwrap().unwrap();
    assert_eq!(fx.manager.status(1, &web()), Some(WorkloadStatus::Active));
}

#[tokio::test(start_paused = true)]
async fn slow_build_does_not_block_other_keys() {
    let fx = fixture();
    fx.runtime.set_build_delay(Duration::from_secs(30));

    let started = tokio::time::Instant::now();
    let a = {
        let manager = fx.manager.clone();
        tokio::spawn(async move { manager.start(1, 3, &web()).await })
    };
    let b = {
        let manager = fx.manager.clone();
        tokio::spawn(async move { manager.start(2, 3, &web()).await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert!(started.elapsed() < Duration::from_secs(45));
    assert_eq!(fx.manager.list().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn shutdown_disarms_timers() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    fx.manager.shutdown();

    tokio::time::sleep(TTL * 2).await;
    assert!(fx.manager.get(1, &web()).is_some());
    assert!(fx.runtime.contains_name("ctf-web-x-team-1"));
}

#[tokio::test(start_paused = true)]
async fn dropped_start_still_registers_and_expires() {
    let fx = fixture();
    fx.runtime.set_start_delay(Duration::from_secs(2));

    let res = tokio::time::timeout(Duration::from_secs(1), fx.manager.start(1, 3, &web())).await;
    assert!(res.is_err());
    assert!(fx.runtime.contains_name("ctf-web-x-team-1"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(fx.manager.get(1, &web()).is_some());

    tokio::time::sleep(TTL * 10).await;
    assert!(fx.manager.get(1, &web()).is_none());
    assert_eq!(fx.runtime.container_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn dropped_stop_still_tears_down() {
    let fx = fixture();
    fx.manager.start(1, 3, &web()).await.unwrap();
    fx.runtime.set_teardown_delay(Duration::from_secs(2));

    let res = tokio::time::timeout(Duration::from_secs(1), fx.manager.stop(1, 3, &web())).await;
    assert!(res.is_err());
    assert!(fx.manager.get(1, &web()).is_none());

    tokio::time::sleep(TTL * 10).await;
    assert_eq!(fx.runtime.container_count(), 0);
}
