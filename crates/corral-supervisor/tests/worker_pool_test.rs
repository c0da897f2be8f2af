//! Worker pool and supervisor behaviour with real (short-lived) monitors.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use corral_common::config::SupervisorConfig;
use corral_common::error::{CorralError, Result};
use corral_common::types::{ContainerId, Status};
use corral_runtime::{Container, ExecShimLauncher, ShimHandle, ShimLauncher, ShimRequest, Stdio};
use corral_supervisor::{
    Event, EventSink, EventType, MetricsSink, StartLatency, StartTask, Supervisor, WorkerPool,
};
use crossbeam_channel::Receiver;

const RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
struct PanickingLauncher;

impl ShimLauncher for PanickingLauncher {
    fn launch(&self, _request: &ShimRequest<'_>) -> Result<ShimHandle> {
        panic!("launcher exploded");
    }
}

/// Launches `true` after a pause, so that concurrent starts overlap.
#[derive(Debug)]
struct SlowLauncher;

impl ShimLauncher for SlowLauncher {
    fn launch(&self, request: &ShimRequest<'_>) -> Result<ShimHandle> {
        std::thread::sleep(Duration::from_millis(100));
        ExecShimLauncher::new("true").launch(request)
    }
}

fn id(s: &str) -> ContainerId {
    ContainerId::parse(s).unwrap()
}

fn write_bundle(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"process": {"args": ["/bin/worker"]}}"#,
    )
    .unwrap();
}

fn true_launcher() -> Arc<dyn ShimLauncher> {
    Arc::new(ExecShimLauncher::new("true"))
}

struct Harness {
    pool: WorkerPool,
    events: Receiver<Event>,
    latency: Arc<StartLatency>,
}

fn harness(workers: usize) -> Harness {
    let (tx, events) = crossbeam_channel::unbounded();
    let sink: Arc<dyn EventSink> = Arc::new(tx);
    let latency = Arc::new(StartLatency::default());
    let metrics: Arc<dyn MetricsSink> = latency.clone();
    let pool = WorkerPool::spawn(workers, &sink, &metrics).unwrap();
    Harness {
        pool,
        events,
        latency,
    }
}

#[test]
fn many_tasks_on_few_workers_all_resolve_once() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(3);

    let mut handles = Vec::new();
    let mut containers = Vec::new();
    for n in 0..12 {
        let c = Container::new_with_launcher(
            root.path(),
            id(&format!("c{n}")),
            bundle.path(),
            true_launcher(),
        )
        .unwrap();
        let (task, handle) = StartTask::new(c.clone());
        h.pool.submit(task).unwrap();
        handles.push(handle);
        containers.push(c);
    }

    for handle in handles {
        let response = handle
            .wait_timeout(RESOLVE_TIMEOUT)
            .expect("task resolved")
            .unwrap();
        assert!(response.stdin.ends_with("proc/stdin"));
        assert!(response.stdout.ends_with("proc/stdout"));
        assert!(response.stderr.ends_with("proc/stderr"));
    }
    for c in &containers {
        assert_eq!(c.state().status, Status::Running);
        assert_eq!(c.processes().len(), 1);
    }
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.latency.snapshot().count, 12);

    h.pool.shutdown();
    for c in &containers {
        c.delete().unwrap();
    }
}

#[test]
fn requested_stdio_is_reported() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(1);
    let c = Container::new_with_launcher(root.path(), id("io"), bundle.path(), true_launcher()).unwrap();

    let stdio = Stdio {
        stdin: Some("/run/io/in".into()),
        stdout: Some("/run/io/out".into()),
        stderr: Some("/run/io/err".into()),
    };
    let (task, handle) = StartTask::new(c.clone());
    h.pool.submit(task.with_stdio(stdio)).unwrap();

    let response = handle.wait().unwrap();
    assert_eq!(response.stdin, "/run/io/in");
    assert_eq!(response.stdout, "/run/io/out");
    assert_eq!(response.stderr, "/run/io/err");
    c.delete().unwrap();
}

#[test]
fn failed_start_emits_exactly_one_delete_event() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(2);
    let missing: Arc<dyn ShimLauncher> = Arc::new(ExecShimLauncher::new("/nonexistent/corral-shim"));
    let c = Container::new_with_launcher(root.path(), id("broken"), bundle.path(), missing).unwrap();

    let (task, handle) = StartTask::new(c.clone());
    h.pool.submit(task).unwrap();

    let err = handle.wait().unwrap_err();
    assert!(matches!(err, CorralError::Spawn { .. }));
    let event = h.events.recv_timeout(RESOLVE_TIMEOUT).unwrap();
    assert_eq!(event.kind, EventType::Delete);
    assert_eq!(event.id, id("broken"));
    assert!(h.events.try_recv().is_err());
    assert!(c.processes().is_empty());
}

#[test]
fn concurrent_starts_of_one_container_resolve_once() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(2);
    let c = Container::new_with_launcher(root.path(), id("racy"), bundle.path(), Arc::new(SlowLauncher)).unwrap();

    let (first, first_handle) = StartTask::new(c.clone());
    let (second, second_handle) = StartTask::new(c.clone());
    h.pool.submit(first).unwrap();
    h.pool.submit(second).unwrap();

    let results = [first_handle.wait(), second_handle.wait()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|r| matches!(r, Err(CorralError::InvalidState { .. })))
            .count(),
        1
    );
    let processes = c.processes();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].name(), "init");
    assert_eq!(c.state().status, Status::Running);

    assert_eq!(h.events.recv_timeout(RESOLVE_TIMEOUT).unwrap().id, id("racy"));
    assert!(h.events.try_recv().is_err());

    h.pool.shutdown();
    c.delete().unwrap();
}

#[test]
fn restore_resolves_as_not_supported() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(1);
    let c = Container::new(root.path(), id("ckpt"), "/bundles/ckpt").unwrap();

    let (task, handle) = StartTask::restore(c.clone(), "snap-1");
    h.pool.submit(task).unwrap();

    assert!(matches!(handle.wait(), Err(CorralError::NotSupported { .. })));
    assert_eq!(h.events.recv_timeout(RESOLVE_TIMEOUT).unwrap().id, id("ckpt"));
    assert_eq!(c.state().status, Status::Created);
}

#[test]
fn worker_survives_a_panicking_start() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(1);

    let doomed = Container::new_with_launcher(
        root.path(),
        id("doomed"),
        bundle.path(),
        Arc::new(PanickingLauncher),
    )
    .unwrap();
    let fine = Container::new_with_launcher(root.path(), id("fine"), bundle.path(), true_launcher()).unwrap();

    let (first, first_handle) = StartTask::new(doomed);
    let (second, second_handle) = StartTask::new(fine.clone());
    h.pool.submit(first).unwrap();
    h.pool.submit(second).unwrap();

    let err = first_handle.wait().unwrap_err();
    assert!(matches!(err, CorralError::WorkerPanicked { ref message, .. } if message == "launcher exploded"));
    assert!(second_handle.wait().is_ok());
    assert_eq!(h.events.recv_timeout(RESOLVE_TIMEOUT).unwrap().id, id("doomed"));
    assert_eq!(h.pool.active_workers(), 1);

    h.pool.shutdown();
    fine.delete().unwrap();
}

#[test]
fn expired_task_is_not_started() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(1);
    let c = Container::new_with_launcher(root.path(), id("late"), bundle.path(), true_launcher()).unwrap();

    let (task, handle) = StartTask::new(c.clone());
    h.pool.submit(task.with_deadline(Instant::now())).unwrap();

    assert!(matches!(handle.wait(), Err(CorralError::DeadlineExceeded { .. })));
    assert_eq!(c.state().status, Status::Created);
    assert!(!root.path().join("late/proc").exists());
    assert_eq!(h.events.recv_timeout(RESOLVE_TIMEOUT).unwrap().id, id("late"));
}

#[test]
fn shutdown_drains_queue_before_workers_exit() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let h = harness(2);

    let mut handles = Vec::new();
    let mut containers = Vec::new();
    for n in 0..6 {
        let c = Container::new_with_launcher(root.path(), id(&format!("d{n}")), bundle.path(), true_launcher())
            .unwrap();
        let (task, handle) = StartTask::new(c.clone());
        h.pool.submit(task).unwrap();
        handles.push(handle);
        containers.push(c);
    }
    h.pool.shutdown();

    for handle in handles {
        assert!(handle.wait_timeout(Duration::ZERO).expect("resolved before shutdown returned").is_ok());
    }
    for c in &containers {
        c.delete().unwrap();
    }
}

fn supervisor(root: &Path, launcher: Arc<dyn ShimLauncher>) -> Supervisor {
    let config = SupervisorConfig {
        root: root.to_path_buf(),
        shim_binary: "true".into(),
        workers: 2,
    };
    Supervisor::with_launcher(config, launcher).unwrap()
}

#[test]
fn supervisor_reconciles_failed_start() {
    let root = tempfile::tempdir().unwrap();
    let empty_bundle = tempfile::tempdir().unwrap();
    let sup = supervisor(root.path(), true_launcher());
    assert_eq!(sup.active_workers(), 2);

    let _c = sup.create(id("noconfig"), empty_bundle.path()).unwrap();
    let err = sup.start(&id("noconfig"), Stdio::default()).unwrap().wait().unwrap_err();
    assert!(matches!(err, CorralError::Config { .. }));

    let event = sup.events().recv_timeout(RESOLVE_TIMEOUT).unwrap();
    sup.reconcile(&event).unwrap();
    assert!(!root.path().join("noconfig").exists());
    assert!(matches!(sup.get(&id("noconfig")), Err(CorralError::NotFound { .. })));
    assert_eq!(sup.start_latency().count, 1);

    sup.shutdown();
}

#[test]
fn supervisor_adopts_existing_containers() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let _pre = Container::new(root.path(), id("old"), bundle.path()).unwrap();

    let sup = supervisor(root.path(), true_launcher());
    let listed: Vec<String> = sup.list().iter().map(|c| c.id().to_string()).collect();
    assert_eq!(listed, vec!["old"]);

    let response = sup.start(&id("old"), Stdio::default()).unwrap().wait().unwrap();
    assert!(response.stdout.ends_with("proc/stdout"));
    assert_eq!(sup.reconcile_pending().unwrap(), 0);

    sup.delete(&id("old")).unwrap();
    assert!(sup.list().is_empty());
    sup.shutdown();
}

#[test]
fn supervisor_rejects_unknown_and_duplicate_ids() {
    let root = tempfile::tempdir().unwrap();
    let sup = supervisor(root.path(), true_launcher());

    assert!(matches!(
        sup.start(&id("nobody"), Stdio::default()),
        Err(CorralError::NotFound { .. })
    ));
    let _c = sup.create(id("twin"), "/bundles/twin").unwrap();
    assert!(matches!(
        sup.create(id("twin"), "/bundles/other"),
        Err(CorralError::Io { .. })
    ));
    sup.shutdown();
}

#[test]
fn supervisor_rejects_zero_workers() {
    let root = tempfile::tempdir().unwrap();
    let config = SupervisorConfig {
        root: root.path().to_path_buf(),
        shim_binary: "true".into(),
        workers: 0,
    };
    assert!(matches!(
        Supervisor::with_launcher(config, true_launcher()),
        Err(CorralError::Config { .. })
    ));
}
