//! Lifecycle tests against real monitor processes.
//!
//! `sleep` stands in for the monitor so that process-group signalling can be
//! observed on a live group.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::{Duration, Instant};

use corral_common::error::CorralError;
use corral_common::types::{ContainerId, Status};
use corral_runtime::{Container, ExecShimLauncher, ShimHandle, ShimLauncher, ShimRequest, load_all};
use nix::sys::signal::Signal;

#[derive(Debug)]
struct SleepLauncher;

impl ShimLauncher for SleepLauncher {
    fn launch(&self, request: &ShimRequest<'_>) -> corral_common::error::Result<ShimHandle> {
        let child = Command::new("sleep")
            .arg("30")
            .current_dir(request.bundle)
            .process_group(0)
            .spawn()
            .map_err(|e| CorralError::Spawn {
                binary: "sleep".into(),
                source: e,
            })?;
        Ok(ShimHandle::from_child(child))
    }
}

fn id(s: &str) -> ContainerId {
    ContainerId::parse(s).unwrap()
}

fn write_bundle(dir: &Path) {
    std::fs::write(
        dir.join("config.json"),
        r#"{"ociVersion": "1.0.2", "process": {"args": ["/bin/server", "--port", "80"]}}"#,
    )
    .unwrap();
}

#[test]
fn pause_resume_round_trip_keeps_processes() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let c = Container::new_with_launcher(root.path(), id("pr"), bundle.path(), Arc::new(SleepLauncher))
        .unwrap();
    let _init = c.start().unwrap();

    c.pause().unwrap();
    assert_eq!(c.state().status, Status::Paused);
    assert!(matches!(
        c.pause(),
        Err(CorralError::InvalidState { status: Status::Paused, .. })
    ));

    c.resume().unwrap();
    assert_eq!(c.state().status, Status::Running);
    assert!(matches!(
        c.resume(),
        Err(CorralError::InvalidState { status: Status::Running, .. })
    ));

    let processes = c.processes();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0].name(), "init");

    c.delete().unwrap();
    assert!(c.processes().is_empty());
    assert!(!root.path().join("pr").exists());
}

#[test]
fn delete_tears_down_a_paused_container() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let c = Container::new_with_launcher(root.path(), id("frozen"), bundle.path(), Arc::new(SleepLauncher))
        .unwrap();
    let _init = c.start().unwrap();
    c.pause().unwrap();

    c.delete().unwrap();
    assert_eq!(c.state().status, Status::Deleted);
    assert_eq!(c.state().shim_pid, None);
}

#[test]
fn init_process_signals_through_the_shim_group() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let c = Container::new_with_launcher(root.path(), id("sig"), bundle.path(), Arc::new(SleepLauncher))
        .unwrap();
    let init = c.start().unwrap();

    init.signal(Signal::SIGCONT).unwrap();
    c.delete().unwrap();
}

#[test]
fn load_reconstructs_started_container() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let launcher: Arc<dyn ShimLauncher> = Arc::new(ExecShimLauncher::new("true"));
    let original = Container::new_with_launcher(root.path(), id("persist"), bundle.path(), Arc::clone(&launcher))
        .unwrap();
    let _init = original.start().unwrap();

    let loaded = Container::load_with_launcher(root.path(), id("persist"), Arc::clone(&launcher)).unwrap();
    assert_eq!(loaded.path(), bundle.path());
    assert_eq!(loaded.state().status, Status::Running);
    assert_eq!(loaded.state().shim_pid, original.state().shim_pid);
    assert_eq!(loaded.processes().len(), 1);
    assert!(matches!(loaded.pause(), Err(CorralError::NotSupported { .. })));
    assert!(matches!(
        loaded.processes()[0].signal(Signal::SIGTERM),
        Err(CorralError::NotSupported { .. })
    ));

    std::fs::write(root.path().join("persist/proc/exit"), "").unwrap();
    let stopped = Container::load_with_launcher(root.path(), id("persist"), launcher).unwrap();
    assert_eq!(stopped.state().status, Status::Stopped);

    original.delete().unwrap();
}

/// Whether `pid` names a process that has not yet terminated.
fn is_alive(pid: u32) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat")).is_ok_and(|stat| {
        stat.rsplit(')')
            .next()
            .is_some_and(|rest| !rest.trim_start().starts_with(['Z', 'X']))
    })
}

fn wait_until_dead(pid: u32) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if !is_alive(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    false
}

#[test]
fn delete_of_loaded_container_kills_recorded_shim() {
    let root = tempfile::tempdir().unwrap();
    let bundle = tempfile::tempdir().unwrap();
    write_bundle(bundle.path());
    let launcher: Arc<dyn ShimLauncher> = Arc::new(SleepLauncher);
    let first = Container::new_with_launcher(root.path(), id("handoff"), bundle.path(), Arc::clone(&launcher))
        .unwrap();
    let _init = first.start().unwrap();
    let pid = first.state().shim_pid.unwrap();
    assert!(is_alive(pid));

    let loaded = Container::load_with_launcher(root.path(), id("handoff"), launcher).unwrap();
    assert_eq!(loaded.state().shim_pid, Some(pid));
    loaded.delete().unwrap();

    assert!(!root.path().join("handoff").exists());
    assert!(wait_until_dead(pid));
    first.delete().unwrap();
}

#[test]
fn load_of_unknown_container_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let err = Container::load(root.path(), id("ghost")).unwrap_err();
    assert!(matches!(err, CorralError::NotFound { .. }));
}

#[test]
fn load_of_created_container_is_created() {
    let root = tempfile::tempdir().unwrap();
    let _c = Container::new(root.path(), id("fresh"), "/bundles/fresh").unwrap();
    let loaded = Container::load(root.path(), id("fresh")).unwrap();
    assert_eq!(loaded.state().status, Status::Created);
    assert!(loaded.processes().is_empty());
}

#[test]
fn load_all_enumerates_in_id_order_and_skips_junk() {
    let root = tempfile::tempdir().unwrap();
    for name in ["charlie", "alpha", "bravo"] {
        let _c = Container::new(root.path(), id(name), format!("/bundles/{name}")).unwrap();
    }
    std::fs::create_dir(root.path().join("no-state")).unwrap();
    std::fs::write(root.path().join("stray-file"), "x").unwrap();

    let launcher: Arc<dyn ShimLauncher> = Arc::new(ExecShimLauncher::default());
    let ids: Vec<String> = load_all(root.path(), &launcher)
        .unwrap()
        .iter()
        .map(|c| c.id().to_string())
        .collect();
    assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
}

#[test]
fn load_all_on_missing_root_is_empty() {
    let root = tempfile::tempdir().unwrap();
    let launcher: Arc<dyn ShimLauncher> = Arc::new(ExecShimLauncher::default());
    assert!(load_all(&root.path().join("absent"), &launcher).unwrap().is_empty());
}
