//! Subreaper scopes change process-wide state and `wait(-1)` collects every
//! child of the test binary, so all tests here run under one lock.

use std::path::Path;
use std::process::Command;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::wait::wait;
use nix::unistd::Pid;
use supervise::{DrainEnd, SubreaperGuard, is_subreaper};

static TEST_MUTEX: Mutex<()> = Mutex::new(());

fn read_pid(path: &Path) -> Pid {
    let raw = std::fs::read_to_string(path).unwrap();
    Pid::from_raw(raw.trim().parse().unwrap())
}

#[test]
fn orphaned_grandchild_is_reaped_before_exit_returns() {
    let _guard = TEST_MUTEX.lock().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("grandchild.pid");

    let scope = SubreaperGuard::enter().unwrap();
    let start = Instant::now();
    let child = Command::new("sh")
        .args(["-c", "sleep 2 & echo $! > \"$1\"", "sh"])
        .arg(&pid_file)
        .spawn()
        .unwrap();
    let child_pid = Pid::from_raw(i32::try_from(child.id()).unwrap());
    drop(child);

    let report = scope.exit();

    let grandchild = read_pid(&pid_file);
    assert_eq!(report.end, DrainEnd::NoChildren);
    assert!(report.contains(child_pid), "report: {report:?}");
    assert!(report.contains(grandchild), "report: {report:?}");
    assert!(start.elapsed() >= Duration::from_millis(1500));
    assert!(!Path::new(&format!("/proc/{grandchild}")).exists());
    assert!(!Path::new(&format!("/proc/{child_pid}")).exists());
}

#[test]
fn entering_twice_leaves_flag_unset() {
    let _guard = TEST_MUTEX.lock().unwrap();
    assert!(!is_subreaper().unwrap());

    for _ in 0..2 {
        let scope = SubreaperGuard::enter().unwrap();
        assert!(is_subreaper().unwrap());
        scope.exit();
    }

    assert!(!is_subreaper().unwrap());
}

#[test]
fn drain_without_children_ends_cleanly() {
    let _guard = TEST_MUTEX.lock().unwrap();
    let report = SubreaperGuard::enter().unwrap().exit();
    assert!(report.reaped.is_empty());
    assert_eq!(report.end, DrainEnd::NoChildren);
}

#[test]
fn dropping_the_guard_still_drains() {
    let _guard = TEST_MUTEX.lock().unwrap();
    {
        let _scope = SubreaperGuard::enter().unwrap();
        Command::new("true").spawn().unwrap();
    }
    assert_eq!(wait().unwrap_err(), Errno::ECHILD);
    assert!(!is_subreaper().unwrap());
}
