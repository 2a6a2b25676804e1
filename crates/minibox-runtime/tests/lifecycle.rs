//! Container lifecycle operations against on-disk records.
//!
//! These run without privileges: records point at ordinary host processes
//! instead of containers.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::io::{BufRead, BufReader};
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use minibox_common::config::RuntimeConfig;
use minibox_common::error::MiniboxError;
use minibox_common::types::ContainerStatus;
use minibox_runtime::container::{ContainerConfig, ContainerInfo};
use minibox_runtime::engine::Engine;
use nix::sys::signal::Signal;

fn engine(dir: &tempfile::TempDir) -> Engine {
    Engine::new(RuntimeConfig::new(dir.path().join("state"), dir.path().join("data")))
}

fn record(engine: &Engine, name: &str, pid: i32) -> ContainerInfo {
    let mut cfg = ContainerConfig::new("busybox", vec!["sleep".into(), "30".into()]);
    cfg.name = name.into();
    let info = ContainerInfo::running(&cfg, pid);
    engine.records().save(&info).expect("save record");
    info
}

fn sleeper() -> Child {
    Command::new("sleep").arg("30").spawn().expect("spawn sleep")
}

fn pid_of(child: &Child) -> i32 {
    i32::try_from(child.id()).unwrap()
}

#[test]
fn stop_terminates_process_and_marks_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut child = sleeper();
    let _ = record(&engine, "web", pid_of(&child));

    let info = engine.stop("web").unwrap();
    assert_eq!(info.status, ContainerStatus::Stopped);
    assert_eq!(info.pid, None);
    assert_eq!(child.wait().unwrap().signal(), Some(Signal::SIGTERM as i32));

    let stored = engine.records().load("web").unwrap();
    assert_eq!(stored.status, ContainerStatus::Stopped);
}

#[test]
fn stop_kills_init_that_ignores_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir).with_stop_timeout(Duration::from_millis(300));
    let mut child = Command::new("sh")
        .args(["-c", "trap '' TERM; echo ready; sleep 5"])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let mut ready = String::new();
    let _ = BufReader::new(child.stdout.take().unwrap()).read_line(&mut ready).unwrap();
    assert_eq!(ready.trim(), "ready");
    let _ = record(&engine, "web", pid_of(&child));

    let info = engine.stop("web").unwrap();
    assert_eq!(info.status, ContainerStatus::Stopped);
    assert_eq!(info.pid, None);
    assert_eq!(child.wait().unwrap().signal(), Some(Signal::SIGKILL as i32));
}

#[test]
fn stop_of_stopped_container_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut info = record(&engine, "web", i32::MAX);
    info.status = ContainerStatus::Stopped;
    info.pid = None;
    engine.records().save(&info).unwrap();

    assert!(matches!(engine.stop("web"), Err(MiniboxError::Config { .. })));
}

#[test]
fn list_marks_dead_containers_exited() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut child = sleeper();
    let _ = record(&engine, "alive", pid_of(&child));
    let _ = record(&engine, "dead", i32::MAX);

    let listed = engine.list().unwrap();
    let status = |name: &str| listed.iter().find(|i| i.name == name).unwrap().status;
    assert_eq!(status("alive"), ContainerStatus::Running);
    assert_eq!(status("dead"), ContainerStatus::Exited);
    assert_eq!(engine.records().load("dead").unwrap().pid, None);

    child.kill().unwrap();
    let _ = child.wait();
}

#[test]
fn remove_refuses_running_container() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut child = sleeper();
    let _ = record(&engine, "web", pid_of(&child));

    assert!(matches!(engine.remove("web"), Err(MiniboxError::Config { .. })));
    assert!(engine.records().load("web").is_ok());

    child.kill().unwrap();
    let _ = child.wait();
}

#[test]
fn remove_refuses_stopped_record_with_live_process() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut child = sleeper();
    let mut info = record(&engine, "web", pid_of(&child));
    info.status = ContainerStatus::Stopped;
    engine.records().save(&info).unwrap();

    assert!(matches!(engine.remove("web"), Err(MiniboxError::Config { .. })));
    assert!(engine.records().load("web").is_ok());

    child.kill().unwrap();
    let _ = child.wait();
}

#[test]
fn remove_deletes_record_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let _ = record(&engine, "old", i32::MAX);
    std::fs::write(engine.records().log_path("old"), "bye").unwrap();

    engine.remove("old").unwrap();
    assert!(matches!(
        engine.records().load("old"),
        Err(MiniboxError::NotFound { kind: "container", .. })
    ));
    assert!(!engine.records().log_path("old").exists());
}

#[test]
fn logs_are_read_from_container_dir() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let _ = record(&engine, "web", i32::MAX);
    std::fs::write(engine.records().log_path("web"), "hello\n").unwrap();

    assert_eq!(engine.logs("web").unwrap(), "hello\n");
    assert!(matches!(engine.logs("ghost"), Err(MiniboxError::NotFound { .. })));
}

#[test]
fn run_rejects_taken_name_before_launching() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let _ = record(&engine, "web", i32::MAX);

    let mut cfg = ContainerConfig::new("busybox", vec!["top".into()]);
    cfg.name = "web".into();
    let err = engine.run(&cfg).unwrap_err();
    assert!(err.to_string().contains("already in use"));
}

#[test]
fn failed_launch_leaves_nothing_behind() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let mut cfg = ContainerConfig::new("noimage", vec!["top".into()]);
    cfg.name = "web".into();

    assert!(engine.run(&cfg).is_err());
    assert!(!dir.path().join("state/containers/web").exists());
    assert!(!dir.path().join("data/overlay/web").exists());
    assert!(engine.list().unwrap().is_empty());
    assert!(matches!(
        engine.remove("web"),
        Err(MiniboxError::NotFound { kind: "container", .. })
    ));
}

#[test]
fn exec_into_stopped_container_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine(&dir);
    let _ = record(&engine, "web", i32::MAX);
    assert!(engine.exec("web", &["ls".into()]).is_err());
}
