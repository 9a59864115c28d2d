// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::{cycle, TestLab};
use std::time::Duration;

fn request(dir: &str) -> LaunchRequest {
    LaunchRequest {
        command: vec!["autoserv".into()],
        working_directory: dir.to_string(),
        pidfile_name: ".autoserv_execute".to_string(),
        log_file: None,
        num_processes: 1,
        paired_with: None,
    }
}

#[tokio::test]
async fn running_then_exited() {
    let lab = TestLab::new();
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("1-me/host1"));
    assert_eq!(monitor.exit_code(&mut ctx), None);

    cycle(&mut ctx).await;
    assert_eq!(monitor.exit_code(&mut ctx), None);
    assert_eq!(monitor.process(), Some(&Process::new("drone1", 100)));

    lab.drone.finish(monitor.pidfile_id().unwrap().path(), 0, 2);
    cycle(&mut ctx).await;
    assert_eq!(monitor.exit_code(&mut ctx), Some(0));
    assert_eq!(monitor.num_tests_failed(), Some(2));
    assert!(!monitor.lost_process());
    assert!(ctx.email.queued().is_empty());
}

#[tokio::test]
async fn missing_pidfile_times_out() {
    let lab = TestLab::new();
    lab.drone.set_auto_start(false);
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("tmp"));
    cycle(&mut ctx).await;

    lab.clock.advance(Duration::from_secs(299));
    assert_eq!(monitor.exit_code(&mut ctx), None);

    lab.clock.advance(Duration::from_secs(2));
    assert_eq!(monitor.exit_code(&mut ctx), Some(1));
    assert_eq!(monitor.num_tests_failed(), Some(0));
    assert!(monitor.lost_process());
    assert_eq!(monitor.process(), Some(&Process::new("results", 0)));
    assert_eq!(ctx.email.queued().len(), 1);
    assert!(ctx.email.queued()[0].contains("Process has failed to write pidfile"));

    // Reported once.
    assert_eq!(monitor.exit_code(&mut ctx), Some(1));
    assert_eq!(ctx.email.queued().len(), 1);
}

#[tokio::test]
async fn process_dying_without_exit_status_is_lost() {
    let lab = TestLab::new();
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("a"));
    cycle(&mut ctx).await;
    lab.drone.lose(monitor.pidfile_id().unwrap().path());
    ctx.drones.refresh().await;

    assert_eq!(monitor.exit_code(&mut ctx), Some(1));
    assert!(monitor.lost_process());
    assert_eq!(monitor.process(), Some(&Process::new("drone1", 100)));
    assert_eq!(ctx.email.queued().len(), 1);
}

#[tokio::test]
async fn exit_between_reads_is_not_lost() {
    let lab = TestLab::new();
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("a"));
    cycle(&mut ctx).await;
    let path = monitor.pidfile_id().unwrap().path().to_path_buf();
    lab.drone.lose(&path);
    lab.drone.set_second_read(&path, "100\n0\n0\n");
    ctx.drones.refresh().await;

    assert_eq!(monitor.exit_code(&mut ctx), Some(0));
    assert!(!monitor.lost_process());
    assert!(ctx.email.queued().is_empty());
}

#[tokio::test]
async fn corrupt_pidfile_is_lost_with_notification() {
    let lab = TestLab::new();
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("a"));
    cycle(&mut ctx).await;
    lab.drone.set_pidfile(monitor.pidfile_id().unwrap().path(), "100\nnope\n0\n");
    ctx.drones.refresh().await;

    assert_eq!(monitor.exit_code(&mut ctx), Some(1));
    assert!(ctx.email.queued()[0].contains("Pidfile error"));
}

#[tokio::test]
async fn attach_reads_existing_pidfile() {
    let lab = TestLab::new();
    lab.drone.set_pidfile("/drone/1-me/host1/.autoserv_execute", "55\n1\n3\n");
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.attach_to_existing_process(&mut ctx, "1-me/host1", ".autoserv_execute", 1);
    ctx.drones.refresh().await;
    assert_eq!(monitor.exit_code(&mut ctx), Some(1));
    assert_eq!(monitor.num_tests_failed(), Some(3));
    assert!(!monitor.lost_process());
}

#[tokio::test]
async fn kill_and_release() {
    let lab = TestLab::new();
    let mut ctx = lab.context();
    let mut monitor = PidfileRunMonitor::new();
    monitor.run(&mut ctx, request("a"));
    cycle(&mut ctx).await;
    monitor.exit_code(&mut ctx);
    monitor.kill(&mut ctx);
    let id = monitor.pidfile_id().cloned().unwrap();
    monitor.release(&mut ctx);
    ctx.drones.execute_actions().await;

    assert!(lab.drone.live_pids().is_empty());
    assert!(!ctx.drones.is_registered(&id));
}
