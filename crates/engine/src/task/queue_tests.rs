// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::HostTaskKind;
use crate::test_helpers::{cycle, TestLab};
use similar_asserts::assert_eq;
use std::time::Duration;
use tb_adapters::DroneCall;
use tb_core::{FakeClock, JobId};

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|a| a.to_string()).collect()
}

/// Job 5 with one Starting entry per host, all in `subdir`.
fn lab_with_group(hosts: &[(u64, &str)], subdir: &str, job: Job) -> (TestLab, Vec<HostQueueEntry>) {
    let lab = TestLab::new();
    lab.add_job(job);
    let mut group = Vec::new();
    for (i, &(id, name)) in hosts.iter().enumerate() {
        lab.add_host(id, name);
        let entry_id = i as u64 + 1;
        lab.add_entry(entry_id, 5, id);
        lab.set_entry(entry_id, |e| {
            e.execution_subdir = subdir.to_string();
            e.apply_status(QueueEntryStatus::Starting);
        });
        group.push(lab.entry(entry_id));
    }
    (lab, group)
}

fn job() -> Job {
    Job::builder().id(JobId::new(5)).build()
}

#[test]
fn command_for_synchronous_client_job() {
    let job = Job::builder().id(JobId::new(5)).synch_count(2).control_type(ControlType::Client).build();
    let (lab, group) = lab_with_group(&[(1, "host1"), (2, "host2")], "group0", job.clone());
    let ctx = lab.context();
    let task = AgentTask::queue(&ctx, &job, &group).unwrap();
    let task = task.as_queue_task().unwrap();
    assert_eq!(task.execution_tag(), "5-my_user/group0");
    assert_eq!(
        task.command(),
        strings(&[
            "autoserv",
            "-P",
            "5-my_user/group0",
            "-n",
            "-r",
            WORKING_DIRECTORY,
            "-u",
            "my_user",
            "-l",
            "test_job",
            "-m",
            "host1,host2",
            "-c",
            "control",
        ])
    );
}

#[test]
fn group_without_subdir_is_rejected() {
    let (lab, group) = lab_with_group(&[(1, "host1")], "", job());
    let ctx = lab.context();
    let err = AgentTask::queue(&ctx, &job(), &group).unwrap_err();
    assert!(matches!(err, DispatchError::NoExecutionGroup { .. }));
}

#[tokio::test]
async fn start_marks_running_and_launches() {
    let job = Job::builder().id(JobId::new(5)).synch_count(2).build();
    let (lab, group) = lab_with_group(&[(1, "host1"), (2, "host2")], "group0", job.clone());
    let mut ctx = lab.context();
    let mut task = AgentTask::queue(&ctx, &job, &group).unwrap();
    task.poll(&mut ctx).unwrap();

    for id in [1, 2] {
        assert_eq!(lab.entry_status(id), QueueEntryStatus::Running);
        let host = lab.host(id);
        assert_eq!(host.status, HostStatus::Running);
        assert!(host.dirty);
    }
    assert_eq!(ctx.drones.active_processes("drone1"), Some(2));

    cycle(&mut ctx).await;
    let (command, pidfile) = lab.launched().remove(0);
    assert_eq!(command[5], "/drone/5-my_user/group0");
    assert_eq!(pidfile, std::path::PathBuf::from("/drone/5-my_user/group0/.autoserv_execute"));
    assert_eq!(
        lab.results.calls(),
        vec![DroneCall::WriteToFile {
            path: "/results/5-my_user/group0/keyval".into(),
            contents: "job_queued=1000000\n".into(),
        }]
    );
}

/// Run the payload of a one-host job to exit and return what its epilog
/// left behind.
async fn finish_payload(
    reboot_after: RebootAfter,
    exit_status: i32,
    failed_tests: u32,
) -> (TestLab, SchedulerContext<FakeClock>, AgentTask) {
    let job = Job::builder().id(JobId::new(5)).reboot_after(reboot_after).build();
    let (lab, group) = lab_with_group(&[(1, "host1")], "host1", job.clone());
    let mut ctx = lab.context();
    let mut task = AgentTask::queue(&ctx, &job, &group).unwrap();
    task.poll(&mut ctx).unwrap();
    cycle(&mut ctx).await;
    lab.clock.advance(Duration::from_secs(60));
    lab.drone.finish(&lab.last_pidfile(), exit_status, failed_tests);
    ctx.drones.refresh().await;
    task.poll(&mut ctx).unwrap();
    (lab, ctx, task)
}

#[tokio::test]
async fn completion_hands_off_to_parse() {
    let (lab, mut ctx, task) = finish_payload(RebootAfter::Never, 0, 0).await;
    assert!(task.is_done());
    assert_eq!(task.success(), Some(true));
    assert_eq!(lab.entry_status(1), QueueEntryStatus::Parsing);
    assert_eq!(lab.host(1).status, HostStatus::Ready);

    let agents = ctx.take_new_agents();
    assert_eq!(agents.len(), 1);
    assert_eq!(agents[0].num_processes(), 0);
    let reparse = agents[0].queued_tasks().next().and_then(AgentTask::as_final_reparse).unwrap();
    assert_eq!(reparse.execution_tag(), "5-my_user/host1");

    ctx.drones.execute_actions().await;
    assert!(lab.drone.calls().contains(&DroneCall::WriteToFile {
        path: "/drone/5-my_user/host1/keyval".into(),
        contents: "job_finished=1000060\n".into(),
    }));
}

async fn cleanup_agents_after(reboot_after: RebootAfter, exit_status: i32, failed_tests: u32) -> usize {
    let (lab, mut ctx, _) = finish_payload(reboot_after, exit_status, failed_tests).await;
    let cleanups = ctx
        .take_new_agents()
        .iter()
        .filter(|agent| {
            agent
                .queued_tasks()
                .next()
                .and_then(AgentTask::as_host_task)
                .is_some_and(|t| t.kind() == HostTaskKind::Cleanup)
        })
        .count();
    let expected_status = if cleanups > 0 { HostStatus::Running } else { HostStatus::Ready };
    assert_eq!(lab.host(1).status, expected_status);
    cleanups
}

#[tokio::test]
async fn reboot_after_always_cleans_up() {
    assert_eq!(cleanup_agents_after(RebootAfter::Always, 1, 3).await, 1);
}

#[tokio::test]
async fn reboot_after_passed_run_cleans_up() {
    assert_eq!(cleanup_agents_after(RebootAfter::IfAllTestsPassed, 0, 0).await, 1);
}

#[tokio::test]
async fn reboot_after_skipped_when_tests_failed() {
    assert_eq!(cleanup_agents_after(RebootAfter::IfAllTestsPassed, 0, 2).await, 0);
}

#[tokio::test]
async fn reboot_after_skipped_when_payload_failed() {
    assert_eq!(cleanup_agents_after(RebootAfter::IfAllTestsPassed, 1, 0).await, 0);
}

#[tokio::test]
async fn reboot_after_never() {
    assert_eq!(cleanup_agents_after(RebootAfter::Never, 0, 0).await, 0);
}

#[tokio::test]
async fn abort_kills_payload_and_records_keyval() {
    let (lab, group) = lab_with_group(&[(1, "host1")], "host1", job());
    let mut ctx = lab.context();
    let mut task = AgentTask::queue(&ctx, &job(), &group).unwrap();
    task.poll(&mut ctx).unwrap();
    cycle(&mut ctx).await;
    task.poll(&mut ctx).unwrap();

    task.abort(&mut ctx).unwrap();
    ctx.drones.execute_actions().await;

    assert!(task.is_done());
    assert!(lab.drone.live_pids().is_empty());
    let calls = lab.drone.calls();
    assert!(calls.contains(&DroneCall::KillProcess { pid: 100 }));
    assert!(calls.contains(&DroneCall::WriteToFile {
        path: "/drone/5-my_user/host1/keyval".into(),
        contents: "job_aborted=1000000\n".into(),
    }));
}

#[tokio::test]
async fn recovered_payload_attaches_instead_of_launching() {
    let (lab, _) = lab_with_group(&[(1, "host1")], "host1", job());
    lab.set_entry(1, |e| {
        e.apply_status(QueueEntryStatus::Running);
    });
    lab.drone.set_pidfile("/drone/5-my_user/host1/.autoserv_execute", "42\n0\n0\n");
    let mut ctx = lab.context();
    let mut task = AgentTask::recovered_queue(&ctx, &job(), &[lab.entry(1)]).unwrap();
    task.poll(&mut ctx).unwrap();
    ctx.drones.refresh().await;
    task.poll(&mut ctx).unwrap();
    ctx.drones.execute_actions().await;

    assert!(lab.launched().is_empty());
    assert!(lab.results.calls().is_empty());
    assert_eq!(task.success(), Some(true));
    assert_eq!(lab.entry_status(1), QueueEntryStatus::Parsing);
}
