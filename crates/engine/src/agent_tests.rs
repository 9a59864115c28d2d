// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::task::HostTaskKind;
use crate::test_helpers::{cycle, TestLab};
use tb_core::{HostStatus, Job, QueueEntryStatus};

fn kind(task: Option<&AgentTask>) -> Option<HostTaskKind> {
    task.and_then(AgentTask::as_host_task).map(|t| t.kind())
}

#[tokio::test]
async fn runs_tasks_in_order() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    let mut ctx = lab.context();
    let host = lab.host(1);
    let tasks = vec![AgentTask::cleanup(&mut ctx, &host, None), AgentTask::verify(&mut ctx, &host, None)];
    let mut agent = Agent::new(tasks, 1);
    assert!(!agent.is_running());

    agent.tick(&mut ctx).unwrap();
    assert!(agent.is_running());
    assert_eq!(kind(agent.active_task()), Some(HostTaskKind::Cleanup));

    cycle(&mut ctx).await;
    lab.drone.finish(&lab.last_pidfile(), 0, 0);
    ctx.drones.refresh().await;
    agent.tick(&mut ctx).unwrap();
    assert_eq!(kind(agent.active_task()), Some(HostTaskKind::Verify));
    assert_eq!(lab.host(1).status, HostStatus::Verifying);

    cycle(&mut ctx).await;
    lab.drone.finish(&lab.last_pidfile(), 0, 0);
    ctx.drones.refresh().await;
    agent.tick(&mut ctx).unwrap();
    assert!(agent.is_done());
    assert_eq!(lab.launched().len(), 2);
}

#[tokio::test]
async fn failure_tasks_replace_the_rest_of_the_queue() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    let mut ctx = lab.context();
    let host = lab.host(1);
    let tasks = vec![AgentTask::verify(&mut ctx, &host, None), AgentTask::cleanup(&mut ctx, &host, None)];
    let mut agent = Agent::new(tasks, 1);
    agent.tick(&mut ctx).unwrap();

    cycle(&mut ctx).await;
    lab.drone.finish(&lab.last_pidfile(), 1, 0);
    ctx.drones.refresh().await;
    agent.tick(&mut ctx).unwrap();

    assert_eq!(kind(agent.active_task()), Some(HostTaskKind::Repair));
    assert_eq!(agent.queued_tasks().count(), 0);
    assert_eq!(lab.host(1).status, HostStatus::Repairing);
}

#[test]
fn ids_are_the_union_over_tasks() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    lab.add_host(2, "host2");
    lab.add_job(Job::builder().build());
    lab.add_entry(1, 1, 2);
    let mut ctx = lab.context();
    let tasks = vec![
        AgentTask::verify(&mut ctx, &lab.host(2), Some(&lab.entry(1))),
        AgentTask::cleanup(&mut ctx, &lab.host(1), None),
        AgentTask::set_entry_pending(QueueEntryId::new(1), HostId::new(2)),
    ];
    let agent = Agent::new(tasks, 3);
    assert_eq!(agent.host_ids(), [HostId::new(1), HostId::new(2)]);
    assert_eq!(agent.queue_entry_ids(), [QueueEntryId::new(1)]);
    assert_eq!(agent.num_processes(), 3);
}

#[test]
fn task_without_command_finishes_in_the_same_tick() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    lab.add_job(Job::builder().build());
    lab.add_entry(1, 1, 1);
    lab.set_entry(1, |e| {
        e.apply_status(QueueEntryStatus::Verifying);
    });
    let mut ctx = lab.context();
    let mut agent =
        Agent::new(vec![AgentTask::set_entry_pending(QueueEntryId::new(1), HostId::new(1))], 1);
    agent.tick(&mut ctx).unwrap();

    assert!(agent.is_done());
    // Synch count 1: the payload starts right away.
    assert_eq!(lab.entry_status(1), QueueEntryStatus::Starting);
    assert_eq!(ctx.take_new_agents().len(), 1);
}

#[tokio::test]
async fn abort_stops_the_active_task() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    let mut ctx = lab.context();
    let host = lab.host(1);
    let tasks = vec![AgentTask::verify(&mut ctx, &host, None), AgentTask::cleanup(&mut ctx, &host, None)];
    let mut agent = Agent::new(tasks, 1);
    agent.tick(&mut ctx).unwrap();
    cycle(&mut ctx).await;
    agent.tick(&mut ctx).unwrap();

    agent.abort(&mut ctx).unwrap();
    ctx.drones.execute_actions().await;
    assert!(agent.is_done());
    assert!(lab.drone.live_pids().is_empty());
}

#[test]
fn task_that_fails_to_start_runs_its_failure_tasks() {
    let lab = TestLab::new();
    lab.add_host(1, "host1");
    lab.add_job(Job::builder().build());
    lab.add_entry(1, 1, 1);
    let mut ctx = lab.context();
    let tasks = vec![AgentTask::verify(&mut ctx, &lab.host(1), Some(&lab.entry(1)))];
    let mut agent = Agent::new(tasks, 1);
    lab.store.with_state(|s| s.hosts.remove(&HostId::new(1)));

    assert!(agent.tick(&mut ctx).is_err());
    let verify = agent.active_task().unwrap();
    assert!(verify.is_done());
    assert_eq!(verify.success(), Some(false));
    assert!(!agent.is_done());

    // The repair that follows gives the entry back to the queue.
    assert!(agent.tick(&mut ctx).is_err());
    assert_eq!(kind(agent.active_task()), Some(HostTaskKind::Repair));
    assert_eq!(lab.entry_status(1), QueueEntryStatus::Queued);

    agent.tick(&mut ctx).unwrap();
    assert!(agent.is_done());
    assert!(lab.launched().is_empty());
}
