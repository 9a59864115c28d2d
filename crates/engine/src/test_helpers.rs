// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests: a memory store, one fake drone and
//! fake mail, all driven by a fake clock.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use tb_adapters::{EmailNotificationManager, FakeDrone, FakeMailTransport};
use tb_core::{
    AclGroup, AclGroupId, FakeClock, Host, HostId, HostQueueEntry, Job, JobId, Label, LabelId,
    QueueEntryId, QueueEntryStatus, EVERYONE_GROUP,
};
use tb_storage::{MemoryStore, Store};

use crate::config::SchedulerConfig;
use crate::context::SchedulerContext;
use crate::dispatcher::Dispatcher;
use crate::drone_manager::{DroneManager, DroneSpec};

pub(crate) const OWNER: &str = "my_user";

pub(crate) struct TestLab {
    pub store: Arc<MemoryStore>,
    pub drone: FakeDrone,
    pub results: FakeDrone,
    pub mail: FakeMailTransport,
    pub clock: FakeClock,
}

impl TestLab {
    /// Empty lab with an Everyone ACL group that `OWNER` belongs to.
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::default());
        store.with_state(|s| {
            s.insert_acl_group(AclGroup {
                id: AclGroupId::new(1),
                name: EVERYONE_GROUP.to_string(),
                users: BTreeSet::from([OWNER.to_string()]),
                hosts: BTreeSet::new(),
            })
        });
        Self {
            store,
            drone: FakeDrone::new("drone1"),
            results: FakeDrone::new("results"),
            mail: FakeMailTransport::new(),
            clock: FakeClock::new(),
        }
    }

    pub fn context(&self) -> SchedulerContext<FakeClock> {
        self.context_with(SchedulerConfig::default(), 100)
    }

    pub fn context_with(
        &self,
        config: SchedulerConfig,
        max_processes: usize,
    ) -> SchedulerContext<FakeClock> {
        self.context_with_drones(config, max_processes, &[])
    }

    /// Context over the lab drone plus `extra` drones of the same capacity.
    pub fn context_with_drones(
        &self,
        config: SchedulerConfig,
        max_processes: usize,
        extra: &[FakeDrone],
    ) -> SchedulerContext<FakeClock> {
        let specs = std::iter::once(&self.drone)
            .chain(extra)
            .map(|fake| DroneSpec { drone: Arc::new(fake.clone()), max_processes })
            .collect();
        let drones = DroneManager::new(
            specs,
            Arc::new(self.results.clone()),
            "/results",
            "/drone",
        )
        .unwrap();
        let email = EmailNotificationManager::new(
            Some("scheduler@lab".into()),
            "ops@lab",
            Arc::new(self.mail.clone()),
        );
        let store: Arc<dyn Store> = self.store.clone();
        SchedulerContext::new(store, drones, email, config, self.clock.clone())
    }

    pub fn dispatcher(&self) -> Dispatcher<FakeClock> {
        Dispatcher::new(self.context())
    }

    pub fn dispatcher_with(&self, config: SchedulerConfig, max_processes: usize) -> Dispatcher<FakeClock> {
        Dispatcher::new(self.context_with(config, max_processes))
    }

    /// Ready host in the Everyone group.
    pub fn add_host(&self, id: u64, hostname: &str) -> HostId {
        let host = Host::builder().id(HostId::new(id)).hostname(hostname).build();
        self.insert_host(host)
    }

    pub fn insert_host(&self, host: Host) -> HostId {
        let id = host.id;
        self.store.with_state(|s| {
            s.insert_host(host);
            if let Some(group) = s.acl_groups.get_mut(&AclGroupId::new(1)) {
                group.hosts.insert(id);
            }
        });
        id
    }

    pub fn add_label(&self, id: u64, name: &str, hosts: &[u64], only_if_needed: bool) -> LabelId {
        let label = Label::builder()
            .id(LabelId::new(id))
            .name(name)
            .hosts(hosts.iter().copied().map(HostId::new).collect())
            .only_if_needed(only_if_needed)
            .build();
        self.store.with_state(|s| s.insert_label(label));
        LabelId::new(id)
    }

    pub fn add_job(&self, job: Job) -> JobId {
        let id = job.id;
        self.store.with_state(|s| s.insert_job(job));
        id
    }

    /// Queued entry for a specific host.
    pub fn add_entry(&self, id: u64, job: u64, host: u64) -> QueueEntryId {
        self.insert_entry(
            HostQueueEntry::builder()
                .id(QueueEntryId::new(id))
                .job_id(JobId::new(job))
                .host_id(Some(HostId::new(host)))
                .build(),
        )
    }

    /// Queued metahost entry for a label.
    pub fn add_meta_entry(&self, id: u64, job: u64, label: u64) -> QueueEntryId {
        self.insert_entry(
            HostQueueEntry::builder()
                .id(QueueEntryId::new(id))
                .job_id(JobId::new(job))
                .meta_host(Some(LabelId::new(label)))
                .build(),
        )
    }

    pub fn insert_entry(&self, entry: HostQueueEntry) -> QueueEntryId {
        let id = entry.id;
        self.store.with_state(|s| s.insert_queue_entry(entry));
        id
    }

    pub fn entry(&self, id: u64) -> HostQueueEntry {
        self.store.queue_entry(QueueEntryId::new(id)).unwrap()
    }

    pub fn entry_status(&self, id: u64) -> QueueEntryStatus {
        self.entry(id).status
    }

    pub fn host(&self, id: u64) -> Host {
        self.store.host(HostId::new(id)).unwrap()
    }

    pub fn set_entry(&self, id: u64, f: impl FnOnce(&mut HostQueueEntry)) {
        self.store.with_state(|s| {
            if let Some(entry) = s.queue_entries.get_mut(&QueueEntryId::new(id)) {
                f(entry);
            }
        });
    }

    pub fn set_host(&self, id: u64, f: impl FnOnce(&mut Host)) {
        self.store.with_state(|s| {
            if let Some(host) = s.hosts.get_mut(&HostId::new(id)) {
                f(host);
            }
        });
    }

    /// Commands launched on the drone with the pidfile each writes.
    pub fn launched(&self) -> Vec<(Vec<String>, PathBuf)> {
        self.drone.executed()
    }

    /// Pidfile of the most recent launch.
    pub fn last_pidfile(&self) -> PathBuf {
        self.launched().pop().map(|(_, pidfile)| pidfile).unwrap()
    }
}

/// Flush queued drone calls, then read drone state back, as the boundary
/// between two cycles does.
pub(crate) async fn cycle(ctx: &mut SchedulerContext<FakeClock>) {
    ctx.drones.execute_actions().await;
    ctx.drones.refresh().await;
}
