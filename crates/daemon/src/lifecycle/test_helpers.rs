// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub(super) use std::collections::BTreeSet;
pub(super) use std::path::Path;
pub(super) use std::sync::Arc;

pub(super) use tb_adapters::{FakeDrone, FakeMailTransport};
pub(super) use tb_core::{
    AclGroup, Host, HostId, HostQueueEntry, Job, JobId, QueueEntryId, QueueEntryStatus,
    EVERYONE_GROUP,
};
pub(super) use tb_engine::DroneSpec;
pub(super) use tb_storage::MemoryStore;
pub(super) use tempfile::tempdir;

pub(super) use super::{startup_with, Daemon, LifecycleError};
pub(super) use crate::config::Config;

pub(super) struct Fakes {
    pub drone: FakeDrone,
    pub results: FakeDrone,
    pub mail: FakeMailTransport,
}

impl Fakes {
    pub fn new() -> Self {
        Self {
            drone: FakeDrone::new("drone1"),
            results: FakeDrone::new("results"),
            mail: FakeMailTransport::new(),
        }
    }

    pub async fn start(&self, config: Config) -> Result<Daemon, LifecycleError> {
        let drones = vec![DroneSpec { drone: Arc::new(self.drone.clone()), max_processes: 10 }];
        startup_with(config, drones, Arc::new(self.results.clone()), Arc::new(self.mail.clone()))
            .await
    }
}

/// Config rooted in `state_dir` with a fast tick.
pub(super) fn test_config(state_dir: &Path) -> Config {
    let mut config = Config::default();
    config.paths.state_dir = Some(state_dir.to_path_buf());
    config.paths.drone_root = "/drone".into();
    config.results.dir = "/results".into();
    config.notify.to = "ops@lab".to_string();
    config.scheduler.tick_interval_ms = 10;
    config
}

/// Snapshot with one Ready host and one job queued for it.
pub(super) fn write_lab(path: &Path) {
    let store = MemoryStore::default();
    store.with_state(|s| {
        s.insert_host(Host::builder().id(HostId::new(1)).hostname("host1").build());
        s.insert_acl_group(
            AclGroup::builder()
                .name(EVERYONE_GROUP)
                .users(BTreeSet::from(["my_user".to_string()]))
                .hosts(BTreeSet::from([HostId::new(1)]))
                .build(),
        );
        s.insert_job(Job::builder().build());
        s.insert_queue_entry(
            HostQueueEntry::builder()
                .id(QueueEntryId::new(1))
                .job_id(JobId::new(1))
                .host_id(Some(HostId::new(1)))
                .build(),
        );
    });
    store.save(path).unwrap();
}

pub(super) fn entry_status(daemon: &Daemon, id: u64) -> QueueEntryStatus {
    daemon.store.snapshot().queue_entries[&QueueEntryId::new(id)].status
}
