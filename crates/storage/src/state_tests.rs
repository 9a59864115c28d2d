// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tb_core::QueueEntryStatus;

fn entry(id: u64, host: u64, status: QueueEntryStatus) -> HostQueueEntry {
    let mut entry = HostQueueEntry::builder()
        .id(QueueEntryId::new(id))
        .job_id(JobId::new(id))
        .host_id(Some(HostId::new(host)))
        .build();
    entry.apply_status(status);
    entry
}

#[test]
fn snapshot_rows_become_keyed_tables() {
    let json = r#"{
        "hosts": [{"id": 2, "hostname": "host2"}, {"id": 1, "hostname": "host1"}],
        "ineligible_host_queues": [{"job_id": 7, "host_id": 1}]
    }"#;
    let state: LabState = serde_json::from_str(json).unwrap();
    assert_eq!(state.hosts.keys().copied().collect::<Vec<_>>(), [HostId::new(1), HostId::new(2)]);
    assert_eq!(state.blocks.len(), 1);
    assert!(state.jobs.is_empty());
}

#[test]
fn one_active_entry_per_host_is_consistent() {
    let mut state = LabState::default();
    state.insert_queue_entry(entry(1, 1, QueueEntryStatus::Running));
    state.insert_queue_entry(entry(2, 1, QueueEntryStatus::Completed));
    state.insert_queue_entry(entry(3, 2, QueueEntryStatus::Verifying));
    assert!(state.double_booked_hosts().is_empty());

    state.insert_queue_entry(entry(4, 2, QueueEntryStatus::Parsing));
    state.insert_queue_entry(entry(5, 2, QueueEntryStatus::Starting));
    assert_eq!(state.double_booked_hosts(), [HostId::new(2)]);
}
