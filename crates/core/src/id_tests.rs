// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn ids_serialize_as_bare_integers() {
    let json = serde_json::to_string(&HostId::new(7)).unwrap();
    assert_eq!(json, "7");
    let parsed: JobId = serde_json::from_str("42").unwrap();
    assert_eq!(parsed, JobId::new(42));
}

#[test]
fn ids_order_numerically() {
    let mut ids = vec![QueueEntryId::new(10), QueueEntryId::new(2), QueueEntryId::new(7)];
    ids.sort();
    assert_eq!(ids, vec![QueueEntryId::new(2), QueueEntryId::new(7), QueueEntryId::new(10)]);
}

#[test]
fn display_is_the_number() {
    assert_eq!(LabelId::from(3).to_string(), "3");
    assert_eq!(AclGroupId::new(9).get(), 9);
}
