// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primary keys of the store's record kinds

crate::define_id! {
    /// Primary key of a host row.
    pub struct HostId;
}

crate::define_id! {
    /// Primary key of a label row.
    pub struct LabelId;
}

crate::define_id! {
    /// Primary key of an ACL group row.
    pub struct AclGroupId;
}

crate::define_id! {
    /// Primary key of a job row.
    pub struct JobId;
}

crate::define_id! {
    /// Primary key of a host queue entry row.
    pub struct QueueEntryId;
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
