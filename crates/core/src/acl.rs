// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ACL groups: a user may run work on a host only if they share a group.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{AclGroupId, HostId};

/// Name of the group that holds the shared host pool.
pub const EVERYONE_GROUP: &str = "Everyone";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclGroup {
    pub id: AclGroupId,
    pub name: String,
    #[serde(default)]
    pub users: BTreeSet<String>,
    #[serde(default)]
    pub hosts: BTreeSet<HostId>,
}

impl AclGroup {
    pub fn is_everyone(&self) -> bool {
        self.name == EVERYONE_GROUP
    }
}

crate::builder! {
    pub struct AclGroupBuilder => AclGroup {
        into {
            name: String = "my_acl",
        }
        set {
            id: AclGroupId = AclGroupId::new(1),
            users: BTreeSet<String> = BTreeSet::new(),
            hosts: BTreeSet<HostId> = BTreeSet::new(),
        }
    }
}
