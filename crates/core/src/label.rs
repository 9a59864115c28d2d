// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Labels group hosts; metahost entries target a label instead of a host.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::id::{HostId, LabelId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
    /// A host carries at most one platform label.
    #[serde(default)]
    pub platform: bool,
    /// Metahost matching skips hosts with this label unless the job asks for it.
    #[serde(default)]
    pub only_if_needed: bool,
    #[serde(default)]
    pub hosts: BTreeSet<HostId>,
}

impl Label {
    pub fn has_host(&self, host: HostId) -> bool {
        self.hosts.contains(&host)
    }
}

crate::builder! {
    pub struct LabelBuilder => Label {
        into {
            name: String = "label1",
        }
        set {
            id: LabelId = LabelId::new(1),
            platform: bool = false,
            only_if_needed: bool = false,
            hosts: BTreeSet<HostId> = BTreeSet::new(),
        }
    }
}
