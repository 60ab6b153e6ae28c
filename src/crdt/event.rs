use serde::{Deserialize, Serialize};

use super::global_id::GlobalId;

/// A single CRDT operation, as it appears both on the wire and in a room's
/// event log. `Insert` carries the one Unicode scalar it introduces and an
/// optional anchor; `Delete` only ever needs the target's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CrdtEvent {
    Insert {
        gid: GlobalId,
        char: char,
        #[serde(rename = "afterGid", skip_serializing_if = "Option::is_none")]
        after_gid: Option<GlobalId>,
    },
    Delete {
        gid: GlobalId,
    },
}

impl CrdtEvent {
    pub fn gid(&self) -> GlobalId {
        match self {
            CrdtEvent::Insert { gid, .. } => *gid,
            CrdtEvent::Delete { gid } => *gid,
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, CrdtEvent::Insert { .. })
    }
}
