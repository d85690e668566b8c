use serde::{Deserialize, Serialize};

use super::group::GroupRole;
use super::record::{Record, RecordId};

/// One row of a group's member list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub id: RecordId,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub role: GroupRole,
}

impl Record for Member {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}
