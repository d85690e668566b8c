use serde::{Deserialize, Serialize};

use super::record::{Record, RecordId};
use super::validate::{ValidationError, check_length};

/// Authorization level inside one group. The server speaks uppercase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum GroupRole {
    Admin,
    User,
}

impl GroupRole {
    /// The only role change the console offers: flip between the two levels.
    pub fn toggled(self) -> Self {
        match self {
            GroupRole::Admin => GroupRole::User,
            GroupRole::User => GroupRole::Admin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GroupRole::Admin => "ADMIN",
            GroupRole::User => "USER",
        }
    }
}

impl std::fmt::Display for GroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A group as the signed-in user sees it: the server attaches the caller's
/// own role to each roster row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: RecordId,
    pub name: String,
    /// Username of the group owner. Owner rows are immune to member
    /// management no matter who asks.
    pub owner: String,
    pub my_role: GroupRole,
}

impl Record for Group {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

pub const GROUP_NAME_MIN: usize = 3;
pub const GROUP_NAME_MAX: usize = 50;

/// User-entered fields for creating or renaming a group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDraft {
    pub name: String,
}

impl GroupDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("group name", &self.name, GROUP_NAME_MIN, GROUP_NAME_MAX)
    }
}
