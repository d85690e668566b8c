use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque server-assigned identifier of one record. The server owns the
/// format; this side only compares and displays it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies the collection a snapshot mirrors: one group's members or
/// items, or the signed-in user's group roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Scope of collections that live under a group (members, items).
    pub fn of_group(group_id: &RecordId) -> Self {
        Self(group_id.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What the snapshot cache requires of the rows it holds.
pub trait Record: Clone + PartialEq + Send + Sync + 'static {
    fn record_id(&self) -> &RecordId;
}
