use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::record::{Record, RecordId};
use super::validate::{ValidationError, check_length};

/// One tracked item inside a group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    /// Whole units; the server rejects fractions and negatives.
    pub amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Username of whoever created the item.
    pub creator: String,
}

impl Record for Item {
    fn record_id(&self) -> &RecordId {
        &self.id
    }
}

pub const ITEM_NAME_MIN: usize = 3;
pub const ITEM_NAME_MAX: usize = 100;
pub const ITEM_DESCRIPTION_MIN: usize = 3;
pub const ITEM_DESCRIPTION_MAX: usize = 255;

/// User-entered fields for creating or editing an item. Timestamps and
/// creator are server-derived and never part of a draft.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub name: String,
    pub description: String,
    pub amount: i64,
}

impl ItemDraft {
    pub fn new(name: impl Into<String>, description: impl Into<String>, amount: i64) -> Self {
        Self {
            name: name.into().trim().to_string(),
            description: description.into().trim().to_string(),
            amount,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_length("item name", &self.name, ITEM_NAME_MIN, ITEM_NAME_MAX)?;
        check_length(
            "item description",
            &self.description,
            ITEM_DESCRIPTION_MIN,
            ITEM_DESCRIPTION_MAX,
        )?;
        if self.amount < 0 {
            return Err(ValidationError::NegativeAmount);
        }
        Ok(())
    }
}
