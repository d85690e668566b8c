use std::collections::HashSet;

use crate::domain::record::{Record, RecordId};

/// Local transform half of a mutation intent: either edit one record in
/// place or drop it from the list.
pub enum LocalChange<R> {
    Update(Box<dyn FnOnce(&mut R) + Send>),
    Remove,
}

/// Why a speculative application was refused. Both cases are decided
/// synchronously, before any remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    RecordNotFound { target: RecordId },
    ConflictInFlight { target: RecordId },
}

/// The list a scope currently shows, plus which rows have a mutation in
/// flight. Rollback works on whole lists: `apply` returns the prior list
/// and `rollback` reinstates it verbatim.
pub struct Snapshot<R: Record> {
    records: Vec<R>,
    in_flight: HashSet<RecordId>,
    loaded: bool,
}

impl<R: Record> Snapshot<R> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            in_flight: HashSet::new(),
            loaded: false,
        }
    }

    pub fn records(&self) -> Vec<R> {
        self.records.clone()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn is_locked(&self, id: &RecordId) -> bool {
        self.in_flight.contains(id)
    }

    /// Swaps in the server's list. In-flight markers survive the swap:
    /// a marker drops only when its intent settles, never because a
    /// refresh or commit refetch ran in between.
    pub fn replace(&mut self, records: Vec<R>) {
        self.records = records;
        self.loaded = true;
    }

    /// Commit-time trim for a removal. Usually a no-op since the
    /// speculative apply already dropped the row; it matters when a
    /// refresh read the server before the removal landed there.
    pub fn discard(&mut self, target: &RecordId) {
        self.records.retain(|r| r.record_id() != target);
    }

    /// Applies a change speculatively and marks the target in flight.
    /// Returns the list as it stood immediately before, for rollback.
    pub fn apply(&mut self, target: &RecordId, change: LocalChange<R>) -> Result<Vec<R>, ApplyError> {
        if self.in_flight.contains(target) {
            return Err(ApplyError::ConflictInFlight {
                target: target.clone(),
            });
        }
        let Some(index) = self.records.iter().position(|r| r.record_id() == target) else {
            return Err(ApplyError::RecordNotFound {
                target: target.clone(),
            });
        };
        let prior = self.records.clone();
        match change {
            LocalChange::Update(transform) => transform(&mut self.records[index]),
            LocalChange::Remove => {
                self.records.remove(index);
            }
        }
        self.in_flight.insert(target.clone());
        Ok(prior)
    }

    /// Reinstates a list captured by `apply`.
    pub fn rollback(&mut self, prior: Vec<R>) {
        self.records = prior;
    }

    /// Clears the in-flight marker once the intent settled either way.
    pub fn release(&mut self, target: &RecordId) {
        self.in_flight.remove(target);
    }
}

impl<R: Record> Default for Snapshot<R> {
    fn default() -> Self {
        Self::new()
    }
}
