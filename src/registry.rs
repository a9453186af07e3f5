//! Ordered collection of session records.
//!
//! Insertion order is display order. Every record is re-evaluated on each
//! tick; there is no incremental refresh.

use crate::record::{Record, State};
use chrono::NaiveDateTime;

/// Stable handle for a record in a registry. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A state transition observed during a refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub id: RecordId,
    pub code: String,
    pub from: State,
    pub to: State,
}

/// Notified after every tick so the display can redraw
pub trait RefreshListener {
    fn on_refresh(&mut self, registry: &Registry, now: NaiveDateTime);
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<(RecordId, Record)>,
    next_id: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record after all existing ones
    pub fn add(&mut self, record: Record) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, record));
        id
    }

    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        let pos = self.entries.iter().position(|(rid, _)| *rid == id)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.entries
            .iter()
            .find(|(rid, _)| *rid == id)
            .map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.entries
            .iter_mut()
            .find(|(rid, _)| *rid == id)
            .map(|(_, r)| r)
    }

    /// Id of the record at a zero-based display position
    pub fn id_at(&self, index: usize) -> Option<RecordId> {
        self.entries.get(index).map(|(id, _)| *id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &Record)> {
        self.entries.iter().map(|(id, r)| (*id, r))
    }

    /// Re-evaluate every record as of `now`
    pub fn refresh_all(&mut self, now: NaiveDateTime) -> Vec<StateChange> {
        let mut changes = Vec::new();
        for (id, record) in &mut self.entries {
            if let Some((from, to)) = record.refresh(now) {
                changes.push(StateChange {
                    id: *id,
                    code: record.code.clone(),
                    from,
                    to,
                });
            }
        }
        changes
    }

    /// Refresh all records, then tell the listener to redraw
    pub fn on_tick(
        &mut self,
        now: NaiveDateTime,
        listener: &mut dyn RefreshListener,
    ) -> Vec<StateChange> {
        let changes = self.refresh_all(now);
        listener.on_refresh(self, now);
        changes
    }
}
