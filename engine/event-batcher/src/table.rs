//! The shared per-key latest-value table

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::value::ArgValue;

/// Detached table contents, in key order
pub type TableSnapshot = BTreeMap<String, Vec<ArgValue>>;

/// How a write treats an existing entry for the same key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Replace whatever is there (last write wins)
    Overwrite,
    /// Leave an existing entry untouched until it has been drained
    KeepExisting,
}

/// What a write actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The key was absent and is now present
    Inserted,
    /// The key was present and its value was replaced
    Overwritten,
    /// The key was present and the write was dropped
    Suppressed,
    /// The table has been closed; nothing was written
    Closed,
}

impl WriteOutcome {
    /// Whether the write changed the table
    pub fn is_stored(self) -> bool {
        matches!(self, WriteOutcome::Inserted | WriteOutcome::Overwritten)
    }
}

#[derive(Debug, Default)]
struct TableState {
    entries: TableSnapshot,
    closed: bool,
}

/// Key → argument-sequence map guarded by a single mutex.
///
/// Every access (write, drain, close) goes through the same lock and holds it only for the
/// map operation itself. Once closed the table accepts no more writes and drains empty.
#[derive(Debug, Default)]
pub struct EventTable {
    state: Mutex<TableState>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `arguments` under `key` according to `policy`
    pub fn write(&self, key: String, arguments: Vec<ArgValue>, policy: WritePolicy) -> WriteOutcome {
        let mut state = self.state.lock();
        if state.closed {
            return WriteOutcome::Closed;
        }

        match state.entries.entry(key) {
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(arguments);
                WriteOutcome::Inserted
            }
            std::collections::btree_map::Entry::Occupied(mut e) => match policy {
                WritePolicy::Overwrite => {
                    e.insert(arguments);
                    WriteOutcome::Overwritten
                }
                WritePolicy::KeepExisting => WriteOutcome::Suppressed,
            },
        }
    }

    /// Swap the live contents for an empty map and return what was there
    pub fn drain(&self) -> TableSnapshot {
        let mut detached = TableSnapshot::new();
        {
            let mut state = self.state.lock();
            std::mem::swap(&mut state.entries, &mut detached);
        }
        detached
    }

    /// Refuse further writes and discard pending entries. Returns how many were discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut state = self.state.lock();
            state.closed = true;
            std::mem::take(&mut state.entries)
        };
        discarded.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Copy of the pending value for `key`
    pub fn get(&self, key: &str) -> Option<Vec<ArgValue>> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }
}
