//! [`HistoryManager`]: append-only request list with update-by-id, and the
//! "current execution" pointer the planner advances per attempt.
//!
//! `update` is the only write path a running request uses after its initial
//! `append` — repeated attempts mutate the same entry rather than
//! accumulating one entry per attempt.

use std::sync::RwLock;

use taskweave_kernel::ExecutionHistory;
use uuid::Uuid;

pub struct HistoryManager {
    entries: RwLock<Vec<ExecutionHistory>>,
    current_id: RwLock<Option<Uuid>>,
}

impl HistoryManager {
    pub fn new() -> Self {
        Self { entries: RwLock::new(Vec::new()), current_id: RwLock::new(None) }
    }

    /// Record a brand-new request's history and mark it current. Fails to
    /// find a match later iff callers forget to call this before `update` —
    /// a logic error, not a runtime one, so there's no error return; it
    /// simply always succeeds.
    pub fn append(&self, history: ExecutionHistory) {
        *self.current_id.write().unwrap() = Some(history.id);
        self.entries.write().unwrap().push(history);
    }

    /// Replace the entry with the same `id` as `history`. No-op (but
    /// observable via the returned bool) if no such entry exists yet.
    /// Clears the current pointer once the request reaches a terminal
    /// status, so `current` reports `None` between requests.
    pub fn update(&self, history: ExecutionHistory) -> bool {
        let terminal = history.status.is_terminal();
        let id = history.id;
        let mut entries = self.entries.write().unwrap();
        let found = if let Some(slot) = entries.iter_mut().find(|h| h.id == id) {
            *slot = history;
            true
        } else {
            false
        };
        if found && terminal {
            let mut current = self.current_id.write().unwrap();
            if *current == Some(id) {
                *current = None;
            }
        }
        found
    }

    pub fn get(&self, id: Uuid) -> Option<ExecutionHistory> {
        self.entries.read().unwrap().iter().find(|h| h.id == id).cloned()
    }

    pub fn all(&self) -> Vec<ExecutionHistory> {
        self.entries.read().unwrap().clone()
    }

    /// The in-flight request's history, if one is currently running.
    pub fn current(&self) -> Option<ExecutionHistory> {
        let id = (*self.current_id.read().unwrap())?;
        self.get(id)
    }
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new()
    }
}
