use std::collections::VecDeque;

use tiles::{StorageConfig, TileSnapshot};
use tracing::{debug, trace};

/// Bounded undo/redo stacks of surface snapshots.
///
/// Snapshots compare by region set and blob identity, so pushing a capture of
/// unchanged content is a no-op.
#[derive(Debug)]
pub struct SnapshotHistory {
    limit: usize,
    undo: VecDeque<TileSnapshot>,
    redo: Vec<TileSnapshot>,
}

impl SnapshotHistory {
    pub fn new(limit: usize) -> Self {
        assert!(limit > 0, "history limit must be at least 1");
        Self {
            limit,
            undo: VecDeque::new(),
            redo: Vec::new(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.history_limit)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Records the content as it was before an edit. Returns false when the
    /// snapshot equals the newest entry and was coalesced into it.
    pub fn push(&mut self, snapshot: TileSnapshot) -> bool {
        if self.undo.back() == Some(&snapshot) {
            trace!("coalesced unchanged snapshot");
            return false;
        }
        self.undo.push_back(snapshot);
        self.redo.clear();
        if self.undo.len() > self.limit {
            self.undo.pop_front();
            trace!(limit = self.limit, "dropped oldest history entry");
        }
        debug!(undo = self.undo.len(), "history entry pushed");
        true
    }

    /// Swaps `current` for the newest undo entry. `current` becomes
    /// redoable.
    pub fn undo(&mut self, current: TileSnapshot) -> Option<TileSnapshot> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        debug!(undo = self.undo.len(), redo = self.redo.len(), "undo");
        Some(previous)
    }

    /// Swaps `current` for the newest redo entry. `current` becomes
    /// undoable again.
    pub fn redo(&mut self, current: TileSnapshot) -> Option<TileSnapshot> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        debug!(undo = self.undo.len(), redo = self.redo.len(), "redo");
        Some(next)
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
