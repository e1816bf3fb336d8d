//! Linear undo/redo log of full-document snapshots.
//!
//! The log is a list of snapshots plus a cursor at the current entry. Committing
//! past the cursor throws the redo branch away; the oldest entries are evicted
//! once the log is over capacity.

use std::time::Duration;

use crate::snapshot::Snapshot;

/// Maximum number of entries kept by default
pub const DEFAULT_CAPACITY: usize = 50;

/// Inactivity window after which coalesced edits are committed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Bounded snapshot history with a cursor
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<Snapshot>,
    /// `None` until the first commit
    index: Option<usize>,
    capacity: usize,
}

impl History {
    /// Create an empty history
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            index: None,
            capacity: capacity.max(1),
        }
    }

    /// Append a snapshot after the cursor and move the cursor onto it.
    pub fn commit(&mut self, snapshot: Snapshot) -> usize {
        if let Some(index) = self.index {
            self.entries.truncate(index + 1);
        }
        self.entries.push(snapshot);

        // Limit history size
        while self.entries.len() > self.capacity {
            self.entries.remove(0);
        }

        let index = self.entries.len() - 1;
        self.index = Some(index);
        index
    }

    /// Entry one step back from the cursor, if any.
    pub fn undo_target(&self) -> Option<(usize, &Snapshot)> {
        let target = self.index?.checked_sub(1)?;
        Some((target, &self.entries[target]))
    }

    /// Entry one step forward from the cursor, if any.
    pub fn redo_target(&self) -> Option<(usize, &Snapshot)> {
        let target = self.index? + 1;
        self.entries.get(target).map(|snap| (target, snap))
    }

    /// Move the cursor after a target entry has been applied to the document.
    pub fn move_to(&mut self, index: usize) {
        if index < self.entries.len() {
            self.index = Some(index);
        }
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.entries.get(self.index?)
    }

    pub fn index(&self) -> Option<usize> {
        self.index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn entries(&self) -> &[Snapshot] {
        &self.entries
    }

    pub fn can_undo(&self) -> bool {
        self.undo_target().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.redo_target().is_some()
    }

    /// `(current entry number, entry count)` for a "History i / n" indicator.
    pub fn position(&self) -> (usize, usize) {
        (self.index.map_or(0, |i| i + 1), self.entries.len())
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index = None;
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Pending-commit deadline for coalescing bursts of edits.
///
/// Time only moves through [`Debouncer::advance`], so one tick source drives
/// every deadline.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    now: Duration,
    deadline: Option<Duration>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            now: Duration::ZERO,
            deadline: None,
        }
    }

    /// Record an edit: the commit is pushed back to a full window from now.
    pub fn touch(&mut self) {
        self.deadline = Some(self.now + self.window);
    }

    /// Advance time. Returns `true` once when the pending deadline passes.
    pub fn advance(&mut self, elapsed: Duration) -> bool {
        self.now += elapsed;
        match self.deadline {
            Some(deadline) if self.now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop the pending deadline, returning whether one was set.
    pub fn take_pending(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(n: usize) -> Snapshot {
        Snapshot::from_raw(n.to_string())
    }

    #[test]
    fn empty_history_cannot_move() {
        let history = History::default();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.position(), (0, 0));
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut history = History::new(3);
        for n in 0..5 {
            history.commit(snap(n));
        }
        assert_eq!(history.entries(), [snap(2), snap(3), snap(4)]);
        assert_eq!(history.index(), Some(2));
    }

    #[test]
    fn commit_after_undo_truncates_redo_branch() {
        let mut history = History::default();
        for n in 0..4 {
            history.commit(snap(n));
        }
        let (target, _) = history.undo_target().unwrap();
        history.move_to(target);
        let (target, _) = history.undo_target().unwrap();
        history.move_to(target);
        assert_eq!(history.index(), Some(1));

        history.commit(snap(9));
        assert_eq!(history.entries(), [snap(0), snap(1), snap(9)]);
        assert!(!history.can_redo());
    }

    #[test]
    fn targets_stop_at_the_ends() {
        let mut history = History::default();
        history.commit(snap(0));
        assert!(history.undo_target().is_none());
        assert!(history.redo_target().is_none());
        history.commit(snap(1));
        assert_eq!(history.undo_target(), Some((0, &snap(0))));
    }

    #[test]
    fn debouncer_fires_after_quiet_window() {
        let mut debounce = Debouncer::default();
        debounce.touch();
        assert!(!debounce.advance(Duration::from_millis(200)));
        debounce.touch();
        assert!(!debounce.advance(Duration::from_millis(200)));
        assert!(debounce.advance(Duration::from_millis(100)));
        assert!(!debounce.advance(Duration::from_millis(1000)));
    }

    #[test]
    fn take_pending_cancels_deadline() {
        let mut debounce = Debouncer::default();
        debounce.touch();
        assert!(debounce.take_pending());
        assert!(!debounce.is_pending());
        assert!(!debounce.advance(Duration::from_secs(1)));
    }
}
