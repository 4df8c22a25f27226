use crate::snapshot::Snapshot;

/// Upper bound on retained snapshots. Full-raster copies are heavy, so the
/// window is deliberately small.
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// Bounded undo/redo manager over whole-surface snapshots.
///
/// The history always holds at least one entry; the last entry is the state
/// the surface should currently display. The manager only does bookkeeping —
/// actually repainting the reported snapshot is the caller's job, and image
/// decode makes that repaint asynchronous relative to the state update here.
pub struct SnapshotHistory {
    entries: Vec<Snapshot>,
    redo: Vec<Snapshot>,
    capacity: usize,
    blank: Snapshot,
}

impl SnapshotHistory {
    /// Starts with a single entry: the given blank-surface snapshot.
    pub fn new(capacity: usize, blank: Snapshot) -> Self {
        Self {
            entries: vec![blank.clone()],
            redo: Vec::new(),
            capacity: capacity.max(1),
            blank,
        }
    }

    pub fn with_default_capacity(blank: Snapshot) -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY, blank)
    }

    /// Records a completed edit. Evicts the oldest entry past capacity and
    /// invalidates any redo states.
    pub fn push(&mut self, snapshot: Snapshot) {
        self.entries.push(snapshot);
        if self.entries.len() > self.capacity {
            self.entries.remove(0);
        }
        self.redo.clear();
    }

    /// Steps back one edit and returns the snapshot the surface should now
    /// display. With nothing left to undo the history resets to a single
    /// blank entry; the redo side is left untouched in that terminal case.
    pub fn undo(&mut self) -> &Snapshot {
        if self.entries.len() <= 1 {
            self.entries.clear();
            self.entries.push(self.blank.clone());
        } else if let Some(undone) = self.entries.pop() {
            self.redo.push(undone);
        }
        self.visible()
    }

    /// Re-applies the most recently undone edit, returning the snapshot to
    /// display, or `None` when there is nothing to redo (state unchanged).
    pub fn redo(&mut self) -> Option<&Snapshot> {
        let snapshot = self.redo.pop()?;
        self.entries.push(snapshot);
        self.entries.last()
    }

    /// The snapshot the surface should currently display.
    pub fn visible(&self) -> &Snapshot {
        // entries is never empty; fall back to blank rather than panic.
        self.entries.last().unwrap_or(&self.blank)
    }

    pub fn can_undo(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(tag: &str) -> Snapshot {
        use base64::engine::general_purpose::STANDARD;
        use base64::Engine;
        Snapshot::from_data_url(format!(
            "data:image/png;base64,{}",
            STANDARD.encode(tag.as_bytes())
        ))
        .unwrap()
    }

    #[test]
    fn starts_with_single_blank_entry() {
        let history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        assert_eq!(history.len(), 1);
        assert_eq!(history.visible(), &Snapshot::blank());
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_then_redo_restores_pre_undo_state() {
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snap("a"));
        history.push(snap("b"));

        assert_eq!(history.undo(), &snap("a"));
        assert_eq!(history.redo(), Some(&snap("b")));
        assert_eq!(history.visible(), &snap("b"));
        assert!(!history.can_redo());
    }

    #[test]
    fn push_clears_redo_buffer() {
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snap("a"));
        history.push(snap("b"));
        history.undo();
        assert!(history.can_redo());

        history.push(snap("c"));
        assert!(!history.can_redo());
        assert_eq!(history.redo(), None);
    }

    #[test]
    fn redo_on_empty_buffer_is_a_no_op() {
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snap("a"));
        let before = history.visible().clone();

        assert_eq!(history.redo(), None);
        assert_eq!(history.visible(), &before);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let mut history = SnapshotHistory::new(3, Snapshot::blank());
        for tag in ["a", "b", "c", "d"] {
            history.push(snap(tag));
        }
        // 4 pushes against capacity 3: blank and "a" are gone.
        assert_eq!(history.len(), 3);
        assert_eq!(history.visible(), &snap("d"));
        assert_eq!(history.undo(), &snap("c"));
        assert_eq!(history.undo(), &snap("b"));
        // "b" is now the oldest entry; undoing it blanks the surface.
        assert_eq!(history.undo(), &Snapshot::blank());
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut history = SnapshotHistory::new(5, Snapshot::blank());
        for i in 0..20 {
            history.push(snap(&format!("s{i}")));
            assert!(history.len() <= 5);
        }
    }

    #[test]
    fn undo_at_floor_resets_to_blank_and_keeps_redo() {
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snap("a"));
        history.push(snap("b"));
        history.undo();
        history.undo();
        assert!(history.can_redo());

        // Terminal undo: surface blanks, redo states survive.
        assert_eq!(history.undo(), &Snapshot::blank());
        assert_eq!(history.len(), 1);
        assert!(history.can_redo());
        assert_eq!(history.redo(), Some(&snap("a")));
    }

    #[test]
    fn push_after_undo_scenario() {
        // push A, B, C -> undo -> visible B, redo [C] -> push D -> redo gone.
        let mut history = SnapshotHistory::with_default_capacity(Snapshot::blank());
        history.push(snap("a"));
        history.push(snap("b"));
        history.push(snap("c"));

        assert_eq!(history.undo(), &snap("b"));
        assert!(history.can_redo());

        history.push(snap("d"));
        assert_eq!(history.visible(), &snap("d"));
        assert!(!history.can_redo());
        assert_eq!(history.undo(), &snap("b"));
        assert_eq!(history.undo(), &snap("a"));
    }
}
