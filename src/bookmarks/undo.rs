use super::Bookmark;

/// Snapshot of a deleted bookmark and where it sat in the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedEntry {
    pub bookmark: Bookmark,
    pub original_index: usize,
}

/// LIFO stack of deletions for the active video session. Unbounded for the
/// session's lifetime; cleared whenever the video identity changes.
#[derive(Debug, Default)]
pub struct UndoStack {
    entries: Vec<DeletedEntry>,
}

impl UndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bookmark: Bookmark, original_index: usize) {
        self.entries.push(DeletedEntry {
            bookmark,
            original_index,
        });
    }

    /// Removes and returns the most recent deletion; `None` means there is
    /// nothing to undo.
    pub fn pop(&mut self) -> Option<DeletedEntry> {
        self.entries.pop()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
