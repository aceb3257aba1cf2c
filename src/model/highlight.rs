use std::collections::HashSet;

use super::file::FileId;

/// Drag source hint: the view a drag started in and where.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragView {
    pub view: u64,
    pub x: f64,
    pub y: f64,
}

/// Files drawn highlighted (drop targets) and the active drag source.
#[derive(Debug, Default)]
pub(crate) struct HighlightState {
    files: HashSet<FileId>,
    drag: Option<DragView>,
}

impl HighlightState {
    /// Replace the highlighted set, returning the files whose state flipped
    /// in ascending id order.
    pub(crate) fn replace(&mut self, files: &[FileId]) -> Vec<FileId> {
        let next: HashSet<FileId> = files.iter().copied().collect();
        let mut flipped: Vec<FileId> = self.files.symmetric_difference(&next).copied().collect();
        flipped.sort();
        self.files = next;
        flipped
    }

    pub(crate) fn contains(&self, file: FileId) -> bool {
        self.files.contains(&file)
    }

    pub(crate) fn files(&self) -> Vec<FileId> {
        let mut files: Vec<FileId> = self.files.iter().copied().collect();
        files.sort();
        files
    }

    pub(crate) fn drag(&self) -> Option<DragView> {
        self.drag
    }

    pub(crate) fn set_drag(&mut self, drag: Option<DragView>) {
        self.drag = drag;
    }
}
