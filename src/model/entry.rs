use std::collections::HashMap;

use indextree::NodeId;

use super::file::{FileId, FileInfo};
use super::handle::DirectoryHandle;
use super::sequence::{Cursor, Sequence};

/// Arena id of an [`Entry`].
pub type EntryId = NodeId;

/// One row of the model: a real file or a placeholder.
#[derive(Debug)]
pub(crate) struct Entry {
    /// `None` for a placeholder row.
    pub(crate) file: Option<FileInfo>,
    /// Slot in the parent level's sequence; `None` only while being linked.
    pub(crate) cursor: Option<Cursor>,
    /// Child rows, present for directory entries.
    pub(crate) children: Option<Level>,
    /// The directory finished enumerating or produced a real child.
    pub(crate) loaded: bool,
}

impl Entry {
    pub(crate) fn new(file: FileInfo) -> Self {
        Self {
            file: Some(file),
            cursor: None,
            children: None,
            loaded: false,
        }
    }

    pub(crate) fn placeholder() -> Self {
        Self {
            file: None,
            cursor: None,
            children: None,
            loaded: false,
        }
    }

    pub(crate) fn is_placeholder(&self) -> bool {
        self.file.is_none()
    }

    pub(crate) fn file_id(&self) -> Option<FileId> {
        self.file.as_ref().map(|f| f.id)
    }

    pub(crate) fn is_directory(&self) -> bool {
        self.file.as_ref().is_some_and(|f| f.is_directory)
    }
}

/// A sibling group: ordered rows plus the reverse map from file to row.
#[derive(Debug, Default)]
pub(crate) struct Level {
    pub(crate) rows: Sequence<EntryId>,
    pub(crate) reverse: HashMap<FileId, EntryId>,
    /// Set while the directory is open and subscribed to watch events.
    pub(crate) handle: Option<DirectoryHandle>,
}

impl Level {
    pub(crate) fn open(handle: DirectoryHandle) -> Self {
        Self {
            handle: Some(handle),
            ..Self::default()
        }
    }

    pub(crate) fn lookup(&self, file: FileId) -> Option<EntryId> {
        self.reverse.get(&file).copied()
    }

    pub(crate) fn first(&self) -> Option<EntryId> {
        self.rows.at(0).copied()
    }
}
