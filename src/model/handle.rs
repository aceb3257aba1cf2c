use std::fmt;

use serde::Serialize;

use super::entry::EntryId;

/// Sequence of sibling indices from the top level down to a row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TreePath(Vec<usize>);

impl TreePath {
    /// The empty path, naming the (invisible) root above the top level.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, index: usize) {
        self.0.push(index);
    }

    /// Path extended by one child index.
    pub fn child(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.push(index);
        path
    }

    /// Path of the enclosing row, `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.0.split_last()?;
        Some(Self(rest.to_vec()))
    }
}

impl From<Vec<usize>> for TreePath {
    fn from(indices: Vec<usize>) -> Self {
        Self(indices)
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, index) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Position handle: a row reference that is only honoured while the model's
/// generation still equals `stamp`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowHandle {
    pub(crate) stamp: u64,
    pub(crate) entry: EntryId,
}

impl RowHandle {
    /// Generation this handle was issued in.
    pub fn stamp(&self) -> u64 {
        self.stamp
    }
}

/// Token correlating directory-watch events with the level they feed.
///
/// [`DirectoryHandle::ROOT`] names the top level. Every
/// `load_subdirectory` call hands out a fresh value, so events addressed to a
/// directory that was collapsed (and maybe re-expanded) since are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DirectoryHandle(pub(crate) u64);

impl DirectoryHandle {
    pub const ROOT: DirectoryHandle = DirectoryHandle(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for DirectoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dir#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_path_display_uses_colons() {
        assert_eq!(TreePath::from(vec![1, 0, 4]).to_string(), "1:0:4");
        assert_eq!(TreePath::new().to_string(), "");
    }

    #[test]
    fn tree_path_parent_and_child() {
        let path = TreePath::from(vec![2, 3]);
        assert_eq!(path.parent(), Some(TreePath::from(vec![2])));
        assert_eq!(path.child(7).indices(), &[2, 3, 7]);
        assert_eq!(TreePath::new().parent(), None);
        assert!(TreePath::new().is_root());
    }

    #[test]
    fn root_handle_is_root() {
        assert!(DirectoryHandle::ROOT.is_root());
        assert!(!DirectoryHandle(3).is_root());
    }
}
