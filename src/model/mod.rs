//! The hierarchical sorted file-list model and its building blocks.

mod entry;
pub mod file;
pub mod handle;
mod highlight;
pub mod list;
pub mod notify;
pub mod policy;
pub mod sequence;
pub mod sort;

pub use entry::EntryId;
pub use file::{FileId, FileInfo};
pub use handle::{DirectoryHandle, RowHandle, TreePath};
pub use highlight::DragView;
pub use list::{FlatRow, ListModel, EMPTY_LABEL, LOADING_LABEL};
pub use notify::{Notification, RowChange, ViewAdapter};
pub use policy::DeferredUnload;
pub use sequence::{Cursor, Sequence};
pub use sort::{SortAttribute, SortDirection, SortSpec};
