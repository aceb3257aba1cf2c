//! Change notifications a view replays to mirror the model.

use serde::Serialize;
use tokio::sync::mpsc;

use super::handle::{DirectoryHandle, TreePath};

/// One structural change. Paths are valid for the generation carried by the
/// enclosing [`Notification`], at the moment it is emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowChange {
    RowInserted {
        path: TreePath,
    },
    RowDeleted {
        path: TreePath,
    },
    RowChanged {
        path: TreePath,
    },
    RowHasChildToggled {
        path: TreePath,
    },
    /// `new_order[new_index] == old_index` for the children of `parent`.
    RowsReordered {
        parent: TreePath,
        new_order: Vec<usize>,
    },
    /// The directory was collapsed or removed; stop watching it.
    SubdirectoryUnloaded {
        directory: DirectoryHandle,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Model generation in effect when the change was emitted.
    pub stamp: u64,
    #[serde(flatten)]
    pub change: RowChange,
}

/// Receiver of model notifications, called synchronously on every change.
pub trait ViewAdapter {
    fn notify(&mut self, notification: &Notification);
}

impl ViewAdapter for mpsc::UnboundedSender<Notification> {
    fn notify(&mut self, notification: &Notification) {
        if self.send(notification.clone()).is_err() {
            log::debug!("view adapter channel closed, dropping {:?}", notification.change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_serialize_flat() {
        let n = Notification {
            stamp: 3,
            change: RowChange::RowsReordered {
                parent: TreePath::from(vec![1]),
                new_order: vec![1, 0],
            },
        };
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(
            json,
            r#"{"stamp":3,"kind":"rows_reordered","parent":[1],"new_order":[1,0]}"#
        );
    }

    #[test]
    fn unloaded_serializes_handle() {
        let n = Notification {
            stamp: 0,
            change: RowChange::SubdirectoryUnloaded {
                directory: DirectoryHandle(4),
            },
        };
        let json = serde_json::to_string(&n).unwrap();
        assert_eq!(json, r#"{"stamp":0,"kind":"subdirectory_unloaded","directory":4}"#);
    }

    #[test]
    fn sender_forwards_notifications() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        let n = Notification {
            stamp: 1,
            change: RowChange::RowChanged {
                path: TreePath::from(vec![0]),
            },
        };
        tx.notify(&n);
        assert_eq!(rx.try_recv().unwrap(), n);
    }
}
