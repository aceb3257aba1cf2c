//! Hierarchical sorted file-list model backing a file manager's list view,
//! plus a small driver that feeds it from a real directory tree.

pub mod app;
pub mod config;
pub mod error;
pub mod event;
pub mod format;
pub mod fs;
pub mod model;
