use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Stable identity of a domain file, independent of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

/// Snapshot of a domain file's attributes, as the model sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub id: FileId,
    /// Display name.
    pub name: String,
    pub path: PathBuf,
    pub is_directory: bool,
    pub size: Option<u64>,
    pub size_on_disk: Option<u64>,
    /// Type key used for "type" sorting (`"directory"` or the lowercase
    /// extension).
    pub file_type: Option<String>,
    pub modified: Option<SystemTime>,
    pub accessed: Option<SystemTime>,
    pub keywords: Vec<String>,
    pub is_hidden: bool,
}

impl FileInfo {
    /// A regular file with only a name.
    pub fn file(id: FileId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            path: PathBuf::from(&name),
            file_type: extension_type(&name),
            is_hidden: name.starts_with('.'),
            name,
            is_directory: false,
            size: None,
            size_on_disk: None,
            modified: None,
            accessed: None,
            keywords: Vec::new(),
        }
    }

    /// A directory with only a name.
    pub fn directory(id: FileId, name: impl Into<String>) -> Self {
        Self {
            is_directory: true,
            file_type: Some("directory".to_string()),
            ..Self::file(id, name)
        }
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_modified(mut self, modified: SystemTime) -> Self {
        self.modified = Some(modified);
        self
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Rename, keeping the identity.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self.is_hidden = self.name.starts_with('.');
        if !self.is_directory {
            self.file_type = extension_type(&self.name);
        }
        self
    }

    /// Read a file's attributes from the filesystem.
    ///
    /// Symlinks are reported as non-directories.
    pub fn from_path(path: &Path, id: FileId) -> Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        let is_directory = metadata.is_dir();
        let file_type = if is_directory {
            Some("directory".to_string())
        } else {
            extension_type(&name)
        };

        Ok(Self {
            id,
            is_hidden: name.starts_with('.'),
            name,
            path: path.to_path_buf(),
            is_directory,
            size: Some(metadata.len()),
            size_on_disk: size_on_disk(&metadata),
            file_type,
            modified: metadata.modified().ok(),
            accessed: metadata.accessed().ok(),
            keywords: Vec::new(),
        })
    }
}

fn extension_type(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

#[cfg(unix)]
fn size_on_disk(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.blocks() * 512)
}

#[cfg(not(unix))]
fn size_on_disk(_metadata: &fs::Metadata) -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    #[test]
    fn from_path_reads_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.TXT");
        fs::write(&path, "hello").unwrap();
        let info = FileInfo::from_path(&path, FileId(7)).unwrap();
        assert_eq!(info.id, FileId(7));
        assert_eq!(info.name, "notes.TXT");
        assert!(!info.is_directory);
        assert_eq!(info.size, Some(5));
        assert_eq!(info.file_type.as_deref(), Some("txt"));
        assert!(info.modified.is_some());
    }

    #[test]
    fn from_path_reads_directory() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("alpha")).unwrap();
        let info = FileInfo::from_path(&dir.path().join("alpha"), FileId(1)).unwrap();
        assert!(info.is_directory);
        assert_eq!(info.file_type.as_deref(), Some("directory"));
    }

    #[test]
    fn from_path_marks_hidden() {
        let dir = TempDir::new().unwrap();
        File::create(dir.path().join(".hidden")).unwrap();
        let info = FileInfo::from_path(&dir.path().join(".hidden"), FileId(2)).unwrap();
        assert!(info.is_hidden);
    }

    #[test]
    fn from_path_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(FileInfo::from_path(&dir.path().join("nope"), FileId(3)).is_err());
    }

    #[test]
    fn renamed_keeps_identity_and_updates_type() {
        let info = FileInfo::file(FileId(4), "a.txt").renamed("z.md");
        assert_eq!(info.id, FileId(4));
        assert_eq!(info.name, "z.md");
        assert_eq!(info.file_type.as_deref(), Some("md"));
    }
}
