use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::file::FileInfo;

/// Attribute rows are ordered by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortAttribute {
    /// Case-insensitive display name, default.
    #[default]
    Name,
    Size,
    SizeOnDisk,
    Type,
    Modified,
    Accessed,
    Keywords,
}

impl SortAttribute {
    /// Parse a symbolic attribute key. Unknown keys fall back to `Name`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "size" => SortAttribute::Size,
            "size_on_disk" | "size-on-disk" => SortAttribute::SizeOnDisk,
            "type" => SortAttribute::Type,
            "modified" | "date_modified" | "date-modified" => SortAttribute::Modified,
            "accessed" | "date_accessed" | "date-accessed" => SortAttribute::Accessed,
            "keywords" | "emblems" => SortAttribute::Keywords,
            _ => SortAttribute::Name,
        }
    }

    /// Symbolic key, the inverse of [`SortAttribute::from_str`].
    pub fn key(&self) -> &'static str {
        match self {
            SortAttribute::Name => "name",
            SortAttribute::Size => "size",
            SortAttribute::SizeOnDisk => "size_on_disk",
            SortAttribute::Type => "type",
            SortAttribute::Modified => "date_modified",
            SortAttribute::Accessed => "date_accessed",
            SortAttribute::Keywords => "keywords",
        }
    }

    /// Column header label.
    pub fn label(&self) -> &'static str {
        match self {
            SortAttribute::Name => "Name",
            SortAttribute::Size => "Size",
            SortAttribute::SizeOnDisk => "Size on Disk",
            SortAttribute::Type => "Type",
            SortAttribute::Modified => "Modified",
            SortAttribute::Accessed => "Accessed",
            SortAttribute::Keywords => "Keywords",
        }
    }

    /// Cycle to the next attribute.
    pub fn next(&self) -> Self {
        match self {
            SortAttribute::Name => SortAttribute::Size,
            SortAttribute::Size => SortAttribute::SizeOnDisk,
            SortAttribute::SizeOnDisk => SortAttribute::Type,
            SortAttribute::Type => SortAttribute::Modified,
            SortAttribute::Modified => SortAttribute::Accessed,
            SortAttribute::Accessed => SortAttribute::Keywords,
            SortAttribute::Keywords => SortAttribute::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn from_descending(descending: bool) -> Self {
        if descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }

    pub fn reverse(&self) -> Self {
        match self {
            SortDirection::Ascending => SortDirection::Descending,
            SortDirection::Descending => SortDirection::Ascending,
        }
    }
}

/// Complete sort state of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub attribute: SortAttribute,
    pub direction: SortDirection,
    pub directories_first: bool,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            attribute: SortAttribute::Name,
            direction: SortDirection::Ascending,
            directories_first: true,
        }
    }
}

impl SortSpec {
    /// Order two rows; `None` is a placeholder.
    ///
    /// Placeholders come before every real row. Then directories first (if
    /// enabled, regardless of direction), then the attribute with the
    /// display name as fallback (reversed when descending), then the file id.
    pub fn compare(&self, a: Option<&FileInfo>, b: Option<&FileInfo>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(a), Some(b)) => self.compare_files(a, b),
        }
    }

    pub fn compare_files(&self, a: &FileInfo, b: &FileInfo) -> Ordering {
        if self.directories_first {
            let dirs = b.is_directory.cmp(&a.is_directory);
            if dirs != Ordering::Equal {
                return dirs;
            }
        }
        let ord = compare_attribute(a, b, self.attribute).then_with(|| compare_names(a, b));
        let ord = match self.direction {
            SortDirection::Ascending => ord,
            SortDirection::Descending => ord.reverse(),
        };
        ord.then_with(|| a.id.cmp(&b.id))
    }
}

fn compare_names(a: &FileInfo, b: &FileInfo) -> Ordering {
    a.name
        .to_lowercase()
        .cmp(&b.name.to_lowercase())
        .then_with(|| a.name.cmp(&b.name))
}

fn compare_attribute(a: &FileInfo, b: &FileInfo, attribute: SortAttribute) -> Ordering {
    match attribute {
        SortAttribute::Name => compare_names(a, b),
        SortAttribute::Size => a.size.cmp(&b.size),
        SortAttribute::SizeOnDisk => a.size_on_disk.cmp(&b.size_on_disk),
        SortAttribute::Type => a.file_type.cmp(&b.file_type),
        SortAttribute::Modified => a.modified.cmp(&b.modified),
        SortAttribute::Accessed => a.accessed.cmp(&b.accessed),
        SortAttribute::Keywords => a.keywords.cmp(&b.keywords),
    }
}
