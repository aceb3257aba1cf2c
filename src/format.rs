//! Plain-text rendering helpers for the `fm-list` tree output.

use crate::model::FileInfo;

/// Human-readable byte count with binary units.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;
    const TB: u64 = 1024 * GB;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One line of the printed tree: indentation, label, then the size for
/// regular files. Directories get a trailing `/`.
pub fn tree_line(depth: usize, label: &str, file: Option<&FileInfo>) -> String {
    let indent = "  ".repeat(depth);
    match file {
        Some(file) if file.is_directory => format!("{}{}/", indent, label),
        Some(file) => match file.size {
            Some(size) => format!("{}{}  ({})", indent, label, format_size(size)),
            None => format!("{}{}", indent, label),
        },
        None => format!("{}{}", indent, label),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileId;

    #[test]
    fn format_size_bytes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
    }

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024 * 1024), "1.00 TB");
    }

    #[test]
    fn tree_line_marks_directories() {
        let dir = FileInfo::directory(FileId(1), "src");
        assert_eq!(tree_line(1, "src", Some(&dir)), "  src/");
    }

    #[test]
    fn tree_line_shows_file_size() {
        let file = FileInfo::file(FileId(2), "a.txt").with_size(1536);
        assert_eq!(tree_line(0, "a.txt", Some(&file)), "a.txt  (1.50 KB)");
    }

    #[test]
    fn tree_line_placeholder() {
        assert_eq!(tree_line(2, "(Empty)", None), "    (Empty)");
    }
}
