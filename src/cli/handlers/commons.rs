// src/cli/handlers/commons.rs

// Shared state and helpers for the command handlers.

use crate::core::catalog::Catalog;
use crate::core::paths::Settings;
use std::path::Path;
use walkdir::WalkDir;

/// Loaded once by the binary and handed to every handler.
#[derive(Debug)]
pub struct AppContext {
    pub settings: Settings,
    pub catalog: Catalog,
    pub debug: bool,
}

const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with binary multiples, e.g. `1.50 MB`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let label = SIZE_UNITS.get(unit).copied().unwrap_or("B");
    format!("{:.2} {}", size, label)
}

/// Total size of the regular files below `path`. Unreadable entries are skipped.
pub fn directory_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 B");
        assert_eq!(format_size(1023), "1023.00 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_directory_size_is_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("a/b")).unwrap();
        fs::write(dir.path().join("top"), [0u8; 10]).unwrap();
        fs::write(dir.path().join("a/b/deep"), [0u8; 32]).unwrap();
        assert_eq!(directory_size(dir.path()), 42);
        assert_eq!(directory_size(&dir.path().join("missing")), 0);
    }
}
