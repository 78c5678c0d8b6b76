//! Shared utilities for CLI commands.

use std::path::Path;
use std::sync::LazyLock;

use chrono::{Datelike, Local};
use regex::Regex;

/// Pre-compiled regex for year directory names.
static YEAR_DIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").unwrap());

/// Returns the year a source log belongs to.
///
/// Source logs only carry `MMDD`, so the year comes from the nearest
/// ancestor directory named `YYYY`, falling back to the current local year.
pub fn year_from_path(path: &Path) -> i32 {
    path.parent()
        .into_iter()
        .flat_map(Path::ancestors)
        .filter_map(|dir| dir.file_name()?.to_str())
        .find(|name| YEAR_DIR_RE.is_match(name))
        .and_then(|name| name.parse().ok())
        .unwrap_or_else(|| Local::now().year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_from_parent_directory() {
        assert_eq!(year_from_path(Path::new("/logs/2023/jan.txt")), 2023);
    }

    #[test]
    fn test_year_from_nearest_ancestor() {
        assert_eq!(year_from_path(Path::new("/logs/2023/q1/jan.txt")), 2023);
        assert_eq!(year_from_path(Path::new("/2021/2022/jan.txt")), 2022);
    }

    #[test]
    fn test_year_falls_back_to_current() {
        let current = Local::now().year();
        assert_eq!(year_from_path(Path::new("/logs/jan.txt")), current);
        assert_eq!(year_from_path(Path::new("/logs/20231/jan.txt")), current);
        assert_eq!(year_from_path(Path::new("jan.txt")), current);
    }

    #[test]
    fn test_file_name_is_not_a_year_directory() {
        let current = Local::now().year();
        assert_eq!(year_from_path(Path::new("/logs/2024")), current);
    }
}
