//! Sheet identifiers derived from source file names

use crate::config::{EXCEL_SHEET_NAME_LIMIT, MIN_SHEET_ID_LEN};
use crate::types::file_stem;
use std::collections::HashSet;

const FALLBACK_ID: &str = "sheet";

/// Names Excel refuses as worksheet names (compared lower-cased)
const RESERVED_IDS: [&str; 1] = ["history"];

/// Derive a sheet id from a file name: path and extension stripped, every
/// character outside `[A-Za-z0-9_]` replaced by `_`, cut to 31 characters.
pub fn normalize(filename: &str) -> String {
    normalize_with_limit(filename, EXCEL_SHEET_NAME_LIMIT)
}

pub fn normalize_with_limit(filename: &str, max_len: usize) -> String {
    let mut id: String = file_stem(filename)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    // Only ASCII remains, so byte truncation is char truncation
    id.truncate(max_len);
    if id.is_empty() {
        let mut fallback = FALLBACK_ID.to_string();
        fallback.truncate(max_len);
        return fallback;
    }
    id
}

/// Hands out unique sheet ids for one batch
///
/// Ids are compared case-insensitively because spreadsheet applications
/// reject sheet names that differ only in case.
#[derive(Debug, Clone)]
pub struct SheetIdAllocator {
    used: HashSet<String>,
    max_len: usize,
}

impl Default for SheetIdAllocator {
    fn default() -> Self {
        Self::new(EXCEL_SHEET_NAME_LIMIT)
    }
}

/// Result of an allocation; `reused_base` is set when a suffix was needed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub id: String,
    pub reused_base: Option<String>,
}

impl SheetIdAllocator {
    pub fn new(max_len: usize) -> Self {
        Self {
            used: HashSet::new(),
            max_len: max_len.clamp(MIN_SHEET_ID_LEN, EXCEL_SHEET_NAME_LIMIT),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        let lowered = id.to_ascii_lowercase();
        self.used.contains(&lowered) || RESERVED_IDS.contains(&lowered.as_str())
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// Allocate and register an id for `filename`
    pub fn allocate(&mut self, filename: &str) -> String {
        self.allocate_detailed(filename).id
    }

    /// Like [`allocate`](Self::allocate), also reporting a base-name collision
    ///
    /// On collision the first unused `_1`, `_2`, ... suffix is appended, with
    /// the base truncated first so the result stays within the length limit.
    pub fn allocate_detailed(&mut self, filename: &str) -> Allocation {
        let base = normalize_with_limit(filename, self.max_len);
        if !self.contains(&base) {
            self.register(&base);
            return Allocation {
                id: base,
                reused_base: None,
            };
        }

        let mut counter: usize = 1;
        loop {
            let suffix = format!("_{}", counter);
            let keep = self.max_len.saturating_sub(suffix.len());
            let candidate = format!("{}{}", &base[..base.len().min(keep)], suffix);
            if candidate.len() <= self.max_len && !self.contains(&candidate) {
                self.register(&candidate);
                return Allocation {
                    id: candidate,
                    reused_base: Some(base),
                };
            }
            counter += 1;
        }
    }

    fn register(&mut self, id: &str) {
        self.used.insert(id.to_ascii_lowercase());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid(id: &str) -> bool {
        id.len() <= 31 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    #[test]
    fn test_normalize_strips_path_and_extension() {
        assert_eq!(normalize("reports/2024/Sales Q1.xlsx"), "Sales_Q1");
        assert_eq!(normalize("C:\\data\\meter-readings.csv"), "meter_readings");
        assert_eq!(normalize("plain"), "plain");
    }

    #[test]
    fn test_reserved_name_gets_suffix() {
        let mut alloc = SheetIdAllocator::default();
        assert_eq!(alloc.allocate("History.csv"), "History_1");
    }

    #[test]
    fn test_normalize_replaces_non_ascii() {
        assert_eq!(normalize("café (2).csv"), "caf___2_");
    }

    #[test]
    fn test_normalize_truncates() {
        let long = format!("{}.csv", "a".repeat(50));
        assert_eq!(normalize(&long).len(), 31);
    }

    #[test]
    fn test_normalize_never_empty() {
        assert_eq!(normalize(""), "sheet");
        assert_eq!(normalize("dir/"), "sheet");
    }

    #[test]
    fn test_allocate_suffixes_duplicates() {
        let mut ids = SheetIdAllocator::default();
        assert_eq!(ids.allocate("a.csv"), "a");
        assert_eq!(ids.allocate("x/a.xlsx"), "a_1");
        assert_eq!(ids.allocate("a.xls"), "a_2");
        assert_eq!(ids.allocate("b.csv"), "b");
        assert_eq!(ids.len(), 4);
    }

    #[test]
    fn test_allocate_reports_reused_base() {
        let mut ids = SheetIdAllocator::default();
        assert_eq!(ids.allocate_detailed("a.csv").reused_base, None);
        let second = ids.allocate_detailed("a.csv");
        assert_eq!(second.id, "a_1");
        assert_eq!(second.reused_base, Some("a".to_string()));
    }

    #[test]
    fn test_allocate_truncates_base_before_suffix() {
        let mut ids = SheetIdAllocator::default();
        let name = format!("{}.csv", "x".repeat(40));
        let first = ids.allocate(&name);
        let second = ids.allocate(&name);
        assert_eq!(first.len(), 31);
        assert_eq!(second.len(), 31);
        assert!(second.ends_with("_1"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_allocate_case_insensitive() {
        let mut ids = SheetIdAllocator::default();
        assert_eq!(ids.allocate("Data.csv"), "Data");
        assert_eq!(ids.allocate("data.csv"), "data_1");
    }

    #[test]
    fn test_allocate_many_collisions_stay_valid() {
        let mut ids = SheetIdAllocator::default();
        let name = format!("{}.csv", "long_report_name_".repeat(3));
        let mut seen = HashSet::new();
        for _ in 0..120 {
            let id = ids.allocate(&name);
            assert!(is_valid(&id), "invalid id {id}");
            assert!(seen.insert(id.to_ascii_lowercase()));
        }
    }

    #[test]
    fn test_small_limit() {
        let mut ids = SheetIdAllocator::new(8);
        assert_eq!(ids.allocate("abcdefghij.csv"), "abcdefgh");
        assert_eq!(ids.allocate("abcdefghij.csv"), "abcdef_1");
        assert_eq!(ids.allocate("abcdefghij.csv"), "abcdef_2");
    }

    #[test]
    fn test_limit_is_clamped() {
        let mut ids = SheetIdAllocator::new(2);
        assert_eq!(ids.allocate("abcdefghij.csv"), "abcdefgh");
    }
}
