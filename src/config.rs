//! Job configuration loaded from YAML
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock behaviour.

use crate::error::{MergeError, MergeResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default header pattern: "S/N", "s n", "sno", "serial no", "serial_no", ...
pub const DEFAULT_HEADER_PATTERN: &str = r"^(?:s[\s\\/_-]*n|serial[\s_-]*no)";

/// Maximum sheet name length accepted by Excel
pub const EXCEL_SHEET_NAME_LIMIT: usize = 31;

/// Shortest sheet id limit that still leaves room for collision suffixes
pub const MIN_SHEET_ID_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MergeConfig {
    pub header: HeaderConfig,
    pub sheet_ids: SheetIdConfig,
    pub batch: BatchConfig,
    /// Name of the column that records where each row came from
    pub provenance_column: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            header: HeaderConfig::default(),
            sheet_ids: SheetIdConfig::default(),
            batch: BatchConfig::default(),
            provenance_column: "SourceFile".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderConfig {
    /// Regex tested against each lower-cased, trimmed cell
    pub pattern: String,
    /// How many pruned rows to scan for the header
    pub scan_rows: usize,
    /// Prefix for names synthesized for blank header cells
    pub placeholder_prefix: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_HEADER_PATTERN.to_string(),
            scan_rows: 30,
            placeholder_prefix: "col_".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SheetIdConfig {
    pub max_len: usize,
    pub scope: SheetIdScope,
}

impl Default for SheetIdConfig {
    fn default() -> Self {
        Self {
            max_len: EXCEL_SHEET_NAME_LIMIT,
            scope: SheetIdScope::Batch,
        }
    }
}

/// Which set of names a new sheet id must be unique against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetIdScope {
    /// Unique across the whole run
    #[default]
    Batch,
    /// Unique within each output workbook
    Container,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    pub isolation: Isolation,
}

/// What a failing member takes down with it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Isolation {
    /// Skip the remaining members of the same container
    #[default]
    Container,
    /// Log and carry on with the next member
    Member,
}

impl MergeConfig {
    /// Parse and validate a YAML document
    pub fn from_yaml(content: &str) -> MergeResult<Self> {
        let config: MergeConfig = if content.trim().is_empty() {
            MergeConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a file
    pub fn load(path: &Path) -> MergeResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` if given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> MergeResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> MergeResult<()> {
        if self.header.scan_rows == 0 {
            return Err(MergeError::Config(
                "header.scan_rows must be at least 1".to_string(),
            ));
        }
        if !(MIN_SHEET_ID_LEN..=EXCEL_SHEET_NAME_LIMIT).contains(&self.sheet_ids.max_len) {
            return Err(MergeError::Config(format!(
                "sheet_ids.max_len must be between {} and {}, got {}",
                MIN_SHEET_ID_LEN, EXCEL_SHEET_NAME_LIMIT, self.sheet_ids.max_len
            )));
        }
        if self.provenance_column.trim().is_empty() {
            return Err(MergeError::Config(
                "provenance_column must not be blank".to_string(),
            ));
        }
        self.header_regex()?;
        Ok(())
    }

    /// Compile the configured header pattern
    pub fn header_regex(&self) -> MergeResult<Regex> {
        Regex::new(&self.header.pattern).map_err(|e| {
            MergeError::Config(format!(
                "Invalid header pattern '{}': {}",
                self.header.pattern, e
            ))
        })
    }
}
