use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cannot read container `{container}`: {message}")]
    ContainerUnreadable { container: String, message: String },

    #[error("Unsupported file format: {0} (expected .csv, .xls or .xlsx)")]
    UnsupportedFormat(String),

    #[error("Failed to decode `{member}`: {message}")]
    Decode { member: String, message: String },

    #[error("No header row found in the first {scanned} rows")]
    HeaderNotFound { scanned: usize },

    #[error("No data rows found below detected header (header at row {header_row})")]
    NoDataRows { header_row: usize },

    #[error("Schema mismatch in `{source_name}`: expected columns [{}], found [{}]", expected.join(", "), found.join(", "))]
    SchemaMismatch {
        source_name: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Join key `{key}` missing from `{source_name}`")]
    JoinKeyMissing { key: String, source_name: String },

    #[error("Column `{column}` missing from `{source_name}`")]
    ColumnMissing { column: String, source_name: String },

    #[error("Export error: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<csv::Error> for MergeError {
    fn from(err: csv::Error) -> Self {
        MergeError::Decode {
            member: "csv".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<calamine::Error> for MergeError {
    fn from(err: calamine::Error) -> Self {
        MergeError::Decode {
            member: "workbook".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for MergeError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        MergeError::Export(err.to_string())
    }
}

impl From<zip::result::ZipError> for MergeError {
    fn from(err: zip::result::ZipError) -> Self {
        MergeError::Export(format!("ZIP bundle: {}", err))
    }
}

impl MergeError {
    /// Attach the offending member name to a decode error raised by a parser
    pub fn in_member(self, member: &str) -> Self {
        match self {
            MergeError::Decode { message, .. } => MergeError::Decode {
                member: member.to_string(),
                message,
            },
            other => other,
        }
    }
}
