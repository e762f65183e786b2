// ⚠️ Error taxonomy
// Every failure the core surfaces to a caller, grouped by what the caller can do about it

use thiserror::Error;

/// Library-wide error type
#[derive(Error, Debug)]
pub enum FinboardError {
    /// Malformed upload (bad date, bad amount, missing column)
    #[error("Failed to parse {source_name}{}: {reason}", line_suffix(.line))]
    Parse {
        source_name: String,
        line: Option<usize>,
        reason: String,
    },

    /// Normalizer called without any upload
    #[error("No valid CSV files were uploaded")]
    NoUploads,

    /// Requested batch / table / category / row does not exist
    #[error("{entity} not found: {identifier}")]
    NotFound {
        entity: &'static str,
        identifier: String,
    },

    /// add-category on an existing name
    #[error("Category {0} already exists")]
    DuplicateCategory(String),

    /// Rejected input (blank names, reserved category, unknown payer)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Relational store unreachable or corrupt
    #[error("Store error: {0}")]
    Store(String),

    /// File system errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(String),
}

fn line_suffix(line: &Option<usize>) -> String {
    match line {
        Some(n) => format!(" (line {})", n),
        None => String::new(),
    }
}

impl FinboardError {
    pub fn parse(source_name: impl Into<String>, line: Option<usize>, reason: impl Into<String>) -> Self {
        FinboardError::Parse {
            source_name: source_name.into(),
            line,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, identifier: impl Into<String>) -> Self {
        FinboardError::NotFound {
            entity,
            identifier: identifier.into(),
        }
    }

    /// True for NotFound errors (used by the presentation layers to pick a status)
    pub fn is_not_found(&self) -> bool {
        matches!(self, FinboardError::NotFound { .. })
    }

    /// True for errors caused by user input rather than storage
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            FinboardError::Parse { .. }
                | FinboardError::NoUploads
                | FinboardError::DuplicateCategory(_)
                | FinboardError::Validation(_)
        )
    }
}

impl From<rusqlite::Error> for FinboardError {
    fn from(err: rusqlite::Error) -> Self {
        FinboardError::Store(err.to_string())
    }
}

impl From<std::io::Error> for FinboardError {
    fn from(err: std::io::Error) -> Self {
        FinboardError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FinboardError {
    fn from(err: serde_json::Error) -> Self {
        FinboardError::Json(err.to_string())
    }
}

/// Result alias for library operations
pub type FinboardResult<T> = Result<T, FinboardError>;
