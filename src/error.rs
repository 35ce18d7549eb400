// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Error types for Sortwise

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for Sortwise operations
pub type Result<T> = std::result::Result<T, SortwiseError>;

/// Sortwise error types
#[derive(Error, Debug)]
pub enum SortwiseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("API error: {0}")]
    Api(#[from] reqwest::Error),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Ollama not available: {0}")]
    OllamaUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl From<zip::result::ZipError> for SortwiseError {
    fn from(e: zip::result::ZipError) -> Self {
        SortwiseError::Archive(e.to_string())
    }
}

/// Coarse error taxonomy reported in run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unreadable or unwritable file; the file is skipped.
    Io,
    /// Corrupt or unsupported archive; the source is left intact.
    Archive,
    /// Classifier timeout or invalid answer; the fallback category is used.
    Classifier,
    /// Invalid settings; the run never starts.
    Configuration,
}

impl SortwiseError {
    /// Map this error onto the summary taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SortwiseError::Config(_) | SortwiseError::Pattern(_) => ErrorKind::Configuration,
            SortwiseError::Archive(_) => ErrorKind::Archive,
            SortwiseError::Api(_)
            | SortwiseError::OllamaUnavailable(_)
            | SortwiseError::Classifier(_) => ErrorKind::Classifier,
            SortwiseError::FileSystem(_)
            | SortwiseError::Watch(_)
            | SortwiseError::Database(_)
            | SortwiseError::Json(_)
            | SortwiseError::LockPoisoned(_) => ErrorKind::Io,
        }
    }

    /// True when the error must stop the run before any file is touched.
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Io => "io",
            ErrorKind::Archive => "archive",
            ErrorKind::Classifier => "classifier",
            ErrorKind::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let io = SortwiseError::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::Io);
        assert!(!io.is_fatal());

        assert_eq!(SortwiseError::Archive("bad".into()).kind(), ErrorKind::Archive);
        assert_eq!(SortwiseError::Classifier("timeout".into()).kind(), ErrorKind::Classifier);
        assert!(SortwiseError::Config("nope".into()).is_fatal());

        let poisoned = SortwiseError::LockPoisoned("fingerprint index");
        assert_eq!(poisoned.kind(), ErrorKind::Io);
        assert!(!poisoned.is_fatal());
    }
}
