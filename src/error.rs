// src/error.rs
//
// Storage failures are recovered inside the store and only logged; the
// remaining variants surface to callers that misuse a session or feed the
// engine invalid input.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage quota exceeded: snapshot needs {needed} bytes, limit is {limit}")]
    QuotaExceeded { needed: usize, limit: usize },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    pub fn is_quota(&self) -> bool {
        matches!(self, StorageError::QuotaExceeded { .. })
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Import rejected: {0}")]
    InvalidImport(#[source] serde_json::Error),

    #[error("Export failed: {0}")]
    Export(#[source] serde_json::Error),

    #[error("Import rejected: state must be a JSON object")]
    NotAnObject,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("No review session is active")]
    NoActiveSession,

    #[error("Card {0} is not part of the active session")]
    CardNotInSession(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum QuizError {
    #[error("No quiz is active; generate one before submitting answers")]
    NoActiveQuiz,

    #[error("Question {0} is not part of the active quiz")]
    UnknownQuestion(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
