// src/error.rs

use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

/// Everything the import pipeline can surface to a user.
///
/// Parsing and validation errors are shown inline by the caller; remote
/// errors are already flattened to strings at the fetch boundary so no raw
/// transport error escapes the library.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("the file is empty or contains no header row")]
    EmptyInput,

    #[error("missing required column `{field}`")]
    MissingColumn { field: String },

    #[error("could not read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    #[error("no parsed rows to import")]
    NothingToImport,

    #[error("invalid import request: {0}")]
    InvalidRequest(String),

    #[error("no job id returned")]
    NoJobId,

    #[error("import submission failed: {0}")]
    Submit(String),

    #[error("failed to poll import job: {0}")]
    Poll(String),

    #[error("api request failed: {0}")]
    Api(String),

    #[error("local store error: {0}")]
    Store(String),
}

pub type ImportResult<T> = std::result::Result<T, ImportError>;
