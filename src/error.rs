use std::sync::Arc;

use thiserror::Error;

/// Failure of a model, spec or texture load.
///
/// Cloneable so a single failed load can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("invalid json in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("malformed model data in {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("io worker pool shut down before {0} finished loading")]
    WorkerGone(String),
}
impl LoadError {
    pub fn io(path: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_string())
        } else {
            LoadError::Io {
                path: path.to_string(),
                source: Arc::new(err),
            }
        }
    }

    pub fn json(path: &str, err: serde_json::Error) -> Self {
        LoadError::Json {
            path: path.to_string(),
            source: Arc::new(err),
        }
    }

    pub fn malformed(path: &str, reason: impl Into<String>) -> Self {
        LoadError::Malformed {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnimationError {
    #[error("sequence {index} does not exist ({count} sequences)")]
    UnknownSequence { index: usize, count: usize },
}
