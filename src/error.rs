use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReqsmithError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read manifest {}: {message}", .path.display())]
    Manifest { path: PathBuf, message: String },

    #[error("Requirement include cycle detected at {}", .0.display())]
    IncludeCycle(PathBuf),

    #[error("Python interpreter not found in PATH (tried: {0})")]
    InterpreterNotFound(String),

    /// The operator declined to continue outside an isolated environment.
    #[error("Aborting installation. Activate a virtual environment and run reqsmith again.")]
    NotIsolated,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dialog error: {0}")]
    Dialog(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ReqsmithError {
    pub fn manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReqsmithError>;
