use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the execution engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn process: {0}")]
    Spawn(String),

    #[error("Working directory not found: {}", .0.display())]
    WorkingDirectoryNotFound(PathBuf),

    #[error("Command timed out after {0} seconds")]
    Timeout(u64),

    #[error("Dependency check failed: {0}")]
    DependencyCheck(String),

    #[error("Interactive session error: {0}")]
    InteractiveSession(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("An action is already in progress: {0}")]
    ActionInFlight(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        EngineError::Network(err.to_string())
    }
}
