use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Authentication failed: {0}")]
    Auth(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("GitLab API error ({status}) for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Project {project} has no branch '{branch}'")]
    BranchNotFound { project: String, branch: String },
    #[error("Checkpoint file {} is corrupted: {source}", .path.display())]
    CheckpointCorrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Invalid date: {0}")]
    InvalidDate(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl StatsError {
    /// True for failures that mean the credential was rejected.
    pub fn is_auth(&self) -> bool {
        matches!(self, StatsError::Auth(_))
    }
}
