use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Malformed script `{id}`: expected <elem> or <table> children")]
    MalformedScript { id: String },

    #[error("Report file not found (\"{}\")", .0.display())]
    ReportNotFound(PathBuf),

    #[error("Unable to find executable `{0}`")]
    ExecutableNotFound(String),

    #[error("`{0}` is not executable")]
    NotExecutable(String),

    #[error("Failed to execute \"{command}\"\n{stderr}")]
    ProcessFailed { command: String, stderr: String },

    #[error("Timeout occurred during {operation}")]
    Timeout { operation: String },

    #[error("Schema validator `{0}` not found")]
    ValidatorNotFound(String),

    #[error("No schema available to validate against")]
    SchemaUnavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Reporting error: {0}")]
    Reporting(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ScanError {
    /// Errors caused by the environment rather than by the report itself.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            ScanError::ExecutableNotFound(_)
                | ScanError::NotExecutable(_)
                | ScanError::ValidatorNotFound(_)
                | ScanError::Config(_)
        )
    }
}
