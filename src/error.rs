use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelensError {
    #[error("API request failed with status {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("API request failed after {retries} retries (last status {status})")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Pipeline definition not found: {0}")]
    DefinitionNotFound(u32),

    #[error("Build not found: {0}")]
    BuildNotFound(u64),

    #[error("Timeline not available for build {0}")]
    TimelineUnavailable(u64),

    #[error("Job not found in timeline: {0}")]
    JobNotFound(String),

    #[error("Push delivery failed: {0}")]
    Hub(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelensError {
    /// Whether this error is the shutdown signal rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, PipelensError>;
