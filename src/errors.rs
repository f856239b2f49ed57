// Error types, one enum per pipeline layer

use thiserror::Error;

/// Errors from the stream catalog (inspection via the extraction tool).
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("Network timeout: the video source is not responding")]
    NetworkTimeout,

    #[error("The video source is throttling or blocking requests from this address")]
    Blocked,

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl CatalogError {
    /// Map raw tool stderr onto an error variant.
    pub fn classify(s: &str) -> Self {
        if s.contains("timeout") || s.contains("timed out") {
            return Self::NetworkTimeout;
        }
        if s.contains("429") || s.contains("bot") || s.contains("blocked") || s.contains("403") {
            return Self::Blocked;
        }
        if s.contains("not found") || s.contains("No such file") || s.contains("command not found")
        {
            return Self::ToolNotFound(s.to_string());
        }
        if s.contains("Invalid URL") || s.contains("Unsupported URL") {
            return Self::InvalidUrl(s.to_string());
        }
        if s.contains("parse") || s.contains("JSON") {
            return Self::ParseError(s.to_string());
        }
        Self::Unknown(s.to_string())
    }
}

/// Errors from stream selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    #[error("No usable stream available for this video")]
    NoStreamAvailable,
}

/// Errors from fetching chosen streams to disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Disk error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server rejected the media URL: {0}")]
    BadStatus(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("Download task failed: {0}")]
    TaskFailed(String),
}

/// Errors from the merge/encode stage.
#[derive(Debug, Clone, Error)]
pub enum EncodeError {
    #[error("All encoding methods failed")]
    AllEncodersFailed,

    #[error("Encode cancelled")]
    Cancelled,
}

/// Top-level error surfaced by the pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Select(#[from] SelectError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Internal error: {0}")]
    Internal(String),
}
