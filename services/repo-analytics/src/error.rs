use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure to obtain a local copy of the remote repository
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to clone {url}: {source}")]
    Clone {
        url: String,
        #[source]
        source: git2::Error,
    },
    #[error("Clone of {url} timed out after {}s", .timeout.as_secs())]
    Timeout { url: String, timeout: Duration },
    #[error("Failed to prepare workspace {path:?}: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Clone of {url} was interrupted: {reason}")]
    Interrupted { url: String, reason: String },
}

/// History could not be read from an acquired workspace
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Failed to open repository at {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },
    #[error("Failed to walk history: {0}")]
    Walk(#[source] git2::Error),
    #[error("Failed to read commit {sha}: {source}")]
    Commit {
        sha: String,
        #[source]
        source: git2::Error,
    },
    #[error("Commit {sha} has an unrepresentable timestamp ({seconds})")]
    Timestamp { sha: String, seconds: i64 },
    #[error("History extraction was interrupted: {0}")]
    Interrupted(String),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error("Invalid parameter {name}: {value} (must be greater than zero)")]
    InvalidParameter { name: &'static str, value: i64 },
    #[error("Invalid parameter {name}: {value} is too large")]
    ParameterOutOfRange { name: &'static str, value: i64 },
}

impl AnalysisError {
    /// Short machine-readable tag used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Fetch(FetchError::Timeout { .. }) => "fetch_timeout",
            AnalysisError::Fetch(_) => "fetch_error",
            AnalysisError::Extraction(_) => "extraction_error",
            AnalysisError::InvalidParameter { .. } | AnalysisError::ParameterOutOfRange { .. } => {
                "invalid_parameter"
            }
        }
    }

    /// Whether a caller may substitute placeholder analytics for this failure.
    ///
    /// Bad input is the caller's own mistake and is never papered over.
    pub fn allows_fallback(&self) -> bool {
        !matches!(
            self,
            AnalysisError::InvalidParameter { .. } | AnalysisError::ParameterOutOfRange { .. }
        )
    }
}
