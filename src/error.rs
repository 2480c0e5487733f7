use reqwest::StatusCode;

/// Convenience result type for report runs.
pub type ReportResult<T> = Result<T, ReportError>;

/// Errors raised by the Backlog client adapter. Each variant carries the
/// endpoint so the log can say which call went wrong.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}")]
    Status {
        endpoint: String,
        status: StatusCode,
    },
    #[error("failed to parse response from {endpoint}: {source}")]
    Parse {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error taxonomy for a report run. A run either fails before
/// touching the network (`Validation`) or because some fetch, image load,
/// or decode failed (`Fetch`).
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("fetch failed: {0}")]
    Fetch(anyhow::Error),
}

impl ReportError {
    /// Build a [`ReportError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`ReportError::Fetch`] value.
    pub fn fetch(err: impl Into<anyhow::Error>) -> Self {
        Self::Fetch(err.into())
    }
}

impl From<AdapterError> for ReportError {
    fn from(err: AdapterError) -> Self {
        Self::Fetch(err.into())
    }
}
