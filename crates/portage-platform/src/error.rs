use thiserror::Error;

/// Errors from talking to a remote control plane.
#[derive(Error, Debug)]
pub enum PlatformError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("{method} {path}: {source}")]
    Request {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path}: HTTP {status}: {body}")]
    Http {
        method: String,
        path: String,
        status: u16,
        /// Response body, truncated to 200 bytes.
        body: String,
    },

    #[error("Parsing response from {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("{path}: too many redirects")]
    TooManyRedirects { path: String },

    #[error("Invalid URL {url}: {detail}")]
    InvalidUrl { url: String, detail: String },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),
}

impl PlatformError {
    /// HTTP status of the failed request, when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
