//! Error types for ip-fetcher.

use thiserror::Error;

/// Error type for ip-fetcher operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid option (API key, download path, edition, format)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network, DNS, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),

    /// HTTP 429 from a provider; never retried
    #[error("quota exceeded: {0}")]
    Quota(String),

    /// Well-formed error envelope returned by a provider API
    #[error("api error (status {status}): {detail}")]
    Api { status: u16, detail: String },

    /// Unexpected HTTP status
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    /// Successful status but nothing in the body
    #[error("empty response body with status {status}")]
    EmptyBody { status: u16 },

    /// Malformed body, timestamp or CIDR
    #[error("parse error: {0}")]
    Parse(String),

    /// Unsafe archive entry or failure while extracting
    #[error("extraction error: {0}")]
    Extraction(String),

    /// Document holds no prefixes to render
    #[error("document contains no prefixes")]
    NoPrefixes,

    /// Output format not available for a document
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// External command (git) failure
    #[error("command failed: {0}")]
    Command(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// ZIP archive error
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl Error {
    /// Shorthand for a parse error with context.
    pub(crate) fn parse(context: &str, detail: impl std::fmt::Display) -> Self {
        Error::Parse(format!("{}: {}", context, detail))
    }

    /// True for the distinguished quota error.
    pub fn is_quota(&self) -> bool {
        matches!(self, Error::Quota(_))
    }
}

/// Result type alias for ip-fetcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classified transport failure reported by a [`crate::http::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Deadline elapsed before the body was read
    #[error("request timed out")]
    Timeout,

    /// Connection or DNS failure
    #[error("connection failed: {0}")]
    Connect(String),

    /// Certificate not trusted
    #[error("TLS trust failure: {0}")]
    Tls(String),

    /// URL scheme the transport cannot speak
    #[error("unsupported protocol scheme: {0}")]
    UnsupportedScheme(String),

    /// Too many redirects
    #[error("redirect loop: {0}")]
    RedirectLoop(String),

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying the request may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            TransportError::Tls(_) | TransportError::UnsupportedScheme(_) | TransportError::RedirectLoop(_)
        )
    }
}
