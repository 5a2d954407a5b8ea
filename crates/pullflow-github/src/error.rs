//! Error types for the connector.

use std::fmt;
use thiserror::Error;

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes surfaced to the calling framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The datasource address or credential is unusable.
    InvalidDatasourceConfig,
    /// The requested entity or its projection is unusable.
    InvalidEntityConfig,
    /// The page request parameters or cursor are unusable.
    InvalidPageRequestConfig,
    /// Everything else: transport, remote, shape, and impossible states.
    Internal,
}

impl ErrorCode {
    /// Wire form of the code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidDatasourceConfig => "INVALID_DATASOURCE_CONFIG",
            Self::InvalidEntityConfig => "INVALID_ENTITY_CONFIG",
            Self::InvalidPageRequestConfig => "INVALID_PAGE_REQUEST_CONFIG",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a failed transport attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request deadline fired before a response arrived.
    Timeout,
    /// Connection establishment failed (refused, DNS, TLS handshake).
    Connect,
    /// Any other transport-level failure.
    Other,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timeout"),
            Self::Connect => f.write_str("connect"),
            Self::Other => f.write_str("transport"),
        }
    }
}

/// Errors that can occur while fetching a page.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Datasource address or credential rejected before dispatch.
    #[error("invalid datasource configuration: {0}")]
    InvalidDatasourceConfig(String),

    /// Entity name or attribute projection rejected before dispatch.
    #[error("invalid entity configuration: {0}")]
    InvalidEntityConfig(String),

    /// Page request parameters rejected before dispatch.
    #[error("invalid page request: {0}")]
    InvalidPageRequest(String),

    /// Continuation cursor could not be decoded or does not fit the entity.
    #[error("malformed cursor: {0}")]
    CursorShape(String),

    /// The HTTP exchange itself failed.
    #[error("transport failure ({kind}): {source}")]
    Transport {
        /// How the failure was classified.
        kind: TransportKind,
        /// The underlying client error.
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-OK status.
    #[error("source returned status {status}")]
    SourceStatus {
        /// HTTP status code.
        status: u16,
        /// `Retry-After` header value, passed through verbatim.
        retry_after: Option<String>,
    },

    /// The source answered OK but reported query errors.
    #[error("source reported errors: {0}")]
    SourceErrors(String),

    /// The response body does not match the entity's expected shape.
    #[error("unexpected response shape: {0}")]
    Shape(String),

    /// Impossible state or infrastructure failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a datasource configuration error.
    pub fn datasource(message: impl Into<String>) -> Self {
        Self::InvalidDatasourceConfig(message.into())
    }

    /// Create an entity configuration error.
    pub fn entity(message: impl Into<String>) -> Self {
        Self::InvalidEntityConfig(message.into())
    }

    /// Create a page request error.
    pub fn request(message: impl Into<String>) -> Self {
        Self::InvalidPageRequest(message.into())
    }

    /// Create a cursor shape error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::CursorShape(message.into())
    }

    /// Create a response shape error.
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Classify and wrap a failed HTTP exchange.
    #[must_use]
    pub fn transport(source: reqwest::Error) -> Self {
        let kind = if source.is_timeout() {
            TransportKind::Timeout
        } else if source.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Other
        };
        Self::Transport { kind, source }
    }

    /// The external code this error maps to.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDatasourceConfig(_) => ErrorCode::InvalidDatasourceConfig,
            Self::InvalidEntityConfig(_) => ErrorCode::InvalidEntityConfig,
            Self::InvalidPageRequest(_) | Self::CursorShape(_) => {
                ErrorCode::InvalidPageRequestConfig
            }
            Self::Transport { .. }
            | Self::SourceStatus { .. }
            | Self::SourceErrors(_)
            | Self::Shape(_)
            | Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Whether the caller may retry the call with the same cursor.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::SourceStatus {
                status,
                retry_after,
            } => *status >= 500 || *status == 429 || retry_after.is_some(),
            _ => false,
        }
    }
}
