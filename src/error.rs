//! Error types for the registry, the blocking executor and request handling

use axum::http::StatusCode;
use thiserror::Error;

/// Boxed error accepted from user-supplied code.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Registry lookup and registration failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same capability type was added twice at the server level.
    #[error("duplicate binding for type {type_name}")]
    DuplicateBinding { type_name: &'static str },

    /// No level of the registry binds the requested type.
    #[error("no binding for type {type_name}")]
    UnresolvedType { type_name: &'static str },
}

/// Failures of work submitted to the blocking executor.
#[derive(Debug, Error)]
pub enum BlockingOperationError {
    /// The operation returned an error.
    #[error("blocking operation failed: {0}")]
    Failed(#[source] BoxError),

    /// The operation panicked on the worker thread.
    #[error("blocking operation panicked: {0}")]
    Panicked(String),

    /// The executor no longer accepts work.
    #[error("blocking executor is shut down")]
    Shutdown,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Blocking(#[from] BlockingOperationError),

    /// The handler chain was exhausted without a matching route.
    #[error("no handler for {method} {path}")]
    NotFound { method: String, path: String },

    /// A route matched the path but not the method.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed {
        method: String,
        path: String,
        allowed: Vec<String>,
    },

    /// A handler chose to fail with a specific status.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("failed to render response: {0}")]
    Render(#[from] serde_json::Error),

    /// A peer instance answered with a non-success status.
    #[error("peer {url} responded with {status}")]
    Peer { url: String, status: u16 },

    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A handler panicked while processing the request.
    #[error("handler panicked: {0}")]
    Panic(String),

    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Shorthand for a handler-chosen failure status.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::status(StatusCode::BAD_REQUEST, message)
    }

    pub fn other(error: impl Into<BoxError>) -> Self {
        Self::Other(error.into())
    }

    /// HTTP status this error is rendered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::Status { status, .. } => *status,
            Self::Peer { .. } | Self::Client(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is the server's fault rather than the client's.
    pub fn is_internal(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
