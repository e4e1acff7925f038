use thiserror::Error;

/// How the resilience layer should react to a failed remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transient unavailability; the call may be retried.
    Retryable,
    /// The resource does not exist. Often not an error at all.
    NotFound,
    /// Anything else. Never retried.
    Fatal,
}

impl ErrorClass {
    /// Classify an HTTP status code.
    ///
    /// `408`, `502`, `503` and `504` are transient; `404` is absence;
    /// every other status is fatal.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        match status {
            408 | 502 | 503 | 504 => Self::Retryable,
            404 => Self::NotFound,
            _ => Self::Fatal,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_retryable(self) -> bool {
        self == Self::Retryable
    }

    #[inline]
    #[must_use]
    pub fn is_not_found(self) -> bool {
        self == Self::NotFound
    }
}

/// Errors that know how they should be treated by the retry executor.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}

/// Errors returned by a remote Git-hosting API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote answered with a non-success status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The request never produced a response.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The response body could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// Create an API error with the given status.
    #[inline]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a 404 API error.
    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::api(404, resource)
    }

    /// Create a transport error.
    #[inline]
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Classify for RemoteError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Api { status, .. } => ErrorClass::from_status(*status),
            // No status means the call failed outside the API contract.
            Self::Http(_) | Self::Json(_) | Self::InvalidUrl(_) => ErrorClass::Fatal,
        }
    }
}

/// Extract a short error message suitable for display.
///
/// Takes the first line of an error message, which keeps log lines readable
/// when a remote returns an HTML error page or a multi-line body.
#[inline]
pub fn short_error_message(e: &impl std::fmt::Display) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
