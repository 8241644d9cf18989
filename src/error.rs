//! Error types for endpoint calls.
//!
//! Two layers live here. [`Error`] is the untyped failure taxonomy produced while
//! building, dispatching and decoding a single attempt. [`ApiError`] is the typed
//! error the caller chooses; every failure that survives the retry budget is
//! normalized into it before it reaches the caller.

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

/// A failure raised while executing a single attempt.
///
/// These errors never reach the caller directly: once retries are exhausted they
/// are converted into the client's [`ApiError`] through [`ApiError::from_error`].
///
/// # Examples
///
/// ```
/// use netpoint::Error;
///
/// let err = Error::Encoding("key must be a string".to_string());
/// assert!(!err.is_retryable());
///
/// let err = Error::Timeout;
/// assert!(err.is_retryable());
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The request body or query could not be serialized.
    ///
    /// Raised by the request builder before anything is dispatched.
    #[error("Failed to encode request: {0}")]
    Encoding(String),

    /// A success payload could not be decoded into the expected type.
    ///
    /// The raw payload is preserved for debugging.
    #[error("Failed to decode response (status {status}): {serde_error}")]
    Decoding {
        /// The payload that failed to decode, lossily converted to UTF-8
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code of the response
        status: StatusCode,
    },

    /// A [`JsonMapper`](crate::JsonMapper) rejected the payload before decoding.
    #[error("Failed to map response payload: {0}")]
    Mapping(String),

    /// A network-level error reported by `reqwest`.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A failure reported by a custom [`Transport`](crate::Transport).
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The file backing an upload could not be read.
    #[error("Upload failed: {0}")]
    Upload(#[from] std::io::Error),

    /// Invalid configuration, such as a malformed header.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The endpoint location could not be resolved to a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if a failed attempt with this error should be retried.
    ///
    /// Build failures are deterministic, so encoding errors, invalid URLs and
    /// configuration errors are never retried. Everything else is, including
    /// decode and mapping failures on a successful response: the endpoint may be
    /// called again because its payload was unreadable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Encoding(_) => false,
            Error::Configuration(_) => false,
            Error::InvalidUrl(_) => false,
            Error::Decoding { .. } => true,
            Error::Mapping(_) => true,
            Error::Network(_) => true,
            Error::Timeout => true,
            Error::Transport(_) => true,
            Error::Upload(_) => true,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Decoding { status, .. } => Some(*status),
            Error::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::Decoding { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

/// A specialized `Result` type for attempt-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The typed error a [`Client`](crate::Client) surfaces to its callers.
///
/// An implementation must be decodable from a failure payload, and must be
/// constructible with no information at all (`unknown(None)`) or from the
/// description of an underlying failure.
///
/// # Examples
///
/// ```
/// use netpoint::ApiError;
/// use serde::Deserialize;
///
/// #[derive(Debug, Deserialize)]
/// struct GithubError {
///     message: String,
/// }
///
/// impl ApiError for GithubError {
///     fn unknown(description: Option<String>) -> Self {
///         GithubError {
///             message: description.unwrap_or_else(|| "unknown error".to_string()),
///         }
///     }
/// }
///
/// let err = GithubError::unknown(None);
/// assert_eq!(err.message, "unknown error");
/// ```
pub trait ApiError: DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Builds the "unknown" error, optionally carrying a description.
    fn unknown(description: Option<String>) -> Self;

    /// Wraps a failure that is not a decoded error payload.
    ///
    /// Override this to keep the structure of transport failures; by default only
    /// the description survives.
    fn from_error(error: Error) -> Self {
        Self::unknown(Some(error.to_string()))
    }
}

/// A general purpose [`ApiError`] for JSON services.
///
/// Decodes the common `{ "code": ..., "message": ... }` shape. `message` also
/// accepts an `error` key. When the value wraps a failure that never reached the
/// server, `underlying` holds its description.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ServiceError {
    /// A machine readable error code.
    #[serde(default)]
    pub code: Option<String>,

    /// A human readable message.
    #[serde(default, alias = "error")]
    pub message: Option<String>,

    /// Free-form details attached by the server.
    #[serde(default)]
    pub details: Option<serde_json::Value>,

    /// Description of the underlying failure, for errors raised client-side.
    #[serde(skip)]
    pub underlying: Option<String>,
}

impl ServiceError {
    /// Returns `true` if this error carries no information.
    pub fn is_unknown(&self) -> bool {
        self.code.is_none() && self.message.is_none() && self.details.is_none()
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message, &self.underlying) {
            (Some(code), Some(message), _) => write!(f, "{code}: {message}"),
            (None, Some(message), _) => f.write_str(message),
            (Some(code), None, _) => f.write_str(code),
            (None, None, Some(underlying)) => f.write_str(underlying),
            (None, None, None) => f.write_str("Unknown error"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl ApiError for ServiceError {
    fn unknown(description: Option<String>) -> Self {
        ServiceError {
            underlying: description,
            ..Default::default()
        }
    }
}
