use std::sync::Arc;

/// Represents a result type for operations in the Optimizely SDK core.
///
/// This `Result` type is a standard Rust `Result` type where the error variant is defined by the
/// crate-specific [`Error`] enum.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum representing possible errors that can occur in the SDK core.
///
/// Most of these never reach SDK users: audience evaluation collapses problems into
/// [`Tristate::Unknown`](crate::audience::Tristate::Unknown) and ODP operations log and drop. They
/// are surfaced by the lower-level building blocks (transport, API managers, service lifecycle).
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// Invalid ODP host or pixel URL.
    #[error("invalid url")]
    InvalidUrl(#[source] url::ParseError),

    /// The request was unauthorized, possibly due to an invalid API key.
    #[error("unauthorized, api_key is likely invalid")]
    Unauthorized,

    /// The server answered with a non-success status code.
    #[error("received non-success status code {0}")]
    HttpStatus(u16),

    /// The pixel API can only carry a single event per request.
    #[error("pixel api accepts exactly one event per request, got {0}")]
    TooManyEvents(usize),

    /// A background task had to be spawned outside of a Tokio runtime.
    #[error("no tokio runtime available to run background tasks")]
    NoRuntime,

    /// The service was stopped before it became ready.
    #[error("service was stopped before it started running")]
    ServiceStopped,

    /// The service failed to start.
    #[error("service failed to start")]
    ServiceFailed,

    /// JSON (de)serialization error.
    #[error(transparent)]
    // serde_json::Error is not clonable, so we're wrapping it in an Arc.
    Json(Arc<serde_json::Error>),

    /// Network error.
    #[error(transparent)]
    Network(Arc<reqwest::Error>),
}

impl Error {
    /// Error describing a non-success HTTP status code.
    pub(crate) fn from_status(status_code: u16) -> Error {
        match status_code {
            401 | 403 => Error::Unauthorized,
            _ => Error::HttpStatus(status_code),
        }
    }

    /// Whether sending the same request again may succeed.
    pub(crate) fn is_retryable(&self) -> bool {
        !matches!(self, Error::InvalidUrl(_) | Error::TooManyEvents(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(Arc::new(value))
    }
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        Error::Network(Arc::new(value.without_url()))
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Error::InvalidUrl(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn status_errors() {
        assert!(matches!(Error::from_status(401), Error::Unauthorized));
        assert!(matches!(Error::from_status(403), Error::Unauthorized));
        assert!(matches!(Error::from_status(500), Error::HttpStatus(500)));
        assert_eq!(
            Error::from_status(429).to_string(),
            "received non-success status code 429"
        );
    }

    #[test]
    fn request_shape_errors_are_not_retryable() {
        assert!(!Error::TooManyEvents(2).is_retryable());
        assert!(!Error::from(url::ParseError::EmptyHost).is_retryable());
        assert!(Error::HttpStatus(502).is_retryable());
        assert!(Error::Unauthorized.is_retryable());
    }
}
