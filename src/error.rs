//! Error types for Petfinder API calls.
//!
//! Every failure a caller can observe is one variant of [`Error`]. Server
//! responses are classified by [`Error::from_response`] so that the status code
//! contract of the API (400, 401, 403, 404, 429, 5xx) maps onto typed variants,
//! while the raw response text stays available for debugging.

use crate::params::ParameterViolation;
use crate::rate_limit::RateLimitInfo;
use crate::response::RawResponse;
use http::StatusCode;

/// The main error type for Petfinder API calls.
///
/// # Examples
///
/// ```no_run
/// use petfinder_client::{AnimalQuery, Error, PageLimit, Petfinder};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Petfinder::builder()
///     .credentials("key", "secret")
///     .build()?;
///
/// let query = AnimalQuery::new().animal_type("dragon");
/// match client.animals(&query, PageLimit::Pages(1)).await {
///     Ok(pages) => println!("{} animals", pages.len()),
///     Err(Error::InvalidParameters { violations }) => {
///         for violation in violations {
///             eprintln!("{violation}");
///         }
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// One or more query parameters failed client-side validation.
    ///
    /// Raised before any request leaves the process. All violations are
    /// collected, not only the first one found.
    #[error("Invalid parameters: {}", join_violations(.violations))]
    InvalidParameters {
        /// Every violation found in the query
        violations: Vec<ParameterViolation>,
    },

    /// The server rejected the query parameters (HTTP 400).
    #[error("Bad request ({}): {message}", .invalid_params.join(", "))]
    BadRequest {
        /// The parameter names the server reported as invalid
        invalid_params: Vec<String>,
        /// The server's detail message
        message: String,
    },

    /// The key/secret pair was rejected, or a refreshed token was rejected again.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials {
        /// The server's detail message
        message: String,
    },

    /// The credential is valid but may not access the requested resource (HTTP 403).
    #[error("Insufficient access: {message}")]
    InsufficientAccess {
        /// The server's detail message
        message: String,
    },

    /// The requested resource does not exist (HTTP 404).
    #[error("Resource not found: {message}")]
    ResourceNotFound {
        /// The server's detail message
        message: String,
    },

    /// The daily or burst quota was exceeded (HTTP 429 or a payload status of 429).
    #[error("Rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// The server's detail message
        message: String,
        /// Rate limit hints parsed from the response headers
        rate_limit_info: Option<RateLimitInfo>,
    },

    /// The server failed unexpectedly (HTTP 5xx), after all attempts were used.
    #[error("Unexpected server error {status} after {attempts} attempt(s): {message}")]
    UnexpectedServerError {
        /// The last status code received
        status: StatusCode,
        /// How many attempts were made
        attempts: usize,
        /// The server's detail message
        message: String,
    },

    /// A non-2xx status outside the documented contract.
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
    },

    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// A successful response carried a body that is not valid JSON.
    #[error("Failed to deserialize response (status {status}): {serde_error}")]
    DeserializationFailed {
        /// The raw response body that failed to deserialize
        raw_response: String,
        /// The serde error message
        serde_error: String,
        /// The HTTP status code
        status: StatusCode,
    },

    /// Invalid configuration was provided.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(error)
        }
    }
}

impl Error {
    /// Classifies a non-successful response into a typed error.
    ///
    /// The effective status is used, so a `200 OK` whose payload carries a
    /// legacy status code (for example "limit exceeded") is classified by that
    /// payload code.
    pub fn from_response(response: &RawResponse) -> Self {
        let status = response.effective_status();
        let message = response.detail();

        match status.as_u16() {
            400 => Error::BadRequest {
                invalid_params: response.invalid_params(),
                message,
            },
            401 => Error::InvalidCredentials { message },
            403 => Error::InsufficientAccess { message },
            404 => Error::ResourceNotFound { message },
            429 => Error::RateLimitExceeded {
                message,
                rate_limit_info: Some(RateLimitInfo::from_headers(&response.headers)),
            },
            _ if status.is_server_error() => Error::UnexpectedServerError {
                status,
                attempts: 1,
                message,
            },
            _ => Error::HttpError {
                status,
                raw_response: response.raw_body.clone(),
            },
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    ///
    /// Only server-side failures qualify. Rate limits are never retried:
    /// they end a paginated fetch instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use petfinder_client::Error;
    /// use http::StatusCode;
    ///
    /// let err = Error::UnexpectedServerError {
    ///     status: StatusCode::INTERNAL_SERVER_ERROR,
    ///     attempts: 1,
    ///     message: "Server error".to_string(),
    /// };
    /// assert!(err.is_retryable());
    ///
    /// let err = Error::ResourceNotFound { message: "gone".to_string() };
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::UnexpectedServerError { .. })
    }

    /// Returns the HTTP status code associated with this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::BadRequest { .. } => Some(StatusCode::BAD_REQUEST),
            Error::InvalidCredentials { .. } => Some(StatusCode::UNAUTHORIZED),
            Error::InsufficientAccess { .. } => Some(StatusCode::FORBIDDEN),
            Error::ResourceNotFound { .. } => Some(StatusCode::NOT_FOUND),
            Error::RateLimitExceeded { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Error::UnexpectedServerError { status, .. } => Some(*status),
            Error::HttpError { status, .. } => Some(*status),
            Error::DeserializationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error carries one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            Error::DeserializationFailed { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Returns rate limit information if available.
    pub fn rate_limit_info(&self) -> Option<&RateLimitInfo> {
        match self {
            Error::RateLimitExceeded {
                rate_limit_info, ..
            } => rate_limit_info.as_ref(),
            _ => None,
        }
    }
}

fn join_violations(violations: &[ParameterViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A specialized `Result` type for Petfinder API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderMap;
    use std::time::Duration;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body.to_string(),
            Duration::ZERO,
        )
    }

    #[test]
    fn test_classifies_documented_statuses() {
        let body = r#"{"status":404,"title":"Not Found","detail":"Not Found"}"#;
        assert!(matches!(
            Error::from_response(&response(404, body)),
            Error::ResourceNotFound { .. }
        ));
        assert!(matches!(
            Error::from_response(&response(403, "{}")),
            Error::InsufficientAccess { .. }
        ));
        assert!(matches!(
            Error::from_response(&response(429, "{}")),
            Error::RateLimitExceeded { .. }
        ));
        assert!(matches!(
            Error::from_response(&response(503, "oops")),
            Error::UnexpectedServerError { attempts: 1, .. }
        ));
        assert!(matches!(
            Error::from_response(&response(418, "teapot")),
            Error::HttpError { .. }
        ));
    }

    #[test]
    fn test_bad_request_carries_offending_parameters() {
        let body = r#"{
            "status": 400,
            "title": "Invalid Request",
            "detail": "The request contains invalid parameters.",
            "invalid-params": [
                {"in": "query", "path": "location", "message": "Could not determine location."}
            ]
        }"#;

        match Error::from_response(&response(400, body)) {
            Error::BadRequest {
                invalid_params,
                message,
            } => {
                assert_eq!(invalid_params, vec!["location".to_string()]);
                assert_eq!(message, "The request contains invalid parameters.");
            }
            other => panic!("Expected BadRequest, got {:?}", other),
        }
    }

    #[test]
    fn test_legacy_payload_status_drives_classification() {
        let body = r#"{"petfinder":{"header":{"status":{"code":{"$t":"202"},"message":{"$t":"exceeded daily request limit"}}}}}"#;

        match Error::from_response(&response(200, body)) {
            Error::RateLimitExceeded { message, .. } => {
                assert_eq!(message, "exceeded daily request limit");
            }
            other => panic!("Expected RateLimitExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_parameters_display_lists_every_violation() {
        let err = Error::InvalidParameters {
            violations: vec![
                ParameterViolation::new("size", "sizes [\"tiny\"] are not valid"),
                ParameterViolation::new("distance", "distance must be between 0 and 500"),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("size"));
        assert!(text.contains("distance"));
    }
}
