//! Error types for the dispatch engine.
//!
//! This module uses an opaque `Error` struct paired with an `ErrorKind` enum,
//! following the `std::io::Error` pattern. Handlers and filters return
//! [`Result`] and their failures travel up the chain until the dispatch
//! boundary, where they are logged.
//!
//! # Example
//!
//! ```rust
//! use dispatch_engine::{Error, ErrorKind};
//!
//! let error = Error::session_state("session already invalidated");
//!
//! match error.kind() {
//!     ErrorKind::SessionState => println!("stale session: {}", error),
//!     _ => println!("other error: {}", error),
//! }
//! ```

use {
    axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    serde::Serialize,
    std::fmt,
    thiserror::Error,
};

/// The kind of error that occurred.
///
/// This enum is marked `#[non_exhaustive]`, so new variants may be added
/// without breaking existing code. Always include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Configuration error (invalid TOML, bad pattern, unknown handler name).
    #[error("configuration error")]
    Configuration,

    /// I/O error (file operations, network).
    #[error("I/O error")]
    Io,

    /// Invalid input (bad header, malformed pattern, request data).
    #[error("invalid input")]
    InvalidInput,

    /// Operation on a session that has been invalidated.
    #[error("session state error")]
    SessionState,

    /// Status or header change attempted after the response was committed.
    #[error("response already committed")]
    ResponseCommitted,

    /// A filter chain was advanced after it had already run.
    #[error("filter chain state error")]
    ChainState,

    /// Failure raised by a handler or filter.
    #[error("handler failure")]
    Handler,

    /// Internal/unexpected error.
    #[error("internal error")]
    Internal,
}

/// An error that can occur while building or running the engine.
///
/// Use [`Error::kind()`] to determine the category of error for matching,
/// and the `Display` implementation to get a human-readable message.
pub struct Error {
    kind: ErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new error with the given kind and source.
    ///
    /// ```rust
    /// use dispatch_engine::{Error, ErrorKind};
    ///
    /// let err = Error::new(ErrorKind::Handler, "template missing");
    /// assert_eq!(err.kind(), ErrorKind::Handler);
    /// ```
    pub fn new<E>(kind: ErrorKind, error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: error.into(),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns a stable identifier suitable for client-side error handling.
    pub fn error_code(&self) -> &'static str {
        match self.kind {
            ErrorKind::Configuration => "CONFIG_ERROR",
            ErrorKind::Io => "IO_ERROR",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::SessionState => "SESSION_STATE_ERROR",
            ErrorKind::ResponseCommitted => "RESPONSE_COMMITTED",
            ErrorKind::ChainState => "CHAIN_STATE_ERROR",
            ErrorKind::Handler => "HANDLER_FAILURE",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code the transport uses for this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::Configuration
            | ErrorKind::Io
            | ErrorKind::SessionState
            | ErrorKind::ResponseCommitted
            | ErrorKind::ChainState
            | ErrorKind::Handler
            | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Converts the error into a structured error response.
    pub fn to_error_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.error_code(), self.to_string())
    }

    /// Consumes the error and returns the inner error source.
    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.source
    }
}

// ============================================================================
// Convenience constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, msg.into())
    }

    /// Creates an I/O error from a message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg.into())
    }

    /// Creates an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg.into())
    }

    /// Creates a session state error.
    pub fn session_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::SessionState, msg.into())
    }

    /// Creates a response-already-committed error.
    pub fn response_committed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResponseCommitted, msg.into())
    }

    /// Creates a filter chain state error.
    pub fn chain_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ChainState, msg.into())
    }

    /// Creates a handler failure. Use this from handler and filter code.
    pub fn handler(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Handler, msg.into())
    }

    /// Creates an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg.into())
    }
}

// ============================================================================
// Trait implementations
// ============================================================================

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("kind", &self.kind)
            .field("source", &self.source)
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.source)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_response = self.to_error_response();

        tracing::error!(
            error_code = %error_response.error_code,
            message = %error_response.message,
            status = %status.as_u16(),
            "Error occurred"
        );

        (status, Json(error_response)).into_response()
    }
}

// ============================================================================
// From implementations
// ============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Self::new(ErrorKind::Configuration, err)
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::new(ErrorKind::InvalidInput, err)
    }
}

// ============================================================================
// ErrorResponse
// ============================================================================

/// Structured error response with error code and details.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Unique error code for client-side error handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Creates a new error response.
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Adds details to the error response.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_constructors_set_kind() {
        assert_eq!(Error::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(Error::io("x").kind(), ErrorKind::Io);
        assert_eq!(Error::invalid_input("x").kind(), ErrorKind::InvalidInput);
        assert_eq!(Error::session_state("x").kind(), ErrorKind::SessionState);
        assert_eq!(
            Error::response_committed("x").kind(),
            ErrorKind::ResponseCommitted
        );
        assert_eq!(Error::chain_state("x").kind(), ErrorKind::ChainState);
        assert_eq!(Error::handler("x").kind(), ErrorKind::Handler);
        assert_eq!(Error::internal("x").kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_result_alias_propagates_with_question_mark() {
        fn parse(input: &str) -> Result<u32> {
            let value: u32 = serde_json::from_str(input)?;
            Ok(value)
        }

        assert_eq!(parse("7").unwrap(), 7);
        assert_eq!(parse("nope").unwrap_err().kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_error_codes_are_distinct() {
        let codes = [
            Error::config("x").error_code(),
            Error::io("x").error_code(),
            Error::invalid_input("x").error_code(),
            Error::session_state("x").error_code(),
            Error::response_committed("x").error_code(),
            Error::chain_state("x").error_code(),
            Error::handler("x").error_code(),
            Error::internal("x").error_code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::invalid_input("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::handler("boom").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_uses_source_message() {
        let err = Error::session_state("session already invalidated");
        assert_eq!(err.to_string(), "session already invalidated");
    }

    #[test]
    fn test_source_is_exposed() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_from_toml_error_is_configuration() {
        let err: Error = toml::from_str::<toml::Table>("not = = toml")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_from_header_errors_are_invalid_input() {
        let err: Error = http::HeaderValue::from_str("bad\nvalue").unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: Error = http::HeaderName::from_bytes(b"bad name")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_error_response_serialization() {
        let response = Error::handler("boom").to_error_response();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["error_code"], "HANDLER_FAILURE");
        assert_eq!(json["message"], "boom");
        assert!(json.get("details").is_none());

        let detailed = ErrorResponse::new("X", "y").with_details("z");
        assert_eq!(detailed.details.as_deref(), Some("z"));
    }

    #[test]
    fn test_into_response_status() {
        let response = Error::invalid_input("bad").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
