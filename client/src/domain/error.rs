//! Domain-level error types.
//!
//! These errors are transport agnostic. The HTTP adapter feeds raw status
//! codes and bodies in through [`Error::from_response`]; callers match on
//! [`ErrorCode`] rather than inspecting ad hoc payload fields.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable machine-readable error code describing the failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The request is malformed or fails validation.
    InvalidRequest,
    /// Authentication failed or is missing.
    Unauthorized,
    /// Authenticated but not permitted to perform this action.
    Forbidden,
    /// The requested resource does not exist.
    NotFound,
    /// The service could not be reached or reported a server-side fault.
    ServiceUnavailable,
    /// An unexpected error occurred inside the client.
    InternalError,
}

impl ErrorCode {
    /// Map an HTTP status to the closest error category.
    ///
    /// # Examples
    /// ```
    /// use client::domain::ErrorCode;
    ///
    /// assert_eq!(ErrorCode::from_status(401), ErrorCode::Unauthorized);
    /// assert_eq!(ErrorCode::from_status(503), ErrorCode::ServiceUnavailable);
    /// ```
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 409 | 413 | 415 | 422 => Self::InvalidRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 | 410 => Self::NotFound,
            500..=599 => Self::ServiceUnavailable,
            _ => Self::InternalError,
        }
    }
}

/// Domain error payload.
///
/// ## Invariants
/// - `message` must be non-empty once trimmed of whitespace.
/// - `status` is only present when the failure came from an HTTP response.
///
/// # Examples
/// ```
/// use client::domain::{Error, ErrorCode};
///
/// let err = Error::new(ErrorCode::NotFound, "missing");
/// assert_eq!(err.code(), ErrorCode::NotFound);
/// assert!(err.status().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
#[serde(try_from = "ErrorDto", into = "ErrorDto")]
pub struct Error {
    code: ErrorCode,
    message: String,
    status: Option<u16>,
    details: Option<Value>,
}

/// Validation errors emitted by the constructors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorValidationError {
    EmptyMessage,
}

impl std::fmt::Display for ErrorValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "error message must not be empty"),
        }
    }
}

impl std::error::Error for ErrorValidationError {}

impl Error {
    /// Create a new error, panicking if validation fails.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        match Self::try_new(code, message) {
            Ok(value) => value,
            Err(err) => panic!("error messages must satisfy validation: {err}"),
        }
    }

    /// Fallible constructor that validates the message content.
    pub fn try_new(code: ErrorCode, message: impl Into<String>) -> Result<Self, ErrorValidationError> {
        let message = message.into();
        if message.trim().is_empty() {
            return Err(ErrorValidationError::EmptyMessage);
        }
        Ok(Self {
            code,
            message,
            status: None,
            details: None,
        })
    }

    /// Build an error from a non-success HTTP response.
    ///
    /// The service answers with a handful of loosely-typed shapes:
    /// `{"detail": "..."}`, `{"error": "..."}`, or a map of field names to
    /// message lists. The first usable message becomes [`Error::message`] and
    /// the whole payload is kept in [`Error::details`].
    ///
    /// # Examples
    /// ```
    /// use client::domain::{Error, ErrorCode};
    ///
    /// let err = Error::from_response(401, br#"{"detail":"Token expired"}"#);
    /// assert_eq!(err.code(), ErrorCode::Unauthorized);
    /// assert_eq!(err.message(), "Token expired");
    /// assert_eq!(err.status(), Some(401));
    /// ```
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        let payload = serde_json::from_slice::<Value>(body).ok();
        let message = payload
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| format!("request failed with status {status}"));
        let error = Self::new(ErrorCode::from_status(status), message).with_status(status);
        match payload {
            Some(Value::Null) | None => error,
            Some(details) => error.with_details(details),
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }

    /// HTTP status of the response that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Supplementary error details (the raw service payload, when present).
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Whether the service rejected the credential (401 or 403).
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self.status, Some(401 | 403))
    }

    /// Attach structured details to the error.
    ///
    /// # Examples
    /// ```
    /// use client::domain::{Error, ErrorCode};
    /// use serde_json::json;
    ///
    /// let err = Error::new(ErrorCode::InvalidRequest, "bad")
    ///     .with_details(json!({ "field": "title" }));
    /// assert!(err.details().is_some());
    /// ```
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Record the HTTP status that produced the error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Convenience constructor for [`ErrorCode::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// Convenience constructor for [`ErrorCode::Unauthorized`].
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Convenience constructor for [`ErrorCode::Forbidden`].
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::ServiceUnavailable`].
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Convenience constructor for [`ErrorCode::InternalError`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

fn extract_message(payload: &Value) -> Option<String> {
    match payload {
        Value::String(text) => non_blank(text),
        Value::Array(items) => items.iter().find_map(extract_message),
        Value::Object(fields) => ["detail", "error", "message", "non_field_errors"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(extract_message))
            .or_else(|| {
                fields.iter().find_map(|(field, value)| {
                    extract_message(value).map(|message| format!("{field}: {message}"))
                })
            }),
        _ => None,
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: ErrorCode,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl From<Error> for ErrorDto {
    fn from(value: Error) -> Self {
        Self {
            code: value.code,
            message: value.message,
            status: value.status,
            details: value.details,
        }
    }
}

impl TryFrom<ErrorDto> for Error {
    type Error = ErrorValidationError;

    fn try_from(value: ErrorDto) -> Result<Self, Self::Error> {
        let ErrorDto {
            code,
            message,
            status,
            details,
        } = value;

        let mut error = Error::try_new(code, message)?;
        error.status = status;
        error.details = details;
        Ok(error)
    }
}
