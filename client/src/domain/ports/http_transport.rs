//! Driven port for sending one HTTP exchange to the summarisation service.
//!
//! Requests are described as plain data so the authenticator can replay them
//! after a credential refresh without the adapter having to clone live
//! request builders.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::define_port_error;
use crate::domain::{Error, TaskId, VideoId};

/// HTTP verbs used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

/// Service endpoints, relative to the configured base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `authenticate/`
    Authenticate,
    /// `signup/`
    Signup,
    /// `refresh/`
    Refresh,
    /// `password-reset/`
    PasswordReset,
    /// `password-reset/confirm/`
    PasswordResetConfirm,
    /// `videos/`
    Videos,
    /// `video/upload`
    VideoUpload,
    /// `video/{id}/`
    Video(VideoId),
    /// `task/{task_id}/status/`
    TaskStatus(TaskId),
}

impl Endpoint {
    /// Path relative to the base URL.
    ///
    /// # Examples
    /// ```
    /// use client::domain::ports::Endpoint;
    /// use client::domain::{TaskId, VideoId};
    ///
    /// assert_eq!(Endpoint::Video(VideoId::new(4)).path(), "video/4/");
    /// let task = TaskId::new("abc123").unwrap();
    /// assert_eq!(Endpoint::TaskStatus(task).path(), "task/abc123/status/");
    /// ```
    pub fn path(&self) -> String {
        match self {
            Self::Authenticate => "authenticate/".to_owned(),
            Self::Signup => "signup/".to_owned(),
            Self::Refresh => "refresh/".to_owned(),
            Self::PasswordReset => "password-reset/".to_owned(),
            Self::PasswordResetConfirm => "password-reset/confirm/".to_owned(),
            Self::Videos => "videos/".to_owned(),
            Self::VideoUpload => "video/upload".to_owned(),
            Self::Video(id) => format!("video/{id}/"),
            Self::TaskStatus(task_id) => format!("task/{task_id}/status/"),
        }
    }

    /// Whether this is the credential refresh endpoint.
    pub fn is_refresh(&self) -> bool {
        matches!(self, Self::Refresh)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// File part of a multipart body.
#[derive(Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Form field name.
    pub field: String,
    /// File name reported to the service.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

impl fmt::Debug for FilePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilePart")
            .field("field", &self.field)
            .field("file_name", &self.file_name)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body.
    Empty,
    /// JSON document.
    Json(Value),
    /// `multipart/form-data` with text fields and one file.
    Multipart {
        /// Text fields in submission order.
        fields: Vec<(String, String)>,
        /// The uploaded file.
        file: FilePart,
    },
}

/// One replayable request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: HttpMethod,
    /// Target endpoint.
    pub endpoint: Endpoint,
    /// Payload.
    pub body: RequestBody,
}

impl ApiRequest {
    /// `GET` without a body.
    pub fn get(endpoint: Endpoint) -> Self {
        Self {
            method: HttpMethod::Get,
            endpoint,
            body: RequestBody::Empty,
        }
    }

    /// `DELETE` without a body.
    pub fn delete(endpoint: Endpoint) -> Self {
        Self {
            method: HttpMethod::Delete,
            endpoint,
            body: RequestBody::Empty,
        }
    }

    /// `POST` with a JSON body.
    pub fn post_json(endpoint: Endpoint, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            endpoint,
            body: RequestBody::Json(body),
        }
    }
}

/// Status and raw body of a completed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Build a response from a status and a JSON value.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the service rejected the credential (401 or 403).
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    /// Convert a non-success response into a domain error.
    pub fn to_error(&self) -> Error {
        Error::from_response(self.status, &self.body)
    }

    /// Decode a successful body, or turn a failed response into an error.
    ///
    /// # Examples
    /// ```
    /// use client::domain::ports::ApiResponse;
    /// use client::domain::ErrorCode;
    /// use serde_json::{json, Value};
    ///
    /// let ok = ApiResponse::json(200, &json!({"count": 2}));
    /// let value: Value = ok.decode().unwrap();
    /// assert_eq!(value["count"], 2);
    ///
    /// let missing = ApiResponse::json(404, &json!({"error": "Video not found"}));
    /// let err = missing.decode::<Value>().unwrap_err();
    /// assert_eq!(err.code(), ErrorCode::NotFound);
    /// ```
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        if !self.is_success() {
            return Err(self.to_error());
        }
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|err| {
            Error::internal(format!(
                "failed to decode response (status {}): {err}",
                self.status
            ))
        })
    }

    /// Succeed on any 2xx status, ignoring the body.
    pub fn ensure_success(&self) -> Result<(), Error> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self.to_error())
        }
    }
}

define_port_error! {
    /// Errors surfaced before a response was received.
    pub enum HttpTransportError {
        /// The connection could not be established or was dropped.
        Connect { message: String } => "service unreachable: {message}",
        /// The exchange exceeded the configured timeout.
        Timeout { message: String } => "service request timed out: {message}",
        /// The adapter could not build the request.
        InvalidRequest { message: String } => "request could not be built: {message}",
    }
}

impl From<HttpTransportError> for Error {
    fn from(value: HttpTransportError) -> Self {
        match value {
            HttpTransportError::InvalidRequest { .. } => Error::internal(value.to_string()),
            HttpTransportError::Connect { .. } | HttpTransportError::Timeout { .. } => {
                Error::service_unavailable(value.to_string())
            }
        }
    }
}

/// Sends requests to the service.
///
/// Implementations attach `bearer` as an `Authorization: Bearer` header when
/// present and return every HTTP status as a response; only failures to
/// complete the exchange are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one exchange.
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, HttpTransportError>;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use crate::domain::ErrorCode;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(401, true)]
    #[case(403, true)]
    #[case(404, false)]
    #[case(500, false)]
    fn authorization_failures_are_401_and_403(#[case] status: u16, #[case] expected: bool) {
        let response = ApiResponse::json(status, &json!({}));
        assert_eq!(response.is_authorization_failure(), expected);
    }

    #[rstest]
    fn empty_success_body_decodes_as_unit() {
        let response = ApiResponse {
            status: 204,
            body: Vec::new(),
        };
        let value: Option<Value> = response.decode().expect("empty body decodes");
        assert!(value.is_none());
        response.ensure_success().expect("204 is success");
    }

    #[rstest]
    fn undecodable_body_is_internal_error() {
        let response = ApiResponse {
            status: 200,
            body: b"<html>".to_vec(),
        };
        let err = response.decode::<Value>().expect_err("html is not json");
        assert_eq!(err.code(), ErrorCode::InternalError);
    }

    #[rstest]
    #[case(HttpTransportError::connect("refused"), ErrorCode::ServiceUnavailable)]
    #[case(HttpTransportError::timeout("30s"), ErrorCode::ServiceUnavailable)]
    #[case(HttpTransportError::invalid_request("bad url"), ErrorCode::InternalError)]
    fn transport_errors_map_to_domain_codes(
        #[case] error: HttpTransportError,
        #[case] expected: ErrorCode,
    ) {
        let err: Error = error.into();
        assert_eq!(err.code(), expected);
        assert!(err.status().is_none());
    }

    #[rstest]
    fn only_refresh_endpoint_is_refresh() {
        assert!(Endpoint::Refresh.is_refresh());
        assert!(!Endpoint::Authenticate.is_refresh());
    }
}
