//! Reqwest-backed transport for the summarisation service.
//!
//! This adapter owns transport details only: URL resolution against the base
//! URL, bearer attachment, body encoding, and mapping reqwest failures onto
//! the port's error type. Every HTTP status is handed back as a response.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Url};
use tracing::debug;

use crate::domain::ports::{
    ApiRequest, ApiResponse, HttpMethod, HttpTransport, HttpTransportError, RequestBody,
};

const USER_AGENT: &str = concat!("vidsum/", env!("CARGO_PKG_VERSION"));

/// Transport sending every request relative to one base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Build a transport with an explicit per-request timeout.
    ///
    /// A base URL without a trailing slash is treated as a directory, so
    /// `http://host/api` and `http://host/api/` resolve endpoints identically.
    /// ```rust,ignore
    /// let transport = ReqwestTransport::new(base_url, Duration::from_secs(30));
    /// assert!(transport.is_ok() || transport.is_err());
    /// ```
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: directory_url(base_url),
        })
    }

    /// Base URL endpoints are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, request: &ApiRequest) -> Result<Url, HttpTransportError> {
        let path = request.endpoint.path();
        self.base_url.join(&path).map_err(|error| {
            HttpTransportError::invalid_request(format!("cannot resolve '{path}': {error}"))
        })
    }
}

fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

fn method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Delete => Method::DELETE,
    }
}

fn with_body(builder: RequestBuilder, body: &RequestBody) -> RequestBuilder {
    match body {
        RequestBody::Empty => builder,
        RequestBody::Json(value) => builder.json(value),
        RequestBody::Multipart { fields, file } => {
            let form = fields
                .iter()
                .fold(Form::new(), |form, (name, value)| {
                    form.text(name.clone(), value.clone())
                })
                .part(
                    file.field.clone(),
                    Part::bytes(file.bytes.clone()).file_name(file.file_name.clone()),
                );
            builder.multipart(form)
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<ApiResponse, HttpTransportError> {
        let url = self.resolve(request)?;
        let mut builder = self
            .client
            .request(method(request.method), url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(token) = bearer {
            debug!(path = %request.endpoint, "attaching bearer credential");
            builder = builder.bearer_auth(token);
        }

        let response = with_body(builder, &request.body)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_transport_error)?;
        debug!(path = %request.endpoint, status, "service responded");
        Ok(ApiResponse {
            status,
            body: body.to_vec(),
        })
    }
}

fn map_transport_error(error: reqwest::Error) -> HttpTransportError {
    if error.is_timeout() {
        HttpTransportError::timeout(error.to_string())
    } else if error.is_builder() {
        HttpTransportError::invalid_request(error.to_string())
    } else {
        HttpTransportError::connect(error.to_string())
    }
}
