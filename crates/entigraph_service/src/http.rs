//! HTTP transport implementation.
//!
//! Maps the [`Transport`] operations onto a REST-style JSON API:
//!
//! | operation | request |
//! |-----------|---------|
//! | `read`  | `GET {base}/{resource}/{id}` |
//! | `list`  | `GET {base}/{resource}?k=v&…` |
//! | `write` | `PUT {base}/{resource}/{id}` with a JSON body |
//!
//! The actual HTTP client is abstracted via a trait so any library
//! (reqwest, hyper, a browser fetch bridge) can be plugged in.

use crate::error::{ServiceError, ServiceResult};
use crate::filter::Filter;
use crate::transport::Transport;
use async_trait::async_trait;
use entigraph_core::{payload_from_value, EntityId, RawPayload};
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

/// HTTP method used by [`HttpTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `PUT`
    Put,
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// JSON body, for writes.
    pub body: Option<Vec<u8>>,
}

/// A received response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with a JSON body.
    pub fn json(status: u16, body: &Value) -> Self {
        Self {
            status,
            body: body.to_string().into_bytes(),
        }
    }
}

/// HTTP client abstraction.
///
/// Authentication, timeouts and connection pooling belong to the
/// implementation.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request. `Err` means no response was received at all.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// JSON-over-HTTP transport.
pub struct HttpTransport<C: HttpClient> {
    /// Base URL of the API (e.g. "https://api.example.com/api").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport. A trailing `/` on `base_url` is ignored.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns the underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn record_url(&self, resource: &str, id: &EntityId) -> String {
        format!("{}/{}/{}", self.base_url, resource, id)
    }

    async fn exchange(
        &self,
        request: HttpRequest,
        resource: &str,
        id: Option<&EntityId>,
    ) -> ServiceResult<Value> {
        if !self.client.is_healthy() {
            return Err(ServiceError::transport_retryable("http client is unhealthy"));
        }

        debug!(method = ?request.method, url = %request.url, "http request");
        let response = self.client.send(request).await.map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            ServiceError::transport_retryable(e)
        })?;

        let result = match response.status {
            200..=299 => serde_json::from_slice(&response.body)
                .map_err(|e| ServiceError::Protocol(format!("invalid response body: {e}"))),
            404 => Err(match id {
                Some(id) => ServiceError::not_found(resource, id.clone()),
                None => ServiceError::transport_fatal(format!("{resource}: 404 not found")),
            }),
            status @ 500..=599 => Err(ServiceError::transport_retryable(format!(
                "{resource}: server returned {status}"
            ))),
            status => Err(ServiceError::transport_fatal(format!(
                "{resource}: request rejected with {status}"
            ))),
        };

        match &result {
            Ok(_) => *self.last_error.write() = None,
            Err(e) => *self.last_error.write() = Some(e.to_string()),
        }
        result
    }
}

#[async_trait]
impl<C: HttpClient> Transport for HttpTransport<C> {
    async fn read(&self, resource: &str, id: &EntityId) -> ServiceResult<RawPayload> {
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.record_url(resource, id),
            body: None,
        };
        let body = self.exchange(request, resource, Some(id)).await?;
        Ok(payload_from_value(body)?)
    }

    async fn list(&self, resource: &str, filter: &Filter) -> ServiceResult<Vec<RawPayload>> {
        let mut url = format!("{}/{}", self.base_url, resource);
        if !filter.is_empty() {
            url.push('?');
            url.push_str(&filter.to_query_string());
        }
        let request = HttpRequest {
            method: HttpMethod::Get,
            url,
            body: None,
        };

        match self.exchange(request, resource, None).await? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| payload_from_value(item).map_err(ServiceError::from))
                .collect(),
            other => Err(ServiceError::Protocol(format!(
                "expected an array from {resource}, found {other}"
            ))),
        }
    }

    async fn write(
        &self,
        resource: &str,
        id: &EntityId,
        payload: &RawPayload,
    ) -> ServiceResult<RawPayload> {
        let body = serde_json::to_vec(payload)
            .map_err(|e| ServiceError::Protocol(format!("failed to encode request: {e}")))?;
        let request = HttpRequest {
            method: HttpMethod::Put,
            url: self.record_url(resource, id),
            body: Some(body),
        };
        let body = self.exchange(request, resource, Some(id)).await?;
        Ok(payload_from_value(body)?)
    }
}
