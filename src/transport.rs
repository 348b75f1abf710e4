//! The HTTP transport capability the client sends requests through.
//!
//! The pipeline needs one thing from the network: send a fully built request
//! and hand back status, headers and body. [`ReqwestTransport`] is the default;
//! tests and embedders can plug in their own [`Transport`].

use crate::TransportError;
use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, StatusCode};
use reqwest::multipart::Form;
use std::time::Duration;
use url::Url;

/// A fully resolved, encoded request, as it goes out on the wire.
///
/// Interceptors receive and return this type.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL, query included.
    pub url: Url,
    /// The merged request headers.
    pub headers: HeaderMap,
    /// The encoded body, if any.
    pub body: Option<OutgoingBody>,
}

/// The body of an [`OutgoingRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingBody {
    /// Bytes sent as they are, described by the request's `Content-Type`.
    Bytes(Bytes),
    /// `multipart/form-data` fields, one text part each.
    ///
    /// The transport frames the parts and picks the boundary, so the
    /// `Content-Type` header is its to set.
    Form(Vec<(String, String)>),
}

impl OutgoingBody {
    /// The raw bytes, unless this is a multipart form.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            OutgoingBody::Bytes(bytes) => Some(bytes),
            OutgoingBody::Form(_) => None,
        }
    }
}

/// What the transport got back.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body; `None` when the server sent nothing.
    pub body: Option<Bytes>,
}

/// HTTP transport abstraction.
///
/// Dropping the returned future cancels the exchange; the client relies on this
/// to cancel in-flight requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends `request` and waits for the response.
    ///
    /// `timeout` bounds this single attempt.
    async fn send(
        &self,
        request: &OutgoingRequest,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError>;
}

/// A [`Transport`] backed by `reqwest`, which owns connection pooling, TLS and
/// redirects.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest` client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing `reqwest` client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: &OutgoingRequest,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError> {
        let mut headers = request.headers.clone();
        if matches!(request.body, Some(OutgoingBody::Form(_))) {
            headers.remove(CONTENT_TYPE);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder = match &request.body {
            Some(OutgoingBody::Bytes(body)) => builder.body(body.clone()),
            Some(OutgoingBody::Form(fields)) => builder.multipart(form(fields)),
            None => builder,
        };

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(TransportResponse {
            status,
            headers,
            body: if body.is_empty() { None } else { Some(body) },
        })
    }
}

fn form(fields: &[(String, String)]) -> Form {
    fields
        .iter()
        .fold(Form::new(), |form, (name, value)| form.text(name.clone(), value.clone()))
}
