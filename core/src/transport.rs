//! Blocking transports that execute one `HttpRequest` and return the raw
//! response bytes.
//!
//! # Design
//! The dispatcher owns parsing, so a transport only moves bytes: the status
//! line, headers and body of the final response, framed as an HTTP/1.x
//! message. Tests plug in an in-memory transport; `UreqTransport` is the
//! real one.

use std::fmt;
use std::time::Duration;

use ureq::http::Version;

use crate::error::ApiError;
use crate::http::{Headers, HttpMethod, HttpRequest};

/// Executes exactly one blocking round-trip per call.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError> {
        (**self).execute(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError> {
        (**self).execute(request)
    }
}

/// ureq-backed transport.
///
/// Non-2xx statuses come back as data, redirects are followed, and idle
/// connections are not kept, so the socket of a call is closed before the
/// call returns. Every failure before a full response is read, including the
/// global timeout, is a `TransportError`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport").finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .max_idle_connections(0)
            .max_idle_connections_per_host(0)
            .build()
            .new_agent();
        Self { agent }
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &Headers) -> ureq::RequestBuilder<B> {
    for (name, value) in headers.iter() {
        builder = builder.header(name, value);
    }
    builder
}

fn transport_error(err: ureq::Error) -> ApiError {
    ApiError::TransportError(err.to_string())
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<Vec<u8>, ApiError> {
        let url = request.url.as_str();
        let body = request.body.as_deref().unwrap_or_default();

        let result = match request.method {
            HttpMethod::Get => with_headers(self.agent.get(url), &request.headers).call(),
            HttpMethod::Delete => with_headers(self.agent.delete(url), &request.headers).call(),
            HttpMethod::Post => with_headers(self.agent.post(url), &request.headers).send(body),
            HttpMethod::Patch => with_headers(self.agent.patch(url), &request.headers).send(body),
        };
        let response = result.map_err(transport_error)?;

        let version = match response.version() {
            Version::HTTP_10 => "HTTP/1.0",
            Version::HTTP_2 => "HTTP/2",
            _ => "HTTP/1.1",
        };
        let status = response.status();
        let mut head = format!(
            "{version} {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or_default()
        );
        for (name, value) in response.headers() {
            let value = value.to_str().map_err(|_| {
                ApiError::MalformedResponse(format!("header {name} is not visible ASCII"))
            })?;
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        let body = response.into_body().read_to_vec().map_err(transport_error)?;
        raw.extend_from_slice(&body);
        Ok(raw)
    }
}
