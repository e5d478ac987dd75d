//! The transport collaborator and its default reqwest implementation.
//!
//! # Design
//! [`Transport`] is the connector's only seam to the outside world. Its
//! contract mirrors the wire types in [`http`](crate::http): it must never
//! panic for HTTP-level failures — 4xx/5xx responses and network errors are
//! both returned as the `Err(HttpFailure)` arm, so callers interpret one
//! tagged outcome instead of catching anything. Tests substitute a stub
//! transport; production code uses [`ReqwestTransport`].

use async_trait::async_trait;
use reqwest::Client;

use crate::http::{HttpFailure, HttpMethod, HttpRequest, HttpResponse};

/// Executes an [`HttpRequest`] and returns the tagged outcome.
///
/// Implementations must return `Ok` only for 2xx responses and must map every
/// other condition, including network-level errors, to `Err(HttpFailure)`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure>;
}

/// Default [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|err| HttpFailure {
            status: 0,
            status_text: err.to_string(),
            message: err.to_string(),
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(HttpResponse {
                status: status.as_u16(),
                headers,
                body,
            })
        } else {
            Err(HttpFailure {
                status: status.as_u16(),
                status_text: status
                    .canonical_reason()
                    .unwrap_or("Unknown Status")
                    .to_string(),
                message: body,
            })
        }
    }
}
