//! Plain-data HTTP types exchanged with the transport.
//!
//! # Design
//! The connector never talks to a socket itself. It builds an `HttpRequest`,
//! hands it to a [`Transport`](crate::transport::Transport), and gets back a
//! tagged outcome: `Ok(HttpResponse)` for 2xx, `Err(HttpFailure)` for
//! everything else including network-level errors. Because the failure arm is
//! ordinary data rather than a panic, every resource method can apply one
//! uniform check instead of handling exceptions.
//!
//! All fields use owned types (`String`, `Vec`) so values can be recorded,
//! cloned, and replayed by test transports without lifetime concerns.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// An HTTP request described as plain data.
///
/// Built by the connector's dispatcher. The transport is responsible for
/// executing it and returning either an [`HttpResponse`] or an
/// [`HttpFailure`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Absolute URL, base URL and endpoint path already joined.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// Look up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A successful (2xx) HTTP response described as plain data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A failed round trip: any non-2xx response or a network-level error.
///
/// For failures with no HTTP response at all (connection refused, timeout),
/// `status` is `0` and `status_text` carries the transport's description.
#[derive(Debug, Clone)]
pub struct HttpFailure {
    pub status: u16,
    /// Canonical reason phrase ("Not Found", "Unauthorized", ...), or the
    /// transport error description when no response was received.
    pub status_text: String,
    /// Response body, when one was received.
    pub message: String,
}
