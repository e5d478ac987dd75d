//! Async client for the KlickTipp marketing-automation REST API.
//!
//! # Overview
//! One component, the [`Connector`]: it holds the base URL, the session
//! cookie pair obtained from [`Connector::login`], and a read-once last-error
//! slot, and exposes the resource catalog (subscription processes, tags,
//! contact fields, subscribers, and the API-key opt-in/opt-out flow). Every
//! operation funnels through a single internal dispatcher that attaches the
//! session cookie and normalizes the outcome.
//!
//! # Design
//! - HTTP I/O goes through the [`Transport`] trait; [`ReqwestTransport`] is
//!   the default and tests substitute a scripted stub.
//! - The transport never panics for HTTP-level failures: 4xx/5xx and network
//!   errors come back as the `Err` arm of one tagged outcome, so every
//!   resource method applies the same check.
//! - Resource-operation failures are recorded in the connector's last-error
//!   slot (destructive read via [`Connector::last_error`]) and returned as
//!   [`ApiError`]; `login` reports its failures directly and skips the slot.
//! - Operations take `&mut self`: a connector instance is sequential-use,
//!   one instance per logical session.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod connector;
pub mod error;
pub mod http;
pub mod transport;
pub mod types;

pub use connector::{Connector, Session, DEFAULT_BASE_URL};
pub use error::ApiError;
pub use http::{HttpFailure, HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport};
pub use types::{
    SigninOptions, SubscribeOptions, Subscriber, SubscriberUpdate, SubscriptionProcess, Tag,
};
