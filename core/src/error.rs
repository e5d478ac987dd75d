//! Error types for the KlickTipp API client.
//!
//! # Design
//! The service contract has a two-tier taxonomy. Argument-validation problems
//! surface as `IllegalArguments` before any network traffic; remote and
//! transport problems surface as `Request` with the operation context and the
//! response's status text. `Login` is its own variant because login (and only
//! login) reports failures directly instead of through the connector's
//! last-error slot.

use thiserror::Error;

/// Errors returned by [`Connector`](crate::Connector) operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// A required argument was missing or empty. No request was sent.
    ///
    /// For resource operations this is also recorded in the connector's
    /// last-error slot, verbatim.
    #[error("Illegal Arguments")]
    IllegalArguments,

    /// Login failed, either locally ("Illegal Arguments") or remotely (the
    /// response's status text). Never recorded in the last-error slot.
    #[error("Login failed: {reason}")]
    Login { reason: String },

    /// A resource operation or logout failed after reaching the transport.
    /// Recorded in the connector's last-error slot before being returned.
    #[error("{context} failed: {reason}")]
    Request {
        /// Operation description, e.g. "Tag creation".
        context: &'static str,
        /// Status text of the failure, or a description of a response body
        /// that did not match the endpoint's schema.
        reason: String,
    },
}
