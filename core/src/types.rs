//! Request payloads and response DTOs for the KlickTipp API.
//!
//! # Design
//! These types pin down the wire schema per endpoint instead of passing
//! untyped JSON through. Request payloads use `skip_serializing_if` so fields
//! the caller never supplied are omitted entirely — the service treats a
//! missing key differently from one set to an empty value. Response DTOs type
//! the documented fields and collect anything extra through `serde(flatten)`,
//! since the service's schemas grow additively. The mock-server crate defines
//! its schema independently; integration tests catch drift between the two.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Response DTOs
// ---------------------------------------------------------------------------

/// Session pair issued by `/account/login`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginAck {
    pub sessid: String,
    pub session_name: String,
}

/// A subscription process (list) definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionProcess {
    #[serde(default)]
    pub listid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pendingurl: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub thankyouurl: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A manual tag definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub tagid: String,
    #[serde(default)]
    pub name: String,
    /// Optional tag description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A subscriber record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub smsnumber: String,
    #[serde(default)]
    pub status: String,
    /// Ids of the manual tags currently applied to this subscriber.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Custom contact-field values keyed by field id.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

// ---------------------------------------------------------------------------
// Optional-argument carriers
// ---------------------------------------------------------------------------

/// Optional arguments for [`Connector::subscribe`](crate::Connector::subscribe).
///
/// Unset fields are omitted from the request body. An empty string counts as
/// unset.
#[derive(Debug, Clone, Default)]
pub struct SubscribeOptions {
    /// Subscription process the contact opts into.
    pub listid: Option<String>,
    /// Manual tag applied on subscription.
    pub tagid: Option<String>,
    /// Custom contact-field values keyed by field id. Always sent, possibly
    /// empty.
    pub fields: HashMap<String, String>,
    /// SMS number; may stand in for the email address.
    pub smsnumber: Option<String>,
}

/// Optional arguments for
/// [`Connector::subscriber_update`](crate::Connector::subscriber_update).
#[derive(Debug, Clone, Default)]
pub struct SubscriberUpdate {
    /// Contact-field values to overwrite. Always sent, possibly empty.
    pub fields: HashMap<String, String>,
    pub newemail: Option<String>,
    pub newsmsnumber: Option<String>,
}

/// Optional arguments for [`Connector::signin`](crate::Connector::signin).
#[derive(Debug, Clone, Default)]
pub struct SigninOptions {
    /// Custom contact-field values keyed by field id. Always sent, possibly
    /// empty.
    pub fields: HashMap<String, String>,
    /// SMS number; may stand in for the email address.
    pub smsnumber: Option<String>,
}

// ---------------------------------------------------------------------------
// Request payloads (wire only)
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct RedirectBody<'a> {
    pub listid: &'a str,
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TagCreateBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TagUpdateBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
}

/// The service expects `email` and `fields` even when empty; only the
/// remaining keys are conditional.
#[derive(Debug, Serialize)]
pub(crate) struct SubscribeBody<'a> {
    pub email: &'a str,
    pub fields: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smsnumber: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listid: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tagid: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailBody<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TagApplyBody<'a> {
    pub email: &'a str,
    pub tagids: &'a [&'a str],
}

#[derive(Debug, Serialize)]
pub(crate) struct UntagBody<'a> {
    pub email: &'a str,
    pub tagid: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResendBody<'a> {
    pub email: &'a str,
    pub autoresponder: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TaggedBody<'a> {
    pub tagid: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubscriberUpdateBody<'a> {
    pub fields: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newemail: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newsmsnumber: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct SigninBody<'a> {
    pub apikey: &'a str,
    pub email: &'a str,
    pub fields: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smsnumber: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiKeyBody<'a> {
    pub apikey: &'a str,
    pub email: &'a str,
}
