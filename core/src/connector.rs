//! The connector: session state, the shared dispatcher, and the resource
//! operation catalog.
//!
//! # Design
//! `Connector` holds the base URL (fixed at construction), the session cookie
//! pair, and the read-once last-error slot. Every resource operation funnels
//! through one `dispatch` function that attaches the session cookie and
//! returns the transport's tagged outcome; the per-operation methods are the
//! same template over and over — validate arguments, build path and body,
//! dispatch, interpret.
//!
//! Error reporting is deliberately asymmetric: `login` returns its failures
//! directly and never touches the last-error slot, while `logout` and all
//! resource operations record a human-readable message in the slot before
//! returning the error. Callers that only care about success can ignore the
//! slot; callers that want the detail read it once via [`Connector::last_error`].
//!
//! Every operation takes `&mut self`, so one connector instance is
//! sequential-use by construction. Concurrent sessions take one instance
//! each.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::ApiError;
use crate::http::{HttpFailure, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{
    ApiKeyBody, EmailBody, LoginAck, LoginBody, RedirectBody, ResendBody, SigninBody,
    SigninOptions, SubscribeBody, SubscribeOptions, Subscriber, SubscriberUpdate,
    SubscriberUpdateBody, SubscriptionProcess, Tag, TagApplyBody, TagCreateBody, TagUpdateBody,
    TaggedBody, UntagBody,
};

/// Production endpoint of the KlickTipp service.
pub const DEFAULT_BASE_URL: &str = "https://api.klicktipp.com";

/// Session cookie pair obtained from a successful login.
///
/// Both fields are empty while logged out. The pair is attached to
/// session-using requests as `Cookie: {name}={id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub name: String,
    pub id: String,
}

impl Session {
    /// A session counts as established once a non-empty cookie name is held.
    pub fn is_established(&self) -> bool {
        !self.name.is_empty()
    }

    fn cookie(&self) -> String {
        format!("{}={}", self.name, self.id)
    }

    fn clear(&mut self) {
        self.name.clear();
        self.id.clear();
    }
}

/// Client for the KlickTipp marketing-automation API.
///
/// Holds the connection configuration and session state and exposes the
/// resource catalog (subscription processes, tags, fields, subscribers).
/// Construct with [`Connector::new`] for the production service, or
/// [`Connector::with_base_url`] / [`Connector::with_transport`] to point it
/// elsewhere.
pub struct Connector {
    base_url: String,
    session: Session,
    /// Last-error slot; read-once via [`Connector::last_error`].
    error: String,
    transport: Box<dyn Transport>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    /// Connector against the production service, using the default reqwest
    /// transport.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Connector against a custom endpoint. A trailing `/` is stripped.
    pub fn with_base_url(base_url: &str) -> Self {
        Self::with_transport(base_url, Box::new(ReqwestTransport::new()))
    }

    /// Connector with an injected transport, for tests or alternative HTTP
    /// stacks.
    pub fn with_transport(base_url: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session: Session::default(),
            error: String::new(),
            transport,
        }
    }

    /// The current session pair. Empty unless logged in.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Return the last recorded error description and reset the slot.
    ///
    /// Read-once: a second call with no intervening failure returns an empty
    /// string.
    pub fn last_error(&mut self) -> String {
        std::mem::take(&mut self.error)
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    /// Log in and store the returned session pair.
    ///
    /// Unlike the resource operations, failures are returned directly as
    /// [`ApiError::Login`] and never recorded in the last-error slot.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<(), ApiError> {
        if username.is_empty() || password.is_empty() {
            return Err(ApiError::Login {
                reason: "Illegal Arguments".to_string(),
            });
        }

        let body = serde_json::to_string(&LoginBody { username, password }).map_err(|err| {
            ApiError::Login {
                reason: format!("could not encode request body ({err})"),
            }
        })?;

        // No session cookie on the login request itself.
        match self
            .dispatch("/account/login", HttpMethod::Post, Some(body), false)
            .await
        {
            Ok(response) => {
                let ack: LoginAck = serde_json::from_str(&response.body).map_err(|err| {
                    ApiError::Login {
                        reason: format!("invalid response body ({err})"),
                    }
                })?;
                self.session = Session {
                    name: ack.session_name,
                    id: ack.sessid,
                };
                Ok(())
            }
            Err(failure) => Err(ApiError::Login {
                reason: failure.status_text,
            }),
        }
    }

    /// Log out the current session.
    ///
    /// The session pair is cleared only on success; a failed logout records
    /// the error and leaves the session untouched.
    pub async fn logout(&mut self) -> Result<(), ApiError> {
        self.request("Logout", "/account/logout", HttpMethod::Post, None)
            .await?;
        self.session.clear();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Subscription processes (lists)
    // -----------------------------------------------------------------------

    /// All subscription processes of the logged-in user, as list id → name.
    pub async fn subscription_process_index(&mut self) -> Result<HashMap<String, String>, ApiError> {
        const CONTEXT: &str = "Subscription process index";
        let response = self.request(CONTEXT, "/list", HttpMethod::Get, None).await?;
        self.decode(CONTEXT, &response)
    }

    /// A single subscription process definition.
    pub async fn subscription_process_get(
        &mut self,
        listid: &str,
    ) -> Result<SubscriptionProcess, ApiError> {
        const CONTEXT: &str = "Subscription process get";
        if listid.is_empty() {
            return self.illegal_arguments();
        }
        // The service routes list definitions through /subscriber/{listid},
        // not /list/{listid}.
        let response = self
            .request(CONTEXT, &format!("/subscriber/{listid}"), HttpMethod::Get, None)
            .await?;
        self.decode(CONTEXT, &response)
    }

    /// The redirection URL a subscription process defines for a subscriber.
    pub async fn subscription_process_redirect(
        &mut self,
        listid: &str,
        email: &str,
    ) -> Result<String, ApiError> {
        const CONTEXT: &str = "Subscription process get redirection url";
        if listid.is_empty() || email.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &RedirectBody { listid, email })?;
        let response = self
            .request(CONTEXT, "/list/redirect", HttpMethod::Post, Some(body))
            .await?;
        self.decode(CONTEXT, &response)
    }

    // -----------------------------------------------------------------------
    // Tags
    // -----------------------------------------------------------------------

    /// All manual tags of the logged-in user, as tag id → name.
    pub async fn tag_index(&mut self) -> Result<HashMap<String, String>, ApiError> {
        const CONTEXT: &str = "Tag index";
        let response = self.request(CONTEXT, "/tag", HttpMethod::Get, None).await?;
        self.decode(CONTEXT, &response)
    }

    /// A single tag definition.
    pub async fn tag_get(&mut self, tagid: &str) -> Result<Tag, ApiError> {
        const CONTEXT: &str = "Tag get";
        if tagid.is_empty() {
            return self.illegal_arguments();
        }
        let response = self
            .request(CONTEXT, &format!("/tag/{tagid}"), HttpMethod::Get, None)
            .await?;
        self.decode(CONTEXT, &response)
    }

    /// Create a manual tag and return the id the service assigned to it.
    /// `text` is an optional description; empty means unset.
    pub async fn tag_create(&mut self, name: &str, text: &str) -> Result<String, ApiError> {
        const CONTEXT: &str = "Tag creation";
        if name.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(
            CONTEXT,
            &TagCreateBody {
                name,
                text: non_empty(text),
            },
        )?;
        let response = self
            .request(CONTEXT, "/tag", HttpMethod::Post, Some(body))
            .await?;
        self.decode_id(CONTEXT, &response)
    }

    /// Rename a tag and/or replace its description. Empty arguments are left
    /// unchanged on the server; at least one of `name`/`text` must be given.
    pub async fn tag_update(
        &mut self,
        tagid: &str,
        name: &str,
        text: &str,
    ) -> Result<(), ApiError> {
        const CONTEXT: &str = "Tag update";
        if tagid.is_empty() || (name.is_empty() && text.is_empty()) {
            return self.illegal_arguments();
        }
        let body = self.encode(
            CONTEXT,
            &TagUpdateBody {
                name: non_empty(name),
                text: non_empty(text),
            },
        )?;
        self.request(CONTEXT, &format!("/tag/{tagid}"), HttpMethod::Put, Some(body))
            .await?;
        Ok(())
    }

    /// Delete a tag.
    pub async fn tag_delete(&mut self, tagid: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Tag deletion";
        if tagid.is_empty() {
            return self.illegal_arguments();
        }
        self.request(CONTEXT, &format!("/tag/{tagid}"), HttpMethod::Delete, None)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Fields
    // -----------------------------------------------------------------------

    /// All contact fields of the logged-in user, as field id → name.
    pub async fn field_index(&mut self) -> Result<HashMap<String, String>, ApiError> {
        const CONTEXT: &str = "Field index";
        let response = self.request(CONTEXT, "/field", HttpMethod::Get, None).await?;
        self.decode(CONTEXT, &response)
    }

    // -----------------------------------------------------------------------
    // Subscribers
    // -----------------------------------------------------------------------

    /// Subscribe a contact and return the resulting subscriber record.
    /// Requires an email address or `opts.smsnumber`.
    pub async fn subscribe(
        &mut self,
        email: &str,
        opts: &SubscribeOptions,
    ) -> Result<Subscriber, ApiError> {
        const CONTEXT: &str = "Subscription";
        let smsnumber = opts.smsnumber.as_deref().filter(|s| !s.is_empty());
        if email.is_empty() && smsnumber.is_none() {
            return self.illegal_arguments();
        }
        let body = self.encode(
            CONTEXT,
            &SubscribeBody {
                email,
                fields: &opts.fields,
                smsnumber,
                listid: opts.listid.as_deref().filter(|s| !s.is_empty()),
                tagid: opts.tagid.as_deref().filter(|s| !s.is_empty()),
            },
        )?;
        let response = self
            .request(CONTEXT, "/subscriber", HttpMethod::Post, Some(body))
            .await?;
        self.decode(CONTEXT, &response)
    }

    /// Unsubscribe an email address.
    pub async fn unsubscribe(&mut self, email: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Unsubscription";
        if email.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &EmailBody { email })?;
        self.request(CONTEXT, "/subscriber/unsubscribe", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Apply one or more manual tags to a subscriber.
    pub async fn tag(&mut self, email: &str, tagids: &[&str]) -> Result<(), ApiError> {
        const CONTEXT: &str = "Tagging";
        if email.is_empty() || tagids.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &TagApplyBody { email, tagids })?;
        self.request(CONTEXT, "/subscriber/tag", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Remove a manual tag from a subscriber.
    pub async fn untag(&mut self, email: &str, tagid: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Untagging";
        if email.is_empty() || tagid.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &UntagBody { email, tagid })?;
        self.request(CONTEXT, "/subscriber/untag", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Resend (reset) an autoresponder for an email address.
    pub async fn resend(&mut self, email: &str, autoresponder: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Resend";
        if email.is_empty() || autoresponder.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &ResendBody { email, autoresponder })?;
        self.request(CONTEXT, "/subscriber/resend", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Ids of all active subscribers.
    pub async fn subscriber_index(&mut self) -> Result<Vec<String>, ApiError> {
        const CONTEXT: &str = "Subscriber index";
        let response = self
            .request(CONTEXT, "/subscriber", HttpMethod::Get, None)
            .await?;
        let values: Vec<Value> = self.decode(CONTEXT, &response)?;
        let mut ids = Vec::with_capacity(values.len());
        for value in &values {
            match id_string(value) {
                Some(id) => ids.push(id),
                None => {
                    return Err(self.record(CONTEXT, format!("unexpected id payload: {value}")))
                }
            }
        }
        Ok(ids)
    }

    /// A single subscriber record.
    pub async fn subscriber_get(&mut self, subscriberid: &str) -> Result<Subscriber, ApiError> {
        const CONTEXT: &str = "Subscriber get";
        if subscriberid.is_empty() {
            return self.illegal_arguments();
        }
        let response = self
            .request(CONTEXT, &format!("/subscriber/{subscriberid}"), HttpMethod::Get, None)
            .await?;
        self.decode(CONTEXT, &response)
    }

    /// Look up a subscriber id by email address.
    pub async fn subscriber_search(&mut self, email: &str) -> Result<String, ApiError> {
        const CONTEXT: &str = "Subscriber search";
        if email.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &EmailBody { email })?;
        let response = self
            .request(CONTEXT, "/subscriber/search", HttpMethod::Post, Some(body))
            .await?;
        self.decode_id(CONTEXT, &response)
    }

    /// Active subscribers carrying a tag, as subscriber id → tagging date.
    pub async fn subscriber_tagged(
        &mut self,
        tagid: &str,
    ) -> Result<HashMap<String, String>, ApiError> {
        const CONTEXT: &str = "Subscriber tagged";
        if tagid.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &TaggedBody { tagid })?;
        let response = self
            .request(CONTEXT, "/subscriber/tagged", HttpMethod::Post, Some(body))
            .await?;
        self.decode(CONTEXT, &response)
    }

    /// Update a subscriber's contact fields and/or addresses.
    pub async fn subscriber_update(
        &mut self,
        subscriberid: &str,
        opts: &SubscriberUpdate,
    ) -> Result<(), ApiError> {
        const CONTEXT: &str = "Subscriber update";
        if subscriberid.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(
            CONTEXT,
            &SubscriberUpdateBody {
                fields: &opts.fields,
                newemail: opts.newemail.as_deref().filter(|s| !s.is_empty()),
                newsmsnumber: opts.newsmsnumber.as_deref().filter(|s| !s.is_empty()),
            },
        )?;
        self.request(
            CONTEXT,
            &format!("/subscriber/{subscriberid}"),
            HttpMethod::Put,
            Some(body),
        )
        .await?;
        Ok(())
    }

    /// Delete a subscriber.
    pub async fn subscriber_delete(&mut self, subscriberid: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Subscriber deletion";
        if subscriberid.is_empty() {
            return self.illegal_arguments();
        }
        self.request(
            CONTEXT,
            &format!("/subscriber/{subscriberid}"),
            HttpMethod::Delete,
            None,
        )
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // API-key flow (public opt-in/opt-out forms, no session required)
    // -----------------------------------------------------------------------

    /// Subscribe a contact via a list-building API key.
    /// Requires the key plus an email address or `opts.smsnumber`.
    pub async fn signin(
        &mut self,
        apikey: &str,
        email: &str,
        opts: &SigninOptions,
    ) -> Result<(), ApiError> {
        const CONTEXT: &str = "Subscription";
        let smsnumber = opts.smsnumber.as_deref().filter(|s| !s.is_empty());
        if apikey.is_empty() || (email.is_empty() && smsnumber.is_none()) {
            return self.illegal_arguments();
        }
        let body = self.encode(
            CONTEXT,
            &SigninBody {
                apikey,
                email,
                fields: &opts.fields,
                smsnumber,
            },
        )?;
        self.request(CONTEXT, "/subscriber/signin", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Remove the key's tag from a subscriber via a list-building API key.
    pub async fn signout(&mut self, apikey: &str, email: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Untagging";
        if apikey.is_empty() || email.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &ApiKeyBody { apikey, email })?;
        self.request(CONTEXT, "/subscriber/signout", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    /// Unsubscribe a contact via a list-building API key.
    pub async fn signoff(&mut self, apikey: &str, email: &str) -> Result<(), ApiError> {
        const CONTEXT: &str = "Unsubscription";
        if apikey.is_empty() || email.is_empty() {
            return self.illegal_arguments();
        }
        let body = self.encode(CONTEXT, &ApiKeyBody { apikey, email })?;
        self.request(CONTEXT, "/subscriber/signoff", HttpMethod::Post, Some(body))
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Dispatcher and shared plumbing
    // -----------------------------------------------------------------------

    /// Build a request against `base_url + path`, attach the session cookie
    /// when applicable, and return the transport's outcome unmodified.
    async fn dispatch(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<String>,
        use_session: bool,
    ) -> Result<HttpResponse, HttpFailure> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            // The service expects this duplicate of Content-Type under a
            // non-standard name.
            ("Content".to_string(), "application/json".to_string()),
        ];
        if use_session && self.session.is_established() {
            headers.push(("Cookie".to_string(), self.session.cookie()));
        }

        let request = HttpRequest {
            method,
            url: format!("{}{}", self.base_url, path),
            headers,
            body,
        };
        debug!(method = %request.method, path, use_session, "dispatching request");

        let outcome = self.transport.send(request).await;
        if let Err(failure) = &outcome {
            debug!(
                status = failure.status,
                status_text = %failure.status_text,
                path,
                "request failed"
            );
        }
        outcome
    }

    /// Session-using dispatch with the uniform failure policy of the resource
    /// catalog: a failure outcome is recorded in the last-error slot and
    /// returned as [`ApiError::Request`].
    async fn request(
        &mut self,
        context: &'static str,
        path: &str,
        method: HttpMethod,
        body: Option<String>,
    ) -> Result<HttpResponse, ApiError> {
        match self.dispatch(path, method, body, true).await {
            Ok(response) => Ok(response),
            Err(failure) => Err(self.record(context, failure.status_text)),
        }
    }

    /// Record a validation failure and surface it, without touching the
    /// transport.
    fn illegal_arguments<T>(&mut self) -> Result<T, ApiError> {
        self.error = ApiError::IllegalArguments.to_string();
        Err(ApiError::IllegalArguments)
    }

    /// Record a failure in the last-error slot and return it.
    fn record(&mut self, context: &'static str, reason: String) -> ApiError {
        let err = ApiError::Request { context, reason };
        self.error = err.to_string();
        err
    }

    fn encode<T: Serialize>(&mut self, context: &'static str, body: &T) -> Result<String, ApiError> {
        serde_json::to_string(body)
            .map_err(|err| self.record(context, format!("could not encode request body ({err})")))
    }

    fn decode<T: DeserializeOwned>(
        &mut self,
        context: &'static str,
        response: &HttpResponse,
    ) -> Result<T, ApiError> {
        serde_json::from_str(&response.body)
            .map_err(|err| self.record(context, format!("invalid response body ({err})")))
    }

    /// Decode a response whose payload is a bare id. The service reports ids
    /// either as a JSON string or a number; both normalize to `String`.
    fn decode_id(
        &mut self,
        context: &'static str,
        response: &HttpResponse,
    ) -> Result<String, ApiError> {
        let value: Value = self.decode(context, response)?;
        id_string(&value).ok_or_else(|| self.record(context, format!("unexpected id payload: {value}")))
    }
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;

    const BASE: &str = "http://service.test";
    const LOGIN_ACK: &str = r#"{"sessid":"abc123","session_name":"SESSkt"}"#;

    /// Transport that records every request and replays scripted outcomes.
    #[derive(Clone, Default)]
    struct StubTransport {
        requests: Arc<Mutex<Vec<HttpRequest>>>,
        outcomes: Arc<Mutex<VecDeque<Result<HttpResponse, HttpFailure>>>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpFailure> {
            self.requests.lock().unwrap().push(request);
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .expect("no scripted outcome left")
        }
    }

    fn ok(body: &str) -> Result<HttpResponse, HttpFailure> {
        Ok(HttpResponse {
            status: 200,
            headers: Vec::new(),
            body: body.to_string(),
        })
    }

    fn failed(status: u16, status_text: &str) -> Result<HttpResponse, HttpFailure> {
        Err(HttpFailure {
            status,
            status_text: status_text.to_string(),
            message: String::new(),
        })
    }

    fn connector(
        outcomes: Vec<Result<HttpResponse, HttpFailure>>,
    ) -> (Connector, StubTransport) {
        let stub = StubTransport {
            requests: Arc::default(),
            outcomes: Arc::new(Mutex::new(outcomes.into())),
        };
        let conn = Connector::with_transport(BASE, Box::new(stub.clone()));
        (conn, stub)
    }

    fn sent(stub: &StubTransport) -> Vec<HttpRequest> {
        stub.requests.lock().unwrap().clone()
    }

    fn body_json(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    // -- validation ---------------------------------------------------------

    #[tokio::test]
    async fn missing_required_argument_skips_transport_and_sets_last_error() {
        let (mut conn, stub) = connector(Vec::new());

        assert_eq!(conn.tag_get("").await, Err(ApiError::IllegalArguments));
        assert!(sent(&stub).is_empty(), "no request may be sent");
        assert_eq!(conn.last_error(), "Illegal Arguments");
        // Read-once: the slot is now empty again.
        assert_eq!(conn.last_error(), "");
    }

    #[tokio::test]
    async fn every_validated_operation_rejects_empty_arguments() {
        let (mut conn, stub) = connector(Vec::new());
        let err = Err(ApiError::IllegalArguments);

        assert_eq!(conn.subscription_process_get("").await.map(|_| ()), err);
        assert_eq!(conn.subscription_process_redirect("", "a@b.test").await.map(|_| ()), err);
        assert_eq!(conn.subscription_process_redirect("1", "").await.map(|_| ()), err);
        assert_eq!(conn.tag_get("").await.map(|_| ()), err);
        assert_eq!(conn.tag_create("", "").await.map(|_| ()), err);
        assert_eq!(conn.tag_update("", "n", "").await, err);
        assert_eq!(conn.tag_update("5", "", "").await, err);
        assert_eq!(conn.tag_delete("").await, err);
        assert_eq!(
            conn.subscribe("", &SubscribeOptions::default()).await.map(|_| ()),
            err
        );
        assert_eq!(conn.unsubscribe("").await, err);
        assert_eq!(conn.tag("", &["1"]).await, err);
        assert_eq!(conn.tag("a@b.test", &[]).await, err);
        assert_eq!(conn.untag("a@b.test", "").await, err);
        assert_eq!(conn.resend("", "7").await, err);
        assert_eq!(conn.subscriber_get("").await.map(|_| ()), err);
        assert_eq!(conn.subscriber_search("").await.map(|_| ()), err);
        assert_eq!(conn.subscriber_tagged("").await.map(|_| ()), err);
        assert_eq!(
            conn.subscriber_update("", &SubscriberUpdate::default()).await,
            err
        );
        assert_eq!(conn.subscriber_delete("").await, err);
        assert_eq!(conn.signin("", "a@b.test", &SigninOptions::default()).await, err);
        assert_eq!(conn.signin("key", "", &SigninOptions::default()).await, err);
        assert_eq!(conn.signout("key", "").await, err);
        assert_eq!(conn.signoff("", "a@b.test").await, err);

        assert!(sent(&stub).is_empty());
        assert_eq!(conn.last_error(), "Illegal Arguments");
    }

    #[tokio::test]
    async fn login_with_missing_argument_raises_without_transport_call() {
        let (mut conn, stub) = connector(Vec::new());

        for (user, pass) in [("", "pw"), ("user", "")] {
            let err = conn.login(user, pass).await.unwrap_err();
            assert!(err.to_string().contains("Illegal Arguments"), "{err}");
        }
        assert!(sent(&stub).is_empty());
        // The asymmetry: login failures never reach the last-error slot.
        assert_eq!(conn.last_error(), "");
    }

    // -- session lifecycle --------------------------------------------------

    #[tokio::test]
    async fn login_stores_session_and_subsequent_calls_carry_the_cookie() {
        let (mut conn, stub) = connector(vec![ok(LOGIN_ACK), ok("{}")]);

        conn.login("user", "secret").await.unwrap();
        assert_eq!(conn.session().name, "SESSkt");
        assert_eq!(conn.session().id, "abc123");

        conn.tag_index().await.unwrap();

        let requests = sent(&stub);
        let login = &requests[0];
        assert_eq!(login.url, format!("{BASE}/account/login"));
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.header("Cookie"), None, "login must not send a session");
        assert_eq!(
            body_json(login),
            serde_json::json!({ "username": "user", "password": "secret" })
        );

        let index = &requests[1];
        assert_eq!(index.header("Cookie"), Some("SESSkt=abc123"));
    }

    #[tokio::test]
    async fn calls_before_login_omit_the_cookie_header() {
        let (mut conn, stub) = connector(vec![ok("{}")]);
        conn.tag_index().await.unwrap();
        assert_eq!(sent(&stub)[0].header("Cookie"), None);
    }

    #[tokio::test]
    async fn every_request_carries_both_json_content_headers() {
        let (mut conn, stub) = connector(vec![ok("{}")]);
        conn.field_index().await.unwrap();

        let request = &sent(&stub)[0];
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert_eq!(request.header("Content"), Some("application/json"));
    }

    #[tokio::test]
    async fn remote_login_failure_raises_and_leaves_last_error_empty() {
        let (mut conn, _stub) = connector(vec![failed(403, "Forbidden")]);

        let err = conn.login("user", "wrong").await.unwrap_err();
        assert_eq!(err.to_string(), "Login failed: Forbidden");
        assert!(!conn.session().is_established());
        assert_eq!(conn.last_error(), "");
    }

    #[tokio::test]
    async fn successful_logout_clears_the_session() {
        let (mut conn, stub) = connector(vec![ok(LOGIN_ACK), ok("true"), ok("{}")]);

        conn.login("user", "secret").await.unwrap();
        conn.logout().await.unwrap();
        assert!(!conn.session().is_established());

        conn.tag_index().await.unwrap();
        let requests = sent(&stub);
        assert_eq!(requests[1].url, format!("{BASE}/account/logout"));
        assert_eq!(requests[1].header("Cookie"), Some("SESSkt=abc123"));
        assert_eq!(requests[2].header("Cookie"), None, "session must be gone");
    }

    #[tokio::test]
    async fn failed_logout_records_error_and_keeps_the_session() {
        let (mut conn, _stub) = connector(vec![ok(LOGIN_ACK), failed(500, "Internal Server Error")]);

        conn.login("user", "secret").await.unwrap();
        let err = conn.logout().await.unwrap_err();
        assert_eq!(err.to_string(), "Logout failed: Internal Server Error");
        assert!(conn.session().is_established(), "no forced invalidation");
        assert_eq!(conn.last_error(), "Logout failed: Internal Server Error");
    }

    // -- last-error slot ----------------------------------------------------

    #[tokio::test]
    async fn last_error_is_empty_twice_without_a_failure() {
        let (mut conn, _stub) = connector(Vec::new());
        assert_eq!(conn.last_error(), "");
        assert_eq!(conn.last_error(), "");
    }

    #[tokio::test]
    async fn transport_failure_formats_operation_context_into_last_error() {
        let (mut conn, _stub) = connector(vec![failed(404, "Not Found")]);

        let err = conn.subscriber_delete("99").await.unwrap_err();
        assert_eq!(
            err,
            ApiError::Request {
                context: "Subscriber deletion",
                reason: "Not Found".to_string()
            }
        );
        assert_eq!(conn.last_error(), "Subscriber deletion failed: Not Found");
        assert_eq!(conn.last_error(), "");
    }

    // -- request shapes -----------------------------------------------------

    #[tokio::test]
    async fn tag_create_sends_name_only_and_returns_the_new_id() {
        let (mut conn, stub) = connector(vec![ok("\"42\"")]);

        let id = conn.tag_create("promo", "").await.unwrap();
        assert_eq!(id, "42");

        let request = &sent(&stub)[0];
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(request.url, format!("{BASE}/tag"));
        assert_eq!(body_json(request), serde_json::json!({ "name": "promo" }));
    }

    #[tokio::test]
    async fn tag_create_accepts_a_numeric_id_payload() {
        let (mut conn, _stub) = connector(vec![ok("42")]);
        assert_eq!(conn.tag_create("promo", "desc").await.unwrap(), "42");
    }

    #[tokio::test]
    async fn tag_update_with_text_only_omits_the_name() {
        let (mut conn, stub) = connector(vec![ok("true")]);

        conn.tag_update("5", "", "desc").await.unwrap();

        let request = &sent(&stub)[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, format!("{BASE}/tag/5"));
        assert_eq!(body_json(request), serde_json::json!({ "text": "desc" }));
    }

    #[tokio::test]
    async fn subscription_process_get_uses_the_subscriber_path() {
        let (mut conn, stub) = connector(vec![ok(r#"{"listid":"12","name":"news"}"#)]);

        let process = conn.subscription_process_get("12").await.unwrap();
        assert_eq!(process.name, "news");
        // Deliberately /subscriber/{listid}: that is the route the service
        // answers list definitions on.
        assert_eq!(sent(&stub)[0].url, format!("{BASE}/subscriber/12"));
        assert_eq!(sent(&stub)[0].method, HttpMethod::Get);
    }

    #[tokio::test]
    async fn subscribe_by_sms_number_keeps_empty_email_in_the_body() {
        let (mut conn, stub) = connector(vec![ok(r#"{"id":"7"}"#)]);

        let opts = SubscribeOptions {
            smsnumber: Some("+4912345".to_string()),
            ..SubscribeOptions::default()
        };
        let subscriber = conn.subscribe("", &opts).await.unwrap();
        assert_eq!(subscriber.id, "7");

        assert_eq!(
            body_json(&sent(&stub)[0]),
            serde_json::json!({ "email": "", "fields": {}, "smsnumber": "+4912345" })
        );
    }

    #[tokio::test]
    async fn subscribe_includes_listid_and_tagid_only_when_supplied() {
        let (mut conn, stub) = connector(vec![ok(r#"{"id":"7"}"#)]);

        let opts = SubscribeOptions {
            listid: Some("3".to_string()),
            tagid: Some("9".to_string()),
            fields: HashMap::from([("fieldFirstName".to_string(), "Ada".to_string())]),
            smsnumber: None,
        };
        conn.subscribe("a@b.test", &opts).await.unwrap();

        assert_eq!(
            body_json(&sent(&stub)[0]),
            serde_json::json!({
                "email": "a@b.test",
                "fields": { "fieldFirstName": "Ada" },
                "listid": "3",
                "tagid": "9"
            })
        );
    }

    #[tokio::test]
    async fn subscriber_update_omits_unset_addresses() {
        let (mut conn, stub) = connector(vec![ok("true")]);

        let opts = SubscriberUpdate {
            newemail: Some("new@b.test".to_string()),
            ..SubscriberUpdate::default()
        };
        conn.subscriber_update("7", &opts).await.unwrap();

        let request = &sent(&stub)[0];
        assert_eq!(request.method, HttpMethod::Put);
        assert_eq!(request.url, format!("{BASE}/subscriber/7"));
        assert_eq!(
            body_json(request),
            serde_json::json!({ "fields": {}, "newemail": "new@b.test" })
        );
    }

    #[tokio::test]
    async fn tag_apply_sends_the_id_array() {
        let (mut conn, stub) = connector(vec![ok("true")]);

        conn.tag("a@b.test", &["1", "2"]).await.unwrap();
        assert_eq!(
            body_json(&sent(&stub)[0]),
            serde_json::json!({ "email": "a@b.test", "tagids": ["1", "2"] })
        );
    }

    #[tokio::test]
    async fn resend_names_the_autoresponder_field() {
        let (mut conn, stub) = connector(vec![ok("true")]);

        conn.resend("a@b.test", "15").await.unwrap();
        assert_eq!(
            body_json(&sent(&stub)[0]),
            serde_json::json!({ "email": "a@b.test", "autoresponder": "15" })
        );
    }

    #[tokio::test]
    async fn signin_carries_apikey_email_and_fields() {
        let (mut conn, stub) = connector(vec![ok("true")]);

        conn.signin("key-1", "a@b.test", &SigninOptions::default())
            .await
            .unwrap();
        assert_eq!(
            body_json(&sent(&stub)[0]),
            serde_json::json!({ "apikey": "key-1", "email": "a@b.test", "fields": {} })
        );
    }

    #[tokio::test]
    async fn subscriber_search_normalizes_numeric_ids() {
        let (mut conn, stub) = connector(vec![ok("205")]);

        let id = conn.subscriber_search("a@b.test").await.unwrap();
        assert_eq!(id, "205");
        assert_eq!(sent(&stub)[0].url, format!("{BASE}/subscriber/search"));
    }

    #[tokio::test]
    async fn subscriber_index_collects_string_and_numeric_ids() {
        let (mut conn, _stub) = connector(vec![ok(r#"["7", 9]"#)]);
        assert_eq!(
            conn.subscriber_index().await.unwrap(),
            vec!["7".to_string(), "9".to_string()]
        );
    }

    #[tokio::test]
    async fn undecodable_response_follows_the_failure_path() {
        let (mut conn, _stub) = connector(vec![ok("not json")]);

        let err = conn.tag_index().await.unwrap_err();
        assert!(matches!(err, ApiError::Request { context: "Tag index", .. }));
        assert!(conn.last_error().starts_with("Tag index failed: invalid response body"));
    }

    #[tokio::test]
    async fn base_url_trailing_slash_is_stripped() {
        let stub = StubTransport {
            requests: Arc::default(),
            outcomes: Arc::new(Mutex::new(VecDeque::from([ok("{}")]))),
        };
        let mut conn = Connector::with_transport("http://service.test/", Box::new(stub.clone()));
        conn.tag_index().await.unwrap();
        assert_eq!(sent(&stub)[0].url, "http://service.test/tag");
    }
}
