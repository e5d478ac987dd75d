//! In-memory stand-in for the KlickTipp REST service.
//!
//! Implements the endpoint catalog the client speaks — account login/logout
//! with a cookie session, subscription processes, tags, contact fields,
//! subscribers, and the API-key signin/signout/signoff flow — over a shared
//! `RwLock` state. Fixed demo credentials and a fixed demo API key keep the
//! tests deterministic.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

/// Credentials accepted by `/account/login`.
pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PASSWORD: &str = "demo-secret";

/// API key accepted by the signin/signout/signoff endpoints.
pub const DEMO_API_KEY: &str = "listbuilding-demo-key";

/// Cookie name issued with every session.
pub const SESSION_NAME: &str = "SESSklicktipp";

const TAGGED_DATE: &str = "2024-01-15 00:00:00";

#[derive(Clone, Debug, Serialize)]
pub struct ListRecord {
    pub listid: String,
    pub name: String,
    pub pendingurl: String,
    pub thankyouurl: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TagRecord {
    pub tagid: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubscriberRecord {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub smsnumber: String,
    pub status: String,
    pub tags: Vec<String>,
    pub fields: HashMap<String, String>,
}

#[derive(Debug)]
pub struct ServiceState {
    sessions: HashSet<String>,
    session_counter: u64,
    lists: HashMap<String, ListRecord>,
    fields: HashMap<String, String>,
    tags: HashMap<String, TagRecord>,
    tag_counter: u64,
    subscribers: HashMap<String, SubscriberRecord>,
    subscriber_counter: u64,
}

impl ServiceState {
    fn seeded() -> Self {
        // List ids live in a different range than subscriber ids so the
        // shared /subscriber/{id} route can tell them apart.
        let lists = HashMap::from([(
            "95".to_string(),
            ListRecord {
                listid: "95".to_string(),
                name: "Newsletter".to_string(),
                pendingurl: "https://service.test/pending/95".to_string(),
                thankyouurl: "https://service.test/thank-you/95".to_string(),
            },
        )]);
        let fields = HashMap::from([
            ("fieldFirstName".to_string(), "First name".to_string()),
            ("fieldLastName".to_string(), "Last name".to_string()),
        ]);
        Self {
            sessions: HashSet::new(),
            session_counter: 0,
            lists,
            fields,
            tags: HashMap::new(),
            tag_counter: 0,
            subscribers: HashMap::new(),
            subscriber_counter: 0,
        }
    }

    fn subscriber_by_email_mut(&mut self, email: &str) -> Option<&mut SubscriberRecord> {
        self.subscribers.values_mut().find(|s| s.email == email)
    }
}

pub type Db = Arc<RwLock<ServiceState>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(ServiceState::seeded()));
    Router::new()
        .route("/account/login", post(login))
        .route("/account/logout", post(logout))
        .route("/list", get(list_index))
        .route("/list/redirect", post(list_redirect))
        .route("/field", get(field_index))
        .route("/tag", get(tag_index).post(tag_create))
        .route("/tag/{id}", get(tag_get).put(tag_update).delete(tag_delete))
        .route("/subscriber", get(subscriber_index).post(subscriber_create))
        .route(
            "/subscriber/{id}",
            get(subscriber_get).put(subscriber_update).delete(subscriber_delete),
        )
        .route("/subscriber/unsubscribe", post(unsubscribe))
        .route("/subscriber/tag", post(tag_apply))
        .route("/subscriber/untag", post(untag))
        .route("/subscriber/resend", post(resend))
        .route("/subscriber/search", post(search))
        .route("/subscriber/tagged", post(tagged))
        .route("/subscriber/signin", post(signin))
        .route("/subscriber/signout", post(signout))
        .route("/subscriber/signoff", post(signoff))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// ---------------------------------------------------------------------------
// Session plumbing
// ---------------------------------------------------------------------------

fn session_cookie(headers: &HeaderMap) -> Option<String> {
    let cookie = headers.get(header::COOKIE)?.to_str().ok()?;
    cookie.split(';').map(str::trim).find_map(|pair| {
        let (name, id) = pair.split_once('=')?;
        (name == SESSION_NAME).then(|| id.to_string())
    })
}

async fn authorize(db: &Db, headers: &HeaderMap) -> Result<(), StatusCode> {
    let sessid = session_cookie(headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if db.read().await.sessions.contains(&sessid) {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoginInput {
    username: String,
    password: String,
}

async fn login(
    State(db): State<Db>,
    Json(input): Json<LoginInput>,
) -> Result<Json<Value>, StatusCode> {
    if input.username != DEMO_USERNAME || input.password != DEMO_PASSWORD {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut state = db.write().await;
    state.session_counter += 1;
    let sessid = format!("sess{:08x}", state.session_counter);
    state.sessions.insert(sessid.clone());
    Ok(Json(json!({ "sessid": sessid, "session_name": SESSION_NAME })))
}

async fn logout(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<bool>, StatusCode> {
    let sessid = session_cookie(&headers).ok_or(StatusCode::UNAUTHORIZED)?;
    if db.write().await.sessions.remove(&sessid) {
        Ok(Json(true))
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

// ---------------------------------------------------------------------------
// Lists and fields
// ---------------------------------------------------------------------------

async fn list_index(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, String>>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    Ok(Json(
        state
            .lists
            .iter()
            .map(|(id, list)| (id.clone(), list.name.clone()))
            .collect(),
    ))
}

#[derive(Deserialize)]
struct RedirectInput {
    listid: String,
    #[allow(dead_code)]
    email: String,
}

async fn list_redirect(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<RedirectInput>,
) -> Result<Json<String>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    state
        .lists
        .get(&input.listid)
        .map(|list| Json(list.thankyouurl.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn field_index(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, String>>, StatusCode> {
    authorize(&db, &headers).await?;
    Ok(Json(db.read().await.fields.clone()))
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

async fn tag_index(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<HashMap<String, String>>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    Ok(Json(
        state
            .tags
            .iter()
            .map(|(id, tag)| (id.clone(), tag.name.clone()))
            .collect(),
    ))
}

async fn tag_get(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<TagRecord>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    state.tags.get(&id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct TagCreateInput {
    name: String,
    #[serde(default)]
    text: String,
}

async fn tag_create(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<TagCreateInput>,
) -> Result<Json<String>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    state.tag_counter += 1;
    let id = state.tag_counter.to_string();
    state.tags.insert(
        id.clone(),
        TagRecord {
            tagid: id.clone(),
            name: input.name,
            text: input.text,
        },
    );
    Ok(Json(id))
}

#[derive(Deserialize)]
struct TagUpdateInput {
    name: Option<String>,
    text: Option<String>,
}

async fn tag_update(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<TagUpdateInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    let tag = state.tags.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    if let Some(name) = input.name {
        tag.name = name;
    }
    if let Some(text) = input.text {
        tag.text = text;
    }
    Ok(Json(true))
}

async fn tag_delete(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    state
        .tags
        .remove(&id)
        .map(|_| Json(true))
        .ok_or(StatusCode::NOT_FOUND)
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

async fn subscriber_index(
    State(db): State<Db>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    Ok(Json(
        state
            .subscribers
            .values()
            .filter(|s| s.status == "subscribed")
            .map(|s| s.id.clone())
            .collect(),
    ))
}

#[derive(Deserialize)]
struct SubscribeInput {
    #[serde(default)]
    email: String,
    #[serde(default)]
    fields: HashMap<String, String>,
    #[serde(default)]
    smsnumber: String,
    #[allow(dead_code)]
    listid: Option<String>,
    tagid: Option<String>,
}

async fn subscriber_create(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<SubscribeInput>,
) -> Result<Json<SubscriberRecord>, StatusCode> {
    authorize(&db, &headers).await?;
    if input.email.is_empty() && input.smsnumber.is_empty() {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }
    let mut state = db.write().await;
    state.subscriber_counter += 1;
    let id = state.subscriber_counter.to_string();
    let record = SubscriberRecord {
        id: id.clone(),
        email: input.email,
        smsnumber: input.smsnumber,
        status: "subscribed".to_string(),
        tags: input.tagid.into_iter().collect(),
        fields: input.fields,
    };
    state.subscribers.insert(id, record.clone());
    Ok(Json(record))
}

/// The service answers subscription-process definitions on this route as
/// well: an id that is not a subscriber is looked up among the lists.
async fn subscriber_get(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    if let Some(subscriber) = state.subscribers.get(&id) {
        return Ok(Json(json!(subscriber)));
    }
    state
        .lists
        .get(&id)
        .map(|list| Json(json!(list)))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct SubscriberUpdateInput {
    #[serde(default)]
    fields: HashMap<String, String>,
    newemail: Option<String>,
    newsmsnumber: Option<String>,
}

async fn subscriber_update(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(input): Json<SubscriberUpdateInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    let subscriber = state.subscribers.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    subscriber.fields.extend(input.fields);
    if let Some(email) = input.newemail {
        subscriber.email = email;
    }
    if let Some(smsnumber) = input.newsmsnumber {
        subscriber.smsnumber = smsnumber;
    }
    Ok(Json(true))
}

async fn subscriber_delete(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    state
        .subscribers
        .remove(&id)
        .map(|_| Json(true))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct EmailInput {
    email: String,
}

async fn unsubscribe(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<EmailInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    let subscriber = state
        .subscriber_by_email_mut(&input.email)
        .ok_or(StatusCode::NOT_FOUND)?;
    subscriber.status = "unsubscribed".to_string();
    Ok(Json(true))
}

#[derive(Deserialize)]
struct TagApplyInput {
    email: String,
    tagids: Vec<String>,
}

async fn tag_apply(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<TagApplyInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    let subscriber = state
        .subscriber_by_email_mut(&input.email)
        .ok_or(StatusCode::NOT_FOUND)?;
    for tagid in input.tagids {
        if !subscriber.tags.contains(&tagid) {
            subscriber.tags.push(tagid);
        }
    }
    Ok(Json(true))
}

#[derive(Deserialize)]
struct UntagInput {
    email: String,
    tagid: String,
}

async fn untag(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<UntagInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    let subscriber = state
        .subscriber_by_email_mut(&input.email)
        .ok_or(StatusCode::NOT_FOUND)?;
    let before = subscriber.tags.len();
    subscriber.tags.retain(|t| t != &input.tagid);
    if subscriber.tags.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    Ok(Json(true))
}

#[derive(Deserialize)]
struct ResendInput {
    email: String,
    #[allow(dead_code)]
    autoresponder: String,
}

async fn resend(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<ResendInput>,
) -> Result<Json<bool>, StatusCode> {
    authorize(&db, &headers).await?;
    let mut state = db.write().await;
    state
        .subscriber_by_email_mut(&input.email)
        .map(|_| Json(true))
        .ok_or(StatusCode::NOT_FOUND)
}

async fn search(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<EmailInput>,
) -> Result<Json<String>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    state
        .subscribers
        .values()
        .find(|s| s.email == input.email)
        .map(|s| Json(s.id.clone()))
        .ok_or(StatusCode::NOT_FOUND)
}

#[derive(Deserialize)]
struct TaggedInput {
    tagid: String,
}

async fn tagged(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(input): Json<TaggedInput>,
) -> Result<Json<HashMap<String, String>>, StatusCode> {
    authorize(&db, &headers).await?;
    let state = db.read().await;
    Ok(Json(
        state
            .subscribers
            .values()
            .filter(|s| s.tags.contains(&input.tagid))
            .map(|s| (s.id.clone(), TAGGED_DATE.to_string()))
            .collect(),
    ))
}

// ---------------------------------------------------------------------------
// API-key flow (no session)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct SigninInput {
    apikey: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    fields: HashMap<String, String>,
    #[serde(default)]
    smsnumber: String,
}

async fn signin(
    State(db): State<Db>,
    Json(input): Json<SigninInput>,
) -> Result<Json<bool>, StatusCode> {
    if input.apikey != DEMO_API_KEY {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut state = db.write().await;
    if let Some(subscriber) = state.subscriber_by_email_mut(&input.email) {
        subscriber.status = "subscribed".to_string();
        subscriber.fields.extend(input.fields);
        return Ok(Json(true));
    }
    state.subscriber_counter += 1;
    let id = state.subscriber_counter.to_string();
    state.subscribers.insert(
        id.clone(),
        SubscriberRecord {
            id,
            email: input.email,
            smsnumber: input.smsnumber,
            status: "subscribed".to_string(),
            tags: Vec::new(),
            fields: input.fields,
        },
    );
    Ok(Json(true))
}

#[derive(Deserialize)]
struct ApiKeyInput {
    apikey: String,
    email: String,
}

async fn signout(
    State(db): State<Db>,
    Json(input): Json<ApiKeyInput>,
) -> Result<Json<bool>, StatusCode> {
    if input.apikey != DEMO_API_KEY {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut state = db.write().await;
    let subscriber = state
        .subscriber_by_email_mut(&input.email)
        .ok_or(StatusCode::NOT_FOUND)?;
    subscriber.tags.clear();
    Ok(Json(true))
}

async fn signoff(
    State(db): State<Db>,
    Json(input): Json<ApiKeyInput>,
) -> Result<Json<bool>, StatusCode> {
    if input.apikey != DEMO_API_KEY {
        return Err(StatusCode::UNAUTHORIZED);
    }
    let mut state = db.write().await;
    let subscriber = state
        .subscriber_by_email_mut(&input.email)
        .ok_or(StatusCode::NOT_FOUND)?;
    subscriber.status = "unsubscribed".to_string();
    Ok(Json(true))
}
