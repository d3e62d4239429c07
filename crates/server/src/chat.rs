//! Chat widget API. Each session is a persisted [`DialogState`] snapshot;
//! replies are delivered at once and returned with the delay the client should
//! use to pace them.
//!
//! - `POST   /api/chat/sessions`              — start a session with the greeting
//! - `GET    /api/chat/sessions/{id}`         — resume offer for a saved session
//! - `POST   /api/chat/sessions/{id}/actions` — apply one visitor input
//! - `DELETE /api/chat/sessions/{id}`         — discard a saved or completed session
//! - `GET    /api/chat/presence`              — online indicator
//! - `POST   /api/chat/signals`               — greeting bubble and exit intent triggers

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use leadline_core::config::DialogConfig;
use leadline_core::engagement::{BusinessHours, ExitIntentDetector, GreetingTrigger};
use leadline_core::flows::{DialogInput, TransitionOutcome};
use leadline_core::session::{RandomTypingDelay, TypingDelay};
use leadline_core::{DialogEngine, DialogState, Language, Message, SessionCache, SessionStore};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;
use uuid::Uuid;

use crate::error::{bad_request, from_domain, not_found, ApiError, ApiResult};

#[derive(Clone)]
pub struct ChatState {
    engine: Arc<DialogEngine>,
    store: Arc<dyn SessionStore>,
    typing: Arc<dyn TypingDelay>,
    key_prefix: String,
    submission_delay_ms: u64,
    hours: Option<BusinessHours>,
    locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ChatState {
    pub fn new(engine: DialogEngine, store: Arc<dyn SessionStore>, dialog: &DialogConfig) -> Self {
        Self::with_typing(engine, store, Arc::new(RandomTypingDelay::from_config(dialog)), dialog)
    }

    pub fn with_typing(
        engine: DialogEngine,
        store: Arc<dyn SessionStore>,
        typing: Arc<dyn TypingDelay>,
        dialog: &DialogConfig,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            typing,
            key_prefix: dialog.session_cache_key.clone(),
            submission_delay_ms: dialog.submission_delay_ms,
            hours: BusinessHours::from_config(dialog),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn cache(&self, session_id: Uuid) -> SessionCache {
        SessionCache::new(self.store.clone(), format!("{}:{session_id}", self.key_prefix))
    }

    /// Serializes writes to one session; other sessions proceed in parallel.
    /// Locks nobody else holds are pruned on the way in.
    async fn lock_session(&self, session_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|id, lock| *id == session_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(session_id).or_default())
        };
        lock.lock_owned().await
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub language: Option<Language>,
}

#[derive(Debug, Serialize)]
pub struct PacedMessage {
    pub message: Message,
    pub delay_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub state: DialogState,
    pub echo: Option<Message>,
    pub replies: Vec<PacedMessage>,
    /// Set while a contact submission is in flight; the client posts
    /// `submission_settled` once this has elapsed.
    pub settle_after_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ResumeOffer {
    pub session_id: Uuid,
    pub message_count: usize,
    pub state: DialogState,
}

/// Something the page observed before or while the widget is open.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageSignal {
    Idle { elapsed_ms: u64 },
    Scroll { scroll_y: f64, scroll_height: f64, viewport_height: f64 },
    PointerLeave { client_y: f64 },
}

#[derive(Debug, Deserialize)]
pub struct SignalRequest {
    #[serde(flatten)]
    pub signal: PageSignal,
    #[serde(default)]
    pub has_interacted: bool,
    #[serde(default)]
    pub greeting_shown: bool,
    #[serde(default)]
    pub exit_intent_fired: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SignalResponse {
    pub show_greeting: bool,
    /// The page should open the widget and post `exit_intent` as an action.
    pub exit_intent: bool,
}

#[derive(Debug, Serialize)]
pub struct Presence {
    pub online: bool,
}

pub fn router(state: ChatState) -> Router {
    Router::new()
        .route("/api/chat/presence", get(presence))
        .route("/api/chat/signals", post(page_signal))
        .route("/api/chat/sessions", post(create_session))
        .route("/api/chat/sessions/{session_id}", get(resume_offer).delete(discard_session))
        .route("/api/chat/sessions/{session_id}/actions", post(apply_action))
        .with_state(state)
}

async fn create_session(State(state): State<ChatState>, body: Bytes) -> ApiResult<SessionResponse> {
    let session_id = Uuid::new_v4();
    let correlation_id = session_id.to_string();
    let request: CreateSessionRequest = if body.is_empty() {
        CreateSessionRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|error| bad_request(format!("invalid session request: {error}"), &correlation_id))?
    };

    let dialog = DialogState::new(request.language.unwrap_or_default());
    let response = step(&state, session_id, dialog, &DialogInput::Open).await?;
    info!(
        event_name = "chat.session.created",
        correlation_id = %correlation_id,
        language = response.state.language().code(),
        "chat session started"
    );
    Ok(Json(response))
}

async fn resume_offer(
    State(state): State<ChatState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<ResumeOffer> {
    let cache = state.cache(session_id);
    let offer = cache.offer().await.ok_or_else(|| not_found("session", &session_id.to_string()))?;
    let message_count = offer.message_count();
    Ok(Json(ResumeOffer { session_id, message_count, state: cache.accept(offer) }))
}

async fn discard_session(State(state): State<ChatState>, Path(session_id): Path<Uuid>) -> StatusCode {
    let _guard = state.lock_session(session_id).await;
    state.cache(session_id).decline().await;
    state.locks.lock().await.remove(&session_id);
    info!(
        event_name = "chat.session.discarded",
        correlation_id = %session_id,
        "chat session discarded"
    );
    StatusCode::NO_CONTENT
}

async fn apply_action(
    State(state): State<ChatState>,
    Path(session_id): Path<Uuid>,
    Json(input): Json<DialogInput>,
) -> ApiResult<SessionResponse> {
    let _guard = state.lock_session(session_id).await;
    let dialog = state
        .cache(session_id)
        .load()
        .await
        .ok_or_else(|| not_found("session", &session_id.to_string()))?
        .resumed();
    step(&state, session_id, dialog, &input).await.map(Json)
}

async fn presence(State(state): State<ChatState>) -> Json<Presence> {
    let online = state.hours.map(|hours| hours.is_open(Utc::now())).unwrap_or(false);
    Json(Presence { online })
}

async fn page_signal(Json(request): Json<SignalRequest>) -> Json<SignalResponse> {
    let mut greeting = GreetingTrigger::already_shown(request.greeting_shown);
    let mut response = SignalResponse { show_greeting: false, exit_intent: false };
    match request.signal {
        PageSignal::Idle { elapsed_ms } => {
            response.show_greeting =
                greeting.on_idle(Duration::from_millis(elapsed_ms), request.has_interacted);
        }
        PageSignal::Scroll { scroll_y, scroll_height, viewport_height } => {
            response.show_greeting = greeting.on_scroll(
                scroll_y,
                scroll_height,
                viewport_height,
                request.has_interacted,
            );
        }
        PageSignal::PointerLeave { client_y } => {
            response.exit_intent = ExitIntentDetector::already_fired(request.exit_intent_fired)
                .on_pointer_leave(client_y);
        }
    }
    Json(response)
}

/// Applies one input to a loaded snapshot, delivers every reply and saves
/// the result. Completed sessions are kept until the client deletes them.
async fn step(
    state: &ChatState,
    session_id: Uuid,
    mut dialog: DialogState,
    input: &DialogInput,
) -> Result<SessionResponse, (StatusCode, Json<ApiError>)> {
    let correlation_id = session_id.to_string();
    let outcome: TransitionOutcome = state
        .engine
        .apply_logged(&dialog, input, &correlation_id)
        .map_err(|error| from_domain(error, &correlation_id))?;

    let now = Utc::now();
    let echo = dialog.apply(&outcome, now);
    let replies = outcome
        .replies
        .iter()
        .map(|reply| PacedMessage {
            message: dialog.deliver(reply, now),
            delay_ms: duration_ms(state.typing.next_delay()),
        })
        .collect();

    state.cache(session_id).save(&dialog).await;

    let settle_after_ms = dialog.submitting().then_some(state.submission_delay_ms);
    Ok(SessionResponse { session_id, state: dialog, echo, replies, settle_after_ms })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use leadline_core::config::DialogConfig;
    use leadline_core::session::FixedTypingDelay;
    use leadline_core::DialogEngine;
    use leadline_db::InMemorySessionStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::{router, ChatState};

    fn chat_state(store: Arc<InMemorySessionStore>) -> ChatState {
        ChatState::with_typing(
            DialogEngine::default(),
            store,
            Arc::new(FixedTypingDelay(Duration::from_millis(700))),
            &DialogConfig::default(),
        )
    }

    fn app(store: Arc<InMemorySessionStore>) -> Router {
        router(chat_state(store))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(body) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        let response =
            app.clone().oneshot(request.body(body).expect("request")).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json") };
        (status, json)
    }

    async fn start(app: &Router) -> (String, Value) {
        let (status, body) = send(app, Method::POST, "/api/chat/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        (body["session_id"].as_str().expect("session id").to_string(), body)
    }

    fn last_option_message(body: &Value) -> Value {
        body["replies"]
            .as_array()
            .and_then(|replies| replies.last())
            .map(|reply| reply["message"]["id"].clone())
            .unwrap_or(Value::Null)
    }

    #[tokio::test]
    async fn new_session_starts_with_greeting() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store.clone());

        let (_, body) = start(&app).await;

        let replies = body["replies"].as_array().expect("replies");
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["delay_ms"], 700);
        assert_eq!(replies[0]["message"]["options"].as_array().map(Vec::len), Some(3));
        assert_eq!(body["state"]["currentPath"], "initial");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn estimate_flow_over_http() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store);
        let (id, body) = start(&app).await;
        let actions = format!("/api/chat/sessions/{id}/actions");

        let (_, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "estimate" })),
        )
        .await;
        let (_, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "kitchen" })),
        )
        .await;
        let (status, body) =
            send(&app, Method::POST, &actions, Some(json!({ "kind": "submit_sqft", "text": "150" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["echo"]["text"], "150 sq ft");
        let reply = body["replies"][0]["message"]["text"].as_str().expect("reply");
        assert!(reply.contains("$22,500 to $52,500"), "{reply}");
    }

    #[tokio::test]
    async fn stale_selection_is_rejected() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store);
        let (id, _) = start(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            &format!("/api/chat/sessions/{id}/actions"),
            Some(json!({ "kind": "select_option", "message_id": 999, "value": "estimate" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["correlation_id"], id);
    }

    #[tokio::test]
    async fn resume_offer_and_discard() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store.clone());
        let (id, created) = start(&app).await;
        let uri = format!("/api/chat/sessions/{id}");

        let (status, offer) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(offer["message_count"], 1);
        assert_eq!(offer["state"], created["state"]);

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(store.is_empty().await);

        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn spanish_session_greets_in_spanish() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store);

        let (status, body) =
            send(&app, Method::POST, "/api/chat/sessions", Some(json!({ "language": "es" }))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["language"], "es");
    }

    #[tokio::test]
    async fn greeting_bubble_follows_idle_and_scroll_signals() {
        let app = app(Arc::new(InMemorySessionStore::default()));

        let (_, early) =
            send(&app, Method::POST, "/api/chat/signals", Some(json!({ "kind": "idle", "elapsed_ms": 5000 }))).await;
        assert_eq!(early["show_greeting"], false);

        let (_, idle) =
            send(&app, Method::POST, "/api/chat/signals", Some(json!({ "kind": "idle", "elapsed_ms": 15000 }))).await;
        assert_eq!(idle["show_greeting"], true);

        let (_, scrolled) = send(
            &app,
            Method::POST,
            "/api/chat/signals",
            Some(json!({
                "kind": "scroll",
                "scroll_y": 800.0,
                "scroll_height": 2000.0,
                "viewport_height": 1000.0,
                "greeting_shown": true
            })),
        )
        .await;
        assert_eq!(scrolled["show_greeting"], false);
    }

    #[tokio::test]
    async fn exit_intent_fires_once_at_the_top_edge() {
        let app = app(Arc::new(InMemorySessionStore::default()));

        let (status, body) =
            send(&app, Method::POST, "/api/chat/signals", Some(json!({ "kind": "pointer_leave", "client_y": -2.0 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["exit_intent"], true);

        let (_, repeat) = send(
            &app,
            Method::POST,
            "/api/chat/signals",
            Some(json!({ "kind": "pointer_leave", "client_y": -2.0, "exit_intent_fired": true })),
        )
        .await;
        assert_eq!(repeat["exit_intent"], false);
    }

    #[tokio::test]
    async fn presence_reports_online_flag() {
        let app = app(Arc::new(InMemorySessionStore::default()));

        let (status, body) = send(&app, Method::GET, "/api/chat/presence", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["online"].is_boolean());
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/chat/sessions/7d3f0c1e-58a4-4c57-9b8e-1f2a3b4c5d6e/actions",
            Some(json!({ "kind": "restart" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn completed_session_can_switch_language_and_restart() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store.clone());
        let (id, body) = start(&app).await;
        let actions = format!("/api/chat/sessions/{id}/actions");

        let (_, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "question" })),
        )
        .await;
        let (_, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "warranty" })),
        )
        .await;
        let (status, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "done" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["currentPath"], "complete");
        assert_eq!(store.len().await, 1);

        let (status, _) = send(&app, Method::GET, &format!("/api/chat/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::POST, &actions, Some(json!({ "kind": "switch_language" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["currentPath"], "initial");
        assert_eq!(body["state"]["language"], "es");
        assert_eq!(body["state"]["messages"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn settled_submission_can_restart() {
        let store = Arc::new(InMemorySessionStore::default());
        let app = app(store);
        let (id, body) = start(&app).await;
        let actions = format!("/api/chat/sessions/{id}/actions");

        let (_, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({ "kind": "select_option", "message_id": last_option_message(&body), "value": "emergency" })),
        )
        .await;
        assert_eq!(body["state"]["currentPath"], "emergency-contact");

        let (status, body) = send(
            &app,
            Method::POST,
            &actions,
            Some(json!({
                "kind": "submit_contact",
                "contact": { "name": "Sam", "phone": "718 555 0100", "address": "1 Main St" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["settle_after_ms"].is_u64());

        let (status, body) =
            send(&app, Method::POST, &actions, Some(json!({ "kind": "submission_settled" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["currentPath"], "complete");
        assert_eq!(body["settle_after_ms"], Value::Null);

        let (status, body) = send(&app, Method::POST, &actions, Some(json!({ "kind": "restart" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["currentPath"], "initial");
        assert_eq!(body["replies"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn busy_session_does_not_block_other_sessions() {
        let state = chat_state(Arc::new(InMemorySessionStore::default()));
        let app = router(state.clone());
        let (busy, _) = start(&app).await;
        let (other, _) = start(&app).await;
        let busy_id: Uuid = busy.parse().expect("uuid");

        let guard = state.lock_session(busy_id).await;

        let open = Some(json!({ "kind": "open" }));
        let (status, _) = tokio::time::timeout(
            Duration::from_secs(5),
            send(&app, Method::POST, &format!("/api/chat/sessions/{other}/actions"), open.clone()),
        )
        .await
        .expect("other session proceeds");
        assert_eq!(status, StatusCode::OK);

        let busy_actions = format!("/api/chat/sessions/{busy}/actions");
        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            send(&app, Method::POST, &busy_actions, open.clone()),
        )
        .await;
        assert!(blocked.is_err());

        drop(guard);
        let (status, _) = send(&app, Method::POST, &busy_actions, open).await;
        assert_eq!(status, StatusCode::OK);
    }
}
