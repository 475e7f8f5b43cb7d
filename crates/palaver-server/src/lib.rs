//! HTTP layer for Palaver.
//!
//! Exposes an axum [`Router`] serving accounts, conversations, paginated
//! message history and streamed assistant replies, backed by any
//! [`ChatStore`] and [`GenerationProvider`].

pub mod auth;
pub mod error;
pub mod handlers;
pub mod stream;
#[cfg(test)]
mod testing;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{delete, get, post},
};
use palaver_core::{generation::GenerationProvider, store::ChatStore};
use palaver_openai::ProviderConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{accounts, conversations, messages};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PALAVER_*` environment variables. Every field has a default.
#[derive(Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                  String,
  pub port:                  u16,
  pub store_path:            PathBuf,
  pub provider_endpoint:     String,
  pub provider_model:        String,
  pub provider_api_key:      Option<String>,
  pub provider_timeout_secs: Option<u64>,
  /// Prior messages included in each prompt.
  pub history_limit:         usize,
  pub session_ttl_hours:     i64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:                  "127.0.0.1".to_string(),
      port:                  8080,
      store_path:            PathBuf::from("palaver.db"),
      provider_endpoint:     "https://api.openai.com".to_string(),
      provider_model:        "gpt-4o-mini".to_string(),
      provider_api_key:      None,
      provider_timeout_secs: None,
      history_limit:         stream::session::DEFAULT_HISTORY_LIMIT,
      session_ttl_hours:     24 * 30,
    }
  }
}

impl ServerConfig {
  pub fn provider_config(&self) -> ProviderConfig {
    ProviderConfig {
      endpoint: self.provider_endpoint.clone(),
      model:    self.provider_model.clone(),
      api_key:  self.provider_api_key.clone(),
      timeout:  self.provider_timeout_secs.map(Duration::from_secs),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, P> {
  pub store:    Arc<S>,
  pub provider: Arc<P>,
  pub config:   Arc<ServerConfig>,
}

impl<S, P> AppState<S, P> {
  pub fn new(store: S, provider: P, config: ServerConfig) -> Self {
    Self {
      store:    Arc::new(store),
      provider: Arc::new(provider),
      config:   Arc::new(config),
    }
  }
}

impl<S, P> Clone for AppState<S, P> {
  fn clone(&self) -> Self {
    Self {
      store:    self.store.clone(),
      provider: self.provider.clone(),
      config:   self.config.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the chat API.
pub fn router<S, P>(state: AppState<S, P>) -> Router
where
  S: ChatStore + 'static,
  P: GenerationProvider + 'static,
{
  Router::new()
    .route("/health", get(health))
    .route("/auth/signup", post(accounts::signup::<S, P>))
    .route("/auth/signin", post(accounts::signin::<S, P>))
    .route("/auth/signout", post(accounts::signout::<S, P>))
    .route(
      "/conversations",
      get(conversations::list::<S, P>).post(conversations::create::<S, P>),
    )
    .route(
      "/conversations/{id}",
      get(conversations::get_one::<S, P>)
        .patch(conversations::rename::<S, P>)
        .delete(conversations::delete_one::<S, P>),
    )
    .route("/conversations/{id}/messages", get(messages::list::<S, P>))
    .route(
      "/conversations/{id}/messages/{message_id}",
      delete(messages::delete_one::<S, P>),
    )
    .route("/conversations/{id}/messages/stream", post(messages::stream::<S, P>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

async fn health() -> &'static str { "ok" }

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use palaver_core::{
    generation::ProviderErrorKind,
    message::{NewMessage, Role},
    store::{MessageRange, SortOrder},
  };
  use palaver_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use crate::{
    stream::event::StreamEvent,
    testing::{ScriptedProvider, parse_frames},
  };

  pub(crate) type TestState = AppState<SqliteStore, ScriptedProvider>;

  pub(crate) async fn test_state() -> TestState {
    state_with(ScriptedProvider::tokens(&["Hel", "lo", "!"])).await
  }

  async fn state_with(provider: ScriptedProvider) -> TestState {
    let store = SqliteStore::open_in_memory().await.unwrap();
    AppState::new(store, provider, ServerConfig {
      store_path: PathBuf::from(":memory:"),
      ..Default::default()
    })
  }

  async fn send(
    state: &TestState,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
      Some(json) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(json.to_string())
      }
      None => Body::empty(),
    };
    router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn body_text(res: Response) -> String {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
  }

  async fn body_json(res: Response) -> Value { serde_json::from_str(&body_text(res).await).unwrap() }

  async fn signup(state: &TestState, username: &str) -> String {
    let res = send(
      state,
      "POST",
      "/auth/signup",
      None,
      Some(json!({ "username": username, "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["token"].as_str().unwrap().to_string()
  }

  async fn new_conversation(state: &TestState, token: &str) -> Uuid {
    let res = send(state, "POST", "/conversations", Some(token), Some(json!({}))).await;
    assert_eq!(res.status(), StatusCode::CREATED);
    body_json(res).await["id"].as_str().unwrap().parse().unwrap()
  }

  async fn stored_messages(state: &TestState, conversation_id: Uuid) -> Vec<palaver_core::message::Message> {
    state
      .store
      .range_messages(conversation_id, MessageRange {
        anchor: None,
        order:  SortOrder::Ascending,
        limit:  100,
      })
      .await
      .unwrap()
  }

  // ── Health & accounts ────────────────────────────────────────────────────────

  #[tokio::test]
  async fn health_is_public() {
    let state = test_state().await;
    let res = send(&state, "GET", "/health", None, None).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_text(res).await, "ok");
  }

  #[tokio::test]
  async fn concurrent_signups_for_one_username_conflict() {
    let state = test_state().await;
    let body = json!({ "username": "alice", "password": "hunter2hunter2" });

    let (a, b) = tokio::join!(
      send(&state, "POST", "/auth/signup", None, Some(body.clone())),
      send(&state, "POST", "/auth/signup", None, Some(body)),
    );

    let mut statuses = vec![a.status(), b.status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::CREATED, StatusCode::CONFLICT]);
  }

  #[tokio::test]
  async fn signup_signin_signout() {
    let state = test_state().await;
    let first = signup(&state, "alice").await;

    let res = send(
      &state,
      "POST",
      "/auth/signup",
      None,
      Some(json!({ "username": "alice", "password": "another-password" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = send(
      &state,
      "POST",
      "/auth/signin",
      None,
      Some(json!({ "username": "alice", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = send(
      &state,
      "POST",
      "/auth/signin",
      None,
      Some(json!({ "username": "alice", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let second = body_json(res).await["token"].as_str().unwrap().to_string();
    assert_ne!(first, second);

    let res = send(&state, "POST", "/auth/signout", Some(&second), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = send(&state, "GET", "/conversations", Some(&second), None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let res = send(&state, "GET", "/conversations", Some(&first), None).await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn signup_validates_credentials() {
    let state = test_state().await;
    let res = send(
      &state,
      "POST",
      "/auth/signup",
      None,
      Some(json!({ "username": "al", "password": "hunter2hunter2" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
      &state,
      "POST",
      "/auth/signup",
      None,
      Some(json!({ "username": "alice", "password": "short" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn missing_token_is_rejected_with_challenge() {
    let state = test_state().await;
    let res = send(&state, "GET", "/conversations", None, None).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  // ── Conversations ────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn conversation_crud() {
    let state = test_state().await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;

    let res = send(&state, "GET", &format!("/conversations/{id}"), Some(&token), None).await;
    let conv = body_json(res).await;
    assert_eq!(conv["title"], "New Conversation");
    assert_eq!(conv["message_count"], 0);

    let res = send(
      &state,
      "PATCH",
      &format!("/conversations/{id}"),
      Some(&token),
      Some(json!({ "title": "  Trip planning  " })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["title"], "Trip planning");

    let res = send(
      &state,
      "PATCH",
      &format!("/conversations/{id}"),
      Some(&token),
      Some(json!({ "title": "x".repeat(201) })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(&state, "GET", "/conversations", Some(&token), None).await;
    assert_eq!(body_json(res).await.as_array().unwrap().len(), 1);

    let res = send(&state, "DELETE", &format!("/conversations/{id}"), Some(&token), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = send(&state, "GET", &format!("/conversations/{id}"), Some(&token), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn other_users_conversations_are_invisible() {
    let state = test_state().await;
    let alice = signup(&state, "alice").await;
    let bob = signup(&state, "bobby").await;
    let id = new_conversation(&state, &alice).await;

    for (method, uri) in [
      ("GET", format!("/conversations/{id}")),
      ("DELETE", format!("/conversations/{id}")),
      ("GET", format!("/conversations/{id}/messages")),
    ] {
      let res = send(&state, method, &uri, Some(&bob), None).await;
      assert_eq!(res.status(), StatusCode::NOT_FOUND, "{method} {uri}");
    }

    let res = send(
      &state,
      "POST",
      &format!("/conversations/{id}/messages/stream"),
      Some(&bob),
      Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert!(stored_messages(&state, id).await.is_empty());
  }

  // ── Message history ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn history_endpoint_pages_and_validates() {
    let state = test_state().await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;
    for i in 0..3 {
      state
        .store
        .insert_message(NewMessage::new(id, Role::User, format!("m{i}")))
        .await
        .unwrap();
    }

    let res = send(&state, "GET", &format!("/conversations/{id}/messages?limit=2"), Some(&token), None)
      .await;
    assert_eq!(res.status(), StatusCode::OK);
    let page = body_json(res).await;
    assert_eq!(page["messages"][0]["content"], "m2");
    assert_eq!(page["messages"][1]["content"], "m1");
    assert_eq!(page["pagination"]["has_more"], true);
    let next = page["pagination"]["next_cursor"].as_str().unwrap().to_string();

    let res = send(
      &state,
      "GET",
      &format!("/conversations/{id}/messages?cursor={next}&direction=before"),
      Some(&token),
      None,
    )
    .await;
    let page = body_json(res).await;
    assert_eq!(page["messages"].as_array().unwrap().len(), 1);
    assert_eq!(page["messages"][0]["content"], "m0");
    assert_eq!(page["pagination"]["has_more"], false);
    assert_eq!(page["pagination"]["next_cursor"], Value::Null);

    let res = send(&state, "GET", &format!("/conversations/{id}/messages?limit=abc"), Some(&token), None)
      .await;
    assert_eq!(body_json(res).await["pagination"]["limit"], 50);

    let res = send(
      &state,
      "GET",
      &format!("/conversations/{id}/messages?direction=sideways"),
      Some(&token),
      None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = send(
      &state,
      "GET",
      &format!("/conversations/{id}/messages?cursor=not-a-cursor"),
      Some(&token),
      None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn delete_message_within_conversation() {
    let state = test_state().await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;
    let other = new_conversation(&state, &token).await;
    let m = state
      .store
      .insert_message(NewMessage::new(id, Role::User, "hi"))
      .await
      .unwrap();

    let res = send(
      &state,
      "DELETE",
      &format!("/conversations/{other}/messages/{}", m.id),
      Some(&token),
      None,
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let uri = format!("/conversations/{id}/messages/{}", m.id);
    let res = send(&state, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let res = send(&state, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  // ── Streaming ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn stream_delivers_events_and_persists_reply() {
    let state = test_state().await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;

    let res = send(
      &state,
      "POST",
      &format!("/conversations/{id}/messages/stream"),
      Some(&token),
      Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);
    let headers = res.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-accel-buffering"], "no");

    let events = parse_frames(&body_text(res).await);
    let stored = stored_messages(&state, id).await;

    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].content, "Hello!");
    assert_eq!(events, vec![
      StreamEvent::done(stored[0].id),
      StreamEvent::token("Hel"),
      StreamEvent::token("lo"),
      StreamEvent::token("!"),
      StreamEvent::done(stored[1].id),
    ]);

    let res = send(&state, "GET", &format!("/conversations/{id}"), Some(&token), None).await;
    assert_eq!(body_json(res).await["message_count"], 2);
  }

  #[tokio::test]
  async fn stream_rejects_invalid_content_before_opening() {
    let state = test_state().await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;
    let uri = format!("/conversations/{id}/messages/stream");

    for body in [
      json!({ "content": "x".repeat(10_001) }),
      json!({ "content": "   " }),
      json!({ "content": 42 }),
      json!({}),
    ] {
      let res = send(&state, "POST", &uri, Some(&token), Some(body.clone())).await;
      assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{body}");
    }
    assert!(stored_messages(&state, id).await.is_empty());

    let res = send(&state, "POST", &uri, None, Some(json!({ "content": "hi" }))).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let missing = Uuid::new_v4();
    let res = send(
      &state,
      "POST",
      &format!("/conversations/{missing}/messages/stream"),
      Some(&token),
      Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn provider_failure_is_reported_in_band() {
    let state = state_with(ScriptedProvider::failing(ProviderErrorKind::Connection)).await;
    let token = signup(&state, "alice").await;
    let id = new_conversation(&state, &token).await;

    let res = send(
      &state,
      "POST",
      &format!("/conversations/{id}/messages/stream"),
      Some(&token),
      Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(res.status(), StatusCode::OK);

    let events = parse_frames(&body_text(res).await);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], StreamEvent::Done { .. }));
    assert_eq!(events[1], StreamEvent::error("Cannot connect to AI service"));
    assert_eq!(stored_messages(&state, id).await.len(), 1);
  }
}
