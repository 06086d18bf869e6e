#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use lessonline_api::config::ServerConfig;
use lessonline_api::middleware::identity::USER_ID_HEADER;
use lessonline_api::router::build_app_router;
use lessonline_api::state::AppState;
use lessonline_api::ws::WsManager;
use lessonline_core::session::{NewSession, Session, SessionKind};
use lessonline_core::types::DbId;
use lessonline_lifecycle::memory::InMemory;
use lessonline_lifecycle::Coordinator;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

pub const HOST: DbId = 1;
pub const ALICE: DbId = 2;
pub const BOB: DbId = 3;
pub const CAROL: DbId = 4;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        ..ServerConfig::default()
    }
}

/// The full router over in-memory lifecycle adapters.
///
/// The pool connects lazily and is never used by the routes under test.
pub fn build_test_app(memory: &InMemory) -> Router {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://localhost/unused")
        .expect("lazy pool");
    let ports = memory.ports();
    let coordinator = Coordinator::new(ports.clone(), config.lifecycle.coordinator.clone());

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        ports,
        coordinator,
    };
    build_app_router(state, &config)
}

/// Adapters with a few named users.
pub fn adapters() -> InMemory {
    let memory = InMemory::new();
    memory.users.insert(HOST, "Dr. Host");
    memory.users.insert(ALICE, "Alice");
    memory.users.insert(BOB, "Bob");
    memory.users.insert(CAROL, "Carol");
    memory
}

/// Seed a scheduled session tomorrow with `confirmed` already confirmed.
/// `invited` are invited but have not answered.
pub fn seed_session(memory: &InMemory, confirmed: &[DbId], invited: &[DbId]) -> Session {
    let starts_at = Utc::now() + Duration::days(1);
    let new = NewSession {
        kind: SessionKind::Scheduled,
        host_id: HOST,
        title: "Guitar basics".to_string(),
        starts_at,
        ends_at: starts_at + Duration::minutes(60),
        capacity: 5,
        min_participants: 1,
        enforce_minimum: true,
        invitees: confirmed.iter().chain(invited).copied().collect(),
    };
    let mut session = Session::from_new(0, &new, Utc::now());
    for &participant in confirmed {
        session.respond_to_invitation(participant, true).unwrap();
        session.confirm(participant).unwrap();
    }
    memory.sessions.seed(session)
}

/// Send a request as `user` (or anonymously) and return status plus JSON body.
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<DbId>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(id) = user {
        builder = builder.header(USER_ID_HEADER, id.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

pub async fn get(app: &Router, uri: &str, user: Option<DbId>) -> (StatusCode, Value) {
    send(app, Method::GET, uri, user, None).await
}

pub async fn post(app: &Router, uri: &str, user: DbId, body: Option<Value>) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(user), body).await
}

pub async fn put(app: &Router, uri: &str, user: DbId, body: Value) -> (StatusCode, Value) {
    send(app, Method::PUT, uri, Some(user), Some(body)).await
}
