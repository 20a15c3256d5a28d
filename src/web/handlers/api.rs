use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use crate::chat::{RoutingMode, TranscriptEntry};
use crate::db::ConnectionParams;
use crate::web::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    pub dialect: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub was_connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SettingsRequest {
    pub model: Option<String>,
    pub routing: Option<RoutingMode>,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub model: String,
    pub routing: RoutingMode,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub session_count: usize,
    pub default_model: String,
    pub routing: RoutingMode,
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        session_count: state.sessions.len().await,
        default_model: state.llm_manager.default_model().to_string(),
        routing: state.config.chat.routing,
    })
}

pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.llm_manager.models().to_vec())
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(params): Json<ConnectionParams>,
) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;

    let result: ApiResult<ConnectResponse> = match handle.lock().await.chat.connect(params).await {
        Ok(dialect) => Ok(Json(ConnectResponse {
            connected: true,
            dialect,
        })),
        Err(e) => {
            error!("Failed to connect: {}", e);
            Err((StatusCode::BAD_REQUEST, format!("Failed to connect: {}", e)))
        }
    };

    (jar, result)
}

pub async fn disconnect(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let was_connected = handle.lock().await.chat.disconnect();

    (jar, Json(DisconnectResponse { was_connected }))
}

// Natural language chat turn
pub async fn chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<ChatRequest>,
) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let message = payload.message.trim();

    let result: ApiResult<TranscriptEntry> = if message.is_empty() {
        Err((StatusCode::BAD_REQUEST, "Message must not be empty".to_string()))
    } else {
        let mut session = handle.lock().await;
        Ok(Json(session.chat.submit(message).await.clone()))
    };

    (jar, result)
}

pub async fn get_transcript(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let entries = handle.lock().await.chat.transcript().entries().to_vec();

    (jar, Json(entries))
}

// Schema
pub async fn get_schema(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;

    let result: ApiResult<String> = match handle.lock().await.chat.schema().await {
        Some(Ok(schema)) => Ok(Json(schema)),
        Some(Err(e)) => {
            error!("Failed to read schema: {}", e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e)))
        }
        None => Err((StatusCode::BAD_REQUEST, "No database connected".to_string())),
    };

    (jar, result)
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SettingsRequest>,
) -> (CookieJar, ApiResult<SettingsResponse>) {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let mut session = handle.lock().await;

    if let Some(model) = &payload.model {
        match state.llm_manager.client_for(model) {
            Ok(llm) => session.chat.set_llm(llm),
            Err(e) => return (jar, Err((StatusCode::BAD_REQUEST, e.to_string()))),
        }
    }
    if let Some(routing) = payload.routing {
        session.chat.set_routing(routing);
    }

    info!("Session settings: model {}, routing {}", session.chat.model(), session.chat.routing());

    let response = SettingsResponse {
        model: session.chat.model().to_string(),
        routing: session.chat.routing(),
    };

    (jar, Ok(Json(response)))
}

pub async fn end_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, removed) = state.sessions.end(jar).await;
    let status = if removed { StatusCode::NO_CONTENT } else { StatusCode::NOT_FOUND };

    (jar, status)
}
