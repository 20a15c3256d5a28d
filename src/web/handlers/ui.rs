use axum::{
    extract::{Form, State},
    response::{Html, IntoResponse, Redirect},
};
use axum_extra::extract::cookie::CookieJar;
use minijinja::context;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::chat::RoutingMode;
use crate::db::{ConnectionParams, Driver};
use crate::web::session::Notice;
use crate::web::state::AppState;
use crate::web::templates::render_template;

#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    pub model: String,
    pub routing: RoutingMode,
}

#[derive(Debug, Deserialize)]
pub struct ChatForm {
    pub message: String,
}

// Main UI entry point
pub async fn index_handler(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let mut session = handle.lock().await;
    let notice = session.notice.take();
    let chat = &session.chat;

    let form = chat
        .connection()
        .cloned()
        .unwrap_or_else(|| ConnectionParams::from(&state.config.database));

    let html = render_template(
        &state.template_env,
        "chat.html",
        context! {
            notice => notice,
            transcript => chat.transcript(),
            connected => chat.is_connected(),
            dialect => chat.dialect(),
            form => form,
            drivers => [Driver::Mysql, Driver::Duckdb],
            models => state.llm_manager.models(),
            model => chat.model(),
            routing => chat.routing(),
            routings => [RoutingMode::Classify, RoutingMode::AlwaysSql],
        },
    );

    (jar, Html(html))
}

pub async fn connect(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(params): Form<ConnectionParams>,
) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let mut session = handle.lock().await;

    session.notice = Some(match session.chat.connect(params).await {
        Ok(dialect) => {
            info!("Session connected to a {} database", dialect);
            Notice::success("Database connected!")
        }
        Err(e) => {
            error!("Failed to connect: {}", e);
            Notice::error(format!("Failed to connect: {}", e))
        }
    });

    (jar, Redirect::to("/"))
}

pub async fn disconnect(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let mut session = handle.lock().await;

    if session.chat.disconnect() {
        session.notice = Some(Notice::success("Database disconnected."));
    }

    (jar, Redirect::to("/"))
}

pub async fn settings(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<SettingsForm>,
) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let mut session = handle.lock().await;

    match state.llm_manager.client_for(&form.model) {
        Ok(llm) => {
            session.chat.set_llm(llm);
            session.chat.set_routing(form.routing);
            info!("Session now using model {} with {} routing", form.model, form.routing);
            session.notice = Some(Notice::success("Settings saved."));
        }
        Err(e) => session.notice = Some(Notice::error(e.to_string())),
    }

    (jar, Redirect::to("/"))
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<ChatForm>,
) -> impl IntoResponse {
    let (jar, handle) = state.sessions.resolve(jar, || state.new_session()).await;
    let message = form.message.trim();

    if !message.is_empty() {
        handle.lock().await.chat.submit(message).await;
    }

    (jar, Redirect::to("/"))
}

pub async fn end_session(State(state): State<Arc<AppState>>, jar: CookieJar) -> impl IntoResponse {
    let (jar, _) = state.sessions.end(jar).await;
    (jar, Redirect::to("/"))
}
