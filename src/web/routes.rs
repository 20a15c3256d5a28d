use axum::{
    http::{header, HeaderValue},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::static_files::static_handler;
use super::state::AppState;

// UI Routes - web interface
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/connect", post(handlers::ui::connect))
        .route("/disconnect", post(handlers::ui::disconnect))
        .route("/settings", post(handlers::ui::settings))
        .route("/chat", post(handlers::ui::chat))
        .route("/session/end", post(handlers::ui::end_session))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Chat
            .route("/chat", post(handlers::api::chat))
            .route("/transcript", get(handlers::api::get_transcript))
            // Database connection
            .route("/connect", post(handlers::api::connect))
            .route("/disconnect", post(handlers::api::disconnect))
            .route("/schema", get(handlers::api::get_schema))
            // Session
            .route("/settings", put(handlers::api::update_settings))
            .route("/session", delete(handlers::api::end_session))
            // System status
            .route("/models", get(handlers::api::list_models))
            .route("/status", get(handlers::api::system_status)),
    )
}

pub fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .merge(ui_routes())
        .merge(api_routes())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::mock::ScriptedCompletion;
    use crate::llm::LlmManager;
    use crate::web::session::SESSION_COOKIE;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use tower::ServiceExt;

    fn test_app(replies: &[&str]) -> Router {
        let config = AppConfig::default();
        let llm_manager = LlmManager::new(&config.llm).unwrap();
        let state = AppState::new(config, llm_manager)
            .unwrap()
            .with_default_llm(Arc::new(ScriptedCompletion::new(replies.iter().copied())));

        app(Arc::new(state))
    }

    fn session_cookie(response: &Response) -> String {
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with(SESSION_COOKIE));
        set_cookie.split(';').next().unwrap().to_string()
    }

    fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn index_renders_and_sets_session_cookie() {
        let app = test_app(&[]);

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        session_cookie(&response);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("Connect Database"));
        assert!(html.contains("value=\"3306\""));
    }

    #[tokio::test]
    async fn chat_turn_is_recorded_in_the_session() {
        let app = test_app(&["CHAT", "Hi! Ask me about your data."]);

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/chat", None, serde_json::json!({ "message": "hello" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);

        let reply = body_json(response).await;
        assert_eq!(reply["speaker"], "assistant");
        assert_eq!(reply["message"], "Hi! Ask me about your data.");

        let response = app
            .oneshot(
                Request::get("/api/transcript")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let transcript = body_json(response).await;
        assert_eq!(transcript.as_array().unwrap().len(), 2);
        assert_eq!(transcript[0]["message"], "hello");
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = test_app(&[]);

        let response = app
            .oneshot(json_request("POST", "/api/chat", None, serde_json::json!({ "message": "   " })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn schema_requires_a_connection() {
        let app = test_app(&[]);

        let response = app
            .oneshot(Request::get("/api/schema").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn connects_to_embedded_database() {
        let app = test_app(&[]);
        let params = serde_json::json!({
            "driver": "duckdb",
            "host": "",
            "port": "",
            "username": "",
            "database": ":memory:"
        });

        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/connect", None, params))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = session_cookie(&response);
        assert_eq!(body_json(response).await["dialect"], "DuckDB");

        let response = app
            .oneshot(
                Request::get("/api/schema")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn connect_form_shows_success_notice() {
        let app = test_app(&[]);

        let response = app
            .clone()
            .oneshot(
                Request::post("/connect")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "driver=duckdb&host=&port=&username=&password=&database=%3Amemory%3A",
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let cookie = session_cookie(&response);

        let response = app
            .oneshot(
                Request::get("/")
                    .header(header::COOKIE, &cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();

        assert!(html.contains("<div class=\"notice success\">Database connected!</div>"));
        assert!(html.contains("Connected (DuckDB)"));
    }

    #[tokio::test]
    async fn failed_connect_reports_the_error() {
        let app = test_app(&[]);
        let params = serde_json::json!({
            "driver": "mysql",
            "host": "localhost",
            "port": "not-a-port",
            "username": "root",
            "password": "x",
            "database": "shop"
        });

        let response = app
            .oneshot(json_request("POST", "/api/connect", None, params))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&bytes).starts_with("Failed to connect: "));
    }

    #[tokio::test]
    async fn chat_form_redirects_home() {
        let app = test_app(&["CHAT", "Hello!"]);

        let response = app
            .oneshot(
                Request::post("/chat")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("message=hello"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }

    #[tokio::test]
    async fn unknown_model_is_rejected() {
        let app = test_app(&[]);

        let response = app
            .oneshot(json_request("PUT", "/api/settings", None, serde_json::json!({ "model": "gpt-9" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settings_switch_routing() {
        let app = test_app(&[]);

        let response = app
            .oneshot(json_request(
                "PUT",
                "/api/settings",
                None,
                serde_json::json!({ "model": "llama3:latest", "routing": "always_sql" }),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let settings = body_json(response).await;
        assert_eq!(settings["routing"], "always_sql");
        assert_eq!(settings["model"], "llama3:latest");
    }

    #[tokio::test]
    async fn ending_unknown_session_is_not_found() {
        let app = test_app(&[]);

        let response = app
            .oneshot(Request::delete("/api/session").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_defaults() {
        let app = test_app(&[]);

        let response = app
            .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = body_json(response).await;
        assert_eq!(status["default_model"], "llama3.2:latest");
        assert_eq!(status["routing"], "classify");
    }
}
