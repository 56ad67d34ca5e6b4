use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::presence;
use crate::dm::{conversations, messages};
use crate::error::ApiError;
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// GET /: service banner.
async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "HauzFlow API running",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.environment,
    }))
}

/// Unmatched routes get the same JSON error shape as handler failures.
async fn not_found() -> ApiError {
    ApiError::NotFound("route not found".to_string())
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// CORS restricted to the configured browser origins.
/// Requests without an Origin header (mobile apps, curl) are unaffected.
pub fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    // Note: /api/conversations/user/{user_id} is a distinct literal segment,
    // so it does not collide with /api/conversations/{conversation_id}/...
    let conversation_routes = Router::new()
        .route("/api/conversations", post(conversations::create_conversation))
        .route(
            "/api/conversations/user/{user_id}",
            get(conversations::list_conversations),
        )
        .route(
            "/api/conversations/{conversation_id}/messages",
            get(messages::get_messages),
        )
        .route(
            "/api/conversations/{conversation_id}/read",
            put(conversations::mark_as_read),
        )
        .route("/api/messages", post(messages::send_message));

    let presence_routes = Router::new().route("/api/presence", get(presence::get_presence));

    // WebSocket endpoint (identity announced in-band)
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check));

    Router::new()
        .merge(conversation_routes)
        .merge(presence_routes)
        .merge(ws_routes)
        .merge(public_routes)
        .fallback(not_found)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
