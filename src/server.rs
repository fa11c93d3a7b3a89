//! HTTP endpoints
//!
//! - `GET /` health check
//! - `POST /whatsapp` Twilio inbound message webhook
//! - `GET /media/:file` rendered ticket images for Twilio to fetch

use crate::error::BotError;
use crate::handler::WebhookHandler;
use crate::types::{TicketId, UserId};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Empty TwiML document; replies are sent through the REST API instead
pub const EMPTY_TWIML: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#;

/// Shared state for the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<WebhookHandler>,
}

impl AppState {
    pub fn new(handler: Arc<WebhookHandler>) -> Self {
        Self { handler }
    }
}

/// Fields of a Twilio inbound message webhook that the bot reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "Body", default)]
    pub body: String,
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    message: &'static str,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/whatsapp", post(whatsapp_webhook))
        .route("/media/:file", get(ticket_media))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Health> {
    Json(Health {
        status: "ok",
        message: "Metro ticket bot is running",
    })
}

async fn whatsapp_webhook(
    State(state): State<AppState>,
    Form(message): Form<InboundMessage>,
) -> Result<Response, BotError> {
    let user_id = UserId::new(message.from);
    state.handler.handle(&user_id, &message.body).await?;

    Ok(([(header::CONTENT_TYPE, "application/xml")], EMPTY_TWIML).into_response())
}

async fn ticket_media(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let Some(ticket_id) = file.strip_suffix(".png").and_then(TicketId::parse) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.handler.media().get(&ticket_id).await {
        Some(media) => ([(header::CONTENT_TYPE, media.content_type)], media.bytes).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        error!(error = %self, "Request failed");

        let body = Json(json!({
            "error": "Internal Server Error",
        }));

        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
