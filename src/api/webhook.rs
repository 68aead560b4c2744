//! Webhook API
//!
//! Ingress for trade alerts:
//! - POST /api/webhook - process one TradingView-style trade alert
//!
//! The raw JSON body is kept verbatim for the account audit log; a typed
//! view of it is classified into a normalized instruction and handed to the
//! engine. Malformed payloads are rejected before any account is touched.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;

use crate::services::{classify, EngineError};
use crate::types::{WebhookAlert, WebhookResponse};
use crate::AppState;

/// Create webhook router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/webhook", post(receive_webhook))
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Convert EngineError to an HTTP response with a distinct status and code
/// per variant.
impl IntoResponse for EngineError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            EngineError::MalformedWebhook(_) => (StatusCode::BAD_REQUEST, "MALFORMED_WEBHOOK"),
            EngineError::InsufficientBalance { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_BALANCE")
            }
            EngineError::PositionNotFound(_) => (StatusCode::NOT_FOUND, "POSITION_NOT_FOUND"),
            EngineError::AccountNotFound(_) => (StatusCode::NOT_FOUND, "ACCOUNT_NOT_FOUND"),
            EngineError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_FAILURE")
            }
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}

/// POST /api/webhook
///
/// Process one trade alert and return the executed trade summary plus the
/// updated account balance.
async fn receive_webhook(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<WebhookResponse>, EngineError> {
    debug!("Webhook received: {}", payload);

    let alert: WebhookAlert = serde_json::from_value(payload.clone())
        .map_err(|e| EngineError::MalformedWebhook(e.to_string()))?;

    let instruction = classify(&alert, &state.config.default_timeframe)
        .map_err(|e| EngineError::MalformedWebhook(e.to_string()))?;

    let outcome = state.engine.execute(instruction, payload).await?;

    let message = format!(
        "{} trade(s) executed on {}",
        outcome.trades.len(),
        outcome.timeframe
    );

    Ok(Json(WebhookResponse {
        success: true,
        message,
        trades: outcome.trades,
        balance: outcome.cash_balance,
        timeframe: outcome.timeframe,
        warning: outcome.warning,
    }))
}
