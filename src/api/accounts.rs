//! Accounts API
//!
//! Endpoints for paper trading account state:
//! - GET /api/paper/accounts - all account snapshots
//! - GET /api/paper/accounts/:timeframe - one account ("all" accepted)
//! - POST /api/paper/reset - reinitialize one account or all of them

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::services::EngineError;
use crate::types::Account;
use crate::AppState;

/// Create accounts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list_accounts))
        .route("/accounts/:timeframe", get(get_account))
        .route("/reset", post(reset_accounts))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// GET /api/paper/accounts
async fn list_accounts(State(state): State<AppState>) -> Json<ApiResponse<Vec<Account>>> {
    let accounts = state.engine.accounts().await;
    Json(ApiResponse { data: accounts })
}

/// GET /api/paper/accounts/:timeframe
///
/// `"all"` returns every account; anything else returns the single matching
/// account or 404.
async fn get_account(
    State(state): State<AppState>,
    Path(timeframe): Path<String>,
) -> Result<Response, EngineError> {
    if timeframe.eq_ignore_ascii_case("all") {
        let accounts = state.engine.accounts().await;
        return Ok(Json(ApiResponse { data: accounts }).into_response());
    }

    let account = state.engine.account(&timeframe).await?;
    Ok(Json(ApiResponse { data: account }).into_response())
}

#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    /// Timeframe label or "all"
    pub timeframe: String,
}

/// POST /api/paper/reset
///
/// Destructive: restores starting balances and clears trade/position history
/// for the named account (or all accounts). Returns the new snapshots.
async fn reset_accounts(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ApiResponse<Vec<Account>>>, EngineError> {
    let accounts = state.engine.reset(&request.timeframe).await?;
    Ok(Json(ApiResponse { data: accounts }))
}
