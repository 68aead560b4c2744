pub mod accounts;
pub mod health;
pub mod webhook;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(webhook::router())
        .nest("/api/paper", accounts::router())
}
