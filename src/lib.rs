//! Paperdesk - webhook-driven paper trading engine
//!
//! Maintains independent simulated brokerage accounts keyed by timeframe
//! label, executes trade instructions derived from TradingView-style webhook
//! alerts, and persists all account state to a single JSON document.

pub mod api;
pub mod config;
pub mod services;
pub mod types;

use config::Config;
use services::PaperTradingEngine;
use std::sync::Arc;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<PaperTradingEngine>,
}

// Re-export commonly used types
pub use types::*;
