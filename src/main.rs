use paperdesk::config::Config;
use paperdesk::services::{JsonStore, OptionQuoteService, PaperTradingEngine};
use paperdesk::{api, AppState};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paperdesk=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting paperdesk server on {}:{}", config.host, config.port);

    // Account persistence; a corrupt document fails here, loudly, rather
    // than silently discarding trade history.
    let store = Arc::new(JsonStore::new(config.data_file.clone()));
    let options = Arc::new(OptionQuoteService::new(&config.options));
    let engine = Arc::new(PaperTradingEngine::load(
        store,
        options,
        config.starting_balance,
    )?);

    // Create application state
    let state = AppState {
        config: config.clone(),
        engine,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = api::router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("paperdesk listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
