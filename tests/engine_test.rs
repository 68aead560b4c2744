//! Tests for the paper trading engine
//!
//! Covers:
//! - The stock and option execution scenarios end to end
//! - Multiplier correctness (stock x1, option x100)
//! - Balance conservation across trade sequences
//! - Timeframe account isolation
//! - Reset idempotency
//! - Persistence round-trips and rollback behavior

use paperdesk::services::{
    classify, EngineError, JsonStore, OptionQuoteService, PaperTradingEngine, TradeOutcome,
};
use paperdesk::types::{Direction, TradeStatus, WebhookAlert};
use std::sync::Arc;

const DEFAULT_TIMEFRAME: &str = "1H";

fn engine_at(path: std::path::PathBuf) -> PaperTradingEngine {
    let store = Arc::new(JsonStore::new(path));
    let options = Arc::new(OptionQuoteService::offline());
    PaperTradingEngine::load(store, options, 10_000.0).unwrap()
}

fn test_engine(dir: &tempfile::TempDir) -> PaperTradingEngine {
    engine_at(dir.path().join("accounts.json"))
}

/// Parse, classify and execute one raw webhook payload, exactly as the
/// HTTP handler does.
async fn deliver(
    engine: &PaperTradingEngine,
    payload: serde_json::Value,
) -> Result<TradeOutcome, EngineError> {
    let alert: WebhookAlert = serde_json::from_value(payload.clone()).unwrap();
    let instruction = classify(&alert, DEFAULT_TIMEFRAME)
        .map_err(|e| EngineError::MalformedWebhook(e.to_string()))?;
    engine.execute(instruction, payload).await
}

// =============================================================================
// Scenarios
// =============================================================================

mod scenarios {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn scenario_a_stock_open() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        let outcome = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 100, "price": 50.0}),
        )
        .await
        .unwrap();

        assert_eq!(outcome.cash_balance, 5_000.0);
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].value, 5_000.0);

        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.open_positions.len(), 1);
        let position = account.open_positions.values().next().unwrap();
        assert_eq!(position.direction, Direction::Long);
        assert_eq!(position.quantity, 100.0);
        assert_eq!(position.cost_basis, 5_000.0);
    }

    #[tokio::test]
    async fn scenario_b_stock_close_books_pnl() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 100, "price": 50.0}),
        )
        .await
        .unwrap();

        let outcome = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "sell", "contracts": 100, "price": 55.0}),
        )
        .await
        .unwrap();

        let trade = &outcome.trades[0];
        assert_eq!(trade.realized_pnl, 500.0);
        assert_eq!(trade.realized_pnl_pct, 10.0);
        assert_eq!(trade.status, TradeStatus::Closed);
        assert_eq!(outcome.cash_balance, 10_500.0);

        let account = engine.account("1H").await.unwrap();
        assert!(account.open_positions.is_empty());
    }

    #[tokio::test]
    async fn scenario_c_option_open_uses_contract_multiplier() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        let outcome = deliver(
            &engine,
            json!({
                "ticker": "XYZ", "action": "buy", "contracts": 3, "price": 2.50,
                "strike": 100, "expiry": "2026-09-04", "option_type": "call"
            }),
        )
        .await
        .unwrap();

        assert_eq!(outcome.trades[0].value, 750.0);
        assert_eq!(outcome.cash_balance, 9_250.0);
    }

    #[tokio::test]
    async fn scenario_d_insufficient_balance_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        // Seed the account with a small trade so it exists
        deliver(
            &engine,
            json!({"ticker": "ABC", "action": "buy", "contracts": 1, "price": 10.0}),
        )
        .await
        .unwrap();
        deliver(
            &engine,
            json!({"ticker": "ABC", "action": "sell", "contracts": 1, "price": 10.0}),
        )
        .await
        .unwrap();

        let result = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 1000, "price": 621.70}),
        )
        .await;

        assert!(matches!(
            result,
            Err(EngineError::InsufficientBalance { .. })
        ));
        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.cash_balance, 10_000.0);
        assert!(account.open_positions.is_empty());
    }

    #[tokio::test]
    async fn scenario_e_close_without_position_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        deliver(
            &engine,
            json!({"ticker": "ABC", "action": "buy", "contracts": 1, "price": 10.0}),
        )
        .await
        .unwrap();

        let result = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "sell", "contracts": 1, "price": 10.0}),
        )
        .await;

        assert!(matches!(result, Err(EngineError::PositionNotFound(_))));
        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.cash_balance, 9_990.0); // only the seed trade
    }
}

// =============================================================================
// Properties
// =============================================================================

mod properties {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn round_trip_at_same_price_is_flat_for_both_asset_types() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        deliver(
            &engine,
            json!({"ticker": "STK", "action": "buy", "contracts": 7, "price": 33.33}),
        )
        .await
        .unwrap();
        let stock_close = deliver(
            &engine,
            json!({"ticker": "STK", "action": "sell", "contracts": 7, "price": 33.33}),
        )
        .await
        .unwrap();
        assert_eq!(stock_close.trades[0].realized_pnl, 0.0);

        deliver(
            &engine,
            json!({
                "ticker": "OPT", "action": "buy", "contracts": 2, "price": 1.75,
                "strike": 50, "expiry": "2026-09-04", "option_type": "put"
            }),
        )
        .await
        .unwrap();
        let option_close = deliver(
            &engine,
            json!({
                "ticker": "OPT", "action": "sell", "contracts": 2, "price": 1.75,
                "strike": 50, "expiry": "2026-09-04", "option_type": "put"
            }),
        )
        .await
        .unwrap();
        assert_eq!(option_close.trades[0].realized_pnl, 0.0);

        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.cash_balance, 10_000.0);
    }

    #[tokio::test]
    async fn balance_conservation_over_a_trade_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        let mut open_costs = 0.0;
        let mut close_proceeds = 0.0;

        for (action, qty, price) in [
            ("buy", 10.0, 100.0),
            ("buy", 5.0, 110.0),
            ("sell", 15.0, 105.0),
            ("buy", 20.0, 50.0),
            ("sell", 20.0, 48.0),
        ] {
            let outcome = deliver(
                &engine,
                json!({"ticker": "XYZ", "action": action, "contracts": qty, "price": price}),
            )
            .await
            .unwrap();
            for trade in &outcome.trades {
                match trade.status {
                    TradeStatus::Open => open_costs += trade.value,
                    TradeStatus::Closed => close_proceeds += trade.value,
                }
            }
        }

        let account = engine.account("1H").await.unwrap();
        let expected = 10_000.0 - open_costs + close_proceeds;
        assert!((account.cash_balance - expected).abs() < 1e-9);
    }

    #[tokio::test]
    async fn values_are_non_negative_for_positive_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        let outcome = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 3, "price": 0.01}),
        )
        .await
        .unwrap();
        assert!(outcome.trades[0].value >= 0.0);

        let account = engine.account("1H").await.unwrap();
        assert!(account.open_positions.values().all(|p| p.cost_basis >= 0.0));
    }

    #[tokio::test]
    async fn timeframe_accounts_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 10, "price": 50.0, "interval": "60"}),
        )
        .await
        .unwrap();
        deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 10, "price": 50.0, "interval": "240"}),
        )
        .await
        .unwrap();

        let one_hour = engine.account("1H").await.unwrap();
        let four_hour = engine.account("4H").await.unwrap();

        assert_eq!(one_hour.cash_balance, 9_500.0);
        assert_eq!(four_hour.cash_balance, 9_500.0);
        assert_eq!(one_hour.trades.len(), 1);
        assert_eq!(four_hour.trades.len(), 1);

        // Closing in one account leaves the other untouched
        deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "sell", "contracts": 10, "price": 60.0, "interval": "60"}),
        )
        .await
        .unwrap();

        let four_hour = engine.account("4H").await.unwrap();
        assert_eq!(four_hour.cash_balance, 9_500.0);
        assert_eq!(four_hour.open_positions.len(), 1);
    }

    #[tokio::test]
    async fn reset_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "buy", "contracts": 10, "price": 50.0}),
        )
        .await
        .unwrap();

        let first = engine.reset("1H").await.unwrap();
        let second = engine.reset("1H").await.unwrap();

        assert_eq!(first[0].cash_balance, 10_000.0);
        assert_eq!(second[0].cash_balance, 10_000.0);
        assert!(second[0].trades.is_empty());
        assert!(second[0].open_positions.is_empty());
    }

    #[tokio::test]
    async fn reset_all_covers_every_account() {
        let dir = tempfile::tempdir().unwrap();
        let engine = test_engine(&dir);

        for interval in ["60", "240", "1d"] {
            deliver(
                &engine,
                json!({"ticker": "XYZ", "action": "buy", "contracts": 1, "price": 50.0, "interval": interval}),
            )
            .await
            .unwrap();
        }

        let accounts = engine.reset("all").await.unwrap();
        assert_eq!(accounts.len(), 3);
        assert!(accounts.iter().all(|a| a.cash_balance == 10_000.0));
        assert!(accounts.iter().all(|a| a.trades.is_empty()));
    }
}

// =============================================================================
// Concurrency
// =============================================================================

mod concurrency {
    use super::*;
    use serde_json::json;

    // Deliveries racing on one timeframe must apply one at a time; a lost
    // update would show up as a short trade count or a balance that does
    // not match the sequential expectation.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_deliveries_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(test_engine(&dir));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                deliver(
                    &engine,
                    json!({"ticker": "XYZ", "action": "buy", "contracts": 1, "price": 100.0}),
                )
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.cash_balance, 9_200.0);
        assert_eq!(account.trades.len(), 8);
        assert_eq!(account.webhooks.len(), 8);

        let position = account.open_positions.values().next().unwrap();
        assert_eq!(position.quantity, 8.0);
        assert_eq!(position.cost_basis, 800.0);

        // The persisted document saw every delivery too
        let reloaded = engine_at(dir.path().join("accounts.json"));
        let persisted = reloaded.account("1H").await.unwrap();
        assert_eq!(persisted.cash_balance, 9_200.0);
        assert_eq!(persisted.trades.len(), 8);
    }
}

// =============================================================================
// Persistence
// =============================================================================

mod persistence {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn state_survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        {
            let engine = engine_at(path.clone());
            deliver(
                &engine,
                json!({"ticker": "XYZ", "action": "buy", "contracts": 100, "price": 50.0}),
            )
            .await
            .unwrap();
        }

        let engine = engine_at(path);
        let account = engine.account("1H").await.unwrap();
        assert_eq!(account.cash_balance, 5_000.0);
        assert_eq!(account.trades.len(), 1);
        assert_eq!(account.open_positions.len(), 1);
        assert_eq!(account.webhooks.len(), 1);
    }

    #[tokio::test]
    async fn positions_remain_closable_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");

        {
            let engine = engine_at(path.clone());
            deliver(
                &engine,
                json!({"ticker": "XYZ", "action": "buy", "contracts": 100, "price": 50.0}),
            )
            .await
            .unwrap();
        }

        let engine = engine_at(path);
        let outcome = deliver(
            &engine,
            json!({"ticker": "XYZ", "action": "sell", "contracts": 100, "price": 55.0}),
        )
        .await
        .unwrap();

        assert_eq!(outcome.trades[0].realized_pnl, 500.0);
        assert_eq!(outcome.cash_balance, 10_500.0);
    }

    #[tokio::test]
    async fn corrupt_document_fails_engine_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "definitely not json").unwrap();

        let store = Arc::new(JsonStore::new(path));
        let options = Arc::new(OptionQuoteService::offline());
        let result = PaperTradingEngine::load(store, options, 10_000.0);

        assert!(matches!(result, Err(EngineError::Persistence(_))));
    }
}
