//! Trading Types
//!
//! Data model for the paper trading engine: accounts, positions, trades,
//! and the option contract descriptors that ride along with option positions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// =============================================================================
// Enums
// =============================================================================

/// Asset type of a trade or position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    /// Shares of an underlying
    Stock,
    /// Options contracts
    Option,
}

impl AssetType {
    /// Monetary multiplier per unit: 1 share for stock, 100 shares per contract.
    pub fn multiplier(&self) -> f64 {
        match self {
            AssetType::Stock => 1.0,
            AssetType::Option => 100.0,
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssetType::Stock => write!(f, "stock"),
            AssetType::Option => write!(f, "option"),
        }
    }
}

/// Trade side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "buy"),
            TradeSide::Sell => write!(f, "sell"),
        }
    }
}

/// Position direction, derived from the opening action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// The opposite direction (used for reversals).
    pub fn flip(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

/// Lifecycle status of a trade record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Open,
    Closed,
}

/// Option contract type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "call"),
            OptionType::Put => write!(f, "put"),
        }
    }
}

// =============================================================================
// Option descriptors
// =============================================================================

/// Identifies a specific option contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    /// Strike price
    pub strike: f64,
    /// Expiry date, YYYY-MM-DD
    pub expiry: String,
    /// Call or put
    pub option_type: OptionType,
}

/// An at-the-money quote from the option-data provider (or synthesized).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    pub contract: OptionContract,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
    /// True when the quote was generated locally because live data was
    /// unavailable.
    pub synthetic: bool,
}

// =============================================================================
// Position
// =============================================================================

/// An open exposure awaiting a closing trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Underlying symbol
    pub ticker: String,
    /// Stock or option
    pub asset_type: AssetType,
    /// Long or short
    pub direction: Direction,
    /// Share or contract count, always positive
    pub quantity: f64,
    /// Price per unit at open: share price for stock, per-contract premium
    /// for options
    pub entry_price: f64,
    /// Total capital committed = quantity x entry_price x multiplier
    pub cost_basis: f64,
    /// When the position was opened (ms)
    pub opened_at: i64,
    /// Trade record that opened this position
    pub open_trade_id: String,
    /// Contract details, options only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<OptionContract>,
}

impl Position {
    /// Create a new position from an opening trade.
    pub fn new(
        ticker: String,
        asset_type: AssetType,
        direction: Direction,
        quantity: f64,
        entry_price: f64,
        open_trade_id: String,
        contract: Option<OptionContract>,
    ) -> Self {
        let cost_basis = quantity * entry_price * asset_type.multiplier();
        Self {
            ticker,
            asset_type,
            direction,
            quantity,
            entry_price,
            cost_basis,
            opened_at: chrono::Utc::now().timestamp_millis(),
            open_trade_id,
            contract,
        }
    }

    /// Composite key within an account's open-position map. Distinct option
    /// contracts on the same underlying never collide.
    pub fn key(&self) -> String {
        Self::make_key(&self.ticker, self.asset_type, self.contract.as_ref())
    }

    /// Build a composite position key from its parts.
    pub fn make_key(ticker: &str, asset_type: AssetType, contract: Option<&OptionContract>) -> String {
        match (asset_type, contract) {
            (AssetType::Option, Some(c)) => format!(
                "{}:option:{}:{}:{}",
                ticker.to_uppercase(),
                c.strike,
                c.expiry,
                c.option_type
            ),
            _ => format!("{}:{}", ticker.to_uppercase(), asset_type),
        }
    }

    /// Average a second opening fill into this position.
    pub fn add(&mut self, quantity: f64, price: f64) {
        let added = quantity * price * self.asset_type.multiplier();
        let total_qty = self.quantity + quantity;
        self.cost_basis += added;
        self.entry_price = self.cost_basis / (total_qty * self.asset_type.multiplier());
        self.quantity = total_qty;
    }
}

// =============================================================================
// Trade
// =============================================================================

/// An immutable record of one executed instruction. Once appended to an
/// account's history the only permitted mutation is flipping `status` from
/// Open to Closed when the position it opened is closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// Unique; ticker + timeframe + timestamp plus a random suffix
    pub id: String,
    /// Buy or sell
    pub side: TradeSide,
    /// Stock or option
    pub asset_type: AssetType,
    /// Underlying symbol
    pub ticker: String,
    /// Share or contract count
    pub quantity: f64,
    /// Execution price per unit
    pub price: f64,
    /// quantity x price x multiplier
    pub value: f64,
    /// Execution time (ms)
    pub timestamp: i64,
    /// Open or closed
    pub status: TradeStatus,
    /// 0 for opening trades; signed amount for closing trades
    pub realized_pnl: f64,
    /// Realized P&L as a percentage of the closed cost basis
    pub realized_pnl_pct: f64,
    /// Account this trade belongs to
    pub timeframe: String,
    /// Contract details, options only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<OptionContract>,
}

/// Readable ticker/timeframe/timestamp prefix plus a random suffix; the two
/// legs of a reversal execute in the same millisecond and must not collide.
fn trade_id(ticker: &str, timeframe: &str, timestamp: i64) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}-{}",
        ticker.to_uppercase(),
        timeframe,
        timestamp,
        &nonce[..8]
    )
}

impl Trade {
    /// Create an opening trade record.
    pub fn open(
        side: TradeSide,
        asset_type: AssetType,
        ticker: &str,
        quantity: f64,
        price: f64,
        timeframe: &str,
        contract: Option<OptionContract>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self {
            id: trade_id(ticker, timeframe, timestamp),
            side,
            asset_type,
            ticker: ticker.to_uppercase(),
            quantity,
            price,
            value: quantity * price * asset_type.multiplier(),
            timestamp,
            status: TradeStatus::Open,
            realized_pnl: 0.0,
            realized_pnl_pct: 0.0,
            timeframe: timeframe.to_string(),
            contract,
        }
    }

    /// Create a closing trade record carrying the realized P&L.
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        side: TradeSide,
        asset_type: AssetType,
        ticker: &str,
        quantity: f64,
        price: f64,
        realized_pnl: f64,
        realized_pnl_pct: f64,
        timeframe: &str,
        contract: Option<OptionContract>,
    ) -> Self {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Self {
            id: trade_id(ticker, timeframe, timestamp),
            side,
            asset_type,
            ticker: ticker.to_uppercase(),
            quantity,
            price,
            value: quantity * price * asset_type.multiplier(),
            timestamp,
            status: TradeStatus::Closed,
            realized_pnl,
            realized_pnl_pct,
            timeframe: timeframe.to_string(),
            contract,
        }
    }
}

// =============================================================================
// Webhook audit log
// =============================================================================

/// Raw ingress record, stored verbatim for audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub id: String,
    /// Opaque payload exactly as received
    pub payload: serde_json::Value,
    /// When the webhook arrived (ms)
    pub received_at: i64,
}

impl WebhookEvent {
    pub fn new(payload: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            payload,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// One isolated simulated brokerage ledger, keyed by a timeframe label.
///
/// `cash_balance` is mutated only by trade execution; trades are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    /// Label partitioning otherwise-identical accounts, e.g. "1H"
    pub timeframe: String,
    /// Available cash
    pub cash_balance: f64,
    /// Fixed seed amount at creation, used for reporting
    pub initial_balance: f64,
    /// Ordered, append-only trade history
    #[serde(default)]
    pub trades: Vec<Trade>,
    /// Open positions by composite key
    #[serde(default)]
    pub open_positions: HashMap<String, Position>,
    /// Raw webhook audit log
    #[serde(default)]
    pub webhooks: Vec<WebhookEvent>,
}

impl Account {
    /// Create a fresh account seeded with the starting balance.
    pub fn new(timeframe: &str, initial_balance: f64) -> Self {
        Self {
            timeframe: timeframe.to_string(),
            cash_balance: initial_balance,
            initial_balance,
            trades: Vec::new(),
            open_positions: HashMap::new(),
            webhooks: Vec::new(),
        }
    }

    /// Restore the starting balance and clear all history. Destructive.
    pub fn reset(&mut self) {
        self.cash_balance = self.initial_balance;
        self.trades.clear();
        self.open_positions.clear();
        self.webhooks.clear();
    }

    /// Flip the matching open trade's status once its position fully closes.
    pub fn mark_trade_closed(&mut self, trade_id: &str) {
        if let Some(trade) = self.trades.iter_mut().find(|t| t.id == trade_id) {
            trade.status = TradeStatus::Closed;
        }
    }
}
