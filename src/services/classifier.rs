//! Trade Classifier
//!
//! Turns a raw webhook alert into a normalized trade instruction: asset type,
//! target timeframe, open/close intent, quantity and reference price. Pure
//! functions only; the classifier never touches account state.

use crate::types::{AssetType, Direction, OptionType, WebhookAlert};
use thiserror::Error;

/// Classification errors. All of these mean the webhook was malformed;
/// no account is mutated.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(f64),

    #[error("price must be positive, got {0}")]
    InvalidPrice(f64),

    #[error("unrecognized action: {0}")]
    UnknownAction(String),
}

/// What the instruction asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeIntent {
    /// Enter a new position (or add to an existing one) in the direction
    Open(Direction),
    /// Close the matching open position
    Close,
    /// Close the open position, then open in the new direction
    Reverse(Direction),
}

/// Option contract details carried by the payload, possibly partial.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionHint {
    pub strike: Option<f64>,
    pub expiry: Option<String>,
    pub option_type: Option<OptionType>,
}

/// Normalized instruction handed to the execution engine.
#[derive(Debug, Clone)]
pub struct TradeInstruction {
    pub ticker: String,
    pub asset_type: AssetType,
    pub timeframe: String,
    pub intent: TradeIntent,
    pub quantity: f64,
    /// Share price for stock, per-contract premium for options. May be
    /// absent for option trades, in which case the engine resolves a quote.
    pub price: Option<f64>,
    pub option: Option<OptionHint>,
}

/// Determine the asset type from option-identifying fields. Total: absence
/// of evidence defaults to stock.
pub fn detect_asset_type(alert: &WebhookAlert) -> AssetType {
    if alert.has_option_marker() {
        AssetType::Option
    } else {
        AssetType::Stock
    }
}

/// Map a free-form interval hint to a timeframe label. Unknown or missing
/// intervals fall back to the default rather than failing.
pub fn normalize_timeframe(raw: Option<&str>, default: &str) -> String {
    let Some(raw) = raw else {
        return default.to_string();
    };

    match raw.trim().to_lowercase().as_str() {
        "1" | "60" | "1h" | "60m" | "1 hour" => "1H".to_string(),
        "4" | "240" | "4h" | "4 hour" => "4H".to_string(),
        "1d" | "d" | "day" | "daily" | "1440" => "1D".to_string(),
        _ => default.to_string(),
    }
}

fn parse_market_position(raw: Option<&str>) -> Option<MarketPosition> {
    match raw?.trim().to_lowercase().as_str() {
        "long" => Some(MarketPosition::Long),
        "short" => Some(MarketPosition::Short),
        "flat" => Some(MarketPosition::Flat),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketPosition {
    Long,
    Short,
    Flat,
}

/// Decide open/close/reverse from the action string plus the optional
/// position-state fields. Position-state transitions take precedence over
/// the bare action since they encode what the strategy actually did.
pub fn parse_intent(
    action: &str,
    market_position: Option<&str>,
    prev_market_position: Option<&str>,
) -> Result<TradeIntent, ClassifyError> {
    use MarketPosition::*;

    let current = parse_market_position(market_position);
    let previous = parse_market_position(prev_market_position);

    if let (Some(prev), Some(curr)) = (previous, current) {
        match (prev, curr) {
            (Flat, Long) => return Ok(TradeIntent::Open(Direction::Long)),
            (Flat, Short) => return Ok(TradeIntent::Open(Direction::Short)),
            (Long, Flat) | (Short, Flat) => return Ok(TradeIntent::Close),
            (Long, Short) => return Ok(TradeIntent::Reverse(Direction::Short)),
            (Short, Long) => return Ok(TradeIntent::Reverse(Direction::Long)),
            // Same-side transition: the strategy added to its position
            (Long, Long) => return Ok(TradeIntent::Open(Direction::Long)),
            (Short, Short) => return Ok(TradeIntent::Open(Direction::Short)),
            (Flat, Flat) => {} // fall through to the action string
        }
    }

    match action.trim().to_lowercase().as_str() {
        "buy" | "long" => Ok(TradeIntent::Open(Direction::Long)),
        "sell" | "close" | "exit" | "flat" => Ok(TradeIntent::Close),
        other => Err(ClassifyError::UnknownAction(other.to_string())),
    }
}

fn parse_option_type(raw: Option<&str>) -> Option<OptionType> {
    match raw?.trim().to_lowercase().as_str() {
        "call" | "c" => Some(OptionType::Call),
        "put" | "p" => Some(OptionType::Put),
        _ => None,
    }
}

/// Classify a raw alert into a normalized instruction.
pub fn classify(
    alert: &WebhookAlert,
    default_timeframe: &str,
) -> Result<TradeInstruction, ClassifyError> {
    let ticker = alert
        .ticker
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ClassifyError::MissingField("ticker"))?
        .to_uppercase();

    let action = alert
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or(ClassifyError::MissingField("action"))?;

    let intent = parse_intent(
        action,
        alert.market_position.as_deref(),
        alert.prev_market_position.as_deref(),
    )?;

    let quantity = alert.contracts.unwrap_or(1.0);
    if quantity <= 0.0 {
        return Err(ClassifyError::InvalidQuantity(quantity));
    }

    if let Some(price) = alert.price {
        if price <= 0.0 {
            return Err(ClassifyError::InvalidPrice(price));
        }
    }

    let asset_type = detect_asset_type(alert);
    let option = match asset_type {
        AssetType::Option => Some(OptionHint {
            strike: alert.strike,
            expiry: alert.expiry.clone(),
            option_type: parse_option_type(alert.option_type.as_deref()),
        }),
        AssetType::Stock => None,
    };

    Ok(TradeInstruction {
        ticker,
        asset_type,
        timeframe: normalize_timeframe(alert.interval.as_deref(), default_timeframe),
        intent,
        quantity,
        price: alert.price,
        option,
    })
}
