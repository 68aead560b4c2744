//! Webhook wire types
//!
//! TradingView placeholder substitution produces loosely-typed JSON: numeric
//! fields arrive sometimes as strings, sometimes as numbers. Everything here
//! is parsed defensively at the boundary so no string-typed numeric field
//! ever reaches the engine's arithmetic.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::types::Trade;

/// Raw inbound trade alert.
///
/// All fields are optional at the wire level; the classifier decides which
/// are required for a given instruction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookAlert {
    pub ticker: Option<String>,
    /// Informational only
    pub exchange: Option<String>,
    /// Timeframe hint, e.g. "60", "1h", 240
    #[serde(default, deserialize_with = "flexible_opt_string")]
    pub interval: Option<String>,
    /// "buy" | "sell" | "close", case-insensitive
    pub action: Option<String>,
    /// Quantity
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub contracts: Option<f64>,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub price: Option<f64>,
    /// "long" | "short" | "flat"
    pub market_position: Option<String>,
    pub prev_market_position: Option<String>,
    /// Presence of any of the following implies an option trade
    pub option_symbol: Option<String>,
    #[serde(default, deserialize_with = "flexible_opt_f64")]
    pub strike: Option<f64>,
    pub expiry: Option<String>,
    pub option_type: Option<String>,
}

impl WebhookAlert {
    /// Whether the payload carries any option-identifying field.
    pub fn has_option_marker(&self) -> bool {
        self.option_symbol.is_some()
            || self.strike.is_some()
            || self.expiry.is_some()
            || self.option_type.is_some()
    }
}

/// Accept a JSON number or a numeric string; reject anything else.
pub fn flexible_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| de::Error::custom("number out of range")),
        Some(serde_json::Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<f64>()
                .map(Some)
                .map_err(|_| de::Error::custom(format!("expected numeric value, got \"{}\"", s)))
        }
        Some(other) => Err(de::Error::custom(format!(
            "expected number or numeric string, got {}",
            other
        ))),
    }
}

/// Accept a JSON string or number and normalize to a string.
pub fn flexible_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

// =============================================================================
// API response types
// =============================================================================

/// Response body for a processed webhook.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    /// Executed trade records; a reversal produces two
    pub trades: Vec<Trade>,
    /// Updated account cash balance
    pub balance: f64,
    pub timeframe: String,
    /// Set when part of the instruction degraded, e.g. a reversal whose
    /// re-open leg was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}
