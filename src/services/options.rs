//! Option Quote Service
//!
//! Resolves at-the-money option descriptors for an underlying. Queries the
//! configured provider with a bounded timeout; when live data is unavailable
//! (no provider configured, timeout, bad body) it degrades to a synthetic
//! quote so a trade never fails solely because option data is down.

use crate::config::OptionProviderConfig;
use crate::types::{Direction, OptionContract, OptionQuote, OptionType};
use chrono::{Datelike, Duration as ChronoDuration, Utc, Weekday};
use dashmap::DashMap;
use rand::Rng;
use serde::Deserialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Synthetic premium band when no live quote is available.
const SYNTHETIC_PREMIUM_MIN: f64 = 1.50;
const SYNTHETIC_PREMIUM_MAX: f64 = 3.50;

/// How long a live provider quote stays fresh.
const QUOTE_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
enum OptionDataError {
    #[error("no option provider configured")]
    Unconfigured,

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("provider returned unusable body: {0}")]
    BadBody(String),
}

/// Quote shape returned by the provider.
#[derive(Debug, Deserialize)]
struct ProviderQuote {
    strike: f64,
    expiry: String,
    bid: f64,
    ask: f64,
    mid: Option<f64>,
}

/// The option type a signal direction maps to: long exposure buys calls,
/// short exposure buys puts.
pub fn option_type_for(direction: Direction) -> OptionType {
    match direction {
        Direction::Long => OptionType::Call,
        Direction::Short => OptionType::Put,
    }
}

/// ATM option quote resolver with fallback pricing.
pub struct OptionQuoteService {
    client: reqwest::Client,
    base_url: Option<String>,
    api_key: Option<String>,
    /// Fresh provider quotes, keyed by "TICKER:type"
    cache: DashMap<String, (OptionQuote, Instant)>,
}

impl OptionQuoteService {
    /// Create a service from the provider configuration. The HTTP client
    /// carries the configured timeout so a slow provider never stalls trade
    /// execution.
    pub fn new(config: &OptionProviderConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            cache: DashMap::new(),
        }
    }

    /// Service that never reaches a provider; every quote is synthetic.
    pub fn offline() -> Self {
        Self::new(&OptionProviderConfig {
            base_url: None,
            api_key: None,
            timeout_ms: 1_000,
        })
    }

    /// Resolve an at-the-money quote for the underlying. `price_hint` is the
    /// underlying price from the alert, used to center the synthetic strike.
    /// Total: degrades to synthetic pricing instead of failing.
    pub async fn atm_quote(
        &self,
        ticker: &str,
        option_type: OptionType,
        price_hint: Option<f64>,
    ) -> OptionQuote {
        let cache_key = format!("{}:{}", ticker.to_uppercase(), option_type);
        if let Some(entry) = self.cache.get(&cache_key) {
            let (quote, fetched_at) = entry.value();
            if fetched_at.elapsed() < QUOTE_CACHE_TTL {
                debug!("ATM quote cache hit for {}", cache_key);
                return quote.clone();
            }
        }

        match self.fetch_quote(ticker, option_type).await {
            Ok(quote) => {
                self.cache
                    .insert(cache_key, (quote.clone(), Instant::now()));
                quote
            }
            Err(e) => {
                warn!(
                    "Option data unavailable for {} {} ({}), using synthetic quote",
                    ticker, option_type, e
                );
                self.synthetic_quote(option_type, price_hint)
            }
        }
    }

    async fn fetch_quote(
        &self,
        ticker: &str,
        option_type: OptionType,
    ) -> Result<OptionQuote, OptionDataError> {
        let base = self.base_url.as_ref().ok_or(OptionDataError::Unconfigured)?;
        let url = format!(
            "{}/atm/{}?type={}",
            base.trim_end_matches('/'),
            ticker.to_uppercase(),
            option_type
        );

        let mut request = self.client.get(&url);
        if let Some(ref key) = self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let quote: ProviderQuote = request.send().await?.error_for_status()?.json().await?;

        if quote.strike <= 0.0 || quote.bid < 0.0 || quote.ask < quote.bid {
            return Err(OptionDataError::BadBody(format!(
                "strike={} bid={} ask={}",
                quote.strike, quote.bid, quote.ask
            )));
        }

        let mid = quote.mid.unwrap_or((quote.bid + quote.ask) / 2.0);
        Ok(OptionQuote {
            contract: OptionContract {
                strike: quote.strike,
                expiry: quote.expiry,
                option_type,
            },
            bid: quote.bid,
            ask: quote.ask,
            mid,
            synthetic: false,
        })
    }

    /// Fallback pricing: premium in a plausible band with a realistic spread,
    /// strike centered on the hinted underlying price, expiry next Friday.
    fn synthetic_quote(&self, option_type: OptionType, price_hint: Option<f64>) -> OptionQuote {
        let mut rng = rand::thread_rng();

        let strike = match price_hint {
            Some(p) if p > 0.0 => ((p / 5.0).round() * 5.0).max(1.0),
            _ => 100.0,
        };

        let mid = round_cents(rng.gen_range(SYNTHETIC_PREMIUM_MIN..=SYNTHETIC_PREMIUM_MAX));
        let spread = (mid * 0.08).max(0.05);
        let bid = round_cents((mid - spread / 2.0).max(0.05));
        let ask = round_cents(mid + spread / 2.0);

        OptionQuote {
            contract: OptionContract {
                strike,
                expiry: next_friday(),
                option_type,
            },
            bid,
            ask,
            mid,
            synthetic: true,
        }
    }
}

fn round_cents(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// The next Friday strictly after today, YYYY-MM-DD.
fn next_friday() -> String {
    let today = Utc::now().date_naive();
    let today_from_monday = today.weekday().num_days_from_monday() as i64;
    let friday_from_monday = Weekday::Fri.num_days_from_monday() as i64;
    let mut days_ahead = (friday_from_monday - today_from_monday).rem_euclid(7);
    if days_ahead == 0 {
        days_ahead = 7;
    }
    (today + ChronoDuration::days(days_ahead))
        .format("%Y-%m-%d")
        .to_string()
}
