//! Paper Trading Engine
//!
//! Owns the simulated brokerage accounts (one per timeframe label), applies
//! normalized trade instructions against them, and writes every successful
//! execution through to the account store.
//!
//! Invariants enforced here:
//! - cash balance changes only through trade execution
//! - cost/value always carry the asset multiplier (1 stock, 100 option)
//! - opens are rejected outright when cash cannot cover the cost
//! - closes with no matching open position are rejected, never fabricated
//! - trades apply in arrival order per account; the account map lock is held
//!   across mutate + persist so concurrent deliveries cannot interleave

use crate::services::classifier::{TradeInstruction, TradeIntent};
use crate::services::options::{option_type_for, OptionQuoteService};
use crate::services::store::{JsonStore, StoreError};
use crate::types::{
    Account, AssetType, Direction, OptionContract, OptionType, Position, Trade, TradeSide,
    WebhookEvent,
};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Engine errors. Each maps to a distinct HTTP status at the API edge.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed webhook: {0}")]
    MalformedWebhook(String),

    #[error("insufficient balance: need {needed:.2}, have {available:.2}")]
    InsufficientBalance { needed: f64, available: f64 },

    #[error("no open position matching {0}")]
    PositionNotFound(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

/// Result of applying one instruction: the executed trade records (a
/// reversal produces two) and the account's updated balance.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub trades: Vec<Trade>,
    pub cash_balance: f64,
    pub timeframe: String,
    /// Set when part of the instruction degraded, e.g. a reversal whose
    /// re-open leg was rejected for insufficient balance
    pub warning: Option<String>,
}

/// Price and contract details resolved for one instruction before any
/// account state is touched.
struct ResolvedPricing {
    /// Share price for stock, per-contract premium for options
    price: f64,
    contract: Option<OptionContract>,
}

/// Simulated brokerage engine over an explicit account store.
pub struct PaperTradingEngine {
    /// Accounts by timeframe label. The mutex serializes trade application
    /// and is held across the write-through save so the persisted document
    /// always matches memory.
    accounts: Mutex<HashMap<String, Account>>,
    store: Arc<JsonStore>,
    options: Arc<OptionQuoteService>,
    starting_balance: f64,
}

impl PaperTradingEngine {
    /// Load persisted accounts and construct the engine. A corrupt document
    /// is a hard error; discarding history silently is not an option.
    pub fn load(
        store: Arc<JsonStore>,
        options: Arc<OptionQuoteService>,
        starting_balance: f64,
    ) -> Result<Self, EngineError> {
        let accounts = store.load()?;
        Ok(Self {
            accounts: Mutex::new(accounts),
            store,
            options,
            starting_balance,
        })
    }

    // ==========================================================================
    // Execution
    // ==========================================================================

    /// Apply a normalized instruction. `raw` is the original webhook payload,
    /// recorded verbatim on the account for audit when execution succeeds.
    pub async fn execute(
        &self,
        instruction: TradeInstruction,
        raw: serde_json::Value,
    ) -> Result<TradeOutcome, EngineError> {
        // The option lookup is the only blocking wait in the pipeline; do it
        // before taking the account lock.
        let pricing = self.resolve_pricing(&instruction).await?;

        let mut accounts = self.accounts.lock().await;
        let mut account = accounts
            .get(&instruction.timeframe)
            .cloned()
            .unwrap_or_else(|| Account::new(&instruction.timeframe, self.starting_balance));

        let mut trades = Vec::new();
        let mut warning = None;

        match instruction.intent {
            TradeIntent::Open(direction) => {
                let key = Position::make_key(
                    &instruction.ticker,
                    instruction.asset_type,
                    pricing.contract.as_ref(),
                );
                let opposite = account
                    .open_positions
                    .get(&key)
                    .map(|p| p.direction != direction)
                    .unwrap_or(false);

                if opposite {
                    // An open against an opposite-direction position is a
                    // reversal in disguise: close first, then re-open.
                    trades.push(Self::apply_close(&mut account, &instruction, &pricing)?);
                }
                trades.push(Self::apply_open(&mut account, &instruction, direction, &pricing)?);
            }
            TradeIntent::Close => {
                trades.push(Self::apply_close(&mut account, &instruction, &pricing)?);
            }
            TradeIntent::Reverse(direction) => {
                match Self::apply_close(&mut account, &instruction, &pricing) {
                    Ok(trade) => trades.push(trade),
                    Err(EngineError::PositionNotFound(key)) => {
                        // Nothing to reverse out of; treat as a plain open so
                        // the strategy's new exposure is still tracked.
                        warn!("Reversal with no open position ({}); opening only", key);
                        warning = Some(format!(
                            "no open position to reverse ({}), opened new position only",
                            key
                        ));
                    }
                    Err(e) => return Err(e),
                }
                match Self::apply_open(&mut account, &instruction, direction, &pricing) {
                    Ok(trade) => trades.push(trade),
                    Err(EngineError::InsufficientBalance { needed, available })
                        if !trades.is_empty() =>
                    {
                        // The close already executed and stands; undoing a
                        // valid close to mirror a failed open would fabricate
                        // history.
                        warning = Some(format!(
                            "position closed, but reversal re-open rejected: need {:.2}, have {:.2}",
                            needed, available
                        ));
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        account.webhooks.push(WebhookEvent::new(raw));

        // Write-through: persist a view of the live map with the updated
        // account swapped in, then commit that one account to memory only
        // when the save succeeds. A failed save rolls the trade back, and
        // untouched accounts are never copied.
        {
            let mut document: HashMap<&String, &Account> = accounts.iter().collect();
            document.insert(&instruction.timeframe, &account);
            if let Err(e) = self.store.save(&document).await {
                warn!(
                    "Rolling back trade on {}: persistence failed: {}",
                    instruction.timeframe, e
                );
                return Err(EngineError::Persistence(e));
            }
        }

        let cash_balance = account.cash_balance;
        accounts.insert(instruction.timeframe.clone(), account);

        Ok(TradeOutcome {
            trades,
            cash_balance,
            timeframe: instruction.timeframe,
            warning,
        })
    }

    /// Resolve the execution price and, for options, the contract.
    ///
    /// Premium policy: when the alert carries a price for an option trade,
    /// that price is the premium; the provider/synthetic quote is consulted
    /// only when the payload has no usable price or the contract is
    /// incompletely specified.
    async fn resolve_pricing(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<ResolvedPricing, EngineError> {
        match instruction.asset_type {
            AssetType::Stock => {
                let price = instruction.price.ok_or_else(|| {
                    EngineError::MalformedWebhook("price is required for stock trades".to_string())
                })?;
                Ok(ResolvedPricing {
                    price,
                    contract: None,
                })
            }
            AssetType::Option => {
                let hint = instruction.option.clone().unwrap_or_default();
                let direction = match instruction.intent {
                    TradeIntent::Open(d) | TradeIntent::Reverse(d) => Some(d),
                    TradeIntent::Close => None,
                };
                let option_type = hint
                    .option_type
                    .or(direction.map(option_type_for))
                    .unwrap_or(OptionType::Call);

                if let (Some(price), Some(strike), Some(expiry)) =
                    (instruction.price, hint.strike, hint.expiry.clone())
                {
                    return Ok(ResolvedPricing {
                        price,
                        contract: Some(OptionContract {
                            strike,
                            expiry,
                            option_type,
                        }),
                    });
                }

                // The payload price on an option alert is a premium, not the
                // underlying, so it is no use as a strike hint.
                let quote = self
                    .options
                    .atm_quote(&instruction.ticker, option_type, None)
                    .await;
                Ok(ResolvedPricing {
                    price: instruction.price.unwrap_or(quote.mid),
                    contract: Some(OptionContract {
                        strike: hint.strike.unwrap_or(quote.contract.strike),
                        expiry: hint.expiry.unwrap_or(quote.contract.expiry),
                        option_type,
                    }),
                })
            }
        }
    }

    /// Open (or add to) a position. Hard precondition: cash must cover the
    /// full cost; nothing partially executes.
    fn apply_open(
        account: &mut Account,
        instruction: &TradeInstruction,
        direction: Direction,
        pricing: &ResolvedPricing,
    ) -> Result<Trade, EngineError> {
        let multiplier = instruction.asset_type.multiplier();
        let cost = instruction.quantity * pricing.price * multiplier;

        if account.cash_balance < cost {
            return Err(EngineError::InsufficientBalance {
                needed: cost,
                available: account.cash_balance,
            });
        }

        let side = match direction {
            Direction::Long => TradeSide::Buy,
            Direction::Short => TradeSide::Sell,
        };
        let trade = Trade::open(
            side,
            instruction.asset_type,
            &instruction.ticker,
            instruction.quantity,
            pricing.price,
            &instruction.timeframe,
            pricing.contract.clone(),
        );

        account.cash_balance -= cost;

        let key = Position::make_key(
            &instruction.ticker,
            instruction.asset_type,
            pricing.contract.as_ref(),
        );
        match account.open_positions.get_mut(&key) {
            Some(position) if position.direction == direction => {
                position.add(instruction.quantity, pricing.price);
            }
            _ => {
                account.open_positions.insert(
                    key,
                    Position::new(
                        instruction.ticker.clone(),
                        instruction.asset_type,
                        direction,
                        instruction.quantity,
                        pricing.price,
                        trade.id.clone(),
                        pricing.contract.clone(),
                    ),
                );
            }
        }

        account.trades.push(trade.clone());
        info!(
            "[{}] Opened {} {} x{} {} @ {} (cost {:.2}, balance {:.2})",
            account.timeframe,
            direction,
            instruction.asset_type,
            instruction.quantity,
            instruction.ticker,
            pricing.price,
            cost,
            account.cash_balance
        );
        Ok(trade)
    }

    /// Close the matching open position, fully or partially. A close with no
    /// matching position is rejected.
    fn apply_close(
        account: &mut Account,
        instruction: &TradeInstruction,
        pricing: &ResolvedPricing,
    ) -> Result<Trade, EngineError> {
        let key = Self::find_position_key(account, instruction, pricing)?;
        let position = account
            .open_positions
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::PositionNotFound(key.clone()))?;

        let multiplier = position.asset_type.multiplier();
        // Cannot close more than is held; the close intent is unambiguous.
        let quantity = instruction.quantity.min(position.quantity);
        let basis_closed = position.cost_basis * (quantity / position.quantity);
        let close_value = quantity * pricing.price * multiplier;

        let realized_pnl = match position.direction {
            Direction::Long => close_value - basis_closed,
            Direction::Short => basis_closed - close_value,
        };
        let realized_pnl_pct = if basis_closed > 0.0 {
            realized_pnl / basis_closed * 100.0
        } else {
            0.0
        };
        // Credit back the committed basis plus the signed P&L; for a long
        // this equals the close value, for a short it profits as price falls.
        let proceeds = basis_closed + realized_pnl;

        account.cash_balance += proceeds;

        let side = match position.direction {
            Direction::Long => TradeSide::Sell,
            Direction::Short => TradeSide::Buy,
        };
        let trade = Trade::close(
            side,
            position.asset_type,
            &position.ticker,
            quantity,
            pricing.price,
            realized_pnl,
            realized_pnl_pct,
            &instruction.timeframe,
            position.contract.clone(),
        );

        if quantity >= position.quantity {
            account.open_positions.remove(&key);
            account.mark_trade_closed(&position.open_trade_id);
        } else if let Some(open) = account.open_positions.get_mut(&key) {
            open.quantity -= quantity;
            open.cost_basis -= basis_closed;
        }

        account.trades.push(trade.clone());
        info!(
            "[{}] Closed {} {} x{} {} @ {} (pnl {:+.2} / {:+.2}%, balance {:.2})",
            account.timeframe,
            position.direction,
            position.asset_type,
            quantity,
            position.ticker,
            pricing.price,
            realized_pnl,
            realized_pnl_pct,
            account.cash_balance
        );
        Ok(trade)
    }

    /// Locate the position a close instruction refers to. Exact composite
    /// key first; an option close whose payload lacks full contract details
    /// falls back to the single open option position on that underlying.
    fn find_position_key(
        account: &Account,
        instruction: &TradeInstruction,
        pricing: &ResolvedPricing,
    ) -> Result<String, EngineError> {
        let key = Position::make_key(
            &instruction.ticker,
            instruction.asset_type,
            pricing.contract.as_ref(),
        );
        if account.open_positions.contains_key(&key) {
            return Ok(key);
        }

        if instruction.asset_type == AssetType::Option {
            let candidates: Vec<&String> = account
                .open_positions
                .iter()
                .filter(|(_, p)| {
                    p.asset_type == AssetType::Option && p.ticker == instruction.ticker
                })
                .map(|(k, _)| k)
                .collect();
            if let [only] = candidates.as_slice() {
                return Ok((*only).clone());
            }
        }

        Err(EngineError::PositionNotFound(format!(
            "{} ({})",
            instruction.ticker, instruction.asset_type
        )))
    }

    // ==========================================================================
    // Queries & reset
    // ==========================================================================

    /// Snapshot of one account. Reading an unseen timeframe does not create
    /// an account.
    pub async fn account(&self, timeframe: &str) -> Result<Account, EngineError> {
        let accounts = self.accounts.lock().await;
        accounts
            .get(timeframe)
            .cloned()
            .ok_or_else(|| EngineError::AccountNotFound(timeframe.to_string()))
    }

    /// Snapshots of all accounts, ordered by timeframe label.
    pub async fn accounts(&self) -> Vec<Account> {
        let accounts = self.accounts.lock().await;
        let mut all: Vec<Account> = accounts.values().cloned().collect();
        all.sort_by(|a, b| a.timeframe.cmp(&b.timeframe));
        all
    }

    /// Reinitialize one account (creating it if unseen) or all of them.
    /// Destructive: restores starting balances and clears all history.
    pub async fn reset(&self, target: &str) -> Result<Vec<Account>, EngineError> {
        let mut accounts = self.accounts.lock().await;
        let mut next = accounts.clone();

        let affected: Vec<String> = if target.eq_ignore_ascii_case("all") {
            next.keys().cloned().collect()
        } else {
            vec![target.to_string()]
        };

        for label in &affected {
            next.entry(label.clone())
                .or_insert_with(|| Account::new(label, self.starting_balance))
                .reset();
            info!("Reset paper trading account {}", label);
        }

        self.store.save(&next).await?;
        *accounts = next;

        let mut result: Vec<Account> = affected
            .iter()
            .filter_map(|label| accounts.get(label).cloned())
            .collect();
        result.sort_by(|a, b| a.timeframe.cmp(&b.timeframe));
        Ok(result)
    }
}
