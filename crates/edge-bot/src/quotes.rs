//! Quote normalization for the two market legs.
//!
//! Converts raw option-chain tickers and prediction-market order books into
//! a common [`MarketQuote`] shape the evaluator consumes. Quotes are
//! timestamped and frozen at a single logical snapshot time per tick;
//! mixing quotes from different ticks for the same event is a defect.
//!
//! CRITICAL: All prices use `rust_decimal::Decimal`. The only f64 field is
//! `implied_probability`, produced by the probability model.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::probability::threshold_probability;

/// Errors surfaced while acquiring or normalizing quotes.
///
/// Per-event errors: the offending event is skipped for the tick and
/// logged with its identity; the rest of the batch proceeds.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// A required quote field is missing or stale.
    #[error("quote unavailable for {instrument}: {reason}")]
    DataUnavailable { instrument: String, reason: String },

    /// The slippage walk exhausted the book before filling the target.
    /// Reportable, never tradable.
    #[error("insufficient liquidity: filled ${filled_usd} of ${target_usd}")]
    InsufficientLiquidity {
        filled_usd: Decimal,
        target_usd: Decimal,
    },
}

impl QuoteError {
    pub fn unavailable(instrument: impl Into<String>, reason: impl Into<String>) -> Self {
        QuoteError::DataUnavailable {
            instrument: instrument.into(),
            reason: reason.into(),
        }
    }
}

/// Raw Deribit-style option ticker payload.
///
/// All per-quote fields are optional on the wire; the normalizer decides
/// which absences are fatal for an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionTicker {
    pub instrument_name: String,
    /// Mark implied volatility, in percent (e.g. 60.0 = 60%).
    pub mark_iv: Option<f64>,
    pub bid_price: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub last_price: Option<Decimal>,
    pub underlying_price: Option<Decimal>,
}

/// A single price level of a prediction-market order book.
///
/// `size` is the quoted depth in USD notional at this price, not a share
/// count. The slippage walk depends on this unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }

    /// Shares obtainable by sweeping this whole level.
    pub fn shares(&self) -> Decimal {
        if self.price > Decimal::ZERO {
            self.size / self.price
        } else {
            Decimal::ZERO
        }
    }
}

/// Prediction-market order book snapshot for one outcome token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub token_id: String,
    /// Bid levels sorted by price descending (best bid first).
    pub bids: Vec<BookLevel>,
    /// Ask levels sorted by price ascending (best ask first).
    pub asks: Vec<BookLevel>,
}

impl BookSnapshot {
    pub fn new(token_id: impl Into<String>, bids: Vec<BookLevel>, asks: Vec<BookLevel>) -> Self {
        let mut snapshot = Self {
            token_id: token_id.into(),
            bids,
            asks,
        };
        snapshot.sort_levels();
        snapshot
    }

    /// Best bid price (None if no bids).
    #[inline]
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Best ask price (None if no asks).
    #[inline]
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Mid price of best bid/ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid + ask) / Decimal::TWO)
    }

    /// Total ask-side depth in USD.
    pub fn ask_depth_usd(&self) -> Decimal {
        self.asks.iter().map(|l| l.size).sum()
    }

    /// Total bid-side depth in USD.
    pub fn bid_depth_usd(&self) -> Decimal {
        self.bids.iter().map(|l| l.size).sum()
    }

    fn sort_levels(&mut self) {
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
    }
}

/// Normalized per-instrument quote, one per tick.
///
/// Immutable once created; the `timestamp` is the tick's logical snapshot
/// time, stamped by the caller so every event in a tick shares it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketQuote {
    pub instrument_id: String,
    pub mid_price: Decimal,
    pub bid: Decimal,
    pub ask: Decimal,
    /// Probability of the threshold being crossed, as this market implies
    /// it. For the prediction-market leg this is the mid price; for the
    /// option leg it comes from the probability model. `0.0` is the
    /// "no signal" sentinel and must be propagated, not reinterpreted.
    pub implied_probability: f64,
    pub underlying_price: Decimal,
    /// Ask-side depth in USD where known, zero for ticker-only sources.
    pub depth_usd: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Result of walking the ask book for a target notional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageEstimate {
    pub avg_price: Decimal,
    pub shares_bought: Decimal,
    /// Percent deterioration of the average fill vs. the best ask.
    pub slippage_pct: Decimal,
}

/// Normalize a raw option ticker into a [`MarketQuote`].
///
/// Requires `underlying_price`, `mark_iv`, and both sides of the BBO.
/// The implied probability is derived from the mark IV via the closed-form
/// model; degenerate model inputs flow through as the `0.0` sentinel.
///
/// For range events an `upper_strike` narrows the probability to
/// `P(cross strike) - P(cross upper_strike)`.
pub fn normalize_option_quote(
    ticker: &OptionTicker,
    strike: Decimal,
    upper_strike: Option<Decimal>,
    time_to_expiry_years: f64,
    rate: f64,
    now: DateTime<Utc>,
) -> Result<MarketQuote, QuoteError> {
    let instrument = ticker.instrument_name.clone();

    let underlying = ticker
        .underlying_price
        .ok_or_else(|| QuoteError::unavailable(&instrument, "missing underlying_price"))?;
    if underlying <= Decimal::ZERO {
        return Err(QuoteError::unavailable(
            &instrument,
            "non-positive underlying_price",
        ));
    }

    let mark_iv = ticker
        .mark_iv
        .ok_or_else(|| QuoteError::unavailable(&instrument, "missing mark_iv"))?;

    let bid = ticker
        .bid_price
        .ok_or_else(|| QuoteError::unavailable(&instrument, "missing bid_price"))?;
    let ask = ticker
        .ask_price
        .ok_or_else(|| QuoteError::unavailable(&instrument, "missing ask_price"))?;

    let spot = underlying.to_f64().unwrap_or(0.0);
    let vol = mark_iv / 100.0;
    let lower = threshold_probability(
        spot,
        strike.to_f64().unwrap_or(0.0),
        time_to_expiry_years,
        vol,
        rate,
    );
    let implied_probability = match upper_strike {
        // Sentinel lower bound stays a sentinel; otherwise subtract the
        // probability of overshooting the range.
        Some(upper) if lower > 0.0 => {
            let above_upper = threshold_probability(
                spot,
                upper.to_f64().unwrap_or(0.0),
                time_to_expiry_years,
                vol,
                rate,
            );
            (lower - above_upper).max(0.0)
        }
        _ => lower,
    };

    Ok(MarketQuote {
        instrument_id: instrument,
        mid_price: (bid + ask) / Decimal::TWO,
        bid,
        ask,
        implied_probability,
        underlying_price: underlying,
        depth_usd: Decimal::ZERO,
        timestamp: now,
    })
}

/// Normalize a prediction-market order book into a [`MarketQuote`].
///
/// The mid of the best bid/ask doubles as the market's implied probability.
pub fn normalize_pm_book(book: &BookSnapshot, now: DateTime<Utc>) -> Result<MarketQuote, QuoteError> {
    let bid = book
        .best_bid()
        .ok_or_else(|| QuoteError::unavailable(&book.token_id, "empty bid side"))?;
    let ask = book
        .best_ask()
        .ok_or_else(|| QuoteError::unavailable(&book.token_id, "empty ask side"))?;

    let mid = (bid + ask) / Decimal::TWO;

    Ok(MarketQuote {
        instrument_id: book.token_id.clone(),
        mid_price: mid,
        bid,
        ask,
        implied_probability: mid.to_f64().unwrap_or(0.0),
        underlying_price: Decimal::ZERO,
        depth_usd: book.ask_depth_usd(),
        timestamp: now,
    })
}

/// Walk ask levels, cheapest first, until `target_notional_usd` is filled.
///
/// Pure over the snapshot: repeated calls with the same book and target
/// return identical estimates. Exhausting the book before the target is
/// filled is an [`QuoteError::InsufficientLiquidity`] report, not a crash.
pub fn walk_book(
    asks: &[BookLevel],
    target_notional_usd: Decimal,
) -> Result<SlippageEstimate, QuoteError> {
    if target_notional_usd <= Decimal::ZERO {
        return Err(QuoteError::unavailable(
            "book-walk",
            "non-positive target notional",
        ));
    }

    let mut levels: Vec<BookLevel> = asks.to_vec();
    levels.sort_by(|a, b| a.price.cmp(&b.price));

    let best_ask = match levels.first() {
        Some(l) if l.price > Decimal::ZERO => l.price,
        _ => {
            return Err(QuoteError::InsufficientLiquidity {
                filled_usd: Decimal::ZERO,
                target_usd: target_notional_usd,
            })
        }
    };

    let mut remaining = target_notional_usd;
    let mut shares = Decimal::ZERO;
    let mut spent = Decimal::ZERO;

    for level in &levels {
        if remaining <= Decimal::ZERO {
            break;
        }
        if level.price <= Decimal::ZERO || level.size <= Decimal::ZERO {
            continue;
        }
        let take = remaining.min(level.size);
        shares += take / level.price;
        spent += take;
        remaining -= take;
    }

    if remaining > Decimal::ZERO {
        return Err(QuoteError::InsufficientLiquidity {
            filled_usd: spent,
            target_usd: target_notional_usd,
        });
    }

    let avg_price = spent / shares;
    let slippage_pct = (avg_price - best_ask) / best_ask * Decimal::ONE_HUNDRED;

    Ok(SlippageEstimate {
        avg_price,
        shares_bought: shares,
        slippage_pct,
    })
}
