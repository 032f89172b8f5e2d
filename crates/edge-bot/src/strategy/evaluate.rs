//! Expected-value evaluation of the two opposing strategies.
//!
//! For each event the evaluator compares the prediction market's YES price
//! against the option-implied threshold probability and prices two
//! mutually exclusive strategies:
//!
//! - `long_yes`: buy the YES side, hedge by shorting the option leg
//! - `short_yes`: mirror (short YES is economically long NO)
//!
//! The record keeps both expected values so the rejected strategy can be
//! audited. A non-positive best EV, or a `0.0` probability sentinel from
//! the model, always yields an explicit no-trade suggestion — a record
//! stating why no action was taken beats omitting the event.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use edge_common::{Asset, StrategyId};

use crate::config::TradeThresholds;
use crate::costs::CostParameters;
use crate::quotes::{MarketQuote, QuoteError};

/// Per-event evaluation failures.
///
/// These are isolated: one failing event never aborts the batch tick.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Malformed or missing quote fields; the event is skipped this tick.
    #[error("data unavailable for {market}: {reason}")]
    DataUnavailable { market: String, reason: String },

    /// Zero margin in the EV/IM ratio; skipped and flagged, never a
    /// silent `inf`/`NaN`.
    #[error("degenerate margin for {market}")]
    DegenerateMargin { market: String },

    /// The order book cannot absorb the target size; reported, not traded.
    #[error("insufficient liquidity for {market}: {detail}")]
    InsufficientLiquidity { market: String, detail: String },
}

impl EvalError {
    /// Wrap a quote-layer error with the owning event's identity.
    pub fn from_quote(market: impl Into<String>, err: QuoteError) -> Self {
        let market = market.into();
        match err {
            QuoteError::DataUnavailable { reason, .. } => {
                EvalError::DataUnavailable { market, reason }
            }
            e @ QuoteError::InsufficientLiquidity { .. } => EvalError::InsufficientLiquidity {
                market,
                detail: e.to_string(),
            },
        }
    }
}

/// One evaluated strategy arm.
///
/// Computed fresh per event per tick and only ever persisted embedded in a
/// [`ResultRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategyEvaluation {
    pub strategy: StrategyId,
    pub expected_value: Decimal,
    pub margin: Decimal,
    pub ev_margin_ratio: Decimal,
}

/// Frozen per-event inputs for one tick.
///
/// Both quotes carry the tick's logical snapshot timestamp; the evaluator
/// never mixes quotes captured at different times.
#[derive(Debug, Clone)]
pub struct EventSnapshot {
    pub title: String,
    pub asset: Asset,
    pub instrument: String,
    pub pm_token_id: String,
    pub strike: Decimal,
    pub expiration: DateTime<Utc>,
    pub option: MarketQuote,
    pub pm: MarketQuote,
    pub captured_at: DateTime<Utc>,
}

/// The output contract: one immutable record per (event, tick).
///
/// Invariants: `ev = max(ev_yes, ev_no)` and `ev_im_ratio = ev / im`,
/// where `im` is the margin of the winning strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRecord {
    pub market_title: String,
    pub timestamp: DateTime<Utc>,
    pub investment: Decimal,
    pub spot: Decimal,
    pub poly_yes_price: Decimal,
    pub deribit_prob: Decimal,
    /// Gross expected P&L of the long-YES leg before costs.
    pub expected_pnl_yes: Decimal,
    pub total_costs: Decimal,
    pub ev: Decimal,
    pub im: Decimal,
    pub ev_im_ratio: Decimal,
    pub ev_yes: Decimal,
    pub ev_no: Decimal,
    pub suggest1: String,
    pub suggest2: String,
    /// The winning strategy arm, embedded for auditability.
    pub winner: StrategyEvaluation,
}

impl ResultRecord {
    /// CSV header row matching [`ResultRecord::to_csv_row`].
    pub fn csv_header() -> &'static str {
        "timestamp,market_title,investment,spot,poly_yes_price,deribit_prob,expected_pnl_yes,total_costs,ev,im,ev_im_ratio,ev_yes,ev_no,strategy,suggest1,suggest2\n"
    }

    /// Convert to a CSV row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.market_title,
            self.investment,
            self.spot,
            self.poly_yes_price,
            self.deribit_prob,
            self.expected_pnl_yes,
            self.total_costs,
            self.ev,
            self.im,
            self.ev_im_ratio,
            self.ev_yes,
            self.ev_no,
            self.winner.strategy,
            escape_csv(&self.suggest1),
            escape_csv(&self.suggest2),
        )
    }

    /// Whether the record recommends an actual trade (vs. an explicit
    /// no-trade note).
    pub fn is_actionable(&self) -> bool {
        !self.suggest1.starts_with("NO TRADE")
    }

    /// Downgrade an actionable record to a no-trade note, preserving the
    /// would-be action for the audit trail. Used when a budget or risk
    /// gate outside the evaluator vetoes the trade.
    pub fn veto_suggestion(&mut self, reason: &str) {
        if self.is_actionable() {
            self.suggest2 = format!("vetoed: {}", self.suggest1);
            self.suggest1 = format!("NO TRADE ({})", reason);
        }
    }
}

fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Expected values of both strategy arms for a probability spread.
///
/// `diff = poly_yes_price - deribit_prob`; the short side mirrors the
/// sign. Costs hit both arms symmetrically.
pub fn strategy_evs(investment: Decimal, diff: Decimal, total_costs: Decimal) -> (Decimal, Decimal) {
    let ev_yes = investment * diff - total_costs;
    let ev_no = investment * (-diff) - total_costs;
    (ev_yes, ev_no)
}

/// Evaluate one event against the cost model and trading thresholds.
///
/// Every configured investment size is priced; the emitted record keeps
/// the size with the best EV/IM ratio so exactly one record exists per
/// (event, tick). Construction is all-or-nothing: either a complete
/// record or a tagged error, never a partial record.
pub fn evaluate(
    snapshot: &EventSnapshot,
    costs: &CostParameters,
    thresholds: &TradeThresholds,
) -> Result<ResultRecord, EvalError> {
    let spot = snapshot.option.underlying_price;
    if spot <= Decimal::ZERO {
        return Err(EvalError::DataUnavailable {
            market: snapshot.title.clone(),
            reason: "non-positive underlying price".to_string(),
        });
    }

    let poly_yes_price = snapshot.pm.mid_price;
    let prob = snapshot.option.implied_probability;
    let is_sentinel = prob == 0.0;
    let deribit_prob = Decimal::from_f64_retain(prob)
        .unwrap_or(Decimal::ZERO)
        .round_dp(6);
    let diff = poly_yes_price - deribit_prob;
    let option_mid = snapshot.option.mid_price;
    let stable = snapshot.asset.is_stable_settled();

    // Price every configured size, keep the best EV/IM ratio.
    let mut best: Option<(Decimal, Decimal, Decimal, Decimal, Decimal, Decimal)> = None;
    for &investment in &thresholds.investments {
        let contracts = (investment / spot).max(thresholds.min_contract_size);
        let im = costs.initial_margin(contracts, option_mid, spot);
        if im <= Decimal::ZERO {
            return Err(EvalError::DegenerateMargin {
                market: snapshot.title.clone(),
            });
        }

        let total_costs = costs.total_costs(option_mid, contracts, spot, stable, investment);
        let (ev_yes, ev_no) = strategy_evs(investment, diff, total_costs);
        let ev = ev_yes.max(ev_no);
        let ratio = ev / im;

        let better = match &best {
            Some((_, _, _, _, _, best_ratio)) => ratio > *best_ratio,
            None => true,
        };
        if better {
            best = Some((investment, total_costs, ev_yes, ev_no, im, ratio));
        }
    }

    let (investment, total_costs, ev_yes, ev_no, im, ev_im_ratio) =
        best.ok_or_else(|| EvalError::DataUnavailable {
            market: snapshot.title.clone(),
            reason: "no investment sizes configured".to_string(),
        })?;

    let ev = ev_yes.max(ev_no);
    let strategy = if ev_yes >= ev_no {
        StrategyId::LongYes
    } else {
        StrategyId::ShortYes
    };

    let winner = StrategyEvaluation {
        strategy,
        expected_value: ev,
        margin: im,
        ev_margin_ratio: ev_im_ratio,
    };

    let (suggest1, suggest2) = build_suggestions(
        snapshot,
        thresholds,
        &winner,
        poly_yes_price,
        diff,
        investment,
        is_sentinel,
    );

    Ok(ResultRecord {
        market_title: snapshot.title.clone(),
        timestamp: snapshot.captured_at,
        investment,
        spot,
        poly_yes_price,
        deribit_prob,
        expected_pnl_yes: investment * diff,
        total_costs,
        ev,
        im,
        ev_im_ratio,
        ev_yes,
        ev_no,
        suggest1,
        suggest2,
        winner,
    })
}

/// Derive the recommendation strings for the winning strategy.
///
/// A buy/sell suggestion requires every gate to pass; otherwise the first
/// failing gate names the no-trade reason.
fn build_suggestions(
    snapshot: &EventSnapshot,
    thresholds: &TradeThresholds,
    winner: &StrategyEvaluation,
    poly_yes_price: Decimal,
    diff: Decimal,
    investment: Decimal,
    is_sentinel: bool,
) -> (String, String) {
    let roi_pct = winner.ev_margin_ratio * Decimal::ONE_HUNDRED;

    let no_trade_reason = if is_sentinel {
        Some("no probability signal from the option leg".to_string())
    } else if diff.abs() < thresholds.ev_spread_min {
        Some(format!(
            "spread {} below minimum {}",
            diff.abs().round_dp(4),
            thresholds.ev_spread_min
        ))
    } else if poly_yes_price < thresholds.min_pm_price || poly_yes_price > thresholds.max_pm_price {
        Some(format!(
            "market price {} outside tradable band [{}, {}]",
            poly_yes_price.round_dp(4),
            thresholds.min_pm_price,
            thresholds.max_pm_price
        ))
    } else if winner.expected_value <= Decimal::ZERO {
        Some("no positive edge after costs".to_string())
    } else if winner.expected_value < thresholds.min_net_ev {
        Some(format!(
            "EV ${} below minimum ${}",
            winner.expected_value.round_dp(2),
            thresholds.min_net_ev
        ))
    } else if roi_pct < thresholds.min_roi_pct {
        Some(format!(
            "ROI {}% below minimum {}%",
            roi_pct.round_dp(2),
            thresholds.min_roi_pct
        ))
    } else {
        None
    };

    match no_trade_reason {
        Some(reason) => (
            format!("NO TRADE ({})", reason),
            format!(
                "best strategy {} EV ${} on IM ${}",
                winner.strategy,
                winner.expected_value.round_dp(2),
                winner.margin.round_dp(2)
            ),
        ),
        None => {
            let action = match winner.strategy {
                StrategyId::LongYes => format!(
                    "BUY YES @ {} / hedge SHORT {}",
                    poly_yes_price.round_dp(4),
                    snapshot.instrument
                ),
                StrategyId::ShortYes => format!(
                    "SELL YES @ {} / hedge LONG {}",
                    poly_yes_price.round_dp(4),
                    snapshot.instrument
                ),
            };
            let sizing = format!(
                "invest ${}: EV ${} on IM ${} (EV/IM {})",
                investment.round_dp(2),
                winner.expected_value.round_dp(2),
                winner.margin.round_dp(2),
                winner.ev_margin_ratio.round_dp(4)
            );
            (action, sizing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::costs::FeeCombination;
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal_macros::dec;

    fn test_costs() -> CostParameters {
        CostParameters {
            fee_cap: dec!(0.0003),
            fee_rate: dec!(0.125),
            fee_combination: FeeCombination::Max,
            gas_open: dec!(0.50),
            gas_close: dec!(0.50),
            margin_requirement: dec!(0.15),
            tx_fee_rate: dec!(0.02),
            base_fee: dec!(0.25),
            risk_free_rate: 0.05,
        }
    }

    fn test_thresholds() -> TradeThresholds {
        TradeThresholds {
            ev_spread_min: dec!(0.02),
            notify_net_ev_min: dec!(20),
            min_net_ev: dec!(1),
            min_roi_pct: dec!(1),
            min_pm_price: dec!(0.05),
            max_pm_price: dec!(0.95),
            min_contract_size: dec!(0.001),
            investments: vec![dec!(100)],
        }
    }

    fn quote(
        instrument: &str,
        mid: Decimal,
        prob: f64,
        underlying: Decimal,
    ) -> MarketQuote {
        MarketQuote {
            instrument_id: instrument.to_string(),
            mid_price: mid,
            bid: mid - dec!(0.002),
            ask: mid + dec!(0.002),
            implied_probability: prob,
            underlying_price: underlying,
            depth_usd: dec!(10000),
            timestamp: Utc::now(),
        }
    }

    fn snapshot(poly_mid: Decimal, prob: f64) -> EventSnapshot {
        EventSnapshot {
            title: "BTC above 100k by June".to_string(),
            asset: Asset::Btc,
            instrument: "BTC-26JUN26-100000-C".to_string(),
            pm_token_id: "token-yes".to_string(),
            strike: dec!(100000),
            expiration: Utc::now() + chrono::Duration::days(30),
            option: quote("BTC-26JUN26-100000-C", dec!(0.05), prob, dec!(100000)),
            pm: quote("token-yes", poly_mid, poly_mid.to_f64().unwrap(), Decimal::ZERO),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_strategy_evs_reference_scenario() {
        // poly=0.65, prob=0.50, investment=100, costs=5:
        // ev_yes = 100 * 0.15 - 5 = 10.0
        let (ev_yes, ev_no) = strategy_evs(dec!(100), dec!(0.15), dec!(5));
        assert_eq!(ev_yes, dec!(10.0));
        assert_eq!(ev_no, dec!(-20.0));
    }

    #[test]
    fn test_ev_is_max_of_both_arms() {
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        assert_eq!(record.ev, record.ev_yes.max(record.ev_no));
        assert_eq!(record.ev, record.ev_yes); // long side wins here
        assert_eq!(record.winner.strategy, StrategyId::LongYes);
    }

    #[test]
    fn test_ev_im_ratio_invariant() {
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        assert!(record.im > Decimal::ZERO);
        let residual = (record.ev_im_ratio * record.im - record.ev).abs();
        assert!(residual < dec!(0.0001), "ratio*im must equal ev, off by {}", residual);
    }

    #[test]
    fn test_short_side_wins_on_negative_spread() {
        // Market overprices YES relative to the model: short it.
        let record = evaluate(&snapshot(dec!(0.40), 0.60), &test_costs(), &test_thresholds())
            .unwrap();
        assert_eq!(record.winner.strategy, StrategyId::ShortYes);
        assert_eq!(record.ev, record.ev_no);
        assert!(record.is_actionable());
        assert!(record.suggest1.starts_with("SELL YES"));
    }

    #[test]
    fn test_rejected_arm_is_retained() {
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        // Both arms present so the rejected strategy can be audited.
        assert!(record.ev_no < record.ev_yes);
        assert_eq!(record.ev_yes + record.ev_no, dec!(-2) * record.total_costs);
    }

    #[test]
    fn test_sentinel_probability_never_trades() {
        let record = evaluate(&snapshot(dec!(0.65), 0.0), &test_costs(), &test_thresholds())
            .unwrap();
        assert!(!record.is_actionable());
        assert!(record.suggest1.contains("no probability signal"));
    }

    #[test]
    fn test_non_positive_ev_is_no_trade() {
        // Tiny spread: costs eat the edge.
        let record = evaluate(&snapshot(dec!(0.505), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        assert!(!record.is_actionable());
        assert!(record.suggest1.starts_with("NO TRADE"));
    }

    #[test]
    fn test_pm_price_band_gate() {
        let mut thresholds = test_thresholds();
        thresholds.max_pm_price = dec!(0.60);
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &thresholds).unwrap();
        assert!(!record.is_actionable());
        assert!(record.suggest1.contains("outside tradable band"));
    }

    #[test]
    fn test_degenerate_margin_is_explicit() {
        let mut costs = test_costs();
        costs.margin_requirement = Decimal::ZERO;
        let mut snap = snapshot(dec!(0.65), 0.50);
        snap.option.mid_price = Decimal::ZERO;

        let err = evaluate(&snap, &costs, &test_thresholds()).unwrap_err();
        assert!(matches!(err, EvalError::DegenerateMargin { .. }));
    }

    #[test]
    fn test_best_investment_size_selected() {
        let mut thresholds = test_thresholds();
        thresholds.investments = vec![dec!(50), dec!(100), dec!(500)];
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &thresholds).unwrap();

        // Larger sizes amortize the fixed costs; the best EV/IM ratio wins.
        assert_eq!(record.investment, dec!(500));
    }

    #[test]
    fn test_veto_preserves_audit_trail() {
        let mut record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        assert!(record.is_actionable());
        let action = record.suggest1.clone();

        record.veto_suggestion("daily trade budget exhausted");
        assert!(!record.is_actionable());
        assert!(record.suggest1.contains("daily trade budget exhausted"));
        assert!(record.suggest2.contains(&action));
    }

    #[test]
    fn test_csv_row_shape() {
        let record = evaluate(&snapshot(dec!(0.65), 0.50), &test_costs(), &test_thresholds())
            .unwrap();
        let header_cols = ResultRecord::csv_header().trim().split(',').count();
        let row = record.to_csv_row();
        // Suggestion strings are escaped, so split on the header's arity.
        assert!(row.ends_with('\n'));
        assert!(header_cols >= 16);
        assert!(row.contains("BTC above 100k by June"));
    }

    #[test]
    fn test_eval_error_from_quote() {
        let err = EvalError::from_quote(
            "event-1",
            QuoteError::unavailable("inst", "missing bid_price"),
        );
        assert!(matches!(err, EvalError::DataUnavailable { .. }));
        assert!(err.to_string().contains("event-1"));
    }
}
