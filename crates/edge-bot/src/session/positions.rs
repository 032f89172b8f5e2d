//! Position ledger: the single source of truth for open exposure.
//!
//! Positions are mutated only through the ledger API used by the
//! execution layer; the evaluator never touches them and the reconciler
//! only reads. P&L is derived, never stored redundantly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use edge_common::{Outcome, StrategyId};

/// Lifecycle of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

impl std::fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionStatus::Open => write!(f, "open"),
            PositionStatus::Closed => write!(f, "closed"),
        }
    }
}

/// One exposure in one market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub market_id: String,
    /// Outcome token held (or shorted).
    pub side: Outcome,
    pub strategy: StrategyId,
    /// Share count.
    pub size: Decimal,
    pub entry_price: Decimal,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_price: Option<Decimal>,
}

impl Position {
    /// Capital committed at entry.
    #[inline]
    pub fn cost_basis(&self) -> Decimal {
        self.size * self.entry_price
    }

    /// Direction multiplier: +1 for long YES, -1 for short YES.
    #[inline]
    fn direction(&self) -> Decimal {
        match self.strategy {
            StrategyId::LongYes => Decimal::ONE,
            StrategyId::ShortYes => Decimal::NEGATIVE_ONE,
        }
    }

    /// Mark-to-market P&L against a current mid price.
    ///
    /// Zero for closed positions; their P&L is realized.
    pub fn unrealized_pnl(&self, mark: Decimal) -> Decimal {
        match self.status {
            PositionStatus::Open => self.size * (mark - self.entry_price) * self.direction(),
            PositionStatus::Closed => Decimal::ZERO,
        }
    }

    /// Realized P&L for a closed position, zero while open.
    pub fn realized_pnl(&self) -> Decimal {
        match (self.status, self.exit_price) {
            (PositionStatus::Closed, Some(exit)) => {
                self.size * (exit - self.entry_price) * self.direction()
            }
            _ => Decimal::ZERO,
        }
    }
}

/// Append-style ledger of positions for one view (shadow or real).
#[derive(Debug, Clone, Default)]
pub struct PositionLedger {
    positions: Vec<Position>,
}

impl PositionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fill, opening a new position.
    pub fn apply_fill(
        &mut self,
        market_id: impl Into<String>,
        side: Outcome,
        strategy: StrategyId,
        size: Decimal,
        entry_price: Decimal,
        at: DateTime<Utc>,
    ) -> &Position {
        self.positions.push(Position {
            market_id: market_id.into(),
            side,
            strategy,
            size,
            entry_price,
            status: PositionStatus::Open,
            opened_at: at,
            closed_at: None,
            exit_price: None,
        });
        self.positions.last().expect("just pushed")
    }

    /// Close every open position in a market at the given exit price.
    ///
    /// Returns the realized P&L of the positions closed by this call.
    pub fn close_market(
        &mut self,
        market_id: &str,
        exit_price: Decimal,
        at: DateTime<Utc>,
    ) -> Decimal {
        let mut realized = Decimal::ZERO;
        for position in &mut self.positions {
            if position.market_id == market_id && position.status == PositionStatus::Open {
                position.status = PositionStatus::Closed;
                position.exit_price = Some(exit_price);
                position.closed_at = Some(at);
                realized += position.realized_pnl();
            }
        }
        realized
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn open_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .count()
    }

    pub fn closed_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Closed)
            .count()
    }

    /// Cost basis of open positions.
    pub fn open_cost_basis(&self) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .map(|p| p.cost_basis())
            .sum()
    }

    /// Sum of unrealized P&L over open positions, marked against current
    /// mid prices keyed by market id. Markets without a mark contribute
    /// zero (no quote, no mark-to-market).
    pub fn unrealized_pnl(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.status == PositionStatus::Open)
            .map(|p| {
                marks
                    .get(&p.market_id)
                    .map(|mark| p.unrealized_pnl(*mark))
                    .unwrap_or(Decimal::ZERO)
            })
            .sum()
    }

    /// Sum of realized P&L over closed positions.
    pub fn realized_pnl(&self) -> Decimal {
        self.positions.iter().map(|p| p.realized_pnl()).sum()
    }

    /// Total view P&L: realized plus marked unrealized.
    pub fn total_pnl(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.realized_pnl() + self.unrealized_pnl(marks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn marks(entries: &[(&str, Decimal)]) -> HashMap<String, Decimal> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }

    #[test]
    fn test_apply_fill_opens_position() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(
            "event-1",
            Outcome::Yes,
            StrategyId::LongYes,
            dec!(100),
            dec!(0.65),
            Utc::now(),
        );

        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.closed_count(), 0);
        assert_eq!(ledger.open_cost_basis(), dec!(65));
    }

    #[test]
    fn test_unrealized_pnl_long() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(
            "event-1",
            Outcome::Yes,
            StrategyId::LongYes,
            dec!(100),
            dec!(0.65),
            Utc::now(),
        );

        // Price moved to 0.70: +100 * 0.05 = $5
        let pnl = ledger.unrealized_pnl(&marks(&[("event-1", dec!(0.70))]));
        assert_eq!(pnl, dec!(5));
    }

    #[test]
    fn test_unrealized_pnl_short_inverts() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(
            "event-1",
            Outcome::Yes,
            StrategyId::ShortYes,
            dec!(100),
            dec!(0.65),
            Utc::now(),
        );

        // Short YES profits when the price falls.
        let pnl = ledger.unrealized_pnl(&marks(&[("event-1", dec!(0.60))]));
        assert_eq!(pnl, dec!(5));

        let pnl = ledger.unrealized_pnl(&marks(&[("event-1", dec!(0.70))]));
        assert_eq!(pnl, dec!(-5));
    }

    #[test]
    fn test_missing_mark_contributes_zero() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(
            "event-1",
            Outcome::Yes,
            StrategyId::LongYes,
            dec!(100),
            dec!(0.65),
            Utc::now(),
        );
        assert_eq!(ledger.unrealized_pnl(&HashMap::new()), Decimal::ZERO);
    }

    #[test]
    fn test_close_market_realizes_pnl() {
        let mut ledger = PositionLedger::new();
        ledger.apply_fill(
            "event-1",
            Outcome::Yes,
            StrategyId::LongYes,
            dec!(100),
            dec!(0.65),
            Utc::now(),
        );

        let realized = ledger.close_market("event-1", dec!(1.00), Utc::now());
        assert_eq!(realized, dec!(35));
        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.closed_count(), 1);
        assert_eq!(ledger.realized_pnl(), dec!(35));

        // Closed positions no longer mark to market.
        let pnl = ledger.unrealized_pnl(&marks(&[("event-1", dec!(0.10))]));
        assert_eq!(pnl, Decimal::ZERO);
    }

    #[test]
    fn test_close_only_touches_named_market() {
        let mut ledger = PositionLedger::new();
        let now = Utc::now();
        ledger.apply_fill("event-1", Outcome::Yes, StrategyId::LongYes, dec!(10), dec!(0.50), now);
        ledger.apply_fill("event-2", Outcome::Yes, StrategyId::LongYes, dec!(10), dec!(0.50), now);

        ledger.close_market("event-1", dec!(1.00), now);
        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.closed_count(), 1);
    }

    #[test]
    fn test_total_pnl_combines_views() {
        let mut ledger = PositionLedger::new();
        let now = Utc::now();
        ledger.apply_fill("event-1", Outcome::Yes, StrategyId::LongYes, dec!(100), dec!(0.60), now);
        ledger.apply_fill("event-2", Outcome::Yes, StrategyId::LongYes, dec!(100), dec!(0.40), now);
        ledger.close_market("event-1", dec!(1.00), now);

        // Realized: 100 * 0.40 = 40. Unrealized: 100 * 0.05 = 5.
        let m = marks(&[("event-2", dec!(0.45))]);
        assert_eq!(ledger.total_pnl(&m), dec!(45));
    }
}
