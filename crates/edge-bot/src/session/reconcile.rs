//! Shadow-vs-real P&L reconciliation.
//!
//! The reconciler keeps two independent ledgers:
//!
//! - **shadow**: fills implied by the engine's own recommendations at the
//!   quoted prices, ignoring actual execution
//! - **real**: fills reported back from the execution layer
//!
//! On its own cadence (independent of the per-event evaluation loop) it
//! aggregates both views and emits one immutable [`PnlSnapshot`].
//! Snapshots are never revised retroactively; a correction is a new
//! snapshot with a later timestamp. Drift between the views beyond the
//! configured tolerance is a reportable condition, not a fatal one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use edge_common::Outcome;

use super::positions::PositionLedger;
use crate::strategy::evaluate::ResultRecord;

/// Reconciliation cadence and drift tolerance.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Seconds between reconciliation ticks.
    pub interval_secs: u64,
    /// Absolute shadow-vs-real divergence that triggers a drift report.
    pub drift_tolerance_usd: Decimal,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            drift_tolerance_usd: Decimal::new(50, 0),
        }
    }
}

/// Periodic rollup of both ledgers. Immutable once written; the series is
/// append-only.
///
/// Invariant: `diff_usd = real_pnl_usd - shadow_pnl_usd`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Position count in the real (executed) book.
    pub total_positions: usize,
    /// Open cost basis of the real book, USD.
    pub total_cost_basis_usd: Decimal,
    /// Marked unrealized P&L of the real book, USD.
    pub total_unrealized_pnl_usd: Decimal,
    /// Total P&L of the theoretical (recommendation) book.
    pub shadow_pnl_usd: Decimal,
    /// Total P&L of the executed book.
    pub real_pnl_usd: Decimal,
    /// `real_pnl_usd - shadow_pnl_usd`.
    pub diff_usd: Decimal,
    pub open_positions: usize,
    pub closed_positions: usize,
}

impl PnlSnapshot {
    /// CSV header row matching [`PnlSnapshot::to_csv_row`].
    pub fn csv_header() -> &'static str {
        "timestamp,total_positions,total_cost_basis_usd,total_unrealized_pnl_usd,shadow_pnl_usd,real_pnl_usd,diff_usd,open_positions,closed_positions\n"
    }

    /// Convert to a CSV row.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{},{}\n",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
            self.total_positions,
            self.total_cost_basis_usd,
            self.total_unrealized_pnl_usd,
            self.shadow_pnl_usd,
            self.real_pnl_usd,
            self.diff_usd,
            self.open_positions,
            self.closed_positions,
        )
    }
}

/// Append-only CSV sink for the snapshot series.
///
/// Header is written once on file creation; snapshots are appended and
/// never rewritten.
pub struct SnapshotWriter {
    file: std::sync::Mutex<std::fs::File>,
}

impl SnapshotWriter {
    /// Open (or create) the snapshot log at `path`.
    pub fn open(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        use std::io::Write;

        let path = path.as_ref();
        let file_exists = path.exists();

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        if !file_exists {
            file.write_all(PnlSnapshot::csv_header().as_bytes())?;
        }

        Ok(Self {
            file: std::sync::Mutex::new(file),
        })
    }

    /// Append one snapshot row.
    pub fn append(&self, snapshot: &PnlSnapshot) -> std::io::Result<()> {
        use std::io::Write;

        let row = snapshot.to_csv_row();
        let mut file = self.file.lock().expect("snapshot writer mutex poisoned");
        file.write_all(row.as_bytes())
    }
}

/// Maintains the shadow and real ledgers and emits snapshots.
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcileConfig,
    shadow: PositionLedger,
    real: PositionLedger,
    snapshots: Vec<PnlSnapshot>,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self {
            config,
            shadow: PositionLedger::new(),
            real: PositionLedger::new(),
            snapshots: Vec::new(),
        }
    }

    pub fn interval_secs(&self) -> u64 {
        self.config.interval_secs
    }

    /// Feed an evaluation record into the shadow ledger.
    ///
    /// Actionable recommendations become theoretical fills at the quoted
    /// price; no-trade records leave the shadow book untouched.
    pub fn record_recommendation(&mut self, record: &ResultRecord) {
        if !record.is_actionable() {
            return;
        }
        if record.poly_yes_price <= Decimal::ZERO {
            debug!(market = %record.market_title, "skipping shadow fill at non-positive price");
            return;
        }

        let shares = record.investment / record.poly_yes_price;
        self.shadow.apply_fill(
            record.market_title.clone(),
            Outcome::Yes,
            record.winner.strategy,
            shares,
            record.poly_yes_price,
            record.timestamp,
        );
        debug!(
            market = %record.market_title,
            strategy = %record.winner.strategy,
            %shares,
            "shadow fill recorded"
        );
    }

    /// Report an executed fill from the execution collaborator.
    pub fn record_real_fill(
        &mut self,
        market_id: impl Into<String>,
        strategy: edge_common::StrategyId,
        size: Decimal,
        price: Decimal,
        at: DateTime<Utc>,
    ) {
        self.real
            .apply_fill(market_id, Outcome::Yes, strategy, size, price, at);
    }

    /// Settle a market in both books at its resolution price.
    pub fn settle_market(&mut self, market_id: &str, settlement_price: Decimal, at: DateTime<Utc>) {
        self.shadow.close_market(market_id, settlement_price, at);
        self.real.close_market(market_id, settlement_price, at);
    }

    pub fn shadow(&self) -> &PositionLedger {
        &self.shadow
    }

    pub fn real(&self) -> &PositionLedger {
        &self.real
    }

    /// Produce one snapshot against current mid prices and append it to
    /// the series.
    pub fn snapshot(&mut self, marks: &HashMap<String, Decimal>, at: DateTime<Utc>) -> PnlSnapshot {
        let shadow_pnl = self.shadow.total_pnl(marks);
        let real_pnl = self.real.total_pnl(marks);
        let diff = real_pnl - shadow_pnl;

        let snapshot = PnlSnapshot {
            timestamp: at,
            total_positions: self.real.positions().len(),
            total_cost_basis_usd: self.real.open_cost_basis(),
            total_unrealized_pnl_usd: self.real.unrealized_pnl(marks),
            shadow_pnl_usd: shadow_pnl,
            real_pnl_usd: real_pnl,
            diff_usd: diff,
            open_positions: self.real.open_count(),
            closed_positions: self.real.closed_count(),
        };

        if diff.abs() > self.config.drift_tolerance_usd {
            warn!(
                drift_usd = %diff,
                tolerance_usd = %self.config.drift_tolerance_usd,
                "shadow/real P&L drift exceeds tolerance"
            );
        }

        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// The append-only snapshot series.
    pub fn snapshots(&self) -> &[PnlSnapshot] {
        &self.snapshots
    }

    pub fn latest_snapshot(&self) -> Option<&PnlSnapshot> {
        self.snapshots.last()
    }
}
