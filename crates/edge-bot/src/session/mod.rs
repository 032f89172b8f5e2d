//! Position tracking and shadow-vs-real P&L reconciliation.

pub mod positions;
pub mod reconcile;

pub use positions::{Position, PositionLedger, PositionStatus};
pub use reconcile::{PnlSnapshot, ReconcileConfig, Reconciler};
