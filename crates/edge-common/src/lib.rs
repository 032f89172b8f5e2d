//! Shared types for the Deribit/Polymarket probability-arbitrage bot.
//!
//! CRITICAL: All prices and quantities use `rust_decimal::Decimal`.
//! NEVER use f64 for financial math. The only f64 surface is the
//! closed-form probability model in `edge-bot`, which converts at its
//! boundary.

pub mod types;

pub use types::{Asset, Outcome, Side, StrategyId};
