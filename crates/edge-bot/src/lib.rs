//! Deribit/Polymarket probability-arbitrage engine.
//!
//! This crate estimates arbitrage between an option exchange's implied
//! probability of a price threshold being crossed and a prediction
//! market's quoted probability of the same event, recommends trades
//! exploiting the spread, and reconciles a shadow (theoretical) ledger
//! against the real (executed) one.
//!
//! ## Pipeline
//!
//! Per polling tick: quote normalization → probability + cost models →
//! strategy evaluation → append-only signal record. An independent,
//! slower reconciliation task emits P&L snapshots diffing theoretical
//! against executed outcomes.
//!
//! ## Modules
//!
//! - `config`: validated startup configuration (TOML + env + CLI)
//! - `quotes`: quote normalization and the order-book slippage walk
//! - `probability`: closed-form threshold-crossing probability
//! - `costs`: fee, gas, and margin model
//! - `strategy`: EV evaluation and the record sink
//! - `session`: position ledger and shadow-vs-real reconciliation
//! - `api`: thin HTTP shims for the two quote sources
//! - `engine`: tick scheduling and batch evaluation

pub mod api;
pub mod config;
pub mod costs;
pub mod engine;
pub mod probability;
pub mod quotes;
pub mod session;
pub mod strategy;

pub use config::{BotConfig, ConfigError, EventConfig, TradeThresholds};
pub use costs::{CostParameters, FeeCombination};
pub use engine::{Engine, TickReport};
pub use quotes::{BookLevel, BookSnapshot, MarketQuote, OptionTicker, QuoteError, SlippageEstimate};
pub use session::{PnlSnapshot, Position, PositionLedger, PositionStatus, Reconciler};
pub use strategy::{EvalError, EventSnapshot, RecordSink, ResultRecord};
