//! Thin HTTP shims for the two quote sources.
//!
//! These are I/O adapters only: they fetch and decode, the normalizer in
//! `quotes` decides what a usable quote is. The engine itself never
//! performs network I/O outside these clients.

pub mod deribit;
pub mod polymarket;

use async_trait::async_trait;

use crate::quotes::{BookSnapshot, OptionTicker, QuoteError};

pub use deribit::{DeribitClient, DeribitError};
pub use polymarket::{PolymarketClient, PolymarketError};

/// Data-acquisition boundary for one tick.
///
/// The engine's only suspension points are behind this trait; its own
/// computation never awaits. Tests substitute an in-memory source.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn option_ticker(&self, instrument: &str) -> Result<OptionTicker, QuoteError>;
    async fn pm_book(&self, token_id: &str) -> Result<BookSnapshot, QuoteError>;
}

/// Production source combining both exchange clients.
pub struct LiveQuoteSource {
    pub deribit: DeribitClient,
    pub polymarket: PolymarketClient,
}

impl LiveQuoteSource {
    pub fn new(deribit: DeribitClient, polymarket: PolymarketClient) -> Self {
        Self { deribit, polymarket }
    }
}

#[async_trait]
impl QuoteSource for LiveQuoteSource {
    async fn option_ticker(&self, instrument: &str) -> Result<OptionTicker, QuoteError> {
        self.deribit
            .ticker(instrument)
            .await
            .map_err(|e| QuoteError::unavailable(instrument, e.to_string()))
    }

    async fn pm_book(&self, token_id: &str) -> Result<BookSnapshot, QuoteError> {
        self.polymarket
            .book(token_id)
            .await
            .map_err(|e| QuoteError::unavailable(token_id, e.to_string()))
    }
}
