//! Polymarket CLOB order-book client.
//!
//! Fetches order-book snapshots and midpoints for outcome tokens. The
//! CLOB reports level sizes as share counts in decimal strings; levels
//! are normalized here to USD-notional depth, which is what the slippage
//! walk consumes.

use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::quotes::{BookLevel, BookSnapshot};

/// Default CLOB API base URL.
const DEFAULT_BASE_URL: &str = "https://clob.polymarket.com";

/// Request timeout for book calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the Polymarket shim.
#[derive(Debug, Error)]
pub enum PolymarketError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error status.
    #[error("API error: status {status}, body: {body}")]
    ApiError { status: u16, body: String },

    /// Response decoding failed.
    #[error("decode failed: {0}")]
    Decode(String),
}

/// Raw price level as the CLOB reports it: decimal strings, share sizes.
#[derive(Debug, Deserialize)]
struct RawLevel {
    price: String,
    size: String,
}

impl RawLevel {
    /// Parse into a [`BookLevel`] with USD-notional depth.
    fn to_level(&self) -> Result<BookLevel, PolymarketError> {
        let price = Decimal::from_str(&self.price)
            .map_err(|e| PolymarketError::Decode(format!("price {:?}: {}", self.price, e)))?;
        let shares = Decimal::from_str(&self.size)
            .map_err(|e| PolymarketError::Decode(format!("size {:?}: {}", self.size, e)))?;
        Ok(BookLevel::new(price, price * shares))
    }
}

/// Raw book payload from the CLOB.
#[derive(Debug, Deserialize)]
struct RawBook {
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
}

/// Midpoint payload.
#[derive(Debug, Deserialize)]
struct RawMidpoint {
    mid: String,
}

/// Client for the public CLOB book endpoints.
pub struct PolymarketClient {
    http: Client,
    base_url: String,
}

impl PolymarketClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Optional custom base URL. Defaults to production.
    pub fn new(base_url: Option<String>) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Create a client with the default production URL.
    pub fn production() -> Self {
        Self::new(None)
    }

    /// Create a client for testing with a custom base URL.
    pub fn with_url(base_url: &str) -> Self {
        Self::new(Some(base_url.to_string()))
    }

    /// Fetch the order book for an outcome token.
    pub async fn book(&self, token_id: &str) -> Result<BookSnapshot, PolymarketError> {
        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        debug!(url = %url, "Fetching order book");

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PolymarketError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawBook = response
            .json()
            .await
            .map_err(|e| PolymarketError::Decode(format!("book response: {}", e)))?;

        let bids = raw
            .bids
            .iter()
            .map(RawLevel::to_level)
            .collect::<Result<Vec<_>, _>>()?;
        let asks = raw
            .asks
            .iter()
            .map(RawLevel::to_level)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(BookSnapshot::new(token_id, bids, asks))
    }

    /// Fetch the pre-computed midpoint for an outcome token.
    pub async fn midpoint(&self, token_id: &str) -> Result<Decimal, PolymarketError> {
        let url = format!("{}/midpoint?token_id={}", self.base_url, token_id);
        debug!(url = %url, "Fetching midpoint");

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PolymarketError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let raw: RawMidpoint = response
            .json()
            .await
            .map_err(|e| PolymarketError::Decode(format!("midpoint response: {}", e)))?;

        Decimal::from_str(&raw.mid)
            .map_err(|e| PolymarketError::Decode(format!("mid {:?}: {}", raw.mid, e)))
    }
}

impl Default for PolymarketClient {
    fn default() -> Self {
        Self::production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_client_urls() {
        assert_eq!(PolymarketClient::new(None).base_url, DEFAULT_BASE_URL);
        assert_eq!(
            PolymarketClient::with_url("http://localhost:9001").base_url,
            "http://localhost:9001"
        );
    }

    #[test]
    fn test_raw_level_conversion_to_usd_depth() {
        let raw = RawLevel {
            price: "0.40".to_string(),
            size: "2500".to_string(),
        };
        // 2500 shares at 0.40 = $1000 of depth.
        let level = raw.to_level().unwrap();
        assert_eq!(level.price, dec!(0.40));
        assert_eq!(level.size, dec!(1000.0000));
    }

    #[test]
    fn test_raw_level_rejects_garbage() {
        let raw = RawLevel {
            price: "abc".to_string(),
            size: "100".to_string(),
        };
        assert!(matches!(raw.to_level(), Err(PolymarketError::Decode(_))));
    }

    #[test]
    fn test_raw_book_decoding() {
        let json = r#"{
            "market": "0xabc",
            "asset_id": "1234",
            "bids": [{"price": "0.63", "size": "100"}],
            "asks": [{"price": "0.67", "size": "200"}, {"price": "0.70", "size": "50"}]
        }"#;
        let raw: RawBook = serde_json::from_str(json).unwrap();
        assert_eq!(raw.bids.len(), 1);
        assert_eq!(raw.asks.len(), 2);
    }

    #[test]
    fn test_raw_book_tolerates_empty_sides() {
        let raw: RawBook = serde_json::from_str(r#"{"bids": []}"#).unwrap();
        assert!(raw.bids.is_empty());
        assert!(raw.asks.is_empty());
    }

    #[test]
    fn test_midpoint_decoding() {
        let raw: RawMidpoint = serde_json::from_str(r#"{"mid": "0.655"}"#).unwrap();
        assert_eq!(Decimal::from_str(&raw.mid).unwrap(), dec!(0.655));
    }
}
