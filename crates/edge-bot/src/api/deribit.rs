//! Deribit public ticker client.
//!
//! Fetches option tickers from the public (unauthenticated) REST API.
//! No order placement, no account endpoints: quote acquisition only.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::quotes::OptionTicker;

/// Default Deribit REST base URL.
const DEFAULT_BASE_URL: &str = "https://www.deribit.com";

/// Request timeout for ticker calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the Deribit shim.
#[derive(Debug, Error)]
pub enum DeribitError {
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

/// JSON-RPC envelope around the ticker payload.
#[derive(Debug, Deserialize)]
struct TickerEnvelope {
    result: OptionTicker,
}

/// Client for the public ticker endpoint.
pub struct DeribitClient {
    http: Client,
    base_url: String,
}

impl DeribitClient {
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

    /// Fetch the ticker for one option instrument.
    pub async fn ticker(&self, instrument: &str) -> Result<OptionTicker, DeribitError> {
        let url = format!(
            "{}/api/v2/public/ticker?instrument_name={}",
            self.base_url, instrument
        );
        debug!(url = %url, "Fetching option ticker");

        let response = self.http.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeribitError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: TickerEnvelope = response
            .json()
            .await
            .map_err(|e| DeribitError::Decode(format!("ticker response: {}", e)))?;

        Ok(envelope.result)
    }
}

impl Default for DeribitClient {
    fn default() -> Self {
        Self::production()
    }
}
