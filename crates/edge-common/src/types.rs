//! Core enums shared between the engine and its collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supported underlying assets for threshold markets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Eth,
    Sol,
    Xrp,
}

impl Asset {
    /// Returns the Deribit currency code used in instrument names.
    pub fn deribit_currency(&self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
            Asset::Sol => "SOL",
            Asset::Xrp => "XRP",
        }
    }

    /// Returns the display name.
    pub fn as_str(&self) -> &'static str {
        self.deribit_currency()
    }

    /// Whether Deribit settles this asset's options in a stablecoin
    /// (USDC-settled) rather than the native coin.
    ///
    /// BTC and ETH options settle in the native coin; the smaller
    /// altcoin options are USDC-settled.
    pub fn is_stable_settled(&self) -> bool {
        matches!(self, Asset::Sol | Asset::Xrp)
    }

    /// Builds a Deribit-style option instrument name, e.g.
    /// `BTC-26JUN26-100000-C` for a call at the given strike.
    pub fn call_instrument(&self, expiry: DateTime<Utc>, strike: rust_decimal::Decimal) -> String {
        format!(
            "{}-{}-{}-C",
            self.deribit_currency(),
            expiry.format("%-d%b%y").to_string().to_uppercase(),
            strike.normalize(),
        )
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BTC" => Ok(Asset::Btc),
            "ETH" => Ok(Asset::Eth),
            "SOL" => Ok(Asset::Sol),
            "XRP" => Ok(Asset::Xrp),
            _ => Err(format!("Unknown asset: {}", s)),
        }
    }
}

/// Order side for trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Outcome token of a binary prediction market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn opposite(&self) -> Self {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

/// The two mutually exclusive strategies the evaluator compares.
///
/// `LongYes` buys the prediction-market YES side and hedges by shorting
/// the option leg; `ShortYes` mirrors it (short YES is economically long
/// NO). This is a closed set: evaluation dispatches on the variant, never
/// on loose strings or flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    LongYes,
    ShortYes,
}

impl StrategyId {
    pub fn opposite(&self) -> Self {
        match self {
            StrategyId::LongYes => StrategyId::ShortYes,
            StrategyId::ShortYes => StrategyId::LongYes,
        }
    }

    /// Side taken on the prediction-market YES token.
    pub fn pm_side(&self) -> Side {
        match self {
            StrategyId::LongYes => Side::Buy,
            StrategyId::ShortYes => Side::Sell,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::LongYes => "long_yes",
            StrategyId::ShortYes => "short_yes",
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
