//! Configuration for edge-bot.
//!
//! Loaded from a TOML file with environment-variable and CLI overrides,
//! validated once at startup, and immutable thereafter. Every required
//! field failure is a [`ConfigError`] raised before the first tick runs —
//! never a deferred key error mid-run. There is no ambient global state:
//! the parsed config is passed explicitly to every component.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use edge_common::Asset;

use crate::costs::{CostParameters, FeeCombination};
use crate::session::reconcile::ReconcileConfig;

/// Fatal startup configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("missing required config field: {0}")]
    MissingField(&'static str),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Engine-wide scheduling and output settings.
#[derive(Debug, Clone)]
pub struct GeneralConfig {
    /// Decision log path (`OUTPUT_CSV`).
    pub output_csv: PathBuf,
    /// P&L snapshot series path.
    pub pnl_csv: PathBuf,
    /// Seconds between evaluation ticks.
    pub check_interval_secs: u64,
    /// Deadline after which an in-flight tick is abandoned.
    pub tick_deadline_secs: u64,
    /// Worker-pool bound for concurrent event evaluation.
    pub max_concurrent_evals: usize,
    /// Recommendation-only mode; no fills are implied to execution.
    pub dry_trade: bool,
    /// Maximum actionable suggestions per UTC day.
    pub daily_trades: u32,
    /// Logging level.
    pub log_level: String,
    /// Optional Deribit base-URL override.
    pub deribit_url: Option<String>,
    /// Optional Polymarket base-URL override.
    pub polymarket_url: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_csv: PathBuf::from("results.csv"),
            pnl_csv: PathBuf::from("pnl_snapshots.csv"),
            check_interval_secs: 60,
            tick_deadline_secs: 45,
            max_concurrent_evals: 4,
            dry_trade: true,
            daily_trades: 10,
            log_level: "info".to_string(),
            deribit_url: None,
            polymarket_url: None,
        }
    }
}

/// Gates an evaluation must clear to produce an actionable suggestion.
#[derive(Debug, Clone)]
pub struct TradeThresholds {
    /// Minimum |poly_yes_price - deribit_prob| worth considering.
    pub ev_spread_min: Decimal,
    /// EV at which a recommendation is highlighted for notification.
    pub notify_net_ev_min: Decimal,
    /// Minimum net EV (USD) for a trade suggestion.
    pub min_net_ev: Decimal,
    /// Minimum EV/IM return (percent) for a trade suggestion.
    pub min_roi_pct: Decimal,
    /// Lowest tradable prediction-market price.
    pub min_pm_price: Decimal,
    /// Highest tradable prediction-market price.
    pub max_pm_price: Decimal,
    /// Floor for the option hedge size, in contracts.
    pub min_contract_size: Decimal,
    /// Candidate investment sizes (USD) evaluated per event.
    pub investments: Vec<Decimal>,
}

impl Default for TradeThresholds {
    fn default() -> Self {
        Self {
            ev_spread_min: Decimal::new(2, 2),       // 0.02
            notify_net_ev_min: Decimal::new(20, 0),  // $20
            min_net_ev: Decimal::new(1, 0),          // $1
            min_roi_pct: Decimal::new(1, 0),         // 1%
            min_pm_price: Decimal::new(5, 2),        // 0.05
            max_pm_price: Decimal::new(95, 2),       // 0.95
            min_contract_size: Decimal::new(1, 1),   // 0.1 contracts
            investments: vec![Decimal::new(100, 0)],
        }
    }
}

/// One configured threshold event.
#[derive(Debug, Clone)]
pub struct EventConfig {
    /// Human-readable market title; doubles as the ledger market id.
    pub title: String,
    pub asset: Asset,
    /// Threshold strike the event asks about.
    pub k1_strike: Decimal,
    /// Optional upper strike for range events ("between K1 and K2").
    pub k2_strike: Option<Decimal>,
    pub expiration: DateTime<Utc>,
    /// Prediction-market YES token id.
    pub pm_token_id: String,
    /// Explicit option instrument; derived from asset/strike/expiry when
    /// absent.
    pub instrument: Option<String>,
}

impl EventConfig {
    /// Option instrument name for this event's hedge leg.
    pub fn instrument_name(&self) -> String {
        self.instrument
            .clone()
            .unwrap_or_else(|| self.asset.call_instrument(self.expiration, self.k1_strike))
    }

    /// Time to expiry in years, floored at zero.
    pub fn time_to_expiry_years(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (self.expiration - now).num_seconds().max(0) as f64;
        seconds / (365.25 * 24.0 * 3600.0)
    }
}

/// Top-level configuration for edge-bot.
#[derive(Debug, Clone, Default)]
pub struct BotConfig {
    pub general: GeneralConfig,
    pub thresholds: TradeThresholds,
    pub costs: CostParameters,
    pub reconcile: ReconcileConfig,
    pub events: Vec<EventConfig>,
}

impl BotConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let raw: TomlConfig =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        raw.try_into()
    }

    /// Apply environment variable overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("OUTPUT_CSV") {
            self.general.output_csv = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("DERIBIT_URL") {
            self.general.deribit_url = Some(url);
        }
        if let Ok(url) = std::env::var("POLYMARKET_URL") {
            self.general.polymarket_url = Some(url);
        }
    }

    /// Apply CLI overrides.
    pub fn apply_cli_overrides(
        &mut self,
        log_level: Option<String>,
        output_csv: Option<PathBuf>,
        dry_trade: Option<bool>,
    ) {
        if let Some(level) = log_level {
            self.general.log_level = level;
        }
        if let Some(path) = output_csv {
            self.general.output_csv = path;
        }
        if let Some(dry) = dry_trade {
            self.general.dry_trade = dry;
        }
    }

    /// Validate the full configuration. Any failure is fatal at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.check_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "general.check_interval_secs",
                "must be at least 1",
            ));
        }
        if self.general.tick_deadline_secs == 0 {
            return Err(ConfigError::invalid(
                "general.tick_deadline_secs",
                "must be at least 1",
            ));
        }
        if self.general.max_concurrent_evals == 0 {
            return Err(ConfigError::invalid(
                "general.max_concurrent_evals",
                "must be at least 1",
            ));
        }
        if self.general.daily_trades == 0 {
            return Err(ConfigError::invalid(
                "general.daily_trades",
                "must be at least 1",
            ));
        }

        let t = &self.thresholds;
        if t.investments.is_empty() {
            return Err(ConfigError::MissingField("thresholds.investments"));
        }
        if t.investments.iter().any(|i| *i <= Decimal::ZERO) {
            return Err(ConfigError::invalid(
                "thresholds.investments",
                "all sizes must be positive",
            ));
        }
        if t.min_pm_price <= Decimal::ZERO
            || t.max_pm_price >= Decimal::ONE
            || t.min_pm_price >= t.max_pm_price
        {
            return Err(ConfigError::invalid(
                "thresholds.min_pm_price/max_pm_price",
                "must satisfy 0 < min < max < 1",
            ));
        }
        if t.ev_spread_min < Decimal::ZERO
            || t.min_net_ev < Decimal::ZERO
            || t.min_roi_pct < Decimal::ZERO
            || t.min_contract_size < Decimal::ZERO
        {
            return Err(ConfigError::invalid(
                "thresholds",
                "spread/EV/ROI/contract-size minimums must be non-negative",
            ));
        }

        let c = &self.costs;
        if c.fee_cap < Decimal::ZERO
            || c.fee_rate < Decimal::ZERO
            || c.gas_open < Decimal::ZERO
            || c.gas_close < Decimal::ZERO
            || c.margin_requirement < Decimal::ZERO
            || c.tx_fee_rate < Decimal::ZERO
            || c.base_fee < Decimal::ZERO
        {
            return Err(ConfigError::invalid("costs", "cost parameters must be non-negative"));
        }

        if self.reconcile.interval_secs == 0 {
            return Err(ConfigError::invalid(
                "reconcile.interval_secs",
                "must be at least 1",
            ));
        }
        if self.reconcile.drift_tolerance_usd < Decimal::ZERO {
            return Err(ConfigError::invalid(
                "reconcile.drift_tolerance_usd",
                "must be non-negative",
            ));
        }

        if self.events.is_empty() {
            return Err(ConfigError::MissingField("events"));
        }
        for event in &self.events {
            if event.title.trim().is_empty() {
                return Err(ConfigError::invalid("events.title", "must not be empty"));
            }
            if event.pm_token_id.trim().is_empty() {
                return Err(ConfigError::invalid(
                    "events.pm_token_id",
                    format!("missing for {:?}", event.title),
                ));
            }
            if event.k1_strike <= Decimal::ZERO {
                return Err(ConfigError::invalid(
                    "events.k1_strike",
                    format!("must be positive for {:?}", event.title),
                ));
            }
            if let Some(k2) = event.k2_strike {
                if k2 <= event.k1_strike {
                    return Err(ConfigError::invalid(
                        "events.k2_strike",
                        format!("must exceed k1_strike for {:?}", event.title),
                    ));
                }
            }
        }

        Ok(())
    }
}

// ============================================================================
// TOML deserialization structures
// ============================================================================

/// f64 from TOML, rounded into a clean Decimal.
fn dec(v: f64) -> Decimal {
    Decimal::from_f64_retain(v)
        .unwrap_or(Decimal::ZERO)
        .round_dp(12)
        .normalize()
}

#[derive(Debug, Deserialize)]
struct TomlConfig {
    #[serde(default)]
    general: GeneralToml,
    #[serde(default)]
    thresholds: ThresholdsToml,
    #[serde(default)]
    costs: CostsToml,
    #[serde(default)]
    reconcile: ReconcileToml,
    #[serde(default)]
    events: Vec<EventToml>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct GeneralToml {
    output_csv: String,
    pnl_csv: String,
    check_interval_sec: u64,
    tick_deadline_sec: u64,
    max_concurrent_evals: usize,
    dry_trade: bool,
    daily_trades: u32,
    log_level: String,
    deribit_url: Option<String>,
    polymarket_url: Option<String>,
}

impl Default for GeneralToml {
    fn default() -> Self {
        let d = GeneralConfig::default();
        Self {
            output_csv: d.output_csv.display().to_string(),
            pnl_csv: d.pnl_csv.display().to_string(),
            check_interval_sec: d.check_interval_secs,
            tick_deadline_sec: d.tick_deadline_secs,
            max_concurrent_evals: d.max_concurrent_evals,
            dry_trade: d.dry_trade,
            daily_trades: d.daily_trades,
            log_level: d.log_level,
            deribit_url: None,
            polymarket_url: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ThresholdsToml {
    ev_spread_min: f64,
    notify_net_ev_min: f64,
    min_net_ev: f64,
    min_roi_pct: f64,
    min_pm_price: f64,
    max_pm_price: f64,
    min_contract_size: f64,
    investments: Vec<f64>,
}

impl Default for ThresholdsToml {
    fn default() -> Self {
        Self {
            ev_spread_min: 0.02,
            notify_net_ev_min: 20.0,
            min_net_ev: 1.0,
            min_roi_pct: 1.0,
            min_pm_price: 0.05,
            max_pm_price: 0.95,
            min_contract_size: 0.1,
            investments: vec![100.0],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CostsToml {
    fee_cap: f64,
    fee_rate: f64,
    fee_combination: String,
    gas_open: f64,
    gas_close: f64,
    margin_requirement: f64,
    tx_fee_rate: f64,
    base_fee: f64,
    risk_free_rate: f64,
}

impl Default for CostsToml {
    fn default() -> Self {
        Self {
            fee_cap: 0.0003,
            fee_rate: 0.125,
            fee_combination: "max".to_string(),
            gas_open: 0.50,
            gas_close: 0.50,
            margin_requirement: 0.15,
            tx_fee_rate: 0.02,
            base_fee: 0.25,
            risk_free_rate: 0.05,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ReconcileToml {
    interval_sec: u64,
    drift_tolerance_usd: f64,
}

impl Default for ReconcileToml {
    fn default() -> Self {
        Self {
            interval_sec: 3600,
            drift_tolerance_usd: 50.0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventToml {
    title: String,
    asset: String,
    k1_strike: f64,
    k2_strike: Option<f64>,
    /// RFC 3339 timestamp, e.g. `2026-06-26T08:00:00Z`.
    expiration: String,
    pm_token_id: String,
    instrument: Option<String>,
}

impl TryFrom<TomlConfig> for BotConfig {
    type Error = ConfigError;

    fn try_from(raw: TomlConfig) -> Result<Self, Self::Error> {
        let fee_combination: FeeCombination = raw
            .costs
            .fee_combination
            .parse()
            .map_err(|reason| ConfigError::Invalid {
                field: "costs.fee_combination",
                reason,
            })?;

        let events = raw
            .events
            .into_iter()
            .map(|e| {
                let asset: Asset = e.asset.parse().map_err(|reason| ConfigError::Invalid {
                    field: "events.asset",
                    reason,
                })?;
                let expiration = DateTime::parse_from_rfc3339(&e.expiration)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|err| ConfigError::Invalid {
                        field: "events.expiration",
                        reason: format!("{:?}: {}", e.expiration, err),
                    })?;
                Ok(EventConfig {
                    title: e.title,
                    asset,
                    k1_strike: dec(e.k1_strike),
                    k2_strike: e.k2_strike.map(dec),
                    expiration,
                    pm_token_id: e.pm_token_id,
                    instrument: e.instrument,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(BotConfig {
            general: GeneralConfig {
                output_csv: PathBuf::from(raw.general.output_csv),
                pnl_csv: PathBuf::from(raw.general.pnl_csv),
                check_interval_secs: raw.general.check_interval_sec,
                tick_deadline_secs: raw.general.tick_deadline_sec,
                max_concurrent_evals: raw.general.max_concurrent_evals,
                dry_trade: raw.general.dry_trade,
                daily_trades: raw.general.daily_trades,
                log_level: raw.general.log_level,
                deribit_url: raw.general.deribit_url,
                polymarket_url: raw.general.polymarket_url,
            },
            thresholds: TradeThresholds {
                ev_spread_min: dec(raw.thresholds.ev_spread_min),
                notify_net_ev_min: dec(raw.thresholds.notify_net_ev_min),
                min_net_ev: dec(raw.thresholds.min_net_ev),
                min_roi_pct: dec(raw.thresholds.min_roi_pct),
                min_pm_price: dec(raw.thresholds.min_pm_price),
                max_pm_price: dec(raw.thresholds.max_pm_price),
                min_contract_size: dec(raw.thresholds.min_contract_size),
                investments: raw.thresholds.investments.into_iter().map(dec).collect(),
            },
            costs: CostParameters {
                fee_cap: dec(raw.costs.fee_cap),
                fee_rate: dec(raw.costs.fee_rate),
                fee_combination,
                gas_open: dec(raw.costs.gas_open),
                gas_close: dec(raw.costs.gas_close),
                margin_requirement: dec(raw.costs.margin_requirement),
                tx_fee_rate: dec(raw.costs.tx_fee_rate),
                base_fee: dec(raw.costs.base_fee),
                risk_free_rate: raw.costs.risk_free_rate,
            },
            reconcile: ReconcileConfig {
                interval_secs: raw.reconcile.interval_sec,
                drift_tolerance_usd: dec(raw.reconcile.drift_tolerance_usd),
            },
            events,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec as d;

    const SAMPLE: &str = r#"
        [general]
        output_csv = "out/results.csv"
        check_interval_sec = 30
        daily_trades = 5
        dry_trade = true

        [thresholds]
        ev_spread_min = 0.03
        min_net_ev = 2.0
        investments = [50.0, 100.0, 250.0]

        [costs]
        fee_cap = 0.0003
        fee_rate = 0.125
        fee_combination = "min"

        [reconcile]
        interval_sec = 1800
        drift_tolerance_usd = 25.0

        [[events]]
        title = "BTC above 100k by June"
        asset = "BTC"
        k1_strike = 100000.0
        expiration = "2026-06-26T08:00:00Z"
        pm_token_id = "token-yes-1"

        [[events]]
        title = "ETH between 4k and 5k"
        asset = "ETH"
        k1_strike = 4000.0
        k2_strike = 5000.0
        expiration = "2026-06-26T08:00:00Z"
        pm_token_id = "token-yes-2"
        instrument = "ETH-26JUN26-4000-C"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = BotConfig::from_toml_str(SAMPLE).unwrap();
        config.validate().unwrap();

        assert_eq!(config.general.check_interval_secs, 30);
        assert_eq!(config.general.daily_trades, 5);
        assert!(config.general.dry_trade);
        assert_eq!(config.thresholds.ev_spread_min, d!(0.03));
        assert_eq!(config.thresholds.investments, vec![d!(50), d!(100), d!(250)]);
        assert_eq!(config.costs.fee_combination, FeeCombination::Min);
        assert_eq!(config.reconcile.interval_secs, 1800);
        assert_eq!(config.events.len(), 2);
        assert_eq!(config.events[0].asset, Asset::Btc);
        assert_eq!(config.events[1].k2_strike, Some(d!(5000)));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config = BotConfig::from_toml_str(
            r#"
            [[events]]
            title = "BTC above 100k"
            asset = "BTC"
            k1_strike = 100000.0
            expiration = "2026-06-26T08:00:00Z"
            pm_token_id = "t"
            "#,
        )
        .unwrap();
        assert_eq!(config.general.check_interval_secs, 60);
        assert_eq!(config.costs.fee_combination, FeeCombination::Max);
        config.validate().unwrap();
    }

    #[test]
    fn test_no_events_is_fatal() {
        let config = BotConfig::from_toml_str("").unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingField("events")));
    }

    #[test]
    fn test_bad_fee_combination_is_fatal() {
        let err = BotConfig::from_toml_str(
            r#"
            [costs]
            fee_combination = "average"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "costs.fee_combination",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_expiration_is_fatal() {
        let err = BotConfig::from_toml_str(
            r#"
            [[events]]
            title = "t"
            asset = "BTC"
            k1_strike = 1.0
            expiration = "not-a-date"
            pm_token_id = "t"
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "events.expiration",
                ..
            }
        ));
    }

    #[test]
    fn test_inverted_price_band_rejected() {
        let config = BotConfig::from_toml_str(
            r#"
            [thresholds]
            min_pm_price = 0.90
            max_pm_price = 0.10

            [[events]]
            title = "t"
            asset = "BTC"
            k1_strike = 1.0
            expiration = "2026-06-26T08:00:00Z"
            pm_token_id = "t"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_k2_below_k1_rejected() {
        let config = BotConfig::from_toml_str(
            r#"
            [[events]]
            title = "t"
            asset = "BTC"
            k1_strike = 100000.0
            k2_strike = 90000.0
            expiration = "2026-06-26T08:00:00Z"
            pm_token_id = "t"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_investment_rejected() {
        let config = BotConfig::from_toml_str(
            r#"
            [thresholds]
            investments = [0.0]

            [[events]]
            title = "t"
            asset = "BTC"
            k1_strike = 1.0
            expiration = "2026-06-26T08:00:00Z"
            pm_token_id = "t"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_decimal_conversion_is_clean() {
        assert_eq!(dec(0.02), d!(0.02));
        assert_eq!(dec(0.125), d!(0.125));
        assert_eq!(dec(100000.0), d!(100000));
    }

    #[test]
    fn test_instrument_name_derived_or_explicit() {
        let config = BotConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.events[0].instrument_name(), "BTC-26JUN26-100000-C");
        assert_eq!(config.events[1].instrument_name(), "ETH-26JUN26-4000-C");
    }

    #[test]
    fn test_time_to_expiry_floors_at_zero() {
        let config = BotConfig::from_toml_str(SAMPLE).unwrap();
        let past = DateTime::parse_from_rfc3339("2030-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(config.events[0].time_to_expiry_years(past), 0.0);

        let before = DateTime::parse_from_rfc3339("2026-05-26T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let tte = config.events[0].time_to_expiry_years(before);
        assert!(tte > 0.08 && tte < 0.09); // ~1 month
    }
}
