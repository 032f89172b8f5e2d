//! Transaction cost and margin model.
//!
//! Per-leg exchange fees follow the capped-rate schedule used by
//! coin-settled option venues: the fee is a combination of a flat cap and
//! a rate applied to the instrument price, per contract. Two combination
//! policies exist in the wild (`max` = worst case, `min` = best case) and
//! they produce materially different economics, so the policy is an
//! explicit configuration knob rather than a silent default.
//!
//! On top of the exchange legs, a round trip pays fixed open/close gas and
//! a platform fee proportional to the invested notional.
//!
//! A single [`CostParameters`] instance is built at startup and shared
//! read-only across all evaluations in a tick.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the fee cap combines with the rate-based fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeCombination {
    /// Worst-case fee: `max(cap, rate * price)`. Conservative EV.
    Max,
    /// Best-case fee: `min(cap, rate * price)`.
    Min,
}

impl FeeCombination {
    fn combine(&self, cap: Decimal, rate_fee: Decimal) -> Decimal {
        match self {
            FeeCombination::Max => cap.max(rate_fee),
            FeeCombination::Min => cap.min(rate_fee),
        }
    }
}

impl std::str::FromStr for FeeCombination {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" => Ok(FeeCombination::Max),
            "min" => Ok(FeeCombination::Min),
            _ => Err(format!("Unknown fee combination policy: {}", s)),
        }
    }
}

/// Process-wide cost model parameters.
///
/// Loaded once at startup, read-only thereafter; safe to share across
/// concurrent evaluations without locking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostParameters {
    /// Flat fee cap per contract, denominated in the settlement coin.
    pub fee_cap: Decimal,
    /// Fee rate applied to the instrument price, per contract.
    pub fee_rate: Decimal,
    /// Cap-vs-rate combination policy.
    pub fee_combination: FeeCombination,
    /// Fixed gas cost to open the prediction-market leg (USD).
    pub gas_open: Decimal,
    /// Fixed gas cost to close/settle the prediction-market leg (USD).
    pub gas_close: Decimal,
    /// Risk factor added to the option premium when computing initial
    /// margin, denominated like the premium (fraction of underlying).
    pub margin_requirement: Decimal,
    /// Platform fee rate applied to the invested notional.
    pub tx_fee_rate: Decimal,
    /// Flat platform fee per transaction (USD).
    pub base_fee: Decimal,
    /// Risk-free rate used by the probability model.
    pub risk_free_rate: f64,
}

impl Default for CostParameters {
    fn default() -> Self {
        Self {
            fee_cap: Decimal::new(3, 4),            // 0.0003 coin
            fee_rate: Decimal::new(125, 3),         // 12.5% of option price
            fee_combination: FeeCombination::Max,
            gas_open: Decimal::new(50, 2),          // $0.50
            gas_close: Decimal::new(50, 2),         // $0.50
            margin_requirement: Decimal::new(15, 2), // 0.15 of underlying
            tx_fee_rate: Decimal::new(2, 2),        // 2%
            base_fee: Decimal::new(25, 2),          // $0.25
            risk_free_rate: 0.05,
        }
    }
}

impl CostParameters {
    /// Per-leg exchange fee in the settlement currency.
    ///
    /// For native-coin settlement the cap applies as configured and the
    /// result is a coin amount; for stable-settled instruments the cap is
    /// scaled by the underlying index price and the result is USD.
    pub fn leg_fee(
        &self,
        instrument_price: Decimal,
        size: Decimal,
        underlying_index_price: Decimal,
        is_stable_settled: bool,
    ) -> Decimal {
        let cap = if is_stable_settled {
            self.fee_cap * underlying_index_price
        } else {
            self.fee_cap
        };
        let rate_fee = self.fee_rate * instrument_price;
        self.fee_combination.combine(cap, rate_fee) * size
    }

    /// Per-leg exchange fee converted to USD.
    pub fn leg_fee_usd(
        &self,
        instrument_price: Decimal,
        size: Decimal,
        underlying_index_price: Decimal,
        is_stable_settled: bool,
    ) -> Decimal {
        let fee = self.leg_fee(instrument_price, size, underlying_index_price, is_stable_settled);
        if is_stable_settled {
            fee
        } else {
            fee * underlying_index_price
        }
    }

    /// Estimated network/platform fee for the invested notional (USD).
    pub fn network_fee(&self, investment: Decimal) -> Decimal {
        investment * self.tx_fee_rate + self.base_fee
    }

    /// Total round-trip cost in USD: option open + close legs, fixed gas
    /// for both prediction-market legs, and the platform fee.
    ///
    /// Consumed unchanged by the strategy evaluator.
    pub fn total_costs(
        &self,
        option_mid: Decimal,
        contracts: Decimal,
        underlying_index_price: Decimal,
        is_stable_settled: bool,
        investment: Decimal,
    ) -> Decimal {
        let open_leg = self.leg_fee_usd(option_mid, contracts, underlying_index_price, is_stable_settled);
        let close_leg = open_leg;
        open_leg + close_leg + self.gas_open + self.gas_close + self.network_fee(investment)
    }

    /// Initial margin in USD for the option hedge leg.
    ///
    /// `IM = contracts * (premium + risk_factor) * underlying`, with the
    /// premium and risk factor both expressed as fractions of the
    /// underlying (coin-denominated option quoting).
    pub fn initial_margin(
        &self,
        contracts: Decimal,
        option_mid: Decimal,
        underlying_index_price: Decimal,
    ) -> Decimal {
        contracts * (option_mid + self.margin_requirement) * underlying_index_price
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params(combination: FeeCombination) -> CostParameters {
        CostParameters {
            fee_cap: dec!(0.0003),
            fee_rate: dec!(0.125),
            fee_combination: combination,
            gas_open: dec!(0.50),
            gas_close: dec!(0.50),
            margin_requirement: dec!(0.15),
            tx_fee_rate: dec!(0.02),
            base_fee: dec!(0.25),
            risk_free_rate: 0.05,
        }
    }

    #[test]
    fn test_leg_fee_max_policy() {
        let p = params(FeeCombination::Max);

        // Cheap option: rate fee 0.125 * 0.001 = 0.000125 < cap 0.0003
        // -> max picks the cap.
        let fee = p.leg_fee(dec!(0.001), dec!(1), dec!(100000), false);
        assert_eq!(fee, dec!(0.0003));

        // Expensive option: rate fee 0.125 * 0.05 = 0.00625 > cap
        // -> max picks the rate fee.
        let fee = p.leg_fee(dec!(0.05), dec!(1), dec!(100000), false);
        assert_eq!(fee, dec!(0.00625));
    }

    #[test]
    fn test_leg_fee_min_policy() {
        let p = params(FeeCombination::Min);

        let fee = p.leg_fee(dec!(0.001), dec!(1), dec!(100000), false);
        assert_eq!(fee, dec!(0.000125));

        let fee = p.leg_fee(dec!(0.05), dec!(1), dec!(100000), false);
        assert_eq!(fee, dec!(0.0003));
    }

    #[test]
    fn test_policies_diverge() {
        // The two policies are materially different economics; they must
        // never collapse into one another except when cap == rate fee.
        let max_fee = params(FeeCombination::Max).leg_fee(dec!(0.05), dec!(10), dec!(100000), false);
        let min_fee = params(FeeCombination::Min).leg_fee(dec!(0.05), dec!(10), dec!(100000), false);
        assert!(max_fee > min_fee);
    }

    #[test]
    fn test_stable_settled_cap_scaling() {
        let p = params(FeeCombination::Max);

        // Stable-settled: cap becomes 0.0003 * 100 = 0.03 USD; price is
        // already USD so the rate fee is 0.125 * 0.02 = 0.0025.
        let fee = p.leg_fee(dec!(0.02), dec!(1), dec!(100), true);
        assert_eq!(fee, dec!(0.03));
    }

    #[test]
    fn test_leg_fee_usd_conversion() {
        let p = params(FeeCombination::Max);

        // Native coin fee 0.0003 BTC at $100k = $30.
        let fee = p.leg_fee_usd(dec!(0.001), dec!(1), dec!(100000), false);
        assert_eq!(fee, dec!(30));

        // Stable-settled fees are already USD.
        let fee = p.leg_fee_usd(dec!(0.02), dec!(1), dec!(100), true);
        assert_eq!(fee, dec!(0.03));
    }

    #[test]
    fn test_fee_monotonic_in_size() {
        let p = params(FeeCombination::Max);
        let mut last = Decimal::ZERO;
        for size in [dec!(0), dec!(0.5), dec!(1), dec!(2), dec!(10), dec!(100)] {
            let fee = p.leg_fee(dec!(0.01), size, dec!(100000), false);
            assert!(fee >= last, "fee must not decrease as size grows");
            last = fee;
        }
    }

    #[test]
    fn test_network_fee() {
        let p = params(FeeCombination::Max);
        // 100 * 0.02 + 0.25 = 2.25
        assert_eq!(p.network_fee(dec!(100)), dec!(2.25));
        assert_eq!(p.network_fee(Decimal::ZERO), dec!(0.25));
    }

    #[test]
    fn test_total_costs_sums_components() {
        let p = params(FeeCombination::Max);
        let contracts = dec!(0.001);
        let option_mid = dec!(0.05);
        let spot = dec!(100000);

        // Per leg: max(0.0003, 0.00625) * 0.001 = 0.00000625 BTC = $0.625.
        // Two legs = $1.25, gas = $1.00, network = 100*0.02 + 0.25 = $2.25.
        let total = p.total_costs(option_mid, contracts, spot, false, dec!(100));
        assert_eq!(total, dec!(4.50));
    }

    #[test]
    fn test_initial_margin() {
        let p = params(FeeCombination::Max);
        // 0.001 * (0.05 + 0.15) * 100000 = 20
        let im = p.initial_margin(dec!(0.001), dec!(0.05), dec!(100000));
        assert_eq!(im, dec!(20));
    }

    #[test]
    fn test_initial_margin_zero_contracts() {
        let p = params(FeeCombination::Max);
        assert_eq!(
            p.initial_margin(Decimal::ZERO, dec!(0.05), dec!(100000)),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_fee_combination_from_str() {
        assert_eq!("max".parse::<FeeCombination>().unwrap(), FeeCombination::Max);
        assert_eq!("MIN".parse::<FeeCombination>().unwrap(), FeeCombination::Min);
        assert!("avg".parse::<FeeCombination>().is_err());
    }
}
