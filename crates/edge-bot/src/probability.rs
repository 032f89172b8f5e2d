//! Threshold-crossing probability under a lognormal diffusion.
//!
//! Maps an option's mark implied volatility to the probability that the
//! underlying exceeds a strike at expiry, so it can be compared directly
//! against a prediction market's quoted YES price.
//!
//! ```text
//! P(S_T > K) = N(d)
//! d = [ln(S/K) + (r + σ²/2)·T] / (σ·√T)
//! ```
//!
//! This module is the only place f64 math is allowed: ln/sqrt/exp have no
//! Decimal equivalents, and probabilities are not money. Callers convert
//! back to `Decimal` at the boundary.

use std::f64::consts::PI;

/// Probability that the underlying exceeds `strike` at expiry.
///
/// # Arguments
///
/// * `spot` - Current underlying price
/// * `strike` - Threshold price
/// * `time_to_expiry` - Time remaining, in years
/// * `volatility` - Annualized volatility as a fraction (0.60 = 60%)
/// * `rate` - Risk-free rate as a fraction
///
/// # Degenerate inputs
///
/// Any non-positive `spot`, `strike`, `volatility`, or `time_to_expiry`
/// returns exactly `0.0`. This is the "no signal" sentinel, not an error:
/// downstream comparison treats `0.0` as incomparable and skips the event.
/// It must never be reinterpreted as "the threshold will not be crossed".
pub fn threshold_probability(
    spot: f64,
    strike: f64,
    time_to_expiry: f64,
    volatility: f64,
    rate: f64,
) -> f64 {
    if spot <= 0.0 || strike <= 0.0 || volatility <= 0.0 || time_to_expiry <= 0.0 {
        return 0.0;
    }

    let sigma_sqrt_t = volatility * time_to_expiry.sqrt();
    let d = ((spot / strike).ln() + (rate + volatility * volatility / 2.0) * time_to_expiry)
        / sigma_sqrt_t;

    norm_cdf(d).clamp(0.0, 1.0)
}

/// Standard normal CDF approximation (Abramowitz and Stegun).
pub fn norm_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / 2.0_f64.sqrt();

    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    0.5 * (1.0 + sign * y)
}

/// Standard normal PDF.
pub fn norm_pdf(x: f64) -> f64 {
    (-x * x / 2.0).exp() / (2.0 * PI).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_norm_cdf_reference_values() {
        assert!((norm_cdf(0.0) - 0.5).abs() < 0.001);
        assert!((norm_cdf(1.0) - 0.8413).abs() < 0.001);
        assert!((norm_cdf(-1.0) - 0.1587).abs() < 0.001);
        assert!((norm_cdf(2.0) - 0.9772).abs() < 0.001);
    }

    #[test]
    fn test_probability_in_unit_interval() {
        // Sweep a grid of valid inputs; result must always be a probability.
        for spot in [100.0, 50_000.0, 100_000.0] {
            for strike in [90.0, 60_000.0, 120_000.0] {
                for vol in [0.1, 0.6, 2.0] {
                    for t in [0.01, 0.0833, 1.0] {
                        let p = threshold_probability(spot, strike, t, vol, 0.05);
                        assert!(
                            (0.0..=1.0).contains(&p),
                            "p={} out of range for S={} K={} σ={} T={}",
                            p,
                            spot,
                            strike,
                            vol,
                            t
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_degenerate_inputs_are_sentinel_zero() {
        assert_eq!(threshold_probability(0.0, 100.0, 1.0, 0.5, 0.05), 0.0);
        assert_eq!(threshold_probability(-1.0, 100.0, 1.0, 0.5, 0.05), 0.0);
        assert_eq!(threshold_probability(100.0, 0.0, 1.0, 0.5, 0.05), 0.0);
        assert_eq!(threshold_probability(100.0, 100.0, 0.0, 0.5, 0.05), 0.0);
        assert_eq!(threshold_probability(100.0, 100.0, -0.1, 0.5, 0.05), 0.0);
        assert_eq!(threshold_probability(100.0, 100.0, 1.0, 0.0, 0.05), 0.0);
        assert_eq!(threshold_probability(100.0, 100.0, 1.0, -0.5, 0.05), 0.0);
    }

    #[test]
    fn test_at_the_money_with_drift() {
        // Near at-the-money, one month out: slightly above 0.5 because of
        // the positive drift term.
        let p = threshold_probability(100_000.0, 100_000.0, 0.0833, 0.6, 0.05);
        assert!(p > 0.5, "positive drift must push ATM probability above 0.5");
        assert!((p - 0.53).abs() < 0.02, "expected ≈0.53, got {}", p);
    }

    #[test]
    fn test_deep_moneyness_limits() {
        // Far in the money: near certainty.
        let p = threshold_probability(100_000.0, 50_000.0, 0.0833, 0.6, 0.05);
        assert!(p > 0.99);

        // Far out of the money: near zero, but a valid signal (not sentinel).
        let p = threshold_probability(50_000.0, 100_000.0, 0.0833, 0.6, 0.05);
        assert!(p < 0.01);
        assert!(p > 0.0);
    }

    #[test]
    fn test_monotonic_in_spot() {
        let mut last = 0.0;
        for spot in [80_000.0, 90_000.0, 100_000.0, 110_000.0, 120_000.0] {
            let p = threshold_probability(spot, 100_000.0, 0.0833, 0.6, 0.05);
            assert!(p >= last, "probability must not decrease as spot rises");
            last = p;
        }
    }
}
