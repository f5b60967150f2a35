//! Two-proportion significance testing and test-duration estimation.
//!
//! Pure, synchronous, no I/O: a function of the counter tallies it is given.
//! Safe to call concurrently and repeatedly without coordination.

use serde::{Deserialize, Serialize};

use crate::limits::MIN_SAMPLE_SIZE;
use crate::session::Variant;

/// Outcome of a two-proportion z-test between variants A and B.
///
/// Computed on demand, never persisted. `winning_variant` is only set when
/// the result is significant; `improvement_rate` is the winner's relative
/// lift over the loser, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignificanceResult {
    pub is_significant: bool,
    pub confidence: f64,
    pub p_value: f64,
    pub winning_variant: Option<Variant>,
    pub improvement_rate: f64,
}

impl SignificanceResult {
    /// The insufficient-data result: never significant, regardless of the
    /// observed effect size.
    fn insufficient() -> Self {
        Self {
            is_significant: false,
            confidence: 0.0,
            p_value: 1.0,
            winning_variant: None,
            improvement_rate: 0.0,
        }
    }
}

/// Runs a pooled two-proportion z-test.
///
/// `sample_a`/`sample_b` are the per-variant sample sizes (views),
/// `conversions_a`/`conversions_b` the conversion tallies. Either sample
/// below the minimum floor yields the insufficient-data result.
pub fn test(
    sample_a: u64,
    conversions_a: u64,
    sample_b: u64,
    conversions_b: u64,
    confidence_level: f64,
) -> SignificanceResult {
    if sample_a < MIN_SAMPLE_SIZE || sample_b < MIN_SAMPLE_SIZE {
        return SignificanceResult::insufficient();
    }

    let n_a = sample_a as f64;
    let n_b = sample_b as f64;
    let p_a = conversions_a as f64 / n_a;
    let p_b = conversions_b as f64 / n_b;

    let pooled = (conversions_a + conversions_b) as f64 / (n_a + n_b);
    let standard_error = (pooled * (1.0 - pooled) * (1.0 / n_a + 1.0 / n_b)).sqrt();

    let z = if standard_error > 0.0 {
        (p_a - p_b).abs() / standard_error
    } else {
        0.0
    };

    let p_value = 2.0 * (1.0 - normal_cdf(z));
    let confidence = 1.0 - p_value;
    let is_significant = confidence >= confidence_level;

    let (winning_variant, improvement_rate) = if is_significant {
        let (winner, winner_rate, loser_rate) = if p_a > p_b {
            (Variant::A, p_a, p_b)
        } else {
            (Variant::B, p_b, p_a)
        };
        let improvement = if loser_rate > 0.0 {
            (winner_rate / loser_rate - 1.0) * 100.0
        } else {
            0.0
        };
        (Some(winner), improvement)
    } else {
        (None, 0.0)
    };

    SignificanceResult {
        is_significant,
        confidence,
        p_value,
        winning_variant,
        improvement_rate,
    }
}

/// z-score for 95% confidence (two-sided).
const Z_ALPHA: f64 = 1.96;
/// z-score for 80% power.
const Z_BETA: f64 = 0.84;

/// Estimates how many days a test must run to detect the expected
/// improvement, pinned at the 95% confidence / 80% power operating point.
///
/// `baseline_rate_pct` and `expected_improvement_pct` are percentages
/// (e.g. 5.0 for a 5% baseline conversion rate, 10.0 for an expected +10%
/// relative lift). Returns `u64::MAX` when the inputs admit no finite
/// answer (zero traffic or zero effect).
pub fn estimate_duration(
    daily_traffic: u64,
    baseline_rate_pct: f64,
    expected_improvement_pct: f64,
) -> u64 {
    let p1 = baseline_rate_pct / 100.0;
    let p2 = p1 * (1.0 + expected_improvement_pct / 100.0);
    let effect = (p1 - p2).abs();

    if daily_traffic == 0 || effect <= f64::EPSILON {
        return u64::MAX;
    }

    let pooled = (p1 + p2) / 2.0;
    let sd = (2.0 * pooled * (1.0 - pooled)).sqrt();

    let required_per_arm = (sd * (Z_ALPHA + Z_BETA) / effect).powi(2);
    let total_required = 2.0 * required_per_arm;

    (total_required / daily_traffic as f64).ceil() as u64
}

/// Standard normal CDF.
///
/// Beyond |z| = 6 the tail mass is below any precision this engine needs,
/// so Φ is clamped to 0/1 there.
fn normal_cdf(z: f64) -> f64 {
    if z > 6.0 {
        return 1.0;
    }
    if z < -6.0 {
        return 0.0;
    }
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Error function, Abramowitz & Stegun approximation 7.1.26.
/// Maximum absolute error 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}
