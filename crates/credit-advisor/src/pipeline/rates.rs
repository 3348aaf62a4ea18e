use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MARKET_BASE_RATE: f64 = 7.5;

/// Market settings used when an applicant record omits an interest rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateConfig {
    pub market_base_rate: f64,
    /// Half-width of the uniform perturbation, in percentage points.
    pub jitter_band: f64,
    pub min_rate: f64,
    pub max_rate: f64,
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            market_base_rate: DEFAULT_MARKET_BASE_RATE,
            jitter_band: 0.25,
            min_rate: 5.5,
            max_rate: 12.0,
        }
    }
}

/// Estimates an annual rate (in percent) from credit score and loan term.
#[derive(Debug, Clone, Default)]
pub struct InterestRateEstimator {
    config: RateConfig,
}

impl InterestRateEstimator {
    pub fn new(config: RateConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RateConfig {
        &self.config
    }

    /// Deterministic part of the estimate, before jitter and clamping.
    pub fn base_estimate(&self, credit_score: f64, term_months: f64) -> f64 {
        let mut rate = self.config.market_base_rate;

        if credit_score >= 750.0 {
            rate -= 1.0;
        } else if credit_score >= 700.0 {
            rate -= 0.5;
        } else if credit_score < 600.0 {
            rate += 1.0;
        }

        if term_months >= 300.0 {
            rate += 0.5;
        } else if term_months >= 240.0 {
            rate += 0.3;
        }

        rate
    }

    pub fn estimate(&self, credit_score: f64, term_months: f64, rng: &mut dyn RngCore) -> f64 {
        let rate = self.base_estimate(credit_score, term_months) + jitter(rng, self.config.jitter_band);
        rate.clamp(self.config.min_rate, self.config.max_rate)
    }
}

/// Uniform draw in `[-band, band]`; a non-positive band disables the perturbation.
pub(crate) fn jitter(rng: &mut dyn RngCore, band: f64) -> f64 {
    if band > 0.0 && band.is_finite() {
        rng.random_range(-band..=band)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn base_estimate_applies_score_tiers() {
        let estimator = InterestRateEstimator::default();
        assert_eq!(estimator.base_estimate(780.0, 120.0), 6.5);
        assert_eq!(estimator.base_estimate(720.0, 120.0), 7.0);
        assert_eq!(estimator.base_estimate(650.0, 120.0), 7.5);
        assert_eq!(estimator.base_estimate(580.0, 120.0), 8.5);
    }

    #[test]
    fn long_terms_carry_a_premium() {
        let estimator = InterestRateEstimator::default();
        assert!((estimator.base_estimate(650.0, 240.0) - 7.8).abs() < 1e-9);
        assert!((estimator.base_estimate(650.0, 360.0) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_stays_within_jitter_band() {
        let estimator = InterestRateEstimator::default();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let rate = estimator.estimate(720.0, 120.0, &mut rng);
            assert!((rate - 7.0).abs() <= 0.25 + 1e-12, "rate {rate} outside band");
        }
    }

    #[test]
    fn estimate_is_reproducible_under_fixed_seed() {
        let estimator = InterestRateEstimator::default();
        let mut first = StdRng::seed_from_u64(42);
        let mut second = StdRng::seed_from_u64(42);

        let a: Vec<f64> = (0..5)
            .map(|_| estimator.estimate(690.0, 180.0, &mut first))
            .collect();
        let b: Vec<f64> = (0..5)
            .map(|_| estimator.estimate(690.0, 180.0, &mut second))
            .collect();

        assert_eq!(a, b);
    }

    #[test]
    fn estimate_is_clamped_to_market_bounds() {
        let estimator = InterestRateEstimator::new(RateConfig {
            market_base_rate: 15.0,
            jitter_band: 0.0,
            ..RateConfig::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(estimator.estimate(500.0, 360.0, &mut rng), 12.0);
    }
}
