//! Exponentially weighted CPU burst prediction.

use crate::errors::ConfigError;
use crate::time::Ticks;

/// Smoothing factor used when none is configured.
pub const DEFAULT_ALPHA: f64 = 0.5;

/// Outcome of one prediction step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Estimate of the next burst
    pub expected: f64,
    /// Absolute difference between the burst just observed and `expected`
    pub error: f64,
}

/// EWMA predictor: `expected = alpha * last_burst + (1 - alpha) * previous`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BurstPredictor {
    alpha: f64,
}

impl Default for BurstPredictor {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl BurstPredictor {
    /// Create a predictor.
    ///
    /// # Arguments
    ///
    /// * `alpha` - Weight of the most recent burst, in `(0, 1]`
    pub fn new(alpha: f64) -> Result<Self, ConfigError> {
        validate_alpha(alpha)?;
        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Fold the burst just observed into the running estimate.
    pub fn predict(&self, prev_burst: Ticks, prev_expected: f64) -> Prediction {
        let observed = prev_burst as f64;
        let expected = self.alpha * observed + (1.0 - self.alpha) * prev_expected;
        let diff = observed - expected;
        Prediction {
            expected,
            error: if diff < 0.0 { -diff } else { diff },
        }
    }
}

/// Reject smoothing factors outside `(0, 1]`, NaN included.
pub fn validate_alpha(alpha: f64) -> Result<(), ConfigError> {
    if alpha > 0.0 && alpha <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidAlpha(alpha))
    }
}
