//! Forecast result structure for holding model-scale predictive distributions.

use crate::error::{ForecastError, Result};
use crate::utils::stats::quantile_normal;

/// A forecast on the scale the model was fitted on.
///
/// Each step carries the mean and standard error of a normal predictive
/// distribution; intervals and back-transformation are derived from these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forecast {
    mean: Vec<f64>,
    std_error: Vec<f64>,
}

impl Forecast {
    /// Create an empty forecast.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a forecast from per-step means and standard errors.
    pub fn from_parts(mean: Vec<f64>, std_error: Vec<f64>) -> Result<Self> {
        if mean.len() != std_error.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: mean.len(),
                got: std_error.len(),
            });
        }
        if mean.iter().chain(std_error.iter()).any(|v| !v.is_finite()) {
            return Err(ForecastError::ComputationError(
                "non-finite forecast".to_string(),
            ));
        }
        Ok(Self { mean, std_error })
    }

    /// Get the forecast horizon (number of steps).
    pub fn horizon(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std_error(&self) -> &[f64] {
        &self.std_error
    }

    /// Central interval at `level` (e.g. 0.95) for every step.
    pub fn interval(&self, level: f64) -> Result<(Vec<f64>, Vec<f64>)> {
        if !(level > 0.0 && level < 1.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {}",
                level
            )));
        }
        let z = quantile_normal((1.0 + level) / 2.0);
        let lower = self
            .mean
            .iter()
            .zip(&self.std_error)
            .map(|(m, s)| m - z * s)
            .collect();
        let upper = self
            .mean
            .iter()
            .zip(&self.std_error)
            .map(|(m, s)| m + z * s)
            .collect();
        Ok((lower, upper))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn forecast_requires_matching_lengths() {
        assert!(Forecast::from_parts(vec![1.0, 2.0], vec![0.1]).is_err());
        assert!(Forecast::from_parts(vec![f64::NAN], vec![0.1]).is_err());

        let forecast = Forecast::from_parts(vec![1.0, 2.0], vec![0.1, 0.2]).unwrap();
        assert_eq!(forecast.horizon(), 2);
        assert!(!forecast.is_empty());
        assert!(Forecast::new().is_empty());
    }

    #[test]
    fn forecast_interval_is_symmetric_on_model_scale() {
        let forecast = Forecast::from_parts(vec![10.0, 20.0], vec![1.0, 2.0]).unwrap();
        let (lower, upper) = forecast.interval(0.95).unwrap();

        assert_relative_eq!(lower[0], 10.0 - 1.959964, epsilon = 1e-4);
        assert_relative_eq!(upper[1], 20.0 + 2.0 * 1.959964, epsilon = 1e-4);
        assert_relative_eq!(10.0 - lower[0], upper[0] - 10.0, epsilon = 1e-12);
    }

    #[test]
    fn forecast_interval_rejects_bad_levels() {
        let forecast = Forecast::from_parts(vec![1.0], vec![1.0]).unwrap();
        assert!(forecast.interval(0.0).is_err());
        assert!(forecast.interval(1.0).is_err());
        assert!(forecast.interval(95.0).is_err());
    }
}
