//! Random walk, optionally with drift.
//!
//! Forecasts based on the last value plus a drift term estimated from historical data.

use super::SeasonalRandomWalk;
use crate::core::Forecast;
use crate::error::Result;
use crate::models::Forecaster;

/// Random walk forecaster.
///
/// The forecast is `y[T] + h * drift`, where drift is the average change in
/// the series `(y[T] - y[1]) / (T - 1)`, or zero for the plain walk. The
/// variance is `sigma^2 * (h + h^2 / (T - 1))` with drift and
/// `sigma^2 * h` without.
#[derive(Debug, Clone)]
pub struct RandomWalk {
    walk: SeasonalRandomWalk,
}

impl RandomWalk {
    pub fn new() -> Self {
        Self {
            walk: SeasonalRandomWalk::new(1),
        }
    }

    pub fn with_drift() -> Self {
        Self {
            walk: SeasonalRandomWalk::with_drift(1),
        }
    }

    /// Get the estimated drift parameter.
    pub fn drift(&self) -> Option<f64> {
        self.walk.slope()
    }
}

impl Default for RandomWalk {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for RandomWalk {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        self.walk.fit(values)
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.walk.predict(horizon)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.walk.fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.walk.residuals()
    }

    fn name(&self) -> &str {
        if self.walk.has_drift() {
            "RW-drift"
        } else {
            "RW"
        }
    }
}
