//! Seasonal random walk, optionally with drift.
//!
//! Each forecast repeats the value observed one season earlier. With drift,
//! the mean change between seasons is added once per elapsed season.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;

/// Random walk at lag `period`, optionally with drift.
///
/// For `h` steps ahead with `k = (h - 1) / period` whole seasons already
/// elapsed, the forecast is `y[T + h - period * (k + 1)] + (k + 1) * b`,
/// where `b` is the mean lag-`period` difference (zero without drift).
/// The variance is `sigma^2 * (k + 1)`, plus `sigma^2 * (k + 1)^2 / n_eff`
/// for the uncertainty in `b`, with `n_eff = n - period` differences.
#[derive(Debug, Clone)]
pub struct SeasonalRandomWalk {
    period: usize,
    drift: bool,
    state: Option<WalkState>,
}

#[derive(Debug, Clone)]
struct WalkState {
    last_season: Vec<f64>,
    slope: f64,
    sigma: f64,
    n_eff: usize,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
}

impl SeasonalRandomWalk {
    /// Seasonal random walk without drift. A period of 0 is treated as 1.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            drift: false,
            state: None,
        }
    }

    pub fn with_drift(period: usize) -> Self {
        Self {
            drift: true,
            ..Self::new(period)
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn has_drift(&self) -> bool {
        self.drift
    }

    /// Estimated drift per season (zero without drift).
    pub fn slope(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.slope)
    }

    /// Residual standard deviation.
    pub fn sigma(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma)
    }
}

impl Forecaster for SeasonalRandomWalk {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        let lag = self.period;
        let needed = lag + if self.drift { 2 } else { 1 };
        if values.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let diffs: Vec<f64> = values
            .iter()
            .skip(lag)
            .zip(values)
            .map(|(curr, prev)| curr - prev)
            .collect();
        let n_eff = diffs.len();
        let slope = if self.drift {
            diffs.iter().sum::<f64>() / n_eff as f64
        } else {
            0.0
        };

        let mut fitted = vec![f64::NAN; lag];
        fitted.extend(values.iter().take(values.len() - lag).map(|y| y + slope));
        let residuals: Vec<f64> = values.iter().zip(&fitted).map(|(y, f)| y - f).collect();

        // The drift costs one degree of freedom.
        let dof = n_eff - usize::from(self.drift);
        let sse: f64 = diffs.iter().map(|d| (d - slope).powi(2)).sum();
        let sigma = (sse / dof as f64).sqrt();

        self.state = Some(WalkState {
            last_season: values[values.len() - lag..].to_vec(),
            slope,
            sigma,
            n_eff,
            fitted,
            residuals,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let lag = self.period;

        let mut mean = Vec::with_capacity(horizon);
        let mut std_error = Vec::with_capacity(horizon);
        for h in 1..=horizon {
            let seasons = ((h - 1) / lag + 1) as f64;
            mean.push(state.last_season[(h - 1) % lag] + seasons * state.slope);
            let mut var = seasons;
            if self.drift {
                var += seasons * seasons / state.n_eff as f64;
            }
            std_error.push(state.sigma * var.sqrt());
        }
        Forecast::from_parts(mean, std_error)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        if self.drift {
            "SNAIVE-drift"
        } else {
            "SNAIVE"
        }
    }

    fn describe(&self) -> String {
        format!("{}(period={})", self.name(), self.period)
    }
}
