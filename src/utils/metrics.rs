//! Accuracy metrics for forecast evaluation.

use crate::error::{ForecastError, Result};
use crate::models::arima::{difference, seasonal_difference};
use crate::utils::stats::weighted_mean;
use serde::Serialize;

/// How the in-sample naive benchmark for MASE/RMSSE is built.
///
/// The training series is differenced `d` times at lag 1, then
/// `seasonal_d` times at lag `period`; the scale is the mean absolute value
/// (MASE) or root mean square (RMSSE) of what remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaseScale {
    pub period: usize,
    pub d: usize,
    pub seasonal_d: usize,
}

impl MaseScale {
    /// Seasonal naive benchmark for `period > 1`, naive benchmark otherwise.
    pub fn new(period: usize) -> Self {
        if period > 1 {
            Self {
                period,
                d: 0,
                seasonal_d: 1,
            }
        } else {
            Self {
                period: 1,
                d: 1,
                seasonal_d: 0,
            }
        }
    }

    /// Override the differencing orders.
    pub fn with_differencing(mut self, d: usize, seasonal_d: usize) -> Self {
        self.d = d;
        self.seasonal_d = seasonal_d;
        self
    }

    fn benchmark_errors(&self, train: &[f64]) -> Option<Vec<f64>> {
        let lag = self.period.max(1);
        if train.len() <= self.d + self.seasonal_d * lag {
            return None;
        }
        let diffed = difference(train, self.d);
        Some(seasonal_difference(&diffed, self.seasonal_d, lag))
    }

    /// Mean absolute benchmark error; None when undefined or zero.
    pub fn mae_scale(&self, train: &[f64]) -> Option<f64> {
        let errors = self.benchmark_errors(train)?;
        let scale = errors.iter().map(|e| e.abs()).sum::<f64>() / errors.len() as f64;
        (scale > 0.0 && scale.is_finite()).then_some(scale)
    }

    /// Mean squared benchmark error; None when undefined or zero.
    pub fn mse_scale(&self, train: &[f64]) -> Option<f64> {
        let errors = self.benchmark_errors(train)?;
        let scale = errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64;
        (scale > 0.0 && scale.is_finite()).then_some(scale)
    }
}

impl Default for MaseScale {
    fn default() -> Self {
        Self::new(12)
    }
}

/// Point accuracy metrics for one forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyMetrics {
    /// Mean error (actual - forecast).
    pub me: f64,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Mean percentage error (None if any actual is zero).
    pub mpe: Option<f64>,
    /// Mean absolute percentage error (None if any actual is zero).
    pub mape: Option<f64>,
    /// Symmetric mean absolute percentage error.
    pub smape: f64,
    /// Mean absolute scaled error (None without a usable training scale).
    pub mase: Option<f64>,
    /// Root mean squared scaled error (None without a usable training scale).
    pub rmsse: Option<f64>,
}

impl AccuracyMetrics {
    /// Average several metric sets with the given weights.
    ///
    /// Optional metrics are averaged over the sets where they are defined.
    pub fn average(items: &[(&AccuracyMetrics, f64)]) -> Option<AccuracyMetrics> {
        if items.is_empty() {
            return None;
        }
        let weights: Vec<f64> = items.iter().map(|(_, w)| *w).collect();
        let avg = |f: &dyn Fn(&AccuracyMetrics) -> f64| {
            let values: Vec<f64> = items.iter().map(|(m, _)| f(m)).collect();
            weighted_mean(&values, &weights)
        };
        let avg_opt = |f: &dyn Fn(&AccuracyMetrics) -> Option<f64>| {
            let (values, w): (Vec<f64>, Vec<f64>) = items
                .iter()
                .filter_map(|(m, w)| f(m).map(|v| (v, *w)))
                .unzip();
            (!values.is_empty()).then(|| weighted_mean(&values, &w))
        };

        Some(AccuracyMetrics {
            me: avg(&|m| m.me),
            mae: avg(&|m| m.mae),
            rmse: avg(&|m| m.rmse),
            mpe: avg_opt(&|m| m.mpe),
            mape: avg_opt(&|m| m.mape),
            smape: avg(&|m| m.smape),
            mase: avg_opt(&|m| m.mase),
            rmsse: avg_opt(&|m| m.rmsse),
        })
    }
}

/// Calculate accuracy metrics of `predicted` against `actual`.
///
/// `train` is the training series the scaled metrics are relative to.
pub fn calculate_metrics(
    actual: &[f64],
    predicted: &[f64],
    train: &[f64],
    scale: &MaseScale,
) -> Result<AccuracyMetrics> {
    if actual.is_empty() || predicted.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if actual.len() != predicted.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: predicted.len(),
        });
    }

    let n = actual.len() as f64;
    let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

    let me = errors.iter().sum::<f64>() / n;
    let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    let mse = errors.iter().map(|e| e * e).sum::<f64>() / n;

    let (mpe, mape) = if actual.contains(&0.0) {
        (None, None)
    } else {
        let pct: Vec<f64> = errors
            .iter()
            .zip(actual)
            .map(|(e, a)| 100.0 * e / a)
            .collect();
        (
            Some(pct.iter().sum::<f64>() / n),
            Some(pct.iter().map(|p| p.abs()).sum::<f64>() / n),
        )
    };

    let smape = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let denom = a.abs() + p.abs();
            if denom == 0.0 {
                0.0
            } else {
                2.0 * (a - p).abs() / denom
            }
        })
        .sum::<f64>()
        * 100.0
        / n;

    Ok(AccuracyMetrics {
        me,
        mae,
        rmse: mse.sqrt(),
        mpe,
        mape,
        smape,
        mase: scale.mae_scale(train).map(|s| mae / s),
        rmsse: scale.mse_scale(train).map(|s| (mse / s).sqrt()),
    })
}

/// Interval metrics at one coverage level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalScore {
    pub level: f64,
    /// Share of actuals inside the interval.
    pub coverage: f64,
    /// Mean Winkler score (width plus miss penalty); lower is better.
    pub winkler: f64,
}

/// Score prediction intervals at `level` against actual values.
pub fn interval_score(
    actual: &[f64],
    lower: &[f64],
    upper: &[f64],
    level: f64,
) -> Result<IntervalScore> {
    if actual.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    if lower.len() != actual.len() || upper.len() != actual.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: actual.len(),
            got: lower.len().min(upper.len()),
        });
    }

    let alpha = 1.0 - level;
    let mut inside = 0usize;
    let mut winkler = 0.0;
    for ((&a, &lo), &hi) in actual.iter().zip(lower).zip(upper) {
        let width = hi - lo;
        winkler += if a < lo {
            width + 2.0 / alpha * (lo - a)
        } else if a > hi {
            width + 2.0 / alpha * (a - hi)
        } else {
            inside += 1;
            width
        };
    }
    let n = actual.len() as f64;
    Ok(IntervalScore {
        level,
        coverage: inside as f64 / n,
        winkler: winkler / n,
    })
}
