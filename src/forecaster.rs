//! Forecasting every fitted model over its key's validation months.
//!
//! Forecasts are produced on the model scale as a normal predictive
//! distribution and mapped back to the original scale: interval bounds
//! through the (monotone) inverse transform, the point estimate either as
//! the bias-adjusted mean or as the back-transformed median.

use crate::core::{Month, Panel, Series, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::trainer::{FitOutcome, FittedModel, ModelTable};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::{info, warn};

/// Which summary of the back-transformed distribution is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointEstimate {
    /// Bias-adjusted mean.
    #[default]
    Mean,
    /// Inverse transform of the model-scale mean.
    Median,
}

/// Settings of the forecasting stage.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Interval coverage levels in (0, 1).
    pub levels: Vec<f64>,
    pub point: PointEstimate,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            levels: vec![0.8, 0.95],
            point: PointEstimate::Mean,
        }
    }
}

impl ForecastConfig {
    pub fn with_levels(mut self, levels: Vec<f64>) -> Self {
        self.levels = levels;
        self
    }

    pub fn with_point(mut self, point: PointEstimate) -> Self {
        self.point = point;
        self
    }

    pub fn validate(&self) -> Result<()> {
        match self.levels.iter().find(|l| !(**l > 0.0 && **l < 1.0)) {
            Some(level) => Err(ForecastError::InvalidParameter(format!(
                "interval level must be in (0, 1), got {}",
                level
            ))),
            None => Ok(()),
        }
    }
}

/// Prediction interval at one level, on the original scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBound {
    pub level: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IntervalBound {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Forecast for one validation month.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastPoint {
    pub month: Month,
    /// Point estimate on the original scale.
    pub point: f64,
    /// Standard error on the model scale.
    pub std_error: f64,
    pub intervals: Vec<IntervalBound>,
}

impl ForecastPoint {
    pub fn interval(&self, level: f64) -> Option<&IntervalBound> {
        self.intervals.iter().find(|b| (b.level - level).abs() < 1e-12)
    }
}

/// All validation-month forecasts of one (key, model) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub key: SeriesKey,
    pub model: String,
    pub points: Vec<ForecastPoint>,
}

impl SeriesForecast {
    pub fn months(&self) -> Vec<Month> {
        self.points.iter().map(|p| p.month).collect()
    }

    pub fn point_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.point).collect()
    }

    pub fn point_at(&self, month: Month) -> Option<&ForecastPoint> {
        self.points.iter().find(|p| p.month == month)
    }

    /// Lower and upper bounds at `level`, if that level was computed.
    pub fn interval(&self, level: f64) -> Option<(Vec<f64>, Vec<f64>)> {
        self.points
            .iter()
            .map(|p| p.interval(level).map(|b| (b.lower, b.upper)))
            .collect::<Option<Vec<_>>>()
            .map(|bounds| bounds.into_iter().unzip())
    }
}

/// A (key, model) pair that could not be forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastFailure {
    pub key: SeriesKey,
    pub model: String,
    pub error: ForecastError,
}

/// Forecasts of every (key, model) pair with validation data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastTable {
    levels: Vec<f64>,
    forecasts: Vec<SeriesForecast>,
    failures: Vec<ForecastFailure>,
}

#[derive(Serialize)]
struct ForecastRow<'a> {
    key: String,
    model: &'a str,
    month: Month,
    point: f64,
    std_error: f64,
    level: Option<f64>,
    lower: Option<f64>,
    upper: Option<f64>,
}

#[derive(Serialize)]
struct FailureRow<'a> {
    key: String,
    model: &'a str,
    error: String,
}

impl ForecastTable {
    /// Interval levels every forecast carries.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    pub fn forecasts(&self) -> &[SeriesForecast] {
        &self.forecasts
    }

    pub fn failures(&self) -> &[ForecastFailure] {
        &self.failures
    }

    pub fn get(&self, key: &SeriesKey, model: &str) -> Option<&SeriesForecast> {
        self.forecasts
            .iter()
            .find(|f| &f.key == key && f.model == model)
    }

    pub fn failure(&self, key: &SeriesKey, model: &str) -> Option<&ForecastError> {
        self.failures
            .iter()
            .find(|f| &f.key == key && f.model == model)
            .map(|f| &f.error)
    }

    /// Distinct model names, in first-seen order.
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        let all = self
            .forecasts
            .iter()
            .map(|f| f.model.as_str())
            .chain(self.failures.iter().map(|f| f.model.as_str()));
        for name in all {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Number of (key, model, month) rows.
    pub fn n_rows(&self) -> usize {
        self.forecasts.iter().map(|f| f.points.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.forecasts.is_empty() && self.failures.is_empty()
    }

    /// Write one CSV row per (key, model, month, level).
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        for forecast in &self.forecasts {
            let key = forecast.key.to_string();
            for point in &forecast.points {
                let row = |bound: Option<&IntervalBound>| ForecastRow {
                    key: key.clone(),
                    model: &forecast.model,
                    month: point.month,
                    point: point.point,
                    std_error: point.std_error,
                    level: bound.map(|b| b.level),
                    lower: bound.map(|b| b.lower),
                    upper: bound.map(|b| b.upper),
                };
                if point.intervals.is_empty() {
                    out.serialize(row(None))?;
                }
                for bound in &point.intervals {
                    out.serialize(row(Some(bound)))?;
                }
            }
        }
        out.flush().map_err(|e| ForecastError::Output(e.to_string()))
    }

    /// Write one CSV row per failed (key, model) pair.
    pub fn write_failures_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        for failure in &self.failures {
            out.serialize(FailureRow {
                key: failure.key.to_string(),
                model: &failure.model,
                error: failure.error.to_string(),
            })?;
        }
        out.flush().map_err(|e| ForecastError::Output(e.to_string()))
    }
}

/// Forecast every fitted model over the validation months of its key.
///
/// Pairs whose fit failed, and validation keys that were never trained,
/// yield a [`ForecastError::ModelUnavailable`] failure for each model.
pub fn forecast(
    models: &ModelTable,
    validation: &Panel,
    config: &ForecastConfig,
) -> Result<ForecastTable> {
    config.validate()?;
    let mut table = ForecastTable {
        levels: config.levels.clone(),
        ..Default::default()
    };

    for (key, actuals) in validation.iter() {
        for model in models.model_names() {
            let result = match models.get(key, model) {
                Some(FitOutcome::Fitted(fitted)) => forecast_series(fitted, actuals, config),
                Some(FitOutcome::Failed(_)) | None => Err(ForecastError::ModelUnavailable {
                    key: key.to_string(),
                    model: model.clone(),
                }),
            };
            match result {
                Ok(points) => table.forecasts.push(SeriesForecast {
                    key: key.clone(),
                    model: model.clone(),
                    points,
                }),
                Err(error) => {
                    warn!(%key, %model, %error, "no forecast");
                    table.failures.push(ForecastFailure {
                        key: key.clone(),
                        model: model.clone(),
                        error,
                    });
                }
            }
        }
    }

    info!(
        forecasts = table.forecasts.len(),
        rows = table.n_rows(),
        failures = table.failures.len(),
        "forecast validation window"
    );
    Ok(table)
}

fn forecast_series(
    fitted: &FittedModel,
    actuals: &Series,
    config: &ForecastConfig,
) -> Result<Vec<ForecastPoint>> {
    let origin = fitted.last_month();
    let end = actuals.last_month().ok_or(ForecastError::EmptyData)?;
    let horizon = origin.months_until(end);
    if horizon < 1 {
        return Err(ForecastError::TimestampError(format!(
            "validation ends at {} but training ends at {}",
            end, origin
        )));
    }

    let forecast = fitted.model().predict(horizon as usize)?;
    let bounds = config
        .levels
        .iter()
        .map(|&level| forecast.interval(level).map(|(lo, hi)| (level, lo, hi)))
        .collect::<Result<Vec<_>>>()?;
    let transform = fitted.transform();

    actuals
        .months()
        .iter()
        .map(|&month| {
            let step = origin.months_until(month);
            if step < 1 {
                return Err(ForecastError::TimestampError(format!(
                    "validation month {} is not after training end {}",
                    month, origin
                )));
            }
            let idx = step as usize - 1;
            let mu = forecast.mean()[idx];
            let se = forecast.std_error()[idx];
            let point = match config.point {
                PointEstimate::Mean => transform.inverse_mean(mu, se),
                PointEstimate::Median => transform.inverse(mu),
            };
            if !point.is_finite() {
                return Err(ForecastError::ComputationError(format!(
                    "non-finite forecast at {}",
                    month
                )));
            }
            let intervals = bounds
                .iter()
                .map(|(level, lo, hi)| IntervalBound {
                    level: *level,
                    lower: transform.inverse(lo[idx]),
                    upper: transform.inverse(hi[idx]),
                })
                .collect();
            Ok(ForecastPoint {
                month,
                point,
                std_error: se,
                intervals,
            })
        })
        .collect()
}
