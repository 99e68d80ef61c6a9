//! Workflow configuration, deserialised from TOML.
//!
//! ```toml
//! cutoff = "2017 Dec"
//! seasonal_period = 12
//! levels = [0.8, 0.95]
//! point_estimate = "mean"
//! threads = 4
//!
//! [mase]
//! d = 0
//! seasonal_d = 1
//!
//! [models.ets_fixed]
//! family = "ets"
//! ets = "M,Ad,M"
//!
//! [[aggregations]]
//! keep = ["state"]
//! ```

use crate::accuracy::{Aggregation, Averaging};
use crate::core::Month;
use crate::error::{ForecastError, Result};
use crate::forecaster::{ForecastConfig, PointEstimate};
use crate::utils::metrics::MaseScale;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Model family named by a `[models.<name>]` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    /// Random walk.
    RandomWalk,
    /// Random walk with drift.
    Drift,
    /// Seasonal random walk.
    SeasonalNaive,
    /// Seasonal random walk with drift.
    SeasonalDrift,
    /// ARIMA with fixed orders.
    Arima,
    /// ARIMA with automatic order selection.
    AutoArima,
    /// ETS with fixed components.
    Ets,
    /// ETS with automatic component selection.
    AutoEts,
}

/// One named entry of the model menu.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelConfig {
    pub family: ModelFamily,
    /// `identity`, `log` or `box_cox`.
    #[serde(default)]
    pub transform: Option<String>,
    /// Box-Cox lambda.
    #[serde(default)]
    pub lambda: Option<f64>,
    /// ETS components for the `ets` family, e.g. `"M,Ad,M"`.
    #[serde(default)]
    pub ets: Option<String>,
    /// Non-seasonal (p, d, q) for the `arima` family.
    #[serde(default)]
    pub order: Option<[usize; 3]>,
    /// Seasonal (P, D, Q) for the `arima` family.
    #[serde(default)]
    pub seasonal_order: Option<[usize; 3]>,
    /// Constant term for the `arima` family.
    #[serde(default)]
    pub constant: Option<bool>,
}

impl ModelConfig {
    pub fn new(family: ModelFamily) -> Self {
        Self {
            family,
            transform: None,
            lambda: None,
            ets: None,
            order: None,
            seasonal_order: None,
            constant: None,
        }
    }
}

/// Differencing of the MASE/RMSSE benchmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MaseConfig {
    #[serde(default)]
    pub d: usize,
    #[serde(default = "default_seasonal_d")]
    pub seasonal_d: usize,
}

fn default_seasonal_d() -> usize {
    1
}

/// A coarser grouping to evaluate on.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AggregationConfig {
    /// Key labels that survive; the rest are summed over. Empty for the total.
    #[serde(default)]
    pub keep: Vec<String>,
}

/// Top-level settings of one analysis pass.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowConfig {
    /// Last training month.
    pub cutoff: Month,
    #[serde(default = "default_period")]
    pub seasonal_period: usize,
    #[serde(default = "default_levels")]
    pub levels: Vec<f64>,
    #[serde(default)]
    pub point_estimate: PointEstimate,
    /// Worker threads; absent runs the fits sequentially.
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub mase: Option<MaseConfig>,
    /// Model menu; empty means the standard menu.
    #[serde(default)]
    pub models: BTreeMap<String, ModelConfig>,
    #[serde(default)]
    pub aggregations: Vec<AggregationConfig>,
    /// Labels to group the per-series summary by.
    #[serde(default)]
    pub summarise_by: Vec<String>,
    #[serde(default)]
    pub averaging: Averaging,
}

fn default_period() -> usize {
    12
}

fn default_levels() -> Vec<f64> {
    vec![0.8, 0.95]
}

impl WorkflowConfig {
    /// Default settings for a cutoff month.
    pub fn new(cutoff: Month) -> Self {
        Self {
            cutoff,
            seasonal_period: default_period(),
            levels: default_levels(),
            point_estimate: PointEstimate::default(),
            threads: None,
            mase: None,
            models: BTreeMap::new(),
            aggregations: Vec::new(),
            summarise_by: Vec::new(),
            averaging: Averaging::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.seasonal_period == 0 {
            return Err(ForecastError::Config(
                "seasonal_period must be at least 1".to_string(),
            ));
        }
        if let Some(level) = self.levels.iter().find(|l| !(**l > 0.0 && **l < 1.0)) {
            return Err(ForecastError::Config(format!(
                "interval level {} is outside (0, 1)",
                level
            )));
        }
        if self.threads == Some(0) {
            return Err(ForecastError::Config(
                "threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn forecast_config(&self) -> ForecastConfig {
        ForecastConfig {
            levels: self.levels.clone(),
            point: self.point_estimate,
        }
    }

    /// The configured aggregations.
    pub fn aggregation_list(&self) -> Vec<Aggregation> {
        self.aggregations
            .iter()
            .map(|a| Aggregation::keep(a.keep.iter().cloned()))
            .collect()
    }

    pub fn mase_scale(&self) -> MaseScale {
        let scale = MaseScale::new(self.seasonal_period);
        match self.mase {
            Some(m) => scale.with_differencing(m.d, m.seasonal_d),
            None => scale,
        }
    }
}
