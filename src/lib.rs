//! # panel-forecast
//!
//! Many-models forecasting over a panel of monthly series.
//!
//! A panel holds one series per key (e.g. state x industry). A workflow
//! pass splits it at a cutoff month, fits every model of a menu to every
//! key independently, forecasts each key's validation months with
//! prediction intervals on the original scale, and scores the forecasts
//! per key and on series aggregated to coarser groupings.
//!
//! The stages can be driven one by one:
//!
//! ```
//! use panel_forecast::prelude::*;
//!
//! let values: Vec<f64> = (0..48)
//!     .map(|t| 200.0 + 2.0 * t as f64 + ((t * 7) % 5) as f64)
//!     .collect();
//! let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
//! builder
//!     .push_series(SeriesKey::new(["VIC", "Food"]), Month::new(2014, 1).unwrap(), &values)
//!     .unwrap();
//! let panel = builder.build().unwrap();
//!
//! let split = partition(&panel, Month::new(2016, 12).unwrap()).unwrap();
//! let models = Trainer::new(ModelMenu::standard(12), Executor::sequential()).train(&split.train);
//! let forecasts = forecast(&models, &split.validation, &ForecastConfig::default()).unwrap();
//! let accuracy = Evaluator::new(MaseScale::new(12))
//!     .per_series(&forecasts, &split.train, &split.validation);
//! assert_eq!(accuracy.len(), 5);
//! ```
//!
//! or all at once through [`pipeline::Workflow`].

#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::needless_range_loop)]

pub mod accuracy;
pub mod config;
pub mod core;
pub mod error;
pub mod executor;
pub mod forecaster;
pub mod models;
pub mod partition;
pub mod pipeline;
pub mod trainer;
pub mod transform;
pub mod utils;

pub use error::{ForecastError, Result};

pub mod prelude {
    pub use crate::accuracy::{Aggregation, Averaging, Evaluator};
    pub use crate::config::WorkflowConfig;
    pub use crate::core::{Forecast, KeySchema, Month, Panel, Series, SeriesKey};
    pub use crate::error::{ForecastError, Result};
    pub use crate::executor::Executor;
    pub use crate::forecaster::{forecast, ForecastConfig, PointEstimate};
    pub use crate::models::{Forecaster, ModelMenu, ModelSpec};
    pub use crate::partition::partition;
    pub use crate::pipeline::Workflow;
    pub use crate::trainer::Trainer;
    pub use crate::transform::Transform;
    pub use crate::utils::{calculate_metrics, quantile_normal, AccuracyMetrics, MaseScale};
}
