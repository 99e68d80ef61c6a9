//! Forecasting models.

mod menu;
mod traits;

pub mod arima;
pub mod baseline;
pub mod exponential;

pub use traits::{BoxedForecaster, Forecaster, ModelMenu, ModelSpec};
