//! Seasonal ARIMA models.
//!
//! This module provides:
//! - ARIMA(p, d, q)(P, D, Q)\[s\] estimated by conditional sum of squares
//! - AutoARIMA for automatic differencing and order selection
//! - differencing and unit-root helpers shared with the accuracy metrics

mod auto_arima;
mod diff;
mod model;
mod unitroot;

pub use auto_arima::{AutoARIMA, AutoARIMAConfig};
pub use diff::{difference, seasonal_difference};
pub use model::{ARIMASpec, ARIMA};
pub use unitroot::{kpss_statistic, ndiffs, nsdiffs, seasonal_strength};
