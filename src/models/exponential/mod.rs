//! Exponential smoothing models.
//!
//! This module provides:
//! - ETS (Error-Trend-Seasonal) state-space models
//! - AutoETS (automatic model selection by AICc)

mod auto_ets;
mod ets;

pub use auto_ets::{AutoETS, AutoETSConfig};
pub use ets::{ETSSpec, ErrorType, SeasonalType, SmoothingParams, TrendType, ETS};
