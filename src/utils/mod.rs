//! Numerical helpers shared by the models and the evaluator.

pub mod metrics;
pub mod optimization;
pub mod stats;

pub use metrics::{calculate_metrics, interval_score, AccuracyMetrics, IntervalScore, MaseScale};
pub use optimization::{nelder_mead, NelderMeadConfig, NelderMeadResult};
pub use stats::quantile_normal;
