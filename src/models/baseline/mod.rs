//! Baseline forecasting models.
//!
//! Random walks at lag 1 and lag one season, with or without drift. They
//! are the benchmarks the statistical models have to beat.

mod random_walk;
mod seasonal_random_walk;

pub use random_walk::RandomWalk;
pub use seasonal_random_walk::SeasonalRandomWalk;
