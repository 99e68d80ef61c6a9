//! Core data structures: months, keys, series, panels and forecasts.

mod forecast;
mod key;
mod month;
mod panel;
mod series;

pub use forecast::Forecast;
pub use key::{KeySchema, SeriesKey};
pub use month::Month;
pub use panel::{Panel, PanelBuilder};
pub use series::Series;
