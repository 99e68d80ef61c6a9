//! Splitting a panel into training and validation windows.

use crate::core::{Month, Panel, SeriesKey};
use crate::error::{ForecastError, Result};
use tracing::{info, warn};

/// The two halves of a panel split at a cutoff month.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Last month of the training window.
    pub cutoff: Month,
    /// Observations at or before the cutoff, for keys that have any.
    pub train: Panel,
    /// Observations after the cutoff, for keys that have any.
    pub validation: Panel,
    /// Keys whose first observation falls after the cutoff.
    pub empty_training: Vec<SeriesKey>,
}

/// Split every series of `panel` at `cutoff`.
///
/// Training keeps months `<= cutoff`, validation keeps months `> cutoff`.
/// Keys left without training observations are reported in
/// [`Partition::empty_training`]; when that happens to every key the panel
/// cannot be fitted at all and an error is returned.
///
/// # Example
///
/// ```
/// use panel_forecast::core::{KeySchema, Month, Panel, SeriesKey};
/// use panel_forecast::partition::partition;
///
/// let start = Month::new(2017, 1).unwrap();
/// let mut builder = Panel::builder(KeySchema::new(["state"]));
/// builder.push_series(SeriesKey::new(["VIC"]), start, &[1.0, 2.0, 3.0, 4.0]).unwrap();
/// let panel = builder.build().unwrap();
///
/// let split = partition(&panel, Month::new(2017, 3).unwrap()).unwrap();
/// assert_eq!(split.train.n_observations(), 3);
/// assert_eq!(split.validation.n_observations(), 1);
/// ```
pub fn partition(panel: &Panel, cutoff: Month) -> Result<Partition> {
    let mut train = Panel::new(panel.schema().clone());
    let mut validation = Panel::new(panel.schema().clone());
    let mut empty_training = Vec::new();

    for (key, series) in panel.iter() {
        let (head, tail) = series.split_at_cutoff(cutoff);
        if head.is_empty() {
            empty_training.push(key.clone());
        } else {
            train.insert(key.clone(), head)?;
        }
        if !tail.is_empty() {
            validation.insert(key.clone(), tail)?;
        }
    }

    if train.is_empty() {
        return Err(ForecastError::EmptyTrainingPanel {
            cutoff: cutoff.to_string(),
        });
    }
    if !empty_training.is_empty() {
        warn!(
            keys = empty_training.len(),
            %cutoff,
            "keys have no training observations"
        );
    }
    info!(
        %cutoff,
        train_keys = train.len(),
        train_obs = train.n_observations(),
        validation_keys = validation.len(),
        validation_obs = validation.n_observations(),
        "partitioned panel"
    );

    Ok(Partition {
        cutoff,
        train,
        validation,
        empty_training,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::KeySchema;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn panel() -> Panel {
        let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
        builder
            .push_series(SeriesKey::new(["NSW", "Food"]), month(2016, 1), &[1.0; 24])
            .unwrap();
        builder
            .push_series(SeriesKey::new(["VIC", "Food"]), month(2017, 6), &[2.0; 6])
            .unwrap();
        builder
            .push_series(SeriesKey::new(["QLD", "Food"]), month(2018, 3), &[3.0; 4])
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn splits_at_cutoff_inclusive() {
        let split = partition(&panel(), month(2017, 6)).unwrap();

        let nsw = SeriesKey::new(["NSW", "Food"]);
        assert_eq!(split.train.get(&nsw).unwrap().last_month(), Some(month(2017, 6)));
        assert_eq!(
            split.validation.get(&nsw).unwrap().first_month(),
            Some(month(2017, 7))
        );

        // VIC ends exactly at the cutoff.
        let vic = SeriesKey::new(["VIC", "Food"]);
        assert_eq!(split.train.get(&vic).unwrap().len(), 1);
        assert!(split.validation.get(&vic).is_none());
    }

    #[test]
    fn reports_keys_without_training_data() {
        let split = partition(&panel(), month(2017, 12)).unwrap();
        assert_eq!(split.empty_training, vec![SeriesKey::new(["QLD", "Food"])]);
        assert!(split.train.get(&SeriesKey::new(["QLD", "Food"])).is_none());
        assert_eq!(
            split.validation.get(&SeriesKey::new(["QLD", "Food"])).unwrap().len(),
            4
        );
        assert_eq!(split.train.schema(), panel().schema());
    }

    #[test]
    fn union_of_halves_is_the_panel() {
        let original = panel();
        let split = partition(&original, month(2017, 9)).unwrap();
        assert_eq!(
            split.train.n_observations() + split.validation.n_observations(),
            original.n_observations()
        );
    }

    #[test]
    fn cutoff_before_all_data_is_structural() {
        let err = partition(&panel(), month(2015, 12)).unwrap_err();
        assert_eq!(
            err,
            ForecastError::EmptyTrainingPanel {
                cutoff: "2015 Dec".to_string()
            }
        );
    }
}
