//! A single monthly series: the observations of one key.

use crate::core::Month;
use crate::error::{ForecastError, Result};

/// Observations of one key, ordered by strictly increasing month.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Series {
    months: Vec<Month>,
    values: Vec<f64>,
}

impl Series {
    /// Create a series, validating ordering and finiteness.
    pub fn new(months: Vec<Month>, values: Vec<f64>) -> Result<Self> {
        if months.len() != values.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: months.len(),
                got: values.len(),
            });
        }
        if let Some(w) = months.windows(2).find(|w| w[1] <= w[0]) {
            return Err(ForecastError::TimestampError(format!(
                "months must be strictly increasing: {} followed by {}",
                w[0], w[1]
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::MissingValues);
        }
        Ok(Self { months, values })
    }

    /// Create a gap-free series starting at `start`.
    pub fn from_start(start: Month, values: Vec<f64>) -> Result<Self> {
        let months = (0..values.len()).map(|i| start.offset(i as i32)).collect();
        Self::new(months, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn months(&self) -> &[Month] {
        &self.months
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_month(&self) -> Option<Month> {
        self.months.first().copied()
    }

    pub fn last_month(&self) -> Option<Month> {
        self.months.last().copied()
    }

    /// Value observed at `month`, if any.
    pub fn value_at(&self, month: Month) -> Option<f64> {
        self.months
            .binary_search(&month)
            .ok()
            .map(|i| self.values[i])
    }

    /// Number of months missing between the first and last observation.
    pub fn missing_months(&self) -> usize {
        match (self.first_month(), self.last_month()) {
            (Some(first), Some(last)) => {
                (first.months_until(last) as usize + 1).saturating_sub(self.len())
            }
            _ => 0,
        }
    }

    /// True when there are no holes in the monthly index.
    pub fn is_regular(&self) -> bool {
        self.missing_months() == 0
    }

    /// Split into (month <= cutoff, month > cutoff).
    pub fn split_at_cutoff(&self, cutoff: Month) -> (Series, Series) {
        let idx = self.months.partition_point(|&m| m <= cutoff);
        (
            Series {
                months: self.months[..idx].to_vec(),
                values: self.values[..idx].to_vec(),
            },
            Series {
                months: self.months[idx..].to_vec(),
                values: self.values[idx..].to_vec(),
            },
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (Month, f64)> + '_ {
        self.months.iter().copied().zip(self.values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    #[test]
    fn series_rejects_unordered_or_duplicate_months() {
        let dup = Series::new(vec![month(2020, 1), month(2020, 1)], vec![1.0, 2.0]);
        assert!(matches!(dup, Err(ForecastError::TimestampError(_))));

        let backwards = Series::new(vec![month(2020, 2), month(2020, 1)], vec![1.0, 2.0]);
        assert!(backwards.is_err());

        let mismatch = Series::new(vec![month(2020, 1)], vec![1.0, 2.0]);
        assert!(matches!(
            mismatch,
            Err(ForecastError::DimensionMismatch { .. })
        ));

        let nan = Series::new(vec![month(2020, 1)], vec![f64::NAN]);
        assert!(matches!(nan, Err(ForecastError::MissingValues)));
    }

    #[test]
    fn series_detects_gaps() {
        let regular = Series::from_start(month(2020, 1), vec![1.0, 2.0, 3.0]).unwrap();
        assert!(regular.is_regular());

        let gappy = Series::new(
            vec![month(2020, 1), month(2020, 2), month(2020, 6)],
            vec![1.0, 2.0, 3.0],
        )
        .unwrap();
        assert_eq!(gappy.missing_months(), 3);
        assert!(!gappy.is_regular());
    }

    #[test]
    fn series_split_is_exact_at_cutoff() {
        let series = Series::from_start(month(2019, 11), vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let (train, valid) = series.split_at_cutoff(month(2019, 12));
        assert_eq!(train.values(), &[1.0, 2.0]);
        assert_eq!(valid.values(), &[3.0, 4.0]);
        assert_eq!(valid.first_month(), Some(month(2020, 1)));

        let (train, valid) = series.split_at_cutoff(month(2010, 1));
        assert!(train.is_empty());
        assert_eq!(valid.len(), 4);
    }

    #[test]
    fn series_value_lookup() {
        let series = Series::from_start(month(2019, 11), vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(series.value_at(month(2020, 1)), Some(3.0));
        assert_eq!(series.value_at(month(2020, 2)), None);
    }
}
