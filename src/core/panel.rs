//! Panel: a keyed collection of monthly series sharing one schema.

use crate::core::{KeySchema, Month, Series, SeriesKey};
use crate::error::{ForecastError, Result};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// A collection of series indexed by key, iterated in key order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Panel {
    schema: KeySchema,
    series: BTreeMap<SeriesKey, Series>,
}

impl Panel {
    /// Create an empty panel.
    pub fn new(schema: KeySchema) -> Self {
        Self {
            schema,
            series: BTreeMap::new(),
        }
    }

    /// Start building a panel from individual observations.
    pub fn builder(schema: KeySchema) -> PanelBuilder {
        PanelBuilder {
            schema,
            rows: BTreeMap::new(),
        }
    }

    /// Add a whole series. Fails on arity mismatch or an existing key.
    pub fn insert(&mut self, key: SeriesKey, series: Series) -> Result<()> {
        check_arity(&self.schema, &key)?;
        match self.series.entry(key) {
            Entry::Occupied(entry) => Err(ForecastError::InvalidParameter(format!(
                "duplicate key {}",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(series);
                Ok(())
            }
        }
    }

    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    /// Number of series.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Total number of observations across all series.
    pub fn n_observations(&self) -> usize {
        self.series.values().map(Series::len).sum()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Series> {
        self.series.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &Series)> {
        self.series.iter()
    }

    /// Earliest month observed in any series.
    pub fn first_month(&self) -> Option<Month> {
        self.series.values().filter_map(Series::first_month).min()
    }

    /// Latest month observed in any series.
    pub fn last_month(&self) -> Option<Month> {
        self.series.values().filter_map(Series::last_month).max()
    }
}

/// Accumulates (key, month, value) observations into a [`Panel`].
#[derive(Debug, Clone)]
pub struct PanelBuilder {
    schema: KeySchema,
    rows: BTreeMap<SeriesKey, BTreeMap<Month, f64>>,
}

impl PanelBuilder {
    /// Add one observation. Duplicate (key, month) pairs are rejected.
    pub fn push(&mut self, key: SeriesKey, month: Month, value: f64) -> Result<()> {
        check_arity(&self.schema, &key)?;
        let rows = self.rows.entry(key).or_default();
        if rows.insert(month, value).is_some() {
            return Err(ForecastError::TimestampError(format!(
                "duplicate observation at {}",
                month
            )));
        }
        Ok(())
    }

    /// Add a gap-free run of values starting at `start`.
    pub fn push_series(&mut self, key: SeriesKey, start: Month, values: &[f64]) -> Result<()> {
        for (i, &value) in values.iter().enumerate() {
            self.push(key.clone(), start.offset(i as i32), value)?;
        }
        Ok(())
    }

    pub fn build(self) -> Result<Panel> {
        let mut panel = Panel::new(self.schema);
        for (key, rows) in self.rows {
            let (months, values): (Vec<Month>, Vec<f64>) = rows.into_iter().unzip();
            panel.insert(key, Series::new(months, values)?)?;
        }
        Ok(panel)
    }
}

fn check_arity(schema: &KeySchema, key: &SeriesKey) -> Result<()> {
    if key.len() != schema.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: schema.len(),
            got: key.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    #[test]
    fn builder_groups_observations_by_key() {
        let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
        let vic = SeriesKey::new(["Victoria", "Food"]);
        let nsw = SeriesKey::new(["NSW", "Food"]);

        builder.push(vic.clone(), month(2020, 2), 2.0).unwrap();
        builder.push(vic.clone(), month(2020, 1), 1.0).unwrap();
        builder.push_series(nsw.clone(), month(2019, 6), &[5.0, 6.0, 7.0]).unwrap();

        let panel = builder.build().unwrap();
        assert_eq!(panel.len(), 2);
        assert_eq!(panel.n_observations(), 5);
        assert_eq!(panel.get(&vic).unwrap().values(), &[1.0, 2.0]);
        assert_eq!(panel.first_month(), Some(month(2019, 6)));
        assert_eq!(panel.last_month(), Some(month(2020, 2)));

        let keys: Vec<_> = panel.keys().cloned().collect();
        assert_eq!(keys, vec![nsw, vic]);
    }

    #[test]
    fn builder_rejects_duplicates_and_bad_arity() {
        let mut builder = Panel::builder(KeySchema::new(["state"]));
        let key = SeriesKey::new(["Victoria"]);
        builder.push(key.clone(), month(2020, 1), 1.0).unwrap();
        assert!(builder.push(key, month(2020, 1), 2.0).is_err());

        let wide = SeriesKey::new(["Victoria", "Food"]);
        assert!(matches!(
            builder.push(wide, month(2020, 1), 1.0),
            Err(ForecastError::DimensionMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn insert_rejects_existing_key() {
        let mut panel = Panel::new(KeySchema::new(["state"]));
        let key = SeriesKey::new(["Victoria"]);
        let series = Series::from_start(month(2020, 1), vec![1.0]).unwrap();
        panel.insert(key.clone(), series.clone()).unwrap();
        assert!(panel.insert(key, series).is_err());
    }
}
