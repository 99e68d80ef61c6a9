//! Scoring forecasts against validation actuals.
//!
//! Accuracy is computed per (key, model) and on series aggregated to a
//! coarser grouping. A key only contributes to an aggregate for a model
//! when it has both validation actuals and a forecast from that model;
//! keys without either are left out rather than counted as zero.

use crate::core::{KeySchema, Month, Panel, Series, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::forecaster::{ForecastTable, SeriesForecast};
use crate::utils::metrics::{
    calculate_metrics, interval_score, AccuracyMetrics, IntervalScore, MaseScale,
};
use crate::utils::stats::weighted_mean;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use tracing::{debug, info, warn};

/// The key labels an aggregate keeps; every other label is summed over.
///
/// # Example
///
/// ```
/// use panel_forecast::accuracy::Aggregation;
///
/// assert_eq!(Aggregation::keep(["state"]).to_string(), "state");
/// assert_eq!(Aggregation::total().to_string(), "<total>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregation {
    keep: Vec<String>,
}

impl Aggregation {
    pub fn keep<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keep: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Sum over every label.
    pub fn total() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> &[String] {
        &self.keep
    }

    /// Schema of the aggregated keys.
    pub fn schema(&self, schema: &KeySchema) -> Result<KeySchema> {
        schema.project(&self.keep)
    }

    /// Sum every series of `panel` into its group, month by month.
    pub fn apply(&self, panel: &Panel) -> Result<Panel> {
        let positions = panel.schema().projection(&self.keep)?;
        let mut groups: BTreeMap<SeriesKey, Vec<&Series>> = BTreeMap::new();
        for (key, series) in panel.iter() {
            groups.entry(key.project(&positions)).or_default().push(series);
        }
        let mut out = Panel::new(self.schema(panel.schema())?);
        for (group, members) in groups {
            out.insert(group, sum_series(members)?)?;
        }
        Ok(out)
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keep.is_empty() {
            write!(f, "<total>")
        } else {
            write!(f, "{}", self.keep.join("/"))
        }
    }
}

/// Sum of the members' values at every month any of them observes.
fn sum_series<'a, I>(members: I) -> Result<Series>
where
    I: IntoIterator<Item = &'a Series>,
{
    let mut totals: BTreeMap<Month, f64> = BTreeMap::new();
    for series in members {
        for (month, value) in series.iter() {
            *totals.entry(month).or_insert(0.0) += value;
        }
    }
    let (months, values) = totals.into_iter().unzip();
    Series::new(months, values)
}

/// Sum of the members over the months every one of them observes.
///
/// A member that starts late or ends early narrows the window instead of
/// contributing zeros outside its own range.
fn common_window_sum<'a, I>(members: I) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Series>,
{
    let mut totals: BTreeMap<Month, (usize, f64)> = BTreeMap::new();
    let mut n_members = 0;
    for series in members {
        n_members += 1;
        for (month, value) in series.iter() {
            let entry = totals.entry(month).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += value;
        }
    }
    totals
        .into_values()
        .filter(|&(count, _)| count == n_members)
        .map(|(_, total)| total)
        .collect()
}

/// How per-key accuracy is averaged in a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Every key counts the same.
    #[default]
    Mean,
    /// Keys are weighted by the mean absolute level of their actuals.
    WeightedByMagnitude,
}

/// Accuracy of one model on one key or aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyRecord {
    pub key: SeriesKey,
    pub model: String,
    /// Number of scored months.
    pub n: usize,
    /// Number of keys summed into this record.
    pub n_series: usize,
    /// Mean absolute actual over the scored months.
    pub magnitude: f64,
    pub metrics: AccuracyMetrics,
    /// One score per interval level; empty for aggregates.
    pub intervals: Vec<IntervalScore>,
}

/// Average of several records for one (group, model).
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracySummary {
    pub group: SeriesKey,
    pub model: String,
    /// Scored months over all members.
    pub n: usize,
    pub n_series: usize,
    pub metrics: AccuracyMetrics,
    pub intervals: Vec<IntervalScore>,
}

#[derive(Serialize)]
struct MetricsRow<'a> {
    key: String,
    model: &'a str,
    n: usize,
    n_series: usize,
    me: f64,
    mae: f64,
    rmse: f64,
    mpe: Option<f64>,
    mape: Option<f64>,
    smape: f64,
    mase: Option<f64>,
    rmsse: Option<f64>,
}

impl<'a> MetricsRow<'a> {
    fn new(
        key: &SeriesKey,
        model: &'a str,
        n: usize,
        n_series: usize,
        m: &AccuracyMetrics,
    ) -> Self {
        Self {
            key: key.to_string(),
            model,
            n,
            n_series,
            me: m.me,
            mae: m.mae,
            rmse: m.rmse,
            mpe: m.mpe,
            mape: m.mape,
            smape: m.smape,
            mase: m.mase,
            rmsse: m.rmsse,
        }
    }
}

#[derive(Serialize)]
struct IntervalRow<'a> {
    key: String,
    model: &'a str,
    level: f64,
    coverage: f64,
    winkler: f64,
}

fn write_interval_rows<'a, W, I>(writer: W, rows: I) -> Result<()>
where
    W: io::Write,
    I: IntoIterator<Item = (&'a SeriesKey, &'a str, &'a [IntervalScore])>,
{
    let mut out = csv::Writer::from_writer(writer);
    for (key, model, scores) in rows {
        for score in scores {
            out.serialize(IntervalRow {
                key: key.to_string(),
                model,
                level: score.level,
                coverage: score.coverage,
                winkler: score.winkler,
            })?;
        }
    }
    out.flush().map_err(|e| ForecastError::Output(e.to_string()))
}

/// Accuracy records sharing one key schema.
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyTable {
    schema: KeySchema,
    records: Vec<AccuracyRecord>,
}

impl AccuracyTable {
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn records(&self) -> &[AccuracyRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &SeriesKey, model: &str) -> Option<&AccuracyRecord> {
        self.records
            .iter()
            .find(|r| &r.key == key && r.model == model)
    }

    /// Average the records of each model within groups of `group_by`
    /// labels; an empty `group_by` averages over all keys.
    pub fn summarise<S: AsRef<str>>(
        &self,
        group_by: &[S],
        averaging: Averaging,
    ) -> Result<SummaryTable> {
        let positions = self.schema.projection(group_by)?;
        let mut groups: BTreeMap<(SeriesKey, &str), Vec<&AccuracyRecord>> = BTreeMap::new();
        for record in &self.records {
            groups
                .entry((record.key.project(&positions), record.model.as_str()))
                .or_default()
                .push(record);
        }

        let mut rows = Vec::with_capacity(groups.len());
        for ((group, model), members) in groups {
            let weighted: Vec<(&AccuracyRecord, f64)> = members
                .iter()
                .map(|r| {
                    let w = match averaging {
                        Averaging::Mean => 1.0,
                        Averaging::WeightedByMagnitude => r.magnitude,
                    };
                    (*r, w)
                })
                .collect();
            let metric_items: Vec<(&AccuracyMetrics, f64)> =
                weighted.iter().map(|(r, w)| (&r.metrics, *w)).collect();
            let Some(metrics) = AccuracyMetrics::average(&metric_items) else {
                continue;
            };
            rows.push(AccuracySummary {
                group,
                model: model.to_string(),
                n: members.iter().map(|r| r.n).sum(),
                n_series: members.len(),
                metrics,
                intervals: average_interval_scores(&weighted),
            });
        }
        Ok(SummaryTable {
            schema: self.schema.project(group_by)?,
            rows,
        })
    }

    /// Write one CSV row of point metrics per record.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        for r in &self.records {
            out.serialize(MetricsRow::new(&r.key, &r.model, r.n, r.n_series, &r.metrics))?;
        }
        out.flush().map_err(|e| ForecastError::Output(e.to_string()))
    }

    /// Write one CSV row per (record, interval level).
    pub fn write_intervals_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        write_interval_rows(
            writer,
            self.records
                .iter()
                .map(|r| (&r.key, r.model.as_str(), r.intervals.as_slice())),
        )
    }
}

/// Averaged accuracy per (group, model).
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryTable {
    schema: KeySchema,
    rows: Vec<AccuracySummary>,
}

impl SummaryTable {
    pub fn schema(&self) -> &KeySchema {
        &self.schema
    }

    pub fn rows(&self) -> &[AccuracySummary] {
        &self.rows
    }

    pub fn get(&self, group: &SeriesKey, model: &str) -> Option<&AccuracySummary> {
        self.rows
            .iter()
            .find(|r| &r.group == group && r.model == model)
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);
        for r in &self.rows {
            out.serialize(MetricsRow::new(&r.group, &r.model, r.n, r.n_series, &r.metrics))?;
        }
        out.flush().map_err(|e| ForecastError::Output(e.to_string()))
    }

    pub fn write_intervals_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        write_interval_rows(
            writer,
            self.rows
                .iter()
                .map(|r| (&r.group, r.model.as_str(), r.intervals.as_slice())),
        )
    }
}

fn average_interval_scores(items: &[(&AccuracyRecord, f64)]) -> Vec<IntervalScore> {
    let Some((first, _)) = items.first() else {
        return Vec::new();
    };
    first
        .intervals
        .iter()
        .map(|s| s.level)
        .filter_map(|level| {
            let (scores, weights): (Vec<&IntervalScore>, Vec<f64>) = items
                .iter()
                .filter_map(|(r, w)| {
                    r.intervals
                        .iter()
                        .find(|s| s.level == level)
                        .map(|s| (s, *w))
                })
                .unzip();
            if scores.is_empty() {
                return None;
            }
            let coverage: Vec<f64> = scores.iter().map(|s| s.coverage).collect();
            let winkler: Vec<f64> = scores.iter().map(|s| s.winkler).collect();
            Some(IntervalScore {
                level,
                coverage: weighted_mean(&coverage, &weights),
                winkler: weighted_mean(&winkler, &weights),
            })
        })
        .collect()
}

/// Computes accuracy tables from forecasts, training data and actuals.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    scale: MaseScale,
}

impl Evaluator {
    pub fn new(scale: MaseScale) -> Self {
        Self { scale }
    }

    pub fn scale(&self) -> MaseScale {
        self.scale
    }

    /// Score every forecast against its key's actuals.
    ///
    /// Forecasts of keys without validation actuals are skipped. MASE and
    /// RMSSE are scaled by the key's own training series.
    pub fn per_series(
        &self,
        forecasts: &ForecastTable,
        train: &Panel,
        validation: &Panel,
    ) -> AccuracyTable {
        let mut records = Vec::new();
        for fc in forecasts.forecasts() {
            let Some(actuals) = validation.get(&fc.key) else {
                debug!(key = %fc.key, model = %fc.model, "no actuals, skipped");
                continue;
            };
            let training = train.get(&fc.key).map(Series::values).unwrap_or(&[]);
            match self.score_series(fc, actuals, training, forecasts.levels()) {
                Ok(Some(record)) => records.push(record),
                Ok(None) => debug!(key = %fc.key, model = %fc.model, "no overlapping months"),
                Err(error) => warn!(key = %fc.key, model = %fc.model, %error, "not scored"),
            }
        }
        info!(records = records.len(), "scored series");
        AccuracyTable {
            schema: validation.schema().clone(),
            records,
        }
    }

    fn score_series(
        &self,
        fc: &SeriesForecast,
        actuals: &Series,
        training: &[f64],
        levels: &[f64],
    ) -> Result<Option<AccuracyRecord>> {
        let mut actual = Vec::new();
        let mut predicted = Vec::new();
        let mut bounds: Vec<(Vec<f64>, Vec<f64>)> = vec![(Vec::new(), Vec::new()); levels.len()];
        for point in &fc.points {
            let Some(a) = actuals.value_at(point.month) else {
                continue;
            };
            actual.push(a);
            predicted.push(point.point);
            for (slot, &level) in bounds.iter_mut().zip(levels) {
                let bound = point.interval(level).ok_or_else(|| {
                    ForecastError::InvalidParameter(format!("no {} interval", level))
                })?;
                slot.0.push(bound.lower);
                slot.1.push(bound.upper);
            }
        }
        if actual.is_empty() {
            return Ok(None);
        }

        let metrics = calculate_metrics(&actual, &predicted, training, &self.scale)?;
        let intervals = bounds
            .iter()
            .zip(levels)
            .map(|((lo, hi), &level)| interval_score(&actual, lo, hi, level))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(AccuracyRecord {
            key: fc.key.clone(),
            model: fc.model.clone(),
            n: actual.len(),
            n_series: 1,
            magnitude: magnitude(&actual),
            metrics,
            intervals,
        }))
    }

    /// Score forecasts summed to the groups of `aggregation`.
    ///
    /// For each model, a key is included only if it has validation
    /// actuals and a forecast from that model. The included keys'
    /// forecasts and actuals are summed month by month. MASE is scaled by
    /// their summed training series over the months all of them observe,
    /// so a late starter never enters the scale as zeros. Interval scores are
    /// not computed for aggregates: summed quantiles are not quantiles of
    /// the sum.
    pub fn aggregated(
        &self,
        forecasts: &ForecastTable,
        train: &Panel,
        validation: &Panel,
        aggregation: &Aggregation,
    ) -> Result<AccuracyTable> {
        let positions = validation.schema().projection(aggregation.labels())?;
        let schema = aggregation.schema(validation.schema())?;

        let mut records = Vec::new();
        for model in forecasts.model_names() {
            let mut groups: BTreeMap<SeriesKey, Vec<(&SeriesForecast, &Series)>> =
                BTreeMap::new();
            for fc in forecasts.forecasts().iter().filter(|f| f.model == model) {
                match validation.get(&fc.key) {
                    Some(actuals) if !actuals.is_empty() => groups
                        .entry(fc.key.project(&positions))
                        .or_default()
                        .push((fc, actuals)),
                    _ => debug!(key = %fc.key, model, "excluded from aggregate"),
                }
            }

            for (group, members) in groups {
                let mut sums: BTreeMap<Month, (f64, f64)> = BTreeMap::new();
                for (fc, actuals) in &members {
                    for point in &fc.points {
                        if let Some(a) = actuals.value_at(point.month) {
                            let entry = sums.entry(point.month).or_insert((0.0, 0.0));
                            entry.0 += a;
                            entry.1 += point.point;
                        }
                    }
                }
                if sums.is_empty() {
                    continue;
                }
                let (actual, predicted): (Vec<f64>, Vec<f64>) = sums.into_values().unzip();
                let training =
                    common_window_sum(members.iter().filter_map(|(fc, _)| train.get(&fc.key)));
                let metrics = calculate_metrics(&actual, &predicted, &training, &self.scale)?;
                records.push(AccuracyRecord {
                    key: group,
                    model: model.to_string(),
                    n: actual.len(),
                    n_series: members.len(),
                    magnitude: magnitude(&actual),
                    metrics,
                    intervals: Vec::new(),
                });
            }
        }
        info!(%aggregation, records = records.len(), "scored aggregates");
        Ok(AccuracyTable { schema, records })
    }
}

fn magnitude(values: &[f64]) -> f64 {
    values.iter().map(|v| v.abs()).sum::<f64>() / values.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Executor;
    use crate::forecaster::{forecast, ForecastConfig};
    use crate::models::baseline::RandomWalk;
    use crate::models::{ModelMenu, ModelSpec};
    use crate::partition::partition;
    use crate::trainer::Trainer;
    use approx::assert_relative_eq;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn menu() -> ModelMenu {
        let mut menu = ModelMenu::new();
        menu.register(ModelSpec::new("rw", || Box::new(RandomWalk::new())))
            .unwrap();
        menu
    }

    fn panel() -> Panel {
        let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
        let a: Vec<f64> = (0..30).map(|t| 100.0 + t as f64).collect();
        let b: Vec<f64> = (0..30).map(|t| 50.0 + 2.0 * t as f64).collect();
        let c: Vec<f64> = (0..30).map(|t| 10.0 + (t % 3) as f64).collect();
        builder
            .push_series(SeriesKey::new(["NSW", "Food"]), month(2016, 1), &a)
            .unwrap();
        builder
            .push_series(SeriesKey::new(["NSW", "Cafe"]), month(2016, 1), &b)
            .unwrap();
        builder
            .push_series(SeriesKey::new(["VIC", "Food"]), month(2016, 1), &c)
            .unwrap();
        builder.build().unwrap()
    }

    fn evaluate(panel: &Panel) -> (ForecastTable, Panel, Panel) {
        let split = partition(panel, month(2017, 12)).unwrap();
        let models = Trainer::new(menu(), Executor::sequential()).train(&split.train);
        let fc = forecast(&models, &split.validation, &ForecastConfig::default()).unwrap();
        (fc, split.train, split.validation)
    }

    #[test]
    fn per_series_metrics_use_own_training_scale() {
        let (fc, train, validation) = evaluate(&panel());
        let table = Evaluator::new(MaseScale::new(1)).per_series(&fc, &train, &validation);
        assert_eq!(table.len(), 3);

        let rec = table.get(&SeriesKey::new(["NSW", "Food"]), "rw").unwrap();
        // Forecast 123 for actuals 124..=129; naive in-sample error is 1.
        assert_eq!(rec.n, 6);
        assert_relative_eq!(rec.metrics.mae, 3.5);
        assert_relative_eq!(rec.metrics.mase.unwrap(), 3.5);
        assert_eq!(rec.intervals.len(), 2);
        assert!(rec.intervals[0].coverage <= rec.intervals[1].coverage);
    }

    #[test]
    fn summarise_groups_by_label() {
        let (fc, train, validation) = evaluate(&panel());
        let table = Evaluator::new(MaseScale::new(1)).per_series(&fc, &train, &validation);

        let by_state = table.summarise(&["state"], Averaging::Mean).unwrap();
        assert_eq!(by_state.rows().len(), 2);
        let nsw = by_state.get(&SeriesKey::new(["NSW"]), "rw").unwrap();
        assert_eq!(nsw.n_series, 2);
        // Food misses by 3.5 on average, Cafe by 7.
        assert_relative_eq!(nsw.metrics.mae, (3.5 + 7.0) / 2.0);

        let weighted = table
            .summarise(&["state"], Averaging::WeightedByMagnitude)
            .unwrap();
        let nsw_w = weighted.get(&SeriesKey::new(["NSW"]), "rw").unwrap();
        // Food averages 126.5, Cafe 103.
        assert_relative_eq!(
            nsw_w.metrics.mae,
            (3.5 * 126.5 + 7.0 * 103.0) / (126.5 + 103.0),
            epsilon = 1e-9
        );

        let overall = table.summarise::<&str>(&[], Averaging::Mean).unwrap();
        assert_eq!(overall.rows().len(), 1);
        assert_eq!(overall.rows()[0].group, SeriesKey::total());
        assert!(table.summarise(&["region"], Averaging::Mean).is_err());
    }

    #[test]
    fn aggregates_sum_forecasts_and_actuals() {
        let (fc, train, validation) = evaluate(&panel());
        let evaluator = Evaluator::new(MaseScale::new(1));
        let table = evaluator
            .aggregated(&fc, &train, &validation, &Aggregation::keep(["state"]))
            .unwrap();
        assert_eq!(table.schema().labels(), ["state"]);

        let nsw = table.get(&SeriesKey::new(["NSW"]), "rw").unwrap();
        assert_eq!(nsw.n_series, 2);
        // Summed forecast 219 against 222, 225, ..., 237.
        assert_relative_eq!(nsw.metrics.me, 10.5, epsilon = 1e-9);
        assert_relative_eq!(nsw.metrics.mase.unwrap(), 3.5, epsilon = 1e-9);
        assert!(nsw.intervals.is_empty());

        let total = evaluator
            .aggregated(&fc, &train, &validation, &Aggregation::total())
            .unwrap();
        assert_eq!(total.records()[0].n_series, 3);
    }

    #[test]
    fn apply_sums_series_by_group() {
        let totals = Aggregation::keep(["industry"]).apply(&panel()).unwrap();
        assert_eq!(totals.len(), 2);
        let food = totals.get(&SeriesKey::new(["Food"])).unwrap();
        assert_relative_eq!(food.values()[0], 110.0);
        assert!(Aggregation::keep(["region"]).apply(&panel()).is_err());
    }

    #[test]
    fn writes_metric_rows() {
        let (fc, train, validation) = evaluate(&panel());
        let table = Evaluator::new(MaseScale::new(1)).per_series(&fc, &train, &validation);
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("key,model,n,n_series,me,mae,rmse,mpe,mape,smape,mase,rmsse\n"));
        assert_eq!(text.lines().count(), 4);

        let mut buf = Vec::new();
        table.write_intervals_csv(&mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap().lines().count(), 1 + 3 * 2);
    }
}
