//! Fitting every model of the menu to every series of a panel.

use crate::core::{Month, Panel, Series, SeriesKey};
use crate::error::{ForecastError, Result};
use crate::executor::Executor;
use crate::models::{BoxedForecaster, ModelMenu, ModelSpec};
use crate::transform::Transform;
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::{debug, info, warn};

/// A model fitted to one key's training data.
pub struct FittedModel {
    model: BoxedForecaster,
    transform: Transform,
    last_month: Month,
    n_obs: usize,
}

impl FittedModel {
    /// The fitted forecaster; it works on the transformed scale.
    pub fn model(&self) -> &BoxedForecaster {
        &self.model
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Month of the last training observation.
    pub fn last_month(&self) -> Month {
        self.last_month
    }

    /// Number of training observations.
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    pub fn describe(&self) -> String {
        if self.transform.is_identity() {
            self.model.describe()
        } else {
            format!("{} on {}", self.model.describe(), self.transform)
        }
    }
}

impl fmt::Debug for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedModel")
            .field("model", &self.model.describe())
            .field("transform", &self.transform)
            .field("last_month", &self.last_month)
            .field("n_obs", &self.n_obs)
            .finish()
    }
}

/// Result of fitting one model to one key.
#[derive(Debug)]
pub enum FitOutcome {
    Fitted(FittedModel),
    Failed(ForecastError),
}

impl FitOutcome {
    pub fn fitted(&self) -> Option<&FittedModel> {
        match self {
            FitOutcome::Fitted(model) => Some(model),
            FitOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ForecastError> {
        match self {
            FitOutcome::Fitted(_) => None,
            FitOutcome::Failed(err) => Some(err),
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, FitOutcome::Fitted(_))
    }
}

/// One fit outcome per (key, model) pair.
///
/// Keys iterate in key order, models in menu order.
#[derive(Debug, Default)]
pub struct ModelTable {
    models: Vec<String>,
    fits: BTreeMap<SeriesKey, Vec<FitOutcome>>,
}

impl ModelTable {
    /// Names of the fitted specifications, in menu order.
    pub fn model_names(&self) -> &[String] {
        &self.models
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.fits.keys()
    }

    /// Number of (key, model) pairs.
    pub fn len(&self) -> usize {
        self.fits.len() * self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &SeriesKey, model: &str) -> Option<&FitOutcome> {
        let idx = self.models.iter().position(|m| m == model)?;
        self.fits.get(key).and_then(|row| row.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &str, &FitOutcome)> {
        self.fits.iter().flat_map(move |(key, row)| {
            self.models
                .iter()
                .zip(row)
                .map(move |(model, outcome)| (key, model.as_str(), outcome))
        })
    }

    pub fn n_fitted(&self) -> usize {
        self.iter().filter(|(_, _, o)| o.is_fitted()).count()
    }

    pub fn n_failed(&self) -> usize {
        self.len() - self.n_fitted()
    }

    /// Recorded fit failures.
    pub fn failures(&self) -> impl Iterator<Item = (&SeriesKey, &str, &ForecastError)> {
        self.iter()
            .filter_map(|(key, model, outcome)| outcome.error().map(|e| (key, model, e)))
    }
}

/// Fits a model menu to every series of a training panel.
///
/// # Example
///
/// ```
/// use panel_forecast::core::{KeySchema, Month, Panel, SeriesKey};
/// use panel_forecast::executor::Executor;
/// use panel_forecast::models::ModelMenu;
/// use panel_forecast::trainer::Trainer;
///
/// let values: Vec<f64> = (0..36).map(|t| 100.0 + t as f64).collect();
/// let mut builder = Panel::builder(KeySchema::new(["state"]));
/// builder.push_series(SeriesKey::new(["VIC"]), Month::new(2015, 1).unwrap(), &values).unwrap();
/// let train = builder.build().unwrap();
///
/// let table = Trainer::new(ModelMenu::standard(12), Executor::sequential()).train(&train);
/// assert_eq!(table.len(), 5);
/// assert!(table.get(&SeriesKey::new(["VIC"]), "drift").unwrap().is_fitted());
/// ```
#[derive(Debug)]
pub struct Trainer {
    menu: ModelMenu,
    executor: Executor,
}

impl Trainer {
    pub fn new(menu: ModelMenu, executor: Executor) -> Self {
        Self { menu, executor }
    }

    pub fn menu(&self) -> &ModelMenu {
        &self.menu
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Fit every (key, model) pair. Failures are recorded, never returned.
    pub fn train(&self, panel: &Panel) -> ModelTable {
        let started = Instant::now();
        let tasks: Vec<(&SeriesKey, &Series, &ModelSpec)> = panel
            .iter()
            .flat_map(|(key, series)| self.menu.iter().map(move |spec| (key, series, spec)))
            .collect();

        let outcomes = self
            .executor
            .map(&tasks, |&(key, series, spec)| fit_one(key, series, spec));

        let mut fits: BTreeMap<SeriesKey, Vec<FitOutcome>> = BTreeMap::new();
        for (&(key, _, _), outcome) in tasks.iter().zip(outcomes) {
            fits.entry(key.clone()).or_default().push(outcome);
        }
        let table = ModelTable {
            models: self.menu.names().into_iter().map(str::to_string).collect(),
            fits,
        };

        info!(
            keys = panel.len(),
            models = self.menu.len(),
            fitted = table.n_fitted(),
            failed = table.n_failed(),
            threads = self.executor.threads(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trained model table"
        );
        table
    }
}

fn fit_one(key: &SeriesKey, series: &Series, spec: &ModelSpec) -> FitOutcome {
    match try_fit(series, spec) {
        Ok(fitted) => {
            debug!(%key, model = spec.name(), fitted = %fitted.describe(), "fit");
            FitOutcome::Fitted(fitted)
        }
        Err(error) => {
            warn!(%key, model = spec.name(), %error, "fit failed");
            FitOutcome::Failed(error)
        }
    }
}

fn try_fit(series: &Series, spec: &ModelSpec) -> Result<FittedModel> {
    let last_month = series.last_month().ok_or(ForecastError::EmptyData)?;
    if !series.is_regular() {
        return Err(ForecastError::IrregularSeries {
            missing: series.missing_months(),
        });
    }
    let transform = spec.transform();
    let values = transform.forward(series.values())?;

    let mut model = spec.create();
    match catch_unwind(AssertUnwindSafe(|| model.fit(&values))) {
        Ok(result) => result?,
        Err(payload) => {
            return Err(ForecastError::ComputationError(format!(
                "model panicked: {}",
                panic_message(payload.as_ref())
            )))
        }
    }

    Ok(FittedModel {
        model,
        transform,
        last_month,
        n_obs: series.len(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Forecast, KeySchema};
    use crate::models::baseline::RandomWalk;
    use crate::models::Forecaster;

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn trend(n: usize, level: f64) -> Vec<f64> {
        (0..n).map(|t| level + 2.0 * t as f64).collect()
    }

    fn panel() -> Panel {
        let mut builder = Panel::builder(KeySchema::new(["state"]));
        builder
            .push_series(SeriesKey::new(["NSW"]), month(2015, 1), &trend(36, 100.0))
            .unwrap();
        builder
            .push_series(SeriesKey::new(["TAS"]), month(2017, 11), &[5.0])
            .unwrap();
        builder
            .push_series(SeriesKey::new(["WA"]), month(2015, 1), &trend(36, -50.0))
            .unwrap();
        builder.build().unwrap()
    }

    fn menu() -> ModelMenu {
        let mut menu = ModelMenu::new();
        menu.register(ModelSpec::new("rw", || Box::new(RandomWalk::new())))
            .unwrap();
        menu.register(
            ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))
                .with_transform(Transform::Log),
        )
        .unwrap();
        menu
    }

    #[test]
    fn every_pair_is_recorded_once() {
        let table = Trainer::new(menu(), Executor::sequential()).train(&panel());
        assert_eq!(table.len(), 6);
        assert_eq!(table.iter().count(), 6);
        assert_eq!(table.model_names(), ["rw", "drift"]);

        let nsw = SeriesKey::new(["NSW"]);
        let fitted = table.get(&nsw, "drift").unwrap().fitted().unwrap();
        assert_eq!(fitted.last_month(), month(2017, 12));
        assert_eq!(fitted.n_obs(), 36);
        assert_eq!(fitted.transform(), Transform::Log);
        assert!(table.get(&nsw, "missing").is_none());
    }

    #[test]
    fn failures_are_recorded_not_fatal() {
        let table = Trainer::new(menu(), Executor::sequential()).train(&panel());

        let tas = SeriesKey::new(["TAS"]);
        assert!(matches!(
            table.get(&tas, "rw").unwrap().error(),
            Some(ForecastError::InsufficientData { .. })
        ));
        let wa = SeriesKey::new(["WA"]);
        assert!(matches!(
            table.get(&wa, "drift").unwrap().error(),
            Some(ForecastError::NonPositiveValues { .. })
        ));
        assert!(table.get(&wa, "rw").unwrap().is_fitted());
        assert_eq!(table.n_failed(), 3);
        assert_eq!(table.failures().count(), 3);
    }

    #[test]
    fn irregular_series_fail_to_fit() {
        let mut builder = Panel::builder(KeySchema::new(["state"]));
        let key = SeriesKey::new(["SA"]);
        for (i, v) in trend(24, 10.0).into_iter().enumerate() {
            if i != 10 && i != 11 {
                builder.push(key.clone(), month(2016, 1).offset(i as i32), v).unwrap();
            }
        }
        let panel = builder.build().unwrap();
        let table = Trainer::new(menu(), Executor::sequential()).train(&panel);
        assert_eq!(
            table.get(&key, "rw").unwrap().error(),
            Some(&ForecastError::IrregularSeries { missing: 2 })
        );
    }

    struct Exploding;

    impl Forecaster for Exploding {
        fn fit(&mut self, _values: &[f64]) -> Result<()> {
            panic!("boom")
        }
        fn predict(&self, _horizon: usize) -> Result<Forecast> {
            Err(ForecastError::FitRequired)
        }
        fn fitted_values(&self) -> Option<&[f64]> {
            None
        }
        fn residuals(&self) -> Option<&[f64]> {
            None
        }
        fn name(&self) -> &str {
            "Exploding"
        }
    }

    #[test]
    fn panicking_fit_is_contained() {
        let mut menu = menu();
        menu.register(ModelSpec::new("bad", || Box::new(Exploding)))
            .unwrap();
        let table = Trainer::new(menu, Executor::with_threads(2).unwrap()).train(&panel());
        let nsw = SeriesKey::new(["NSW"]);
        match table.get(&nsw, "bad").unwrap().error() {
            Some(ForecastError::ComputationError(msg)) => assert!(msg.contains("boom")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(table.get(&nsw, "rw").unwrap().is_fitted());
    }

    #[test]
    fn parallel_and_sequential_fits_agree() {
        let seq = Trainer::new(ModelMenu::standard(12), Executor::sequential()).train(&panel());
        let par = Trainer::new(ModelMenu::standard(12), Executor::with_threads(4).unwrap())
            .train(&panel());
        assert_eq!(seq.len(), par.len());
        for ((k1, m1, o1), (k2, m2, o2)) in seq.iter().zip(par.iter()) {
            assert_eq!((k1, m1), (k2, m2));
            match (o1, o2) {
                (FitOutcome::Fitted(a), FitOutcome::Fitted(b)) => {
                    assert_eq!(a.describe(), b.describe());
                    assert_eq!(a.model().predict(3).unwrap(), b.model().predict(3).unwrap());
                }
                (FitOutcome::Failed(a), FitOutcome::Failed(b)) => assert_eq!(a, b),
                _ => panic!("outcomes differ for {} {}", k1, m1),
            }
        }
    }
}
