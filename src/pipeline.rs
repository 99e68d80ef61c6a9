//! One analysis pass: partition, train, forecast, score.

use crate::accuracy::{AccuracyTable, Aggregation, Evaluator, SummaryTable};
use crate::config::WorkflowConfig;
use crate::core::Panel;
use crate::error::{ForecastError, Result};
use crate::executor::Executor;
use crate::forecaster::{forecast, ForecastTable};
use crate::models::ModelMenu;
use crate::partition::{partition, Partition};
use crate::trainer::{ModelTable, Trainer};
use std::fs::{self, File};
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Everything one workflow run produces.
#[derive(Debug)]
pub struct WorkflowReport {
    pub partition: Partition,
    pub models: ModelTable,
    pub forecasts: ForecastTable,
    /// Accuracy per (key, model).
    pub accuracy: AccuracyTable,
    /// Per-key accuracy averaged by the configured grouping.
    pub summary: SummaryTable,
    /// Accuracy of each configured aggregation, in config order.
    pub aggregated: Vec<(Aggregation, AccuracyTable)>,
}

impl WorkflowReport {
    /// Write every table as CSV into `dir`, creating it if needed.
    pub fn write_csv_dir(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| output_error(dir, e))?;
        let create = |name: &str| {
            let path = dir.join(name);
            File::create(&path).map_err(|e| output_error(&path, e))
        };

        self.forecasts.write_csv(create("forecasts.csv")?)?;
        self.forecasts
            .write_failures_csv(create("forecast_failures.csv")?)?;
        self.accuracy.write_csv(create("accuracy.csv")?)?;
        self.accuracy
            .write_intervals_csv(create("accuracy_intervals.csv")?)?;
        self.summary.write_csv(create("summary.csv")?)?;
        for (aggregation, table) in &self.aggregated {
            let name = aggregation.labels().join("_");
            let name = if name.is_empty() { "total".to_string() } else { name };
            table.write_csv(create(&format!("accuracy_by_{}.csv", name))?)?;
        }
        Ok(())
    }
}

fn output_error(path: &Path, err: std::io::Error) -> ForecastError {
    ForecastError::Output(format!("{}: {}", path.display(), err))
}

/// A configured analysis pass over a panel.
///
/// # Example
///
/// ```
/// use panel_forecast::config::WorkflowConfig;
/// use panel_forecast::core::{KeySchema, Month, Panel, SeriesKey};
/// use panel_forecast::pipeline::Workflow;
///
/// let values: Vec<f64> = (0..48)
///     .map(|t| 100.0 + t as f64 + 10.0 * ((t % 12) as f64 - 5.5).abs() + ((t * 7) % 5) as f64)
///     .collect();
/// let mut builder = Panel::builder(KeySchema::new(["state"]));
/// builder.push_series(SeriesKey::new(["VIC"]), Month::new(2014, 1).unwrap(), &values).unwrap();
/// let panel = builder.build().unwrap();
///
/// let config = WorkflowConfig::new(Month::new(2016, 12).unwrap());
/// let report = Workflow::new(config).unwrap().run(&panel).unwrap();
/// assert_eq!(report.models.len(), 5);
/// assert_eq!(report.forecasts.n_rows(), 5 * 12);
/// ```
#[derive(Debug, Clone)]
pub struct Workflow {
    config: WorkflowConfig,
    menu: ModelMenu,
}

impl Workflow {
    /// Uses the configured `[models]`, or the standard menu when none are given.
    pub fn new(config: WorkflowConfig) -> Result<Self> {
        config.validate()?;
        let menu = if config.models.is_empty() {
            ModelMenu::standard(config.seasonal_period)
        } else {
            ModelMenu::from_config(&config.models, config.seasonal_period)?
        };
        Ok(Self { config, menu })
    }

    /// Replace the model menu.
    pub fn with_menu(mut self, menu: ModelMenu) -> Self {
        self.menu = menu;
        self
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn menu(&self) -> &ModelMenu {
        &self.menu
    }

    pub fn run(&self, panel: &Panel) -> Result<WorkflowReport> {
        let started = Instant::now();
        if self.menu.is_empty() {
            return Err(ForecastError::Config("model menu is empty".to_string()));
        }
        let split = partition(panel, self.config.cutoff)?;

        let executor = Executor::from_threads(self.config.threads)?;
        let models = Trainer::new(self.menu.clone(), executor).train(&split.train);

        let forecasts = forecast(&models, &split.validation, &self.config.forecast_config())?;

        let evaluator = Evaluator::new(self.config.mase_scale());
        let accuracy = evaluator.per_series(&forecasts, &split.train, &split.validation);
        let summary = accuracy.summarise(&self.config.summarise_by, self.config.averaging)?;
        let aggregated = self
            .config
            .aggregation_list()
            .into_iter()
            .map(|aggregation| {
                let table = evaluator.aggregated(
                    &forecasts,
                    &split.train,
                    &split.validation,
                    &aggregation,
                )?;
                Ok((aggregation, table))
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            keys = panel.len(),
            models = self.menu.len(),
            failed_fits = models.n_failed(),
            scored = accuracy.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "workflow finished"
        );
        Ok(WorkflowReport {
            partition: split,
            models,
            forecasts,
            accuracy,
            summary,
            aggregated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KeySchema, Month, SeriesKey};

    fn month(y: i32, m: u32) -> Month {
        Month::new(y, m).unwrap()
    }

    fn seasonal(n: usize, level: f64) -> Vec<f64> {
        (0..n)
            .map(|t| {
                level * (1.0 + 0.005 * t as f64)
                    * (1.0 + 0.2 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin())
                    + ((t * 7) % 5) as f64
            })
            .collect()
    }

    fn panel() -> Panel {
        let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
        for (i, (state, industry)) in [("NSW", "Food"), ("NSW", "Cafe"), ("VIC", "Food")]
            .into_iter()
            .enumerate()
        {
            builder
                .push_series(
                    SeriesKey::new([state, industry]),
                    month(2014, 1),
                    &seasonal(60, 100.0 * (i + 1) as f64),
                )
                .unwrap();
        }
        builder.build().unwrap()
    }

    const CONFIG: &str = r#"
cutoff = "2017 Dec"
threads = 2
summarise_by = ["state"]

[[aggregations]]
keep = ["state"]

[[aggregations]]
"#;

    #[test]
    fn runs_all_stages() {
        let config = WorkflowConfig::from_toml_str(CONFIG).unwrap();
        let report = Workflow::new(config).unwrap().run(&panel()).unwrap();

        assert_eq!(report.models.len(), 3 * 5);
        assert_eq!(report.models.n_failed(), 0);
        assert_eq!(report.forecasts.n_rows(), 3 * 5 * 12);
        assert_eq!(report.accuracy.len(), 15);
        assert_eq!(report.summary.rows().len(), 2 * 5);
        assert_eq!(report.aggregated.len(), 2);
        assert_eq!(report.aggregated[0].1.len(), 2 * 5);
        assert_eq!(report.aggregated[1].1.len(), 5);
        for record in report.accuracy.records() {
            assert!(record.metrics.mase.unwrap().is_finite());
            assert!(record.metrics.mape.unwrap() < 50.0);
        }
    }

    #[test]
    fn writes_csv_tables() {
        let config = WorkflowConfig::from_toml_str(CONFIG).unwrap();
        let report = Workflow::new(config).unwrap().run(&panel()).unwrap();
        let dir = std::env::temp_dir().join(format!("panel-forecast-{}", std::process::id()));
        report.write_csv_dir(&dir).unwrap();
        for name in [
            "forecasts.csv",
            "forecast_failures.csv",
            "accuracy.csv",
            "summary.csv",
            "accuracy_by_state.csv",
            "accuracy_by_total.csv",
        ] {
            assert!(dir.join(name).exists(), "{} missing", name);
        }
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn cutoff_before_data_is_an_error() {
        let config = WorkflowConfig::new(month(2010, 1));
        assert!(matches!(
            Workflow::new(config).unwrap().run(&panel()),
            Err(ForecastError::EmptyTrainingPanel { .. })
        ));
    }

    #[test]
    fn empty_menu_is_rejected() {
        let workflow = Workflow::new(WorkflowConfig::new(month(2017, 12)))
            .unwrap()
            .with_menu(ModelMenu::new());
        assert!(matches!(
            workflow.run(&panel()),
            Err(ForecastError::Config(_))
        ));
    }
}
