//! Automatic ETS model selection.
//!
//! AutoETS fits every admissible ETS specification and keeps the one with
//! the lowest AICc.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::models::exponential::ets::{ETSSpec, ErrorType, SeasonalType, TrendType, ETS};
use crate::models::Forecaster;

/// Configuration for AutoETS.
#[derive(Debug, Clone)]
pub struct AutoETSConfig {
    /// Seasonal period; 0 or 1 for non-seasonal data.
    pub seasonal_period: usize,
    /// Allow multiplicative errors.
    pub allow_multiplicative_error: bool,
    /// Allow multiplicative seasonality.
    pub allow_multiplicative_seasonal: bool,
    /// Allow damped trend.
    pub allow_damped: bool,
}

impl Default for AutoETSConfig {
    fn default() -> Self {
        Self {
            seasonal_period: 1,
            allow_multiplicative_error: true,
            allow_multiplicative_seasonal: true,
            allow_damped: true,
        }
    }
}

impl AutoETSConfig {
    /// Create a configuration with a specific seasonal period.
    pub fn with_period(period: usize) -> Self {
        Self {
            seasonal_period: period,
            ..Default::default()
        }
    }

    /// Restrict to additive models only.
    pub fn additive_only(mut self) -> Self {
        self.allow_multiplicative_error = false;
        self.allow_multiplicative_seasonal = false;
        self
    }
}

/// Automatic ETS model selection.
///
/// Candidates exclude the numerically unstable combinations (additive error
/// with multiplicative season, `M,A,A` and `M,Ad,A`). Multiplicative error
/// or season is only tried on strictly positive data, and seasonal forms
/// only when at least two full periods are available.
#[derive(Debug, Clone)]
pub struct AutoETS {
    config: AutoETSConfig,
    selected_model: Option<ETS>,
    model_scores: Vec<(ETSSpec, f64)>,
}

impl AutoETS {
    pub fn new() -> Self {
        Self::with_config(AutoETSConfig::default())
    }

    pub fn with_config(config: AutoETSConfig) -> Self {
        Self {
            config,
            selected_model: None,
            model_scores: Vec::new(),
        }
    }

    pub fn with_period(period: usize) -> Self {
        Self::with_config(AutoETSConfig::with_period(period))
    }

    pub fn selected_spec(&self) -> Option<ETSSpec> {
        self.selected_model.as_ref().map(ETS::spec)
    }

    /// AICc of every candidate that fitted, best first.
    pub fn model_scores(&self) -> &[(ETSSpec, f64)] {
        &self.model_scores
    }

    /// Admissible specifications for data of the given length and sign.
    pub fn candidates(&self, n: usize, positive: bool) -> Vec<ETSSpec> {
        let period = self.config.seasonal_period;
        let seasonal_ok = period > 1 && n >= 2 * period;

        let mut errors = vec![ErrorType::Additive];
        if positive && self.config.allow_multiplicative_error {
            errors.push(ErrorType::Multiplicative);
        }
        let mut trends = vec![TrendType::None, TrendType::Additive];
        if self.config.allow_damped {
            trends.push(TrendType::AdditiveDamped);
        }
        let mut seasons = vec![SeasonalType::None];
        if seasonal_ok {
            seasons.push(SeasonalType::Additive);
            if positive && self.config.allow_multiplicative_seasonal {
                seasons.push(SeasonalType::Multiplicative);
            }
        }

        let mut specs = Vec::new();
        for &error in &errors {
            for &trend in &trends {
                for &seasonal in &seasons {
                    let unstable = match (error, seasonal) {
                        (ErrorType::Additive, SeasonalType::Multiplicative) => true,
                        (ErrorType::Multiplicative, SeasonalType::Additive) => {
                            trend != TrendType::None
                        }
                        _ => false,
                    };
                    if !unstable {
                        specs.push(ETSSpec::new(error, trend, seasonal));
                    }
                }
            }
        }
        specs
    }
}

impl Default for AutoETS {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for AutoETS {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        if values.len() < 3 {
            return Err(ForecastError::InsufficientData {
                needed: 3,
                got: values.len(),
            });
        }
        let positive = values.iter().all(|&y| y > 0.0);
        let period = self.config.seasonal_period;

        self.model_scores.clear();
        let mut best: Option<(ETS, f64)> = None;
        for spec in self.candidates(values.len(), positive) {
            let mut model = ETS::new(spec, period);
            if model.fit(values).is_err() {
                continue;
            }
            let Some(score) = model.aicc().filter(|s| s.is_finite()) else {
                continue;
            };
            self.model_scores.push((spec, score));
            if best.as_ref().map_or(true, |(_, s)| score < *s) {
                best = Some((model, score));
            }
        }

        self.model_scores
            .sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let (model, _) = best.ok_or_else(|| {
            ForecastError::ComputationError("no valid ETS model could be fitted".to_string())
        })?;
        self.selected_model = Some(model);
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.selected_model
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict(horizon)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.selected_model.as_ref()?.fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.selected_model.as_ref()?.residuals()
    }

    fn name(&self) -> &str {
        "AutoETS"
    }

    fn describe(&self) -> String {
        match &self.selected_model {
            Some(model) => model.describe(),
            None => self.name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_set_excludes_unstable_forms() {
        let auto = AutoETS::with_period(12);
        let specs = auto.candidates(48, true);
        // 2 errors x 3 trends x 3 seasons, minus 3 A,*,M and 2 M,{A,Ad},A
        assert_eq!(specs.len(), 13);
        assert!(!specs.contains(&ETSSpec::new(
            ErrorType::Additive,
            TrendType::None,
            SeasonalType::Multiplicative
        )));
        assert!(!specs.contains(&ETSSpec::new(
            ErrorType::Multiplicative,
            TrendType::Additive,
            SeasonalType::Additive
        )));
        assert!(specs.contains(&ETSSpec::madm()));
    }

    #[test]
    fn non_positive_data_only_gets_additive_forms() {
        let auto = AutoETS::with_period(12);
        let specs = auto.candidates(48, false);
        assert!(specs.iter().all(|s| !s.is_multiplicative()));
        assert_eq!(specs.len(), 6);
    }

    #[test]
    fn short_data_drops_seasonal_forms() {
        let auto = AutoETS::with_period(12);
        assert!(auto
            .candidates(20, true)
            .iter()
            .all(|s| !s.has_seasonal()));
    }

    #[test]
    fn selects_seasonal_model_for_seasonal_data() {
        let values: Vec<f64> = (0..60)
            .map(|t| {
                200.0
                    + t as f64
                    + 40.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin()
                    + ((t * 5) % 3) as f64
            })
            .collect();
        let mut model = AutoETS::with_period(12);
        model.fit(&values).unwrap();

        assert!(model.selected_spec().unwrap().has_seasonal());
        let scores = model.model_scores();
        assert!(scores.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(scores[0].0, model.selected_spec().unwrap());
        assert_eq!(model.predict(12).unwrap().horizon(), 12);
    }

    #[test]
    fn unfitted_model_cannot_predict() {
        assert!(matches!(
            AutoETS::new().predict(1),
            Err(ForecastError::FitRequired)
        ));
        assert!(AutoETS::new().fit(&[1.0, 2.0]).is_err());
    }
}
