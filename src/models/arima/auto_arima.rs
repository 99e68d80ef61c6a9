//! Automatic seasonal ARIMA order selection.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::seasonal_difference;
use crate::models::arima::model::{ARIMASpec, ARIMA};
use crate::models::arima::unitroot::{ndiffs, nsdiffs};
use crate::models::Forecaster;
use std::collections::HashMap;

/// Configuration for AutoARIMA.
#[derive(Debug, Clone)]
pub struct AutoARIMAConfig {
    /// Maximum non-seasonal AR order to consider.
    pub max_p: usize,
    /// Maximum non-seasonal MA order to consider.
    pub max_q: usize,
    /// Maximum non-seasonal differencing order.
    pub max_d: usize,
    /// Maximum seasonal AR order.
    pub max_seasonal_p: usize,
    /// Maximum seasonal MA order.
    pub max_seasonal_q: usize,
    /// Maximum seasonal differencing order.
    pub max_seasonal_d: usize,
    /// Seasonal period (0 or 1 for non-seasonal).
    pub seasonal_period: usize,
    /// Stepwise neighbourhood search instead of the full grid.
    pub stepwise: bool,
    /// Consider a mean or drift term where differencing allows one.
    pub allow_constant: bool,
}

impl Default for AutoARIMAConfig {
    fn default() -> Self {
        Self {
            max_p: 2,
            max_q: 2,
            max_d: 2,
            max_seasonal_p: 1,
            max_seasonal_q: 1,
            max_seasonal_d: 1,
            seasonal_period: 0,
            stepwise: true,
            allow_constant: true,
        }
    }
}

impl AutoARIMAConfig {
    /// Set maximum non-seasonal orders.
    pub fn with_max_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_p = max_p;
        self.max_d = max_d;
        self.max_q = max_q;
        self
    }

    /// Set maximum seasonal orders.
    pub fn with_seasonal_orders(mut self, max_p: usize, max_d: usize, max_q: usize) -> Self {
        self.max_seasonal_p = max_p;
        self.max_seasonal_d = max_d;
        self.max_seasonal_q = max_q;
        self
    }

    pub fn with_seasonal_period(mut self, period: usize) -> Self {
        self.seasonal_period = period;
        self
    }

    /// Search every order combination within the limits.
    pub fn exhaustive(mut self) -> Self {
        self.stepwise = false;
        self
    }
}

/// Order limits for the ARMA part once differencing is fixed.
#[derive(Debug, Clone, Copy)]
struct Limits {
    p: usize,
    q: usize,
    seasonal_p: usize,
    seasonal_q: usize,
}

impl Limits {
    fn max_params(&self) -> usize {
        // Orders plus constant and innovation variance.
        self.p + self.q + self.seasonal_p + self.seasonal_q + 2
    }

    fn conditioning_start(&self, period: usize) -> usize {
        self.p + self.seasonal_p * period
    }

    fn allows(&self, spec: &ARIMASpec) -> bool {
        spec.p <= self.p
            && spec.q <= self.q
            && spec.seasonal_p <= self.seasonal_p
            && spec.seasonal_q <= self.seasonal_q
    }

    /// Shrink the largest lags first until `available` residuals can
    /// support the richest candidate.
    fn fit_to(mut self, available: usize, period: usize) -> Option<Self> {
        loop {
            if available > self.conditioning_start(period) + self.max_params() {
                return Some(self);
            }
            if self.seasonal_p > 0 {
                self.seasonal_p -= 1;
            } else if self.seasonal_q > 0 {
                self.seasonal_q -= 1;
            } else if self.p > 0 {
                self.p -= 1;
            } else if self.q > 0 {
                self.q -= 1;
            } else {
                return None;
            }
        }
    }
}

/// Automatic ARIMA/SARIMA model selection.
///
/// The seasonal difference `D` is taken when the seasonal strength of the
/// series exceeds 0.64, then `d` by repeated KPSS tests on the seasonally
/// differenced series. With the differencing fixed, ARMA orders and the
/// constant are chosen by AICc, either by the stepwise neighbourhood
/// search or over the whole grid. All candidates condition on the same
/// number of initial values so their likelihoods are comparable.
#[derive(Debug, Clone)]
pub struct AutoARIMA {
    config: AutoARIMAConfig,
    selected: Option<ARIMA>,
    model_scores: Vec<(ARIMASpec, f64)>,
}

impl AutoARIMA {
    pub fn new() -> Self {
        Self::with_config(AutoARIMAConfig::default())
    }

    pub fn with_config(config: AutoARIMAConfig) -> Self {
        Self {
            config,
            selected: None,
            model_scores: Vec::new(),
        }
    }

    /// AutoARIMA with default limits and the given seasonal period.
    pub fn seasonal(period: usize) -> Self {
        Self::with_config(AutoARIMAConfig::default().with_seasonal_period(period))
    }

    /// Order of the selected model.
    pub fn selected_spec(&self) -> Option<ARIMASpec> {
        self.selected.as_ref().map(ARIMA::spec)
    }

    /// AICc of every candidate that fitted, in evaluation order.
    pub fn model_scores(&self) -> &[(ARIMASpec, f64)] {
        &self.model_scores
    }

    fn candidate(
        &self,
        template: &ARIMASpec,
        orders: (usize, usize, usize, usize),
        constant: bool,
    ) -> ARIMASpec {
        let (p, q, sp, sq) = orders;
        let mut spec = ARIMASpec::new(p, template.d, q).with_constant(constant);
        if template.period > 1 {
            spec = spec.seasonal(sp, template.seasonal_d, sq, template.period);
        }
        spec
    }

    fn grid(&self, template: &ARIMASpec, limits: &Limits, constants: &[bool]) -> Vec<ARIMASpec> {
        let mut specs = Vec::new();
        for p in 0..=limits.p {
            for q in 0..=limits.q {
                for sp in 0..=limits.seasonal_p {
                    for sq in 0..=limits.seasonal_q {
                        for &c in constants {
                            specs.push(self.candidate(template, (p, q, sp, sq), c));
                        }
                    }
                }
            }
        }
        specs
    }

    fn neighbours(&self, best: &ARIMASpec, constants: &[bool]) -> Vec<ARIMASpec> {
        let steps: [(i64, i64, i64, i64); 12] = [
            (1, 0, 0, 0),
            (-1, 0, 0, 0),
            (0, 1, 0, 0),
            (0, -1, 0, 0),
            (1, 1, 0, 0),
            (-1, -1, 0, 0),
            (0, 0, 1, 0),
            (0, 0, -1, 0),
            (0, 0, 0, 1),
            (0, 0, 0, -1),
            (0, 0, 1, 1),
            (0, 0, -1, -1),
        ];
        let shift = |v: usize, delta: i64| usize::try_from(v as i64 + delta).ok();

        let mut specs = Vec::new();
        for (dp, dq, dsp, dsq) in steps {
            let orders = (
                shift(best.p, dp),
                shift(best.q, dq),
                shift(best.seasonal_p, dsp),
                shift(best.seasonal_q, dsq),
            );
            if let (Some(p), Some(q), Some(sp), Some(sq)) = orders {
                specs.push(self.candidate(best, (p, q, sp, sq), best.include_constant));
            }
        }
        for &c in constants {
            if c != best.include_constant {
                specs.push(ARIMASpec {
                    include_constant: c,
                    ..*best
                });
            }
        }
        specs
    }
}

impl Default for AutoARIMA {
    fn default() -> Self {
        Self::new()
    }
}

impl Forecaster for AutoARIMA {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        let period = self.config.seasonal_period;
        let seasonal = period > 1;

        let seasonal_d = if seasonal {
            nsdiffs(values, period).min(self.config.max_seasonal_d)
        } else {
            0
        };
        let d = ndiffs(
            &seasonal_difference(values, seasonal_d, period.max(1)),
            self.config.max_d,
        );

        let template = if seasonal {
            ARIMASpec::new(0, d, 0).seasonal(0, seasonal_d, 0, period)
        } else {
            ARIMASpec::new(0, d, 0)
        };
        let limits = Limits {
            p: self.config.max_p,
            q: self.config.max_q,
            seasonal_p: if seasonal { self.config.max_seasonal_p } else { 0 },
            seasonal_q: if seasonal { self.config.max_seasonal_q } else { 0 },
        };
        let available = values
            .len()
            .saturating_sub(d + seasonal_d * if seasonal { period } else { 0 });
        let limits = limits
            .fit_to(available, period)
            .ok_or(ForecastError::InsufficientData {
                needed: values.len() - available + 3,
                got: values.len(),
            })?;
        let start = limits.conditioning_start(period);

        let constants: Vec<bool> = if self.config.allow_constant && d + seasonal_d <= 1 {
            vec![true, false]
        } else {
            vec![false]
        };

        let mut scores: HashMap<ARIMASpec, f64> = HashMap::new();
        let mut evaluated: Vec<(ARIMASpec, f64)> = Vec::new();
        let mut best: Option<(ARIMA, f64)> = None;

        let mut evaluate = |spec: ARIMASpec,
                            scores: &mut HashMap<ARIMASpec, f64>,
                            best: &mut Option<(ARIMA, f64)>|
         -> bool {
            if scores.contains_key(&spec) || !limits.allows(&spec) {
                return false;
            }
            let mut model = ARIMA::new(spec).condition_on(start);
            let score = match model.fit(values) {
                Ok(()) => model.aicc().unwrap_or(f64::INFINITY),
                Err(_) => f64::INFINITY,
            };
            scores.insert(spec, score);
            if !score.is_finite() {
                return false;
            }
            evaluated.push((spec, score));
            let improves = best.as_ref().map_or(true, |(_, s)| score < *s);
            if improves {
                *best = Some((model, score));
            }
            improves
        };

        if self.config.stepwise {
            let initial = [(2, 2, 1, 1), (0, 0, 0, 0), (1, 0, 1, 0), (0, 1, 0, 1)];
            for orders in initial {
                let (p, q, sp, sq) = orders;
                let clipped = (
                    p.min(limits.p),
                    q.min(limits.q),
                    sp.min(limits.seasonal_p),
                    sq.min(limits.seasonal_q),
                );
                evaluate(
                    self.candidate(&template, clipped, constants[0]),
                    &mut scores,
                    &mut best,
                );
            }
            if constants.len() > 1 {
                evaluate(
                    self.candidate(&template, (0, 0, 0, 0), false),
                    &mut scores,
                    &mut best,
                );
            }

            // Move to the first improving neighbour until none improves.
            while let Some(current) = best.as_ref().map(|(m, _)| m.spec()) {
                let mut moved = false;
                for spec in self.neighbours(&current, &constants) {
                    if evaluate(spec, &mut scores, &mut best) {
                        moved = true;
                        break;
                    }
                }
                if !moved {
                    break;
                }
            }
        } else {
            for spec in self.grid(&template, &limits, &constants) {
                evaluate(spec, &mut scores, &mut best);
            }
        }

        let (model, _) = best.ok_or_else(|| {
            ForecastError::ComputationError("no ARIMA candidate could be fitted".to_string())
        })?;
        self.selected = Some(model);
        self.model_scores = evaluated;
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        self.selected
            .as_ref()
            .ok_or(ForecastError::FitRequired)?
            .predict(horizon)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.selected.as_ref()?.fitted_values()
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.selected.as_ref()?.residuals()
    }

    fn name(&self) -> &str {
        "AutoARIMA"
    }

    fn describe(&self) -> String {
        match &self.selected {
            Some(model) => model.describe(),
            None => self.name().to_string(),
        }
    }
}
