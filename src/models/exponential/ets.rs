//! ETS (Error-Trend-Seasonal) state-space forecasting model.
//!
//! Level, trend and seasonal states follow the innovations form of
//! exponential smoothing. The error type changes the likelihood and the
//! scale of the prediction variance, not the state recursions.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use std::fmt;
use std::str::FromStr;

const SMOOTHING_BOUNDS: (f64, f64) = (1e-4, 0.9999);
const DAMPING_BOUNDS: (f64, f64) = (0.8, 0.98);

/// Error component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorType {
    #[default]
    Additive,
    Multiplicative,
}

/// Trend component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrendType {
    #[default]
    None,
    Additive,
    AdditiveDamped,
}

/// Seasonal component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeasonalType {
    #[default]
    None,
    Additive,
    Multiplicative,
}

/// ETS model specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ETSSpec {
    pub error: ErrorType,
    pub trend: TrendType,
    pub seasonal: SeasonalType,
}

impl ETSSpec {
    pub fn new(error: ErrorType, trend: TrendType, seasonal: SeasonalType) -> Self {
        Self {
            error,
            trend,
            seasonal,
        }
    }

    /// ETS(A,N,N) - Simple exponential smoothing with additive errors.
    pub fn ann() -> Self {
        Self::new(ErrorType::Additive, TrendType::None, SeasonalType::None)
    }

    /// ETS(A,A,A) - Additive Holt-Winters.
    pub fn aaa() -> Self {
        Self::new(
            ErrorType::Additive,
            TrendType::Additive,
            SeasonalType::Additive,
        )
    }

    /// ETS(M,Ad,M) - Damped multiplicative Holt-Winters.
    pub fn madm() -> Self {
        Self::new(
            ErrorType::Multiplicative,
            TrendType::AdditiveDamped,
            SeasonalType::Multiplicative,
        )
    }

    pub fn has_trend(&self) -> bool {
        !matches!(self.trend, TrendType::None)
    }

    pub fn has_seasonal(&self) -> bool {
        !matches!(self.seasonal, SeasonalType::None)
    }

    pub fn is_damped(&self) -> bool {
        matches!(self.trend, TrendType::AdditiveDamped)
    }

    /// Whether any component needs strictly positive data.
    pub fn is_multiplicative(&self) -> bool {
        self.error == ErrorType::Multiplicative || self.seasonal == SeasonalType::Multiplicative
    }

    /// Number of smoothing parameters (alpha, beta, gamma, phi).
    fn num_smoothing(&self) -> usize {
        1 + usize::from(self.has_trend())
            + usize::from(self.has_seasonal())
            + usize::from(self.is_damped())
    }
}

impl fmt::Display for ETSSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let e = match self.error {
            ErrorType::Additive => "A",
            ErrorType::Multiplicative => "M",
        };
        let t = match self.trend {
            TrendType::None => "N",
            TrendType::Additive => "A",
            TrendType::AdditiveDamped => "Ad",
        };
        let s = match self.seasonal {
            SeasonalType::None => "N",
            SeasonalType::Additive => "A",
            SeasonalType::Multiplicative => "M",
        };
        write!(f, "ETS({},{},{})", e, t, s)
    }
}

impl FromStr for ETSSpec {
    type Err = ForecastError;

    /// Parse `"M,Ad,M"` or `"ETS(M,Ad,M)"`.
    fn from_str(s: &str) -> Result<Self> {
        let inner = s
            .trim()
            .trim_start_matches("ETS(")
            .trim_end_matches(')');
        let parts: Vec<String> = inner
            .split(',')
            .map(|p| p.trim().to_ascii_uppercase())
            .collect();
        let invalid = || ForecastError::InvalidParameter(format!("invalid ETS spec '{}'", s));
        let [e, t, m] = parts.as_slice() else {
            return Err(invalid());
        };
        let error = match e.as_str() {
            "A" => ErrorType::Additive,
            "M" => ErrorType::Multiplicative,
            _ => return Err(invalid()),
        };
        let trend = match t.as_str() {
            "N" => TrendType::None,
            "A" => TrendType::Additive,
            "AD" => TrendType::AdditiveDamped,
            _ => return Err(invalid()),
        };
        let seasonal = match m.as_str() {
            "N" => SeasonalType::None,
            "A" => SeasonalType::Additive,
            "M" => SeasonalType::Multiplicative,
            _ => return Err(invalid()),
        };
        Ok(Self::new(error, trend, seasonal))
    }
}

/// Smoothing parameters in the innovations form (`beta` and `gamma` are
/// already scaled, so `beta <= alpha` and `gamma <= 1 - alpha`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingParams {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub phi: f64,
}

/// Initial states at time zero.
#[derive(Debug, Clone)]
struct States {
    level: f64,
    trend: f64,
    season: Vec<f64>,
}

/// Output of one pass of the state recursions.
#[derive(Debug, Clone)]
struct Filtered {
    fitted: Vec<f64>,
    sse: f64,
    sum_log_fitted: f64,
    last: States,
}

/// ETS state-space model.
#[derive(Debug, Clone)]
pub struct ETS {
    spec: ETSSpec,
    seasonal_period: usize,
    fixed: Option<SmoothingParams>,
    state: Option<EtsState>,
}

#[derive(Debug, Clone)]
struct EtsState {
    params: SmoothingParams,
    last: States,
    n: usize,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
}

impl ETS {
    /// Create an ETS model whose smoothing parameters are estimated.
    pub fn new(spec: ETSSpec, seasonal_period: usize) -> Self {
        Self {
            spec,
            seasonal_period,
            fixed: None,
            state: None,
        }
    }

    /// Create an ETS model with fixed smoothing parameters.
    pub fn with_params(spec: ETSSpec, seasonal_period: usize, params: SmoothingParams) -> Self {
        Self {
            fixed: Some(params),
            ..Self::new(spec, seasonal_period)
        }
    }

    pub fn spec(&self) -> ETSSpec {
        self.spec
    }

    pub fn params(&self) -> Option<SmoothingParams> {
        self.state.as_ref().map(|s| s.params)
    }

    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.log_likelihood)
    }

    /// Parameters counted by the information criteria: smoothing
    /// parameters, free initial states and the innovation variance.
    pub fn num_params(&self) -> usize {
        let initial = 1
            + usize::from(self.spec.has_trend())
            + if self.spec.has_seasonal() {
                self.period() - 1
            } else {
                0
            };
        self.spec.num_smoothing() + initial + 1
    }

    pub fn aic(&self) -> Option<f64> {
        let ll = self.log_likelihood()?;
        Some(-2.0 * ll + 2.0 * self.num_params() as f64)
    }

    /// Small-sample corrected AIC; infinite when too few observations remain.
    pub fn aicc(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let k = self.num_params() as f64;
        let n = state.n as f64;
        let aic = self.aic()?;
        if n - k - 1.0 <= 0.0 {
            return Some(f64::INFINITY);
        }
        Some(aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
    }

    fn period(&self) -> usize {
        if self.spec.has_seasonal() {
            self.seasonal_period.max(1)
        } else {
            1
        }
    }

    /// Minimum series length for the initial states.
    pub fn min_observations(&self) -> usize {
        if self.spec.has_seasonal() {
            2 * self.period()
        } else if self.spec.has_trend() {
            4
        } else {
            3
        }
    }

    fn initial_states(&self, values: &[f64]) -> States {
        let m = self.period();
        let multiplicative = self.spec.seasonal == SeasonalType::Multiplicative;

        if !self.spec.has_seasonal() {
            let (level, trend) = if self.spec.has_trend() {
                let k = values.len().min(10);
                let (intercept, slope) = line_fit(&values[..k]);
                (intercept - slope, slope)
            } else {
                (values[0], 0.0)
            };
            return States {
                level,
                trend,
                season: Vec::new(),
            };
        }

        let first = values[..m].iter().sum::<f64>() / m as f64;
        let second = values[m..2 * m].iter().sum::<f64>() / m as f64;
        let trend = if self.spec.has_trend() {
            (second - first) / m as f64
        } else {
            0.0
        };
        let centre = (m as f64 - 1.0) / 2.0;
        let mut season: Vec<f64> = values[..m]
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let base = first + (i as f64 - centre) * trend;
                if multiplicative {
                    y / base
                } else {
                    y - base
                }
            })
            .collect();
        let avg = season.iter().sum::<f64>() / m as f64;
        for s in &mut season {
            if multiplicative {
                *s /= avg;
            } else {
                *s -= avg;
            }
        }
        States {
            level: first - (centre + 1.0) * trend,
            trend,
            season,
        }
    }

    /// Run the state recursions; None when a multiplicative state leaves
    /// the positive range.
    fn filter(&self, values: &[f64], init: &States, p: &SmoothingParams) -> Option<Filtered> {
        let m = self.period();
        let has_trend = self.spec.has_trend();
        let phi = if self.spec.is_damped() { p.phi } else { 1.0 };
        let mult_error = self.spec.error == ErrorType::Multiplicative;

        let mut level = init.level;
        let mut trend = init.trend;
        let mut season = init.season.clone();
        let mut fitted = Vec::with_capacity(values.len());
        let mut sse = 0.0;
        let mut sum_log_fitted = 0.0;

        for (t, &y) in values.iter().enumerate() {
            let q = if has_trend { level + phi * trend } else { level };
            let (yhat, deseasonal, seasonal_signal) = match self.spec.seasonal {
                SeasonalType::None => (q, y, 0.0),
                SeasonalType::Additive => {
                    let s = season[t % m];
                    (q + s, y - s, y - q)
                }
                SeasonalType::Multiplicative => {
                    let s = season[t % m];
                    if s <= 0.0 || q <= 0.0 {
                        return None;
                    }
                    (q * s, y / s, y / q)
                }
            };
            if !yhat.is_finite() || (mult_error && yhat <= 0.0) {
                return None;
            }
            fitted.push(yhat);

            let error = if mult_error { (y - yhat) / yhat } else { y - yhat };
            sse += error * error;
            if mult_error {
                sum_log_fitted += yhat.abs().ln();
            }

            let new_level = q + p.alpha * (deseasonal - q);
            if has_trend {
                trend = phi * trend + (p.beta / p.alpha) * (new_level - level - phi * trend);
            }
            level = new_level;
            if self.spec.has_seasonal() {
                let s = season[t % m];
                season[t % m] = s + p.gamma * (seasonal_signal - s);
            }
        }

        Some(Filtered {
            fitted,
            sse,
            sum_log_fitted,
            last: States {
                level,
                trend,
                season,
            },
        })
    }

    fn log_likelihood_of(&self, filtered: &Filtered, n: usize) -> f64 {
        let nf = n as f64;
        let sigma2 = (filtered.sse / nf).max(f64::MIN_POSITIVE);
        -0.5 * nf * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0) - filtered.sum_log_fitted
    }

    /// Map an optimiser vector onto constrained smoothing parameters.
    fn unpack(&self, x: &[f64]) -> SmoothingParams {
        let mut it = x.iter().copied();
        let alpha = it.next().unwrap_or(0.5);
        let beta = if self.spec.has_trend() {
            alpha * it.next().unwrap_or(0.1)
        } else {
            0.0
        };
        let gamma = if self.spec.has_seasonal() {
            (1.0 - alpha) * it.next().unwrap_or(0.1)
        } else {
            0.0
        };
        let phi = if self.spec.is_damped() {
            it.next().unwrap_or(0.98)
        } else {
            1.0
        };
        SmoothingParams {
            alpha,
            beta,
            gamma,
            phi,
        }
    }

    fn estimate(&self, values: &[f64], init: &States) -> SmoothingParams {
        let mut initial = vec![0.3];
        let mut bounds = vec![SMOOTHING_BOUNDS];
        if self.spec.has_trend() {
            initial.push(0.1);
            bounds.push(SMOOTHING_BOUNDS);
        }
        if self.spec.has_seasonal() {
            initial.push(0.1);
            bounds.push(SMOOTHING_BOUNDS);
        }
        if self.spec.is_damped() {
            initial.push(0.95);
            bounds.push(DAMPING_BOUNDS);
        }

        let config = NelderMeadConfig {
            max_iter: 1000,
            tolerance: 1e-8,
            ..Default::default()
        };
        let n = values.len();
        let result = nelder_mead(
            |x| match self.filter(values, init, &self.unpack(x)) {
                Some(filtered) => -self.log_likelihood_of(&filtered, n),
                None => f64::INFINITY,
            },
            &initial,
            Some(&bounds),
            &config,
        );
        self.unpack(&result.optimal_point)
    }

    /// `c_j` coefficients of the linear innovations form for `j = 1..h`.
    fn variance_weights(&self, params: &SmoothingParams, horizon: usize) -> Vec<f64> {
        let m = self.period();
        let phi = if self.spec.is_damped() { params.phi } else { 1.0 };
        let mut damped_sum = 0.0;
        (1..horizon)
            .map(|j| {
                damped_sum += phi.powi(j as i32);
                let mut c = params.alpha;
                if self.spec.has_trend() {
                    c += params.beta * damped_sum;
                }
                if self.spec.has_seasonal() && j % m == 0 {
                    c += params.gamma;
                }
                c
            })
            .collect()
    }
}

/// Least-squares intercept and slope of `values` against `0..n`.
fn line_fit(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let t_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (t, y) in values.iter().enumerate() {
        let dt = t as f64 - t_mean;
        sxy += dt * (y - y_mean);
        sxx += dt * dt;
    }
    let slope = if sxx > 0.0 { sxy / sxx } else { 0.0 };
    (y_mean - slope * t_mean, slope)
}

impl Default for ETS {
    fn default() -> Self {
        Self::new(ETSSpec::ann(), 1)
    }
}

impl Forecaster for ETS {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        let needed = self.min_observations();
        if values.len() < needed {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }
        if self.spec.is_multiplicative() && values.iter().any(|&y| y <= 0.0) {
            return Err(ForecastError::InvalidParameter(format!(
                "{} needs strictly positive data",
                self.spec
            )));
        }

        let init = self.initial_states(values);
        let params = match self.fixed {
            Some(p) => p,
            None => self.estimate(values, &init),
        };
        let filtered = self.filter(values, &init, &params).ok_or_else(|| {
            ForecastError::ComputationError(format!("{} states left the valid range", self.spec))
        })?;

        let n = values.len();
        let sigma2 = filtered.sse / n as f64;
        let log_likelihood = self.log_likelihood_of(&filtered, n);
        if !sigma2.is_finite() || !log_likelihood.is_finite() {
            return Err(ForecastError::ComputationError(format!(
                "{} likelihood is not finite",
                self.spec
            )));
        }
        let residuals = values
            .iter()
            .zip(&filtered.fitted)
            .map(|(y, f)| y - f)
            .collect();

        self.state = Some(EtsState {
            params,
            last: filtered.last,
            n,
            fitted: filtered.fitted,
            residuals,
            sigma2,
            log_likelihood,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;
        let m = self.period();
        let p = &state.params;
        let phi = if self.spec.is_damped() { p.phi } else { 1.0 };

        let mut mean = Vec::with_capacity(horizon);
        let mut damped_sum = 0.0;
        for h in 1..=horizon {
            damped_sum += phi.powi(h as i32);
            let q = if self.spec.has_trend() {
                state.last.level + damped_sum * state.last.trend
            } else {
                state.last.level
            };
            let value = match self.spec.seasonal {
                SeasonalType::None => q,
                SeasonalType::Additive => q + state.last.season[(state.n + h - 1) % m],
                SeasonalType::Multiplicative => q * state.last.season[(state.n + h - 1) % m],
            };
            mean.push(value);
        }

        let weights = self.variance_weights(p, horizon);
        let mut cumulative = 1.0;
        let mut std_error = Vec::with_capacity(horizon);
        for (h, mu) in mean.iter().enumerate() {
            if h > 0 {
                cumulative += weights[h - 1] * weights[h - 1];
            }
            let se = (state.sigma2 * cumulative).sqrt();
            std_error.push(if self.spec.error == ErrorType::Multiplicative {
                mu.abs() * se
            } else {
                se
            });
        }
        Forecast::from_parts(mean, std_error)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "ETS"
    }

    fn describe(&self) -> String {
        self.spec.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn seasonal_series(n: usize) -> Vec<f64> {
        (0..n)
            .map(|t| {
                let season = 1.0 + 0.2 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin();
                (100.0 + 0.8 * t as f64) * season * (1.0 + 0.01 * ((t * 7) % 5) as f64)
            })
            .collect()
    }

    #[test]
    fn spec_parses_and_displays() {
        let spec: ETSSpec = "M,Ad,M".parse().unwrap();
        assert_eq!(spec, ETSSpec::madm());
        assert_eq!(spec.to_string(), "ETS(M,Ad,M)");
        assert_eq!("ETS(A,N,N)".parse::<ETSSpec>().unwrap(), ETSSpec::ann());
        assert!("A,X,N".parse::<ETSSpec>().is_err());
        assert!("A,N".parse::<ETSSpec>().is_err());
    }

    #[test]
    fn ses_with_fixed_alpha_matches_recursion() {
        let values = [10.0, 12.0, 11.0, 13.0];
        let params = SmoothingParams {
            alpha: 0.5,
            beta: 0.0,
            gamma: 0.0,
            phi: 1.0,
        };
        let mut model = ETS::with_params(ETSSpec::ann(), 1, params);
        model.fit(&values).unwrap();

        // l0 = 10; l1 = 10; l2 = 11; l3 = 11; l4 = 12
        assert_eq!(model.fitted_values().unwrap(), &[10.0, 10.0, 11.0, 11.0]);
        let fc = model.predict(3).unwrap();
        assert_eq!(fc.mean(), &[12.0, 12.0, 12.0]);

        let sigma2 = model.sigma2().unwrap();
        assert_relative_eq!(sigma2, (0.0 + 4.0 + 0.0 + 4.0) / 4.0);
        // Variance grows by alpha^2 per step.
        assert_relative_eq!(fc.std_error()[1], (sigma2 * 1.25).sqrt());
        assert_relative_eq!(fc.std_error()[2], (sigma2 * 1.5).sqrt());
    }

    #[test]
    fn damped_trend_forecast_flattens() {
        let values: Vec<f64> = (0..40)
            .map(|t| 50.0 + 2.0 * t as f64 + ((t * 3) % 4) as f64)
            .collect();
        let mut model = ETS::new(
            ETSSpec::new(ErrorType::Additive, TrendType::AdditiveDamped, SeasonalType::None),
            1,
        );
        model.fit(&values).unwrap();
        let fc = model.predict(30).unwrap();
        let early = fc.mean()[1] - fc.mean()[0];
        let late = fc.mean()[29] - fc.mean()[28];
        assert!(early > 0.0);
        assert!(late < early);
    }

    #[test]
    fn multiplicative_seasonal_model_tracks_pattern() {
        let values = seasonal_series(60);
        let mut model = ETS::new(ETSSpec::madm(), 12);
        model.fit(&values).unwrap();
        assert!(model.aicc().unwrap().is_finite());

        let fc = model.predict(12).unwrap();
        // Month 3 of the cycle peaks, month 9 troughs.
        assert!(fc.mean()[2] > fc.mean()[8]);
        // Multiplicative error scales the spread with the level.
        assert!(fc.std_error().iter().all(|s| *s > 0.0));
    }

    #[test]
    fn multiplicative_needs_positive_data() {
        let mut model = ETS::new(ETSSpec::madm(), 4);
        let mut values = vec![5.0; 12];
        values[3] = 0.0;
        assert!(matches!(
            model.fit(&values),
            Err(ForecastError::InvalidParameter(_))
        ));
    }

    #[test]
    fn seasonal_needs_two_periods() {
        let mut model = ETS::new(ETSSpec::aaa(), 12);
        assert!(matches!(
            model.fit(&[1.0; 20]),
            Err(ForecastError::InsufficientData { needed: 24, got: 20 })
        ));
        assert!(matches!(ETS::default().predict(1), Err(ForecastError::FitRequired)));
    }

    #[test]
    fn parameter_count_includes_initial_states() {
        assert_eq!(ETS::new(ETSSpec::ann(), 1).num_params(), 3);
        // alpha, beta, gamma, phi + level, trend, 11 seasonal + sigma
        assert_eq!(ETS::new(ETSSpec::madm(), 12).num_params(), 18);
    }
}
