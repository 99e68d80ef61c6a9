//! Seasonal ARIMA model estimated by conditional sum of squares.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::models::arima::diff::{
    difference, differencing_polynomial, poly_mul, seasonal_difference, seasonal_lag_polynomial,
};
use crate::models::Forecaster;
use crate::utils::optimization::{nelder_mead, NelderMeadConfig};
use crate::utils::stats::mean;
use std::fmt;

/// Coefficient bound keeping the optimiser away from unit roots.
const COEF_BOUND: f64 = 0.98;

/// ARIMA(p, d, q)(P, D, Q)\[period\] order with an optional constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ARIMASpec {
    /// AR order (p)
    pub p: usize,
    /// Differencing order (d)
    pub d: usize,
    /// MA order (q)
    pub q: usize,
    /// Seasonal AR order (P)
    pub seasonal_p: usize,
    /// Seasonal differencing order (D)
    pub seasonal_d: usize,
    /// Seasonal MA order (Q)
    pub seasonal_q: usize,
    /// Seasonal period; 0 or 1 means non-seasonal.
    pub period: usize,
    /// Include a mean (d + D = 0) or drift (d + D = 1) term.
    pub include_constant: bool,
}

impl ARIMASpec {
    /// Non-seasonal ARIMA(p, d, q) without a constant.
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
            include_constant: false,
        }
    }

    /// Add seasonal orders (P, D, Q) at `period`.
    pub fn seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self.period = period;
        self
    }

    pub fn with_constant(mut self, include_constant: bool) -> Self {
        self.include_constant = include_constant;
        self
    }

    /// Whether any seasonal term is active.
    pub fn is_seasonal(&self) -> bool {
        self.period > 1 && (self.seasonal_p + self.seasonal_d + self.seasonal_q) > 0
    }

    fn effective_period(&self) -> usize {
        if self.is_seasonal() {
            self.period
        } else {
            0
        }
    }

    /// Number of estimated coefficients, excluding the innovation variance.
    pub fn num_params(&self) -> usize {
        let seasonal = if self.is_seasonal() {
            self.seasonal_p + self.seasonal_q
        } else {
            0
        };
        self.p + self.q + seasonal + usize::from(self.include_constant)
    }

    /// Observations lost to differencing.
    pub fn differencing_loss(&self) -> usize {
        self.d + self.seasonal_d * self.effective_period()
    }

    /// Largest lag of the stationary AR polynomial.
    pub fn ar_lag(&self) -> usize {
        let seasonal = if self.is_seasonal() {
            self.seasonal_p * self.period
        } else {
            0
        };
        self.p + seasonal
    }

    pub fn validate(&self) -> Result<()> {
        if self.include_constant && self.d + self.seasonal_d > 1 {
            return Err(ForecastError::InvalidParameter(format!(
                "{} cannot carry a constant with more than one difference",
                self
            )));
        }
        if (self.seasonal_p + self.seasonal_d + self.seasonal_q) > 0 && self.period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonal orders need a period of at least 2, got {}",
                self.period
            )));
        }
        Ok(())
    }
}

impl Default for ARIMASpec {
    fn default() -> Self {
        Self::new(1, 1, 1)
    }
}

impl fmt::Display for ARIMASpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(
                f,
                "({},{},{})[{}]",
                self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
            )?;
        }
        if self.include_constant {
            let term = if self.d + self.seasonal_d == 0 {
                "mean"
            } else {
                "drift"
            };
            write!(f, " w/ {}", term)?;
        }
        Ok(())
    }
}

/// Estimated ARIMA coefficients.
#[derive(Debug, Clone, PartialEq)]
struct Coefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    constant: f64,
}

impl Coefficients {
    fn unpack(spec: &ARIMASpec, params: &[f64]) -> Self {
        let (p, q) = (spec.p, spec.q);
        let (sp, sq) = if spec.is_seasonal() {
            (spec.seasonal_p, spec.seasonal_q)
        } else {
            (0, 0)
        };
        let mut cursor = 0;
        let mut take = |k: usize| {
            let end = (cursor + k).min(params.len());
            let head = params[cursor.min(end)..end].to_vec();
            cursor = end;
            head
        };
        let ar = take(p);
        let ma = take(q);
        let seasonal_ar = take(sp);
        let seasonal_ma = take(sq);
        let constant = if spec.include_constant {
            take(1).first().copied().unwrap_or(0.0)
        } else {
            0.0
        };
        Self {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            constant,
        }
    }

    /// `phi(B) Phi(B^s)` with a leading 1.
    fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        seasonal_lag_polynomial(&self.ar, &self.seasonal_ar, period, -1.0)
    }

    /// `theta(B) Theta(B^s)` with a leading 1.
    fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        seasonal_lag_polynomial(&self.ma, &self.seasonal_ma, period, 1.0)
    }
}

/// Residuals of a stationary ARMA model for `w` with mean `mu`.
///
/// Innovations before `start` are taken as zero.
fn arma_residuals(w: &[f64], mu: f64, ar_poly: &[f64], ma_poly: &[f64], start: usize) -> Vec<f64> {
    let mut residuals = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut pred = mu;
        for (i, a) in ar_poly.iter().enumerate().skip(1) {
            pred -= a * (w[t - i] - mu);
        }
        for (j, b) in ma_poly.iter().enumerate().skip(1) {
            if j <= t {
                pred += b * residuals[t - j];
            }
        }
        residuals[t] = w[t] - pred;
    }
    residuals
}

/// Seasonal ARIMA forecaster.
///
/// The differenced series `w = (1 - B)^d (1 - B^s)^D y` follows a
/// stationary ARMA model around the constant. Coefficients minimise the
/// conditional sum of squares; forecasts run the fully expanded
/// polynomial on the original scale and their variance comes from the
/// psi weights of that polynomial.
#[derive(Debug, Clone)]
pub struct ARIMA {
    spec: ARIMASpec,
    /// First differenced index whose residual enters the likelihood.
    condition_on: Option<usize>,
    state: Option<ArimaState>,
}

#[derive(Debug, Clone)]
struct ArimaState {
    coefficients: Coefficients,
    /// Expanded AR polynomial including differencing, on the original scale.
    full_ar: Vec<f64>,
    full_ma: Vec<f64>,
    /// Constant of the expanded recursion.
    intercept: f64,
    history: Vec<f64>,
    /// Innovations aligned with `history` (zero before the first residual).
    innovations: Vec<f64>,
    fitted: Vec<f64>,
    residuals: Vec<f64>,
    sigma2: f64,
    log_likelihood: f64,
    n_used: usize,
}

impl ARIMA {
    pub fn new(spec: ARIMASpec) -> Self {
        Self {
            spec,
            condition_on: None,
            state: None,
        }
    }

    /// Count residuals only from this index of the differenced series, so
    /// likelihoods of models with different AR lags stay comparable.
    pub fn condition_on(mut self, start: usize) -> Self {
        self.condition_on = Some(start);
        self
    }

    pub fn spec(&self) -> ARIMASpec {
        self.spec
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        self.state
            .as_ref()
            .map(|s| s.coefficients.ar.as_slice())
            .unwrap_or(&[])
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        self.state
            .as_ref()
            .map(|s| s.coefficients.ma.as_slice())
            .unwrap_or(&[])
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        self.state
            .as_ref()
            .map(|s| s.coefficients.seasonal_ar.as_slice())
            .unwrap_or(&[])
    }

    /// Estimated mean (d + D = 0) or drift per step of the differenced series.
    pub fn constant(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.coefficients.constant)
    }

    pub fn sigma2(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.sigma2)
    }

    pub fn log_likelihood(&self) -> Option<f64> {
        self.state.as_ref().map(|s| s.log_likelihood)
    }

    /// Akaike criterion counting the innovation variance as a parameter.
    pub fn aic(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let k = (self.spec.num_params() + 1) as f64;
        Some(-2.0 * state.log_likelihood + 2.0 * k)
    }

    /// Small-sample corrected AIC; infinite when too few residuals remain.
    pub fn aicc(&self) -> Option<f64> {
        let state = self.state.as_ref()?;
        let k = (self.spec.num_params() + 1) as f64;
        let n = state.n_used as f64;
        let aic = self.aic()?;
        if n - k - 1.0 <= 0.0 {
            return Some(f64::INFINITY);
        }
        Some(aic + 2.0 * k * (k + 1.0) / (n - k - 1.0))
    }

    fn css(&self, w: &[f64], spec: &ARIMASpec, params: &[f64], start: usize) -> f64 {
        let period = spec.effective_period();
        let coefs = Coefficients::unpack(spec, params);
        let mu = if spec.include_constant {
            coefs.constant
        } else {
            0.0
        };
        let residuals = arma_residuals(
            w,
            mu,
            &coefs.ar_polynomial(period),
            &coefs.ma_polynomial(period),
            spec.ar_lag(),
        );
        residuals[start..].iter().map(|e| e * e).sum()
    }

    /// Psi weights of the expanded model, `psi[0] = 1`.
    fn psi_weights(full_ar: &[f64], full_ma: &[f64], horizon: usize) -> Vec<f64> {
        let mut psi = vec![0.0; horizon];
        if horizon == 0 {
            return psi;
        }
        psi[0] = 1.0;
        for j in 1..horizon {
            let mut value = full_ma.get(j).copied().unwrap_or(0.0);
            for (i, a) in full_ar.iter().enumerate().skip(1).take(j) {
                value -= a * psi[j - i];
            }
            psi[j] = value;
        }
        psi
    }
}

impl Default for ARIMA {
    fn default() -> Self {
        Self::new(ARIMASpec::default())
    }
}

impl Forecaster for ARIMA {
    fn fit(&mut self, values: &[f64]) -> Result<()> {
        let spec = self.spec;
        spec.validate()?;
        let period = spec.effective_period();

        let w = seasonal_difference(&difference(values, spec.d), spec.seasonal_d, period);
        let own_start = spec.ar_lag();
        let start = self.condition_on.unwrap_or(own_start).max(own_start);
        let k = spec.num_params() + 1;
        let needed = spec.differencing_loss() + start + k + 1;
        if w.len() < start + k + 1 {
            return Err(ForecastError::InsufficientData {
                needed,
                got: values.len(),
            });
        }

        let w_mean = mean(&w);
        let w_spread = w
            .iter()
            .map(|v| (v - w_mean).abs())
            .fold(0.0_f64, f64::max)
            .max(1e-8);

        let n_coefs = spec.num_params() - usize::from(spec.include_constant);
        let mut initial = vec![0.0; n_coefs];
        let mut bounds = vec![(-COEF_BOUND, COEF_BOUND); n_coefs];
        if spec.include_constant {
            initial.push(w_mean);
            bounds.push((w_mean - 2.0 * w_spread, w_mean + 2.0 * w_spread));
        }

        let config = NelderMeadConfig {
            max_iter: 200 * (initial.len() + 1),
            tolerance: 1e-10,
            ..Default::default()
        };
        let result = nelder_mead(
            |params| self.css(&w, &spec, params, start),
            &initial,
            Some(&bounds),
            &config,
        );
        if !result.optimal_value.is_finite() {
            return Err(ForecastError::ComputationError(format!(
                "{} sum of squares did not converge",
                spec
            )));
        }

        let coefficients = Coefficients::unpack(&spec, &result.optimal_point);
        let mu = if spec.include_constant {
            coefficients.constant
        } else {
            0.0
        };
        let ar_poly = coefficients.ar_polynomial(period);
        let ma_poly = coefficients.ma_polynomial(period);
        let w_residuals = arma_residuals(&w, mu, &ar_poly, &ma_poly, own_start);

        let n_used = w.len() - start;
        let sse: f64 = w_residuals[start..].iter().map(|e| e * e).sum();
        let sigma2 = sse / n_used as f64;
        if !sigma2.is_finite() {
            return Err(ForecastError::ComputationError(format!(
                "{} produced a non-finite variance",
                spec
            )));
        }
        let log_likelihood = -0.5
            * n_used as f64
            * ((2.0 * std::f64::consts::PI * sigma2.max(f64::MIN_POSITIVE)).ln() + 1.0);

        let full_ar = poly_mul(
            &ar_poly,
            &differencing_polynomial(spec.d, spec.seasonal_d, period),
        );
        let intercept = mu * ar_poly.iter().sum::<f64>();

        let offset = spec.differencing_loss();
        let mut innovations = vec![0.0; values.len()];
        let mut fitted = vec![f64::NAN; values.len()];
        let mut residuals = vec![f64::NAN; values.len()];
        for (t, e) in w_residuals.iter().enumerate() {
            let idx = t + offset;
            innovations[idx] = *e;
            if t >= own_start {
                residuals[idx] = *e;
                fitted[idx] = values[idx] - e;
            }
        }

        self.state = Some(ArimaState {
            coefficients,
            full_ar,
            full_ma: ma_poly,
            intercept,
            history: values.to_vec(),
            innovations,
            fitted,
            residuals,
            sigma2,
            log_likelihood,
            n_used,
        });
        Ok(())
    }

    fn predict(&self, horizon: usize) -> Result<Forecast> {
        let state = self.state.as_ref().ok_or(ForecastError::FitRequired)?;

        let n = state.history.len();
        let mut y = state.history.clone();
        let mut e = state.innovations.clone();
        y.reserve(horizon);
        e.resize(n + horizon, 0.0);

        for t in n..n + horizon {
            let mut value = state.intercept;
            for (i, a) in state.full_ar.iter().enumerate().skip(1) {
                if let Some(prev) = t.checked_sub(i).and_then(|idx| y.get(idx)) {
                    value -= a * prev;
                }
            }
            for (j, b) in state.full_ma.iter().enumerate().skip(1) {
                if let Some(prev) = t.checked_sub(j).and_then(|idx| e.get(idx)) {
                    value += b * prev;
                }
            }
            y.push(value);
        }

        let psi = Self::psi_weights(&state.full_ar, &state.full_ma, horizon);
        let mut cumulative = 0.0;
        let std_error = psi
            .iter()
            .map(|w| {
                cumulative += w * w;
                (state.sigma2 * cumulative).sqrt()
            })
            .collect();

        Forecast::from_parts(y.split_off(n), std_error)
    }

    fn fitted_values(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.fitted.as_slice())
    }

    fn residuals(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.residuals.as_slice())
    }

    fn name(&self) -> &str {
        "ARIMA"
    }

    fn describe(&self) -> String {
        self.spec.to_string()
    }
}
