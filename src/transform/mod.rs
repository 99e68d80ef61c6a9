//! Value transforms applied before fitting and inverted on forecasts.
//!
//! Models are fitted on `forward(y)`; forecast quantiles are mapped back
//! with [`Transform::inverse`], which is monotone so quantiles stay
//! quantiles. The mean needs a bias adjustment, see
//! [`Transform::inverse_mean`].

use crate::error::{ForecastError, Result};
use std::fmt;

/// Box-Cox lambdas this close to zero are treated as the log transform.
const LOG_EPS: f64 = 1e-10;

/// A variance-stabilising transform of the series values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Transform {
    #[default]
    Identity,
    /// Natural logarithm.
    Log,
    /// Box-Cox power transform: `(y^lambda - 1) / lambda`.
    BoxCox { lambda: f64 },
}

impl Transform {
    /// Parse a config name: `identity`/`none`, `log`, or `box_cox` with a lambda.
    pub fn from_name(name: &str, lambda: Option<f64>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "identity" | "none" => Ok(Transform::Identity),
            "log" => Ok(Transform::Log),
            "box_cox" | "boxcox" => {
                let lambda = lambda.ok_or_else(|| {
                    ForecastError::Config("box_cox transform needs a lambda".to_string())
                })?;
                Ok(Transform::box_cox(lambda))
            }
            other => Err(ForecastError::Config(format!("unknown transform '{}'", other))),
        }
    }

    /// Box-Cox with the given lambda; lambda 0 is the log transform.
    pub fn box_cox(lambda: f64) -> Self {
        if lambda.abs() < LOG_EPS {
            Transform::Log
        } else {
            Transform::BoxCox { lambda }
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transform::Identity)
    }

    /// Transform a whole series. Log and Box-Cox need strictly positive values.
    pub fn forward(&self, values: &[f64]) -> Result<Vec<f64>> {
        match *self {
            Transform::Identity => Ok(values.to_vec()),
            Transform::Log => {
                self.require_positive(values)?;
                Ok(values.iter().map(|y| y.ln()).collect())
            }
            Transform::BoxCox { lambda } => {
                self.require_positive(values)?;
                Ok(values
                    .iter()
                    .map(|y| (y.powf(lambda) - 1.0) / lambda)
                    .collect())
            }
        }
    }

    /// Map one value from the model scale back to the original scale.
    pub fn inverse(&self, z: f64) -> f64 {
        match *self {
            Transform::Identity => z,
            Transform::Log => z.exp(),
            Transform::BoxCox { lambda } => {
                let base = lambda * z + 1.0;
                if base > 0.0 {
                    base.powf(1.0 / lambda)
                } else if lambda > 0.0 {
                    // Below the range of the transform.
                    0.0
                } else {
                    // At or above the -1/lambda ceiling of the range.
                    f64::INFINITY
                }
            }
        }
    }

    /// Back-transformed mean of a normal variable with mean `mu` and
    /// standard deviation `sigma` on the model scale.
    ///
    /// Exact for the log transform, second-order Taylor approximation for
    /// Box-Cox.
    pub fn inverse_mean(&self, mu: f64, sigma: f64) -> f64 {
        let var = sigma * sigma;
        match *self {
            Transform::Identity => mu,
            Transform::Log => (mu + var / 2.0).exp(),
            Transform::BoxCox { lambda } => {
                let base = lambda * mu + 1.0;
                if base <= 0.0 {
                    return self.inverse(mu);
                }
                self.inverse(mu) * (1.0 + var * (1.0 - lambda) / (2.0 * base * base))
            }
        }
    }

    fn require_positive(&self, values: &[f64]) -> Result<()> {
        if values.iter().any(|&y| y <= 0.0) {
            return Err(ForecastError::NonPositiveValues {
                transform: self.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Identity => write!(f, "identity"),
            Transform::Log => write!(f, "log"),
            Transform::BoxCox { lambda } => write!(f, "box_cox({})", lambda),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn forward_then_inverse_recovers_values() {
        let values = [0.5, 1.0, 20.0, 3000.0];
        for transform in [
            Transform::Identity,
            Transform::Log,
            Transform::box_cox(0.3),
            Transform::box_cox(-0.5),
        ] {
            let z = transform.forward(&values).unwrap();
            for (orig, z) in values.iter().zip(z) {
                assert_relative_eq!(transform.inverse(z), *orig, max_relative = 1e-10);
            }
        }
    }

    #[test]
    fn log_rejects_non_positive_values() {
        let err = Transform::Log.forward(&[1.0, 0.0]).unwrap_err();
        assert_eq!(
            err,
            ForecastError::NonPositiveValues {
                transform: "log".to_string()
            }
        );
        assert!(Transform::Identity.forward(&[-1.0]).is_ok());
    }

    #[test]
    fn box_cox_zero_is_log() {
        assert_eq!(Transform::box_cox(0.0), Transform::Log);
        assert_eq!(
            Transform::from_name("box_cox", Some(0.5)).unwrap(),
            Transform::BoxCox { lambda: 0.5 }
        );
        assert!(Transform::from_name("box_cox", None).is_err());
        assert!(Transform::from_name("sqrt", None).is_err());
        assert_eq!(Transform::from_name("LOG", None).unwrap(), Transform::Log);
    }

    #[test]
    fn inverse_mean_adds_bias_adjustment() {
        assert_relative_eq!(Transform::Log.inverse_mean(1.0, 0.0), 1.0_f64.exp());
        assert_relative_eq!(
            Transform::Log.inverse_mean(1.0, 0.5),
            (1.0_f64 + 0.125).exp()
        );
        let half = Transform::box_cox(0.5);
        assert!(half.inverse_mean(2.0, 0.5) > half.inverse(2.0));
        assert_relative_eq!(Transform::Identity.inverse_mean(3.0, 10.0), 3.0);
    }

    #[test]
    fn box_cox_inverse_is_monotone_past_the_range() {
        // lambda = -0.5 maps (0, inf) onto (-inf, 2).
        let t = Transform::box_cox(-0.5);
        assert_relative_eq!(t.inverse(1.9), 400.0, max_relative = 1e-10);
        assert_eq!(t.inverse(2.0), f64::INFINITY);
        assert_eq!(t.inverse(2.5), f64::INFINITY);
        assert!(t.inverse(1.9) < t.inverse(1.99));
        assert_eq!(t.inverse_mean(2.5, 0.1), f64::INFINITY);

        // lambda = 0.5 maps (0, inf) onto (-2, inf).
        let t = Transform::box_cox(0.5);
        assert_eq!(t.inverse(-2.5), 0.0);
        assert!(t.inverse(-2.5) <= t.inverse(-1.9));
    }
}
