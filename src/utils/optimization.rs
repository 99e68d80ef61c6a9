//! Bounded Nelder-Mead minimisation used for model parameter estimation.

use std::cmp::Ordering;

/// Result of Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// The best point found.
    pub optimal_point: Vec<f64>,
    /// Objective value at the best point.
    pub optimal_value: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether the simplex converged before `max_iter`.
    pub converged: bool,
}

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iter: usize,
    /// Stop when the spread of objective values falls below this.
    pub tolerance: f64,
    /// Reflection coefficient.
    pub alpha: f64,
    /// Expansion coefficient.
    pub gamma: f64,
    /// Contraction coefficient.
    pub rho: f64,
    /// Shrink coefficient.
    pub sigma: f64,
    /// Initial simplex step, relative to the start value (absolute near zero).
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.1,
        }
    }
}

struct Vertex {
    point: Vec<f64>,
    value: f64,
}

/// Minimise `objective` starting from `initial`, keeping every coordinate
/// inside `bounds` (when given) by clamping.
///
/// Non-finite objective values are treated as +infinity.
///
/// # Example
/// ```
/// use panel_forecast::utils::optimization::{nelder_mead, NelderMeadConfig};
///
/// let result = nelder_mead(
///     |x| (x[0] - 2.0).powi(2) + (x[1] + 1.0).powi(2),
///     &[0.0, 0.0],
///     None,
///     &NelderMeadConfig::default(),
/// );
/// assert!((result.optimal_point[0] - 2.0).abs() < 1e-3);
/// assert!((result.optimal_point[1] + 1.0).abs() < 1e-3);
/// ```
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: Option<&[(f64, f64)]>,
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    let eval = |point: &[f64]| {
        let v = objective(point);
        if v.is_finite() {
            v
        } else {
            f64::INFINITY
        }
    };

    if n == 0 {
        return NelderMeadResult {
            optimal_point: Vec::new(),
            optimal_value: eval(initial),
            iterations: 0,
            converged: true,
        };
    }

    let clamp = |mut point: Vec<f64>| {
        if let Some(bounds) = bounds {
            for (x, &(lo, hi)) in point.iter_mut().zip(bounds) {
                *x = x.clamp(lo, hi);
            }
        }
        point
    };

    let start = clamp(initial.to_vec());
    let mut simplex: Vec<Vertex> = Vec::with_capacity(n + 1);
    simplex.push(Vertex {
        value: eval(&start),
        point: start.clone(),
    });
    for i in 0..n {
        let mut point = start.clone();
        let step = if point[i].abs() > 1e-8 {
            config.initial_step * point[i].abs()
        } else {
            config.initial_step
        };
        point[i] += step;
        // Step inward if the bound swallowed the move.
        let mut point = clamp(point);
        if (point[i] - start[i]).abs() < 1e-12 {
            point[i] -= step;
            point = clamp(point);
        }
        simplex.push(Vertex {
            value: eval(&point),
            point,
        });
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;
        simplex.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));

        let best = simplex[0].value;
        let worst = simplex[n].value;
        if worst.is_finite() && (worst - best).abs() <= config.tolerance * (1.0 + best.abs()) {
            converged = true;
            break;
        }

        let centroid: Vec<f64> = (0..n)
            .map(|j| simplex[..n].iter().map(|v| v.point[j]).sum::<f64>() / n as f64)
            .collect();
        let towards = |from: &[f64], coef: f64| -> Vec<f64> {
            clamp(
                centroid
                    .iter()
                    .zip(from)
                    .map(|(c, x)| c + coef * (x - c))
                    .collect(),
            )
        };

        let reflected = towards(&simplex[n].point, -config.alpha);
        let reflected_value = eval(&reflected);

        if reflected_value < simplex[0].value {
            let expanded = towards(&simplex[n].point, -config.alpha * config.gamma);
            let expanded_value = eval(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                Vertex {
                    point: expanded,
                    value: expanded_value,
                }
            } else {
                Vertex {
                    point: reflected,
                    value: reflected_value,
                }
            };
            continue;
        }

        if reflected_value < simplex[n - 1].value {
            simplex[n] = Vertex {
                point: reflected,
                value: reflected_value,
            };
            continue;
        }

        let (contracted, contracted_value) = if reflected_value < simplex[n].value {
            let p = towards(&reflected, config.rho);
            let v = eval(&p);
            (p, v)
        } else {
            let p = towards(&simplex[n].point, config.rho);
            let v = eval(&p);
            (p, v)
        };
        if contracted_value < simplex[n].value.min(reflected_value) {
            simplex[n] = Vertex {
                point: contracted,
                value: contracted_value,
            };
            continue;
        }

        let anchor = simplex[0].point.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let point = clamp(
                anchor
                    .iter()
                    .zip(&vertex.point)
                    .map(|(a, x)| a + config.sigma * (x - a))
                    .collect(),
            );
            vertex.value = eval(&point);
            vertex.point = point;
        }
    }

    simplex.sort_by(|a, b| a.value.partial_cmp(&b.value).unwrap_or(Ordering::Equal));
    let best = simplex.swap_remove(0);
    NelderMeadResult {
        optimal_point: best.point,
        optimal_value: best.value,
        iterations,
        converged,
    }
}
