//! Differencing and lag-polynomial helpers for ARIMA models.

/// Difference a series `d` times at lag 1.
///
/// Each pass drops one observation; a series too short for another pass
/// is returned as far as it got.
pub fn difference(series: &[f64], d: usize) -> Vec<f64> {
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= 1 {
            return Vec::new();
        }
        result = result.windows(2).map(|w| w[1] - w[0]).collect();
    }
    result
}

/// Difference a series `d` times at lag `period`.
///
/// Each pass drops `period` observations. A period of 1 is ordinary
/// differencing; a period of 0 leaves the series unchanged.
pub fn seasonal_difference(series: &[f64], d: usize, period: usize) -> Vec<f64> {
    if period == 0 {
        return series.to_vec();
    }
    let mut result = series.to_vec();
    for _ in 0..d {
        if result.len() <= period {
            return Vec::new();
        }
        result = result
            .iter()
            .skip(period)
            .zip(result.iter())
            .map(|(curr, prev)| curr - prev)
            .collect();
    }
    result
}

/// Multiply two lag polynomials given as coefficient vectors
/// (`c[0] + c[1] B + c[2] B^2 + ...`).
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `(1 - B)^d (1 - B^period)^seasonal_d` as a coefficient vector.
pub fn differencing_polynomial(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            poly = poly_mul(&poly, &seasonal);
        }
    }
    poly
}

/// Lag polynomial `1 + sign * (c_1 B + ... + c_p B^p)` combined with its
/// seasonal counterpart in `B^period`.
///
/// With `sign = -1` this is the AR side `phi(B) Phi(B^s)`, with `sign = 1`
/// the MA side `theta(B) Theta(B^s)`.
pub fn seasonal_lag_polynomial(
    nonseasonal: &[f64],
    seasonal: &[f64],
    period: usize,
    sign: f64,
) -> Vec<f64> {
    let mut short = vec![1.0];
    short.extend(nonseasonal.iter().map(|c| sign * c));

    let mut long = vec![0.0; seasonal.len() * period + 1];
    long[0] = 1.0;
    for (i, c) in seasonal.iter().enumerate() {
        long[(i + 1) * period] = sign * c;
    }
    poly_mul(&short, &long)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difference_drops_one_value_per_order() {
        let series = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert_eq!(difference(&series, 0), series.to_vec());
        assert_eq!(difference(&series, 1), vec![3.0, 5.0, 7.0, 9.0]);
        assert_eq!(difference(&series, 2), vec![2.0, 2.0, 2.0]);
        assert!(difference(&[1.0], 1).is_empty());
    }

    #[test]
    fn seasonal_difference_uses_period_lag() {
        let series = [1.0, 2.0, 3.0, 11.0, 12.0, 13.0, 31.0];
        assert_eq!(
            seasonal_difference(&series, 1, 3),
            vec![10.0, 10.0, 10.0, 20.0]
        );
        assert_eq!(seasonal_difference(&series, 1, 1), difference(&series, 1));
        assert!(seasonal_difference(&[1.0, 2.0], 1, 3).is_empty());
        assert_eq!(seasonal_difference(&series, 0, 3), series.to_vec());
    }

    #[test]
    fn differencing_polynomial_expands_products() {
        assert_eq!(differencing_polynomial(1, 0, 12), vec![1.0, -1.0]);
        assert_eq!(differencing_polynomial(2, 0, 12), vec![1.0, -2.0, 1.0]);
        // (1 - B)(1 - B^3) = 1 - B - B^3 + B^4
        assert_eq!(
            differencing_polynomial(1, 1, 3),
            vec![1.0, -1.0, 0.0, -1.0, 1.0]
        );
    }

    #[test]
    fn seasonal_lag_polynomial_signs() {
        // (1 - 0.5B)(1 - 0.2B^2)
        let ar = seasonal_lag_polynomial(&[0.5], &[0.2], 2, -1.0);
        assert_eq!(ar, vec![1.0, -0.5, -0.2, 0.1]);
        let ma = seasonal_lag_polynomial(&[0.5], &[], 12, 1.0);
        assert_eq!(ma, vec![1.0, 0.5]);
    }
}
