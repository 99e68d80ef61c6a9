//! Differencing order selection: KPSS tests for `d`, seasonal strength for `D`.

use crate::models::arima::diff::difference;
use crate::utils::stats::{mean, variance};

/// 5% critical value of the level-stationarity KPSS statistic.
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Seasonal strength above which one seasonal difference is taken.
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// KPSS statistic for level stationarity with Bartlett-weighted long-run
/// variance, `floor(4 (n / 100)^(1/4))` lags.
///
/// Returns None for fewer than three values or a constant series.
pub fn kpss_statistic(series: &[f64]) -> Option<f64> {
    let n = series.len();
    if n < 3 {
        return None;
    }
    let m = mean(series);
    let e: Vec<f64> = series.iter().map(|y| y - m).collect();

    let mut partial = 0.0;
    let mut eta = 0.0;
    for r in &e {
        partial += r;
        eta += partial * partial;
    }
    let nf = n as f64;
    eta /= nf * nf;

    let lags = ((4.0 * (nf / 100.0).powf(0.25)).floor() as usize).min(n - 1);
    let mut long_run = e.iter().map(|r| r * r).sum::<f64>() / nf;
    for s in 1..=lags {
        let weight = 1.0 - s as f64 / (lags as f64 + 1.0);
        let cov: f64 = e.iter().skip(s).zip(&e).map(|(a, b)| a * b).sum();
        long_run += 2.0 * weight * cov / nf;
    }
    if long_run <= 1e-12 * (1.0 + m * m) {
        return None;
    }
    Some(eta / long_run)
}

/// Number of first differences needed for the KPSS test to stop rejecting
/// level stationarity at 5%, capped at `max_d`.
pub fn ndiffs(series: &[f64], max_d: usize) -> usize {
    let mut d = 0;
    let mut x = series.to_vec();
    while d < max_d {
        match kpss_statistic(&x) {
            Some(stat) if stat > KPSS_CRITICAL_5PCT => {
                x = difference(&x, 1);
                d += 1;
            }
            _ => break,
        }
    }
    d
}

/// Strength of seasonality from an additive classical decomposition:
/// `max(0, 1 - Var(remainder) / Var(seasonal + remainder))`.
///
/// Returns None when the series is shorter than two full periods.
pub fn seasonal_strength(series: &[f64], period: usize) -> Option<f64> {
    let n = series.len();
    if period < 2 || n < 2 * period {
        return None;
    }

    // Centred moving average of order `period` (2 x period when even).
    let half = period / 2;
    let mut trend = vec![f64::NAN; n];
    for (t, slot) in trend.iter_mut().enumerate().take(n - half).skip(half) {
        *slot = if period % 2 == 0 {
            let window = &series[t - half..=t + half];
            let inner: f64 = window[1..period].iter().sum();
            (inner + 0.5 * (window[0] + window[period])) / period as f64
        } else {
            series[t - half..=t + half].iter().sum::<f64>() / period as f64
        };
    }

    let detrended: Vec<(usize, f64)> = trend
        .iter()
        .zip(series)
        .enumerate()
        .filter(|(_, (tr, _))| tr.is_finite())
        .map(|(t, (tr, y))| (t, y - tr))
        .collect();

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for &(t, v) in &detrended {
        sums[t % period] += v;
        counts[t % period] += 1;
    }
    let mut index: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, c)| if *c > 0 { s / *c as f64 } else { 0.0 })
        .collect();
    let centre = mean(&index);
    index.iter_mut().for_each(|s| *s -= centre);

    let remainder: Vec<f64> = detrended.iter().map(|(t, v)| v - index[t % period]).collect();
    let seasonal_plus_remainder: Vec<f64> = detrended.iter().map(|(_, v)| *v).collect();

    let total = variance(&seasonal_plus_remainder);
    if total.is_nan() || total <= 0.0 {
        return Some(0.0);
    }
    Some((1.0 - variance(&remainder) / total).max(0.0))
}

/// One seasonal difference when seasonality is strong, otherwise none.
pub fn nsdiffs(series: &[f64], period: usize) -> usize {
    match seasonal_strength(series, period) {
        Some(strength) if strength > SEASONAL_STRENGTH_THRESHOLD => 1,
        _ => 0,
    }
}
