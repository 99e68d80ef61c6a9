//! Property-based tests for the workflow stages and the models.
//!
//! These tests verify invariants that should hold for all valid inputs,
//! using randomly generated panels and series.

use panel_forecast::core::{KeySchema, Month, Panel, SeriesKey};
use panel_forecast::executor::Executor;
use panel_forecast::forecaster::{forecast, ForecastConfig, PointEstimate};
use panel_forecast::models::arima::{ARIMASpec, ARIMA};
use panel_forecast::models::baseline::{RandomWalk, SeasonalRandomWalk};
use panel_forecast::models::exponential::{ETSSpec, ETS};
use panel_forecast::models::{Forecaster, ModelMenu, ModelSpec};
use panel_forecast::partition::partition;
use panel_forecast::trainer::Trainer;
use panel_forecast::transform::Transform;
use proptest::prelude::*;

fn month_from_index(i: i32) -> Month {
    Month::new(2010, 1).unwrap().offset(i)
}

/// Strategy for generating strictly positive series values.
/// Adds small variation to avoid all-constant series.
fn positive_values_strategy(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (min_len..max_len).prop_flat_map(|len| {
        prop::collection::vec(1.0..1000.0_f64, len).prop_map(|mut v| {
            for (i, val) in v.iter_mut().enumerate() {
                *val += (i as f64) * 0.001;
            }
            v
        })
    })
}

/// Strategy for a panel of up to six keys with ragged starts and ends.
fn panel_strategy() -> impl Strategy<Value = Panel> {
    prop::collection::vec((0i32..36, positive_values_strategy(1, 48)), 1..6).prop_map(|specs| {
        let mut builder = Panel::builder(KeySchema::new(["state", "industry"]));
        for (i, (start, values)) in specs.into_iter().enumerate() {
            let key = SeriesKey::new([format!("S{}", i % 3), format!("I{}", i)]);
            builder
                .push_series(key, month_from_index(start), &values)
                .unwrap();
        }
        builder.build().unwrap()
    })
}

fn small_menu() -> ModelMenu {
    let mut menu = ModelMenu::new();
    menu.register(ModelSpec::new("rw", || Box::new(RandomWalk::new())))
        .unwrap();
    menu.register(
        ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))
            .with_transform(Transform::Log),
    )
    .unwrap();
    menu.register(ModelSpec::new("snaive", || Box::new(SeasonalRandomWalk::new(12))))
        .unwrap();
    menu
}

// =============================================================================
// Property: the partition splits exactly at the cutoff and loses nothing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn partition_union_reconstructs_panel(
        panel in panel_strategy(),
        cutoff_idx in 0i32..90
    ) {
        let cutoff = month_from_index(cutoff_idx);
        let Ok(split) = partition(&panel, cutoff) else {
            // Only legal when no key has any data at or before the cutoff.
            prop_assert!(panel.first_month().unwrap() > cutoff);
            return Ok(());
        };

        for (key, series) in panel.iter() {
            let train = split.train.get(key);
            let validation = split.validation.get(key);
            for (month, value) in series.iter() {
                let side = if month <= cutoff { train } else { validation };
                prop_assert_eq!(side.and_then(|s| s.value_at(month)), Some(value));
            }
            let n_train = train.map_or(0, |s| s.len());
            let n_validation = validation.map_or(0, |s| s.len());
            prop_assert_eq!(n_train + n_validation, series.len());
            prop_assert!(train.map_or(true, |s| s.last_month().unwrap() <= cutoff));
            prop_assert!(validation.map_or(true, |s| s.first_month().unwrap() > cutoff));
            prop_assert_eq!(train.is_none(), split.empty_training.contains(key));
        }
    }
}

// =============================================================================
// Property: one fit outcome per (key, model); one forecast row per
// validation month
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn every_pair_has_an_outcome_and_rows_match_validation(
        panel in panel_strategy(),
        cutoff_idx in 10i32..60
    ) {
        let cutoff = month_from_index(cutoff_idx);
        let Ok(split) = partition(&panel, cutoff) else {
            return Ok(());
        };
        let menu = small_menu();
        let models = Trainer::new(menu.clone(), Executor::sequential()).train(&split.train);
        prop_assert_eq!(models.len(), split.train.len() * menu.len());
        for key in split.train.keys() {
            for name in menu.names() {
                prop_assert!(models.get(key, name).is_some());
            }
        }

        let table = forecast(&models, &split.validation, &ForecastConfig::default()).unwrap();
        for (key, actuals) in split.validation.iter() {
            for name in menu.names() {
                match table.get(key, name) {
                    Some(fc) => prop_assert_eq!(fc.months(), actuals.months().to_vec()),
                    None => prop_assert!(table.failure(key, name).is_some()),
                }
            }
        }
    }
}

// =============================================================================
// Property: back-transforming a constant series returns the constant
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn log_back_transform_of_constant_is_constant(
        level in 0.5..5000.0_f64,
        n_train in 3usize..40,
        n_validation in 1usize..12,
        median in any::<bool>()
    ) {
        let mut builder = Panel::builder(KeySchema::new(["state"]));
        builder
            .push_series(
                SeriesKey::new(["ACT"]),
                month_from_index(0),
                &vec![level; n_train + n_validation],
            )
            .unwrap();
        let panel = builder.build().unwrap();
        let split = partition(&panel, month_from_index(n_train as i32 - 1)).unwrap();
        let models = Trainer::new(small_menu(), Executor::sequential()).train(&split.train);
        let point = if median { PointEstimate::Median } else { PointEstimate::Mean };
        let table = forecast(
            &models,
            &split.validation,
            &ForecastConfig::default().with_point(point),
        )
        .unwrap();

        let fc = table.get(&SeriesKey::new(["ACT"]), "drift").unwrap();
        prop_assert_eq!(fc.points.len(), n_validation);
        for p in &fc.points {
            prop_assert!((p.point - level).abs() <= 1e-9 * level);
        }
    }
}

// =============================================================================
// Property: model forecasts have the requested length, are finite and have
// ordered intervals
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(40))]

    #[test]
    fn random_walk_forecasts_are_well_formed(
        values in positive_values_strategy(3, 100),
        horizon in 1usize..24
    ) {
        let mut model = RandomWalk::with_drift();
        model.fit(&values).unwrap();
        let forecast = model.predict(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);
        prop_assert!(forecast.mean().iter().all(|v| v.is_finite()));
        prop_assert!(forecast.std_error().windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn seasonal_random_walk_repeats_last_season(
        values in positive_values_strategy(13, 80),
        horizon in 1usize..30
    ) {
        let mut model = SeasonalRandomWalk::new(12);
        model.fit(&values).unwrap();
        let forecast = model.predict(horizon).unwrap();
        let last_season = &values[values.len() - 12..];
        for (h, v) in forecast.mean().iter().enumerate() {
            prop_assert_eq!(*v, last_season[h % 12]);
        }
    }

    #[test]
    fn arima_forecasts_are_finite(
        values in positive_values_strategy(30, 100),
        horizon in 1usize..20
    ) {
        let mut model = ARIMA::new(ARIMASpec::new(1, 0, 1).with_constant(true));
        model.fit(&values).unwrap();
        let forecast = model.predict(horizon).unwrap();
        prop_assert_eq!(forecast.horizon(), horizon);
        prop_assert!(forecast.mean().iter().all(|v| v.is_finite()));
        prop_assert!(forecast.std_error().iter().all(|s| s.is_finite() && *s >= 0.0));
    }

    #[test]
    fn ets_intervals_are_ordered(
        values in positive_values_strategy(20, 100),
        horizon in 1usize..20
    ) {
        let mut model = ETS::new(ETSSpec::ann(), 1);
        model.fit(&values).unwrap();
        let forecast = model.predict(horizon).unwrap();
        let (lo80, hi80) = forecast.interval(0.8).unwrap();
        let (lo95, hi95) = forecast.interval(0.95).unwrap();
        for i in 0..horizon {
            let m = forecast.mean()[i];
            prop_assert!(lo95[i] <= lo80[i] && lo80[i] <= m);
            prop_assert!(m <= hi80[i] && hi80[i] <= hi95[i]);
        }
    }
}
