//! The standard model menu and menus built from configuration.

use crate::config::{ModelConfig, ModelFamily};
use crate::error::{ForecastError, Result};
use crate::models::arima::{ARIMASpec, AutoARIMA, ARIMA};
use crate::models::baseline::{RandomWalk, SeasonalRandomWalk};
use crate::models::exponential::{AutoETS, ETSSpec, ETS};
use crate::models::{ModelMenu, ModelSpec};
use crate::transform::Transform;
use std::collections::BTreeMap;

impl ModelMenu {
    /// The five-model menu for monthly retail data:
    ///
    /// | name        | model                          | transform |
    /// |-------------|--------------------------------|-----------|
    /// | `drift`     | random walk with drift         | log       |
    /// | `sdrift`    | seasonal random walk with drift| log       |
    /// | `ar`        | AutoARIMA                      | log       |
    /// | `ets_auto`  | AutoETS                        | identity  |
    /// | `ets_fixed` | ETS(M,Ad,M)                    | identity  |
    pub fn standard(period: usize) -> Self {
        let models = vec![
            ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))
                .with_transform(Transform::Log),
            ModelSpec::new("sdrift", move || {
                Box::new(SeasonalRandomWalk::with_drift(period))
            })
            .with_transform(Transform::Log),
            ModelSpec::new("ar", move || Box::new(AutoARIMA::seasonal(period)))
                .with_transform(Transform::Log),
            ModelSpec::new("ets_auto", move || Box::new(AutoETS::with_period(period))),
            ModelSpec::new("ets_fixed", move || {
                Box::new(ETS::new(ETSSpec::madm(), period))
            }),
        ];
        ModelMenu { models }
    }

    /// Build a menu from `[models.<name>]` tables, in name order.
    pub fn from_config(models: &BTreeMap<String, ModelConfig>, period: usize) -> Result<Self> {
        let mut menu = ModelMenu::new();
        for (name, config) in models {
            menu.register(model_spec(name, config, period)?)?;
        }
        Ok(menu)
    }
}

fn model_spec(name: &str, config: &ModelConfig, period: usize) -> Result<ModelSpec> {
    let transform = match &config.transform {
        Some(t) => Transform::from_name(t, config.lambda)?,
        None => Transform::Identity,
    };
    let unused = |field: &str| {
        ForecastError::Config(format!(
            "model '{}': '{}' does not apply to this family",
            name, field
        ))
    };
    if config.ets.is_some() && config.family != ModelFamily::Ets {
        return Err(unused("ets"));
    }
    if config.family != ModelFamily::Arima
        && (config.order.is_some() || config.seasonal_order.is_some() || config.constant.is_some())
    {
        return Err(unused("order"));
    }

    let spec = match config.family {
        ModelFamily::RandomWalk => ModelSpec::new(name, || Box::new(RandomWalk::new())),
        ModelFamily::Drift => ModelSpec::new(name, || Box::new(RandomWalk::with_drift())),
        ModelFamily::SeasonalNaive => {
            ModelSpec::new(name, move || Box::new(SeasonalRandomWalk::new(period)))
        }
        ModelFamily::SeasonalDrift => {
            ModelSpec::new(name, move || Box::new(SeasonalRandomWalk::with_drift(period)))
        }
        ModelFamily::Arima => {
            let [p, d, q] = config.order.ok_or_else(|| {
                ForecastError::Config(format!("model '{}': arima needs 'order'", name))
            })?;
            let mut orders =
                ARIMASpec::new(p, d, q).with_constant(config.constant.unwrap_or(false));
            if let Some([sp, sd, sq]) = config.seasonal_order {
                orders = orders.seasonal(sp, sd, sq, period);
            }
            orders
                .validate()
                .map_err(|e| ForecastError::Config(format!("model '{}': {}", name, e)))?;
            ModelSpec::new(name, move || Box::new(ARIMA::new(orders)))
        }
        ModelFamily::AutoArima => {
            ModelSpec::new(name, move || Box::new(AutoARIMA::seasonal(period)))
        }
        ModelFamily::Ets => {
            let components: ETSSpec = config
                .ets
                .as_deref()
                .ok_or_else(|| ForecastError::Config(format!("model '{}': ets needs 'ets'", name)))?
                .parse()
                .map_err(|e| ForecastError::Config(format!("model '{}': {}", name, e)))?;
            ModelSpec::new(name, move || Box::new(ETS::new(components, period)))
        }
        ModelFamily::AutoEts => {
            ModelSpec::new(name, move || Box::new(AutoETS::with_period(period)))
        }
    };
    Ok(spec.with_transform(transform))
}
