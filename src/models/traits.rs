//! Forecaster trait and the named model specifications fitted per series.

use crate::core::Forecast;
use crate::error::{ForecastError, Result};
use crate::transform::Transform;
use std::fmt;
use std::sync::Arc;

/// Common interface for all forecasting models.
///
/// Models are fitted on a gap-free, already transformed value slice and
/// return a normal predictive distribution on that same scale.
///
/// This trait is object-safe and can be used with `Box<dyn Forecaster>`.
pub trait Forecaster: Send + Sync {
    /// Fit the model to the values.
    fn fit(&mut self, values: &[f64]) -> Result<()>;

    /// Forecast `horizon` steps past the end of the fitted data.
    fn predict(&self, horizon: usize) -> Result<Forecast>;

    /// In-sample one-step predictions.
    fn fitted_values(&self) -> Option<&[f64]>;

    /// In-sample residuals (actual - fitted).
    fn residuals(&self) -> Option<&[f64]>;

    /// Model family name.
    fn name(&self) -> &str;

    /// Description of the fitted model, e.g. the selected orders.
    fn describe(&self) -> String {
        self.name().to_string()
    }

    fn is_fitted(&self) -> bool {
        self.fitted_values().is_some()
    }
}

/// Type alias for boxed forecaster trait objects.
///
/// # Example
///
/// ```
/// use panel_forecast::models::{BoxedForecaster, Forecaster};
/// use panel_forecast::models::baseline::RandomWalk;
///
/// let model: BoxedForecaster = Box::new(RandomWalk::with_drift());
/// assert_eq!(model.name(), "RW-drift");
/// assert!(!model.is_fitted());
/// ```
pub type BoxedForecaster = Box<dyn Forecaster>;

type Factory = Arc<dyn Fn() -> BoxedForecaster + Send + Sync>;

/// A named recipe for building an unfitted model plus the transform its
/// data goes through.
///
/// # Example
///
/// ```
/// use panel_forecast::models::ModelSpec;
/// use panel_forecast::models::baseline::RandomWalk;
/// use panel_forecast::transform::Transform;
///
/// let spec = ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))
///     .with_transform(Transform::Log);
/// assert_eq!(spec.name(), "drift");
/// assert!(!spec.create().is_fitted());
/// ```
#[derive(Clone)]
pub struct ModelSpec {
    name: String,
    factory: Factory,
    transform: Transform,
}

impl ModelSpec {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> BoxedForecaster + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
            transform: Transform::Identity,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    /// Build a fresh, unfitted model.
    pub fn create(&self) -> BoxedForecaster {
        (self.factory)()
    }
}

impl fmt::Debug for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSpec")
            .field("name", &self.name)
            .field("transform", &self.transform)
            .finish()
    }
}

/// Ordered collection of model specifications with unique names.
///
/// # Example
///
/// ```
/// use panel_forecast::models::{ModelMenu, ModelSpec};
/// use panel_forecast::models::baseline::RandomWalk;
///
/// let mut menu = ModelMenu::new();
/// menu.register(ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))).unwrap();
/// assert!(menu.register(ModelSpec::new("drift", || Box::new(RandomWalk::new()))).is_err());
/// assert_eq!(menu.names(), vec!["drift"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModelMenu {
    pub(super) models: Vec<ModelSpec>,
}

impl ModelMenu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a specification; names must be unique within the menu.
    pub fn register(&mut self, spec: ModelSpec) -> Result<()> {
        if self.get(spec.name()).is_some() {
            return Err(ForecastError::InvalidParameter(format!(
                "model '{}' is already on the menu",
                spec.name()
            )));
        }
        self.models.push(spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|spec| spec.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(ModelSpec::name).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::baseline::{RandomWalk, SeasonalRandomWalk};

    #[test]
    fn spec_creates_independent_models() {
        let spec = ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()));
        let mut first = spec.create();
        first.fit(&[1.0, 2.0, 3.0]).unwrap();
        assert!(first.is_fitted());
        assert!(!spec.create().is_fitted());
    }

    #[test]
    fn menu_preserves_registration_order() {
        let mut menu = ModelMenu::new();
        menu.register(ModelSpec::new("sdrift", || {
            Box::new(SeasonalRandomWalk::with_drift(12))
        }))
        .unwrap();
        menu.register(
            ModelSpec::new("drift", || Box::new(RandomWalk::with_drift()))
                .with_transform(Transform::Log),
        )
        .unwrap();

        assert_eq!(menu.names(), vec!["sdrift", "drift"]);
        assert_eq!(menu.len(), 2);
        assert_eq!(menu.get("drift").unwrap().transform(), Transform::Log);
        assert!(menu.get("ets").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut menu = ModelMenu::new();
        menu.register(ModelSpec::new("rw", || Box::new(RandomWalk::new())))
            .unwrap();
        let err = menu
            .register(ModelSpec::new("rw", || Box::new(RandomWalk::with_drift())))
            .unwrap_err();
        assert!(matches!(err, ForecastError::InvalidParameter(_)));
        assert_eq!(menu.len(), 1);
    }
}
