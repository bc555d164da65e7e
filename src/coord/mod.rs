//! Coordinate systems: created on every full update, shared by layout
//! handlers, views and pixel conversion.

pub mod axis_helper;
mod cartesian2d;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::{Point, Viewport};
use crate::error::{ChartError, ChartResult};
use crate::model::{ComponentQuery, GlobalModel, ModelUid, SeriesModel};

pub use cartesian2d::{AxisDim, Cartesian2d, Cartesian2dCreator, CartesianAxis};

/// Data-to-pixel mapping detached from its coordinate system, so progress
/// workers can keep it across frames.
pub type PointMapper = Arc<dyn Fn(&[f64]) -> Option<Point> + Send + Sync>;

/// Selects models by `<main>Index|Id|Name` fields, e.g.
/// `{ "seriesIndex": 0 }` or `{ "gridId": "main" }`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelFinder {
    fields: Map<String, Value>,
}

impl ModelFinder {
    pub fn from_value(value: &Value) -> ChartResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self {
                fields: fields.clone(),
            }),
            Value::String(main_type) => Ok(Self::default().with(format!("{main_type}Index"), 0)),
            _ => Err(ChartError::InvalidData(
                "model finder must be an object or a main type name".to_owned(),
            )),
        }
    }

    #[must_use]
    pub fn series_index(index: usize) -> Self {
        Self::default().with("seriesIndex", index)
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Query for `main_type` when the finder names it.
    #[must_use]
    pub fn query(&self, main_type: &str) -> Option<ComponentQuery> {
        let query = ComponentQuery::from_fields(main_type, &self.fields);
        (!query.is_unconstrained()).then_some(query)
    }
}

/// One coordinate system instance.
///
/// Conversion methods return `None` when the finder does not address this
/// instance or the capability is absent.
pub trait CoordinateSystem: fmt::Debug {
    fn kind(&self) -> &str;

    fn dimensions(&self) -> &[&'static str];

    /// Component the instance was created for, if any.
    fn model_uid(&self) -> Option<ModelUid>;

    fn update(&mut self, model: &GlobalModel, viewport: Viewport) -> ChartResult<()>;

    fn handles_series(&self, series: &SeriesModel) -> bool;

    fn data_to_point(&self, values: &[f64]) -> Option<Point>;

    fn point_to_data(&self, point: Point) -> Option<Vec<f64>>;

    fn point_mapper(&self) -> PointMapper;

    fn matches_finder(&self, model: &GlobalModel, finder: &ModelFinder) -> bool;

    fn convert_to_pixel(
        &self,
        model: &GlobalModel,
        finder: &ModelFinder,
        values: &[f64],
    ) -> Option<Point> {
        self.matches_finder(model, finder)
            .then(|| self.data_to_point(values))
            .flatten()
    }

    fn convert_from_pixel(
        &self,
        model: &GlobalModel,
        finder: &ModelFinder,
        point: Point,
    ) -> Option<Vec<f64>> {
        self.matches_finder(model, finder)
            .then(|| self.point_to_data(point))
            .flatten()
    }

    /// Layout-space placement; absent by default.
    fn convert_to_layout(
        &self,
        _model: &GlobalModel,
        _finder: &ModelFinder,
        _values: &[f64],
    ) -> Option<Value> {
        None
    }

    /// `None` when hit testing is not supported.
    fn contain_point(&self, _point: Point) -> Option<bool> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}

/// Builds the instances of one coordinate system kind from the model.
pub trait CoordinateSystemCreator: Send + Sync {
    fn kind(&self) -> &str;

    fn create(
        &self,
        model: &GlobalModel,
        viewport: Viewport,
    ) -> ChartResult<Vec<Box<dyn CoordinateSystem>>>;
}

/// Instances of the current full update plus the series bound to them.
#[derive(Debug, Default)]
pub struct CoordinateSystemManager {
    systems: Vec<Box<dyn CoordinateSystem>>,
    bindings: HashMap<ModelUid, usize>,
}

impl CoordinateSystemManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every instance and rebinds series by their
    /// `coordinateSystem` option.
    pub fn create(
        &mut self,
        creators: &[Arc<dyn CoordinateSystemCreator>],
        model: &GlobalModel,
        viewport: Viewport,
    ) -> ChartResult<()> {
        self.systems.clear();
        self.bindings.clear();
        for creator in creators {
            self.systems.extend(creator.create(model, viewport)?);
        }

        for series in model.series() {
            let Some(kind) = series.coordinate_system() else {
                continue;
            };
            if !creators.iter().any(|creator| creator.kind() == kind) {
                return Err(ChartError::CoordinateSystemNotRegistered(kind.to_owned()));
            }
            match self
                .systems
                .iter()
                .position(|system| system.kind() == kind && system.handles_series(series))
            {
                Some(position) => {
                    self.bindings.insert(series.uid(), position);
                }
                None => warn!(
                    series_id = series.id(),
                    coordinate_system = kind,
                    "no coordinate system instance matches series axes"
                ),
            }
        }
        debug!(
            instance_count = self.systems.len(),
            bound_series = self.bindings.len(),
            "coordinate systems created"
        );
        Ok(())
    }

    pub fn update(&mut self, model: &GlobalModel, viewport: Viewport) -> ChartResult<()> {
        for system in &mut self.systems {
            system.update(model, viewport)?;
        }
        Ok(())
    }

    #[must_use]
    pub fn systems(&self) -> &[Box<dyn CoordinateSystem>] {
        &self.systems
    }

    #[must_use]
    pub fn for_series(&self, series_uid: ModelUid) -> Option<&dyn CoordinateSystem> {
        self.bindings
            .get(&series_uid)
            .and_then(|position| self.systems.get(*position))
            .map(Box::as_ref)
    }

    /// Instances of one concrete type, e.g. every [`Cartesian2d`].
    pub fn of_type<T: CoordinateSystem + 'static>(&self) -> impl Iterator<Item = &T> {
        self.systems
            .iter()
            .filter_map(|system| system.as_any().downcast_ref::<T>())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    pub fn clear(&mut self) {
        self.systems.clear();
        self.bindings.clear();
    }
}
