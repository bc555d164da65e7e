use serde_json::Value;
use tracing::warn;

use crate::coord::{CoordinateSystem, ModelFinder};
use crate::core::Point;
use crate::model::{GlobalModel, ModelUid};
use crate::render::Renderer;
use crate::view::ViewModel;

use super::ChartEngine;

impl<R: Renderer> ChartEngine<R> {
    fn conversion_model(&self, operation: &'static str) -> Option<&GlobalModel> {
        if self.core.api.is_disposed() {
            warn!(operation, "conversion on a disposed chart");
            return None;
        }
        self.core.model.as_ref()
    }

    /// Converts data values to a pixel through the first coordinate system
    /// the finder addresses.
    #[must_use]
    pub fn convert_to_pixel(&self, finder: &ModelFinder, values: &[f64]) -> Option<Point> {
        let model = self.conversion_model("convert_to_pixel")?;
        let point = self
            .core
            .coordinate_systems
            .systems()
            .iter()
            .find_map(|system| system.convert_to_pixel(model, finder, values));
        if point.is_none() {
            warn!(?finder, "no coordinate system converts the values to a pixel");
        }
        point
    }

    #[must_use]
    pub fn convert_from_pixel(&self, finder: &ModelFinder, point: Point) -> Option<Vec<f64>> {
        let model = self.conversion_model("convert_from_pixel")?;
        let values = self
            .core
            .coordinate_systems
            .systems()
            .iter()
            .find_map(|system| system.convert_from_pixel(model, finder, point));
        if values.is_none() {
            warn!(?finder, "no coordinate system converts the pixel to values");
        }
        values
    }

    /// Layout-space placement of `values`; `None` when no addressed
    /// coordinate system supports layout conversion.
    #[must_use]
    pub fn convert_to_layout(&self, finder: &ModelFinder, values: &[f64]) -> Option<Value> {
        let model = self.conversion_model("convert_to_layout")?;
        let layout = self
            .core
            .coordinate_systems
            .systems()
            .iter()
            .find_map(|system| system.convert_to_layout(model, finder, values));
        if layout.is_none() {
            warn!(?finder, "no coordinate system converts the values to a layout");
        }
        layout
    }

    /// Whether `point` falls inside any model the finder addresses.
    ///
    /// Components answer through the coordinate system created for them;
    /// series through their coordinate system, else through their view.
    #[must_use]
    pub fn contain_pixel(&self, finder: &ModelFinder, point: Point) -> bool {
        let Some(model) = self.conversion_model("contain_pixel") else {
            return false;
        };
        let main_types = std::iter::once("series")
            .chain(self.core.registry.model_types().component_types());

        let mut contained = false;
        for main_type in main_types {
            let Some(query) = finder.query(main_type) else {
                continue;
            };
            for uid in model.query_models(&query) {
                let answer = if main_type == "series" {
                    self.series_contains(model, uid, point)
                } else {
                    self.core
                        .coordinate_systems
                        .systems()
                        .iter()
                        .find(|system| system.model_uid() == Some(uid))
                        .and_then(|system| system.contain_point(point))
                };
                match answer {
                    Some(inside) => contained |= inside,
                    None => warn!(main_type, "model cannot answer contain_pixel"),
                }
            }
        }
        contained
    }

    fn series_contains(&self, model: &GlobalModel, uid: ModelUid, point: Point) -> Option<bool> {
        let by_coordinate_system = self
            .core
            .coordinate_systems
            .for_series(uid)
            .and_then(|system: &dyn CoordinateSystem| system.contain_point(point));
        if by_coordinate_system.is_some() {
            return by_coordinate_system;
        }
        let series = model.series_by_uid(uid)?;
        self.core
            .views
            .chart
            .view_of(uid)
            .and_then(|entry| entry.view.contain_point(point, ViewModel::Series(series)))
    }
}
