use std::any::Any;
use std::sync::Arc;

use serde_json::Value;

use super::axis_helper::{AxisScale, LabelFormatter, make_label_formatter, nice_scale_extent};
use super::{CoordinateSystem, CoordinateSystemCreator, ModelFinder, PointMapper};
use crate::core::{Point, Rect, Viewport};
use crate::error::ChartResult;
use crate::model::{ComponentModel, GlobalModel, ModelNode, ModelUid, SeriesData, SeriesModel};
use crate::model::option::{option_bool, option_usize};

const KIND: &str = "cartesian2d";
const DIMENSIONS: [&str; 2] = ["x", "y"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisDim {
    X,
    Y,
}

impl AxisDim {
    fn main_type(self) -> &'static str {
        match self {
            Self::X => "xAxis",
            Self::Y => "yAxis",
        }
    }
}

/// One axis of a cartesian: its scale plus the pixel span it maps onto.
#[derive(Debug, Clone, PartialEq)]
pub struct CartesianAxis {
    dim: AxisDim,
    model_uid: Option<ModelUid>,
    index: usize,
    option: Value,
    scale: AxisScale,
    pixel_extent: (f64, f64),
}

impl CartesianAxis {
    fn new(dim: AxisDim, model: Option<&ComponentModel>) -> Self {
        let option = model.map_or_else(|| Value::Object(serde_json::Map::new()), |model| {
            model.option().clone()
        });
        Self {
            dim,
            model_uid: model.map(ComponentModel::uid),
            index: model.map_or(0, ComponentModel::component_index),
            scale: AxisScale::create_by_model(&option),
            option,
            pixel_extent: (0.0, 1.0),
        }
    }

    #[must_use]
    pub fn dim(&self) -> AxisDim {
        self.dim
    }

    #[must_use]
    pub fn model_uid(&self) -> Option<ModelUid> {
        self.model_uid
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn scale(&self) -> &AxisScale {
        &self.scale
    }

    #[must_use]
    pub fn pixel_extent(&self) -> (f64, f64) {
        self.pixel_extent
    }

    #[must_use]
    pub fn label_formatter(&self) -> LabelFormatter {
        make_label_formatter(&self.option)
    }

    #[must_use]
    pub fn data_to_coord(&self, value: f64) -> f64 {
        let (start, end) = self.pixel_extent;
        start + self.scale.normalize(value) * (end - start)
    }

    #[must_use]
    pub fn coord_to_data(&self, coord: f64) -> f64 {
        let (start, end) = self.pixel_extent;
        if (end - start).abs() < f64::EPSILON {
            return self.scale.scale(0.5);
        }
        self.scale.scale((coord - start) / (end - start))
    }

    fn inverse(&self) -> bool {
        option_bool(&self.option, "inverse").unwrap_or(false)
    }
}

/// Rectangular coordinate system: one x axis and one y axis of a grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cartesian2d {
    grid_uid: Option<ModelUid>,
    grid_index: usize,
    grid_option: Value,
    rect: Rect,
    x_axis: CartesianAxis,
    y_axis: CartesianAxis,
}

impl Cartesian2d {
    #[must_use]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    #[must_use]
    pub fn grid_index(&self) -> usize {
        self.grid_index
    }

    #[must_use]
    pub fn x_axis(&self) -> &CartesianAxis {
        &self.x_axis
    }

    #[must_use]
    pub fn y_axis(&self) -> &CartesianAxis {
        &self.y_axis
    }

    /// Axis built from the component `uid`, if it belongs to this cartesian.
    #[must_use]
    pub fn axis_by_model(&self, uid: ModelUid) -> Option<&CartesianAxis> {
        [&self.x_axis, &self.y_axis]
            .into_iter()
            .find(|axis| axis.model_uid == Some(uid))
    }

    fn resize(&mut self, viewport: Viewport) {
        self.rect = grid_rect(&self.grid_option, viewport);
        let Rect {
            x,
            y,
            width,
            height,
        } = self.rect;
        self.x_axis.pixel_extent = if self.x_axis.inverse() {
            (x + width, x)
        } else {
            (x, x + width)
        };
        self.y_axis.pixel_extent = if self.y_axis.inverse() {
            (y, y + height)
        } else {
            (y + height, y)
        };
    }
}

fn grid_rect(option: &Value, viewport: Viewport) -> Rect {
    let width = f64::from(viewport.width);
    let height = f64::from(viewport.height);
    let length = |key: &str, total: f64, default: f64| -> Option<f64> {
        let value = match option.get(key) {
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => match text.strip_suffix('%') {
                Some(percent) => percent.trim().parse::<f64>().ok().map(|p| p / 100.0 * total),
                None => text.trim().parse().ok(),
            },
            _ => Some(default),
        };
        value.filter(|value| value.is_finite())
    };

    let left = length("left", width, width * 0.1).unwrap_or(width * 0.1);
    let right = length("right", width, width * 0.1).unwrap_or(width * 0.1);
    let top = length("top", height, 60.0).unwrap_or(60.0);
    let bottom = length("bottom", height, 70.0).unwrap_or(70.0);
    let rect_width = option
        .get("width")
        .and_then(|_| length("width", width, 0.0))
        .unwrap_or(width - left - right)
        .max(0.0);
    let rect_height = option
        .get("height")
        .and_then(|_| length("height", height, 0.0))
        .unwrap_or(height - top - bottom)
        .max(0.0);
    Rect::new(left, top, rect_width, rect_height)
}

/// Extent a series contributes on one axis. One-dimensional rows are laid
/// out as `(index, value)`.
fn series_axis_extent(data: &SeriesData, dim: AxisDim) -> Option<(f64, f64)> {
    let one_dimensional = data.row(0).is_some_and(|row| row.values.len() == 1);
    match (dim, one_dimensional) {
        (AxisDim::X, true) => (!data.is_empty()).then(|| (0.0, (data.count() - 1) as f64)),
        (AxisDim::Y, true) => data.extent(0),
        (AxisDim::X, false) => data.extent(0),
        (AxisDim::Y, false) => data.extent(1),
    }
}

fn axis_grid_index(axis: &ComponentModel) -> usize {
    option_usize(axis.option(), "gridIndex").unwrap_or(0)
}

impl CoordinateSystem for Cartesian2d {
    fn kind(&self) -> &str {
        KIND
    }

    fn dimensions(&self) -> &[&'static str] {
        &DIMENSIONS
    }

    fn model_uid(&self) -> Option<ModelUid> {
        self.grid_uid
    }

    fn update(&mut self, model: &GlobalModel, viewport: Viewport) -> ChartResult<()> {
        for axis in [&mut self.x_axis, &mut self.y_axis] {
            let mut scale = AxisScale::create_by_model(&axis.option);
            let main_type = axis.dim.main_type();
            for series in model.each_series() {
                let on_axis = series.coordinate_system() == Some(KIND)
                    && series.axis_index(main_type) == axis.index;
                if on_axis {
                    if let Some(extent) = series_axis_extent(series.data(), axis.dim) {
                        scale.union_extent(extent);
                    }
                }
            }
            nice_scale_extent(&mut scale, &axis.option);
            axis.scale = scale;
        }
        self.resize(viewport);
        Ok(())
    }

    fn handles_series(&self, series: &SeriesModel) -> bool {
        series.axis_index("xAxis") == self.x_axis.index
            && series.axis_index("yAxis") == self.y_axis.index
    }

    fn data_to_point(&self, values: &[f64]) -> Option<Point> {
        let (x, y) = (*values.first()?, *values.get(1)?);
        (x.is_finite() && y.is_finite())
            .then(|| Point::new(self.x_axis.data_to_coord(x), self.y_axis.data_to_coord(y)))
    }

    fn point_to_data(&self, point: Point) -> Option<Vec<f64>> {
        Some(vec![
            self.x_axis.coord_to_data(point.x),
            self.y_axis.coord_to_data(point.y),
        ])
    }

    fn point_mapper(&self) -> PointMapper {
        let snapshot = self.clone();
        Arc::new(move |values| snapshot.data_to_point(values))
    }

    fn matches_finder(&self, model: &GlobalModel, finder: &ModelFinder) -> bool {
        if let Some(query) = finder.query("series") {
            return model
                .series()
                .iter()
                .filter(|series| query.matches(series.identity()))
                .any(|series| series.coordinate_system() == Some(KIND) && self.handles_series(series));
        }
        if let Some(query) = finder.query("grid") {
            return model
                .components("grid")
                .iter()
                .any(|grid| Some(grid.uid()) == self.grid_uid && query.matches(grid.identity()));
        }
        for axis in [&self.x_axis, &self.y_axis] {
            if let Some(query) = finder.query(axis.dim.main_type()) {
                return model
                    .components(axis.dim.main_type())
                    .iter()
                    .any(|model| Some(model.uid()) == axis.model_uid && query.matches(model.identity()));
            }
        }
        false
    }

    fn contain_point(&self, point: Point) -> Option<bool> {
        Some(self.rect.contains(point))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Creates one cartesian per `(xAxis, yAxis)` pair of every grid. Axes
/// without any grid component get an implicit grid with default margins.
#[derive(Debug, Default)]
pub struct Cartesian2dCreator;

impl CoordinateSystemCreator for Cartesian2dCreator {
    fn kind(&self) -> &str {
        KIND
    }

    fn create(
        &self,
        model: &GlobalModel,
        viewport: Viewport,
    ) -> ChartResult<Vec<Box<dyn CoordinateSystem>>> {
        let grids = model.components("grid");
        let x_axes = model.components("xAxis");
        let y_axes = model.components("yAxis");
        let needs_implicit = grids.is_empty()
            && (!x_axes.is_empty()
                || !y_axes.is_empty()
                || model
                    .series()
                    .iter()
                    .any(|series| series.coordinate_system() == Some(KIND)));

        let mut grid_entries: Vec<(Option<&ComponentModel>, usize)> =
            grids.iter().map(|grid| (Some(grid), grid.component_index())).collect();
        if needs_implicit {
            grid_entries.push((None, 0));
        }

        let mut systems: Vec<Box<dyn CoordinateSystem>> = Vec::new();
        for (grid, grid_index) in grid_entries {
            let grid_option = grid.map_or_else(
                || Value::Object(serde_json::Map::new()),
                |grid| grid.option().clone(),
            );
            let xs: Vec<Option<&ComponentModel>> = axes_in_grid(x_axes, grid_index);
            let ys: Vec<Option<&ComponentModel>> = axes_in_grid(y_axes, grid_index);
            for x in &xs {
                for y in &ys {
                    let mut cartesian = Cartesian2d {
                        grid_uid: grid.map(ComponentModel::uid),
                        grid_index,
                        grid_option: grid_option.clone(),
                        rect: Rect::new(0.0, 0.0, 0.0, 0.0),
                        x_axis: CartesianAxis::new(AxisDim::X, *x),
                        y_axis: CartesianAxis::new(AxisDim::Y, *y),
                    };
                    cartesian.resize(viewport);
                    systems.push(Box::new(cartesian));
                }
            }
        }
        Ok(systems)
    }
}

/// Axes of one grid; a grid without axes of a dimension gets a default one.
fn axes_in_grid(axes: &[ComponentModel], grid_index: usize) -> Vec<Option<&ComponentModel>> {
    let matched: Vec<Option<&ComponentModel>> = axes
        .iter()
        .filter(|axis| axis_grid_index(axis) == grid_index)
        .map(Some)
        .collect();
    if matched.is_empty() { vec![None] } else { matched }
}
