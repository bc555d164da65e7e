//! `scatter` series: point layout through the series' coordinate system and
//! a symbol view that renders progressively.

use std::ops::Range;

use serde_json::Value;
use tracing::warn;

use crate::coord::PointMapper;
use crate::core::Point;
use crate::error::ChartResult;
use crate::model::option::option_f64;
use crate::model::{GlobalModel, ItemLayout, ModelNode, SeriesData, SeriesModel};
use crate::pipeline::{SeriesStageHandler, StageContext, StageHandlerInfo, StageReset};
use crate::render::{CirclePrimitive, Color, Element, Group, Shape};
use crate::view::{TransformOutcome, View, ViewCapabilities, ViewContext, ViewModel};

pub const SCATTER: &str = "scatter";

const DEFAULT_SYMBOL_SIZE: f64 = 10.0;
const FALLBACK_COLOR: Color = Color::rgb(0.33, 0.44, 0.78);
/// Above this many items a transform change goes through the pipeline
/// instead of being applied in place.
const LARGE_TRANSFORM_COUNT: usize = 10_000;

fn layout_points(mapper: &PointMapper, range: Range<usize>, data: &mut SeriesData) {
    for index in range {
        let values = [data.value(index, 0), data.value(index, 1)];
        if let Some(point) = mapper(&values[..]) {
            data.set_item_layout(index, ItemLayout::Point(point));
        }
    }
}

/// Maps `(x, y)` item values to pixels.
#[derive(Debug)]
pub struct PointLayout {
    info: StageHandlerInfo,
}

impl Default for PointLayout {
    fn default() -> Self {
        Self {
            info: StageHandlerInfo::new("scatter-point-layout")
                .for_series_type(SCATTER)
                .layout(),
        }
    }
}

impl SeriesStageHandler for PointLayout {
    fn info(&self) -> &StageHandlerInfo {
        &self.info
    }

    fn reset(
        &self,
        series: &SeriesModel,
        _model: &GlobalModel,
        ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset> {
        let Some(system) = ctx.coordinate_systems.for_series(series.uid()) else {
            warn!(series_id = series.id(), "scatter series has no coordinate system");
            return Ok(StageReset::none());
        };
        let mapper = system.point_mapper();
        Ok(StageReset::none().with_progress(
            move |range: Range<usize>, data: &mut SeriesData| -> ChartResult<()> {
                layout_points(&mapper, range, data);
                Ok(())
            },
        ))
    }
}

fn symbol_element(series: &SeriesModel, index: usize) -> Option<Element> {
    let data = series.data();
    let ItemLayout::Point(point) = data.item_layout(index)? else {
        return None;
    };
    let visual = data.item_visual(index);
    let size = visual
        .symbol_size
        .or_else(|| data.visual("symbolSize").and_then(Value::as_f64))
        .or_else(|| option_f64(series.option(), "symbolSize"))
        .unwrap_or(DEFAULT_SYMBOL_SIZE);
    let color = visual
        .color
        .or_else(|| data.visual_color())
        .unwrap_or(FALLBACK_COLOR);
    let circle = CirclePrimitive::new(point.x, point.y, size / 2.0, color);
    Some(
        Element::new(Shape::Circle(circle))
            .with_data_index(index)
            .with_z(series.z()),
    )
}

/// Draws one circle per laid-out item.
#[derive(Debug, Default)]
pub struct ScatterView {
    group: Group,
    /// The last render covered the whole data.
    finished: bool,
}

impl ScatterView {
    fn add_range(&mut self, series: &SeriesModel, range: Range<usize>) {
        for index in range {
            if let Some(element) = symbol_element(series, index) {
                self.group.add(element);
            }
        }
    }
}

impl View for ScatterView {
    fn type_name(&self) -> &str {
        SCATTER
    }

    fn capabilities(&self) -> ViewCapabilities {
        ViewCapabilities {
            update_transform: true,
            incremental: true,
            contain_point: true,
            ..ViewCapabilities::default()
        }
    }

    fn group(&self) -> &Group {
        &self.group
    }

    fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    fn render(&mut self, model: ViewModel<'_>, _ctx: &ViewContext<'_>) -> ChartResult<()> {
        let Some(series) = model.as_series() else {
            return Ok(());
        };
        self.group.clear();
        self.add_range(series, 0..series.data().count());
        self.finished = true;
        Ok(())
    }

    fn update_transform(
        &mut self,
        model: ViewModel<'_>,
        ctx: &ViewContext<'_>,
    ) -> ChartResult<Option<TransformOutcome>> {
        let Some(series) = model.as_series() else {
            return Ok(None);
        };
        if !self.finished || series.data().count() > LARGE_TRANSFORM_COUNT {
            return Ok(Some(TransformOutcome { update: true }));
        }
        let Some(system) = ctx.coordinate_systems.for_series(series.uid()) else {
            return Ok(Some(TransformOutcome { update: true }));
        };

        let data = series.data();
        for element in self.group.elements_mut() {
            let Some(index) = element.data_index() else {
                continue;
            };
            let values = [data.value(index, 0), data.value(index, 1)];
            let (Some(point), Shape::Circle(circle)) = (system.data_to_point(&values), element.shape())
            else {
                continue;
            };
            let moved = CirclePrimitive::new(point.x, point.y, circle.radius, circle.fill_color);
            *element = rebuilt(element, Shape::Circle(moved));
        }
        Ok(Some(TransformOutcome { update: false }))
    }

    fn incremental_prepare_render(
        &mut self,
        _series: &SeriesModel,
        _ctx: &ViewContext<'_>,
    ) -> ChartResult<()> {
        self.group.clear();
        self.finished = false;
        Ok(())
    }

    fn incremental_render(
        &mut self,
        range: Range<usize>,
        series: &SeriesModel,
        _ctx: &ViewContext<'_>,
    ) -> ChartResult<()> {
        let end = range.end;
        self.add_range(series, range);
        self.finished = end >= series.data().count();
        Ok(())
    }

    fn contain_point(&self, point: Point, _model: ViewModel<'_>) -> Option<bool> {
        Some(self.group.elements().iter().any(|element| match element.shape() {
            Shape::Circle(circle) => {
                let (dx, dy) = (point.x - circle.cx, point.y - circle.cy);
                dx * dx + dy * dy <= circle.radius * circle.radius
            }
            _ => false,
        }))
    }
}

/// Same element with another shape, keeping index, z and state flags.
fn rebuilt(element: &Element, shape: Shape) -> Element {
    let mut moved = Element::new(shape).with_z(element.z());
    if let Some(index) = element.data_index() {
        moved = moved.with_data_index(index);
    }
    moved.set_hover_state(element.hover_state());
    moved.set_selected(element.is_selected());
    moved.apply_states();
    moved
}
