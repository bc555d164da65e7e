//! Component views of the cartesian coordinate system: the grid frame and
//! the x/y axes with ticks and labels.

use serde_json::Value;

use crate::coord::{AxisDim, Cartesian2d, CartesianAxis};
use crate::core::Rect;
use crate::error::ChartResult;
use crate::model::option::{option_at, option_str};
use crate::render::{
    Color, Element, Group, LinePrimitive, RectPrimitive, Shape, TextHAlign, TextPrimitive,
};
use crate::view::{TransformOutcome, View, ViewCapabilities, ViewContext, ViewModel};

const AXIS_COLOR: Color = Color::rgb(0.43, 0.44, 0.47);
const GRID_BORDER_COLOR: Color = Color::rgb(0.8, 0.8, 0.8);
const TICK_LENGTH: f64 = 5.0;
const LABEL_FONT_SIZE: f64 = 12.0;
const LABEL_MARGIN: f64 = 8.0;

fn frame_lines(rect: Rect, color: Color) -> [LinePrimitive; 4] {
    let Rect {
        x,
        y,
        width,
        height,
    } = rect;
    [
        LinePrimitive::new(x, y, x + width, y, 1.0, color),
        LinePrimitive::new(x + width, y, x + width, y + height, 1.0, color),
        LinePrimitive::new(x, y + height, x + width, y + height, 1.0, color),
        LinePrimitive::new(x, y, x, y + height, 1.0, color),
    ]
}

/// Draws the grid background and border when `show` is set.
#[derive(Debug, Default)]
pub struct GridView {
    group: Group,
}

impl View for GridView {
    fn type_name(&self) -> &str {
        "grid"
    }

    fn group(&self) -> &Group {
        &self.group
    }

    fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    fn render(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()> {
        self.group.clear();
        let node = model.node();
        let shown = node.get("show").and_then(Value::as_bool).unwrap_or(false);
        if !shown {
            return Ok(());
        }
        let Some(cartesian) = ctx
            .coordinate_systems
            .of_type::<Cartesian2d>()
            .find(|cartesian| cartesian.grid_index() == node.identity().component_index)
        else {
            return Ok(());
        };

        let rect = cartesian.rect();
        if let Some(background) = option_str(node.option(), "backgroundColor").and_then(Color::from_hex) {
            let fill = RectPrimitive::new(rect.x, rect.y, rect.width, rect.height, background);
            self.group.add(Element::new(Shape::Rect(fill)).with_z(-1.0));
        }
        let border = option_str(node.option(), "borderColor")
            .and_then(Color::from_hex)
            .unwrap_or(GRID_BORDER_COLOR);
        for line in frame_lines(rect, border) {
            self.group.add(Element::new(Shape::Line(line)));
        }
        Ok(())
    }
}

/// Draws one axis line with its ticks and labels, on the grid edge given by
/// `position`.
#[derive(Debug)]
pub struct AxisView {
    dim: AxisDim,
    group: Group,
}

impl AxisView {
    #[must_use]
    pub fn new(dim: AxisDim) -> Self {
        Self {
            dim,
            group: Group::new(),
        }
    }

    fn draw(&mut self, option: &Value, rect: Rect, axis: &CartesianAxis) {
        let shown = |path: &[&str]| option_at(option, path).and_then(Value::as_bool).unwrap_or(true);
        let position = option_str(option, "position");
        let formatter = axis.label_formatter();
        let scale = axis.scale();

        match self.dim {
            AxisDim::X => {
                let y = if position == Some("top") {
                    rect.y
                } else {
                    rect.y + rect.height
                };
                let outward = if position == Some("top") { -1.0 } else { 1.0 };
                if shown(&["axisLine", "show"]) {
                    let line = LinePrimitive::new(rect.x, y, rect.x + rect.width, y, 1.0, AXIS_COLOR);
                    self.group.add(Element::new(Shape::Line(line)));
                }
                for tick in scale.ticks() {
                    let x = axis.data_to_coord(tick);
                    if shown(&["axisTick", "show"]) {
                        let line =
                            LinePrimitive::new(x, y, x, y + outward * TICK_LENGTH, 1.0, AXIS_COLOR);
                        self.group.add(Element::new(Shape::Line(line)));
                    }
                    if shown(&["axisLabel", "show"]) {
                        let label = TextPrimitive::new(
                            formatter.format(scale, tick),
                            x,
                            y + outward * (TICK_LENGTH + LABEL_MARGIN),
                            LABEL_FONT_SIZE,
                            AXIS_COLOR,
                            TextHAlign::Center,
                        );
                        if !label.text.is_empty() {
                            self.group.add(Element::new(Shape::Text(label)));
                        }
                    }
                }
            }
            AxisDim::Y => {
                let right = position == Some("right");
                let x = if right { rect.x + rect.width } else { rect.x };
                let outward = if right { 1.0 } else { -1.0 };
                if shown(&["axisLine", "show"]) {
                    let line = LinePrimitive::new(x, rect.y, x, rect.y + rect.height, 1.0, AXIS_COLOR);
                    self.group.add(Element::new(Shape::Line(line)));
                }
                for tick in scale.ticks() {
                    let y = axis.data_to_coord(tick);
                    if shown(&["axisTick", "show"]) {
                        let line =
                            LinePrimitive::new(x, y, x + outward * TICK_LENGTH, y, 1.0, AXIS_COLOR);
                        self.group.add(Element::new(Shape::Line(line)));
                    }
                    if shown(&["axisLabel", "show"]) {
                        let label = TextPrimitive::new(
                            formatter.format(scale, tick),
                            x + outward * (TICK_LENGTH + LABEL_MARGIN),
                            y,
                            LABEL_FONT_SIZE,
                            AXIS_COLOR,
                            if right { TextHAlign::Left } else { TextHAlign::Right },
                        );
                        if !label.text.is_empty() {
                            self.group.add(Element::new(Shape::Text(label)));
                        }
                    }
                }
            }
        }
    }
}

impl View for AxisView {
    fn type_name(&self) -> &str {
        match self.dim {
            AxisDim::X => "xAxis",
            AxisDim::Y => "yAxis",
        }
    }

    fn capabilities(&self) -> ViewCapabilities {
        ViewCapabilities {
            update_transform: true,
            ..ViewCapabilities::default()
        }
    }

    fn group(&self) -> &Group {
        &self.group
    }

    fn group_mut(&mut self) -> &mut Group {
        &mut self.group
    }

    fn render(&mut self, model: ViewModel<'_>, ctx: &ViewContext<'_>) -> ChartResult<()> {
        self.group.clear();
        let node = model.node();
        if node.get("show").and_then(Value::as_bool) == Some(false) {
            return Ok(());
        }
        let uid = model.uid();
        let Some((rect, axis)) = ctx
            .coordinate_systems
            .of_type::<Cartesian2d>()
            .find_map(|cartesian| cartesian.axis_by_model(uid).map(|axis| (cartesian.rect(), axis)))
        else {
            return Ok(());
        };
        self.draw(node.option(), rect, axis);
        Ok(())
    }

    /// Axes redraw in place; nothing downstream depends on them.
    fn update_transform(
        &mut self,
        model: ViewModel<'_>,
        ctx: &ViewContext<'_>,
    ) -> ChartResult<Option<TransformOutcome>> {
        self.render(model, ctx)?;
        Ok(Some(TransformOutcome { update: false }))
    }
}
