//! `sankey` series: nodes arranged in depth columns, links drawn between
//! them, node styles resolved through the `levels` override chain.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;

use serde_json::Value;

use crate::core::{Point, Rect, Viewport};
use crate::error::ChartResult;
use crate::model::option::{option_at, option_f64};
use crate::model::{GlobalModel, ItemLayout, ModelNode, SeriesData, SeriesModel};
use crate::pipeline::{SeriesStageHandler, StageContext, StageHandlerInfo, StageReset};
use crate::render::{
    Color, Element, Group, LinePrimitive, RectPrimitive, Shape, TextHAlign, TextPrimitive,
};
use crate::view::{View, ViewCapabilities, ViewContext, ViewModel};

pub const SANKEY: &str = "sankey";

const DEFAULT_NODE_WIDTH: f64 = 20.0;
const DEFAULT_NODE_GAP: f64 = 8.0;
const MARGIN_RATIO: f64 = 0.05;
const LINK_COLOR: Color = Color::rgba(0.19, 0.27, 0.34, 0.2);
const LABEL_COLOR: Color = Color::rgb(0.2, 0.2, 0.2);
const NODE_FALLBACK_COLOR: Color = Color::rgb(0.33, 0.44, 0.78);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SankeyLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
}

fn node_index(data: &SeriesData, endpoint: &Value) -> Option<usize> {
    match endpoint {
        Value::String(name) => (0..data.count()).find(|index| data.name(*index) == Some(name.as_str())),
        Value::Number(number) => number
            .as_u64()
            .and_then(|index| usize::try_from(index).ok())
            .filter(|index| *index < data.count()),
        _ => None,
    }
}

/// Links of `links` (or `edges`) whose endpoints resolve to visible nodes.
#[must_use]
pub fn sankey_links(series: &SeriesModel) -> Vec<SankeyLink> {
    let option = series.option();
    let Some(entries) = option
        .get("links")
        .or_else(|| option.get("edges"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    let data = series.data();
    entries
        .iter()
        .filter_map(|link| {
            let source = node_index(data, link.get("source")?)?;
            let target = node_index(data, link.get("target")?)?;
            let value = option_f64(link, "value").filter(|value| *value > 0.0).unwrap_or(1.0);
            Some(SankeyLink {
                source,
                target,
                value,
            })
        })
        .collect()
}

/// Column of each node: the declared `depth`, else the longest path from a
/// node without incoming links. Nodes on cycles stay in column 0.
#[must_use]
pub fn node_depths(series: &SeriesModel, links: &[SankeyLink]) -> Vec<u32> {
    let count = series.data().count();
    let mut depths = vec![0_u32; count];
    let mut incoming = vec![0_usize; count];
    for link in links {
        incoming[link.target] += 1;
    }

    let mut queue: VecDeque<usize> = (0..count).filter(|node| incoming[*node] == 0).collect();
    while let Some(node) = queue.pop_front() {
        for link in links.iter().filter(|link| link.source == node) {
            depths[link.target] = depths[link.target].max(depths[node] + 1);
            incoming[link.target] -= 1;
            if incoming[link.target] == 0 {
                queue.push_back(link.target);
            }
        }
    }

    for (index, depth) in depths.iter_mut().enumerate() {
        if let Some(declared) = series.item_depth(index) {
            *depth = declared;
        }
    }
    depths
}

fn node_values(series: &SeriesModel, links: &[SankeyLink]) -> Vec<f64> {
    let data = series.data();
    (0..data.count())
        .map(|node| {
            let declared = data.value(node, 0);
            if declared.is_finite() && declared > 0.0 {
                return declared;
            }
            let inflow: f64 = links.iter().filter(|link| link.target == node).map(|link| link.value).sum();
            let outflow: f64 = links.iter().filter(|link| link.source == node).map(|link| link.value).sum();
            inflow.max(outflow).max(1.0)
        })
        .collect()
}

/// Node rectangles for `viewport`, indexed like the series data.
#[must_use]
pub fn layout_nodes(series: &SeriesModel, viewport: Viewport) -> Vec<Rect> {
    let links = sankey_links(series);
    let depths = node_depths(series, &links);
    let values = node_values(series, &links);
    let option = series.option();
    let node_width = option_f64(option, "nodeWidth").unwrap_or(DEFAULT_NODE_WIDTH);
    let node_gap = option_f64(option, "nodeGap").unwrap_or(DEFAULT_NODE_GAP);

    let width = f64::from(viewport.width);
    let height = f64::from(viewport.height);
    let left = width * MARGIN_RATIO;
    let top = height * MARGIN_RATIO;
    let inner_width = width * (1.0 - 2.0 * MARGIN_RATIO);
    let inner_height = height * (1.0 - 2.0 * MARGIN_RATIO);

    // One column per distinct depth; declared depths may leave gaps.
    let mut by_depth: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (node, depth) in depths.iter().enumerate() {
        by_depth.entry(*depth).or_default().push(node);
    }
    let columns: Vec<Vec<usize>> = by_depth.into_values().collect();
    let column_count = columns.len().max(1);

    let scale = columns
        .iter()
        .map(|column| {
            let total: f64 = column.iter().map(|node| values[*node]).sum();
            let gaps = node_gap * (column.len() as f64 - 1.0);
            ((inner_height - gaps) / total).max(0.0)
        })
        .fold(f64::INFINITY, f64::min);
    let scale = if scale.is_finite() { scale } else { 0.0 };
    let column_step = if column_count > 1 {
        (inner_width - node_width) / (column_count as f64 - 1.0)
    } else {
        0.0
    };

    let mut rects = vec![Rect::new(0.0, 0.0, 0.0, 0.0); depths.len()];
    for (depth, column) in columns.iter().enumerate() {
        let x = left + column_step * depth as f64;
        let mut y = top;
        for node in column {
            let node_height = values[*node] * scale;
            rects[*node] = Rect::new(x, y, node_width, node_height);
            y += node_height + node_gap;
        }
    }
    rects
}

/// Places nodes in depth columns; needs every node before anything is drawn.
#[derive(Debug)]
pub struct SankeyLayout {
    info: StageHandlerInfo,
}

impl Default for SankeyLayout {
    fn default() -> Self {
        Self {
            info: StageHandlerInfo::new("sankey-layout")
                .for_series_type(SANKEY)
                .layout()
                .blocking(),
        }
    }
}

impl SeriesStageHandler for SankeyLayout {
    fn info(&self) -> &StageHandlerInfo {
        &self.info
    }

    fn reset(
        &self,
        series: &SeriesModel,
        _model: &GlobalModel,
        ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset> {
        let rects = layout_nodes(series, ctx.viewport);
        Ok(StageReset::none().with_progress(
            move |range: Range<usize>, data: &mut SeriesData| -> ChartResult<()> {
                for index in range {
                    if let Some(rect) = rects.get(index) {
                        data.set_item_layout(index, ItemLayout::Rect(*rect));
                    }
                }
                Ok(())
            },
        ))
    }
}

/// Node colors and opacity resolved item -> level (by depth) -> series, with
/// the palette keyed by node name as the last resort.
#[derive(Debug)]
pub struct SankeyLevelVisual {
    info: StageHandlerInfo,
}

impl Default for SankeyLevelVisual {
    fn default() -> Self {
        Self {
            info: StageHandlerInfo::new("sankey-level-visual").for_series_type(SANKEY),
        }
    }
}

impl SeriesStageHandler for SankeyLevelVisual {
    fn info(&self) -> &StageHandlerInfo {
        &self.info
    }

    fn reset(
        &self,
        series: &SeriesModel,
        model: &GlobalModel,
        _ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset> {
        let links = sankey_links(series);
        let depths = node_depths(series, &links);
        let data = series.data();
        let levels = series.levels();

        let styles: Vec<(Color, Option<f64>)> = (0..data.count())
            .map(|node| {
                let item = data.row(node).and_then(|row| row.item_option.as_ref());
                let depth = depths.get(node).copied();
                let color = levels
                    .resolve(series.option(), depth, item, &["itemStyle", "color"])
                    .and_then(Value::as_str)
                    .and_then(Color::from_hex)
                    .unwrap_or_else(|| {
                        let key = data
                            .name(node)
                            .map_or_else(|| format!("{}-{node}", series.id()), str::to_owned);
                        model.color_from_palette(&key)
                    });
                let opacity = levels
                    .resolve(series.option(), depth, item, &["itemStyle", "opacity"])
                    .and_then(Value::as_f64);
                (color, opacity)
            })
            .collect();

        Ok(StageReset::none().with_progress(
            move |range: Range<usize>, data: &mut SeriesData| -> ChartResult<()> {
                for index in range {
                    let (Some((color, opacity)), Some(visual)) =
                        (styles.get(index), data.item_visual_mut(index))
                    else {
                        continue;
                    };
                    visual.color = Some(*color);
                    visual.opacity = *opacity;
                }
                Ok(())
            },
        ))
    }
}

fn node_rect(data: &SeriesData, node: usize) -> Option<Rect> {
    match data.item_layout(node)? {
        ItemLayout::Rect(rect) => Some(rect),
        ItemLayout::Point(_) => None,
    }
}

/// Draws links under node rectangles, plus node labels.
#[derive(Debug, Default)]
pub struct SankeyView {
    group: Group,
}

impl View for SankeyView {
    fn type_name(&self) -> &str {
        SANKEY
    }

    fn capabilities(&self) -> ViewCapabilities {
        ViewCapabilities {
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
        let data = series.data();

        for link in sankey_links(series) {
            let (Some(source), Some(target)) = (node_rect(data, link.source), node_rect(data, link.target))
            else {
                continue;
            };
            let line = LinePrimitive::new(
                source.x + source.width,
                source.y + source.height / 2.0,
                target.x,
                target.y + target.height / 2.0,
                1.0,
                LINK_COLOR,
            );
            self.group.add(Element::new(Shape::Line(line)));
        }

        let show_label = option_at(series.option(), &["label", "show"])
            .and_then(Value::as_bool)
            .unwrap_or(true);
        for node in 0..data.count() {
            let Some(rect) = node_rect(data, node) else {
                continue;
            };
            let visual = data.item_visual(node);
            let mut color = visual.color.unwrap_or(NODE_FALLBACK_COLOR);
            if let Some(opacity) = visual.opacity {
                color.alpha = opacity.clamp(0.0, 1.0);
            }
            let fill = RectPrimitive::new(rect.x, rect.y, rect.width, rect.height, color);
            self.group.add(
                Element::new(Shape::Rect(fill))
                    .with_data_index(node)
                    .with_z(1.0),
            );

            if let (true, Some(name)) = (show_label, data.name(node)) {
                let label = TextPrimitive::new(
                    name,
                    rect.x + rect.width + 5.0,
                    rect.y + rect.height / 2.0,
                    12.0,
                    LABEL_COLOR,
                    TextHAlign::Left,
                );
                self.group.add(Element::new(Shape::Text(label)).with_z(2.0));
            }
        }
        Ok(())
    }

    fn contain_point(&self, point: Point, _model: ViewModel<'_>) -> Option<bool> {
        Some(self.group.elements().iter().any(|element| match element.shape() {
            Shape::Rect(rect) => Rect::new(rect.x, rect.y, rect.width, rect.height).contains(point),
            _ => false,
        }))
    }
}
