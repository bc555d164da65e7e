//! Built-in chart types and the plugin observer interface.
//!
//! Everything here goes through the public [`ChartRegistry`] surface, the
//! same way a third-party chart type would.

pub mod cartesian_views;
pub mod loading;
pub mod palette;
pub mod plugins;
pub mod sankey;
pub mod scatter;

use std::sync::Arc;

use serde_json::json;

use crate::api::ChartRegistry;
use crate::coord::AxisDim;
use crate::error::ChartResult;
use crate::pipeline::{PRIORITY_VISUAL_GLOBAL, PRIORITY_VISUAL_LAYOUT, StageHandler};
use crate::view::View;

pub use cartesian_views::{AxisView, GridView};
pub use loading::{DEFAULT_LOADING, LOADING_Z, default_loading};
pub use palette::SeriesPaletteVisual;
pub use plugins::{ChartPlugin, PluginContext, PluginEvent};
pub use sankey::{SANKEY, SankeyLayout, SankeyLevelVisual, SankeyView};
pub use scatter::{PointLayout, SCATTER, ScatterView};

/// Registers the cartesian components, the `scatter` and `sankey` series,
/// the palette visual and the `default` loading effect.
pub fn install_builtins(registry: &mut ChartRegistry) -> ChartResult<()> {
    registry.register_component_type("grid", None);
    registry.register_component_type("xAxis", None);
    registry.register_component_type("yAxis", None);
    registry.register_series_type(SCATTER, Some(json!({ "coordinateSystem": "cartesian2d" })));
    registry.register_series_type(SANKEY, None);

    registry.register_visual(
        Some(PRIORITY_VISUAL_GLOBAL),
        StageHandler::series(SeriesPaletteVisual::default()),
    )?;
    registry.register_layout(
        Some(PRIORITY_VISUAL_LAYOUT),
        StageHandler::series(PointLayout::default()),
    )?;
    registry.register_layout(None, StageHandler::series(SankeyLayout::default()))?;
    registry.register_visual(None, StageHandler::series(SankeyLevelVisual::default()))?;

    registry.register_view(
        "series",
        SCATTER,
        Arc::new(|| Box::new(ScatterView::default()) as Box<dyn View>),
    );
    registry.register_view(
        "series",
        SANKEY,
        Arc::new(|| Box::new(SankeyView::default()) as Box<dyn View>),
    );
    registry.register_view(
        "grid",
        "",
        Arc::new(|| Box::new(GridView::default()) as Box<dyn View>),
    );
    registry.register_view(
        "xAxis",
        "",
        Arc::new(|| Box::new(AxisView::new(AxisDim::X)) as Box<dyn View>),
    );
    registry.register_view(
        "yAxis",
        "",
        Arc::new(|| Box::new(AxisView::new(AxisDim::Y)) as Box<dyn View>),
    );
    registry.register_loading(DEFAULT_LOADING, Arc::new(default_loading));
    Ok(())
}
