mod frame;
mod null_renderer;
mod primitives;
mod scene;

pub use frame::{RenderFrame, ZLevelLayer};
pub use null_renderer::NullRenderer;
pub use primitives::{
    CirclePrimitive, Color, LinePrimitive, RectPrimitive, TextHAlign, TextPrimitive,
};
pub use scene::{Element, ElementState, Group, GroupId, HoverState, SceneRoot, Shape};

use crate::error::ChartResult;

/// Contract implemented by any rendering backend.
///
/// Backends receive a fully materialized, deterministic `RenderFrame` built
/// from the groups attached to the scene root, so drawing code stays isolated
/// from models, pipelines and views.
pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame) -> ChartResult<()>;
}
