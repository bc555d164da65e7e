use crate::error::ChartResult;
use crate::render::{RenderFrame, Renderer};

/// No-op renderer used by tests and headless engine usage.
///
/// It still validates frame content and keeps the last frame so tests can
/// compare painted output between update paths.
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub render_count: usize,
    pub last_primitive_count: usize,
    pub last_frame: Option<RenderFrame>,
}

impl Renderer for NullRenderer {
    fn render(&mut self, frame: &RenderFrame) -> ChartResult<()> {
        frame.validate()?;
        self.render_count += 1;
        self.last_primitive_count = frame.primitive_count();
        self.last_frame = Some(frame.clone());
        Ok(())
    }
}
