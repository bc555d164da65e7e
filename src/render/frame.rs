use crate::core::Viewport;
use crate::error::{ChartError, ChartResult};
use crate::render::{CirclePrimitive, LinePrimitive, RectPrimitive, Shape, TextPrimitive};

/// Primitives painted on one z-level canvas layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ZLevelLayer {
    pub zlevel: i32,
    pub lines: Vec<LinePrimitive>,
    pub rects: Vec<RectPrimitive>,
    pub circles: Vec<CirclePrimitive>,
    pub texts: Vec<TextPrimitive>,
}

impl ZLevelLayer {
    #[must_use]
    pub fn new(zlevel: i32) -> Self {
        Self {
            zlevel,
            lines: Vec::new(),
            rects: Vec::new(),
            circles: Vec::new(),
            texts: Vec::new(),
        }
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.lines.len() + self.rects.len() + self.circles.len() + self.texts.len()
    }
}

/// Backend-agnostic scene for one chart draw pass.
///
/// Layers are kept sorted by ascending z-level; within a layer primitives are
/// in paint order.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub viewport: Viewport,
    pub layers: Vec<ZLevelLayer>,
}

impl RenderFrame {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            layers: Vec::new(),
        }
    }

    pub fn push_shape(&mut self, zlevel: i32, shape: Shape) {
        let layer = self.layer_mut(zlevel);
        match shape {
            Shape::Line(line) => layer.lines.push(line),
            Shape::Rect(rect) => layer.rects.push(rect),
            Shape::Circle(circle) => layer.circles.push(circle),
            Shape::Text(text) => layer.texts.push(text),
        }
    }

    fn layer_mut(&mut self, zlevel: i32) -> &mut ZLevelLayer {
        let position = match self
            .layers
            .binary_search_by_key(&zlevel, |layer| layer.zlevel)
        {
            Ok(position) => position,
            Err(position) => {
                self.layers.insert(position, ZLevelLayer::new(zlevel));
                position
            }
        };
        &mut self.layers[position]
    }

    #[must_use]
    pub fn layer(&self, zlevel: i32) -> Option<&ZLevelLayer> {
        self.layers.iter().find(|layer| layer.zlevel == zlevel)
    }

    #[must_use]
    pub fn zlevels(&self) -> Vec<i32> {
        self.layers.iter().map(|layer| layer.zlevel).collect()
    }

    #[must_use]
    pub fn primitive_count(&self) -> usize {
        self.layers.iter().map(ZLevelLayer::primitive_count).sum()
    }

    #[must_use]
    pub fn circle_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.circles.len()).sum()
    }

    pub fn validate(&self) -> ChartResult<()> {
        if !self.viewport.is_valid() {
            return Err(ChartError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }

        for layer in &self.layers {
            for line in &layer.lines {
                line.validate()?;
            }
            for rect in &layer.rects {
                rect.validate()?;
            }
            for circle in &layer.circles {
                circle.validate()?;
            }
            for text in &layer.texts {
                text.validate()?;
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primitive_count() == 0
    }
}
