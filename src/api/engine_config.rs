use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Viewport;
use crate::error::{ChartError, ChartResult};

/// How much progressive work one `on_frame` call may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameBudget {
    /// Keep running rounds while wall time remains.
    Time(Duration),
    /// Run exactly this many rounds (deterministic; used by tests).
    Rounds(u32),
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self::Time(Duration::from_millis(1))
    }
}

/// Public engine bootstrap configuration.
///
/// This type is serializable so host applications can persist/load chart setup
/// without inventing their own ad-hoc format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartEngineConfig {
    pub viewport: Viewport,
    /// Items processed per progressive chunk when a series sets no
    /// `progressive`.
    #[serde(default = "default_progressive_step")]
    pub progressive_step: usize,
    /// Item count from which series render progressively when they set no
    /// `progressiveThreshold`.
    #[serde(default = "default_progressive_threshold")]
    pub progressive_threshold: usize,
    #[serde(default)]
    pub frame_budget: FrameBudget,
    /// Above this many rendered elements, emphasized elements paint on a
    /// dedicated hover layer.
    #[serde(default = "default_hover_layer_threshold")]
    pub hover_layer_threshold: usize,
}

impl ChartEngineConfig {
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            progressive_step: default_progressive_step(),
            progressive_threshold: default_progressive_threshold(),
            frame_budget: FrameBudget::default(),
            hover_layer_threshold: default_hover_layer_threshold(),
        }
    }

    #[must_use]
    pub fn with_progressive_step(mut self, step: usize) -> Self {
        self.progressive_step = step;
        self
    }

    #[must_use]
    pub fn with_progressive_threshold(mut self, threshold: usize) -> Self {
        self.progressive_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_frame_budget(mut self, budget: FrameBudget) -> Self {
        self.frame_budget = budget;
        self
    }

    #[must_use]
    pub fn with_hover_layer_threshold(mut self, threshold: usize) -> Self {
        self.hover_layer_threshold = threshold;
        self
    }

    pub fn validate(&self) -> ChartResult<()> {
        if !self.viewport.is_valid() {
            return Err(ChartError::InvalidViewport {
                width: self.viewport.width,
                height: self.viewport.height,
            });
        }
        if self.progressive_step == 0 {
            return Err(ChartError::InvalidData(
                "progressive step must be greater than zero".to_owned(),
            ));
        }
        if matches!(self.frame_budget, FrameBudget::Rounds(0)) {
            return Err(ChartError::InvalidData(
                "frame budget must allow at least one round".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> ChartResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ChartError::InvalidData(format!("serialize config: {err}")))
    }

    pub fn from_json_str(input: &str) -> ChartResult<Self> {
        serde_json::from_str(input)
            .map_err(|err| ChartError::InvalidData(format!("parse config: {err}")))
    }
}

fn default_progressive_step() -> usize {
    400
}

fn default_progressive_threshold() -> usize {
    3_000
}

fn default_hover_layer_threshold() -> usize {
    3_000
}
