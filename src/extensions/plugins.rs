use serde::{Deserialize, Serialize};

use crate::core::Viewport;

/// Read-only state snapshot passed to plugin hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginContext {
    pub viewport: Viewport,
    pub series_count: usize,
    pub component_count: usize,
    pub view_count: usize,
    pub main_process_version: u32,
    /// Progressive work is still pending.
    pub unfinished: bool,
}

/// Event stream exposed to plugins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginEvent {
    OptionUpdated { series_count: usize },
    ActionDispatched { action_type: String },
    Resized { width: u32, height: u32 },
    ProgressiveFrame { rounds: u32 },
    Rendered { primitive_count: usize },
    Finished,
    Disposed,
}

/// Extension hook interface for bounded custom logic.
///
/// Plugins can observe events and read engine context without mutating core
/// internals directly.
pub trait ChartPlugin {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &PluginEvent, context: PluginContext);
}
