use tracing::debug;

use crate::error::{ChartError, ChartResult};
use crate::extensions::ChartPlugin;
use crate::render::Renderer;

use super::ChartEngine;

impl<R: Renderer> ChartEngine<R> {
    /// Adds an observer; ids must be non-empty and unique per chart.
    pub fn register_plugin(&mut self, plugin: Box<dyn ChartPlugin>) -> ChartResult<()> {
        let id = plugin.id();
        if id.is_empty() {
            return Err(ChartError::InvalidData("plugin id must not be empty".to_owned()));
        }
        if self.has_plugin(id) {
            return Err(ChartError::InvalidData(format!(
                "plugin `{id}` is already registered on this chart"
            )));
        }
        debug!(plugin_id = id, "plugin registered");
        self.core.runtime.plugins.push(plugin);
        Ok(())
    }

    /// Returns `true` when a plugin with `plugin_id` was removed.
    pub fn unregister_plugin(&mut self, plugin_id: &str) -> bool {
        let before = self.core.runtime.plugins.len();
        self.core.runtime.plugins.retain(|plugin| plugin.id() != plugin_id);
        before != self.core.runtime.plugins.len()
    }

    #[must_use]
    pub fn plugin_count(&self) -> usize {
        self.core.runtime.plugins.len()
    }

    /// Registration order.
    pub fn plugin_ids(&self) -> impl Iterator<Item = &str> {
        self.core.runtime.plugins.iter().map(|plugin| plugin.id())
    }

    #[must_use]
    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.plugin_ids().any(|id| id == plugin_id)
    }
}
