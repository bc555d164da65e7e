use crate::extensions::{PluginContext, PluginEvent};
use crate::render::Renderer;

use super::ChartEngine;

impl<R: Renderer> ChartEngine<R> {
    pub(super) fn plugin_context(&self) -> PluginContext {
        let (series_count, component_count) = self
            .core
            .model
            .as_ref()
            .map_or((0, 0), |model| {
                (model.series().len(), model.all_components().count())
            });
        PluginContext {
            viewport: self.core.config.viewport,
            series_count,
            component_count,
            view_count: self.core.views.view_count(),
            main_process_version: self.core.api.main_process_version(),
            unfinished: self.core.scheduler.unfinished,
        }
    }

    pub(super) fn emit_plugin_event(&mut self, event: PluginEvent) {
        if self.core.runtime.plugins.is_empty() {
            return;
        }
        let context = self.plugin_context();
        for plugin in &mut self.core.runtime.plugins {
            plugin.on_event(&event, context);
        }
    }
}
