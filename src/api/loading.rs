use serde_json::Value;
use tracing::{debug, warn};

use crate::extensions::DEFAULT_LOADING;
use crate::render::Renderer;

use super::ChartEngine;
use super::chart_runtime::ShownLoading;
use super::engine_core::EngineCore;

impl EngineCore {
    fn detach_loading(&mut self) -> Option<ShownLoading> {
        let shown = self.runtime.loading.take()?;
        self.scene.remove(shown.group.id());
        self.runtime.needs_paint = true;
        Some(shown)
    }

    /// Builds and attaches the overlay; `false` when `name` is unknown.
    fn attach_loading(&mut self, name: &str, cfg: Value) -> bool {
        let Some(effect) = self.registry.loading_effect(name) else {
            return false;
        };
        let group = effect(&cfg, self.config.viewport);
        self.scene.add(group.id());
        self.runtime.loading = Some(ShownLoading {
            name: name.to_owned(),
            cfg,
            group,
        });
        self.runtime.needs_paint = true;
        true
    }

    /// Rebuilds a shown overlay for the current viewport.
    pub(super) fn resize_loading(&mut self) {
        if let Some(shown) = self.detach_loading() {
            self.attach_loading(&shown.name, shown.cfg);
        }
    }
}

impl<R: Renderer> ChartEngine<R> {
    /// Shows the loading effect registered as `name` (`default` when `None`),
    /// replacing any overlay already shown. Painted on the next frame.
    ///
    /// An unknown name only hides the current overlay.
    pub fn show_loading(&mut self, name: Option<&str>, cfg: Value) {
        if self.core.api.is_disposed() {
            warn!("show_loading on a disposed chart ignored");
            return;
        }
        let name = name.unwrap_or(DEFAULT_LOADING);
        self.core.detach_loading();
        if self.core.attach_loading(name, cfg) {
            debug!(name, "loading shown");
        } else {
            warn!(name, "loading effect is not registered");
        }
    }

    pub fn hide_loading(&mut self) {
        if self.core.api.is_disposed() {
            warn!("hide_loading on a disposed chart ignored");
            return;
        }
        if self.core.detach_loading().is_some() {
            debug!("loading hidden");
        }
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.core.runtime.loading.is_some()
    }
}
