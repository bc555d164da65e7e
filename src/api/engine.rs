use crate::coord::CoordinateSystemManager;
use crate::core::Viewport;
use crate::error::ChartResult;
use crate::model::GlobalModel;
use crate::pipeline::Scheduler;
use crate::render::{Renderer, SceneRoot};

use super::{ChartEngineConfig, ChartRegistry, ExtensionApi, ProcessState, engine_core::EngineCore};

/// Main orchestration facade consumed by host applications.
///
/// `ChartEngine` owns the model tree, the scheduler, the coordinate systems
/// and the views, and turns option mutations and actions into update cycles
/// painted through the renderer.
pub struct ChartEngine<R: Renderer> {
    pub(super) renderer: R,
    pub(super) core: EngineCore,
}

impl<R: Renderer> ChartEngine<R> {
    #[must_use]
    pub fn config(&self) -> &ChartEngineConfig {
        &self.core.config
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.core.config.viewport
    }

    #[must_use]
    pub fn registry(&self) -> &ChartRegistry {
        &self.core.registry
    }

    #[must_use]
    pub fn model(&self) -> Option<&GlobalModel> {
        self.core.model.as_ref()
    }

    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.core.scheduler
    }

    #[must_use]
    pub fn coordinate_systems(&self) -> &CoordinateSystemManager {
        &self.core.coordinate_systems
    }

    #[must_use]
    pub fn scene(&self) -> &SceneRoot {
        &self.core.scene
    }

    /// Handle for code that needs to dispatch actions from inside a cycle.
    #[must_use]
    pub fn api(&self) -> ExtensionApi {
        self.core.api.clone()
    }

    #[must_use]
    pub fn process_state(&self) -> ProcessState {
        self.core.api.process_state()
    }

    #[must_use]
    pub fn main_process_version(&self) -> u32 {
        self.core.api.main_process_version()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.core.api.is_disposed()
    }

    /// A lazy update is waiting for the next `on_frame`.
    #[must_use]
    pub fn has_pending_update(&self) -> bool {
        self.core.runtime.pending_update.is_some()
    }

    /// Progressive work remains.
    #[must_use]
    pub fn is_unfinished(&self) -> bool {
        self.core.scheduler.unfinished
    }

    /// Emphasized elements currently paint on the hover layer.
    #[must_use]
    pub fn uses_hover_layer(&self) -> bool {
        self.core.runtime.hover_layer_active
    }

    /// Paints the current scene immediately.
    pub fn render(&mut self) -> ChartResult<()> {
        self.flush()
    }

    #[must_use]
    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    #[must_use]
    pub fn into_renderer(self) -> R {
        self.renderer
    }

    pub(super) fn fresh_scheduler(config: &ChartEngineConfig, registry: &ChartRegistry) -> Scheduler {
        Scheduler::new(
            registry.stage_handlers().clone(),
            config.progressive_step,
            config.progressive_threshold,
        )
    }

    pub(super) fn fresh_state(config: ChartEngineConfig) -> (CoordinateSystemManager, SceneRoot, ExtensionApi) {
        (
            CoordinateSystemManager::new(),
            SceneRoot::default(),
            ExtensionApi::new(config.viewport),
        )
    }
}
