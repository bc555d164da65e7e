use crate::coord::CoordinateSystemManager;
use crate::error::ChartResult;
use crate::model::GlobalModel;
use crate::pipeline::Scheduler;
use crate::render::SceneRoot;

use super::{
    ChartEngineConfig, ChartRegistry, ExtensionApi, chart_runtime::ChartRuntimeState,
    view_reconciler::ViewLists,
};

/// Internal engine core state used by the public facade (`ChartEngine`).
pub(super) struct EngineCore {
    pub(super) config: ChartEngineConfig,
    pub(super) registry: ChartRegistry,
    /// `None` until the first `set_option`.
    pub(super) model: Option<GlobalModel>,
    pub(super) scheduler: Scheduler,
    pub(super) coordinate_systems: CoordinateSystemManager,
    pub(super) views: ViewLists,
    pub(super) scene: SceneRoot,
    pub(super) api: ExtensionApi,
    pub(super) runtime: ChartRuntimeState,
}

impl EngineCore {
    /// Runs `cycle` with the model lent out of the core, so cycle steps can
    /// borrow the rest of the core mutably. The model is put back even when
    /// the cycle fails. Returns `Ok(None)` before the first `set_option`.
    pub(super) fn with_model<T>(
        &mut self,
        cycle: impl FnOnce(&mut Self, &mut GlobalModel) -> ChartResult<T>,
    ) -> ChartResult<Option<T>> {
        let Some(mut model) = self.model.take() else {
            return Ok(None);
        };
        let result = cycle(self, &mut model);
        self.model = Some(model);
        result.map(Some)
    }
}
