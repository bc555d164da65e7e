use tracing::debug;

use crate::error::ChartResult;
use crate::render::Renderer;

use super::{
    ChartEngine, ChartEngineConfig, ChartRegistry, chart_runtime::ChartRuntimeState,
    engine_core::EngineCore, view_reconciler::ViewLists,
};

impl<R: Renderer> ChartEngine<R> {
    /// Creates an engine over an explicit registry.
    ///
    /// The registry is owned by the engine from here on; stage handlers are
    /// sorted once for its scheduler.
    pub fn new(renderer: R, registry: ChartRegistry, config: ChartEngineConfig) -> ChartResult<Self> {
        config.validate()?;

        let scheduler = Self::fresh_scheduler(&config, &registry);
        let (coordinate_systems, scene, api) = Self::fresh_state(config);
        debug!(
            width = config.viewport.width,
            height = config.viewport.height,
            handler_count = registry.stage_handlers().len(),
            "chart engine created"
        );

        Ok(Self {
            renderer,
            core: EngineCore {
                config,
                registry,
                model: None,
                scheduler,
                coordinate_systems,
                views: ViewLists::default(),
                scene,
                api,
                runtime: ChartRuntimeState::default(),
            },
        })
    }

    /// Creates an engine over [`ChartRegistry::with_builtins`].
    pub fn with_builtins(renderer: R, config: ChartEngineConfig) -> ChartResult<Self> {
        Self::new(renderer, ChartRegistry::with_builtins()?, config)
    }
}
