//! Orchestration layer: the [`ChartEngine`] facade, its registry and the
//! update cycles it runs.

mod action;
mod action_dispatch;
mod chart_runtime;
mod convert;
mod engine;
mod engine_config;
mod engine_core;
mod engine_init;
mod events;
mod extension_api;
mod loading;
mod plugin_dispatch;
mod plugin_registry;
mod registry;
mod series_render;
mod set_option;
mod update_methods;
mod view_reconciler;
mod z_level;

pub use action::{ActionHandler, ActionInfo, EventRefinement, EventRefiner, UpdateMethod, noop_action};
pub use engine::ChartEngine;
pub use engine_config::{ChartEngineConfig, FrameBudget};
pub use events::{ChartEvent, EVENT_FINISHED, EVENT_RENDERED, EVENT_UPDATED, EventListener};
pub use extension_api::{DispatchOpts, ExtensionApi, ProcessState};
pub use registry::{ChartRegistry, LifecycleEvent, LifecycleHook, LoadingEffect, OptionPreprocessor};
pub use series_render::HOVER_LAYER_ZLEVEL;
pub use set_option::{ResizeOpts, SetOptionOpts};
