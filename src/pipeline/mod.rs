//! Stage handlers, per-series task pipelines and the scheduler that runs them.

#[allow(clippy::module_inception)]
mod pipeline;
mod scheduler;
mod stage_handler;
mod task;

pub use pipeline::Pipeline;
pub use scheduler::{Scheduler, VisualTaskOpts};
pub use stage_handler::{
    HandlerKey, HandlerTarget, OverallPlan, OverallStageHandler, PRIORITY_PROCESSOR_DATASTACK,
    PRIORITY_PROCESSOR_DEFAULT, PRIORITY_PROCESSOR_FILTER, PRIORITY_PROCESSOR_SERIES_FILTER,
    PRIORITY_PROCESSOR_STATISTIC, PRIORITY_VISUAL_ARIA, PRIORITY_VISUAL_BRUSH,
    PRIORITY_VISUAL_CHART, PRIORITY_VISUAL_CHART_ITEM, PRIORITY_VISUAL_COMPONENT,
    PRIORITY_VISUAL_DECAL, PRIORITY_VISUAL_GLOBAL, PRIORITY_VISUAL_LAYOUT,
    PRIORITY_VISUAL_POST_CHART_LAYOUT, PRIORITY_VISUAL_PROGRESSIVE_LAYOUT, SeriesProgress,
    SeriesStageHandler, StageContext, StageHandler, StageHandlerInfo, StageHandlerRegistry,
    StageReset, VisualKind,
};
pub use task::{Task, TaskKey};
