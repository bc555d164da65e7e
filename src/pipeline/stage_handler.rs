use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::api::ExtensionApi;
use crate::coord::CoordinateSystemManager;
use crate::core::Viewport;
use crate::error::{ChartError, ChartResult};
use crate::model::{GlobalModel, ModelUid, Payload, SeriesData, SeriesModel, VisualPatch};

pub const PRIORITY_PROCESSOR_SERIES_FILTER: i32 = 800;
pub const PRIORITY_PROCESSOR_DATASTACK: i32 = 900;
pub const PRIORITY_PROCESSOR_FILTER: i32 = 1000;
pub const PRIORITY_PROCESSOR_DEFAULT: i32 = 2000;
pub const PRIORITY_PROCESSOR_STATISTIC: i32 = 5000;

pub const PRIORITY_VISUAL_LAYOUT: i32 = 1000;
pub const PRIORITY_VISUAL_PROGRESSIVE_LAYOUT: i32 = 1100;
pub const PRIORITY_VISUAL_GLOBAL: i32 = 2000;
pub const PRIORITY_VISUAL_CHART: i32 = 3000;
pub const PRIORITY_VISUAL_COMPONENT: i32 = 4000;
pub const PRIORITY_VISUAL_CHART_ITEM: i32 = 4500;
pub const PRIORITY_VISUAL_POST_CHART_LAYOUT: i32 = 4600;
pub const PRIORITY_VISUAL_BRUSH: i32 = 5000;
pub const PRIORITY_VISUAL_ARIA: i32 = 6000;
pub const PRIORITY_VISUAL_DECAL: i32 = 7000;

/// Series a handler creates tasks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerTarget {
    AllSeries,
    SeriesType(String),
}

/// Which visual pass a visual handler belongs to. Visual-only updates run
/// just the `Visual` kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualKind {
    Layout,
    #[default]
    Visual,
}

/// Static description of a stage handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageHandlerInfo {
    pub name: String,
    pub target: HandlerTarget,
    /// Needs the whole data before anything downstream can be chunked.
    pub blocks_progressive: bool,
    pub visual_kind: VisualKind,
    /// Still runs for series filtered out of the current cycle.
    pub perform_raw_series: bool,
}

impl StageHandlerInfo {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: HandlerTarget::AllSeries,
            blocks_progressive: false,
            visual_kind: VisualKind::Visual,
            perform_raw_series: false,
        }
    }

    #[must_use]
    pub fn for_series_type(mut self, sub_type: impl Into<String>) -> Self {
        self.target = HandlerTarget::SeriesType(sub_type.into());
        self
    }

    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocks_progressive = true;
        self
    }

    #[must_use]
    pub fn layout(mut self) -> Self {
        self.visual_kind = VisualKind::Layout;
        self
    }

    #[must_use]
    pub fn on_raw_series(mut self) -> Self {
        self.perform_raw_series = true;
        self
    }

    #[must_use]
    pub fn applies_to(&self, series: &SeriesModel) -> bool {
        match &self.target {
            HandlerTarget::AllSeries => true,
            HandlerTarget::SeriesType(sub_type) => series.sub_type() == sub_type,
        }
    }
}

/// Read-only inputs a handler sees while resetting.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub payload: Option<&'a Payload>,
    /// Actions dispatched here are queued until the cycle ends.
    pub api: &'a ExtensionApi,
    pub viewport: Viewport,
    pub coordinate_systems: &'a CoordinateSystemManager,
}

/// Chunk worker returned by a handler reset. Called with consecutive,
/// non-overlapping index ranges until the data is covered.
pub trait SeriesProgress {
    fn progress(&mut self, range: Range<usize>, data: &mut SeriesData) -> ChartResult<()>;
}

impl<F> SeriesProgress for F
where
    F: FnMut(Range<usize>, &mut SeriesData) -> ChartResult<()>,
{
    fn progress(&mut self, range: Range<usize>, data: &mut SeriesData) -> ChartResult<()> {
        self(range, data)
    }
}

/// Result of resetting one stage task.
#[derive(Default)]
pub struct StageReset {
    pub patch: Option<VisualPatch>,
    pub progress: Option<Box<dyn SeriesProgress>>,
    /// Drops the series from the rest of the cycle.
    pub filter_out: bool,
}

impl StageReset {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_patch(mut self, patch: VisualPatch) -> Self {
        self.patch = Some(patch);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: impl SeriesProgress + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    #[must_use]
    pub fn filter_out(mut self) -> Self {
        self.filter_out = true;
        self
    }
}

impl fmt::Debug for StageReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageReset")
            .field("patch", &self.patch)
            .field("has_progress", &self.progress.is_some())
            .field("filter_out", &self.filter_out)
            .finish()
    }
}

/// Per-series resets produced by one overall pass.
pub type OverallPlan = IndexMap<ModelUid, StageReset>;

/// Handler reset once per series task.
pub trait SeriesStageHandler: Send + Sync {
    fn info(&self) -> &StageHandlerInfo;

    fn reset(
        &self,
        series: &SeriesModel,
        model: &GlobalModel,
        ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset>;
}

/// Handler that needs every series at once (palette assignment, stacking).
/// Any dirty series re-runs the whole pass.
pub trait OverallStageHandler: Send + Sync {
    fn info(&self) -> &StageHandlerInfo;

    fn overall_reset(&self, model: &GlobalModel, ctx: &StageContext<'_>)
    -> ChartResult<OverallPlan>;
}

/// Identity of a registered handler object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerKey(usize);

#[derive(Clone)]
pub enum StageHandler {
    Series(Arc<dyn SeriesStageHandler>),
    Overall(Arc<dyn OverallStageHandler>),
}

impl StageHandler {
    pub fn series(handler: impl SeriesStageHandler + 'static) -> Self {
        Self::Series(Arc::new(handler))
    }

    pub fn overall(handler: impl OverallStageHandler + 'static) -> Self {
        Self::Overall(Arc::new(handler))
    }

    #[must_use]
    pub fn info(&self) -> &StageHandlerInfo {
        match self {
            Self::Series(handler) => handler.info(),
            Self::Overall(handler) => handler.info(),
        }
    }

    #[must_use]
    pub fn key(&self) -> HandlerKey {
        let address = match self {
            Self::Series(handler) => Arc::as_ptr(handler).cast::<()>() as usize,
            Self::Overall(handler) => Arc::as_ptr(handler).cast::<()>() as usize,
        };
        HandlerKey(address)
    }

    #[must_use]
    pub fn is_overall(&self) -> bool {
        matches!(self, Self::Overall(_))
    }
}

impl fmt::Debug for StageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_overall() { "overall" } else { "series" };
        write!(f, "StageHandler({kind}: {})", self.info().name)
    }
}

#[derive(Debug, Clone)]
struct RegisteredHandler {
    priority: i32,
    handler: StageHandler,
}

/// Data processors and visual handlers, each kept stably sorted by
/// ascending priority.
#[derive(Debug, Clone, Default)]
pub struct StageHandlerRegistry {
    processors: Vec<RegisteredHandler>,
    visuals: Vec<RegisteredHandler>,
}

impl StageHandlerRegistry {
    pub fn register_processor(
        &mut self,
        priority: Option<i32>,
        handler: StageHandler,
    ) -> ChartResult<()> {
        let priority = priority.unwrap_or(PRIORITY_PROCESSOR_DEFAULT);
        insert_sorted(&mut self.processors, priority, handler);
        Ok(())
    }

    pub fn register_visual(
        &mut self,
        priority: Option<i32>,
        handler: StageHandler,
    ) -> ChartResult<()> {
        let priority = priority.unwrap_or(PRIORITY_VISUAL_CHART);
        insert_sorted(&mut self.visuals, priority, handler);
        Ok(())
    }

    /// Layout handlers share the visual list; they must declare
    /// [`VisualKind::Layout`].
    pub fn register_layout(
        &mut self,
        priority: Option<i32>,
        handler: StageHandler,
    ) -> ChartResult<()> {
        if handler.info().visual_kind != VisualKind::Layout {
            return Err(ChartError::stage_handler(
                handler.info().name.clone(),
                "layout handlers must declare the layout visual kind",
            ));
        }
        let priority = priority.unwrap_or(PRIORITY_VISUAL_LAYOUT);
        insert_sorted(&mut self.visuals, priority, handler);
        Ok(())
    }

    pub fn processors(&self) -> impl Iterator<Item = &StageHandler> {
        self.processors.iter().map(|entry| &entry.handler)
    }

    pub fn visuals(&self) -> impl Iterator<Item = &StageHandler> {
        self.visuals.iter().map(|entry| &entry.handler)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.processors.len() + self.visuals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Any `i32` is a valid priority; negative ones sort ahead of the built-in
/// levels.
fn insert_sorted(list: &mut Vec<RegisteredHandler>, priority: i32, handler: StageHandler) {
    let key = handler.key();
    if list.iter().any(|entry| entry.handler.key() == key) {
        debug!(handler = %handler.info().name, "stage handler already registered");
        return;
    }
    // After every entry of equal priority: registration order is kept.
    let position = list.partition_point(|entry| entry.priority <= priority);
    list.insert(position, RegisteredHandler { priority, handler });
}

#[cfg(test)]
mod tests {
    use super::{
        PRIORITY_VISUAL_CHART, StageContext, StageHandler, StageHandlerInfo,
        StageHandlerRegistry, StageReset, SeriesStageHandler,
    };
    use crate::error::ChartResult;
    use crate::model::{GlobalModel, SeriesModel};

    struct Named(StageHandlerInfo);

    impl SeriesStageHandler for Named {
        fn info(&self) -> &StageHandlerInfo {
            &self.0
        }

        fn reset(
            &self,
            _series: &SeriesModel,
            _model: &GlobalModel,
            _ctx: &StageContext<'_>,
        ) -> ChartResult<StageReset> {
            Ok(StageReset::none())
        }
    }

    fn handler(name: &str) -> StageHandler {
        StageHandler::series(Named(StageHandlerInfo::new(name)))
    }

    #[test]
    fn visuals_sort_stably_by_priority() {
        let mut registry = StageHandlerRegistry::default();
        registry.register_visual(Some(4000), handler("late")).expect("late");
        registry.register_visual(None, handler("a")).expect("a");
        registry.register_visual(Some(PRIORITY_VISUAL_CHART), handler("b")).expect("b");
        registry.register_visual(Some(100), handler("early")).expect("early");

        let names: Vec<&str> = registry
            .visuals()
            .map(|handler| handler.info().name.as_str())
            .collect();
        assert_eq!(names, ["early", "a", "b", "late"]);
    }

    #[test]
    fn duplicate_handler_is_ignored() {
        let mut registry = StageHandlerRegistry::default();
        let shared = handler("shared");
        registry.register_processor(None, shared.clone()).expect("first");
        registry.register_processor(Some(10), shared).expect("duplicate");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn negative_priority_sorts_ahead_of_the_defaults() {
        let mut registry = StageHandlerRegistry::default();
        registry.register_visual(None, handler("default")).expect("default");
        registry.register_visual(Some(-500), handler("negative")).expect("negative");
        registry.register_visual(Some(0), handler("zero")).expect("zero");

        let names: Vec<&str> = registry
            .visuals()
            .map(|handler| handler.info().name.as_str())
            .collect();
        assert_eq!(names, ["negative", "zero", "default"]);

        registry
            .register_processor(Some(i32::MIN), handler("first"))
            .expect("min priority");
        registry.register_processor(None, handler("second")).expect("default");
        let names: Vec<&str> = registry
            .processors()
            .map(|handler| handler.info().name.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);
    }

    #[test]
    fn layout_registration_requires_layout_kind() {
        let mut registry = StageHandlerRegistry::default();
        assert!(registry.register_layout(None, handler("visual")).is_err());
        let layout = StageHandler::series(Named(StageHandlerInfo::new("layout").layout()));
        registry.register_layout(None, layout).expect("layout");
        assert_eq!(registry.visuals().count(), 1);
    }
}
