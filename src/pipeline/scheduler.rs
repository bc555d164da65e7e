use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::ChartResult;
use crate::model::{GlobalModel, ModelUid, Payload, RenderMethod, SeriesModel};
use crate::view::{View, ViewContext, ViewModel};

use super::pipeline::Pipeline;
use super::stage_handler::{
    HandlerKey, OverallPlan, StageContext, StageHandler, StageHandlerRegistry, StageReset,
    VisualKind,
};
use super::task::{Task, TaskKey, TaskProgress, TaskStage};

/// Options of one visual pass.
#[derive(Debug, Clone, Default)]
pub struct VisualTaskOpts {
    /// Dirty the visual tasks before performing them.
    pub set_dirty: bool,
    /// Restricts `set_dirty` to these series.
    pub dirty_map: Option<HashSet<ModelUid>>,
    /// Runs only handlers of this kind.
    pub visual_kind: Option<VisualKind>,
}

impl VisualTaskOpts {
    #[must_use]
    pub fn set_dirty() -> Self {
        Self {
            set_dirty: true,
            ..Self::default()
        }
    }

    fn dirties(&self, series_uid: ModelUid) -> bool {
        self.set_dirty
            && self
                .dirty_map
                .as_ref()
                .is_none_or(|map| map.contains(&series_uid))
    }
}

#[derive(Debug, Default)]
struct OverallRecord {
    dirty: bool,
}

#[derive(Clone, Copy)]
struct PerformArgs {
    step: Option<usize>,
    skip: bool,
}

/// Builds and runs the per-series pipelines.
///
/// Holds the sorted handler lists captured at engine construction; the model
/// is passed into every call and only series data is mutated.
#[derive(Debug)]
pub struct Scheduler {
    handlers: StageHandlerRegistry,
    pipelines: IndexMap<ModelUid, Pipeline>,
    overall: HashMap<HandlerKey, OverallRecord>,
    default_step: usize,
    default_threshold: usize,
    /// Some task still has chunks left after the last perform.
    pub unfinished: bool,
}

impl Scheduler {
    #[must_use]
    pub fn new(handlers: StageHandlerRegistry, default_step: usize, default_threshold: usize) -> Self {
        let overall = handlers
            .processors()
            .chain(handlers.visuals())
            .filter(|handler| handler.is_overall())
            .map(|handler| (handler.key(), OverallRecord::default()))
            .collect();
        Self {
            handlers,
            pipelines: IndexMap::new(),
            overall,
            default_step,
            default_threshold,
            unfinished: false,
        }
    }

    #[must_use]
    pub fn pipeline(&self, series_uid: ModelUid) -> Option<&Pipeline> {
        self.pipelines.get(&series_uid)
    }

    #[must_use]
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// One pipeline per series; pipelines of removed series are dropped.
    pub fn restore_pipelines(&mut self, model: &GlobalModel) {
        let live: HashSet<ModelUid> = model.series().iter().map(SeriesModel::uid).collect();
        self.pipelines.retain(|uid, _| live.contains(uid));

        for series in model.series() {
            match self.pipelines.get_mut(&series.uid()) {
                Some(pipeline) => {
                    pipeline.refresh_settings(series, self.default_step, self.default_threshold);
                }
                None => {
                    let pipeline =
                        Pipeline::new(series, self.default_step, self.default_threshold);
                    self.pipelines.insert(series.uid(), pipeline);
                }
            }
        }
    }

    /// Rebuilds each pipeline's task list from the registry, reusing tasks
    /// (and their cursors) whose handler still applies.
    pub fn prepare_stage_tasks(&mut self, model: &GlobalModel) {
        for series in model.series() {
            let Some(pipeline) = self.pipelines.get_mut(&series.uid()) else {
                continue;
            };

            let mut wanted: Vec<(TaskKey, TaskStage)> =
                vec![(TaskKey::SeriesData, TaskStage::SeriesData)];
            for handler in self.handlers.processors() {
                if handler.info().applies_to(series) {
                    wanted.push((
                        TaskKey::Stage(handler.key()),
                        TaskStage::Processor(handler.clone()),
                    ));
                }
            }
            for handler in self.handlers.visuals() {
                if handler.info().applies_to(series) {
                    wanted.push((
                        TaskKey::Stage(handler.key()),
                        TaskStage::Visual(handler.clone()),
                    ));
                }
            }
            wanted.push((TaskKey::Render, TaskStage::Render));

            let unchanged = pipeline.tasks.len() == wanted.len()
                && pipeline
                    .tasks
                    .iter()
                    .zip(&wanted)
                    .all(|(task, (key, _))| task.key() == *key);
            if unchanged {
                continue;
            }

            let mut previous: HashMap<TaskKey, Task> = pipeline
                .tasks
                .drain(..)
                .map(|task| (task.key(), task))
                .collect();
            for (key, stage) in wanted {
                let mut task = previous
                    .remove(&key)
                    .unwrap_or_else(|| Task::new(key, stage.clone()));
                if let TaskStage::Processor(handler) | TaskStage::Visual(handler) = &stage {
                    task.block = handler.info().blocks_progressive;
                    if handler.is_overall() {
                        if let Some(record) = self.overall.get_mut(&handler.key()) {
                            record.dirty = true;
                        }
                    }
                }
                task.stage = stage;
                task.dirty();
                pipeline.tasks.push(task);
            }
            trace!(
                series_uid = series.uid().get(),
                task_count = pipeline.tasks.len(),
                "pipeline tasks rebuilt"
            );
        }
    }

    /// Binds the render task; a view without incremental rendering blocks
    /// progressive processing of its series.
    pub fn prepare_view(&mut self, series_uid: ModelUid, supports_incremental: bool) {
        if let Some(pipeline) = self.pipelines.get_mut(&series_uid) {
            pipeline.set_view_block(!supports_incremental);
        }
    }

    pub fn plan(&mut self, model: &GlobalModel) {
        for series in model.series() {
            if let Some(pipeline) = self.pipelines.get_mut(&series.uid()) {
                pipeline.plan(series.data().raw_count());
            }
        }
    }

    /// Restores targeted series and dirties their data tasks and every
    /// overall handler.
    pub fn restore_data(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) {
        for uid in model.restore_data(payload) {
            if let Some(pipeline) = self.pipelines.get_mut(&uid) {
                if let Some(head) = pipeline.tasks.first_mut() {
                    head.dirty();
                }
                pipeline.set_modified_by_outside(payload.is_some());
            }
        }
        for record in self.overall.values_mut() {
            record.dirty = true;
        }
    }

    /// Runs the data task of each visible series: restore on reset, then
    /// expose rows appended since.
    pub fn perform_series_tasks(&mut self, model: &mut GlobalModel) -> ChartResult<()> {
        let mut unfinished = false;
        for position in 0..model.series().len() {
            let uid = model.series()[position].uid();
            if model.is_series_filtered(uid) {
                continue;
            }
            let Some(pipeline) = self.pipelines.get_mut(&uid) else {
                continue;
            };
            let Some(head) = pipeline.tasks.first_mut() else {
                continue;
            };

            let data = model.series_mut()[position].data_mut();
            let reset = head.begin();
            if reset {
                data.restore();
                head.set_progress(TaskProgress::DataSync, false);
            }
            if let Some(range) = head.next_slice(data.raw_count(), None, false) {
                data.sync_from_raw(range.end);
            }
            unfinished |= head.unfinished();
            if reset {
                pipeline.dirty_downstream(0);
                pipeline.set_modified_by_outside(false);
            }
        }
        self.unfinished |= unfinished;
        Ok(())
    }

    /// Data processors always run to completion.
    pub fn perform_data_processor_tasks(
        &mut self,
        model: &mut GlobalModel,
        ctx: &StageContext<'_>,
    ) -> ChartResult<()> {
        let handlers: Vec<StageHandler> = self.handlers.processors().cloned().collect();
        self.perform_stage_tasks(&handlers, model, ctx, &VisualTaskOpts::default(), true)
    }

    pub fn perform_visual_tasks(
        &mut self,
        model: &mut GlobalModel,
        ctx: &StageContext<'_>,
        opts: &VisualTaskOpts,
    ) -> ChartResult<()> {
        let handlers: Vec<StageHandler> = self.handlers.visuals().cloned().collect();
        self.perform_stage_tasks(&handlers, model, ctx, opts, false)
    }

    fn perform_stage_tasks(
        &mut self,
        handlers: &[StageHandler],
        model: &mut GlobalModel,
        ctx: &StageContext<'_>,
        opts: &VisualTaskOpts,
        block: bool,
    ) -> ChartResult<()> {
        let mut unfinished = false;
        for handler in handlers {
            let info = handler.info();
            if opts
                .visual_kind
                .is_some_and(|kind| kind != info.visual_kind)
            {
                continue;
            }
            let key = TaskKey::Stage(handler.key());
            let targets: Vec<ModelUid> = model
                .series()
                .iter()
                .map(SeriesModel::uid)
                .filter(|uid| {
                    self.pipelines
                        .get(uid)
                        .is_some_and(|pipeline| pipeline.position(key).is_some())
                })
                .collect();

            for uid in &targets {
                if opts.dirties(*uid) {
                    if let Some(task) = self.task_mut(*uid, key) {
                        task.dirty();
                    }
                }
            }

            let mut plan: Option<OverallPlan> = None;
            if let StageHandler::Overall(overall) = handler {
                let record_dirty = self
                    .overall
                    .get(&handler.key())
                    .is_some_and(|record| record.dirty);
                let stub_dirty = targets
                    .iter()
                    .any(|uid| self.task_mut(*uid, key).is_some_and(|task| task.is_dirty()));
                if record_dirty || stub_dirty {
                    plan = Some(overall.overall_reset(model, ctx)?);
                    for uid in &targets {
                        if let Some(task) = self.task_mut(*uid, key) {
                            task.dirty();
                        }
                    }
                    if let Some(record) = self.overall.get_mut(&handler.key()) {
                        record.dirty = false;
                    }
                    debug!(handler = %info.name, series_count = targets.len(), "overall stage reset");
                }
            }

            for uid in targets {
                let skip = !info.perform_raw_series && model.is_series_filtered(uid);
                let series_plan = plan
                    .as_mut()
                    .map(|plan| plan.shift_remove(&uid).unwrap_or_default());
                unfinished |= self.perform_stage_task(
                    uid,
                    key,
                    handler,
                    model,
                    ctx,
                    block,
                    skip,
                    series_plan,
                )?;
            }
        }
        self.unfinished |= unfinished;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn perform_stage_task(
        &mut self,
        uid: ModelUid,
        key: TaskKey,
        handler: &StageHandler,
        model: &mut GlobalModel,
        ctx: &StageContext<'_>,
        block: bool,
        skip: bool,
        overall_reset: Option<StageReset>,
    ) -> ChartResult<bool> {
        let Some(position) = model.series_position(uid) else {
            return Ok(false);
        };
        let Some(pipeline) = self.pipelines.get_mut(&uid) else {
            return Ok(false);
        };
        let Some(index) = pipeline.position(key) else {
            return Ok(false);
        };
        let upstream_end = pipeline.upstream_due_end(index).unwrap_or(0);
        let task_block = pipeline.tasks[index].block;
        let args = PerformArgs {
            step: pipeline.step_for(index, block || task_block),
            skip,
        };

        let task = &mut pipeline.tasks[index];
        let reset = task.begin();
        if reset && !args.skip {
            let stage_reset = match (handler, overall_reset) {
                (StageHandler::Series(series_handler), _) => {
                    series_handler.reset(&model.series()[position], model, ctx)?
                }
                (StageHandler::Overall(_), Some(stage_reset)) => stage_reset,
                (StageHandler::Overall(_), None) => StageReset::none(),
            };
            if stage_reset.filter_out {
                model.filter_out_series(uid);
            }
            if let Some(patch) = &stage_reset.patch {
                model.series_mut()[position].data_mut().apply_patch(patch);
            }
            let progress = stage_reset
                .progress
                .map_or(TaskProgress::None, TaskProgress::Stage);
            task.set_progress(progress, false);
        }

        let data = model.series_mut()[position].data_mut();
        let due_end = upstream_end.min(data.count());
        if let Some(range) = task.next_slice(due_end, args.step, args.skip) {
            if let TaskProgress::Stage(progress) = &mut task.progress {
                progress.progress(range, data)?;
            }
        }
        let unfinished = task.unfinished();
        if reset {
            pipeline.dirty_downstream(index);
        }
        Ok(unfinished)
    }

    fn task_mut(&mut self, uid: ModelUid, key: TaskKey) -> Option<&mut Task> {
        let pipeline = self.pipelines.get_mut(&uid)?;
        let index = pipeline.position(key)?;
        pipeline.tasks.get_mut(index)
    }

    /// Re-decides progressive rendering with the post-processing item count.
    pub fn update_stream_modes(
        &mut self,
        series: &SeriesModel,
        supports_incremental: bool,
    ) {
        let Some(pipeline) = self.pipelines.get_mut(&series.uid()) else {
            return;
        };
        let progressive_render = pipeline.progressive_enabled()
            && supports_incremental
            && series.data().count() >= pipeline.threshold();
        if pipeline.set_progressive_render(progressive_render) {
            debug!(
                series_uid = series.uid().get(),
                progressive_render, "series render mode changed"
            );
            if let Some(render) = pipeline.render_task_mut() {
                render.dirty();
            }
        }
    }

    /// Dirties the render task of a series (new view, dirty map).
    pub fn dirty_render_task(&mut self, series_uid: ModelUid) {
        if let Some(render) = self
            .pipelines
            .get_mut(&series_uid)
            .and_then(Pipeline::render_task_mut)
        {
            render.dirty();
        }
    }

    /// Runs the tail task of one series against its view: a full `render`,
    /// the payload's narrower update method, or incremental chunks.
    pub fn perform_render_task(
        &mut self,
        series: &SeriesModel,
        view: &mut dyn View,
        ctx: &ViewContext<'_>,
    ) -> ChartResult<()> {
        let Some(pipeline) = self.pipelines.get_mut(&series.uid()) else {
            return Ok(());
        };
        let Some(index) = pipeline.position(TaskKey::Render) else {
            return Ok(());
        };
        let upstream_end = pipeline.upstream_due_end(index).unwrap_or(0);
        let step = pipeline.step_for(index, false);
        let progressive_render = pipeline.progressive_render();
        let task = &mut pipeline.tasks[index];

        if task.begin() {
            if progressive_render {
                view.incremental_prepare_render(series, ctx)?;
                task.set_progress(TaskProgress::IncrementalRender, false);
            } else {
                let capabilities = view.capabilities();
                let method = ctx
                    .payload
                    .and_then(Payload::render_method)
                    .filter(|method| capabilities.supports_render_method(*method));
                match method {
                    Some(RenderMethod::UpdateView) => {
                        view.update_view(ViewModel::Series(series), ctx)?;
                    }
                    Some(RenderMethod::UpdateVisual) => {
                        view.update_visual(ViewModel::Series(series), ctx)?;
                    }
                    Some(RenderMethod::UpdateLayout) => {
                        view.update_layout(ViewModel::Series(series), ctx)?;
                    }
                    Some(RenderMethod::UpdateTransform) => {
                        view.update_transform(ViewModel::Series(series), ctx)?;
                    }
                    Some(RenderMethod::Render) | None => {
                        task.set_progress(TaskProgress::FullRender, true);
                    }
                }
            }
        }

        let due_end = upstream_end.min(series.data().count());
        if let Some(range) = task.next_slice(due_end, step, false) {
            match task.progress {
                TaskProgress::FullRender => view.render(ViewModel::Series(series), ctx)?,
                TaskProgress::IncrementalRender => view.incremental_render(range, series, ctx)?,
                _ => {}
            }
        }
        self.unfinished |= task.unfinished();
        Ok(())
    }
}
