use crate::model::{ModelUid, SeriesModel};

use super::task::{Task, TaskKey};

/// Ordered task chain of one series: data task, processors, visuals, render.
#[derive(Debug)]
pub struct Pipeline {
    series_uid: ModelUid,
    pub(crate) tasks: Vec<Task>,
    block_index: Option<usize>,
    step: usize,
    threshold: usize,
    series_progressive: bool,
    progressive_enabled: bool,
    progressive_render: bool,
    modified_by_outside: bool,
}

impl Pipeline {
    pub(crate) fn new(series: &SeriesModel, default_step: usize, default_threshold: usize) -> Self {
        let mut pipeline = Self {
            series_uid: series.uid(),
            tasks: Vec::new(),
            block_index: None,
            step: default_step,
            threshold: default_threshold,
            series_progressive: true,
            progressive_enabled: false,
            progressive_render: false,
            modified_by_outside: false,
        };
        pipeline.refresh_settings(series, default_step, default_threshold);
        pipeline
    }

    /// Re-reads `progressive` / `progressiveThreshold` from the series.
    pub(crate) fn refresh_settings(
        &mut self,
        series: &SeriesModel,
        default_step: usize,
        default_threshold: usize,
    ) {
        let progressive = series.progressive().unwrap_or(default_step);
        self.series_progressive = progressive > 0;
        self.step = if progressive > 0 { progressive } else { default_step };
        self.threshold = series.progressive_threshold().unwrap_or(default_threshold);
    }

    #[must_use]
    pub fn series_uid(&self) -> ModelUid {
        self.series_uid
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    #[must_use]
    pub fn task(&self, key: TaskKey) -> Option<&Task> {
        self.tasks.iter().find(|task| task.key() == key)
    }

    pub(crate) fn position(&self, key: TaskKey) -> Option<usize> {
        self.tasks.iter().position(|task| task.key() == key)
    }

    #[must_use]
    pub fn block_index(&self) -> Option<usize> {
        self.block_index
    }

    #[must_use]
    pub fn step(&self) -> usize {
        self.step
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn progressive_enabled(&self) -> bool {
        self.progressive_enabled
    }

    #[must_use]
    pub fn progressive_render(&self) -> bool {
        self.progressive_render
    }

    /// Set when a payload restore has invalidated this pipeline's progress.
    #[must_use]
    pub fn modified_by_outside(&self) -> bool {
        self.modified_by_outside
    }

    pub(crate) fn set_modified_by_outside(&mut self, modified: bool) {
        self.modified_by_outside = modified;
    }

    pub(crate) fn set_view_block(&mut self, blocks: bool) {
        if let Some(render) = self.tasks.last_mut() {
            render.block = blocks;
        }
        self.progressive_enabled = self.series_progressive && !blocks;
    }

    /// Last blocking task; only tasks after it may be chunked.
    pub(crate) fn plan(&mut self, data_count: usize) {
        self.block_index = self.tasks.iter().rposition(|task| task.block);
        self.progressive_render = self.progressive_enabled && data_count >= self.threshold;
    }

    /// Returns `true` when the render mode flipped.
    pub(crate) fn set_progressive_render(&mut self, progressive_render: bool) -> bool {
        let changed = self.progressive_render != progressive_render;
        self.progressive_render = progressive_render;
        changed
    }

    /// Chunk size for the task at `index`, `None` to run to the end.
    pub(crate) fn step_for(&self, index: usize, block: bool) -> Option<usize> {
        let incremental = !block
            && self.progressive_enabled
            && self.progressive_render
            && self.block_index.is_none_or(|block_index| index > block_index);
        incremental.then_some(self.step)
    }

    pub(crate) fn upstream_due_end(&self, index: usize) -> Option<usize> {
        index
            .checked_sub(1)
            .and_then(|upstream| self.tasks.get(upstream))
            .map(Task::output_due_end)
    }

    pub(crate) fn dirty_downstream(&mut self, index: usize) {
        if let Some(next) = self.tasks.get_mut(index + 1) {
            next.dirty();
        }
    }

    pub(crate) fn render_task_mut(&mut self) -> Option<&mut Task> {
        self.tasks
            .last_mut()
            .filter(|task| task.key() == TaskKey::Render)
    }

    #[must_use]
    pub fn unfinished(&self) -> bool {
        self.tasks.iter().any(Task::unfinished)
    }
}
