use std::fmt;
use std::ops::Range;

use super::stage_handler::{HandlerKey, SeriesProgress, StageHandler};

/// Stable identity of a task inside its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    SeriesData,
    Stage(HandlerKey),
    Render,
}

/// What a task does per chunk once reset.
#[derive(Default)]
pub(crate) enum TaskProgress {
    #[default]
    None,
    /// Expose raw rows up to the chunk end.
    DataSync,
    Stage(Box<dyn SeriesProgress>),
    /// Full `render` once per reset.
    FullRender,
    IncrementalRender,
}

impl TaskProgress {
    fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Debug for TaskProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::DataSync => "DataSync",
            Self::Stage(_) => "Stage",
            Self::FullRender => "FullRender",
            Self::IncrementalRender => "IncrementalRender",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum TaskStage {
    SeriesData,
    Processor(StageHandler),
    Visual(StageHandler),
    Render,
}

/// One resumable unit of work for one series.
///
/// A dirty task is reset on its next perform: cursors go back to zero and the
/// stage decides what to run per chunk. Each perform then covers at most one
/// step of the range its upstream has produced.
#[derive(Debug)]
pub struct Task {
    key: TaskKey,
    pub(crate) stage: TaskStage,
    dirty: bool,
    pub(crate) block: bool,
    due_index: usize,
    due_end: usize,
    output_due_end: usize,
    force_first_progress: bool,
    pub(crate) progress: TaskProgress,
    perform_count: usize,
}

impl Task {
    pub(crate) fn new(key: TaskKey, stage: TaskStage) -> Self {
        Self {
            key,
            stage,
            dirty: true,
            block: false,
            due_index: 0,
            due_end: 0,
            output_due_end: 0,
            force_first_progress: false,
            progress: TaskProgress::None,
            perform_count: 0,
        }
    }

    #[must_use]
    pub fn key(&self) -> TaskKey {
        self.key
    }

    pub fn dirty(&mut self) {
        self.dirty = true;
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn due_index(&self) -> usize {
        self.due_index
    }

    #[must_use]
    pub fn output_due_end(&self) -> usize {
        self.output_due_end
    }

    /// How many chunks this task has processed since creation.
    #[must_use]
    pub fn perform_count(&self) -> usize {
        self.perform_count
    }

    #[must_use]
    pub fn unfinished(&self) -> bool {
        self.progress.is_some() && self.due_index < self.due_end
    }

    /// Consumes the dirty flag. Returns `true` when the caller must run the
    /// stage reset; cursors and progress are cleared in that case.
    pub(crate) fn begin(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.due_index = 0;
        self.due_end = 0;
        self.output_due_end = 0;
        self.force_first_progress = false;
        self.progress = TaskProgress::None;
        true
    }

    pub(crate) fn set_progress(&mut self, progress: TaskProgress, force_first: bool) {
        self.progress = progress;
        self.force_first_progress = force_first && self.progress.is_some();
    }

    /// Advances the cursor towards `due_end` by at most `step` and returns the
    /// chunk to process, if any. Skipped tasks advance without work.
    pub(crate) fn next_slice(
        &mut self,
        due_end: usize,
        step: Option<usize>,
        skip: bool,
    ) -> Option<Range<usize>> {
        self.due_end = due_end;
        if !self.progress.is_some() {
            self.due_index = due_end;
            self.output_due_end = due_end;
            return None;
        }

        let start = self.due_index;
        let end = step
            .map_or(due_end, |step| start.saturating_add(step.max(1)).min(due_end))
            .max(start);
        let force_first = std::mem::take(&mut self.force_first_progress);
        self.due_index = end;
        self.output_due_end = end;

        if !skip && (force_first || start < end) {
            self.perform_count += 1;
            Some(start..end)
        } else {
            None
        }
    }
}
