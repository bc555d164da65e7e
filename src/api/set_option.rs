use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, error, trace, warn};

use crate::core::Viewport;
use crate::error::{ChartError, ChartResult};
use crate::extensions::PluginEvent;
use crate::model::{DataRow, GlobalModel, MergeOpts, Payload};
use crate::render::Renderer;

use super::chart_runtime::PendingUpdate;
use super::{ChartEngine, FrameBudget, ProcessState};

/// Options of one [`ChartEngine::set_option`] call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetOptionOpts {
    /// Drop the current model tree instead of merging into it.
    pub not_merge: bool,
    /// Defer the update to the next [`ChartEngine::on_frame`].
    pub lazy_update: bool,
    /// Suppress the `updated` event.
    pub silent: bool,
    /// Main types merged in replace mode.
    pub replace_merge: Vec<String>,
    /// Transition hints handed to views through the update payload.
    pub transition: Option<Value>,
}

impl SetOptionOpts {
    #[must_use]
    pub fn not_merge() -> Self {
        Self {
            not_merge: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_lazy_update(mut self, lazy_update: bool) -> Self {
        self.lazy_update = lazy_update;
        self
    }

    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    #[must_use]
    pub fn with_replace_merge(mut self, main_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.replace_merge = main_types.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_transition(mut self, transition: Value) -> Self {
        self.transition = Some(transition);
        self
    }
}

/// Options of one [`ChartEngine::resize`] call; missing sizes keep the
/// current viewport's.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResizeOpts {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// `None` inherits the silent flag of a pending lazy update.
    pub silent: Option<bool>,
    /// Animation config merged over `{ "duration": 0 }` and handed to views
    /// through the `resize` update payload.
    pub animation: Option<Map<String, Value>>,
}

impl ResizeOpts {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = Some(silent);
        self
    }

    #[must_use]
    pub fn with_animation(mut self, animation: Map<String, Value>) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Resize animations are off unless the caller overrides `duration`.
    fn animation_config(&self) -> Value {
        let mut animation = Map::new();
        animation.insert("duration".to_owned(), Value::from(0));
        if let Some(overrides) = &self.animation {
            animation.extend(overrides.clone());
        }
        Value::Object(animation)
    }
}

impl<R: Renderer> ChartEngine<R> {
    /// Returns `true` when a mutating entry point must be skipped.
    fn reject_entry(&self, operation: &'static str) -> bool {
        if self.core.api.is_disposed() {
            warn!(operation, "call on a disposed chart ignored");
            return true;
        }
        if self.core.api.process_state() == ProcessState::InMainProcess {
            error!(operation, "call during main process ignored");
            return true;
        }
        false
    }

    /// Merges `option` into the model tree and runs a full update, or stores
    /// a lazy update for the next frame.
    pub fn set_option(&mut self, option: Value, opts: SetOptionOpts) -> ChartResult<()> {
        if self.reject_entry("set_option") {
            return Ok(());
        }
        let mut option = option;
        self.core.registry.preprocess(&mut option);

        if opts.not_merge || self.core.model.is_none() {
            self.core.model = Some(GlobalModel::new());
        }
        let merge_opts = MergeOpts {
            replace_merge: opts.replace_merge.clone(),
        };
        let payload = opts
            .transition
            .clone()
            .map(|transition| Payload::new("setOption").with("transition", transition));
        let lazy = opts.lazy_update;

        self.core.api.enter_main_process();
        let result = self.core.with_model(|core, model| {
            model.set_option(&option, &merge_opts, core.registry.model_types())?;
            if lazy {
                return Ok(());
            }
            core.prepare_and_update(model, payload.as_ref())
        });
        if let Err(error) = result {
            self.core.api.leave_main_process();
            self.core.runtime.pending_update = None;
            return Err(error);
        }

        let series_count = self.core.model.as_ref().map_or(0, |model| model.series().len());
        self.emit_plugin_event(PluginEvent::OptionUpdated { series_count });

        if lazy {
            self.core.runtime.pending_update = Some(PendingUpdate { silent: opts.silent });
            self.core.api.leave_main_process();
            debug!(series_count, "lazy update stored");
            return Ok(());
        }

        self.core.runtime.pending_update = None;
        let painted = self.flush();
        self.core.api.leave_main_process();
        painted?;
        debug!(series_count, not_merge = opts.not_merge, "option set");

        self.flush_pending_actions(opts.silent)?;
        self.trigger_updated_event(opts.silent);
        Ok(())
    }

    /// Drops every component and series.
    pub fn clear(&mut self) -> ChartResult<()> {
        if self.core.model.is_none() {
            return Ok(());
        }
        self.set_option(json!({ "series": [] }), SetOptionOpts::not_merge())
    }

    /// Changes the viewport and runs a full update (promoting a pending lazy
    /// update to a prepare + update).
    pub fn resize(&mut self, opts: ResizeOpts) -> ChartResult<()> {
        if self.reject_entry("resize") {
            return Ok(());
        }
        let current = self.core.config.viewport;
        let viewport = Viewport::new(
            opts.width.unwrap_or(current.width),
            opts.height.unwrap_or(current.height),
        );
        if !viewport.is_valid() {
            return Err(ChartError::InvalidViewport {
                width: viewport.width,
                height: viewport.height,
            });
        }
        self.core.config.viewport = viewport;
        self.core.api.set_viewport(viewport);
        self.core.resize_loading();
        if self.core.model.is_none() {
            return Ok(());
        }

        let pending = self.core.runtime.pending_update.take();
        let silent = opts
            .silent
            .or(pending.map(|pending| pending.silent))
            .unwrap_or(false);
        let payload = Payload::new("resize").with("animation", opts.animation_config());

        self.core.api.enter_main_process();
        let result = self.core.with_model(|core, model| {
            if pending.is_some() {
                core.prepare(model)?;
            }
            core.update(model, Some(&payload))
        });
        self.core.api.leave_main_process();
        result?;

        debug!(width = viewport.width, height = viewport.height, "chart resized");
        self.emit_plugin_event(PluginEvent::Resized {
            width: viewport.width,
            height: viewport.height,
        });
        self.flush_pending_actions(silent)?;
        self.trigger_updated_event(silent);
        Ok(())
    }

    /// Host frame tick.
    ///
    /// Applies changed element states, then runs a pending lazy update or
    /// advances progressive work while the frame budget allows, and paints
    /// when the scene changed.
    pub fn on_frame(&mut self) -> ChartResult<()> {
        if self.core.api.is_disposed() {
            return Ok(());
        }
        self.core.apply_changed_states();

        if let Some(pending) = self.core.runtime.pending_update.take() {
            self.core.api.enter_main_process();
            let result = self
                .core
                .with_model(|core, model| core.prepare_and_update(model, None));
            self.core.api.leave_main_process();
            result?;

            self.flush()?;
            self.flush_pending_actions(pending.silent)?;
            self.trigger_updated_event(pending.silent);
        } else if self.core.scheduler.unfinished {
            let budget = self.core.config.frame_budget;
            let started = Instant::now();
            let mut rounds = 0_u32;
            // Actions dispatched by handlers mid-chunk are queued until the
            // loop leaves the main process.
            self.core.api.enter_main_process();
            let result = loop {
                self.core.scheduler.unfinished = false;
                if let Err(error) = self.core.with_model(|core, model| core.progress_round(model)) {
                    break Err(error);
                }
                rounds += 1;

                let budget_left = match budget {
                    FrameBudget::Rounds(limit) => rounds < limit,
                    FrameBudget::Time(limit) => started.elapsed() < limit,
                };
                if !budget_left || !self.core.scheduler.unfinished {
                    break Ok(());
                }
            };
            self.core.api.leave_main_process();
            result?;
            trace!(
                rounds,
                unfinished = self.core.scheduler.unfinished,
                elapsed_us = started.elapsed().as_micros(),
                "progressive frame"
            );
            self.emit_plugin_event(PluginEvent::ProgressiveFrame { rounds });
            self.flush_pending_actions(false)?;
        }

        if self.core.runtime.needs_paint {
            self.flush()?;
        }
        Ok(())
    }

    /// Appends rows to the series at `series_index`; the new rows render
    /// progressively on the following frames. Axis extents are left as they
    /// are.
    pub fn append_data(&mut self, series_index: usize, rows: Vec<DataRow>) -> ChartResult<()> {
        if self.core.api.is_disposed() {
            warn!(series_index, "append_data on a disposed chart ignored");
            return Ok(());
        }
        let Some(model) = self.core.model.as_mut() else {
            warn!(series_index, "append_data before set_option ignored");
            return Ok(());
        };
        let Some(position) = model
            .series()
            .iter()
            .position(|series| series.series_index() == series_index)
        else {
            return Err(ChartError::InvalidData(format!(
                "series index {series_index} does not exist"
            )));
        };

        let row_count = rows.len();
        let series = &mut model.series_mut()[position];
        series.data_mut().append_rows(rows);
        self.core.scheduler.unfinished = true;
        debug!(
            series_id = series.id(),
            row_count,
            raw_count = series.data().raw_count(),
            "data appended"
        );
        Ok(())
    }

    /// Disposes every view and drops the model. Later calls are no-ops.
    pub fn dispose(&mut self) {
        if self.core.api.is_disposed() {
            warn!("chart already disposed");
            return;
        }
        self.core.api.mark_disposed();
        self.core.views.dispose_all(&mut self.core.scene);
        self.core.scene.clear();
        self.core.runtime.loading = None;
        self.core.coordinate_systems.clear();
        self.core.model = None;
        self.core.runtime.pending_update = None;
        self.core.scheduler = Self::fresh_scheduler(&self.core.config, &self.core.registry);
        self.emit_plugin_event(PluginEvent::Disposed);
        self.core.runtime.listeners.clear();
        debug!("chart disposed");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ResizeOpts, SetOptionOpts};

    #[test]
    fn set_option_opts_parse_camel_case() {
        let opts: SetOptionOpts = serde_json::from_str(
            r#"{"notMerge":true,"replaceMerge":["series"],"lazyUpdate":true}"#,
        )
        .expect("parse opts");
        assert!(opts.not_merge);
        assert!(opts.lazy_update);
        assert!(!opts.silent);
        assert_eq!(opts.replace_merge, vec!["series".to_owned()]);
    }

    #[test]
    fn resize_opts_keep_missing_sizes_unset() {
        let opts: ResizeOpts = serde_json::from_str(r#"{"width":300}"#).expect("parse opts");
        assert_eq!(opts.width, Some(300));
        assert_eq!(opts.height, None);
        assert_eq!(opts.silent, None);
        assert_eq!(ResizeOpts::new(10, 20).with_silent(true).silent, Some(true));
    }

    #[test]
    fn resize_animation_defaults_to_zero_duration() {
        assert_eq!(
            ResizeOpts::new(10, 20).animation_config(),
            json!({ "duration": 0 })
        );

        let opts: ResizeOpts =
            serde_json::from_str(r#"{"animation":{"duration":300,"easing":"cubicOut"}}"#)
                .expect("parse opts");
        assert_eq!(
            opts.animation_config(),
            json!({ "duration": 300, "easing": "cubicOut" })
        );
    }
}
