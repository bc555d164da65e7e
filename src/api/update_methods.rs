use std::collections::HashSet;

use tracing::{debug, trace};

use crate::error::ChartResult;
use crate::model::{GlobalModel, ModelUid, Payload, RenderMethod};
use crate::pipeline::{StageContext, VisualKind, VisualTaskOpts};
use crate::view::{TransformOutcome, ViewContext, ViewModel};

use super::action::UpdateMethod;
use super::engine_core::EngineCore;
use super::registry::LifecycleEvent;
use super::view_reconciler::ViewKind;

impl EngineCore {
    /// Pipelines, stage tasks and views brought in line with the model.
    pub(super) fn prepare(&mut self, model: &mut GlobalModel) -> ChartResult<()> {
        self.scheduler.restore_pipelines(model);
        self.scheduler.prepare_stage_tasks(model);
        self.prepare_views(model, ViewKind::Component)?;
        self.prepare_views(model, ViewKind::Chart)?;
        self.scheduler.plan(model);
        Ok(())
    }

    /// Full update: data, coordinate systems, processors, visuals, render.
    pub(super) fn update(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) -> ChartResult<()> {
        model.set_update_payload(payload.cloned());
        let viewport = self.config.viewport;

        // Every pipeline is performed below and reports its own progress.
        self.scheduler.unfinished = false;
        self.scheduler.restore_data(model, payload);
        self.scheduler.perform_series_tasks(model)?;

        self.coordinate_systems
            .create(self.registry.coordinate_system_creators(), model, viewport)?;

        let ctx = StageContext {
            payload,
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        self.scheduler.perform_data_processor_tasks(model, &ctx)?;

        self.update_stream_modes(model);
        self.coordinate_systems.update(model, viewport)?;

        model.clear_color_palette();
        let ctx = StageContext {
            payload,
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        self.scheduler
            .perform_visual_tasks(model, &ctx, &VisualTaskOpts::default())?;

        self.render(model, payload)?;
        self.registry
            .trigger_lifecycle(LifecycleEvent::AfterUpdate, model, &self.api);
        debug!(
            series_count = model.series().len(),
            coordinate_systems = self.coordinate_systems.len(),
            unfinished = self.scheduler.unfinished,
            "full update done"
        );
        Ok(())
    }

    pub(super) fn prepare_and_update(
        &mut self,
        model: &mut GlobalModel,
        payload: Option<&Payload>,
    ) -> ChartResult<()> {
        self.prepare(model)?;
        self.update(model, payload)
    }

    /// Transform-only update: no data processing, no new coordinate
    /// systems. Series whose view cannot absorb the change in place get their
    /// visuals and render redone.
    pub(super) fn update_transform(
        &mut self,
        model: &mut GlobalModel,
        payload: Option<&Payload>,
    ) -> ChartResult<()> {
        model.set_update_payload(payload.cloned());
        let viewport = self.config.viewport;

        let mut dirty_components = 0_usize;
        let mut dirty_map: HashSet<ModelUid> = HashSet::new();
        {
            let global: &GlobalModel = model;
            let ctx = ViewContext {
                global,
                api: &self.api,
                coordinate_systems: &self.coordinate_systems,
                payload,
                viewport,
            };
            for component in global.all_components() {
                let Some(entry) = self.views.component.view_of_mut(component.uid()) else {
                    continue;
                };
                if !entry.alive {
                    continue;
                }
                let outcome = entry
                    .view
                    .update_transform(ViewModel::Component(component), &ctx)?;
                if !matches!(outcome, Some(TransformOutcome { update: false })) {
                    dirty_components += 1;
                }
            }
            for series in global.each_series() {
                let Some(entry) = self.views.chart.view_of_mut(series.uid()) else {
                    continue;
                };
                let outcome = entry
                    .view
                    .update_transform(ViewModel::Series(series), &ctx)?;
                if !matches!(outcome, Some(TransformOutcome { update: false })) {
                    dirty_map.insert(series.uid());
                }
            }
        }
        trace!(
            dirty_components,
            dirty_series = dirty_map.len(),
            "transform update classified views"
        );

        model.clear_color_palette();
        let ctx = StageContext {
            payload,
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        let opts = VisualTaskOpts {
            set_dirty: true,
            dirty_map: Some(dirty_map.clone()),
            visual_kind: None,
        };
        self.scheduler.perform_visual_tasks(model, &ctx, &opts)?;

        self.render_series(model, payload, Some(&dirty_map))?;
        self.registry
            .trigger_lifecycle(LifecycleEvent::AfterUpdate, model, &self.api);
        Ok(())
    }

    /// View-only update: visuals redone, views re-rendered through
    /// `update_view` where they implement it.
    pub(super) fn update_view(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) -> ChartResult<()> {
        let marked = marked_payload(payload, "updateView", RenderMethod::UpdateView);
        model.set_update_payload(Some(marked.clone()));
        model.clear_color_palette();

        let ctx = StageContext {
            payload: Some(&marked),
            api: &self.api,
            viewport: self.config.viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        self.scheduler
            .perform_visual_tasks(model, &ctx, &VisualTaskOpts::set_dirty())?;

        self.render(model, Some(&marked))?;
        self.registry
            .trigger_lifecycle(LifecycleEvent::AfterUpdate, model, &self.api);
        Ok(())
    }

    /// Visual-only update: every series visual is recomputed by the
    /// `Visual` kind handlers, then pushed to the views.
    pub(super) fn update_visual(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) -> ChartResult<()> {
        let marked = marked_payload(payload, "updateVisual", RenderMethod::UpdateVisual);
        model.set_update_payload(Some(marked.clone()));
        for series in model.series_mut() {
            series.data_mut().clear_all_visual();
        }
        model.clear_color_palette();

        let viewport = self.config.viewport;
        let ctx = StageContext {
            payload: Some(&marked),
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        let opts = VisualTaskOpts {
            set_dirty: true,
            dirty_map: None,
            visual_kind: Some(VisualKind::Visual),
        };
        self.scheduler.perform_visual_tasks(model, &ctx, &opts)?;

        let global: &GlobalModel = model;
        let ctx = ViewContext {
            global,
            api: &self.api,
            coordinate_systems: &self.coordinate_systems,
            payload: Some(&marked),
            viewport,
        };
        for component in global.all_components() {
            if let Some(entry) = self.views.component.view_of_mut(component.uid()) {
                if entry.alive {
                    entry
                        .view
                        .update_visual(ViewModel::Component(component), &ctx)?;
                }
            }
        }
        for series in global.each_series() {
            if let Some(entry) = self.views.chart.view_of_mut(series.uid()) {
                entry.view.update_visual(ViewModel::Series(series), &ctx)?;
            }
        }
        self.runtime.needs_paint = true;
        self.registry
            .trigger_lifecycle(LifecycleEvent::AfterUpdate, global, &self.api);
        Ok(())
    }

    pub(super) fn update_layout(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) -> ChartResult<()> {
        self.update(model, payload)
    }

    /// Re-decides progressive rendering per series after data processing.
    pub(super) fn update_stream_modes(&mut self, model: &GlobalModel) {
        for series in model.each_series() {
            let incremental = self
                .views
                .chart
                .view_of(series.uid())
                .is_some_and(|entry| entry.view.capabilities().incremental);
            self.scheduler.update_stream_modes(series, incremental);
        }
    }

    /// Runs the pipeline-level update an action declared. Light-weight and
    /// component-targeted methods are applied directly by the dispatcher.
    pub(super) fn run_update_method(
        &mut self,
        method: &UpdateMethod,
        model: &mut GlobalModel,
        payload: Option<&Payload>,
    ) -> ChartResult<()> {
        match method {
            UpdateMethod::None
            | UpdateMethod::Highlight
            | UpdateMethod::Downplay
            | UpdateMethod::Select(_)
            | UpdateMethod::Component { .. } => Ok(()),
            UpdateMethod::Update => self.update(model, payload),
            UpdateMethod::PrepareAndUpdate => self.prepare_and_update(model, payload),
            UpdateMethod::UpdateTransform => self.update_transform(model, payload),
            UpdateMethod::UpdateView => self.update_view(model, payload),
            UpdateMethod::UpdateVisual => self.update_visual(model, payload),
            UpdateMethod::UpdateLayout => self.update_layout(model, payload),
        }
    }

    /// One progressive round: advance every unfinished task by one step.
    pub(super) fn progress_round(&mut self, model: &mut GlobalModel) -> ChartResult<()> {
        let viewport = self.config.viewport;
        self.scheduler.perform_series_tasks(model)?;
        let ctx = StageContext {
            payload: None,
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        self.scheduler.perform_data_processor_tasks(model, &ctx)?;
        self.update_stream_modes(model);
        let ctx = StageContext {
            payload: None,
            api: &self.api,
            viewport,
            coordinate_systems: &self.coordinate_systems,
        };
        self.scheduler
            .perform_visual_tasks(model, &ctx, &VisualTaskOpts::default())?;
        self.render_series(model, None, None)
    }
}

fn marked_payload(payload: Option<&Payload>, fallback_type: &str, method: RenderMethod) -> Payload {
    let mut marked = payload
        .cloned()
        .unwrap_or_else(|| Payload::new(fallback_type));
    marked.mark_render_method(method);
    marked
}
