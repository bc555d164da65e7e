use std::collections::{HashMap, HashSet};

use ordered_float::OrderedFloat;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::error::ChartResult;
use crate::model::{GlobalModel, ModelNode, ModelUid, Payload};
use crate::render::{Group, GroupId, HoverState, RenderFrame, Renderer, Shape};
use crate::view::{ViewContext, ViewModel, sync_selection};

use super::events::{EVENT_FINISHED, EVENT_RENDERED};
use super::{ChartEngine, ChartEvent, LifecycleEvent, engine_core::EngineCore, z_level};
use crate::extensions::PluginEvent;

/// Z-level emphasized elements move to once the scene is large enough for
/// hover repaints of the main layers to be expensive.
pub const HOVER_LAYER_ZLEVEL: i32 = 100_000;

type PaintKey = (i32, OrderedFloat<f64>, OrderedFloat<f64>, usize);

fn update_z(group: &mut Group, model: &dyn ModelNode) {
    group.set_zlevel(model.assigned_zlevel());
    group.set_z(model.z());
}

impl EngineCore {
    /// Full render of a cycle: z-levels, every component, every series.
    pub(super) fn render(&mut self, model: &mut GlobalModel, payload: Option<&Payload>) -> ChartResult<()> {
        z_level::allocate_zlevels(model);
        let model: &GlobalModel = model;
        self.render_components(model, payload, None)?;
        self.render_series(model, payload, None)?;
        Ok(())
    }

    /// Renders component views; `only` restricts the pass to some models.
    pub(super) fn render_components(
        &mut self,
        model: &GlobalModel,
        payload: Option<&Payload>,
        only: Option<&[ModelUid]>,
    ) -> ChartResult<()> {
        let ctx = ViewContext {
            global: model,
            api: &self.api,
            coordinate_systems: &self.coordinate_systems,
            payload,
            viewport: self.config.viewport,
        };
        for component in model.all_components() {
            if only.is_some_and(|uids| !uids.contains(&component.uid())) {
                continue;
            }
            let Some(entry) = self.views.component.view_of_mut(component.uid()) else {
                continue;
            };
            entry.view.render(ViewModel::Component(component), &ctx)?;
            let group = entry.view.group_mut();
            update_z(group, component);
            group.apply_changed_states();
        }
        Ok(())
    }

    /// Runs the render task of each visible series. Views of series left out
    /// of the pass (filtered) have their content removed.
    pub(super) fn render_series(
        &mut self,
        model: &GlobalModel,
        payload: Option<&Payload>,
        dirty_map: Option<&HashSet<ModelUid>>,
    ) -> ChartResult<()> {
        self.registry
            .trigger_lifecycle(LifecycleEvent::SeriesBeforeUpdate, model, &self.api);

        let ctx = ViewContext {
            global: model,
            api: &self.api,
            coordinate_systems: &self.coordinate_systems,
            payload,
            viewport: self.config.viewport,
        };
        let mut rendered: HashSet<ModelUid> = HashSet::new();
        for series in model.each_series() {
            let uid = series.uid();
            let Some(entry) = self.views.chart.view_of_mut(uid) else {
                warn!(series_id = series.id(), "series has no view; skipped");
                continue;
            };
            if dirty_map.is_some_and(|map| map.contains(&uid)) {
                self.scheduler.dirty_render_task(uid);
            }
            self.scheduler
                .perform_render_task(series, entry.view.as_mut(), &ctx)?;

            let group = entry.view.group_mut();
            group.set_silent(series.is_silent());
            sync_selection(group, series);
            update_z(group, series);
            group.apply_changed_states();
            rendered.insert(uid);
        }

        for entry in self.views.chart.entries_mut() {
            if !rendered.contains(&entry.model_uid) && !entry.view.group().is_empty() {
                trace!(view_id = %entry.view_id, "view of hidden series removed");
                entry.view.remove();
            }
        }

        self.registry
            .trigger_lifecycle(LifecycleEvent::SeriesAfterUpdate, model, &self.api);
        self.update_hover_layer_status();
        self.runtime.needs_paint = true;
        Ok(())
    }

    fn update_hover_layer_status(&mut self) {
        let element_count: usize = self
            .views
            .chart
            .entries()
            .map(|entry| entry.view.group().len())
            .sum();
        let active = element_count > self.config.hover_layer_threshold;
        if active != self.runtime.hover_layer_active {
            debug!(element_count, active, "hover layer status changed");
        }
        self.runtime.hover_layer_active = active;
    }

    /// Applies element hover/select flags changed since the last frame.
    ///
    /// Only light-weight actions flag the runtime; without one the views are
    /// not walked.
    pub(super) fn apply_changed_states(&mut self) -> usize {
        if !self.runtime.states_dirty {
            return 0;
        }
        let changed: usize = self
            .views
            .component
            .entries_mut()
            .chain(self.views.chart.entries_mut())
            .map(|entry| entry.view.group_mut().apply_changed_states())
            .sum();
        self.runtime.states_dirty = false;
        if changed > 0 {
            self.runtime.needs_paint = true;
        }
        changed
    }

    /// Paint list of every group attached to the scene, ordered by
    /// `(zlevel, group z, element z)` and then by scene order.
    pub(super) fn build_frame(&self) -> RenderFrame {
        let groups: HashMap<GroupId, &Group> = self
            .views
            .component
            .entries()
            .chain(self.views.chart.entries())
            .map(|entry| (entry.view.group().id(), entry.view.group()))
            .chain(
                self.runtime
                    .loading
                    .as_ref()
                    .map(|loading| (loading.group.id(), &loading.group)),
            )
            .collect();

        let hover_layer = self.runtime.hover_layer_active;
        let mut keyed: Vec<(PaintKey, Shape)> = Vec::new();
        for group_id in self.scene.iter() {
            let Some(group) = groups.get(&group_id) else {
                continue;
            };
            for element in group.elements() {
                let zlevel = if hover_layer && element.hover_state() == HoverState::Emphasis {
                    HOVER_LAYER_ZLEVEL
                } else {
                    group.zlevel()
                };
                let order = keyed.len();
                keyed.push((
                    (zlevel, OrderedFloat(group.z()), OrderedFloat(element.z()), order),
                    element.styled_shape(),
                ));
            }
        }
        keyed.sort_by(|left, right| left.0.cmp(&right.0));

        let mut frame = RenderFrame::new(self.config.viewport);
        for ((zlevel, ..), shape) in keyed {
            frame.push_shape(zlevel, shape);
        }
        frame
    }

    pub(super) fn is_settled(&self) -> bool {
        self.model.is_some()
            && self.runtime.pending_update.is_none()
            && !self.scheduler.unfinished
            && self.api.pending_action_count() == 0
    }
}

impl<R: Renderer> ChartEngine<R> {
    /// Paints the scene through the renderer and emits `rendered`, then
    /// `finished` when no lazy update, progressive work or queued action
    /// remains.
    pub fn flush(&mut self) -> ChartResult<()> {
        if self.core.api.is_disposed() {
            warn!("flush called on a disposed chart");
            return Ok(());
        }
        let frame = self.core.build_frame();
        self.renderer.render(&frame)?;
        self.core.runtime.needs_paint = false;

        let primitive_count = frame.primitive_count();
        let mut body = Map::new();
        body.insert("primitiveCount".to_owned(), Value::from(primitive_count));
        self.trigger_event(ChartEvent::with_body(EVENT_RENDERED, body));
        self.emit_plugin_event(PluginEvent::Rendered { primitive_count });
        trace!(primitive_count, layer_count = frame.layers.len(), "frame painted");

        if self.core.is_settled() {
            self.trigger_event(ChartEvent::new(EVENT_FINISHED));
            self.emit_plugin_event(PluginEvent::Finished);
        }
        Ok(())
    }
}
