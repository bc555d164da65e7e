use std::collections::HashSet;

use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use crate::error::ChartResult;
use crate::extensions::PluginEvent;
use crate::model::{
    ComponentQuery, GlobalModel, ModelNode, ModelUid, Payload, RenderMethod, SeriesModel,
    option::value_to_key,
};
use crate::render::Renderer;
use crate::view::{ViewContext, ViewModel, sync_selection};

use super::action::{RegisteredAction, UpdateMethod};
use super::engine_core::EngineCore;
use super::{ChartEngine, ChartEvent, DispatchOpts, ProcessState};

/// Events produced by one dispatch, triggered once the main process is left.
struct DispatchOutcome {
    message: ChartEvent,
    publish_message: bool,
    refined: Option<ChartEvent>,
}

/// Main type a highlight/downplay payload addresses.
///
/// Read from `<main>Index|Id|Name` keys (`dataIndex` excluded). No such key
/// means `series`; several distinct main types log a warning and the
/// lexically first one is used.
pub(super) fn highlight_main_type(payload: &Payload) -> String {
    let mut main_types: Vec<&str> = payload
        .body()
        .iter()
        .filter(|(_, value)| !value.is_null())
        .filter_map(|(key, _)| {
            ["Index", "Id", "Name"]
                .iter()
                .find_map(|suffix| key.strip_suffix(suffix))
        })
        .filter(|main_type| !main_type.is_empty() && *main_type != "data")
        .collect();
    main_types.sort_unstable();
    main_types.dedup();

    match main_types.as_slice() {
        [] => "series".to_owned(),
        [single] => (*single).to_owned(),
        [first, ..] => {
            warn!(
                main_types = ?main_types,
                chosen = first,
                "highlight payload names several main types"
            );
            (*first).to_owned()
        }
    }
}

/// Data indices a select payload targets: `dataIndex`, else items whose
/// name is listed in `name`.
fn selection_indices(series: &SeriesModel, payload: &Payload) -> Vec<usize> {
    if let Some(indices) = payload.data_indices() {
        return indices;
    }
    let names: Vec<String> = match payload.get("name") {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_key).collect(),
        Some(value) => value_to_key(value).into_iter().collect(),
        None => return Vec::new(),
    };
    let data = series.data();
    (0..data.count())
        .filter(|index| {
            data.name(*index)
                .is_some_and(|name| names.iter().any(|wanted| wanted == name))
        })
        .collect()
}

fn direct_targets(
    model: &GlobalModel,
    payload: &Payload,
    main_type: &str,
    sub_type: &str,
) -> Vec<ModelUid> {
    let excluded: HashSet<String> = match payload.get("excludeSeriesId") {
        Some(Value::Array(items)) => items.iter().filter_map(value_to_key).collect(),
        Some(value) => value_to_key(value).into_iter().collect(),
        None => HashSet::new(),
    };
    let query = ComponentQuery::from_fields(main_type, payload.body());

    let identities: Vec<_> = if main_type == "series" {
        model
            .series()
            .iter()
            .map(|series| series.identity().clone())
            .collect()
    } else {
        model
            .components(main_type)
            .iter()
            .map(|component| component.identity().clone())
            .collect()
    };
    identities
        .into_iter()
        .filter(|identity| query.matches(identity))
        .filter(|identity| sub_type.is_empty() || identity.sub_type == sub_type)
        .filter(|identity| !excluded.contains(&identity.id))
        .map(|identity| identity.uid)
        .collect()
}

impl EngineCore {
    /// Applies a light-weight or component-targeted update straight to the
    /// matching views, skipping the pipeline.
    pub(super) fn update_directly(
        &mut self,
        model: &mut GlobalModel,
        payload: &Payload,
        method: &UpdateMethod,
        main_type: &str,
        sub_type: &str,
    ) -> ChartResult<()> {
        model.set_update_payload(Some(payload.clone()));
        let targets = direct_targets(model, payload, main_type, sub_type);
        let is_series = main_type == "series";

        if let (UpdateMethod::Select(op), true) = (method, is_series) {
            for uid in &targets {
                if let Some(position) = model.series_position(*uid) {
                    let series = &mut model.series_mut()[position];
                    let indices = selection_indices(series, payload);
                    series.apply_selection(*op, &indices);
                }
            }
        }

        let global: &GlobalModel = model;
        let ctx = ViewContext {
            global,
            api: &self.api,
            coordinate_systems: &self.coordinate_systems,
            payload: Some(payload),
            viewport: self.config.viewport,
        };
        let list = if is_series {
            &mut self.views.chart
        } else {
            &mut self.views.component
        };
        for uid in targets {
            let view_model = if is_series {
                global.series_by_uid(uid).map(ViewModel::Series)
            } else {
                global.component_by_uid(uid).map(ViewModel::Component)
            };
            let (Some(view_model), Some(entry)) = (view_model, list.view_of_mut(uid)) else {
                continue;
            };
            if !entry.alive {
                continue;
            }
            let view = entry.view.as_mut();
            match method {
                UpdateMethod::Highlight => view.highlight(view_model, payload),
                UpdateMethod::Downplay => view.downplay(view_model, payload),
                UpdateMethod::Select(_) => {
                    if let Some(series) = view_model.as_series() {
                        sync_selection(view.group_mut(), series);
                    }
                }
                UpdateMethod::Component { method, .. } => match method {
                    RenderMethod::Render => view.render(view_model, &ctx)?,
                    RenderMethod::UpdateView => view.update_view(view_model, &ctx)?,
                    RenderMethod::UpdateVisual => view.update_visual(view_model, &ctx)?,
                    RenderMethod::UpdateLayout => view.update_layout(view_model, &ctx)?,
                    RenderMethod::UpdateTransform => {
                        view.update_transform(view_model, &ctx)?;
                    }
                },
                _ => {}
            }
        }
        self.runtime.needs_paint = true;
        Ok(())
    }

    fn dispatch_in_cycle(
        &mut self,
        action: &RegisteredAction,
        payload: &Payload,
        model: &mut GlobalModel,
    ) -> ChartResult<DispatchOutcome> {
        let batched = payload.is_batch();
        let items = payload.batch_items();
        let highlight_main = matches!(action.update, UpdateMethod::Highlight | UpdateMethod::Downplay)
            .then(|| highlight_main_type(payload));

        let mut event_bodies: Vec<Value> = Vec::with_capacity(items.len());
        let mut results: Vec<Option<Value>> = Vec::with_capacity(items.len());
        for item in &items {
            let result = (action.handler)(item, model, &self.api)?;
            let mut body = match (&result, &action.refinement) {
                (Some(Value::Object(fields)), None) => fields.clone(),
                _ => item.body().clone(),
            };
            body.insert(
                "type".to_owned(),
                Value::String(action.non_refined_event.clone()),
            );
            event_bodies.push(Value::Object(body));
            results.push(result);

            match &action.update {
                UpdateMethod::Highlight | UpdateMethod::Downplay => {
                    let main_type = highlight_main.as_deref().unwrap_or("series");
                    self.update_directly(model, item, &action.update, main_type, "")?;
                    self.runtime.states_dirty = true;
                }
                UpdateMethod::Select(_) => {
                    self.update_directly(model, item, &action.update, "series", "")?;
                    self.runtime.states_dirty = true;
                }
                UpdateMethod::Component {
                    main_type,
                    sub_type,
                    ..
                } => {
                    self.update_directly(model, item, &action.update, main_type, sub_type)?;
                }
                _ => {}
            }
        }

        let pipeline_update = !matches!(action.update, UpdateMethod::None)
            && !action.update.is_light_weight()
            && !matches!(action.update, UpdateMethod::Component { .. });
        if pipeline_update {
            if self.runtime.pending_update.take().is_some() {
                self.prepare_and_update(model, Some(payload))?;
            } else {
                self.run_update_method(&action.update, model, Some(payload))?;
            }
        }

        let message_body = if batched {
            let mut body = Map::new();
            body.insert(
                "type".to_owned(),
                Value::String(action.non_refined_event.clone()),
            );
            body.insert("batch".to_owned(), Value::Array(event_bodies));
            body
        } else {
            match event_bodies.into_iter().next() {
                Some(Value::Object(body)) => body,
                _ => Map::new(),
            }
        };

        let refined = action.refinement.as_ref().map(|refinement| {
            let mut body = Map::new();
            body.insert("type".to_owned(), Value::String(refinement.event.clone()));
            if let Value::Object(content) = (refinement.refine)(&results, payload, model) {
                for (key, value) in content {
                    body.entry(key).or_insert(value);
                }
            }
            body.insert(
                "fromAction".to_owned(),
                Value::String(payload.action_type().to_owned()),
            );
            body.insert("fromActionPayload".to_owned(), payload.to_value());
            ChartEvent::with_body(refinement.event.clone(), body)
        });

        Ok(DispatchOutcome {
            message: ChartEvent::with_body(action.non_refined_event.clone(), message_body),
            publish_message: action.publishes_non_refined(),
            refined,
        })
    }
}

impl<R: Renderer> ChartEngine<R> {
    /// Dispatches an action.
    ///
    /// Unknown actions, a disposed chart and a chart without option are
    /// no-ops. Actions queued through [`ExtensionApi`](super::ExtensionApi)
    /// during the cycle run afterwards, in order.
    pub fn dispatch_action(&mut self, payload: Payload, opts: DispatchOpts) -> ChartResult<()> {
        if self.core.api.is_disposed() {
            warn!(action_type = payload.action_type(), "dispatch on a disposed chart ignored");
            return Ok(());
        }
        if !self.core.registry.has_action(payload.action_type()) {
            warn!(action_type = payload.action_type(), "unknown action type; dispatch ignored");
            return Ok(());
        }
        if self.core.model.is_none() {
            warn!(action_type = payload.action_type(), "dispatch before set_option ignored");
            return Ok(());
        }
        if self.core.api.process_state() == ProcessState::InMainProcess {
            error!(action_type = payload.action_type(), "dispatch during main process; queued");
            self.core.api.dispatch_action_with(payload, opts);
            return Ok(());
        }

        self.do_dispatch_action(&payload, opts.silent)?;
        if opts.flush {
            self.flush()?;
        }
        self.flush_pending_actions(opts.silent)?;
        self.trigger_updated_event(opts.silent);
        Ok(())
    }

    pub(super) fn do_dispatch_action(&mut self, payload: &Payload, silent: bool) -> ChartResult<()> {
        let Some(action) = self.core.registry.action(payload.action_type()).cloned() else {
            warn!(action_type = payload.action_type(), "unknown action type; dispatch ignored");
            return Ok(());
        };

        self.core.api.enter_main_process();
        let result = self
            .core
            .with_model(|core, model| core.dispatch_in_cycle(&action, payload, model));
        self.core.api.leave_main_process();

        let outcome = match result {
            Ok(Some(outcome)) => outcome,
            Ok(None) => return Ok(()),
            Err(error) => {
                self.core.runtime.pending_update = None;
                return Err(error);
            }
        };
        debug!(
            action_type = %action.action_type,
            batched = payload.is_batch(),
            silent,
            "action dispatched"
        );
        self.emit_plugin_event(PluginEvent::ActionDispatched {
            action_type: action.action_type.clone(),
        });

        if !silent {
            if outcome.publish_message {
                self.trigger_event(outcome.message);
            }
            if let Some(refined) = outcome.refined {
                self.trigger_event(refined);
            }
        }
        Ok(())
    }

    /// Runs actions queued during the last cycle, in program order.
    pub(super) fn flush_pending_actions(&mut self, silent: bool) -> ChartResult<()> {
        while let Some((payload, opts)) = self.core.api.pop_pending() {
            self.do_dispatch_action(&payload, silent || opts.silent)?;
        }
        Ok(())
    }
}
