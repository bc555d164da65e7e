use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Value, json};
use tracing::debug;

use crate::coord::{Cartesian2dCreator, CoordinateSystemCreator};
use crate::core::Viewport;
use crate::error::ChartResult;
use crate::extensions;
use crate::model::{GlobalModel, ModelTypeTable, Payload, SelectOp};
use crate::pipeline::{StageHandler, StageHandlerRegistry};
use crate::render::Group;
use crate::view::{ViewFactories, ViewFactory};

use super::ExtensionApi;
use super::action::{ActionHandler, ActionInfo, EventRefiner, RegisteredAction, UpdateMethod, noop_action};

/// Rewrites a raw option before it is merged.
pub type OptionPreprocessor = Arc<dyn Fn(&mut Value) + Send + Sync>;

/// Builds a loading overlay from its config for the current viewport.
pub type LoadingEffect = Arc<dyn Fn(&Value, Viewport) -> Group + Send + Sync>;

/// Observer of one [`LifecycleEvent`].
pub type LifecycleHook = Arc<dyn Fn(&GlobalModel, &ExtensionApi) + Send + Sync>;

/// Points of an update cycle where lifecycle hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    SeriesBeforeUpdate,
    SeriesAfterUpdate,
    AfterUpdate,
}

/// Every extension point of the engine: stage handlers, actions, views,
/// model types, coordinate systems, preprocessors, lifecycle hooks and
/// loading effects.
///
/// Built explicitly and cloned into each engine at construction, so later
/// registrations only affect engines created afterwards.
#[derive(Clone, Default)]
pub struct ChartRegistry {
    stage_handlers: StageHandlerRegistry,
    actions: IndexMap<String, RegisteredAction>,
    views: ViewFactories,
    model_types: ModelTypeTable,
    coordinate_systems: Vec<Arc<dyn CoordinateSystemCreator>>,
    preprocessors: Vec<OptionPreprocessor>,
    hooks: IndexMap<LifecycleEvent, Vec<LifecycleHook>>,
    loading_effects: IndexMap<String, LoadingEffect>,
}

impl ChartRegistry {
    /// Empty registry; nothing can be rendered until types are registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the default actions, the palette visual, the
    /// `cartesian2d` coordinate system and the built-in chart types.
    pub fn with_builtins() -> ChartResult<Self> {
        let mut registry = Self::new();
        registry.register_default_actions()?;
        registry.register_coordinate_system(Arc::new(Cartesian2dCreator));
        extensions::install_builtins(&mut registry)?;
        Ok(registry)
    }

    fn register_default_actions(&mut self) -> ChartResult<()> {
        self.register_action(
            ActionInfo::new("highlight").with_update(UpdateMethod::Highlight),
            noop_action(),
        )?;
        self.register_action(
            ActionInfo::new("downplay").with_update(UpdateMethod::Downplay),
            noop_action(),
        )?;
        for (action_type, op) in [
            ("select", SelectOp::Select),
            ("unselect", SelectOp::Unselect),
            ("toggleSelect", SelectOp::Toggle),
        ] {
            self.register_action(
                ActionInfo::new(action_type)
                    .with_event("selectchanged")
                    .with_update(UpdateMethod::Select(op))
                    .with_refine_event(select_changed_event())
                    .publish_non_refined_event(true),
                noop_action(),
            )?;
        }
        Ok(())
    }

    /// `None` priority uses the processor default.
    pub fn register_processor(
        &mut self,
        priority: Option<i32>,
        handler: StageHandler,
    ) -> ChartResult<()> {
        self.stage_handlers.register_processor(priority, handler)
    }

    pub fn register_visual(&mut self, priority: Option<i32>, handler: StageHandler) -> ChartResult<()> {
        self.stage_handlers.register_visual(priority, handler)
    }

    pub fn register_layout(&mut self, priority: Option<i32>, handler: StageHandler) -> ChartResult<()> {
        self.stage_handlers.register_layout(priority, handler)
    }

    /// Registers an action. Re-registering a known type is ignored.
    pub fn register_action(&mut self, info: ActionInfo, handler: ActionHandler) -> ChartResult<()> {
        if self.actions.contains_key(&info.action_type) {
            debug!(action_type = %info.action_type, "action already registered");
            return Ok(());
        }
        let action = RegisteredAction::from_info(info, handler)?;
        self.actions.insert(action.action_type.clone(), action);
        Ok(())
    }

    pub fn register_view(&mut self, main_type: &str, sub_type: &str, factory: ViewFactory) {
        self.views.register(main_type, sub_type, factory);
    }

    /// Declares a component main type (`grid`, `title`...) with the option
    /// its models start from.
    pub fn register_component_type(&mut self, main_type: &str, default_option: Option<Value>) {
        self.model_types.register_component(main_type, default_option);
    }

    pub fn register_series_type(&mut self, sub_type: &str, default_option: Option<Value>) {
        self.model_types.register_series(sub_type, default_option);
    }

    /// Registers a coordinate system kind; a second creator of the same kind
    /// is ignored.
    pub fn register_coordinate_system(&mut self, creator: Arc<dyn CoordinateSystemCreator>) {
        if self
            .coordinate_systems
            .iter()
            .any(|existing| existing.kind() == creator.kind())
        {
            debug!(kind = creator.kind(), "coordinate system already registered");
            return;
        }
        self.coordinate_systems.push(creator);
    }

    pub fn register_preprocessor(&mut self, preprocessor: OptionPreprocessor) {
        self.preprocessors.push(preprocessor);
    }

    pub fn register_lifecycle_hook(&mut self, event: LifecycleEvent, hook: LifecycleHook) {
        self.hooks.entry(event).or_default().push(hook);
    }

    /// Registers a loading effect; a later registration of the same name
    /// replaces the earlier one.
    pub fn register_loading(&mut self, name: &str, effect: LoadingEffect) {
        if self.loading_effects.insert(name.to_owned(), effect).is_some() {
            debug!(name, "loading effect replaced");
        }
    }

    #[must_use]
    pub fn has_loading(&self, name: &str) -> bool {
        self.loading_effects.contains_key(name)
    }

    pub(crate) fn loading_effect(&self, name: &str) -> Option<&LoadingEffect> {
        self.loading_effects.get(name)
    }

    #[must_use]
    pub fn stage_handlers(&self) -> &StageHandlerRegistry {
        &self.stage_handlers
    }

    #[must_use]
    pub fn has_action(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    pub(crate) fn action(&self, action_type: &str) -> Option<&RegisteredAction> {
        self.actions.get(action_type)
    }

    #[must_use]
    pub fn views(&self) -> &ViewFactories {
        &self.views
    }

    #[must_use]
    pub fn model_types(&self) -> &ModelTypeTable {
        &self.model_types
    }

    #[must_use]
    pub fn coordinate_system_creators(&self) -> &[Arc<dyn CoordinateSystemCreator>] {
        &self.coordinate_systems
    }

    pub(crate) fn preprocess(&self, option: &mut Value) {
        for preprocessor in &self.preprocessors {
            preprocessor(option);
        }
    }

    pub(crate) fn trigger_lifecycle(
        &self,
        event: LifecycleEvent,
        model: &GlobalModel,
        api: &ExtensionApi,
    ) {
        if let Some(hooks) = self.hooks.get(&event) {
            for hook in hooks {
                hook(model, api);
            }
        }
    }
}

impl fmt::Debug for ChartRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartRegistry")
            .field("processors", &self.stage_handlers.processors().count())
            .field("visuals", &self.stage_handlers.visuals().count())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("views", &self.views)
            .field("loading_effects", &self.loading_effects.keys().collect::<Vec<_>>())
            .field(
                "coordinate_systems",
                &self
                    .coordinate_systems
                    .iter()
                    .map(|creator| creator.kind().to_owned())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// `selectchanged` body: every series' selected indices plus whether the
/// change came from a click.
fn select_changed_event() -> EventRefiner {
    Arc::new(|_results, payload: &Payload, model: &GlobalModel| {
        let selected: Vec<Value> = model
            .series()
            .iter()
            .filter_map(|series| {
                let indices = series.selected_indices();
                (!indices.is_empty()).then(|| {
                    json!({
                        "seriesIndex": series.series_index(),
                        "dataIndex": indices,
                    })
                })
            })
            .collect();
        json!({
            "selected": selected,
            "isFromClick": payload
                .get("isFromClick")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::ChartRegistry;
    use crate::api::action::{ActionInfo, noop_action};

    #[test]
    fn builtins_register_default_actions_and_types() {
        let registry = ChartRegistry::with_builtins().expect("builtins");
        for action in ["highlight", "downplay", "select", "unselect", "toggleSelect"] {
            assert!(registry.has_action(action), "missing {action}");
        }
        assert!(registry.views().contains("series", "scatter"));
        assert!(registry.views().contains("series", "sankey"));
        assert!(registry.views().contains("grid", ""));
        assert!(registry.model_types().is_component("xAxis"));
        assert_eq!(registry.coordinate_system_creators().len(), 1);
        assert!(!registry.stage_handlers().is_empty());
        assert!(registry.has_loading("default"));
    }

    #[test]
    fn duplicate_action_type_is_ignored() {
        let mut registry = ChartRegistry::new();
        registry
            .register_action(ActionInfo::new("zoom"), noop_action())
            .expect("first registration");
        registry
            .register_action(ActionInfo::new("zoom").with_event("other"), noop_action())
            .expect("duplicate is a no-op");
        let action = registry.action("zoom").expect("zoom action");
        assert_eq!(action.non_refined_event, "zoom");
    }
}
