use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ChartError, ChartResult};
use crate::model::{GlobalModel, Payload, RenderMethod, SelectOp};

use super::ExtensionApi;

/// Action body: may mutate the model and return event fields for the
/// action's message. `None` replicates the payload.
pub type ActionHandler =
    Arc<dyn Fn(&Payload, &mut GlobalModel, &ExtensionApi) -> ChartResult<Option<Value>> + Send + Sync>;

/// Builds the refined event body from the per-batch-item results.
pub type EventRefiner = Arc<dyn Fn(&[Option<Value>], &Payload, &GlobalModel) -> Value + Send + Sync>;

/// What an action re-runs after its handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateMethod {
    None,
    Update,
    PrepareAndUpdate,
    UpdateTransform,
    UpdateView,
    UpdateVisual,
    UpdateLayout,
    Highlight,
    Downplay,
    Select(SelectOp),
    /// Calls `method` only on the views of matching components, e.g.
    /// `legend:updateView`.
    Component {
        main_type: String,
        sub_type: String,
        method: RenderMethod,
    },
}

impl UpdateMethod {
    /// Parses `update`, `updateView`, `legend:updateView`, `legend.plain:render`...
    pub fn parse(text: &str) -> ChartResult<Self> {
        if let Some((component, method)) = text.split_once(':') {
            let (main_type, sub_type) = component.split_once('.').unwrap_or((component, ""));
            let method = match method {
                "render" => RenderMethod::Render,
                "updateView" => RenderMethod::UpdateView,
                "updateVisual" => RenderMethod::UpdateVisual,
                "updateLayout" => RenderMethod::UpdateLayout,
                "updateTransform" => RenderMethod::UpdateTransform,
                other => {
                    return Err(ChartError::InvalidAction(format!(
                        "unknown component update method `{other}`"
                    )));
                }
            };
            return Ok(Self::Component {
                main_type: main_type.to_owned(),
                sub_type: sub_type.to_owned(),
                method,
            });
        }
        match text {
            "none" => Ok(Self::None),
            "" | "update" => Ok(Self::Update),
            "prepareAndUpdate" => Ok(Self::PrepareAndUpdate),
            "updateTransform" => Ok(Self::UpdateTransform),
            "updateView" => Ok(Self::UpdateView),
            "updateVisual" => Ok(Self::UpdateVisual),
            "updateLayout" => Ok(Self::UpdateLayout),
            "highlight" => Ok(Self::Highlight),
            "downplay" => Ok(Self::Downplay),
            "select" => Ok(Self::Select(SelectOp::Select)),
            "unselect" => Ok(Self::Select(SelectOp::Unselect)),
            "toggleSelect" => Ok(Self::Select(SelectOp::Toggle)),
            other => Err(ChartError::InvalidAction(format!(
                "unknown update method `{other}`"
            ))),
        }
    }

    /// Highlight and select families skip the pipeline entirely.
    #[must_use]
    pub fn is_light_weight(&self) -> bool {
        matches!(self, Self::Highlight | Self::Downplay | Self::Select(_))
    }
}

/// Refined public event declared by an action.
#[derive(Clone)]
pub struct EventRefinement {
    pub event: String,
    pub refine: EventRefiner,
}

/// Registration record of one action type.
#[derive(Clone)]
pub struct ActionInfo {
    pub action_type: String,
    /// Public event name; defaults to the action type. With a refinement
    /// this is the refined event name.
    pub event: Option<String>,
    pub update: UpdateMethod,
    pub refine_event: Option<EventRefiner>,
    /// Also publish the replicated (non-refined) message to listeners.
    pub publish_non_refined_event: bool,
}

impl ActionInfo {
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            event: None,
            update: UpdateMethod::Update,
            refine_event: None,
            publish_non_refined_event: false,
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    #[must_use]
    pub fn with_update(mut self, update: UpdateMethod) -> Self {
        self.update = update;
        self
    }

    #[must_use]
    pub fn with_refine_event(mut self, refine: EventRefiner) -> Self {
        self.refine_event = Some(refine);
        self
    }

    #[must_use]
    pub fn publish_non_refined_event(mut self, publish: bool) -> Self {
        self.publish_non_refined_event = publish;
        self
    }
}

impl fmt::Debug for ActionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionInfo")
            .field("action_type", &self.action_type)
            .field("event", &self.event)
            .field("update", &self.update)
            .field("refine_event", &self.refine_event.is_some())
            .field("publish_non_refined_event", &self.publish_non_refined_event)
            .finish()
    }
}

/// Validated action ready for dispatch.
#[derive(Clone)]
pub(crate) struct RegisteredAction {
    pub(crate) action_type: String,
    pub(crate) non_refined_event: String,
    pub(crate) refinement: Option<EventRefinement>,
    pub(crate) publish_non_refined_event: bool,
    pub(crate) update: UpdateMethod,
    pub(crate) handler: ActionHandler,
}

impl RegisteredAction {
    pub(crate) fn from_info(info: ActionInfo, handler: ActionHandler) -> ChartResult<Self> {
        let public_event = info
            .event
            .as_deref()
            .unwrap_or(&info.action_type)
            .to_lowercase();
        if !is_valid_name(&info.action_type) {
            return Err(ChartError::InvalidAction(format!(
                "action type `{}` must match [A-Za-z0-9_]+",
                info.action_type
            )));
        }
        if !is_valid_name(&public_event) {
            return Err(ChartError::InvalidAction(format!(
                "event name `{public_event}` must match [A-Za-z0-9_]+"
            )));
        }

        let refinement = match info.refine_event {
            Some(refine) => {
                if public_event == info.action_type {
                    return Err(ChartError::InvalidAction(format!(
                        "refined event of `{}` must differ from the action type",
                        info.action_type
                    )));
                }
                Some(EventRefinement {
                    event: public_event.clone(),
                    refine,
                })
            }
            None => None,
        };
        let non_refined_event = if refinement.is_some() {
            info.action_type.to_lowercase()
        } else {
            public_event
        };

        Ok(Self {
            action_type: info.action_type,
            non_refined_event,
            refinement,
            publish_non_refined_event: info.publish_non_refined_event,
            update: info.update,
            handler,
        })
    }

    /// Whether the replicated message reaches listeners.
    pub(crate) fn publishes_non_refined(&self) -> bool {
        self.refinement.is_none() || self.publish_non_refined_event
    }
}

impl fmt::Debug for RegisteredAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredAction")
            .field("action_type", &self.action_type)
            .field("non_refined_event", &self.non_refined_event)
            .field(
                "refined_event",
                &self.refinement.as_ref().map(|refinement| &refinement.event),
            )
            .field("update", &self.update)
            .finish()
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Handler of actions that only exist for their update method.
#[must_use]
pub fn noop_action() -> ActionHandler {
    Arc::new(|_, _, _| Ok(None))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::{ActionInfo, EventRefiner, RegisteredAction, UpdateMethod, noop_action};
    use crate::model::{RenderMethod, SelectOp};

    #[test]
    fn update_methods_parse_component_targets() {
        assert_eq!(
            UpdateMethod::parse("legend:updateView").expect("component method"),
            UpdateMethod::Component {
                main_type: "legend".to_owned(),
                sub_type: String::new(),
                method: RenderMethod::UpdateView,
            }
        );
        assert_eq!(
            UpdateMethod::parse("toggleSelect").expect("select"),
            UpdateMethod::Select(SelectOp::Toggle)
        );
        assert!(UpdateMethod::parse("explode").is_err());
        assert!(UpdateMethod::parse("legend:explode").is_err());
    }

    #[test]
    fn event_names_are_lower_cased() {
        let action = RegisteredAction::from_info(ActionInfo::new("dataZoom"), noop_action())
            .expect("valid action");
        assert_eq!(action.non_refined_event, "datazoom");
        assert!(action.publishes_non_refined());
    }

    #[test]
    fn invalid_names_are_rejected() {
        assert!(RegisteredAction::from_info(ActionInfo::new("my-action"), noop_action()).is_err());
        assert!(
            RegisteredAction::from_info(
                ActionInfo::new("ok").with_event("bad event"),
                noop_action()
            )
            .is_err()
        );
    }

    #[test]
    fn refined_event_must_differ_from_action_type() {
        let refine: EventRefiner = Arc::new(|_, _, _| json!({}));
        let info = ActionInfo::new("pick").with_refine_event(refine.clone());
        assert!(RegisteredAction::from_info(info, noop_action()).is_err());

        let info = ActionInfo::new("pick")
            .with_event("pickChanged")
            .with_refine_event(refine);
        let action = RegisteredAction::from_info(info, noop_action()).expect("refined action");
        assert_eq!(action.non_refined_event, "pick");
        assert_eq!(
            action.refinement.as_ref().map(|r| r.event.as_str()),
            Some("pickchanged")
        );
        assert!(!action.publishes_non_refined());
    }
}
