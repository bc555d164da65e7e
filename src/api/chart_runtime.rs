use serde_json::Value;

use crate::extensions::ChartPlugin;
use crate::render::Group;

use super::events::EventListeners;

/// A full update deferred to the next `on_frame`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) struct PendingUpdate {
    pub(super) silent: bool,
}

/// The loading overlay currently attached to the scene.
pub(super) struct ShownLoading {
    pub(super) name: String,
    pub(super) cfg: Value,
    pub(super) group: Group,
}

/// Runtime orchestration state grouped separately from model and views.
#[derive(Default)]
pub(super) struct ChartRuntimeState {
    pub(super) plugins: Vec<Box<dyn ChartPlugin>>,
    pub(super) listeners: EventListeners,
    pub(super) pending_update: Option<PendingUpdate>,
    /// Element hover/select flags changed; apply on the next frame.
    pub(super) states_dirty: bool,
    /// The scene changed since the last paint.
    pub(super) needs_paint: bool,
    pub(super) hover_layer_active: bool,
    pub(super) loading: Option<ShownLoading>,
}
