use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::error::ChartResult;
use crate::model::{GlobalModel, ModelNode, ModelUid};
use crate::render::SceneRoot;
use crate::view::{View, ViewContext, ViewModel};

use super::engine_core::EngineCore;

/// Which of the two view lists a pass works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum ViewKind {
    Component,
    Chart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(super) struct ViewSlot(u64);

pub(super) struct ViewEntry {
    pub(super) view_id: String,
    pub(super) view: Box<dyn View>,
    pub(super) model_uid: ModelUid,
    pub(super) alive: bool,
}

/// Views of one kind in creation order, plus the `view_id` map.
///
/// The map may point at a newer view than an entry carrying the same id
/// (replace-merge recreated it); sweeping the older entry leaves the map
/// alone in that case.
#[derive(Default)]
pub(super) struct ViewList {
    entries: IndexMap<ViewSlot, ViewEntry>,
    by_id: HashMap<String, ViewSlot>,
    by_model: HashMap<ModelUid, ViewSlot>,
    next_slot: u64,
}

impl ViewList {
    fn mark_all_dead(&mut self) {
        for entry in self.entries.values_mut() {
            entry.alive = false;
        }
        self.by_model.clear();
    }

    /// Marks the mapped view alive and rebinds it to `model_uid`.
    fn revive(&mut self, view_id: &str, model_uid: ModelUid) -> bool {
        let Some(slot) = self.by_id.get(view_id).copied() else {
            return false;
        };
        let Some(entry) = self.entries.get_mut(&slot) else {
            return false;
        };
        entry.alive = true;
        entry.model_uid = model_uid;
        self.by_model.insert(model_uid, slot);
        true
    }

    fn insert(&mut self, view_id: String, view: Box<dyn View>, model_uid: ModelUid) {
        let slot = ViewSlot(self.next_slot);
        self.next_slot += 1;
        self.by_id.insert(view_id.clone(), slot);
        self.by_model.insert(model_uid, slot);
        self.entries.insert(
            slot,
            ViewEntry {
                view_id,
                view,
                model_uid,
                alive: true,
            },
        );
    }

    /// Disposes and detaches every view left dead by the last prepare pass.
    fn sweep(&mut self, scene: &mut SceneRoot) -> usize {
        let dead: Vec<ViewSlot> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.alive)
            .map(|(slot, _)| *slot)
            .collect();
        for slot in &dead {
            let Some(mut entry) = self.entries.shift_remove(slot) else {
                continue;
            };
            entry.view.dispose();
            scene.remove(entry.view.group().id());
            if self.by_id.get(&entry.view_id) == Some(slot) {
                self.by_id.remove(&entry.view_id);
            }
            debug!(
                view_id = %entry.view_id,
                view_type = entry.view.type_name(),
                "view disposed"
            );
        }
        dead.len()
    }

    pub(super) fn view_of(&self, model_uid: ModelUid) -> Option<&ViewEntry> {
        self.by_model
            .get(&model_uid)
            .and_then(|slot| self.entries.get(slot))
    }

    pub(super) fn view_of_mut(&mut self, model_uid: ModelUid) -> Option<&mut ViewEntry> {
        self.by_model
            .get(&model_uid)
            .and_then(|slot| self.entries.get_mut(slot))
    }

    pub(super) fn entries(&self) -> impl Iterator<Item = &ViewEntry> {
        self.entries.values()
    }

    pub(super) fn entries_mut(&mut self) -> impl Iterator<Item = &mut ViewEntry> {
        self.entries.values_mut()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    fn dispose_all(&mut self, scene: &mut SceneRoot) {
        for entry in self.entries.values_mut() {
            entry.alive = false;
        }
        self.sweep(scene);
        self.by_id.clear();
        self.by_model.clear();
    }
}

/// Component views and chart (series) views.
#[derive(Default)]
pub(super) struct ViewLists {
    pub(super) component: ViewList,
    pub(super) chart: ViewList,
}

impl ViewLists {
    pub(super) fn list_mut(&mut self, kind: ViewKind) -> &mut ViewList {
        match kind {
            ViewKind::Component => &mut self.component,
            ViewKind::Chart => &mut self.chart,
        }
    }

    pub(super) fn view_count(&self) -> usize {
        self.component.len() + self.chart.len()
    }

    pub(super) fn dispose_all(&mut self, scene: &mut SceneRoot) {
        self.component.dispose_all(scene);
        self.chart.dispose_all(scene);
    }
}

struct ViewRequest {
    uid: ModelUid,
    view_id: String,
    main_type: String,
    sub_type: String,
    require_new: bool,
}

fn view_request(node: &mut dyn ModelNode) -> ViewRequest {
    let identity = node.identity();
    let uid = identity.uid;
    let view_id = identity.view_id();
    let main_type = identity.main_type.clone();
    let sub_type = identity.sub_type.clone();

    let state = node.state_mut();
    let require_new = std::mem::take(&mut state.require_new_view);
    state.view_id = Some(view_id.clone());
    ViewRequest {
        uid,
        view_id,
        main_type,
        sub_type,
        require_new,
    }
}

impl EngineCore {
    /// Reconciles one view list with the model: reuse by view id, create
    /// what is missing, then dispose whatever nothing claimed.
    pub(super) fn prepare_views(&mut self, model: &mut GlobalModel, kind: ViewKind) -> ChartResult<()> {
        let requests: Vec<ViewRequest> = match kind {
            ViewKind::Component => model.all_components_mut().map(|c| view_request(c)).collect(),
            ViewKind::Chart => model.series_mut().iter_mut().map(|s| view_request(s)).collect(),
        };

        let model: &GlobalModel = model;
        let ctx = ViewContext {
            global: model,
            api: &self.api,
            coordinate_systems: &self.coordinate_systems,
            payload: None,
            viewport: self.config.viewport,
        };
        let list = self.views.list_mut(kind);
        list.mark_all_dead();

        let mut created = 0_usize;
        for request in requests {
            let view_model = match kind {
                ViewKind::Component => model.component_by_uid(request.uid).map(ViewModel::Component),
                ViewKind::Chart => model.series_by_uid(request.uid).map(ViewModel::Series),
            };
            let Some(view_model) = view_model else {
                continue;
            };

            let reused = !request.require_new && list.revive(&request.view_id, request.uid);
            if !reused {
                let mut view = self
                    .registry
                    .views()
                    .create(&request.main_type, &request.sub_type)?;
                view.init(view_model, &ctx)?;
                self.scene.add(view.group().id());
                trace!(view_id = %request.view_id, view_type = view.type_name(), "view created");
                list.insert(request.view_id, view, request.uid);
                created += 1;
                if kind == ViewKind::Chart {
                    self.scheduler.dirty_render_task(request.uid);
                }
            }

            if kind == ViewKind::Chart {
                let incremental = list
                    .view_of(request.uid)
                    .is_some_and(|entry| entry.view.capabilities().incremental);
                self.scheduler.prepare_view(request.uid, incremental);
            }
        }

        let disposed = list.sweep(&mut self.scene);
        debug!(
            kind = ?kind,
            view_count = list.len(),
            created,
            disposed,
            "views prepared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::{ViewKind, ViewList, ViewLists};
    use crate::error::ChartResult;
    use crate::model::ModelUid;
    use crate::render::{Group, SceneRoot};
    use crate::view::{View, ViewContext, ViewModel};

    struct CountingView {
        group: Group,
        disposed: Rc<Cell<usize>>,
    }

    impl View for CountingView {
        fn type_name(&self) -> &str {
            "counting"
        }

        fn group(&self) -> &Group {
            &self.group
        }

        fn group_mut(&mut self) -> &mut Group {
            &mut self.group
        }

        fn render(&mut self, _model: ViewModel<'_>, _ctx: &ViewContext<'_>) -> ChartResult<()> {
            Ok(())
        }

        fn dispose(&mut self) {
            self.disposed.set(self.disposed.get() + 1);
        }
    }

    fn counting_view(disposed: &Rc<Cell<usize>>, scene: &mut SceneRoot) -> Box<dyn View> {
        let view = CountingView {
            group: Group::new(),
            disposed: Rc::clone(disposed),
        };
        scene.add(view.group.id());
        Box::new(view)
    }

    #[test]
    fn sweeping_a_superseded_view_keeps_the_newer_mapping() {
        let disposed = Rc::new(Cell::new(0));
        let mut scene = SceneRoot::default();
        let mut list = ViewList::default();
        let old_uid = ModelUid::next();
        let new_uid = ModelUid::next();

        list.insert("_ec_a_series.scatter".to_owned(), counting_view(&disposed, &mut scene), old_uid);
        list.mark_all_dead();
        list.insert("_ec_a_series.scatter".to_owned(), counting_view(&disposed, &mut scene), new_uid);

        assert_eq!(list.sweep(&mut scene), 1);
        assert_eq!(disposed.get(), 1);
        assert_eq!(scene.len(), 1);
        assert!(list.revive("_ec_a_series.scatter", new_uid));
        assert!(list.view_of(new_uid).is_some());
        assert_eq!(list.sweep(&mut scene), 0);
        assert_eq!(disposed.get(), 1);
    }

    #[test]
    fn dispose_all_disposes_each_view_once() {
        let disposed = Rc::new(Cell::new(0));
        let mut scene = SceneRoot::default();
        let mut lists = ViewLists::default();
        lists.list_mut(ViewKind::Component).insert(
            "_ec_grid0_grid".to_owned(),
            counting_view(&disposed, &mut scene),
            ModelUid::next(),
        );
        lists.list_mut(ViewKind::Chart).insert(
            "_ec_s_series.scatter".to_owned(),
            counting_view(&disposed, &mut scene),
            ModelUid::next(),
        );

        lists.dispose_all(&mut scene);
        lists.dispose_all(&mut scene);
        assert_eq!(disposed.get(), 2);
        assert_eq!(lists.view_count(), 0);
        assert!(scene.is_empty());
    }
}
