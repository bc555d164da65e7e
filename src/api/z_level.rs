use ordered_float::OrderedFloat;
use tracing::trace;

use crate::model::{GlobalModel, ModelNode, ModelUid};

#[derive(Debug, Clone)]
struct ZLevelEntry {
    uid: ModelUid,
    is_series: bool,
    zlevel: i32,
    z: f64,
    key: Option<String>,
}

impl ZLevelEntry {
    fn of(node: &dyn ModelNode, is_series: bool) -> Self {
        Self {
            uid: node.identity().uid,
            is_series,
            zlevel: node.zlevel(),
            z: node.z(),
            key: node.zlevel_key().map(str::to_owned),
        }
    }
}

/// Assigns the z-level every view paints on.
///
/// Without any `zlevelKey` the declared `zlevel` is used as is. Otherwise
/// components then series are stably sorted by `(zlevel, z)` and walked in
/// order: levels never decrease, and two different keys (or a keyed and an
/// unkeyed model) never end up on the same level.
pub(super) fn allocate_zlevels(model: &mut GlobalModel) {
    let mut entries: Vec<ZLevelEntry> = model
        .all_components()
        .map(|component| ZLevelEntry::of(component, false))
        .chain(
            model
                .series()
                .iter()
                .map(|series| ZLevelEntry::of(series, true)),
        )
        .collect();

    let has_separate_zlevel = entries.iter().any(|entry| entry.key.is_some());
    if has_separate_zlevel {
        entries.sort_by_key(|entry| (entry.zlevel, OrderedFloat(entry.z)));

        let mut last_zlevel: Option<i32> = None;
        let mut last_key: Option<String> = None;
        for entry in &mut entries {
            let mut zlevel = last_zlevel.map_or(entry.zlevel, |last| last.max(entry.zlevel));
            match &entry.key {
                Some(key) => {
                    if Some(zlevel) == last_zlevel && last_key.as_ref() != Some(key) {
                        zlevel += 1;
                    }
                    last_key = Some(key.clone());
                }
                None => {
                    if last_key.is_some() {
                        if Some(zlevel) == last_zlevel {
                            zlevel += 1;
                        }
                        last_key = None;
                    }
                }
            }
            last_zlevel = Some(zlevel);
            entry.zlevel = zlevel;
        }
        trace!(model_count = entries.len(), "separate z-levels allocated");
    }

    for entry in entries {
        if entry.is_series {
            if let Some(series) = model
                .series_mut()
                .iter_mut()
                .find(|series| series.uid() == entry.uid)
            {
                series.state_mut().assigned_zlevel = entry.zlevel;
            }
        } else if let Some(component) = model
            .all_components_mut()
            .find(|component| component.uid() == entry.uid)
        {
            component.state_mut().assigned_zlevel = entry.zlevel;
        }
    }
}
