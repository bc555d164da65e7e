use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use tracing::debug;

use super::component_model::{
    ComponentModel, ComponentQuery, ModelIdentity, ModelNode, ModelUid,
};
use super::option::{merge_option, normalize_to_array, option_str, value_to_key};
use super::payload::Payload;
use super::series_model::SeriesModel;
use crate::error::{ChartError, ChartResult};
use crate::render::Color;

const DEFAULT_PALETTE: [&str; 9] = [
    "#5470c6", "#91cc75", "#fac858", "#ee6666", "#73c0de", "#3ba272", "#fc8452", "#9a60b4",
    "#ea7ccc",
];

/// Which top-level option keys are components, and the default options
/// new models start from.
#[derive(Debug, Clone, Default)]
pub struct ModelTypeTable {
    component_types: IndexSet<String>,
    component_defaults: HashMap<String, Value>,
    series_defaults: HashMap<String, Value>,
}

impl ModelTypeTable {
    pub fn register_component(&mut self, main_type: &str, default_option: Option<Value>) {
        self.component_types.insert(main_type.to_owned());
        if let Some(default_option) = default_option {
            self.component_defaults
                .insert(main_type.to_owned(), default_option);
        }
    }

    pub fn register_series(&mut self, sub_type: &str, default_option: Option<Value>) {
        if let Some(default_option) = default_option {
            self.series_defaults
                .insert(sub_type.to_owned(), default_option);
        }
    }

    #[must_use]
    pub fn is_component(&self, main_type: &str) -> bool {
        self.component_types.contains(main_type)
    }

    pub fn component_types(&self) -> impl Iterator<Item = &str> {
        self.component_types.iter().map(String::as_str)
    }
}

/// Merge behavior of one `set_option` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOpts {
    /// Main types merged in replace mode: only id-matched models survive.
    pub replace_merge: Vec<String>,
}

impl MergeOpts {
    fn is_replace(&self, main_type: &str) -> bool {
        self.replace_merge.iter().any(|entry| entry == main_type)
    }
}

#[derive(Debug, Default)]
struct PaletteScope {
    assigned: IndexMap<String, usize>,
}

/// Root of the model tree.
#[derive(Debug, Default)]
pub struct GlobalModel {
    option: serde_json::Map<String, Value>,
    components: IndexMap<String, Vec<ComponentModel>>,
    series: Vec<SeriesModel>,
    filtered_out: HashSet<ModelUid>,
    update_payload: Option<Payload>,
    palette: RefCell<PaletteScope>,
}

struct MappingSlot<'a> {
    existing: Option<&'a ModelIdentity>,
    new_option: Option<Value>,
    brand_new: bool,
}

impl GlobalModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `option` into the tree.
    ///
    /// Component/series lists are matched to existing models by `id`, then
    /// (merge mode) by `name`, then by position; unmatched entries create new
    /// models. Main types listed in `opts.replace_merge` keep only id-matched
    /// models and mark the others' replacements as needing a new view.
    pub fn set_option(
        &mut self,
        option: &Value,
        opts: &MergeOpts,
        types: &ModelTypeTable,
    ) -> ChartResult<()> {
        let Some(fields) = option.as_object() else {
            return Err(ChartError::invalid_option("option", "must be an object"));
        };

        for (key, value) in fields {
            let entries = normalize_to_array(Some(value));
            if key == "series" {
                self.merge_series(entries, opts.is_replace(key), types)?;
            } else if types.is_component(key) {
                self.merge_components(key, entries, opts.is_replace(key), types);
            } else {
                match self.option.get_mut(key) {
                    Some(existing) => merge_option(existing, value),
                    None => {
                        self.option.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        for main_type in &opts.replace_merge {
            if fields.contains_key(main_type) {
                continue;
            }
            if main_type == "series" {
                self.series.clear();
            } else if let Some(list) = self.components.get_mut(main_type) {
                list.clear();
            }
        }

        debug!(
            series_count = self.series.len(),
            component_types = self.components.len(),
            "option merged into model tree"
        );
        Ok(())
    }

    fn merge_series(
        &mut self,
        options: Vec<Value>,
        replace: bool,
        types: &ModelTypeTable,
    ) -> ChartResult<()> {
        let existing_ids: Vec<ModelIdentity> = self
            .series
            .iter()
            .map(|series| series.identity().clone())
            .collect();
        let slots = map_to_existing(&existing_ids, options, replace);
        let ids = assign_ids("series", &slots);

        let mut previous: HashMap<ModelUid, SeriesModel> = self
            .series
            .drain(..)
            .map(|series| (series.uid(), series))
            .collect();
        let mut merged = Vec::with_capacity(slots.len());

        for (slot, id) in slots.iter().zip(ids) {
            let reused = slot
                .existing
                .and_then(|identity| previous.remove(&identity.uid));
            let Some(new_option) = &slot.new_option else {
                if let Some(series) = reused {
                    merged.push(series);
                }
                continue;
            };

            let index = merged.len();
            let sub_type = option_str(new_option, "type")
                .map(str::to_owned)
                .or_else(|| reused.as_ref().map(|series| series.sub_type().to_owned()))
                .ok_or_else(|| {
                    ChartError::invalid_option(format!("series[{index}].type"), "is required")
                })?;
            let name = option_name(new_option)
                .or_else(|| reused.as_ref().and_then(|series| series.name().map(str::to_owned)));

            match reused {
                Some(mut series) if series.sub_type() == sub_type => {
                    series.merge_option(new_option)?;
                    series.set_name(name);
                    merged.push(series);
                }
                _ => {
                    let mut option = types
                        .series_defaults
                        .get(&sub_type)
                        .cloned()
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                    merge_option(&mut option, new_option);
                    let identity = ModelIdentity {
                        uid: ModelUid::next(),
                        main_type: "series".to_owned(),
                        sub_type,
                        id,
                        name,
                        component_index: index,
                    };
                    let mut series = SeriesModel::new(identity, option)?;
                    series.state_mut().require_new_view = slot.brand_new;
                    merged.push(series);
                }
            }
        }

        for (index, series) in merged.iter_mut().enumerate() {
            series.set_series_index(index);
        }
        self.series = merged;
        Ok(())
    }

    fn merge_components(
        &mut self,
        main_type: &str,
        options: Vec<Value>,
        replace: bool,
        types: &ModelTypeTable,
    ) {
        let current = self.components.shift_remove(main_type).unwrap_or_default();
        let existing_ids: Vec<ModelIdentity> = current
            .iter()
            .map(|component| component.identity().clone())
            .collect();
        let slots = map_to_existing(&existing_ids, options, replace);
        let ids = assign_ids(main_type, &slots);

        let mut previous: HashMap<ModelUid, ComponentModel> = current
            .into_iter()
            .map(|component| (component.uid(), component))
            .collect();
        let mut merged: Vec<ComponentModel> = Vec::with_capacity(slots.len());

        for (slot, id) in slots.iter().zip(ids) {
            let reused = slot
                .existing
                .and_then(|identity| previous.remove(&identity.uid));
            let Some(new_option) = &slot.new_option else {
                if let Some(component) = reused {
                    merged.push(component);
                }
                continue;
            };

            let sub_type = option_str(new_option, "type")
                .map(str::to_owned)
                .or_else(|| reused.as_ref().map(|model| model.sub_type().to_owned()))
                .unwrap_or_default();
            let name = option_name(new_option)
                .or_else(|| reused.as_ref().and_then(|model| model.name().map(str::to_owned)));

            match reused {
                Some(mut component) if component.sub_type() == sub_type => {
                    component.merge_option(new_option);
                    component.set_name(name);
                    merged.push(component);
                }
                _ => {
                    let mut option = types
                        .component_defaults
                        .get(main_type)
                        .cloned()
                        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
                    merge_option(&mut option, new_option);
                    let identity = ModelIdentity {
                        uid: ModelUid::next(),
                        main_type: main_type.to_owned(),
                        sub_type,
                        id,
                        name,
                        component_index: merged.len(),
                    };
                    let mut component = ComponentModel::new(identity, option);
                    component.state_mut().require_new_view = slot.brand_new;
                    merged.push(component);
                }
            }
        }

        for (index, component) in merged.iter_mut().enumerate() {
            component.set_component_index(index);
        }
        self.components.insert(main_type.to_owned(), merged);
    }

    /// Root-level option value (`backgroundColor`, `color`...).
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.option.get(key).filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn series(&self) -> &[SeriesModel] {
        &self.series
    }

    pub(crate) fn series_mut(&mut self) -> &mut [SeriesModel] {
        &mut self.series
    }

    #[must_use]
    pub fn series_by_index(&self, index: usize) -> Option<&SeriesModel> {
        self.series.get(index)
    }

    #[must_use]
    pub fn series_by_uid(&self, uid: ModelUid) -> Option<&SeriesModel> {
        self.series.iter().find(|series| series.uid() == uid)
    }

    #[must_use]
    pub fn series_position(&self, uid: ModelUid) -> Option<usize> {
        self.series.iter().position(|series| series.uid() == uid)
    }

    /// Series not filtered out by a series-filter processor.
    pub fn each_series(&self) -> impl Iterator<Item = &SeriesModel> {
        self.series
            .iter()
            .filter(|series| !self.filtered_out.contains(&series.uid()))
    }

    #[must_use]
    pub fn is_series_filtered(&self, uid: ModelUid) -> bool {
        self.filtered_out.contains(&uid)
    }

    pub(crate) fn filter_out_series(&mut self, uid: ModelUid) {
        self.filtered_out.insert(uid);
    }

    #[must_use]
    pub fn components(&self, main_type: &str) -> &[ComponentModel] {
        self.components
            .get(main_type)
            .map_or(&[], |list| list.as_slice())
    }

    /// Every component (series excluded), grouped by main type in the order
    /// main types first appeared.
    pub fn all_components(&self) -> impl Iterator<Item = &ComponentModel> {
        self.components.values().flatten()
    }

    pub(crate) fn all_components_mut(&mut self) -> impl Iterator<Item = &mut ComponentModel> {
        self.components.values_mut().flatten()
    }

    #[must_use]
    pub fn component_by_uid(&self, uid: ModelUid) -> Option<&ComponentModel> {
        self.all_components().find(|component| component.uid() == uid)
    }

    /// Models matched by `query`, series included when it targets `series`.
    #[must_use]
    pub fn query_models(&self, query: &ComponentQuery) -> Vec<ModelUid> {
        if query.main_type() == "series" {
            self.series
                .iter()
                .filter(|series| query.matches(series.identity()))
                .map(SeriesModel::uid)
                .collect()
        } else {
            self.components(query.main_type())
                .iter()
                .filter(|component| query.matches(component.identity()))
                .map(ComponentModel::uid)
                .collect()
        }
    }

    /// Clears series filtering and returns the series whose data must be
    /// restored: those targeted by the payload's `series*` fields, or all.
    pub fn restore_data(&mut self, payload: Option<&Payload>) -> Vec<ModelUid> {
        self.filtered_out.clear();
        let query = payload.map(|payload| ComponentQuery::from_fields("series", payload.body()));
        self.series
            .iter()
            .filter(|series| {
                query
                    .as_ref()
                    .is_none_or(|query| query.is_unconstrained() || query.matches(series.identity()))
            })
            .map(SeriesModel::uid)
            .collect()
    }

    pub fn set_update_payload(&mut self, payload: Option<Payload>) {
        self.update_payload = payload;
    }

    #[must_use]
    pub fn update_payload(&self) -> Option<&Payload> {
        self.update_payload.as_ref()
    }

    /// Color for `key` from the `color` option (or the default palette);
    /// the same key keeps its color until the palette is cleared.
    #[must_use]
    pub fn color_from_palette(&self, key: &str) -> Color {
        let palette: Vec<Color> = self
            .get("color")
            .and_then(Value::as_array)
            .map(|colors| {
                colors
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(Color::from_hex)
                    .collect()
            })
            .filter(|colors: &Vec<Color>| !colors.is_empty())
            .unwrap_or_else(|| {
                DEFAULT_PALETTE
                    .iter()
                    .filter_map(|hex| Color::from_hex(hex))
                    .collect()
            });

        let mut scope = self.palette.borrow_mut();
        let next = scope.assigned.len();
        let slot = *scope.assigned.entry(key.to_owned()).or_insert(next);
        palette
            .get(slot % palette.len().max(1))
            .copied()
            .unwrap_or(Color::rgb(0.0, 0.0, 0.0))
    }

    pub fn clear_color_palette(&self) {
        self.palette.borrow_mut().assigned.clear();
    }
}

fn option_name(option: &Value) -> Option<String> {
    option.get("name").and_then(value_to_key)
}

fn option_id(option: &Value) -> Option<String> {
    option.get("id").and_then(value_to_key)
}

fn map_to_existing(
    existing: &[ModelIdentity],
    options: Vec<Value>,
    replace: bool,
) -> Vec<MappingSlot<'_>> {
    let new_ids: HashSet<String> = options.iter().filter_map(option_id).collect();
    let mut slots: Vec<MappingSlot<'_>> = existing
        .iter()
        .map(|identity| MappingSlot {
            existing: (!replace || new_ids.contains(&identity.id)).then_some(identity),
            new_option: None,
            brand_new: false,
        })
        .collect();
    let mut pending: Vec<Option<Value>> = options.into_iter().map(Some).collect();

    // By id.
    for entry in &mut pending {
        let Some(id) = entry.as_ref().and_then(option_id) else {
            continue;
        };
        if let Some(slot) = slots.iter_mut().find(|slot| {
            slot.new_option.is_none() && slot.existing.is_some_and(|existing| existing.id == id)
        }) {
            slot.new_option = entry.take();
        }
    }

    // By name, merge mode only.
    if !replace {
        for entry in &mut pending {
            let Some(option) = entry.as_ref() else {
                continue;
            };
            if option_id(option).is_some() {
                continue;
            }
            let Some(name) = option_name(option) else {
                continue;
            };
            if let Some(slot) = slots.iter_mut().find(|slot| {
                slot.new_option.is_none()
                    && slot
                        .existing
                        .is_some_and(|existing| existing.name.as_deref() == Some(name.as_str()))
            }) {
                slot.new_option = entry.take();
            }
        }
    }

    // By position: first slot not yet taken whose existing id does not
    // contradict an explicit id.
    for entry in &mut pending {
        let Some(option) = entry.take() else {
            continue;
        };
        let explicit_id = option_id(&option);
        let target = slots.iter_mut().find(|slot| {
            slot.new_option.is_none()
                && match (slot.existing, &explicit_id) {
                    (Some(existing), Some(id)) => existing.id == *id,
                    _ => true,
                }
        });
        match target {
            Some(slot) => {
                slot.new_option = Some(option);
                slot.brand_new = replace;
            }
            None => slots.push(MappingSlot {
                existing: None,
                new_option: Some(option),
                brand_new: replace,
            }),
        }
    }

    slots
}

/// Explicit id, else the matched model's id, else `\0<name>\0<n>` with the
/// first free `n`. Unnamed entries use `<main type>\0<position>` as name.
fn assign_ids(main_type: &str, slots: &[MappingSlot<'_>]) -> Vec<String> {
    let mut ids: Vec<Option<String>> = slots
        .iter()
        .map(|slot| {
            slot.new_option
                .as_ref()
                .and_then(option_id)
                .or_else(|| slot.existing.map(|existing| existing.id.clone()))
        })
        .collect();
    let mut taken: HashSet<String> = ids.iter().flatten().cloned().collect();

    for (position, (slot, id)) in slots.iter().zip(ids.iter_mut()).enumerate() {
        if id.is_some() {
            continue;
        }
        let name = slot
            .new_option
            .as_ref()
            .and_then(option_name)
            .unwrap_or_else(|| format!("{main_type}\0{position}"));
        let mut counter = 0usize;
        let generated = loop {
            let candidate = format!("\0{name}\0{counter}");
            if !taken.contains(&candidate) {
                break candidate;
            }
            counter += 1;
        };
        taken.insert(generated.clone());
        *id = Some(generated);
    }

    ids.into_iter().map(Option::unwrap_or_default).collect()
}

#[cfg(test)]
mod tests {
    use super::{GlobalModel, MergeOpts, ModelTypeTable};
    use crate::error::ChartError;
    use crate::model::ModelNode;
    use crate::model::payload::Payload;
    use serde_json::json;

    fn types() -> ModelTypeTable {
        let mut types = ModelTypeTable::default();
        types.register_component("xAxis", None);
        types.register_series("scatter", Some(json!({ "coordinateSystem": "cartesian2d" })));
        types
    }

    #[test]
    fn merge_keeps_identity_for_positional_series() {
        let mut model = GlobalModel::new();
        let types = types();
        model
            .set_option(
                &json!({ "series": [{ "type": "scatter", "data": [1] }, { "type": "line" }] }),
                &MergeOpts::default(),
                &types,
            )
            .expect("first");
        let first_uid = model.series()[0].uid();
        let first_id = model.series()[0].id().to_owned();

        model
            .set_option(
                &json!({ "series": [{ "symbolSize": 3 }] }),
                &MergeOpts::default(),
                &types,
            )
            .expect("second");

        assert_eq!(model.series().len(), 2);
        assert_eq!(model.series()[0].uid(), first_uid);
        assert_eq!(model.series()[0].id(), first_id);
        assert_eq!(model.series()[0].get("symbolSize"), Some(&json!(3)));
        assert_eq!(
            model.series()[0].get("coordinateSystem"),
            Some(&json!("cartesian2d"))
        );
    }

    #[test]
    fn type_change_with_same_id_creates_new_model() {
        let mut model = GlobalModel::new();
        let types = types();
        let opts = MergeOpts::default();
        model
            .set_option(&json!({ "series": { "id": "a", "type": "scatter" } }), &opts, &types)
            .expect("first");
        let before = model.series()[0].uid();
        model
            .set_option(&json!({ "series": { "id": "a", "type": "line" } }), &opts, &types)
            .expect("second");

        assert_ne!(model.series()[0].uid(), before);
        assert_eq!(model.series()[0].id(), "a");
        assert_eq!(model.series()[0].identity().view_id(), "_ec_a_series.line");
    }

    #[test]
    fn replace_merge_keeps_only_id_matched_models() {
        let mut model = GlobalModel::new();
        let types = types();
        model
            .set_option(
                &json!({ "series": [
                    { "id": "a", "type": "scatter" },
                    { "id": "b", "type": "scatter" }
                ] }),
                &MergeOpts::default(),
                &types,
            )
            .expect("first");
        let kept = model.series()[1].uid();

        model
            .set_option(
                &json!({ "series": [{ "id": "b" }, { "type": "scatter", "name": "c" }] }),
                &MergeOpts {
                    replace_merge: vec!["series".to_owned()],
                },
                &types,
            )
            .expect("replace");

        let ids: Vec<&str> = model.series().iter().map(|series| series.id()).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"b"));
        assert!(!ids.contains(&"a"));
        let b = model.series().iter().find(|series| series.id() == "b").expect("b");
        assert_eq!(b.uid(), kept);
        assert!(!b.state().require_new_view);
        let c = model
            .series()
            .iter()
            .find(|series| series.name() == Some("c"))
            .expect("c");
        assert!(c.state().require_new_view);
    }

    #[test]
    fn series_without_type_is_a_configuration_error() {
        let mut model = GlobalModel::new();
        let err = model
            .set_option(&json!({ "series": [{}] }), &MergeOpts::default(), &types())
            .expect_err("missing type");
        assert!(matches!(err, ChartError::InvalidOption { ref path, .. } if path == "series[0].type"));
    }

    #[test]
    fn generated_ids_are_unique_and_name_based() {
        let mut model = GlobalModel::new();
        model
            .set_option(
                &json!({ "series": [
                    { "type": "scatter", "name": "n" },
                    { "type": "scatter", "name": "n" },
                    { "type": "scatter" }
                ] }),
                &MergeOpts::default(),
                &types(),
            )
            .expect("set");
        let ids: Vec<&str> = model.series().iter().map(|series| series.id()).collect();
        assert_eq!(ids[0], "\0n\00");
        assert_eq!(ids[1], "\0n\01");
        assert_ne!(ids[2], ids[0]);
    }

    #[test]
    fn restore_data_targets_payload_series() {
        let mut model = GlobalModel::new();
        model
            .set_option(
                &json!({ "series": [{ "type": "scatter" }, { "type": "scatter" }] }),
                &MergeOpts::default(),
                &types(),
            )
            .expect("set");
        let second = model.series()[1].uid();
        model.filter_out_series(second);
        assert_eq!(model.each_series().count(), 1);

        let targeted = model.restore_data(Some(&Payload::new("x").with("seriesIndex", 1)));
        assert_eq!(targeted, vec![second]);
        assert_eq!(model.each_series().count(), 2);
        assert_eq!(model.restore_data(None).len(), 2);
    }

    #[test]
    fn palette_is_stable_per_key_until_cleared() {
        let mut model = GlobalModel::new();
        model
            .set_option(&json!({ "color": ["#ff0000", "#00ff00"] }), &MergeOpts::default(), &types())
            .expect("set");
        let a = model.color_from_palette("a");
        let b = model.color_from_palette("b");
        assert_ne!(a, b);
        assert_eq!(model.color_from_palette("a"), a);
        model.clear_color_palette();
        assert_eq!(model.color_from_palette("b"), a);
    }
}
