use std::collections::BTreeSet;

use serde_json::Value;

use super::component_model::{ModelIdentity, ModelNode, ModelState, ModelUid};
use super::level_style::LevelStyleTable;
use super::option::{merge_option, option_bool, option_str, option_usize};
use super::series_data::SeriesData;
use crate::error::ChartResult;

/// How a select-family payload changes selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOp {
    Select,
    Unselect,
    Toggle,
}

/// One series of the model tree with its working data.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesModel {
    identity: ModelIdentity,
    option: Value,
    state: ModelState,
    data: SeriesData,
    levels: LevelStyleTable,
    selected: BTreeSet<usize>,
}

impl SeriesModel {
    pub(crate) fn new(identity: ModelIdentity, option: Value) -> ChartResult<Self> {
        let levels = LevelStyleTable::from_series_option(&option)?;
        let data = SeriesData::from_option(data_option(&option));
        Ok(Self {
            identity,
            option,
            state: ModelState::default(),
            data,
            levels,
            selected: BTreeSet::new(),
        })
    }

    /// Merges a partial option. New `data`/`nodes` replace the raw data and
    /// drop the selection; new `levels` are re-validated.
    pub(crate) fn merge_option(&mut self, option: &Value) -> ChartResult<()> {
        if option.get("levels").is_some() {
            let mut merged = self.option.clone();
            merge_option(&mut merged, option);
            self.levels = LevelStyleTable::from_series_option(&merged)?;
            self.option = merged;
        } else {
            merge_option(&mut self.option, option);
        }
        if data_option(option).is_some() {
            self.data = SeriesData::from_option(data_option(&self.option));
            self.selected.clear();
        }
        Ok(())
    }

    #[must_use]
    pub fn uid(&self) -> ModelUid {
        self.identity.uid
    }

    #[must_use]
    pub fn sub_type(&self) -> &str {
        &self.identity.sub_type
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.identity.id
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.identity.name.as_deref()
    }

    #[must_use]
    pub fn series_index(&self) -> usize {
        self.identity.component_index
    }

    #[must_use]
    pub fn data(&self) -> &SeriesData {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut SeriesData {
        &mut self.data
    }

    #[must_use]
    pub fn levels(&self) -> &LevelStyleTable {
        &self.levels
    }

    /// Name of the coordinate system this series is laid out in, if any.
    #[must_use]
    pub fn coordinate_system(&self) -> Option<&str> {
        option_str(&self.option, "coordinateSystem").filter(|name| *name != "none")
    }

    /// `<axis>Index` binding, 0 when absent.
    #[must_use]
    pub fn axis_index(&self, axis_main_type: &str) -> usize {
        option_usize(&self.option, &format!("{axis_main_type}Index")).unwrap_or(0)
    }

    /// Chunk size for progressive rendering. `Some(0)` disables it.
    #[must_use]
    pub fn progressive(&self) -> Option<usize> {
        match self.option.get("progressive") {
            Some(Value::Bool(false)) => Some(0),
            _ => option_usize(&self.option, "progressive"),
        }
    }

    #[must_use]
    pub fn progressive_threshold(&self) -> Option<usize> {
        option_usize(&self.option, "progressiveThreshold")
    }

    #[must_use]
    pub fn is_silent(&self) -> bool {
        option_bool(&self.option, "silent").unwrap_or(false)
    }

    /// Declared `depth` of a data item (hierarchical series).
    #[must_use]
    pub fn item_depth(&self, index: usize) -> Option<u32> {
        self.data
            .row(index)
            .and_then(|row| row.item_option.as_ref())
            .and_then(|item| item.get("depth"))
            .and_then(Value::as_u64)
            .and_then(|depth| u32::try_from(depth).ok())
    }

    #[must_use]
    pub fn is_selected(&self, data_index: usize) -> bool {
        self.selected.contains(&data_index)
    }

    #[must_use]
    pub fn selected_indices(&self) -> Vec<usize> {
        self.selected.iter().copied().collect()
    }

    pub(crate) fn apply_selection(&mut self, op: SelectOp, data_indices: &[usize]) {
        for index in data_indices {
            match op {
                SelectOp::Select => {
                    self.selected.insert(*index);
                }
                SelectOp::Unselect => {
                    self.selected.remove(index);
                }
                SelectOp::Toggle => {
                    if !self.selected.remove(index) {
                        self.selected.insert(*index);
                    }
                }
            }
        }
    }
}

fn data_option(option: &Value) -> Option<&Value> {
    option
        .get("data")
        .or_else(|| option.get("nodes"))
        .filter(|data| !data.is_null())
}

impl ModelNode for SeriesModel {
    fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    fn option(&self) -> &Value {
        &self.option
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }
}

impl SeriesModel {
    pub(crate) fn set_series_index(&mut self, index: usize) {
        self.identity.component_index = index;
    }

    pub(crate) fn set_name(&mut self, name: Option<String>) {
        self.identity.name = name;
    }
}

#[cfg(test)]
mod tests {
    use super::{SelectOp, SeriesModel};
    use crate::model::component_model::{ModelIdentity, ModelUid};
    use serde_json::json;

    fn series(option: serde_json::Value) -> SeriesModel {
        let identity = ModelIdentity {
            uid: ModelUid::next(),
            main_type: "series".to_owned(),
            sub_type: "scatter".to_owned(),
            id: "s".to_owned(),
            name: None,
            component_index: 0,
        };
        SeriesModel::new(identity, option).expect("series")
    }

    #[test]
    fn merge_replaces_data_only_when_given() {
        let mut model = series(json!({ "data": [[0, 1], [1, 2]], "symbolSize": 4 }));
        model.apply_selection(SelectOp::Select, &[1]);

        model.merge_option(&json!({ "symbolSize": 6 })).expect("merge");
        assert_eq!(model.data().count(), 2);
        assert!(model.is_selected(1));

        model.merge_option(&json!({ "data": [[5, 5]] })).expect("merge");
        assert_eq!(model.data().count(), 1);
        assert!(model.selected_indices().is_empty());
    }

    #[test]
    fn toggle_selection_flips_membership() {
        let mut model = series(json!({ "data": [1, 2, 3] }));
        model.apply_selection(SelectOp::Toggle, &[0, 2]);
        model.apply_selection(SelectOp::Toggle, &[2]);
        assert_eq!(model.selected_indices(), vec![0]);
        model.apply_selection(SelectOp::Unselect, &[0]);
        assert!(model.selected_indices().is_empty());
    }

    #[test]
    fn progressive_false_disables_chunking() {
        assert_eq!(series(json!({ "progressive": false })).progressive(), Some(0));
        assert_eq!(series(json!({ "progressive": 250 })).progressive(), Some(250));
        assert_eq!(series(json!({})).progressive(), None);
        assert!(series(json!({ "coordinateSystem": "none" })).coordinate_system().is_none());
    }
}
