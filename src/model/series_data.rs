use indexmap::IndexMap;
use serde_json::Value;
use smallvec::SmallVec;

use crate::core::{Point, Rect};
use crate::render::Color;

pub type DataValues = SmallVec<[f64; 4]>;

/// Series-level visual values keyed by visual name (`color`, `symbolSize`...).
pub type VisualPatch = IndexMap<String, Value>;

/// One raw data item as given in `series.data`.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRow {
    pub values: DataValues,
    pub name: Option<String>,
    pub item_option: Option<Value>,
}

impl DataRow {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        Self {
            values: values.into_iter().collect(),
            name: None,
            item_option: None,
        }
    }

    /// Accepts `n`, `[x, y, ..]`, `"name"` or `{ value, name, .. }`.
    /// Unparseable dimensions become `NaN`.
    #[must_use]
    pub fn from_option(item: &Value) -> Self {
        match item {
            Value::Object(fields) => {
                let mut row = fields
                    .get("value")
                    .map_or_else(|| Self::new([]), Self::from_option);
                row.name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                row.item_option = Some(item.clone());
                row
            }
            Value::Array(values) => Self::new(values.iter().map(dimension_value)),
            Value::String(name) => Self {
                values: DataValues::new(),
                name: Some(name.clone()),
                item_option: None,
            },
            other => Self::new([dimension_value(other)]),
        }
    }

    #[must_use]
    pub fn value(&self, dim: usize) -> f64 {
        self.values.get(dim).copied().unwrap_or(f64::NAN)
    }
}

fn dimension_value(value: &Value) -> f64 {
    match value {
        Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
        Value::String(text) => text.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Pixel placement computed by layout handlers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemLayout {
    Point(Point),
    Rect(Rect),
}

/// Per-item visual encoding computed by visual handlers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ItemVisual {
    pub color: Option<Color>,
    pub symbol_size: Option<f64>,
    pub opacity: Option<f64>,
}

/// Working data of one series: raw rows plus a filtered index view and the
/// layout/visual columns computed over it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesData {
    raw: Vec<DataRow>,
    indices: Vec<usize>,
    synced_raw_end: usize,
    layouts: Vec<Option<ItemLayout>>,
    item_visuals: Vec<ItemVisual>,
    visual: VisualPatch,
}

impl SeriesData {
    #[must_use]
    pub fn from_rows(rows: Vec<DataRow>) -> Self {
        let mut data = Self {
            raw: rows,
            ..Self::default()
        };
        data.restore();
        data
    }

    #[must_use]
    pub fn from_option(data: Option<&Value>) -> Self {
        let rows = match data {
            Some(Value::Array(items)) => items.iter().map(DataRow::from_option).collect(),
            _ => Vec::new(),
        };
        Self::from_rows(rows)
    }

    #[must_use]
    pub fn raw_count(&self) -> usize {
        self.raw.len()
    }

    /// Items visible after filtering.
    #[must_use]
    pub fn count(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Drops filtering and every computed layout/visual.
    pub fn restore(&mut self) {
        let count = self.raw.len();
        self.indices = (0..count).collect();
        self.synced_raw_end = count;
        self.layouts = vec![None; count];
        self.item_visuals = vec![ItemVisual::default(); count];
        self.visual.clear();
    }

    /// Exposes raw rows appended after the last restore, up to `raw_end`.
    pub fn sync_from_raw(&mut self, raw_end: usize) {
        let raw_end = raw_end.min(self.raw.len());
        while self.synced_raw_end < raw_end {
            self.indices.push(self.synced_raw_end);
            self.layouts.push(None);
            self.item_visuals.push(ItemVisual::default());
            self.synced_raw_end += 1;
        }
    }

    pub fn append_rows(&mut self, rows: impl IntoIterator<Item = DataRow>) {
        self.raw.extend(rows);
    }

    /// Keeps items matching `keep`; layout/visual columns follow.
    pub fn filter_self(&mut self, mut keep: impl FnMut(&DataRow) -> bool) {
        let mut write = 0;
        for read in 0..self.indices.len() {
            if keep(&self.raw[self.indices[read]]) {
                self.indices.swap(write, read);
                self.layouts.swap(write, read);
                self.item_visuals.swap(write, read);
                write += 1;
            }
        }
        self.indices.truncate(write);
        self.layouts.truncate(write);
        self.item_visuals.truncate(write);
    }

    #[must_use]
    pub fn row(&self, index: usize) -> Option<&DataRow> {
        self.indices.get(index).map(|raw| &self.raw[*raw])
    }

    #[must_use]
    pub fn raw_index(&self, index: usize) -> Option<usize> {
        self.indices.get(index).copied()
    }

    #[must_use]
    pub fn value(&self, index: usize, dim: usize) -> f64 {
        self.row(index).map_or(f64::NAN, |row| row.value(dim))
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&str> {
        self.row(index).and_then(|row| row.name.as_deref())
    }

    /// Finite `(min, max)` of one dimension over the visible items.
    #[must_use]
    pub fn extent(&self, dim: usize) -> Option<(f64, f64)> {
        self.indices
            .iter()
            .map(|raw| self.raw[*raw].value(dim))
            .filter(|value| value.is_finite())
            .fold(None, |extent, value| match extent {
                None => Some((value, value)),
                Some((min, max)) => Some((min.min(value), max.max(value))),
            })
    }

    pub fn set_item_layout(&mut self, index: usize, layout: ItemLayout) {
        if let Some(slot) = self.layouts.get_mut(index) {
            *slot = Some(layout);
        }
    }

    #[must_use]
    pub fn item_layout(&self, index: usize) -> Option<ItemLayout> {
        self.layouts.get(index).copied().flatten()
    }

    #[must_use]
    pub fn item_visual(&self, index: usize) -> ItemVisual {
        self.item_visuals.get(index).copied().unwrap_or_default()
    }

    pub fn item_visual_mut(&mut self, index: usize) -> Option<&mut ItemVisual> {
        self.item_visuals.get_mut(index)
    }

    #[must_use]
    pub fn visual(&self, key: &str) -> Option<&Value> {
        self.visual.get(key)
    }

    pub fn set_visual(&mut self, key: impl Into<String>, value: Value) {
        self.visual.insert(key.into(), value);
    }

    pub fn apply_patch(&mut self, patch: &VisualPatch) {
        for (key, value) in patch {
            self.visual.insert(key.clone(), value.clone());
        }
    }

    /// Series-level `color` visual parsed as a [`Color`].
    #[must_use]
    pub fn visual_color(&self) -> Option<Color> {
        self.visual("color")
            .and_then(Value::as_str)
            .and_then(Color::from_hex)
    }

    pub fn clear_all_visual(&mut self) {
        self.visual.clear();
        self.item_visuals.fill(ItemVisual::default());
    }
}

#[cfg(test)]
mod tests {
    use super::{DataRow, ItemLayout, SeriesData};
    use crate::core::Point;
    use serde_json::json;

    #[test]
    fn rows_parse_every_item_shape() {
        let data = SeriesData::from_option(Some(&json!([
            3,
            [1, 2],
            { "value": [4, 5], "name": "p" },
            "label",
            [null, "7"]
        ])));
        assert_eq!(data.count(), 5);
        assert_eq!(data.value(0, 0), 3.0);
        assert_eq!(data.value(1, 1), 2.0);
        assert_eq!(data.name(2), Some("p"));
        assert!(data.row(2).and_then(|row| row.item_option.as_ref()).is_some());
        assert_eq!(data.name(3), Some("label"));
        assert!(data.value(4, 0).is_nan());
        assert_eq!(data.value(4, 1), 7.0);
    }

    #[test]
    fn filter_keeps_columns_aligned_and_restore_resets() {
        let mut data = SeriesData::from_rows((0..6).map(|i| DataRow::new([f64::from(i)])).collect());
        for index in 0..data.count() {
            data.set_item_layout(index, ItemLayout::Point(Point::new(index as f64, 0.0)));
        }
        data.filter_self(|row| row.value(0) as i64 % 2 == 0);

        assert_eq!(data.count(), 3);
        assert_eq!(data.raw_index(2), Some(4));
        assert_eq!(
            data.item_layout(2),
            Some(ItemLayout::Point(Point::new(4.0, 0.0)))
        );

        data.restore();
        assert_eq!(data.count(), 6);
        assert_eq!(data.item_layout(0), None);
    }

    #[test]
    fn appended_rows_surface_only_after_sync() {
        let mut data = SeriesData::from_rows(vec![DataRow::new([1.0])]);
        data.append_rows([DataRow::new([2.0]), DataRow::new([3.0])]);
        assert_eq!((data.raw_count(), data.count()), (3, 1));

        data.sync_from_raw(2);
        assert_eq!(data.count(), 2);
        data.sync_from_raw(10);
        assert_eq!(data.count(), 3);
        assert_eq!(data.extent(0), Some((1.0, 3.0)));
    }
}
