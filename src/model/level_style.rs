use std::collections::BTreeMap;

use serde_json::Value;

use super::option::{merge_option, option_at};
use crate::error::{ChartError, ChartResult};

/// Per-depth option overrides of a hierarchical series (`levels`).
///
/// An item's effective option is resolved along a fixed chain:
/// series option, then the level override for the item's depth, then the
/// item's own option. Later links win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelStyleTable {
    levels: BTreeMap<u32, Value>,
}

impl LevelStyleTable {
    /// Reads `levels` from a series option. Every level must carry a
    /// non-negative integer `depth`.
    pub fn from_series_option(option: &Value) -> ChartResult<Self> {
        let mut levels = BTreeMap::new();
        let Some(entries) = option.get("levels").and_then(Value::as_array) else {
            return Ok(Self { levels });
        };

        for (position, level) in entries.iter().enumerate() {
            let depth = level
                .get("depth")
                .and_then(Value::as_u64)
                .and_then(|depth| u32::try_from(depth).ok())
                .ok_or_else(|| {
                    ChartError::invalid_option(
                        format!("levels[{position}].depth"),
                        "is mandatory and must be a natural number",
                    )
                })?;
            levels.insert(depth, level.clone());
        }
        Ok(Self { levels })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    #[must_use]
    pub fn level(&self, depth: u32) -> Option<&Value> {
        self.levels.get(&depth)
    }

    /// First value found for `path` walking item -> level -> series.
    #[must_use]
    pub fn resolve<'a>(
        &'a self,
        series_option: &'a Value,
        depth: Option<u32>,
        item_option: Option<&'a Value>,
        path: &[&str],
    ) -> Option<&'a Value> {
        item_option
            .and_then(|item| option_at(item, path))
            .or_else(|| {
                depth
                    .and_then(|depth| self.level(depth))
                    .and_then(|level| option_at(level, path))
            })
            .or_else(|| option_at(series_option, path))
    }

    /// Merged object for `key` (e.g. `itemStyle`) across the whole chain.
    #[must_use]
    pub fn resolve_object(
        &self,
        series_option: &Value,
        depth: Option<u32>,
        item_option: Option<&Value>,
        key: &str,
    ) -> Value {
        let mut resolved = Value::Object(serde_json::Map::new());
        let level = depth.and_then(|depth| self.level(depth));
        for link in [Some(series_option), level, item_option].into_iter().flatten() {
            if let Some(section) = link.get(key).filter(|section| section.is_object()) {
                merge_option(&mut resolved, section);
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::LevelStyleTable;
    use crate::error::ChartError;
    use serde_json::json;

    fn series() -> serde_json::Value {
        json!({
            "itemStyle": { "color": "#111111", "borderWidth": 1 },
            "levels": [
                { "depth": 1, "itemStyle": { "color": "#222222" } },
                { "depth": 0, "itemStyle": { "borderWidth": 3 } }
            ]
        })
    }

    #[test]
    fn item_overrides_level_overrides_series() {
        let option = series();
        let table = LevelStyleTable::from_series_option(&option).expect("levels");
        let item = json!({ "itemStyle": { "borderWidth": 9 } });

        let color = table.resolve(&option, Some(1), Some(&item), &["itemStyle", "color"]);
        assert_eq!(color, Some(&json!("#222222")));
        let width = table.resolve(&option, Some(1), Some(&item), &["itemStyle", "borderWidth"]);
        assert_eq!(width, Some(&json!(9)));
        let fallback = table.resolve(&option, Some(7), None, &["itemStyle", "color"]);
        assert_eq!(fallback, Some(&json!("#111111")));

        let merged = table.resolve_object(&option, Some(0), None, "itemStyle");
        assert_eq!(merged, json!({ "color": "#111111", "borderWidth": 3 }));
    }

    #[test]
    fn level_without_natural_depth_is_a_configuration_error() {
        let option = json!({ "levels": [{ "depth": 0 }, { "depth": -1 }] });
        let err = LevelStyleTable::from_series_option(&option).expect_err("negative depth");
        assert!(matches!(err, ChartError::InvalidOption { ref path, .. } if path == "levels[1].depth"));

        let missing = json!({ "levels": [{ "itemStyle": {} }] });
        assert!(LevelStyleTable::from_series_option(&missing).is_err());
    }
}
