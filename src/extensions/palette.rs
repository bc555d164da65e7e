use std::ops::Range;

use serde_json::Value;

use crate::error::ChartResult;
use crate::model::option::option_at;
use crate::model::{GlobalModel, ModelNode, SeriesData, SeriesModel, VisualPatch};
use crate::pipeline::{SeriesStageHandler, StageContext, StageHandlerInfo, StageReset};
use crate::render::Color;

/// Series color from `itemStyle.color`, else from the global palette keyed
/// by series name; items may override it with their own `itemStyle.color`.
#[derive(Debug)]
pub struct SeriesPaletteVisual {
    info: StageHandlerInfo,
}

impl Default for SeriesPaletteVisual {
    fn default() -> Self {
        Self {
            info: StageHandlerInfo::new("series-palette").on_raw_series(),
        }
    }
}

fn item_color(data: &SeriesData, index: usize) -> Option<Color> {
    data.row(index)
        .and_then(|row| row.item_option.as_ref())
        .and_then(|item| option_at(item, &["itemStyle", "color"]))
        .and_then(Value::as_str)
        .and_then(Color::from_hex)
}

impl SeriesStageHandler for SeriesPaletteVisual {
    fn info(&self) -> &StageHandlerInfo {
        &self.info
    }

    fn reset(
        &self,
        series: &SeriesModel,
        model: &GlobalModel,
        _ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset> {
        let declared = option_at(series.option(), &["itemStyle", "color"])
            .and_then(Value::as_str)
            .and_then(Color::from_hex);
        let color = declared.unwrap_or_else(|| {
            model.color_from_palette(series.name().unwrap_or_else(|| series.id()))
        });

        let mut patch = VisualPatch::new();
        patch.insert("color".to_owned(), Value::String(color.to_hex()));
        if let Some(size) = series.option().get("symbolSize").filter(|size| size.is_number()) {
            patch.insert("symbolSize".to_owned(), size.clone());
        }

        Ok(StageReset::none()
            .with_patch(patch)
            .with_progress(|range: Range<usize>, data: &mut SeriesData| -> ChartResult<()> {
                for index in range {
                    let Some(color) = item_color(data, index) else {
                        continue;
                    };
                    if let Some(visual) = data.item_visual_mut(index) {
                        visual.color = Some(color);
                    }
                }
                Ok(())
            }))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::SeriesPaletteVisual;
    use crate::api::ExtensionApi;
    use crate::coord::CoordinateSystemManager;
    use crate::core::Viewport;
    use crate::model::{GlobalModel, MergeOpts, ModelTypeTable};
    use crate::pipeline::{SeriesStageHandler, StageContext};

    #[test]
    fn declared_color_wins_over_palette() {
        let mut types = ModelTypeTable::default();
        types.register_series("scatter", None);
        let mut model = GlobalModel::new();
        model
            .set_option(
                &json!({ "series": [
                    { "type": "scatter", "name": "a" },
                    { "type": "scatter", "name": "b", "itemStyle": { "color": "#112233" } }
                ] }),
                &MergeOpts::default(),
                &types,
            )
            .expect("option");

        let api = ExtensionApi::new(Viewport::new(100, 100));
        let systems = CoordinateSystemManager::new();
        let ctx = StageContext {
            payload: None,
            api: &api,
            viewport: Viewport::new(100, 100),
            coordinate_systems: &systems,
        };
        let handler = SeriesPaletteVisual::default();
        let first = handler.reset(&model.series()[0], &model, &ctx).expect("reset");
        let second = handler.reset(&model.series()[1], &model, &ctx).expect("reset");

        let first_patch = first.patch.expect("patch");
        assert_eq!(first_patch.get("color"), Some(&json!("#5470c6")));
        let second_patch = second.patch.expect("patch");
        assert_eq!(second_patch.get("color"), Some(&json!("#112233")));
    }
}
