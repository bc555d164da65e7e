//! The `default` loading effect: a translucent mask over the whole viewport
//! with a spinner dot and a label at its center.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::core::Viewport;
use crate::render::{
    CirclePrimitive, Color, Element, Group, RectPrimitive, Shape, TextHAlign, TextPrimitive,
};

pub const DEFAULT_LOADING: &str = "default";

/// Group z of the loading overlay; above every built-in view.
pub const LOADING_Z: f64 = 10_000.0;

const MASK_ALPHA: f64 = 0.8;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct DefaultLoadingConfig {
    text: String,
    text_color: String,
    font_size: f64,
    mask_color: String,
    color: String,
    show_spinner: bool,
    spinner_radius: f64,
    zlevel: i32,
}

impl Default for DefaultLoadingConfig {
    fn default() -> Self {
        Self {
            text: "loading".to_owned(),
            text_color: "#000000".to_owned(),
            font_size: 12.0,
            mask_color: "#ffffff".to_owned(),
            color: "#5470c6".to_owned(),
            show_spinner: true,
            spinner_radius: 10.0,
            zlevel: 0,
        }
    }
}

fn parse_config(cfg: &Value) -> DefaultLoadingConfig {
    if cfg.is_null() {
        return DefaultLoadingConfig::default();
    }
    serde_json::from_value(cfg.clone()).unwrap_or_else(|error| {
        warn!(%error, "invalid loading config; using defaults");
        DefaultLoadingConfig::default()
    })
}

fn color_or(hex: &str, fallback: Color) -> Color {
    Color::from_hex(hex).unwrap_or(fallback)
}

/// Builds the overlay for `viewport`. Unparseable colors fall back to the
/// defaults.
#[must_use]
pub fn default_loading(cfg: &Value, viewport: Viewport) -> Group {
    let config = parse_config(cfg);
    let width = f64::from(viewport.width);
    let height = f64::from(viewport.height);
    let center_x = width / 2.0;
    let center_y = height / 2.0;

    let mut group = Group::new();
    group.set_zlevel(config.zlevel);
    group.set_z(LOADING_Z);
    group.set_silent(true);

    let mut mask = color_or(&config.mask_color, Color::rgb(1.0, 1.0, 1.0));
    mask.alpha = MASK_ALPHA;
    group.add(Element::new(Shape::Rect(RectPrimitive::new(
        0.0, 0.0, width, height, mask,
    ))));

    // Spinner sits left of the label, the pair centered together.
    let text_width = config.text.chars().count() as f64 * config.font_size * 0.6;
    let spinner_span = if config.show_spinner {
        config.spinner_radius * 2.0 + config.font_size
    } else {
        0.0
    };
    let start_x = center_x - (spinner_span + text_width) / 2.0;
    if config.show_spinner {
        group.add(
            Element::new(Shape::Circle(CirclePrimitive::new(
                start_x + config.spinner_radius,
                center_y,
                config.spinner_radius,
                color_or(&config.color, Color::rgb(0.33, 0.44, 0.78)),
            )))
            .with_z(1.0),
        );
    }
    if !config.text.is_empty() {
        group.add(
            Element::new(Shape::Text(TextPrimitive::new(
                config.text,
                start_x + spinner_span,
                center_y,
                config.font_size,
                color_or(&config.text_color, Color::rgb(0.0, 0.0, 0.0)),
                TextHAlign::Left,
            )))
            .with_z(1.0),
        );
    }
    group
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use serde_json::{Value, json};

    use super::{LOADING_Z, default_loading};
    use crate::core::Viewport;
    use crate::render::Shape;

    #[test]
    fn mask_covers_the_viewport_under_spinner_and_label() {
        let group = default_loading(&Value::Null, Viewport::new(400, 200));
        assert_relative_eq!(group.z(), LOADING_Z);
        assert_eq!(group.len(), 3);
        match group.elements()[0].shape() {
            Shape::Rect(mask) => {
                assert_relative_eq!(mask.width, 400.0);
                assert_relative_eq!(mask.height, 200.0);
                assert_relative_eq!(mask.fill_color.alpha, 0.8);
            }
            other => panic!("expected mask rect, got {other:?}"),
        }
        assert!(matches!(
            group.elements()[2].shape(),
            Shape::Text(text) if text.text == "loading"
        ));
    }

    #[test]
    fn config_can_hide_the_spinner_and_rename_the_label() {
        let group = default_loading(
            &json!({ "text": "wait", "showSpinner": false, "zlevel": 3 }),
            Viewport::new(400, 200),
        );
        assert_eq!(group.zlevel(), 3);
        assert_eq!(group.len(), 2);
        assert!(matches!(
            group.elements()[1].shape(),
            Shape::Text(text) if text.text == "wait"
        ));
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let group = default_loading(&json!({ "fontSize": "big" }), Viewport::new(100, 100));
        assert_eq!(group.len(), 3);
    }
}
