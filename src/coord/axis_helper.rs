//! Axis scale construction, extent niceing and tick labels.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::SeriesData;
use crate::model::option::{option_at, option_bool, option_f64, option_str, option_usize};

const DEFAULT_SPLIT_NUMBER: usize = 5;
const DEFAULT_LOG_BASE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScaleKind {
    Value,
    Log,
    Category,
    Time,
}

impl ScaleKind {
    /// Explicit `type`, else `category` when the axis lists `data`.
    #[must_use]
    pub fn from_axis_option(option: &Value) -> Self {
        match option_str(option, "type") {
            Some("log") => Self::Log,
            Some("category") => Self::Category,
            Some("time") => Self::Time,
            Some(_) => Self::Value,
            None if option.get("data").is_some_and(Value::is_array) => Self::Category,
            None => Self::Value,
        }
    }
}

/// Data-to-unit mapping of one axis.
///
/// The extent is kept in data space for every kind; log scales map through
/// the logarithm in [`AxisScale::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct AxisScale {
    kind: ScaleKind,
    extent: (f64, f64),
    interval: f64,
    log_base: f64,
    categories: Vec<String>,
}

impl AxisScale {
    /// Empty scale of the kind declared by an axis option.
    #[must_use]
    pub fn create_by_model(option: &Value) -> Self {
        let kind = ScaleKind::from_axis_option(option);
        let categories: Vec<String> = match (kind, option.get("data")) {
            (ScaleKind::Category, Some(Value::Array(items))) => items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    Value::Object(fields) => fields
                        .get("value")
                        .map(category_label)
                        .unwrap_or_default(),
                    other => category_label(other),
                })
                .collect(),
            _ => Vec::new(),
        };
        Self {
            kind,
            extent: (f64::INFINITY, f64::NEG_INFINITY),
            interval: 1.0,
            log_base: option_f64(option, "logBase").unwrap_or(DEFAULT_LOG_BASE),
            categories,
        }
    }

    #[must_use]
    pub fn kind(&self) -> ScaleKind {
        self.kind
    }

    #[must_use]
    pub fn extent(&self) -> (f64, f64) {
        self.extent
    }

    #[must_use]
    pub fn interval(&self) -> f64 {
        self.interval
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// No finite extent has been collected yet.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        !(self.extent.0.is_finite() && self.extent.1.is_finite())
    }

    pub fn set_extent(&mut self, min: f64, max: f64) {
        self.extent = (min, max);
    }

    pub fn union_extent(&mut self, (min, max): (f64, f64)) {
        let (min, max) = if self.kind == ScaleKind::Log {
            (
                if min > 0.0 { min } else { f64::INFINITY },
                if max > 0.0 { max } else { f64::NEG_INFINITY },
            )
        } else {
            (min, max)
        };
        self.extent.0 = self.extent.0.min(min);
        self.extent.1 = self.extent.1.max(max);
    }

    /// Widens the extent with one data dimension of a series.
    pub fn union_extent_from_data(&mut self, data: &SeriesData, dim: usize) {
        if let Some(extent) = data.extent(dim) {
            self.union_extent(extent);
        }
    }

    /// Position of `value` inside the extent, `0..=1` when in range.
    #[must_use]
    pub fn normalize(&self, value: f64) -> f64 {
        let (min, max) = self.mapped_extent();
        let value = self.map_value(value);
        if (max - min).abs() < f64::EPSILON {
            return 0.5;
        }
        (value - min) / (max - min)
    }

    /// Inverse of [`AxisScale::normalize`].
    #[must_use]
    pub fn scale(&self, t: f64) -> f64 {
        let (min, max) = self.mapped_extent();
        let mapped = min + t * (max - min);
        if self.kind == ScaleKind::Log {
            self.log_base.powf(mapped)
        } else {
            mapped
        }
    }

    fn map_value(&self, value: f64) -> f64 {
        if self.kind == ScaleKind::Log {
            value.log(self.log_base)
        } else {
            value
        }
    }

    fn mapped_extent(&self) -> (f64, f64) {
        (self.map_value(self.extent.0), self.map_value(self.extent.1))
    }

    /// Tick values inside the extent.
    #[must_use]
    pub fn ticks(&self) -> Vec<f64> {
        if self.is_blank() || self.interval <= 0.0 || !self.interval.is_finite() {
            return Vec::new();
        }
        let (min, max) = self.mapped_extent();
        let first = match self.kind {
            ScaleKind::Category => min.ceil(),
            _ => min,
        };
        let mut ticks = Vec::new();
        let mut value = first;
        let tolerance = self.interval * 1e-9;
        while value <= max + tolerance && ticks.len() < 10_000 {
            let tick = if self.kind == ScaleKind::Log {
                self.log_base.powf(value)
            } else {
                round_to_interval(value, self.interval)
            };
            ticks.push(tick);
            value += self.interval;
        }
        ticks
    }

    /// Text of a tick: category name, date or trimmed number.
    #[must_use]
    pub fn label(&self, value: f64) -> String {
        match self.kind {
            ScaleKind::Category => {
                let index = value.round();
                if index >= 0.0 {
                    if let Some(name) = self.categories.get(index as usize) {
                        return name.clone();
                    }
                }
                format_number(value, 0)
            }
            ScaleKind::Time => format_time_label(value, self.extent.1 - self.extent.0),
            ScaleKind::Value | ScaleKind::Log => {
                format_number(value, interval_precision(self.interval))
            }
        }
    }

    fn calc_nice_extent(&mut self, info: &ScaleExtentInfo, opts: &NiceOpts) {
        let (mut min, mut max) = info.extent;
        match self.kind {
            ScaleKind::Category => {
                self.interval = 1.0;
                // Unfixed ends leave half a band around the first/last category.
                if !info.fix_min {
                    min -= 0.5;
                }
                if !info.fix_max {
                    max += 0.5;
                }
                self.extent = (min, max);
            }
            ScaleKind::Log => {
                self.interval = 1.0;
                let base = self.log_base;
                let lo = if info.fix_min { min } else { base.powf(min.log(base).floor()) };
                let hi = if info.fix_max { max } else { base.powf(max.log(base).ceil()) };
                self.extent = if lo < hi { (lo, hi) } else { (lo, lo * base) };
            }
            ScaleKind::Value | ScaleKind::Time => {
                if (max - min).abs() < f64::EPSILON {
                    if min != 0.0 {
                        let expand = min.abs() / 2.0;
                        if !info.fix_max {
                            max += expand;
                        }
                        if !info.fix_min {
                            min -= expand;
                        }
                    } else if !info.fix_max {
                        max = 1.0;
                    }
                }
                let span = (max - min).abs();
                let split = opts.split_number.max(1) as f64;
                let mut interval = opts
                    .interval
                    .unwrap_or_else(|| nice_number(span / split, true));
                if let Some(min_interval) = opts.min_interval {
                    interval = interval.max(min_interval);
                }
                if let Some(max_interval) = opts.max_interval {
                    interval = interval.min(max_interval);
                }
                if !(interval.is_finite() && interval > 0.0) {
                    interval = 1.0;
                }
                if !info.fix_min {
                    min = round_to_interval((min / interval).floor() * interval, interval);
                }
                if !info.fix_max {
                    max = round_to_interval((max / interval).ceil() * interval, interval);
                }
                self.interval = interval;
                self.extent = (min, max);
            }
        }
    }
}

/// Extent an axis should cover before niceing, and which ends are fixed by
/// the option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleExtentInfo {
    pub extent: (f64, f64),
    pub fix_min: bool,
    pub fix_max: bool,
}

#[derive(Debug, Clone, Copy)]
struct NiceOpts {
    split_number: usize,
    interval: Option<f64>,
    min_interval: Option<f64>,
    max_interval: Option<f64>,
}

/// Resolves `min`/`max` (numbers or `dataMin`/`dataMax`) against the
/// collected data extent. Value axes without `scale: true` include zero.
#[must_use]
pub fn get_scale_extent(scale: &AxisScale, axis_option: &Value) -> ScaleExtentInfo {
    let (mut data_min, mut data_max) = scale.extent();
    if scale.kind() == ScaleKind::Category && !scale.categories().is_empty() {
        data_min = data_min.min(0.0);
        data_max = data_max.max((scale.categories().len() - 1) as f64);
    }
    if !(data_min.is_finite() && data_max.is_finite()) {
        (data_min, data_max) = match scale.kind() {
            ScaleKind::Log => (1.0, scale.log_base),
            _ => (0.0, 1.0),
        };
    }

    let bound = |key: &str, data_value: f64| match axis_option.get(key) {
        Some(Value::Number(number)) => number.as_f64().filter(|value| value.is_finite()),
        Some(Value::String(text)) if text == "dataMin" || text == "dataMax" => Some(data_value),
        _ => None,
    };
    let fixed_min = bound("min", data_min);
    let fixed_max = bound("max", data_max);
    let mut min = fixed_min.unwrap_or(data_min);
    let mut max = fixed_max.unwrap_or(data_max);

    if scale.kind() == ScaleKind::Value && !option_bool(axis_option, "scale").unwrap_or(false) {
        if min > 0.0 && max > 0.0 && fixed_min.is_none() {
            min = 0.0;
        }
        if min < 0.0 && max < 0.0 && fixed_max.is_none() {
            max = 0.0;
        }
    }

    ScaleExtentInfo {
        extent: (min, max),
        fix_min: fixed_min.is_some() || scale.kind() == ScaleKind::Category,
        fix_max: fixed_max.is_some() || scale.kind() == ScaleKind::Category,
    }
}

/// Expands the collected extent to round tick boundaries honoring
/// `splitNumber`, `interval`, `minInterval` and `maxInterval`.
pub fn nice_scale_extent(scale: &mut AxisScale, axis_option: &Value) {
    let mut info = get_scale_extent(scale, axis_option);
    let interval_like = matches!(scale.kind(), ScaleKind::Value | ScaleKind::Time);
    if scale.kind() == ScaleKind::Category {
        let gap = option_bool(axis_option, "boundaryGap").unwrap_or(true);
        info.fix_min = !gap;
        info.fix_max = !gap;
    }
    let opts = NiceOpts {
        split_number: option_usize(axis_option, "splitNumber").unwrap_or(DEFAULT_SPLIT_NUMBER),
        interval: option_f64(axis_option, "interval").filter(|value| *value > 0.0),
        min_interval: option_f64(axis_option, "minInterval").filter(|_| interval_like),
        max_interval: option_f64(axis_option, "maxInterval").filter(|_| interval_like),
    };
    scale.calc_nice_extent(&info, &opts);
}

/// `true` when the extent touches or spans zero.
#[must_use]
pub fn if_axis_cross_zero(scale: &AxisScale) -> bool {
    let (min, max) = scale.extent();
    !((min > 0.0 && max > 0.0) || (min < 0.0 && max < 0.0))
}

/// Label formatter of an axis (`axisLabel.formatter`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFormatter {
    /// `{value}` is replaced with the scale label.
    Template(String),
    Scale,
}

impl LabelFormatter {
    #[must_use]
    pub fn format(&self, scale: &AxisScale, tick: f64) -> String {
        let label = scale.label(tick);
        match self {
            Self::Template(template) => template.replace("{value}", &label),
            Self::Scale => label,
        }
    }
}

#[must_use]
pub fn make_label_formatter(axis_option: &Value) -> LabelFormatter {
    option_at(axis_option, &["axisLabel", "formatter"])
        .and_then(Value::as_str)
        .map_or(LabelFormatter::Scale, |template| {
            LabelFormatter::Template(template.to_owned())
        })
}

/// Rounds `value` to 1, 2, 3, 5 or 10 times a power of ten.
#[must_use]
pub fn nice_number(value: f64, round: bool) -> f64 {
    if !(value.is_finite() && value > 0.0) {
        return 1.0;
    }
    let exponent = value.log10().floor();
    let exp10 = 10f64.powf(exponent);
    let fraction = value / exp10;
    let nice = if round {
        if fraction < 1.5 {
            1.0
        } else if fraction < 2.5 {
            2.0
        } else if fraction < 4.0 {
            3.0
        } else if fraction < 7.0 {
            5.0
        } else {
            10.0
        }
    } else if fraction < 1.0 {
        1.0
    } else if fraction < 2.0 {
        2.0
    } else if fraction < 3.0 {
        3.0
    } else if fraction < 5.0 {
        5.0
    } else {
        10.0
    };
    nice * exp10
}

fn interval_precision(interval: f64) -> u32 {
    if !(interval.is_finite() && interval > 0.0) {
        return 0;
    }
    (-interval.log10().floor()).clamp(0.0, 20.0) as u32
}

fn round_to_interval(value: f64, interval: f64) -> f64 {
    let factor = 10f64.powi(interval_precision(interval) as i32 + 2);
    (value * factor).round() / factor
}

fn format_number(value: f64, precision: u32) -> String {
    if !value.is_finite() {
        return String::new();
    }
    Decimal::from_f64_retain(value).map_or_else(
        || value.to_string(),
        |decimal| decimal.round_dp(precision).normalize().to_string(),
    )
}

fn format_time_label(millis: f64, span_millis: f64) -> String {
    let Some(dt) = DateTime::<Utc>::from_timestamp_millis(millis.round() as i64) else {
        return format_number(millis, 0);
    };
    let pattern = if span_millis.abs() <= 600_000.0 {
        "%H:%M:%S"
    } else if span_millis.abs() <= 172_800_000.0 {
        "%m-%d %H:%M"
    } else {
        "%Y-%m-%d"
    };
    dt.format(pattern).to_string()
}

fn category_label(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AxisScale, LabelFormatter, ScaleKind, get_scale_extent, if_axis_cross_zero,
        make_label_formatter, nice_number, nice_scale_extent,
    };
    use approx::assert_relative_eq;
    use serde_json::json;

    #[test]
    fn axis_type_defaults_follow_data_presence() {
        assert_eq!(ScaleKind::from_axis_option(&json!({})), ScaleKind::Value);
        assert_eq!(
            ScaleKind::from_axis_option(&json!({ "data": ["a"] })),
            ScaleKind::Category
        );
        assert_eq!(ScaleKind::from_axis_option(&json!({ "type": "log" })), ScaleKind::Log);
    }

    #[test]
    fn value_axis_includes_zero_unless_scaled() {
        let mut scale = AxisScale::create_by_model(&json!({}));
        scale.union_extent((12.0, 47.0));
        let info = get_scale_extent(&scale, &json!({}));
        assert_eq!(info.extent, (0.0, 47.0));
        assert!(!info.fix_min);

        let scaled = get_scale_extent(&scale, &json!({ "scale": true, "max": 50 }));
        assert_eq!(scaled.extent, (12.0, 50.0));
        assert!(scaled.fix_max);
    }

    #[test]
    fn nice_extent_snaps_to_interval_multiples() {
        let option = json!({ "scale": true });
        let mut scale = AxisScale::create_by_model(&option);
        scale.union_extent((3.2, 97.4));
        nice_scale_extent(&mut scale, &option);

        assert_relative_eq!(scale.interval(), 20.0);
        assert_eq!(scale.extent(), (0.0, 100.0));
        assert_eq!(scale.ticks(), vec![0.0, 20.0, 40.0, 60.0, 80.0, 100.0]);
        assert!(if_axis_cross_zero(&scale));
    }

    #[test]
    fn single_value_extent_is_expanded() {
        let option = json!({ "scale": true });
        let mut scale = AxisScale::create_by_model(&option);
        scale.union_extent((10.0, 10.0));
        nice_scale_extent(&mut scale, &option);
        let (min, max) = scale.extent();
        assert!(min <= 5.0 && max >= 15.0);
    }

    #[test]
    fn category_extent_centers_bands() {
        let option = json!({ "type": "category", "data": ["a", "b", "c"] });
        let mut scale = AxisScale::create_by_model(&option);
        nice_scale_extent(&mut scale, &option);
        assert_eq!(scale.extent(), (-0.5, 2.5));
        assert_relative_eq!(scale.normalize(1.0), 0.5);
        assert_eq!(scale.ticks(), vec![0.0, 1.0, 2.0]);
        assert_eq!(scale.label(2.0), "c");
    }

    #[test]
    fn label_formatter_fills_template() {
        let option = json!({ "axisLabel": { "formatter": "{value} kg" } });
        let formatter = make_label_formatter(&option);
        assert_eq!(formatter, LabelFormatter::Template("{value} kg".to_owned()));
        let mut scale = AxisScale::create_by_model(&option);
        scale.union_extent((0.0, 1.0));
        nice_scale_extent(&mut scale, &option);
        assert_eq!(formatter.format(&scale, 0.4), "0.4 kg");
        assert_eq!(make_label_formatter(&json!({})).format(&scale, 1.0), "1");
    }

    #[test]
    fn nice_numbers_round_to_friendly_steps() {
        assert_relative_eq!(nice_number(0.23, true), 0.2);
        assert_relative_eq!(nice_number(36.0, true), 30.0);
        assert_relative_eq!(nice_number(36.0, false), 50.0);
        assert_relative_eq!(nice_number(8.0, true), 10.0);
    }
}
