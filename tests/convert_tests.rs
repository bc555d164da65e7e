use approx::assert_relative_eq;
use chart_flow::api::{ChartEngine, ChartEngineConfig, ResizeOpts, SetOptionOpts};
use chart_flow::coord::ModelFinder;
use chart_flow::core::{Point, Viewport};
use chart_flow::render::NullRenderer;
use serde_json::json;

fn engine() -> ChartEngine<NullRenderer> {
    let config = ChartEngineConfig::new(Viewport::new(100, 100));
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    engine
        .set_option(
            json!({
                "grid": { "left": 10, "right": 10, "top": 10, "bottom": 10 },
                "xAxis": { "min": 0, "max": 10 },
                "yAxis": { "min": 0, "max": 10 },
                "series": [{ "type": "scatter", "data": [[5, 5]] }]
            }),
            SetOptionOpts::default(),
        )
        .expect("set option");
    engine
}

#[test]
fn data_maps_into_the_grid_rect() {
    let engine = engine();
    let finder = ModelFinder::series_index(0);

    let center = engine
        .convert_to_pixel(&finder, &[5.0, 5.0])
        .expect("center pixel");
    assert_relative_eq!(center.x, 50.0);
    assert_relative_eq!(center.y, 50.0);

    let corner = engine
        .convert_to_pixel(&finder, &[2.5, 7.5])
        .expect("corner pixel");
    assert_relative_eq!(corner.x, 30.0);
    assert_relative_eq!(corner.y, 30.0);

    let origin = engine
        .convert_to_pixel(&finder, &[0.0, 0.0])
        .expect("origin pixel");
    assert_relative_eq!(origin.x, 10.0);
    assert_relative_eq!(origin.y, 90.0);
}

#[test]
fn pixels_map_back_to_data() {
    let engine = engine();
    let values = engine
        .convert_from_pixel(&ModelFinder::series_index(0), Point::new(30.0, 30.0))
        .expect("data values");
    assert_eq!(values.len(), 2);
    assert_relative_eq!(values[0], 2.5);
    assert_relative_eq!(values[1], 7.5);
}

#[test]
fn grid_and_axis_finders_address_the_same_cartesian() {
    let engine = engine();
    for finder in [
        ModelFinder::default().with("gridIndex", 0),
        ModelFinder::default().with("xAxisIndex", 0),
        ModelFinder::from_value(&json!("yAxis")).expect("finder"),
    ] {
        let point = engine
            .convert_to_pixel(&finder, &[10.0, 10.0])
            .expect("pixel through finder");
        assert_relative_eq!(point.x, 90.0);
        assert_relative_eq!(point.y, 10.0);
    }
}

#[test]
fn unknown_targets_convert_to_nothing() {
    let engine = engine();
    assert!(engine
        .convert_to_pixel(&ModelFinder::series_index(4), &[1.0, 1.0])
        .is_none());
    assert!(engine
        .convert_to_pixel(&ModelFinder::default().with("gridIndex", 3), &[1.0, 1.0])
        .is_none());
    assert!(engine
        .convert_to_layout(&ModelFinder::series_index(0), &[1.0, 1.0])
        .is_none());
}

#[test]
fn contain_pixel_checks_the_grid_rect() {
    let engine = engine();
    let grid = ModelFinder::default().with("gridIndex", 0);
    assert!(engine.contain_pixel(&grid, Point::new(50.0, 50.0)));
    assert!(!engine.contain_pixel(&grid, Point::new(95.0, 95.0)));

    let series = ModelFinder::series_index(0);
    assert!(engine.contain_pixel(&series, Point::new(12.0, 88.0)));
    assert!(!engine.contain_pixel(&series, Point::new(5.0, 5.0)));
}

#[test]
fn resize_moves_the_mapping() {
    let mut engine = engine();
    engine
        .resize(ResizeOpts::new(200, 100))
        .expect("resize");
    let point = engine
        .convert_to_pixel(&ModelFinder::series_index(0), &[5.0, 5.0])
        .expect("pixel");
    assert_relative_eq!(point.x, 100.0);
    assert_relative_eq!(point.y, 50.0);
}

#[test]
fn disposed_chart_converts_nothing() {
    let mut engine = engine();
    engine.dispose();
    assert!(engine
        .convert_to_pixel(&ModelFinder::series_index(0), &[5.0, 5.0])
        .is_none());
    assert!(!engine.contain_pixel(&ModelFinder::series_index(0), Point::new(50.0, 50.0)));
}
