use chart_flow::api::{ChartEngine, ChartEngineConfig, FrameBudget, SetOptionOpts};
use chart_flow::core::Viewport;
use chart_flow::render::{NullRenderer, RenderFrame};
use proptest::prelude::*;
use serde_json::{Value, json};

fn option(points: &[(i32, i32)]) -> Value {
    let data: Vec<Value> = points.iter().map(|(x, y)| json!([x, y])).collect();
    json!({
        "xAxis": {},
        "yAxis": {},
        "series": [{ "type": "scatter", "data": data }]
    })
}

fn painted(config: ChartEngineConfig, points: &[(i32, i32)]) -> (RenderFrame, usize) {
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    engine
        .set_option(option(points), SetOptionOpts::default())
        .expect("set option");
    let mut frames = 0;
    while engine.is_unfinished() {
        engine.on_frame().expect("frame");
        frames += 1;
    }
    let frame = engine
        .renderer()
        .last_frame
        .clone()
        .expect("painted frame");
    (frame, frames)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn chunked_rendering_paints_the_synchronous_picture(
        points in prop::collection::vec((-500_i32..500, -500_i32..500), 1..300),
        step in 1_usize..64,
        rounds in 1_u32..4,
    ) {
        let viewport = Viewport::new(320, 240);
        let sync = ChartEngineConfig::new(viewport).with_progressive_threshold(usize::MAX);
        let chunked = ChartEngineConfig::new(viewport)
            .with_progressive_step(step)
            .with_progressive_threshold(1)
            .with_frame_budget(FrameBudget::Rounds(rounds));

        let (expected, sync_frames) = painted(sync, &points);
        let (actual, chunk_frames) = painted(chunked, &points);

        prop_assert_eq!(sync_frames, 0);
        let chunks = points.len().div_ceil(step);
        let rounds = rounds as usize;
        prop_assert_eq!(chunk_frames, (chunks - 1).div_ceil(rounds));
        prop_assert_eq!(actual.circle_count(), points.len());
        prop_assert_eq!(actual, expected);
    }
}
