use std::cell::RefCell;
use std::ops::Range;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chart_flow::api::{
    ActionInfo, ChartEngine, ChartEngineConfig, ChartRegistry, EVENT_FINISHED, EVENT_RENDERED,
    FrameBudget, ProcessState, SetOptionOpts, UpdateMethod,
};
use chart_flow::core::Viewport;
use chart_flow::model::{DataRow, GlobalModel, SeriesData, SeriesModel};
use chart_flow::pipeline::{
    SeriesStageHandler, StageContext, StageHandler, StageHandlerInfo, StageReset,
};
use chart_flow::render::{NullRenderer, RenderFrame};
use chart_flow::{ChartError, ChartResult, Payload};
use serde_json::{Value, json};

const POINTS: usize = 1_000;
const STEP: usize = 100;

fn points_option(count: usize) -> Value {
    let data: Vec<Value> = (0..count)
        .map(|i| json!([i as f64, ((i * 37) % 101) as f64]))
        .collect();
    json!({
        "xAxis": {},
        "yAxis": {},
        "series": [{ "type": "scatter", "id": "cloud", "data": data }]
    })
}

fn progressive_config(budget: FrameBudget) -> ChartEngineConfig {
    ChartEngineConfig::new(Viewport::new(800, 600))
        .with_progressive_step(STEP)
        .with_progressive_threshold(500)
        .with_frame_budget(budget)
}

fn engine(config: ChartEngineConfig) -> ChartEngine<NullRenderer> {
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    engine
        .set_option(points_option(POINTS), SetOptionOpts::default())
        .expect("set option");
    engine
}

fn circles(engine: &ChartEngine<NullRenderer>) -> usize {
    engine
        .renderer()
        .last_frame
        .as_ref()
        .map_or(0, RenderFrame::circle_count)
}

fn run_to_completion(engine: &mut ChartEngine<NullRenderer>) -> usize {
    let mut frames = 0;
    while engine.is_unfinished() {
        engine.on_frame().expect("frame");
        frames += 1;
        assert!(frames <= POINTS, "progressive rendering never settled");
    }
    frames
}

fn sync_frame() -> RenderFrame {
    let config = ChartEngineConfig::new(Viewport::new(800, 600)).with_progressive_threshold(usize::MAX);
    let engine = engine(config);
    assert!(!engine.is_unfinished());
    engine
        .renderer()
        .last_frame
        .clone()
        .expect("painted frame")
}

#[test]
fn first_paint_covers_one_chunk() {
    let engine = engine(progressive_config(FrameBudget::Rounds(1)));
    assert!(engine.is_unfinished());
    assert_eq!(circles(&engine), STEP);
}

#[test]
fn each_frame_round_adds_one_chunk() {
    let mut engine = engine(progressive_config(FrameBudget::Rounds(1)));
    for round in 1..POINTS / STEP {
        engine.on_frame().expect("frame");
        assert_eq!(circles(&engine), (round + 1) * STEP);
    }
    assert!(!engine.is_unfinished());
}

#[test]
fn progressive_output_matches_synchronous_output() {
    let mut engine = engine(progressive_config(FrameBudget::Rounds(1)));
    let frames = run_to_completion(&mut engine);
    assert_eq!(frames, POINTS / STEP - 1);

    let progressive = engine.renderer().last_frame.clone().expect("painted frame");
    assert_eq!(progressive, sync_frame());
}

#[test]
fn larger_round_budget_finishes_in_fewer_frames() {
    let mut engine = engine(progressive_config(FrameBudget::Rounds(4)));
    assert_eq!(run_to_completion(&mut engine), 3);
    assert_eq!(circles(&engine), POINTS);
}

#[test]
fn time_budget_eventually_completes() {
    let mut engine = engine(progressive_config(FrameBudget::Time(Duration::from_millis(5))));
    run_to_completion(&mut engine);
    assert_eq!(
        engine.renderer().last_frame.clone().expect("painted frame"),
        sync_frame()
    );
}

#[test]
fn finished_fires_once_after_the_last_chunk() {
    let mut engine = engine(progressive_config(FrameBudget::Rounds(1)));
    let log: Rc<RefCell<Vec<(String, usize)>>> = Rc::new(RefCell::new(Vec::new()));
    for name in [EVENT_RENDERED, EVENT_FINISHED] {
        let sink = Rc::clone(&log);
        engine.on(name, move |event| {
            let count = sink.borrow().len();
            sink.borrow_mut().push((event.name.clone(), count));
        });
    }

    let mut finished_at = None;
    let mut frame = 0;
    while engine.is_unfinished() {
        engine.on_frame().expect("frame");
        frame += 1;
        let finished = log
            .borrow()
            .iter()
            .filter(|(name, _)| name == EVENT_FINISHED)
            .count();
        if finished > 0 && finished_at.is_none() {
            finished_at = Some(frame);
            assert_eq!(circles(&engine), POINTS);
        }
        if finished_at.is_none() {
            assert!(circles(&engine) < POINTS);
        }
    }

    assert_eq!(finished_at, Some(POINTS / STEP - 1));
    let log = log.borrow();
    let rendered = log.iter().filter(|(name, _)| name == EVENT_RENDERED).count();
    let finished = log.iter().filter(|(name, _)| name == EVENT_FINISHED).count();
    assert_eq!(rendered, POINTS / STEP - 1);
    assert_eq!(finished, 1);
    assert_eq!(log.last().map(|(name, _)| name.as_str()), Some(EVENT_FINISHED));

    drop(log);
    engine.on_frame().expect("idle frame");
    assert_eq!(circles(&engine), POINTS);
}

#[test]
fn appended_rows_render_on_following_frames() {
    let mut engine = engine(progressive_config(FrameBudget::Rounds(1)));
    run_to_completion(&mut engine);

    engine
        .append_data(
            0,
            (0..50).map(|i| DataRow::new([f64::from(i), 1.0])).collect(),
        )
        .expect("append");
    assert!(engine.is_unfinished());
    run_to_completion(&mut engine);

    assert_eq!(circles(&engine), POINTS + 50);
    let series = &engine.model().expect("model").series()[0];
    assert_eq!(series.data().count(), POINTS + 50);
}

#[test]
fn below_threshold_series_render_in_one_pass() {
    let config = progressive_config(FrameBudget::Rounds(1));
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    engine
        .set_option(points_option(499), SetOptionOpts::default())
        .expect("set option");
    assert!(!engine.is_unfinished());
    assert_eq!(circles(&engine), 499);
}

#[test]
fn series_progressive_option_overrides_the_default_step() {
    let config = progressive_config(FrameBudget::Rounds(1));
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    let mut option = points_option(POINTS);
    option["series"][0]["progressive"] = json!(250);
    engine
        .set_option(option, SetOptionOpts::default())
        .expect("set option");
    assert_eq!(circles(&engine), 250);
    assert_eq!(run_to_completion(&mut engine), 3);
}

#[test]
fn time_budget_bounds_the_rounds_of_one_frame() {
    let mut bounded = engine(progressive_config(FrameBudget::Time(Duration::ZERO)));
    bounded.on_frame().expect("frame");
    assert_eq!(circles(&bounded), 2 * STEP);
    bounded.on_frame().expect("frame");
    assert_eq!(circles(&bounded), 3 * STEP);

    let mut unbounded = engine(progressive_config(FrameBudget::Time(Duration::from_secs(60))));
    unbounded.on_frame().expect("frame");
    assert!(!unbounded.is_unfinished());
    assert_eq!(circles(&unbounded), POINTS);
}

/// What a chunk worker saw while it ran.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ChunkObservation {
    state: ProcessState,
    dispatched_before: usize,
}

/// Visual whose chunk worker dispatches `chunkDone` for every chunk and
/// fails on chunks starting at `fail_from`.
struct ChunkDispatcher {
    info: StageHandlerInfo,
    dispatched: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<ChunkObservation>>>,
    fail_from: usize,
}

impl SeriesStageHandler for ChunkDispatcher {
    fn info(&self) -> &StageHandlerInfo {
        &self.info
    }

    fn reset(
        &self,
        _series: &SeriesModel,
        _model: &GlobalModel,
        ctx: &StageContext<'_>,
    ) -> ChartResult<StageReset> {
        let api = ctx.api.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let seen = Arc::clone(&self.seen);
        let fail_from = self.fail_from;
        Ok(StageReset::none().with_progress(
            move |range: Range<usize>, _data: &mut SeriesData| -> ChartResult<()> {
                if range.start >= fail_from {
                    return Err(ChartError::stage_handler("chunk-dispatcher", "chunk rejected"));
                }
                seen.lock().expect("observations").push(ChunkObservation {
                    state: api.process_state(),
                    dispatched_before: dispatched.load(Ordering::SeqCst),
                });
                api.dispatch_action(Payload::new("chunkDone"));
                Ok(())
            },
        ))
    }
}

struct DispatchingEngine {
    engine: ChartEngine<NullRenderer>,
    dispatched: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<ChunkObservation>>>,
}

fn dispatching_engine(fail_from: usize) -> DispatchingEngine {
    let dispatched = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut registry = ChartRegistry::with_builtins().expect("builtins");
    registry
        .register_visual(
            None,
            StageHandler::series(ChunkDispatcher {
                info: StageHandlerInfo::new("chunk-dispatcher").for_series_type("scatter"),
                dispatched: Arc::clone(&dispatched),
                seen: Arc::clone(&seen),
                fail_from,
            }),
        )
        .expect("register visual");
    let hits = Arc::clone(&dispatched);
    registry
        .register_action(
            ActionInfo::new("chunkDone").with_update(UpdateMethod::None),
            Arc::new(move |_payload, _model, _api| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
        )
        .expect("register action");

    let mut engine = ChartEngine::new(
        NullRenderer::default(),
        registry,
        progressive_config(FrameBudget::Rounds(1)),
    )
    .expect("engine init");
    engine
        .set_option(points_option(POINTS), SetOptionOpts::default())
        .expect("set option");
    DispatchingEngine {
        engine,
        dispatched,
        seen,
    }
}

#[test]
fn actions_dispatched_mid_chunk_run_after_the_frame() {
    let DispatchingEngine {
        mut engine,
        dispatched,
        seen,
    } = dispatching_engine(usize::MAX);
    run_to_completion(&mut engine);

    let seen = seen.lock().expect("observations");
    assert_eq!(seen.len(), POINTS / STEP);
    for (chunk, observation) in seen.iter().enumerate() {
        assert_eq!(observation.state, ProcessState::InMainProcess);
        // One chunk per frame: every earlier chunk's action has been flushed,
        // the current one has not.
        assert_eq!(observation.dispatched_before, chunk);
    }
    assert_eq!(dispatched.load(Ordering::SeqCst), POINTS / STEP);
    assert_eq!(engine.api().pending_action_count(), 0);
    assert_eq!(engine.process_state(), ProcessState::Idle);
}

#[test]
fn failing_chunk_leaves_the_main_process() {
    let DispatchingEngine {
        mut engine, seen, ..
    } = dispatching_engine(2 * STEP);
    engine.on_frame().expect("second chunk");

    let err = engine.on_frame().expect_err("third chunk fails");
    assert!(matches!(err, ChartError::StageHandler { .. }));
    assert_eq!(engine.process_state(), ProcessState::Idle);
    assert_eq!(seen.lock().expect("observations").len(), 2);

    engine
        .set_option(points_option(50), SetOptionOpts::not_merge())
        .expect("small option renders in one pass");
    assert!(!engine.is_unfinished());
    assert_eq!(circles(&engine), 50);
}
