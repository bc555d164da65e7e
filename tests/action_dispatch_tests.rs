use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use approx::assert_relative_eq;
use chart_flow::api::{
    ActionInfo, ChartEngine, ChartEngineConfig, ChartRegistry, LifecycleEvent, SetOptionOpts,
    UpdateMethod, noop_action,
};
use chart_flow::core::Viewport;
use chart_flow::render::{CirclePrimitive, NullRenderer};
use chart_flow::{ChartEvent, DispatchOpts, Payload};
use serde_json::{Value, json};

fn scatter_option() -> Value {
    json!({
        "xAxis": { "min": 0, "max": 10 },
        "yAxis": { "min": 0, "max": 10 },
        "series": [{
            "type": "scatter",
            "data": [
                { "name": "a", "value": [1, 1] },
                { "name": "b", "value": [2, 4] },
                { "name": "c", "value": [3, 9] }
            ]
        }]
    })
}

fn engine_with(registry: ChartRegistry) -> ChartEngine<NullRenderer> {
    let config = ChartEngineConfig::new(Viewport::new(640, 480));
    let mut engine =
        ChartEngine::new(NullRenderer::default(), registry, config).expect("engine init");
    engine
        .set_option(scatter_option(), SetOptionOpts::default())
        .expect("set option");
    engine
}

fn engine() -> ChartEngine<NullRenderer> {
    engine_with(ChartRegistry::with_builtins().expect("builtins"))
}

fn record(engine: &mut ChartEngine<NullRenderer>, names: &[&str]) -> Rc<RefCell<Vec<ChartEvent>>> {
    let seen = Rc::new(RefCell::new(Vec::new()));
    for name in names {
        let sink = Rc::clone(&seen);
        engine.on(name, move |event| sink.borrow_mut().push(event.clone()));
    }
    seen
}

fn painted_circles(engine: &ChartEngine<NullRenderer>) -> Vec<CirclePrimitive> {
    engine
        .renderer()
        .last_frame
        .as_ref()
        .expect("painted frame")
        .layers
        .iter()
        .flat_map(|layer| layer.circles.iter().copied())
        .collect()
}

fn counting_registry(counter: &Arc<AtomicUsize>) -> ChartRegistry {
    let mut registry = ChartRegistry::with_builtins().expect("builtins");
    let hits = Arc::clone(counter);
    registry
        .register_action(
            ActionInfo::new("counted").with_update(UpdateMethod::None),
            Arc::new(move |_payload, _model, _api| {
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }),
        )
        .expect("register counted");
    registry
}

#[test]
fn highlight_enlarges_the_targeted_symbols_on_next_frame() {
    let mut engine = engine();
    let before = painted_circles(&engine);
    assert_eq!(before.len(), 3);

    engine
        .dispatch_action(
            Payload::new("highlight")
                .with("seriesIndex", 0)
                .with("dataIndex", 1),
            DispatchOpts::default(),
        )
        .expect("highlight");
    engine.on_frame().expect("frame");

    let after = painted_circles(&engine);
    assert_relative_eq!(after[0].radius, before[0].radius);
    assert_relative_eq!(after[1].radius, before[1].radius * 1.2);
    assert_relative_eq!(after[2].radius, before[2].radius);

    engine
        .dispatch_action(
            Payload::new("downplay")
                .with("seriesIndex", 0)
                .with("dataIndex", 1),
            DispatchOpts::default(),
        )
        .expect("downplay");
    engine.on_frame().expect("frame");
    assert_eq!(painted_circles(&engine), before);
}

#[test]
fn idle_frames_after_a_highlight_do_not_repaint() {
    let mut engine = engine();
    engine.on_frame().expect("idle frame");
    let painted = engine.renderer().render_count;

    engine
        .dispatch_action(
            Payload::new("highlight").with("seriesIndex", 0).with("dataIndex", 0),
            DispatchOpts::default(),
        )
        .expect("highlight");
    engine.on_frame().expect("frame");
    assert_eq!(engine.renderer().render_count, painted + 1);
    let highlighted = painted_circles(&engine);

    engine.on_frame().expect("idle frame");
    engine.on_frame().expect("idle frame");
    assert_eq!(engine.renderer().render_count, painted + 1);
    assert_eq!(painted_circles(&engine), highlighted);
}

#[test]
fn flush_option_paints_without_waiting_for_a_frame() {
    let mut engine = engine();
    let painted = engine.renderer().render_count;
    engine
        .dispatch_action(
            Payload::new("highlight").with("seriesIndex", 0),
            DispatchOpts {
                silent: false,
                flush: true,
            },
        )
        .expect("highlight");
    assert_eq!(engine.renderer().render_count, painted + 1);
}

#[test]
fn batch_dispatch_emits_one_aggregate_message() {
    let mut engine = engine();
    let events = record(&mut engine, &["highlight", "updated"]);

    let payload = Payload::from_value(json!({
        "type": "highlight",
        "seriesIndex": 0,
        "batch": [{ "dataIndex": 0 }, { "dataIndex": 2 }]
    }))
    .expect("payload");
    engine
        .dispatch_action(payload, DispatchOpts::default())
        .expect("batch highlight");

    let events = events.borrow();
    let names: Vec<&str> = events.iter().map(|event| event.name.as_str()).collect();
    assert_eq!(names, vec!["highlight", "updated"]);

    let batch = events[0]
        .get("batch")
        .and_then(Value::as_array)
        .expect("batch body");
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0]["dataIndex"], json!(0));
    assert_eq!(batch[1]["dataIndex"], json!(2));
    assert_eq!(batch[1]["seriesIndex"], json!(0));
    assert_eq!(batch[1]["type"], json!("highlight"));

    drop(events);
    engine.on_frame().expect("frame");
    let circles = painted_circles(&engine);
    assert!(circles[0].radius > circles[1].radius);
    assert!(circles[2].radius > circles[1].radius);
}

#[test]
fn batched_select_emits_at_most_one_refined_event() {
    let mut engine = engine();
    let events = record(&mut engine, &["select", "selectchanged"]);

    let payload = Payload::from_value(json!({
        "type": "select",
        "seriesIndex": 0,
        "batch": [{ "dataIndex": 0 }, { "dataIndex": 1 }]
    }))
    .expect("payload");
    engine
        .dispatch_action(payload, DispatchOpts::default())
        .expect("batch select");

    let events = events.borrow();
    let names: Vec<&str> = events.iter().map(|event| event.name.as_str()).collect();
    assert_eq!(names, vec!["select", "selectchanged"]);
    assert_eq!(
        events[1].get("selected"),
        Some(&json!([{ "seriesIndex": 0, "dataIndex": [0, 1] }]))
    );
}

#[test]
fn toggle_select_updates_model_and_emits_select_changed() {
    let mut engine = engine();
    let events = record(&mut engine, &["toggleselect", "selectchanged"]);

    engine
        .dispatch_action(
            Payload::new("toggleSelect")
                .with("seriesIndex", 0)
                .with("dataIndex", 1)
                .with("isFromClick", true),
            DispatchOpts::default(),
        )
        .expect("toggle select");

    let series = &engine.model().expect("model").series()[0];
    assert!(series.is_selected(1));
    assert!(!series.is_selected(0));

    {
        let events = events.borrow();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "toggleselect");
        let refined = &events[1];
        assert_eq!(refined.name, "selectchanged");
        assert_eq!(
            refined.get("selected"),
            Some(&json!([{ "seriesIndex": 0, "dataIndex": [1] }]))
        );
        assert_eq!(refined.get("isFromClick"), Some(&json!(true)));
        assert_eq!(refined.get("fromAction"), Some(&json!("toggleSelect")));
        assert_eq!(
            refined
                .get("fromActionPayload")
                .and_then(|payload| payload.get("dataIndex")),
            Some(&json!(1))
        );
    }

    engine.on_frame().expect("frame");
    let circles = painted_circles(&engine);
    let shade = |circle: &CirclePrimitive| {
        circle.fill_color.red + circle.fill_color.green + circle.fill_color.blue
    };
    assert!(shade(&circles[1]) < shade(&circles[0]));

    engine
        .dispatch_action(
            Payload::new("toggleSelect")
                .with("seriesIndex", 0)
                .with("name", "b"),
            DispatchOpts::default(),
        )
        .expect("toggle by name");
    let series = &engine.model().expect("model").series()[0];
    assert!(series.selected_indices().is_empty());
    assert_eq!(
        events.borrow().last().and_then(|event| event.get("selected")),
        Some(&json!([]))
    );
}

#[test]
fn silent_dispatch_publishes_nothing() {
    let mut engine = engine();
    let events = record(&mut engine, &["select", "selectchanged", "updated"]);
    engine
        .dispatch_action(
            Payload::new("select").with("seriesIndex", 0).with("dataIndex", 0),
            DispatchOpts::silent(),
        )
        .expect("silent select");
    assert!(events.borrow().is_empty());
    assert!(engine.model().expect("model").series()[0].is_selected(0));
}

#[test]
fn unknown_action_is_a_no_op() {
    let mut engine = engine();
    let events = record(&mut engine, &["nope", "updated"]);
    let painted = engine.renderer().render_count;
    let version = engine.main_process_version();

    engine
        .dispatch_action(Payload::new("nope"), DispatchOpts::default())
        .expect("ignored");

    assert!(events.borrow().is_empty());
    assert_eq!(engine.renderer().render_count, painted);
    assert_eq!(engine.main_process_version(), version);
}

#[test]
fn action_dispatched_from_a_handler_runs_once_after_the_cycle() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = counting_registry(&counter);
    let seen_during = Arc::new(AtomicUsize::new(usize::MAX));
    let hits = Arc::clone(&counter);
    let during = Arc::clone(&seen_during);
    registry
        .register_action(
            ActionInfo::new("relay").with_update(UpdateMethod::None),
            Arc::new(move |_payload, _model, api| {
                api.dispatch_action(Payload::new("counted"));
                during.store(hits.load(Ordering::SeqCst), Ordering::SeqCst);
                Ok(None)
            }),
        )
        .expect("register relay");

    let mut engine = engine_with(registry);
    let events = record(&mut engine, &["relay", "counted", "updated"]);
    engine
        .dispatch_action(Payload::new("relay"), DispatchOpts::default())
        .expect("relay");

    assert_eq!(seen_during.load(Ordering::SeqCst), 0);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(engine.api().pending_action_count(), 0);
    let names: Vec<String> = events.borrow().iter().map(|event| event.name.clone()).collect();
    assert_eq!(names, vec!["relay", "counted", "updated"]);
}

#[test]
fn action_dispatched_from_a_lifecycle_hook_is_deferred() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut registry = counting_registry(&counter);
    let fired = Arc::new(AtomicUsize::new(0));
    let hook_fired = Arc::clone(&fired);
    let hits = Arc::clone(&counter);
    registry.register_lifecycle_hook(
        LifecycleEvent::AfterUpdate,
        Arc::new(move |_model, api| {
            if hook_fired.fetch_add(1, Ordering::SeqCst) == 0 {
                assert_eq!(hits.load(Ordering::SeqCst), 0);
                assert_eq!(api.pending_action_count(), 0);
                api.dispatch_action(Payload::new("counted"));
                assert_eq!(api.pending_action_count(), 1);
            }
        }),
    );

    let engine = engine_with(registry);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(engine.api().pending_action_count(), 0);
}

#[test]
fn component_update_method_rerenders_only_matching_views() {
    let mut registry = ChartRegistry::with_builtins().expect("builtins");
    registry
        .register_action(
            ActionInfo::new("refreshAxis").with_update(
                UpdateMethod::parse("xAxis:render").expect("component method"),
            ),
            noop_action(),
        )
        .expect("register");
    let mut engine = engine_with(registry);
    let before = engine.renderer().last_frame.clone();

    engine
        .dispatch_action(
            Payload::new("refreshAxis").with("xAxisIndex", 0),
            DispatchOpts::default(),
        )
        .expect("refresh");
    engine.on_frame().expect("frame");
    assert_eq!(engine.renderer().last_frame, before);
}
