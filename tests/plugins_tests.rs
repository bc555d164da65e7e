use std::cell::RefCell;
use std::rc::Rc;

use chart_flow::api::{ChartEngine, ChartEngineConfig, FrameBudget, ResizeOpts, SetOptionOpts};
use chart_flow::core::Viewport;
use chart_flow::extensions::{ChartPlugin, PluginContext, PluginEvent};
use chart_flow::render::NullRenderer;
use chart_flow::{ChartError, DispatchOpts, Payload};
use serde_json::json;

type EventLog = Rc<RefCell<Vec<(PluginEvent, PluginContext)>>>;

#[derive(Clone)]
struct RecordingPlugin {
    id: String,
    events: EventLog,
}

impl RecordingPlugin {
    fn new(id: impl Into<String>, events: EventLog) -> Self {
        Self {
            id: id.into(),
            events,
        }
    }
}

impl ChartPlugin for RecordingPlugin {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_event(&mut self, event: &PluginEvent, context: PluginContext) {
        self.events.borrow_mut().push((event.clone(), context));
    }
}

fn event_kind(event: &PluginEvent) -> &'static str {
    match event {
        PluginEvent::OptionUpdated { .. } => "option",
        PluginEvent::ActionDispatched { .. } => "action",
        PluginEvent::Resized { .. } => "resized",
        PluginEvent::ProgressiveFrame { .. } => "progressive",
        PluginEvent::Rendered { .. } => "rendered",
        PluginEvent::Finished => "finished",
        PluginEvent::Disposed => "disposed",
    }
}

fn engine() -> ChartEngine<NullRenderer> {
    let config = ChartEngineConfig::new(Viewport::new(800, 500));
    ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init")
}

fn option() -> serde_json::Value {
    json!({
        "xAxis": {},
        "yAxis": {},
        "series": [{ "type": "scatter", "data": [[1, 2], [2, 4], [3, 1]] }]
    })
}

#[test]
fn plugin_receives_deterministic_event_sequence() {
    let mut engine = engine();
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", Rc::clone(&events))))
        .expect("register plugin");

    engine
        .set_option(option(), SetOptionOpts::default())
        .expect("set option");
    engine
        .dispatch_action(
            Payload::new("highlight").with("seriesIndex", 0).with("dataIndex", 1),
            DispatchOpts::default(),
        )
        .expect("highlight");
    engine.on_frame().expect("frame");
    engine.resize(ResizeOpts::new(400, 300)).expect("resize");
    engine.on_frame().expect("frame");
    engine.dispose();

    let events = events.borrow();
    let kinds: Vec<&'static str> = events.iter().map(|(event, _)| event_kind(event)).collect();
    assert_eq!(
        kinds,
        vec![
            "option",
            "rendered",
            "finished",
            "action",
            "rendered",
            "finished",
            "resized",
            "rendered",
            "finished",
            "disposed",
        ]
    );
    assert_eq!(events[0].0, PluginEvent::OptionUpdated { series_count: 1 });
    assert_eq!(
        events[3].0,
        PluginEvent::ActionDispatched {
            action_type: "highlight".to_owned()
        }
    );
    assert_eq!(
        events[6].0,
        PluginEvent::Resized {
            width: 400,
            height: 300
        }
    );
}

#[test]
fn plugin_context_reflects_the_engine_state() {
    let mut engine = engine();
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", Rc::clone(&events))))
        .expect("register plugin");
    engine
        .set_option(option(), SetOptionOpts::default())
        .expect("set option");

    let events = events.borrow();
    let (_, context) = events
        .iter()
        .find(|(event, _)| matches!(event, PluginEvent::Rendered { .. }))
        .expect("rendered event");
    assert_eq!(context.viewport, Viewport::new(800, 500));
    assert_eq!(context.series_count, 1);
    assert!(context.component_count >= 2);
    assert!(context.view_count >= 1);
    assert!(!context.unfinished);
    assert_eq!(context.main_process_version, engine.main_process_version());
}

#[test]
fn progressive_frames_are_reported_with_their_round_count() {
    let config = ChartEngineConfig::new(Viewport::new(800, 500))
        .with_progressive_step(10)
        .with_progressive_threshold(20)
        .with_frame_budget(FrameBudget::Rounds(1));
    let mut engine =
        ChartEngine::with_builtins(NullRenderer::default(), config).expect("engine init");
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));
    engine
        .register_plugin(Box::new(RecordingPlugin::new("recorder", Rc::clone(&events))))
        .expect("register plugin");

    let data: Vec<serde_json::Value> = (0..30).map(|i| json!([i, i])).collect();
    engine
        .set_option(
            json!({ "xAxis": {}, "yAxis": {}, "series": [{ "type": "scatter", "data": data }] }),
            SetOptionOpts::default(),
        )
        .expect("set option");
    while engine.is_unfinished() {
        engine.on_frame().expect("frame");
    }

    let events = events.borrow();
    let progressive: Vec<&PluginEvent> = events
        .iter()
        .map(|(event, _)| event)
        .filter(|event| matches!(event, PluginEvent::ProgressiveFrame { .. }))
        .collect();
    assert_eq!(progressive.len(), 2);
    assert!(progressive
        .iter()
        .all(|event| **event == PluginEvent::ProgressiveFrame { rounds: 1 }));
    let finished = events
        .iter()
        .filter(|(event, _)| *event == PluginEvent::Finished)
        .count();
    assert_eq!(finished, 1);
}

#[test]
fn plugin_registry_rejects_duplicate_or_empty_ids_and_supports_unregister() {
    let mut engine = engine();
    let events: EventLog = Rc::new(RefCell::new(Vec::new()));

    engine
        .register_plugin(Box::new(RecordingPlugin::new("p1", Rc::clone(&events))))
        .expect("register p1");
    assert!(engine.has_plugin("p1"));
    assert_eq!(engine.plugin_count(), 1);
    assert_eq!(engine.plugin_ids().collect::<Vec<_>>(), vec!["p1"]);

    let duplicate =
        engine.register_plugin(Box::new(RecordingPlugin::new("p1", Rc::clone(&events))));
    assert!(matches!(duplicate, Err(ChartError::InvalidData(_))));

    let empty = engine.register_plugin(Box::new(RecordingPlugin::new("", Rc::clone(&events))));
    assert!(matches!(empty, Err(ChartError::InvalidData(_))));

    assert!(engine.unregister_plugin("p1"));
    assert!(!engine.unregister_plugin("p1"));
    assert_eq!(engine.plugin_count(), 0);

    engine
        .set_option(option(), SetOptionOpts::default())
        .expect("set option");
    assert!(events.borrow().is_empty());
}
