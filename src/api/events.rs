use std::fmt;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use crate::render::Renderer;

use super::ChartEngine;

pub const EVENT_UPDATED: &str = "updated";
pub const EVENT_RENDERED: &str = "rendered";
pub const EVENT_FINISHED: &str = "finished";

/// Public message delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartEvent {
    pub name: String,
    pub body: Map<String, Value>,
}

impl ChartEvent {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            body: Map::new(),
        }
    }

    #[must_use]
    pub fn with_body(name: impl Into<String>, body: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }
}

pub type EventListener = Box<dyn FnMut(&ChartEvent)>;

/// Listeners keyed by lower-cased event name, in subscription order.
#[derive(Default)]
pub(super) struct EventListeners {
    listeners: IndexMap<String, Vec<EventListener>>,
}

impl EventListeners {
    fn on(&mut self, name: &str, listener: EventListener) {
        self.listeners
            .entry(name.to_lowercase())
            .or_default()
            .push(listener);
    }

    fn off(&mut self, name: &str) -> usize {
        self.listeners
            .shift_remove(&name.to_lowercase())
            .map_or(0, |removed| removed.len())
    }

    pub(super) fn trigger(&mut self, event: &ChartEvent) {
        trace!(event = %event.name, "chart event");
        if let Some(listeners) = self.listeners.get_mut(&event.name) {
            for listener in listeners {
                listener(event);
            }
        }
    }

    pub(super) fn clear(&mut self) {
        self.listeners.clear();
    }

    fn count(&self, name: &str) -> usize {
        self.listeners
            .get(&name.to_lowercase())
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(&str, usize)> = self
            .listeners
            .iter()
            .map(|(name, listeners)| (name.as_str(), listeners.len()))
            .collect();
        f.debug_struct("EventListeners")
            .field("listeners", &counts)
            .finish()
    }
}

impl<R: Renderer> ChartEngine<R> {
    /// Subscribes to `event` (case-insensitive).
    pub fn on(&mut self, event: &str, listener: impl FnMut(&ChartEvent) + 'static) {
        self.core.runtime.listeners.on(event, Box::new(listener));
    }

    /// Removes every listener of `event`; returns how many were removed.
    pub fn off(&mut self, event: &str) -> usize {
        self.core.runtime.listeners.off(event)
    }

    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.core.runtime.listeners.count(event)
    }

    pub(super) fn trigger_event(&mut self, event: ChartEvent) {
        self.core.runtime.listeners.trigger(&event);
    }

    pub(super) fn trigger_updated_event(&mut self, silent: bool) {
        if !silent {
            self.trigger_event(ChartEvent::new(EVENT_UPDATED));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{ChartEvent, EventListeners};

    #[test]
    fn listeners_are_case_insensitive_and_removable() {
        let mut listeners = EventListeners::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        listeners.on(
            "selectChanged",
            Box::new(move |event: &ChartEvent| sink.borrow_mut().push(event.name.clone())),
        );

        listeners.trigger(&ChartEvent::new("selectchanged"));
        listeners.trigger(&ChartEvent::new("other"));
        assert_eq!(*seen.borrow(), vec!["selectchanged".to_owned()]);

        assert_eq!(listeners.off("SELECTCHANGED"), 1);
        listeners.trigger(&ChartEvent::new("selectchanged"));
        assert_eq!(seen.borrow().len(), 1);
    }
}
