//! Listener that records topology events for assertions

use parking_lot::Mutex;
use sqlgraph::{TopologyChangeAction, TopologyEvent, TopologyListener};
use std::sync::Arc;

#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<TopologyEvent>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<TopologyEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<TopologyEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count(&self, action: TopologyChangeAction) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.action == action)
            .count()
    }

    /// Event descriptions, e.g. `CREATE vertex label public.A`
    pub fn descriptions(&self) -> Vec<String> {
        self.events.lock().iter().map(|event| event.to_string()).collect()
    }
}

impl TopologyListener for EventRecorder {
    fn on_change(&self, event: &TopologyEvent) -> Result<(), String> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        "event-recorder"
    }
}
