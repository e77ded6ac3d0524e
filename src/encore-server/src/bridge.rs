use crate::hub::IdleHub;
use encore_core::{CoreEvent, EventListener};
use encore_protocol::Subsystem;
use std::sync::Arc;

/// Forwards backend events to the idle hub as subsystem changes.
pub struct EventBridge {
    hub: Arc<IdleHub>,
}

impl EventBridge {
    pub fn new(hub: Arc<IdleHub>) -> Self {
        Self { hub }
    }
}

impl EventListener for EventBridge {
    fn on_event(&self, event: &CoreEvent) {
        match Subsystem::for_event(event) {
            Some(subsystem) => self.hub.publish(subsystem),
            None => tracing::trace!(?event, "event has no subsystem"),
        }
    }
}
