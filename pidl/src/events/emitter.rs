//! Multi-listener event fan-out.

use super::{EventKind, PipelineEvent};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// A subscriber callback. Removal compares `Arc` identity, so keep a clone
/// of the handler you registered if you intend to remove it later.
pub type EventHandler = Arc<dyn Fn(&PipelineEvent) + Send + Sync>;

/// Multi-listener pub/sub used by tasks and pipelines.
///
/// Delivery order matches subscription order; emission is synchronous on the
/// caller's thread. Handler lists are cloned out before invocation, so a
/// handler may subscribe or unsubscribe without deadlocking the emitter.
#[derive(Default)]
pub struct EventEmitter {
    handlers: Mutex<HashMap<EventKind, Vec<EventHandler>>>,
    any_handlers: Mutex<Vec<EventHandler>>,
}

impl EventEmitter {
    /// Creates an emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a handler to one event kind.
    pub fn on(&self, kind: EventKind, handler: EventHandler) {
        self.handlers.lock().entry(kind).or_default().push(handler);
    }

    /// Subscribes a handler to every event. Used to bind one emitter's
    /// stream onto another.
    pub fn on_any(&self, handler: EventHandler) {
        self.any_handlers.lock().push(handler);
    }

    /// Removes a handler by identity. Returns true iff a handler was
    /// removed.
    pub fn remove_listener(&self, kind: EventKind, handler: &EventHandler) -> bool {
        let mut handlers = self.handlers.lock();
        let Some(subscribed) = handlers.get_mut(&kind) else {
            return false;
        };
        let before = subscribed.len();
        subscribed.retain(|h| !Arc::ptr_eq(h, handler));
        before != subscribed.len()
    }

    /// Removes a wildcard handler by identity. Returns true iff a handler
    /// was removed.
    pub fn remove_any_listener(&self, handler: &EventHandler) -> bool {
        let mut subscribed = self.any_handlers.lock();
        let before = subscribed.len();
        subscribed.retain(|h| !Arc::ptr_eq(h, handler));
        before != subscribed.len()
    }

    /// Emits an event to kind subscribers, then wildcard subscribers.
    pub fn emit(&self, event: &PipelineEvent) {
        let kind_handlers: Vec<EventHandler> = self
            .handlers
            .lock()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for handler in kind_handlers {
            handler(event);
        }

        let any_handlers: Vec<EventHandler> = self.any_handlers.lock().clone();
        for handler in any_handlers {
            handler(event);
        }
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let per_kind: HashMap<EventKind, usize> = self
            .handlers
            .lock()
            .iter()
            .map(|(kind, handlers)| (*kind, handlers.len()))
            .collect();
        f.debug_struct("EventEmitter")
            .field("handlers", &per_kind)
            .field("any_handlers", &self.any_handlers.lock().len())
            .finish()
    }
}

/// A mutex-guarded event capture buffer.
///
/// The wave dispatcher binds a buffer handler onto every concurrently
/// running task and replays the captured events on its own thread after the
/// wave completes. Also serves as the collecting observer in tests.
#[derive(Debug, Clone, Default)]
pub struct EventBuffer {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl EventBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handler that appends each observed event to the buffer.
    #[must_use]
    pub fn handler(&self) -> EventHandler {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &PipelineEvent| {
            events.lock().push(event.clone());
        })
    }

    /// Removes and returns all captured events in capture order.
    #[must_use]
    pub fn drain(&self) -> Vec<PipelineEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Returns a copy of the captured events without clearing.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PipelineEvent> {
        self.events.lock().clone()
    }

    /// Returns the number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delivery_in_subscription_order() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = Arc::clone(&seen);
            emitter.on(
                EventKind::TaskStart,
                Arc::new(move |_event| seen.lock().push(tag)),
            );
        }

        emitter.emit(&PipelineEvent::task_start("load"));
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_handlers_only_fire_for_their_kind() {
        let emitter = EventEmitter::new();
        let buffer = EventBuffer::new();
        emitter.on(EventKind::TaskEnd, buffer.handler());

        emitter.emit(&PipelineEvent::task_start("load"));
        assert!(buffer.is_empty());

        emitter.emit(&PipelineEvent::task_end("load", 3));
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_subscribe_then_remove_round_trip() {
        let emitter = EventEmitter::new();
        let buffer = EventBuffer::new();
        let handler = buffer.handler();

        emitter.on(EventKind::TaskStart, handler.clone());
        assert!(emitter.remove_listener(EventKind::TaskStart, &handler));

        emitter.emit(&PipelineEvent::task_start("load"));
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_remove_unknown_handler_is_false() {
        let emitter = EventEmitter::new();
        let handler: EventHandler = Arc::new(|_event| {});
        assert!(!emitter.remove_listener(EventKind::TaskStart, &handler));
    }

    #[test]
    fn test_wildcard_handler_sees_everything() {
        let emitter = EventEmitter::new();
        let buffer = EventBuffer::new();
        let handler = buffer.handler();
        emitter.on_any(handler.clone());

        emitter.emit(&PipelineEvent::task_start("load"));
        emitter.emit(&PipelineEvent::action_start("FnAction:load:execute"));
        assert_eq!(buffer.len(), 2);

        assert!(emitter.remove_any_listener(&handler));
        emitter.emit(&PipelineEvent::task_end("load", 1));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_buffer_drain_clears_in_order() {
        let buffer = EventBuffer::new();
        let handler = buffer.handler();
        handler(&PipelineEvent::task_start("a"));
        handler(&PipelineEvent::task_start("b"));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0], PipelineEvent::task_start("a"));
        assert!(buffer.is_empty());
    }
}
