//! Native tool event bridge.
//!
//! Timeline events authored in the animation tool arrive from the runtime as
//! [`NativeEvent`]s. The bridge converts each one to [`EventData`] and
//! delivers it twice: to every component on the skeleton's node that exposes
//! [`NATIVE_EVENT_METHOD`], then to listeners registered for the event name.

use std::rc::Rc;

use hashbrown::HashMap;

use crate::diagnostics::Diagnostics;
use crate::error::SpineToolError;
use crate::event::EventData;
use crate::runtime::{NativeEvent, TrackEntry};
use crate::scene::{InvokeError, NodeId, Scene};
use crate::target::{CallbackResult, NATIVE_EVENT_METHOD};

/// Listener callback. Identity (for de-duplication and removal) is the `Rc`
/// allocation, so keep a clone of the `Rc` you registered.
pub type Listener = Rc<dyn Fn(&EventData) -> CallbackResult>;

/// Event-name keyed listener lists, in registration order.
#[derive(Clone, Default)]
pub struct EventListeners {
    by_event: HashMap<String, Vec<Listener>>,
}

impl std::fmt::Debug for EventListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .by_event
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("EventListeners").field("by_event", &counts).finish()
    }
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if this exact listener was already registered for `event`.
    pub fn add(&mut self, event: &str, listener: Listener) -> bool {
        let list = self.by_event.entry(event.to_string()).or_default();
        if list.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            return false;
        }
        list.push(listener);
        true
    }

    /// Returns false if the listener was not registered.
    pub fn remove(&mut self, event: &str, listener: &Listener) -> bool {
        let Some(list) = self.by_event.get_mut(event) else {
            return false;
        };
        let before = list.len();
        list.retain(|l| !Rc::ptr_eq(l, listener));
        let removed = list.len() != before;
        if list.is_empty() {
            self.by_event.remove(event);
        }
        removed
    }

    pub fn remove_all(&mut self, event: &str) -> usize {
        self.by_event.remove(event).map_or(0, |l| l.len())
    }

    pub fn clear(&mut self) {
        self.by_event.clear();
    }

    pub fn len(&self, event: &str) -> usize {
        self.by_event.get(event).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.by_event.is_empty()
    }

    /// Call every listener for `data.event_name`. Failures are reported and
    /// do not stop the remaining listeners. Returns how many succeeded.
    pub fn dispatch(&self, data: &EventData, diagnostics: &Diagnostics) -> usize {
        let Some(list) = self.by_event.get(&data.event_name) else {
            return 0;
        };
        let mut ok = 0;
        for listener in list {
            match listener(data) {
                Ok(()) => ok += 1,
                Err(source) => diagnostics.error(&SpineToolError::InvocationFailure {
                    callback: format!("listener '{}'", data.event_name),
                    source,
                }),
            }
        }
        ok
    }
}

/// Counts of successful deliveries for one native event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    pub components: usize,
    pub listeners: usize,
}

#[derive(Debug, Default)]
pub struct NativeEventBridge {
    listeners: EventListeners,
}

impl NativeEventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listeners(&self) -> &EventListeners {
        &self.listeners
    }

    pub fn listeners_mut(&mut self) -> &mut EventListeners {
        &mut self.listeners
    }

    /// Payload for a native event raised by `entry`.
    pub fn event_data(entry: &TrackEntry, event: &NativeEvent) -> EventData {
        let normalized_time = if entry.duration > 0.0 {
            (event.time / entry.duration).clamp(0.0, 1.0)
        } else {
            0.0
        };
        EventData {
            event_name: event.name.clone(),
            animation_name: entry.animation_name.clone(),
            normalized_time,
            track_time: event.track_time,
            string_param: event.string_value.clone(),
            int_param: event.int_value,
            float_param: event.float_value,
        }
    }

    pub fn deliver(
        &self,
        node: NodeId,
        entry: &TrackEntry,
        event: &NativeEvent,
        scene: &mut Scene,
        diagnostics: &Diagnostics,
    ) -> Delivery {
        let data = Self::event_data(entry, event);
        tracing::debug!(%data, "native event");

        let mut delivery = Delivery::default();
        for id in scene.components_of(node) {
            let invoker = scene
                .component(id)
                .and_then(|c| c.meta().method(NATIVE_EVENT_METHOD))
                .filter(|m| m.invoker.arity().is_some())
                .map(|m| m.invoker.clone());
            let Some(invoker) = invoker else {
                continue;
            };
            match scene.invoke(id, &invoker, &data) {
                Ok(()) => delivery.components += 1,
                Err(InvokeError::Destroyed) => {}
                Err(InvokeError::Failed(source)) => {
                    diagnostics.error(&SpineToolError::InvocationFailure {
                        callback: NATIVE_EVENT_METHOD.to_string(),
                        source,
                    })
                }
            }
        }

        delivery.listeners = self.listeners.dispatch(&data, diagnostics);
        delivery
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::ErrorKind;

    fn counter() -> (Rc<RefCell<Vec<String>>>, Listener) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let listener: Listener = Rc::new(move |d: &EventData| -> CallbackResult {
            sink.borrow_mut().push(d.event_name.clone());
            Ok(())
        });
        (seen, listener)
    }

    #[test]
    fn registration_is_idempotent() {
        let mut listeners = EventListeners::new();
        let (seen, listener) = counter();
        assert!(listeners.add("hit", listener.clone()));
        assert!(!listeners.add("hit", listener.clone()));
        assert_eq!(listeners.len("hit"), 1);

        let (_, stranger) = counter();
        assert!(!listeners.remove("hit", &stranger));
        assert!(!listeners.remove("miss", &listener));

        let data = EventData::new("hit", "attack", 0.5, 1.0);
        assert_eq!(listeners.dispatch(&data, &Diagnostics::default()), 1);
        assert_eq!(seen.borrow().len(), 1);

        assert!(listeners.remove("hit", &listener));
        assert!(listeners.is_empty());
    }

    #[test]
    fn failing_listener_does_not_stop_others() {
        let mut listeners = EventListeners::new();
        let failing: Listener = Rc::new(|_: &EventData| -> CallbackResult { anyhow::bail!("nope") });
        let (seen, ok) = counter();
        listeners.add("hit", failing);
        listeners.add("hit", ok);
        let diag = Diagnostics::default();
        let data = EventData::new("hit", "attack", 0.5, 1.0);
        assert_eq!(listeners.dispatch(&data, &diag), 1);
        assert_eq!(*seen.borrow(), ["hit"]);
        assert!(diag.has(ErrorKind::InvocationFailure));
    }
}
