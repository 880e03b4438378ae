//! Synchronous publish/subscribe bus for gameplay signals.
//!
//! The bus is an explicitly constructed value. Cloning it yields another handle
//! to the same registry, which is how the input adapter, the character and the
//! HUD all talk to each other without knowing about one another.
//!
//! Handlers run on the publisher's call stack, in subscription order. The
//! registry lock is released before any handler runs, so a handler may publish
//! (or subscribe) again. Signal cycles are not detected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bevy::prelude::*;

use crate::error::HandlerError;

/// Every signal the bus knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    // Input requests, published by the input adapter.
    JumpRequested,
    AttackRequested,
    InteractRequested,
    /// Carries the new sprint-held flag.
    SprintToggled,
    /// Carries the new zoom-held flag.
    ZoomToggled,
    InventoryRequested,

    // Character notifications.
    StaminaChanged,
    Jumped,
    Landed,
    Dead,
    Respawned,
    WeaponFired,
    InteractionCompleted,
}

impl Signal {
    /// Signals produced by the input adapter.
    pub const INPUT: [Signal; 6] = [
        Signal::JumpRequested,
        Signal::AttackRequested,
        Signal::InteractRequested,
        Signal::SprintToggled,
        Signal::ZoomToggled,
        Signal::InventoryRequested,
    ];

    /// Signals produced by the character for UI, audio and friends.
    pub const NOTIFICATIONS: [Signal; 7] = [
        Signal::StaminaChanged,
        Signal::Jumped,
        Signal::Landed,
        Signal::Dead,
        Signal::Respawned,
        Signal::WeaponFired,
        Signal::InteractionCompleted,
    ];
}

/// Optional boolean payload. `None` for plain notifications.
pub type SignalArg = Option<bool>;

type Handler = Arc<dyn Fn(Signal, SignalArg) -> Result<(), HandlerError> + Send + Sync>;

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Outcome of a single publish call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    pub failures: Vec<HandlerError>,
}

impl Delivery {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: HashMap<Signal, Vec<(HandlerId, Handler)>>,
}

#[derive(Resource, Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // A handler never runs under this lock, so poisoning only means a
        // subscribe/unsubscribe panicked mid-way. The map is still usable.
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn subscribe<F>(&self, signal: Signal, handler: F) -> HandlerId
    where
        F: Fn(Signal, SignalArg) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        let id = HandlerId(registry.next_id);
        registry.next_id += 1;
        registry
            .handlers
            .entry(signal)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Removes a handler. Unknown ids are ignored.
    pub fn unsubscribe(&self, signal: Signal, id: HandlerId) {
        let mut registry = self.registry();
        if let Some(list) = registry.handlers.get_mut(&signal) {
            list.retain(|(existing, _)| *existing != id);
        }
    }

    pub fn handler_count(&self, signal: Signal) -> usize {
        self.registry()
            .handlers
            .get(&signal)
            .map_or(0, |list| list.len())
    }

    pub fn publish(&self, signal: Signal) -> Delivery {
        self.dispatch(signal, None)
    }

    pub fn publish_flag(&self, signal: Signal, flag: bool) -> Delivery {
        self.dispatch(signal, Some(flag))
    }

    fn dispatch(&self, signal: Signal, arg: SignalArg) -> Delivery {
        // Snapshot so handlers can publish or (un)subscribe re-entrantly.
        let handlers: Vec<Handler> = self
            .registry()
            .handlers
            .get(&signal)
            .map(|list| list.iter().map(|(_, handler)| Arc::clone(handler)).collect())
            .unwrap_or_default();

        let mut delivery = Delivery::default();
        for handler in handlers {
            match handler(signal, arg) {
                Ok(()) => delivery.delivered += 1,
                Err(err) => {
                    warn!("bus handler failed: {err}");
                    delivery.failures.push(err);
                }
            }
        }
        delivery
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            bus.subscribe(Signal::Jumped, move |_, _| {
                order.lock().unwrap().push(tag);
                Ok(())
            });
        }

        let delivery = bus.publish(Signal::Jumped);
        assert_eq!(delivery.delivered, 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn passes_flag_payload() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        bus.subscribe(Signal::SprintToggled, move |_, arg| {
            *sink.lock().unwrap() = arg;
            Ok(())
        });

        bus.publish_flag(Signal::SprintToggled, false);
        assert_eq!(*seen.lock().unwrap(), Some(false));
    }

    #[test]
    fn failing_handler_does_not_block_the_rest() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        bus.subscribe(Signal::Landed, |signal, _| {
            Err(HandlerError::Failed {
                signal,
                reason: "boom".into(),
            })
        });
        let counter = Arc::clone(&hits);
        bus.subscribe(Signal::Landed, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let delivery = bus.publish(Signal::Landed);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.failures.len(), 1);
        assert!(!delivery.is_clean());
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let bus = EventBus::new();
        let id = bus.subscribe(Signal::Dead, |_, _| Ok(()));
        assert_eq!(bus.handler_count(Signal::Dead), 1);

        bus.unsubscribe(Signal::Dead, id);
        bus.unsubscribe(Signal::Dead, id);
        bus.unsubscribe(Signal::Respawned, id);
        assert_eq!(bus.handler_count(Signal::Dead), 0);
        assert_eq!(bus.publish(Signal::Dead).delivered, 0);
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let bus = EventBus::new();
        let landed = Arc::new(AtomicUsize::new(0));

        let inner = bus.clone();
        bus.subscribe(Signal::Jumped, move |_, _| {
            inner.publish(Signal::Landed);
            Ok(())
        });
        let counter = Arc::clone(&landed);
        bus.subscribe(Signal::Landed, move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish(Signal::Jumped);
        assert_eq!(landed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_one_registry() {
        let bus = EventBus::new();
        let other = bus.clone();
        other.subscribe(Signal::WeaponFired, |_, _| Ok(()));
        assert_eq!(bus.publish(Signal::WeaponFired).delivered, 1);
    }
}
