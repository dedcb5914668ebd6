//! Event bus (§4.6): decoupled pub/sub for value-typed events. Frame
//! coherent: `emit` enqueues into the pending queue, `process_events`
//! drains a snapshot exactly once per frame so a listener's own emissions
//! are only visible on the *next* drain, never the current one.

use std::any::{Any, TypeId};
use std::collections::{HashMap, VecDeque};

/// One type's event queue plus its subscriber list. Monomorphic: storing
/// `T` directly (never `Box<dyn Any>` per-event) is what keeps steady-state
/// emit/drain allocation-free once the queues' capacity has settled.
struct EventChannel<T> {
    /// Events queued this frame, not yet visible to `process_events`.
    pending: VecDeque<T>,
    /// Snapshot currently being drained; re-entrant emits during listener
    /// calls land in `pending`, not here.
    draining: VecDeque<T>,
    listeners: Vec<Listener<T>>,
    /// Recycled event values, so producers can avoid allocating when `T`
    /// owns heap data.
    free_list: Vec<T>,
}

struct Listener<T> {
    id: u64,
    handler: Box<dyn FnMut(&T) -> Result<(), String>>,
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            draining: VecDeque::new(),
            listeners: Vec::new(),
            free_list: Vec::new(),
        }
    }
}

/// Handle returned by `subscribe`, used to `unsubscribe` later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    channels: HashMap<TypeId, Box<dyn Any>>,
    next_subscription_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel_mut<T: 'static>(&mut self) -> &mut EventChannel<T> {
        self.channels
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(EventChannel::<T>::default()))
            .downcast_mut::<EventChannel<T>>()
            .expect("event channel type mismatch")
    }

    /// Enqueues `event` for delivery on the next `process_events` call.
    pub fn emit<T: 'static>(&mut self, event: T) {
        self.channel_mut::<T>().pending.push_back(event);
    }

    /// Subscribes a listener to every future delivery of `T`. The listener
    /// returning `Err` is treated as "the listener threw": it is removed
    /// and the error is reported via `log::error!`, but the bus itself
    /// never propagates the error to the caller of `process_events`.
    pub fn subscribe<T, F>(&mut self, handler: F) -> SubscriptionId
    where
        T: 'static,
        F: FnMut(&T) -> Result<(), String> + 'static,
    {
        let id = self.next_subscription_id;
        self.next_subscription_id += 1;
        self.channel_mut::<T>().listeners.push(Listener { id, handler: Box::new(handler) });
        SubscriptionId(id)
    }

    pub fn unsubscribe<T: 'static>(&mut self, id: SubscriptionId) {
        self.channel_mut::<T>().listeners.retain(|l| l.id != id.0);
    }

    /// Drains this frame's pending events (for type `T`) through every
    /// subscribed listener, in subscription order. Events emitted by a
    /// listener during this call land in `pending` and are not visited
    /// until the next `process_events::<T>()`.
    pub fn process_events<T: 'static>(&mut self) {
        let channel = self.channel_mut::<T>();
        std::mem::swap(&mut channel.draining, &mut channel.pending);

        while let Some(event) = channel.draining.pop_front() {
            let mut failed_ids = Vec::new();
            for listener in &mut channel.listeners {
                if let Err(reason) = (listener.handler)(&event) {
                    log::error!(target: "core_events", "listener {} failed and was removed: {reason}", listener.id);
                    failed_ids.push(listener.id);
                }
            }
            if !failed_ids.is_empty() {
                channel.listeners.retain(|l| !failed_ids.contains(&l.id));
            }
            channel.free_list.push(event);
        }
    }

    /// Returns a recycled `T` value if the free list is non-empty, letting
    /// producers reuse storage (e.g. a `Vec` inside the event) instead of
    /// allocating fresh.
    pub fn recycle<T: 'static>(&mut self) -> Option<T> {
        self.channel_mut::<T>().free_list.pop()
    }

    pub fn pending_len<T: 'static>(&mut self) -> usize {
        self.channel_mut::<T>().pending.len()
    }

    pub fn listener_count<T: 'static>(&mut self) -> usize {
        self.channel_mut::<T>().listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Copy)]
    struct Pinged(u32);

    #[test]
    fn test_emit_not_visible_until_process() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        bus.subscribe::<Pinged, _>(move |e| {
            seen_clone.borrow_mut().push(e.0);
            Ok(())
        });

        bus.emit(Pinged(1));
        assert!(seen.borrow().is_empty());

        bus.process_events::<Pinged>();
        assert_eq!(*seen.borrow(), vec![1]);
    }

    #[test]
    fn test_reentrant_emit_deferred_to_next_frame() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        bus.emit(Pinged(1));

        // First drain: listener re-emits, which must not be seen this frame.
        let seen_for_listener = seen.clone();
        bus.subscribe::<Pinged, _>(move |e| {
            seen_for_listener.borrow_mut().push(e.0);
            Ok(())
        });

        bus.process_events::<Pinged>();
        assert_eq!(*seen.borrow(), vec![1]);

        bus.emit(Pinged(2));
        bus.process_events::<Pinged>();
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }

    #[test]
    fn test_failing_listener_is_removed() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0));
        let calls_clone = calls.clone();

        bus.subscribe::<Pinged, _>(move |_| {
            *calls_clone.borrow_mut() += 1;
            Err("boom".into())
        });

        bus.emit(Pinged(1));
        bus.process_events::<Pinged>();
        assert_eq!(*calls.borrow(), 1);
        assert_eq!(bus.listener_count::<Pinged>(), 0);

        bus.emit(Pinged(2));
        bus.process_events::<Pinged>();
        assert_eq!(*calls.borrow(), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let mut bus = EventBus::new();
        let calls = Rc::new(RefCell::new(0));
        let calls_clone = calls.clone();

        let id = bus.subscribe::<Pinged, _>(move |_| {
            *calls_clone.borrow_mut() += 1;
            Ok(())
        });

        bus.unsubscribe::<Pinged>(id);
        bus.emit(Pinged(1));
        bus.process_events::<Pinged>();
        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_free_list_recycles_processed_events() {
        let mut bus = EventBus::new();
        bus.emit(Pinged(7));
        bus.process_events::<Pinged>();
        let recycled = bus.recycle::<Pinged>();
        assert_eq!(recycled.map(|p| p.0), Some(7));
    }
}
