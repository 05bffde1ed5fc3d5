//! Typed farm signals with buffered, batch delivery.
//!
//! Ledger and item lifecycle code emit [`Event`]s while a farm operation runs;
//! the farm delivers them to subscribers once the operation has finished, so
//! listeners always observe a consistent state. Each event kind has its own
//! fixed-capacity [`EventBuffer`].
//!
//! # Subscriber Types
//!
//! - **Passive listeners**: read-only, used for HUD updates, audio, analytics.
//! - **Reactive handlers**: return [`Command`]s that the farm applies at the
//!   start of the next frame.
//!
//! Every registration returns a [`SubscriptionId`] that can be passed to
//! [`EventBus::unsubscribe`].

use crate::command_queue::Command;
use crate::grid::GridPosition;
use crate::id::{ItemId, ItemKindId, SubscriptionId};
use crate::item::RemovalReason;
use crate::resource::{Balances, ResourceKind};
use slotmap::SlotMap;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// A farm signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // -- Ledger --
    ResourcesChanged {
        balances: Balances,
    },
    GoalReached {
        resource: ResourceKind,
        balance: u32,
    },
    MoneyDepleted,

    // -- Item lifecycle --
    ItemPlaced {
        item: ItemId,
        kind: ItemKindId,
        cell: GridPosition,
    },
    StageAdvanced {
        item: ItemId,
        stage: usize,
    },
    YieldPosted {
        item: ItemId,
        resource: ResourceKind,
        amount: u32,
    },
    YieldCollected {
        item: ItemId,
        resource: ResourceKind,
        amount: u32,
    },
    NeedConsumed {
        item: ItemId,
        resource: ResourceKind,
        amount: u32,
    },
    ItemRemoved {
        item: ItemId,
        cell: GridPosition,
        reason: RemovalReason,
    },
}

/// Discriminant tag for event types, used for subscription and suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ResourcesChanged,
    GoalReached,
    MoneyDepleted,
    ItemPlaced,
    StageAdvanced,
    YieldPosted,
    YieldCollected,
    NeedConsumed,
    ItemRemoved,
}

/// Total number of event kinds.
const EVENT_KIND_COUNT: usize = 9;

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ResourcesChanged { .. } => EventKind::ResourcesChanged,
            Event::GoalReached { .. } => EventKind::GoalReached,
            Event::MoneyDepleted => EventKind::MoneyDepleted,
            Event::ItemPlaced { .. } => EventKind::ItemPlaced,
            Event::StageAdvanced { .. } => EventKind::StageAdvanced,
            Event::YieldPosted { .. } => EventKind::YieldPosted,
            Event::YieldCollected { .. } => EventKind::YieldCollected,
            Event::NeedConsumed { .. } => EventKind::NeedConsumed,
            Event::ItemRemoved { .. } => EventKind::ItemRemoved,
        }
    }

    /// The item this event concerns, if any.
    pub fn item(&self) -> Option<ItemId> {
        match self {
            Event::ItemPlaced { item, .. }
            | Event::StageAdvanced { item, .. }
            | Event::YieldPosted { item, .. }
            | Event::YieldCollected { item, .. }
            | Event::NeedConsumed { item, .. }
            | Event::ItemRemoved { item, .. } => Some(*item),
            Event::ResourcesChanged { .. } | Event::GoalReached { .. } | Event::MoneyDepleted => {
                None
            }
        }
    }
}

impl EventKind {
    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// EventBuffer
// ---------------------------------------------------------------------------

/// A pre-allocated ring buffer. When full, the oldest event is overwritten.
#[derive(Debug)]
pub struct EventBuffer {
    slots: Vec<Option<Event>>,
    /// Next write position.
    head: usize,
    len: usize,
    /// Events ever written, including overwritten ones.
    total_written: u64,
    dropped: u64,
}

impl EventBuffer {
    /// Create a buffer. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
            total_written: 0,
            dropped: 0,
        }
    }

    pub fn push(&mut self, event: Event) {
        let capacity = self.capacity();
        if self.len == capacity {
            self.dropped += 1;
        }
        self.slots[self.head] = Some(event);
        self.head = (self.head + 1) % capacity;
        self.len = (self.len + 1).min(capacity);
        self.total_written += 1;
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    /// Events overwritten because the buffer was full.
    pub fn dropped_count(&self) -> u64 {
        self.dropped
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        let capacity = self.capacity();
        // Once full, `head` is the oldest entry.
        let start = if self.len < capacity { 0 } else { self.head };
        (0..self.len).filter_map(move |offset| self.slots[(start + offset) % capacity].as_ref())
    }

    /// Remove every stored event. `total_written` is a lifetime counter and
    /// is not reset.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A passive listener receives events read-only.
pub type PassiveListener = Box<dyn FnMut(&Event)>;

/// A reactive handler returns commands to apply at the next frame.
pub type ReactiveHandler = Box<dyn FnMut(&Event) -> Vec<Command>>;

/// Optional predicate that filters events for a subscriber.
pub type EventFilter = Box<dyn Fn(&Event) -> bool>;

/// Delivery priority. Lower priorities run first; ties keep registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubscriberPriority {
    Pre = 0,
    Normal = 1,
    Post = 2,
}

enum Subscriber {
    Passive(PassiveListener),
    Reactive(ReactiveHandler),
}

struct SubscriberEntry {
    kind: EventKind,
    subscriber: Subscriber,
    priority: SubscriberPriority,
    filter: Option<EventFilter>,
    order: u64,
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Buffers, subscriber lists, and suppression flags for every event kind.
pub struct EventBus {
    buffers: [Option<EventBuffer>; EVENT_KIND_COUNT],
    suppressed: [bool; EVENT_KIND_COUNT],
    subscribers: SlotMap<SubscriptionId, SubscriberEntry>,
    /// Delivery order per kind, kept sorted by `(priority, order)`.
    routes: [Vec<SubscriptionId>; EVENT_KIND_COUNT],
    /// Commands returned by reactive handlers, drained by the farm.
    pending_commands: Vec<Command>,
    default_capacity: usize,
    next_order: u64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("buffers", &self.buffers)
            .field("suppressed", &self.suppressed)
            .field("subscribers", &self.subscribers.len())
            .field("pending_commands", &self.pending_commands)
            .field("default_capacity", &self.default_capacity)
            .finish_non_exhaustive()
    }
}

impl EventBus {
    /// Create a bus with the given ring buffer capacity per event kind.
    pub fn new(default_capacity: usize) -> Self {
        Self {
            buffers: Default::default(),
            suppressed: [false; EVENT_KIND_COUNT],
            subscribers: SlotMap::with_key(),
            routes: Default::default(),
            pending_commands: Vec::new(),
            default_capacity,
            next_order: 0,
        }
    }

    /// Suppress an event kind. Suppressed events are never buffered.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.buffers[kind.index()] = None;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    /// Buffer an event for the next delivery. No-op if its kind is suppressed.
    pub fn emit(&mut self, event: Event) {
        let idx = event.kind().index();
        if self.suppressed[idx] {
            return;
        }
        let capacity = self.default_capacity;
        self.buffers[idx]
            .get_or_insert_with(|| EventBuffer::new(capacity))
            .push(event);
    }

    /// Register a passive listener with normal priority and no filter.
    pub fn on_passive(&mut self, kind: EventKind, listener: PassiveListener) -> SubscriptionId {
        self.register(kind, Subscriber::Passive(listener), SubscriberPriority::Normal, None)
    }

    /// Register a reactive handler with normal priority and no filter.
    pub fn on_reactive(&mut self, kind: EventKind, handler: ReactiveHandler) -> SubscriptionId {
        self.register(kind, Subscriber::Reactive(handler), SubscriberPriority::Normal, None)
    }

    pub fn on_passive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        listener: PassiveListener,
    ) -> SubscriptionId {
        self.register(kind, Subscriber::Passive(listener), priority, filter)
    }

    pub fn on_reactive_filtered(
        &mut self,
        kind: EventKind,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
        handler: ReactiveHandler,
    ) -> SubscriptionId {
        self.register(kind, Subscriber::Reactive(handler), priority, filter)
    }

    fn register(
        &mut self,
        kind: EventKind,
        subscriber: Subscriber,
        priority: SubscriberPriority,
        filter: Option<EventFilter>,
    ) -> SubscriptionId {
        let order = self.next_order;
        self.next_order += 1;
        let id = self.subscribers.insert(SubscriberEntry {
            kind,
            subscriber,
            priority,
            filter,
            order,
        });

        let subscribers = &self.subscribers;
        let route = &mut self.routes[kind.index()];
        route.push(id);
        route.sort_by_key(|sid| {
            let entry = &subscribers[*sid];
            (entry.priority, entry.order)
        });
        id
    }

    /// Remove a subscription. Returns false if it was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(entry) = self.subscribers.remove(id) else {
            return false;
        };
        self.routes[entry.kind.index()].retain(|&sid| sid != id);
        true
    }

    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.routes[kind.index()].len()
    }

    /// Deliver all buffered events, kind by kind. Each subscriber sees the
    /// events of its kind oldest-first; buffers are cleared afterwards.
    pub fn deliver(&mut self) {
        for idx in 0..EVENT_KIND_COUNT {
            let Some(buffer) = self.buffers[idx].as_mut() else {
                continue;
            };
            if buffer.is_empty() {
                continue;
            }
            let events: Vec<Event> = buffer.iter().cloned().collect();
            buffer.clear();

            for &sid in &self.routes[idx] {
                let Some(entry) = self.subscribers.get_mut(sid) else {
                    continue;
                };
                for event in &events {
                    if let Some(filter) = &entry.filter
                        && !filter(event)
                    {
                        continue;
                    }
                    match &mut entry.subscriber {
                        Subscriber::Passive(listener) => listener(event),
                        Subscriber::Reactive(handler) => {
                            self.pending_commands.extend(handler(event));
                        }
                    }
                }
            }
        }
    }

    /// Take the commands produced by reactive handlers.
    pub fn drain_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending_commands)
    }

    pub fn pending_command_count(&self) -> usize {
        self.pending_commands.len()
    }

    pub fn buffer(&self, kind: EventKind) -> Option<&EventBuffer> {
        self.buffers[kind.index()].as_ref()
    }

    /// Events of a kind waiting for delivery.
    pub fn buffered_count(&self, kind: EventKind) -> usize {
        self.buffer(kind).map_or(0, EventBuffer::len)
    }

    /// Events of a kind ever emitted, including dropped ones.
    pub fn total_emitted(&self, kind: EventKind) -> u64 {
        self.buffer(kind).map_or(0, EventBuffer::total_written)
    }

    /// Clear all buffers and pending commands. Subscribers are kept.
    pub fn clear_all(&mut self) {
        for buffer in self.buffers.iter_mut().flatten() {
            buffer.clear();
        }
        self.pending_commands.clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn item_id() -> ItemId {
        let mut sm = SlotMap::<ItemId, ()>::with_key();
        sm.insert(())
    }

    fn posted(amount: u32) -> Event {
        Event::YieldPosted {
            item: item_id(),
            resource: ResourceKind::Egg,
            amount,
        }
    }

    fn amount_of(event: &Event) -> u32 {
        match event {
            Event::YieldPosted { amount, .. } => *amount,
            other => panic!("unexpected event {other:?}"),
        }
    }

    // -----------------------------------------------------------------------
    // EventBuffer
    // -----------------------------------------------------------------------

    #[test]
    fn buffer_push_and_iterate_oldest_first() {
        let mut buf = EventBuffer::new(8);
        buf.push(posted(5));
        buf.push(posted(3));

        assert_eq!(buf.len(), 2);
        assert_eq!(buf.dropped_count(), 0);
        let amounts: Vec<u32> = buf.iter().map(amount_of).collect();
        assert_eq!(amounts, vec![5, 3]);
    }

    #[test]
    fn buffer_wraps_and_drops_oldest() {
        let mut buf = EventBuffer::new(3);
        for i in 0..5 {
            buf.push(posted(i));
        }
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.total_written(), 5);
        assert_eq!(buf.dropped_count(), 2);
        let amounts: Vec<u32> = buf.iter().map(amount_of).collect();
        assert_eq!(amounts, vec![2, 3, 4]);
        assert_eq!(buf.iter().count(), 3);
    }

    #[test]
    fn buffer_clear_keeps_lifetime_counter() {
        let mut buf = EventBuffer::new(4);
        buf.push(Event::MoneyDepleted);
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.total_written(), 1);
    }

    #[test]
    fn buffer_zero_capacity_clamped() {
        let mut buf = EventBuffer::new(0);
        assert_eq!(buf.capacity(), 1);
        buf.push(posted(1));
        buf.push(posted(2));
        let amounts: Vec<u32> = buf.iter().map(amount_of).collect();
        assert_eq!(amounts, vec![2]);
    }

    // -----------------------------------------------------------------------
    // EventBus
    // -----------------------------------------------------------------------

    #[test]
    fn emit_buffers_per_kind() {
        let mut bus = EventBus::new(16);
        bus.emit(posted(1));
        bus.emit(posted(2));
        bus.emit(Event::MoneyDepleted);
        assert_eq!(bus.buffered_count(EventKind::YieldPosted), 2);
        assert_eq!(bus.buffered_count(EventKind::MoneyDepleted), 1);
        assert_eq!(bus.buffered_count(EventKind::ItemPlaced), 0);
    }

    #[test]
    fn suppressed_kind_never_buffers() {
        let mut bus = EventBus::new(16);
        bus.suppress(EventKind::YieldPosted);
        bus.emit(posted(1));
        assert!(bus.is_suppressed(EventKind::YieldPosted));
        assert!(bus.buffer(EventKind::YieldPosted).is_none());
        assert_eq!(bus.total_emitted(EventKind::YieldPosted), 0);
    }

    #[test]
    fn passive_listeners_receive_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new(16);
        for tag in ["first", "second"] {
            let log = log.clone();
            bus.on_passive(
                EventKind::MoneyDepleted,
                Box::new(move |_| log.borrow_mut().push(tag)),
            );
        }
        bus.emit(Event::MoneyDepleted);
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["first", "second"]);
        assert_eq!(bus.buffered_count(EventKind::MoneyDepleted), 0);
    }

    #[test]
    fn priorities_order_delivery() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new(16);
        for (tag, priority) in [
            ("post", SubscriberPriority::Post),
            ("normal", SubscriberPriority::Normal),
            ("pre", SubscriberPriority::Pre),
        ] {
            let log = log.clone();
            bus.on_passive_filtered(
                EventKind::MoneyDepleted,
                priority,
                None,
                Box::new(move |_| log.borrow_mut().push(tag)),
            );
        }
        bus.emit(Event::MoneyDepleted);
        bus.deliver();
        assert_eq!(*log.borrow(), vec!["pre", "normal", "post"]);
    }

    #[test]
    fn filter_skips_non_matching_events() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut bus = EventBus::new(16);
        let inner = seen.clone();
        bus.on_passive_filtered(
            EventKind::YieldPosted,
            SubscriberPriority::Normal,
            Some(Box::new(|e| amount_of(e) > 2)),
            Box::new(move |e| inner.borrow_mut().push(amount_of(e))),
        );
        for i in 0..5 {
            bus.emit(posted(i));
        }
        bus.deliver();
        assert_eq!(*seen.borrow(), vec![3, 4]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let count = Rc::new(RefCell::new(0));
        let mut bus = EventBus::new(16);
        let inner = count.clone();
        let id = bus.on_passive(
            EventKind::MoneyDepleted,
            Box::new(move |_| *inner.borrow_mut() += 1),
        );
        bus.emit(Event::MoneyDepleted);
        bus.deliver();
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.subscriber_count(EventKind::MoneyDepleted), 0);
        bus.emit(Event::MoneyDepleted);
        bus.deliver();
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn reactive_handlers_queue_commands() {
        let mut bus = EventBus::new(16);
        bus.on_reactive(
            EventKind::YieldPosted,
            Box::new(|e| match e.item() {
                Some(item) => vec![Command::Collect { item }],
                None => Vec::new(),
            }),
        );
        bus.emit(posted(1));
        bus.emit(posted(2));
        bus.deliver();
        assert_eq!(bus.pending_command_count(), 2);
        let commands = bus.drain_commands();
        assert!(matches!(commands[0], Command::Collect { .. }));
        assert_eq!(bus.pending_command_count(), 0);
    }

    #[test]
    fn clear_all_keeps_subscribers() {
        let mut bus = EventBus::new(16);
        bus.on_passive(EventKind::MoneyDepleted, Box::new(|_| {}));
        bus.emit(Event::MoneyDepleted);
        bus.clear_all();
        assert_eq!(bus.buffered_count(EventKind::MoneyDepleted), 0);
        assert_eq!(bus.subscriber_count(EventKind::MoneyDepleted), 1);
    }

    #[test]
    fn event_item_accessor() {
        assert!(posted(1).item().is_some());
        assert!(Event::MoneyDepleted.item().is_none());
        assert_eq!(posted(1).kind(), EventKind::YieldPosted);
    }
}
