//! # Event Queue
//!
//! The single bus owned by a [`Broker`](crate::Broker).
//!
//! ## Phases
//!
//! ```text
//!   Sync (FIFO, no runtime needed) ──ensure_async()──→ Async (min-heap by priority)
//! ```
//!
//! - **Sync:** events pushed before any consumer exists. Bare events carry no
//!   priority yet; ranked entries (explicit priority, stop sentinel) keep theirs.
//! - **Async:** lowest priority first. Bare events pushed in this phase get a
//!   fresh [`random_priority`].
//!
//! The transition is one-directional and happens at most once.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, VecDeque};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::{BrokerError, BrokerResult};
use crate::event::{random_priority, Event, Priority, STOP_PRIORITY};

/// An item carried by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// A normal event.
    Event(Event),
    /// The stop sentinel.
    Stop,
}

impl Slot {
    /// The event, or `None` for the stop sentinel.
    #[must_use]
    pub fn into_event(self) -> Option<Event> {
        match self {
            Self::Event(event) => Some(event),
            Self::Stop => None,
        }
    }
}

/// A slot paired with its ordering key.
///
/// Ordering looks at the priority only; two entries with equal priority
/// compare equal regardless of their payload.
#[derive(Debug, Clone)]
pub struct Entry {
    priority: Priority,
    slot: Slot,
}

impl Entry {
    /// Rank an event with an explicit priority.
    #[must_use]
    pub fn new(priority: Priority, event: Event) -> Self {
        Self {
            priority,
            slot: Slot::Event(event),
        }
    }

    /// Rank an event with a fresh random priority.
    #[must_use]
    pub fn random(event: Event) -> Self {
        Self::new(random_priority(), event)
    }

    /// The stop sentinel, ranked last.
    #[must_use]
    pub fn stop() -> Self {
        Self {
            priority: STOP_PRIORITY,
            slot: Slot::Stop,
        }
    }

    /// Ordering key.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Whether this is the stop sentinel.
    #[must_use]
    pub fn is_stop(&self) -> bool {
        matches!(self.slot, Slot::Stop)
    }

    /// Discard the priority.
    #[must_use]
    pub fn into_slot(self) -> Slot {
        self.slot
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.cmp(&other.priority)
    }
}

/// Item waiting in the sync phase.
#[derive(Debug)]
enum Pending {
    Bare(Event),
    Ranked(Entry),
}

impl Pending {
    fn rank(self) -> Entry {
        match self {
            Self::Bare(event) => Entry::random(event),
            Self::Ranked(entry) => entry,
        }
    }
}

#[derive(Debug)]
enum Phase {
    Sync(VecDeque<Pending>),
    Async(BinaryHeap<Reverse<Entry>>),
}

impl Phase {
    fn len(&self) -> usize {
        match self {
            Self::Sync(pending) => pending.len(),
            Self::Async(heap) => heap.len(),
        }
    }
}

/// The broker's bus.
///
/// Safe to share between tasks; all state sits behind one short-lived lock
/// and waiters park on [`Notify`].
#[derive(Debug)]
pub struct EventQueue {
    phase: Mutex<Phase>,

    /// Maximum number of queued items (`None` = unbounded).
    capacity: Option<usize>,

    /// Signalled after every push.
    items: Notify,

    /// Signalled after every pop.
    space: Notify,
}

impl EventQueue {
    /// Create an unbounded queue in the sync phase.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// Create a queue in the sync phase with an optional bound.
    #[must_use]
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            phase: Mutex::new(Phase::Sync(VecDeque::new())),
            capacity,
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    /// Upgrade to the async priority phase.
    ///
    /// Returns `true` only for the call that performed the migration; every
    /// later call is a no-op returning `false`.
    pub fn ensure_async(&self) -> bool {
        let mut phase = self.phase.lock();
        let Phase::Sync(pending) = &mut *phase else {
            return false;
        };

        let drained = std::mem::take(pending);
        let migrated = drained.len();
        let heap: BinaryHeap<_> = drained.into_iter().map(|p| Reverse(p.rank())).collect();
        *phase = Phase::Async(heap);
        drop(phase);

        info!(migrated, "Event queue upgraded to async priority phase");
        true
    }

    /// Push an event without a priority, never suspending.
    ///
    /// In the async phase the event gets a random priority.
    ///
    /// # Errors
    ///
    /// `BrokerError::QueueFull` if the queue is bounded and full.
    pub fn push_event_nowait(&self, event: Event) -> BrokerResult<()> {
        self.try_push(Pending::Bare(event))
            .map_err(|_| self.full_error())
    }

    /// Push a ranked entry, never suspending.
    ///
    /// # Errors
    ///
    /// `BrokerError::QueueFull` if the queue is bounded and full.
    pub fn push_nowait(&self, entry: Entry) -> BrokerResult<()> {
        self.try_push(Pending::Ranked(entry))
            .map_err(|_| self.full_error())
    }

    /// Push a ranked entry, waiting for capacity if the queue is bounded.
    pub async fn push(&self, entry: Entry) {
        let mut item = Pending::Ranked(entry);
        loop {
            let space = self.space.notified();
            match self.try_push(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    space.await;
                }
            }
        }
    }

    /// Remove the lowest-priority item, waiting until one is available.
    ///
    /// Upgrades the queue to the async phase first. Cancel-safe: dropping the
    /// future never loses an item.
    pub async fn pop(&self) -> Slot {
        self.ensure_async();
        loop {
            let notified = self.items.notified();
            if let Some(slot) = self.try_pop() {
                return slot;
            }
            notified.await;
        }
    }

    /// Remove the next item if one is queued.
    ///
    /// In the sync phase items come out in insertion order.
    pub fn try_pop(&self) -> Option<Slot> {
        let popped = {
            let mut phase = self.phase.lock();
            match &mut *phase {
                Phase::Sync(pending) => pending.pop_front().map(|p| match p {
                    Pending::Bare(event) => (None, false, Slot::Event(event)),
                    Pending::Ranked(entry) => {
                        (Some(entry.priority()), entry.is_stop(), entry.into_slot())
                    }
                }),
                Phase::Async(heap) => heap.pop().map(|Reverse(entry)| {
                    (Some(entry.priority()), entry.is_stop(), entry.into_slot())
                }),
            }
        };

        let (priority, stop, slot) = popped?;
        debug!(?priority, stop, "Dequeued item");
        self.space.notify_one();
        Some(slot)
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.phase.lock().len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the queue has been upgraded to the async phase.
    #[must_use]
    pub fn is_async(&self) -> bool {
        matches!(*self.phase.lock(), Phase::Async(_))
    }

    /// Configured bound, if any.
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn try_push(&self, item: Pending) -> Result<(), Pending> {
        {
            let mut phase = self.phase.lock();
            if self.capacity.is_some_and(|cap| phase.len() >= cap) {
                return Err(item);
            }
            match &mut *phase {
                Phase::Sync(pending) => pending.push_back(item),
                Phase::Async(heap) => heap.push(Reverse(item.rank())),
            }
        }
        self.items.notify_one();
        Ok(())
    }

    fn full_error(&self) -> BrokerError {
        BrokerError::QueueFull {
            capacity: self.capacity.unwrap_or_default(),
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
