//! Inter-stage buffering.
//!
//! Two structures connect adjacent stages:
//! 1. **Latch:** A delay line. An item pushed at cycle `c` becomes visible to the consumer
//!    at `c + delay`.
//! 2. **Input buffer:** The bounded queue in front of a consuming stage. A producer reserves
//!    a slot before pushing into the latch; delivery turns the reservation into an element, so
//!    queued plus in-flight items never exceed the capacity.

use std::collections::VecDeque;

use crate::common::Cycle;

/// A fixed-delay pipe between two stages.
#[derive(Debug, Clone)]
pub struct Latch<T> {
    delay: Cycle,
    queue: VecDeque<(Cycle, T)>,
}

impl<T> Latch<T> {
    /// A latch with the given delay in cycles.
    pub const fn new(delay: Cycle) -> Self {
        Self {
            delay,
            queue: VecDeque::new(),
        }
    }

    /// Configured delay.
    pub const fn delay(&self) -> Cycle {
        self.delay
    }

    /// Sends `item` at cycle `now`.
    pub fn push(&mut self, now: Cycle, item: T) {
        self.queue.push_back((now + self.delay, item));
    }

    /// Takes the oldest item if it is visible at `now`.
    pub fn pop_ready(&mut self, now: Cycle) -> Option<T> {
        if self.queue.front().is_some_and(|&(at, _)| at <= now) {
            self.queue.pop_front().map(|(_, item)| item)
        } else {
            None
        }
    }

    /// Items still travelling.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is travelling.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Cycle at which the oldest item becomes visible, if that is after `now`.
    pub fn next_event(&self, now: Cycle) -> Option<Cycle> {
        self.queue
            .front()
            .map(|&(at, _)| at)
            .filter(|&at| at > now)
    }

    /// Items in send order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter().map(|(_, item)| item)
    }
}

/// A bounded FIFO with slot reservations.
#[derive(Debug, Clone)]
pub struct InputBuffer<T> {
    capacity: usize,
    queue: VecDeque<T>,
    reserved: usize,
    high_water: usize,
}

impl<T> InputBuffer<T> {
    /// An empty buffer holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            queue: VecDeque::with_capacity(capacity),
            reserved: 0,
            high_water: 0,
        }
    }

    /// Configured capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued items plus outstanding reservations.
    pub fn occupancy(&self) -> usize {
        self.queue.len() + self.reserved
    }

    /// Highest occupancy observed.
    pub const fn high_water(&self) -> usize {
        self.high_water
    }

    /// Whether a slot can be reserved.
    pub fn can_reserve(&self) -> bool {
        self.occupancy() < self.capacity
    }

    /// Reserves a slot for an item about to be sent. Returns false when full.
    pub fn reserve(&mut self) -> bool {
        if !self.can_reserve() {
            return false;
        }
        self.reserved += 1;
        self.high_water = self.high_water.max(self.occupancy());
        true
    }

    /// Stores an item that arrived through the latch, consuming its reservation.
    pub fn push_reserved(&mut self, item: T) {
        self.reserved = self.reserved.saturating_sub(1);
        self.queue.push_back(item);
        self.high_water = self.high_water.max(self.occupancy());
    }

    /// Oldest item.
    pub fn front(&self) -> Option<&T> {
        self.queue.front()
    }

    /// Oldest item, mutably.
    pub fn front_mut(&mut self) -> Option<&mut T> {
        self.queue.front_mut()
    }

    /// Removes the oldest item.
    pub fn pop(&mut self) -> Option<T> {
        self.queue.pop_front()
    }

    /// Queued items (reservations excluded).
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Outstanding reservations.
    pub const fn reserved(&self) -> usize {
        self.reserved
    }

    /// Queued items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.queue.iter()
    }
}
