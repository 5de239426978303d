//! # Discrete Event Scheduler
//!
//! Single-threaded, cooperative event queue that drives the beam-management
//! timers (SS block slots, burst-set re-arming, CSI refresh).
//!
//! ## Overview
//!
//! - **Ordering**: events fire in timestamp order; ties fire in registration
//!   (FIFO) order.
//! - **Suspension**: "waiting" means registering a future event with a delay
//!   and returning to the loop. Nothing blocks.
//! - **Liveness**: every event is registered against an [`OwnerToken`]. When
//!   the owner is retired or dropped, its pending events are discarded when
//!   they come due instead of being delivered.
//! - **Self-rearming timers**: a periodic timer is an event whose handler
//!   registers the next occurrence. There is no cancellation path other than
//!   retiring the owner.
//!
//! ## Example
//!
//! ```rust
//! use mmbeam_core::scheduler::{EventScheduler, OwnerToken};
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! enum Event { Tick(u32) }
//!
//! let owner = OwnerToken::new();
//! let mut sched = EventScheduler::new();
//! sched.schedule(Duration::from_millis(1), &owner, Event::Tick(0));
//!
//! let mut ticks = 0;
//! sched.run_until(Duration::from_millis(10), |s, ev| {
//!     let Event::Tick(n) = ev;
//!     ticks += 1;
//!     if n < 4 {
//!         s.schedule(Duration::from_millis(1), &owner, Event::Tick(n + 1));
//!     }
//! });
//! assert_eq!(ticks, 5);
//! ```

use std::cell::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Liveness handle for the owner of scheduled events.
///
/// Dropping the token (or calling [`OwnerToken::retire`]) turns every pending
/// event registered against it into a no-op.
#[derive(Debug)]
pub struct OwnerToken {
    alive: Rc<Cell<bool>>,
}

impl OwnerToken {
    pub fn new() -> Self {
        Self {
            alive: Rc::new(Cell::new(true)),
        }
    }

    /// Mark the owner as gone.
    pub fn retire(&self) {
        self.alive.set(false);
    }

    pub fn is_alive(&self) -> bool {
        self.alive.get()
    }

    fn watch(&self) -> Weak<Cell<bool>> {
        Rc::downgrade(&self.alive)
    }
}

impl Default for OwnerToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Event entry in the priority queue.
#[derive(Debug)]
struct ScheduledEvent<E> {
    at: Duration,
    seq: u64,
    owner: Weak<Cell<bool>>,
    event: E,
}

impl<E> ScheduledEvent<E> {
    fn owner_alive(&self) -> bool {
        self.owner.upgrade().map_or(false, |alive| alive.get())
    }
}

impl<E> PartialEq for ScheduledEvent<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for ScheduledEvent<E> {}

impl<E> Ord for ScheduledEvent<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap: earliest time first, then earliest registration
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl<E> PartialOrd for ScheduledEvent<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Statistics about scheduler operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Events registered.
    pub scheduled: u64,
    /// Events handed to a handler.
    pub delivered: u64,
    /// Events dropped because their owner was gone.
    pub discarded: u64,
}

/// Discrete event scheduler over simulated time.
///
/// Time is a [`Duration`] offset from the start of the simulation.
#[derive(Debug)]
pub struct EventScheduler<E> {
    now: Duration,
    queue: BinaryHeap<ScheduledEvent<E>>,
    next_seq: u64,
    stats: SchedulerStats,
}

impl<E> EventScheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            queue: BinaryHeap::new(),
            next_seq: 0,
            stats: SchedulerStats::default(),
        }
    }

    /// Current simulated time.
    #[inline]
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Register `event` to fire `delay` after now.
    pub fn schedule(&mut self, delay: Duration, owner: &OwnerToken, event: E) {
        self.schedule_at(self.now + delay, owner, event);
    }

    /// Register `event` at an absolute time. Times in the past fire at `now`.
    pub fn schedule_at(&mut self, at: Duration, owner: &OwnerToken, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.stats.scheduled += 1;
        self.queue.push(ScheduledEvent {
            at: at.max(self.now),
            seq,
            owner: owner.watch(),
            event,
        });
    }

    /// Time of the next pending event, live or not.
    pub fn peek_time(&self) -> Option<Duration> {
        self.queue.peek().map(|e| e.at)
    }

    /// Advance to and return the next live event.
    pub fn pop(&mut self) -> Option<(Duration, E)> {
        while let Some(entry) = self.queue.pop() {
            self.now = entry.at;
            if entry.owner_alive() {
                self.stats.delivered += 1;
                return Some((entry.at, entry.event));
            }
            self.stats.discarded += 1;
        }
        None
    }

    /// Deliver every live event due at or before `until`, then set the clock
    /// to `until`.
    ///
    /// The handler receives the scheduler so it can register follow-up events.
    pub fn run_until<F>(&mut self, until: Duration, mut handler: F)
    where
        F: FnMut(&mut Self, E),
    {
        while self.peek_time().map_or(false, |t| t <= until) {
            match self.pop() {
                Some((_, event)) => handler(self, event),
                None => break,
            }
        }
        self.now = self.now.max(until);
    }

    /// Number of pending entries (including ones whose owner is gone).
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }
}

impl<E> Default for EventScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}
