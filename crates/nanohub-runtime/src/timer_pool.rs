// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Nanoapp timers multiplexed onto one system timer.
//!
//! Pending timers live in a min-heap ordered by expiration. The system timer
//! is always armed for the head of the heap. When it fires, on whatever thread
//! the platform uses, every expired timer is turned into an `EVENT_TIMER`
//! posted to its owner and recurring timers are put back.

use crate::error::{PostEventError, TimerError};
use crate::handle::{lock_or_recover, RuntimeHandle};
use nanohub_core::event::EVENT_TIMER;
use nanohub_core::fatal_error;
use nanohub_core::pal::SystemTimer;
use nanohub_core::{Cookie, InstanceId, TimerHandle};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// Maximum number of pending timers across all nanoapps.
pub const MAX_TIMER_REQUESTS: usize = 64;

#[derive(Debug, Clone)]
struct TimerRequest {
    handle: TimerHandle,
    owner: InstanceId,
    expiration: Instant,
    duration: Duration,
    one_shot: bool,
    cookie: Cookie,
    /// Insertion order, so equal expirations fire first-in first-out.
    sequence: u64,
}

impl PartialEq for TimerRequest {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimerRequest {}

impl PartialOrd for TimerRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerRequest {
    // Reversed: BinaryHeap is a max-heap and the earliest expiration must be on top.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .expiration
            .cmp(&self.expiration)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

struct TimerQueue {
    heap: BinaryHeap<TimerRequest>,
    system_timer: Box<dyn SystemTimer>,
    handle: RuntimeHandle,
    last_handle: u32,
    must_check_uniqueness: bool,
    next_sequence: u64,
}

impl TimerQueue {
    fn generate_handle(&mut self) -> TimerHandle {
        let mut candidate = self.last_handle.wrapping_add(1);
        if candidate == TimerHandle::INVALID.0 {
            // Wrapped: from now on handles may collide with long-lived timers.
            self.must_check_uniqueness = true;
            candidate = candidate.wrapping_add(1);
        }
        if self.must_check_uniqueness {
            while candidate == TimerHandle::INVALID.0
                || self.heap.iter().any(|timer| timer.handle.0 == candidate)
            {
                candidate = candidate.wrapping_add(1);
            }
        }
        self.last_handle = candidate;
        TimerHandle(candidate)
    }

    fn next_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }

    fn head_handle(&self) -> Option<TimerHandle> {
        self.heap.peek().map(|timer| timer.handle)
    }

    /// Arms the system timer for the head of the heap. Returns `false` if the
    /// platform refused.
    fn rearm(&mut self, now: Instant) -> bool {
        self.system_timer.cancel();
        match self.heap.peek() {
            Some(head) => {
                let delay = head.expiration.saturating_duration_since(now);
                self.system_timer.set(delay)
            }
            None => true,
        }
    }

    fn handle_system_timer(&mut self) {
        if self.heap.is_empty() {
            log::warn!("TimerPool: System timer fired with no pending timers");
            return;
        }

        let now = Instant::now();
        let mut recurring = Vec::new();
        while self.heap.peek().is_some_and(|head| head.expiration <= now) {
            let Some(timer) = self.heap.pop() else {
                break;
            };
            self.post_timer_event(&timer);
            if !timer.one_shot {
                recurring.push(timer);
            }
        }

        for mut timer in recurring {
            timer.expiration = now + timer.duration;
            timer.sequence = self.next_sequence();
            self.heap.push(timer);
        }

        if !self.rearm(now) {
            log::error!("TimerPool: Failed to re-arm the system timer");
        }
    }

    fn post_timer_event(&self, timer: &TimerRequest) {
        log::trace!(
            "TimerPool: Timer {} expired for nanoapp {}",
            timer.handle,
            timer.owner
        );
        let posted = self.handle.post_event(
            EVENT_TIMER,
            Some(Box::new(timer.cookie)),
            None,
            InstanceId::SYSTEM,
            timer.owner,
        );
        match posted {
            Ok(()) => {}
            Err(PostEventError::NotRunning) => {
                log::debug!("TimerPool: Dropping timer {} during shutdown", timer.handle);
            }
            Err(err) => fatal_error!("Failed to post timer event: {err}"),
        }
    }
}

/// Pool of nanoapp timers backed by a single [`SystemTimer`].
///
/// Thread-safe: the queue is behind a mutex shared with the system timer's
/// callback.
pub struct TimerPool {
    queue: Arc<Mutex<TimerQueue>>,
}

impl TimerPool {
    /// Takes ownership of `system_timer` and installs the expiry callback.
    ///
    /// A system timer that fails to initialize is fatal.
    pub fn new(system_timer: Box<dyn SystemTimer>, handle: RuntimeHandle) -> Self {
        let queue = Arc::new(Mutex::new(TimerQueue {
            heap: BinaryHeap::new(),
            system_timer,
            handle,
            last_handle: TimerHandle::INVALID.0,
            must_check_uniqueness: false,
            next_sequence: 0,
        }));

        let weak: Weak<Mutex<TimerQueue>> = Arc::downgrade(&queue);
        let callback = Box::new(move || {
            if let Some(queue) = weak.upgrade() {
                lock_or_recover(&queue).handle_system_timer();
            }
        });
        if !lock_or_recover(&queue).system_timer.init(callback) {
            fatal_error!("Failed to initialize the system timer");
        }

        log::debug!("TimerPool: Initialized.");
        Self { queue }
    }

    /// Schedules a timer for `owner`. The first expiry is `duration` from now.
    pub fn set_timer(
        &self,
        owner: InstanceId,
        duration: Duration,
        cookie: Cookie,
        one_shot: bool,
    ) -> Result<TimerHandle, TimerError> {
        let mut queue = lock_or_recover(&self.queue);
        if queue.heap.len() >= MAX_TIMER_REQUESTS {
            log::warn!("TimerPool: Nanoapp {owner} exceeded the timer limit");
            return Err(TimerError::TooManyTimers);
        }

        let now = Instant::now();
        let handle = queue.generate_handle();
        let sequence = queue.next_sequence();
        queue.heap.push(TimerRequest {
            handle,
            owner,
            expiration: now + duration,
            duration,
            one_shot,
            cookie,
            sequence,
        });

        if queue.head_handle() == Some(handle) && !queue.rearm(now) {
            queue.heap.retain(|timer| timer.handle != handle);
            // Put the previous head back on the clock.
            queue.rearm(now);
            log::error!("TimerPool: Failed to arm the system timer for {handle}");
            return Err(TimerError::ArmFailed);
        }

        log::debug!(
            "TimerPool: Nanoapp {owner} set timer {handle} for {duration:?} (one_shot: {one_shot})"
        );
        Ok(handle)
    }

    /// Cancels a pending timer. Only its owner may cancel it; otherwise the
    /// queue is left untouched.
    pub fn cancel_timer(&self, caller: InstanceId, handle: TimerHandle) -> Result<(), TimerError> {
        let mut queue = lock_or_recover(&self.queue);
        let owner = queue
            .heap
            .iter()
            .find(|timer| timer.handle == handle)
            .map(|timer| timer.owner);
        match owner {
            None => Err(TimerError::NotFound(handle)),
            Some(owner) if owner != caller => {
                log::warn!("TimerPool: Nanoapp {caller} tried to cancel timer {handle} owned by {owner}");
                Err(TimerError::NotOwner(handle))
            }
            Some(_) => {
                let was_head = queue.head_handle() == Some(handle);
                queue.heap.retain(|timer| timer.handle != handle);
                if was_head && !queue.rearm(Instant::now()) {
                    log::error!("TimerPool: Failed to re-arm the system timer");
                }
                log::debug!("TimerPool: Nanoapp {caller} cancelled timer {handle}");
                Ok(())
            }
        }
    }

    /// Cancels every timer owned by `owner`. Returns how many were removed.
    pub fn cancel_all(&self, owner: InstanceId) -> usize {
        let mut queue = lock_or_recover(&self.queue);
        let before = queue.heap.len();
        let head_owned = queue
            .heap
            .peek()
            .is_some_and(|head| head.owner == owner);
        queue.heap.retain(|timer| timer.owner != owner);
        let removed = before - queue.heap.len();
        if head_owned && !queue.rearm(Instant::now()) {
            log::error!("TimerPool: Failed to re-arm the system timer");
        }
        removed
    }

    /// Handles of pending timers, earliest first.
    pub fn pending(&self) -> Vec<TimerHandle> {
        let queue = lock_or_recover(&self.queue);
        let mut timers: Vec<&TimerRequest> = queue.heap.iter().collect();
        timers.sort_by(|a, b| b.cmp(a));
        timers.into_iter().map(|timer| timer.handle).collect()
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        lock_or_recover(&self.queue).heap.len()
    }

    /// `true` when no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::QueueItem;
    use crate::handle::LoopShared;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// A system timer that only records calls; tests fire it by hand.
    #[derive(Clone, Default)]
    struct ManualTimer {
        callback: Arc<Mutex<Option<Arc<dyn Fn() + Send + Sync>>>>,
        armed: Arc<Mutex<Option<Duration>>>,
        sets: Arc<AtomicUsize>,
    }

    impl ManualTimer {
        fn fire(&self) {
            let callback = self.callback.lock().unwrap().clone();
            if let Some(callback) = callback {
                callback();
            }
        }
    }

    impl SystemTimer for ManualTimer {
        fn init(&mut self, callback: Box<dyn Fn() + Send + Sync>) -> bool {
            *self.callback.lock().unwrap() = Some(Arc::from(callback));
            true
        }

        fn set(&mut self, delay: Duration) -> bool {
            self.sets.fetch_add(1, AtomicOrdering::SeqCst);
            *self.armed.lock().unwrap() = Some(delay);
            true
        }

        fn cancel(&mut self) -> bool {
            self.armed.lock().unwrap().take().is_some()
        }
    }

    struct FailingTimer;

    impl SystemTimer for FailingTimer {
        fn init(&mut self, _callback: Box<dyn Fn() + Send + Sync>) -> bool {
            false
        }

        fn set(&mut self, _delay: Duration) -> bool {
            false
        }

        fn cancel(&mut self) -> bool {
            false
        }
    }

    fn setup() -> (TimerPool, ManualTimer, flume::Receiver<QueueItem>) {
        let (sender, receiver) = flume::bounded(16);
        let handle = RuntimeHandle::new(sender, Arc::new(LoopShared::new(16)));
        let timer = ManualTimer::default();
        let pool = TimerPool::new(Box::new(timer.clone()), handle);
        (pool, timer, receiver)
    }

    fn timer_cookies(receiver: &flume::Receiver<QueueItem>) -> Vec<(InstanceId, Cookie)> {
        receiver
            .try_iter()
            .filter_map(|item| match item {
                QueueItem::Event(event) if event.event_type == EVENT_TIMER => {
                    let cookie = event.data.and_then(|d| d.downcast::<Cookie>().ok())?;
                    Some((event.target, *cookie))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn handles_are_unique_and_valid() {
        let (pool, _timer, _rx) = setup();
        let a = pool.set_timer(InstanceId(1), Duration::from_secs(10), 0, true).unwrap();
        let b = pool.set_timer(InstanceId(1), Duration::from_secs(10), 0, true).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, TimerHandle::INVALID);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn system_timer_tracks_the_earliest_timer() {
        let (pool, timer, _rx) = setup();
        pool.set_timer(InstanceId(1), Duration::from_secs(50), 0, true).unwrap();
        let sets_after_first = timer.sets.load(AtomicOrdering::SeqCst);

        // Later than the head: no re-arm.
        pool.set_timer(InstanceId(1), Duration::from_secs(80), 0, true).unwrap();
        assert_eq!(timer.sets.load(AtomicOrdering::SeqCst), sets_after_first);

        // Earlier than the head: re-armed for the new head.
        pool.set_timer(InstanceId(1), Duration::from_secs(10), 0, true).unwrap();
        assert_eq!(timer.sets.load(AtomicOrdering::SeqCst), sets_after_first + 1);
        let armed = timer.armed.lock().unwrap().unwrap();
        assert!(armed <= Duration::from_secs(10));
    }

    #[test]
    fn expired_timers_post_events_in_expiration_order() {
        let (pool, timer, rx) = setup();
        pool.set_timer(InstanceId(1), Duration::from_millis(5), 5, true).unwrap();
        pool.set_timer(InstanceId(2), Duration::from_millis(1), 1, true).unwrap();
        pool.set_timer(InstanceId(3), Duration::from_millis(3), 3, true).unwrap();

        std::thread::sleep(Duration::from_millis(10));
        timer.fire();

        assert_eq!(
            timer_cookies(&rx),
            vec![(InstanceId(2), 1), (InstanceId(3), 3), (InstanceId(1), 5)]
        );
        assert!(pool.is_empty());
    }

    #[test]
    fn recurring_timer_is_reinserted() {
        let (pool, timer, rx) = setup();
        let handle = pool.set_timer(InstanceId(1), Duration::from_millis(1), 9, false).unwrap();

        std::thread::sleep(Duration::from_millis(5));
        timer.fire();

        assert_eq!(timer_cookies(&rx), vec![(InstanceId(1), 9)]);
        assert_eq!(pool.pending(), vec![handle]);
        assert!(timer.armed.lock().unwrap().is_some());
    }

    #[test]
    fn cancel_by_non_owner_leaves_queue_unchanged() {
        let (pool, _timer, _rx) = setup();
        let handle = pool.set_timer(InstanceId(1), Duration::from_secs(1), 0, true).unwrap();
        let before = pool.pending();

        assert_eq!(
            pool.cancel_timer(InstanceId(2), handle),
            Err(TimerError::NotOwner(handle))
        );
        assert_eq!(pool.pending(), before);

        assert_eq!(pool.cancel_timer(InstanceId(1), handle), Ok(()));
        assert!(pool.is_empty());
        assert_eq!(
            pool.cancel_timer(InstanceId(1), handle),
            Err(TimerError::NotFound(handle))
        );
    }

    #[test]
    fn cancelling_the_head_rearms_for_the_next_timer() {
        let (pool, timer, _rx) = setup();
        pool.set_timer(InstanceId(1), Duration::from_secs(5), 5, true).unwrap();
        let head = pool.set_timer(InstanceId(1), Duration::from_secs(1), 1, true).unwrap();
        let middle = pool.set_timer(InstanceId(1), Duration::from_secs(3), 3, true).unwrap();
        assert!(timer.armed.lock().unwrap().unwrap() <= Duration::from_secs(1));

        // Not the head: the system timer is left alone.
        let sets = timer.sets.load(AtomicOrdering::SeqCst);
        pool.cancel_timer(InstanceId(1), middle).unwrap();
        assert_eq!(timer.sets.load(AtomicOrdering::SeqCst), sets);
        pool.set_timer(InstanceId(1), Duration::from_secs(3), 3, true).unwrap();

        let sets = timer.sets.load(AtomicOrdering::SeqCst);
        pool.cancel_timer(InstanceId(1), head).unwrap();
        assert_eq!(timer.sets.load(AtomicOrdering::SeqCst), sets + 1);
        let armed = timer.armed.lock().unwrap().unwrap();
        assert!(armed <= Duration::from_secs(3));
        assert!(armed > Duration::from_secs(2));
    }

    #[test]
    fn cancel_all_removes_only_the_owners_timers() {
        let (pool, _timer, _rx) = setup();
        pool.set_timer(InstanceId(1), Duration::from_secs(1), 0, true).unwrap();
        pool.set_timer(InstanceId(1), Duration::from_secs(2), 0, false).unwrap();
        let kept = pool.set_timer(InstanceId(2), Duration::from_secs(3), 0, true).unwrap();

        assert_eq!(pool.cancel_all(InstanceId(1)), 2);
        assert_eq!(pool.pending(), vec![kept]);
    }

    #[test]
    fn firing_with_empty_queue_is_harmless() {
        let (_pool, timer, rx) = setup();
        timer.fire();
        assert!(timer_cookies(&rx).is_empty());
    }

    #[test]
    fn queue_is_bounded() {
        let (pool, _timer, _rx) = setup();
        for _ in 0..MAX_TIMER_REQUESTS {
            pool.set_timer(InstanceId(1), Duration::from_secs(60), 0, true).unwrap();
        }
        assert_eq!(
            pool.set_timer(InstanceId(1), Duration::from_secs(60), 0, true),
            Err(TimerError::TooManyTimers)
        );
    }

    #[test]
    fn handle_generation_skips_invalid_and_live_handles_after_wrap() {
        let (pool, _timer, _rx) = setup();
        let live = pool.set_timer(InstanceId(1), Duration::from_secs(60), 0, true).unwrap();
        assert_eq!(live, TimerHandle(1));

        lock_or_recover(&pool.queue).last_handle = u32::MAX;
        let next = pool.set_timer(InstanceId(1), Duration::from_secs(60), 0, true).unwrap();
        assert_eq!(next, TimerHandle(2));
    }

    #[test]
    #[should_panic(expected = "Failed to initialize the system timer")]
    fn timer_init_failure_is_fatal() {
        let (sender, _receiver) = flume::bounded(1);
        let handle = RuntimeHandle::new(sender, Arc::new(LoopShared::new(1)));
        let _pool = TimerPool::new(Box::new(FailingTimer), handle);
    }
}
