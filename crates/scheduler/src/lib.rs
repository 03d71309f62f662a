//! Frame pacing primitives shared by the showcase host.
//!
//! [`FrameScheduler`] stands in for a per-frame callback queue: each key has at
//! most one pending tick, ticks run in the order they were requested, and the
//! scheduler measures the elapsed time between consecutive ticks of the same
//! key. [`Debouncer`] implements a trailing-edge quiet period.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::{Duration, Instant};

use tracing::trace;

/// One due tick for `key`, carrying the time since that key's previous tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTick<K> {
    pub key: K,
    pub delta: Duration,
}

impl<K> FrameTick<K> {
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }
}

pub struct FrameScheduler<K> {
    queue: VecDeque<K>,
    pending: BTreeSet<K>,
    clocks: BTreeMap<K, Instant>,
}

impl<K: Ord + Clone> Default for FrameScheduler<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Clone> FrameScheduler<K> {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            pending: BTreeSet::new(),
            clocks: BTreeMap::new(),
        }
    }

    /// Requests the next tick for `key`. Returns `false` when one is already
    /// pending.
    pub fn request(&mut self, key: K) -> bool {
        if !self.pending.insert(key.clone()) {
            return false;
        }
        self.queue.push_back(key);
        true
    }

    /// Drops the pending tick for `key` and forgets its clock, so the next
    /// tick after a new request reports a zero delta.
    pub fn cancel(&mut self, key: &K) -> bool {
        self.clocks.remove(key);
        if !self.pending.remove(key) {
            return false;
        }
        self.queue.retain(|queued| queued != key);
        true
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.contains(key)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drains every pending tick in request order. Keys must re-request to
    /// receive another tick.
    pub fn take_due(&mut self, now: Instant) -> Vec<FrameTick<K>> {
        let mut ticks = Vec::with_capacity(self.queue.len());
        while let Some(key) = self.queue.pop_front() {
            self.pending.remove(&key);
            let delta = match self.clocks.insert(key.clone(), now) {
                Some(previous) => now.saturating_duration_since(previous),
                None => Duration::ZERO,
            };
            ticks.push(FrameTick { key, delta });
        }
        if !ticks.is_empty() {
            trace!(count = ticks.len(), "frame ticks due");
        }
        ticks
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending.clear();
        self.clocks.clear();
    }
}

/// Trailing-edge debounce: fires once `delay` after the last trigger.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancels any pending firing and schedules a new one.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns `true` exactly once when the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_run_in_request_order_once() {
        let mut scheduler = FrameScheduler::new();
        assert!(scheduler.request("b"));
        assert!(scheduler.request("a"));
        assert!(!scheduler.request("b"), "duplicate request is ignored");
        assert_eq!(scheduler.len(), 2);

        let now = Instant::now();
        let keys: Vec<_> = scheduler.take_due(now).into_iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert!(scheduler.is_empty());
        assert!(scheduler.take_due(now).is_empty());
    }

    #[test]
    fn delta_measures_time_between_ticks() {
        let mut scheduler = FrameScheduler::new();
        let start = Instant::now();
        scheduler.request(1u32);
        let first = scheduler.take_due(start);
        assert_eq!(first[0].delta, Duration::ZERO);

        scheduler.request(1);
        let second = scheduler.take_due(start + Duration::from_millis(16));
        assert_eq!(second[0].delta, Duration::from_millis(16));
        assert!((second[0].delta_seconds() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn cancel_removes_pending_tick_and_resets_clock() {
        let mut scheduler = FrameScheduler::new();
        let start = Instant::now();
        scheduler.request("card");
        scheduler.take_due(start);
        scheduler.request("card");
        assert!(scheduler.cancel(&"card"));
        assert!(!scheduler.is_pending(&"card"));
        assert!(scheduler.take_due(start + Duration::from_secs(1)).is_empty());

        scheduler.request("card");
        let ticks = scheduler.take_due(start + Duration::from_secs(2));
        assert_eq!(ticks[0].delta, Duration::ZERO);
    }

    #[test]
    fn debouncer_fires_after_quiet_period() {
        let mut debouncer = Debouncer::new(Duration::from_millis(250));
        let start = Instant::now();
        debouncer.trigger(start);
        debouncer.trigger(start + Duration::from_millis(200));
        assert!(!debouncer.poll(start + Duration::from_millis(300)));
        assert!(debouncer.is_pending());
        assert!(debouncer.poll(start + Duration::from_millis(450)));
        assert!(!debouncer.poll(start + Duration::from_millis(900)));
    }

    #[test]
    fn debouncer_cancel_clears_deadline() {
        let mut debouncer = Debouncer::new(Duration::from_millis(250));
        let start = Instant::now();
        debouncer.trigger(start);
        assert_eq!(debouncer.deadline(), Some(start + Duration::from_millis(250)));
        debouncer.cancel();
        assert!(!debouncer.poll(start + Duration::from_secs(1)));
    }
}
