//! Run-loop scheduler
//!
//! Single-threaded virtual-clock timer queue. All deferred work in the
//! engine (polls, debounces, swap/settle delays, timeouts, observer
//! scans) is a task scheduled here; the engine drains due tasks as the
//! clock advances, so tests are fully deterministic. Tasks never run
//! concurrently.

use std::collections::{BinaryHeap, HashSet};

/// Timer identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

struct TimerEntry<T> {
    deadline_ms: u64,
    seq: u64,
    id: TimerId,
    task: T,
}

impl<T> PartialEq for TimerEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<T> Eq for TimerEntry<T> {}

impl<T> PartialOrd for TimerEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for TimerEntry<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap: earlier deadlines first, insertion order breaks ties
        other
            .deadline_ms
            .cmp(&self.deadline_ms)
            .then(other.seq.cmp(&self.seq))
    }
}

/// Virtual-clock timer queue
pub struct Scheduler<T> {
    now_ms: u64,
    seq: u64,
    queue: BinaryHeap<TimerEntry<T>>,
    cancelled: HashSet<TimerId>,
}

impl<T> std::fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("now_ms", &self.now_ms)
            .field("pending", &self.queue.len())
            .finish()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            seq: 0,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }
    }

    /// Current virtual time
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Schedule a task after `delay_ms`
    pub fn schedule(&mut self, delay_ms: u64, task: T) -> TimerId {
        self.seq += 1;
        let id = TimerId(self.seq);
        self.queue.push(TimerEntry {
            deadline_ms: self.now_ms.saturating_add(delay_ms),
            seq: self.seq,
            id,
            task,
        });
        id
    }

    /// Cancel a pending timer (a no-op if it already fired)
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id);
    }

    /// Is anything pending at or before `deadline`?
    fn due_before(&mut self, deadline: u64) -> bool {
        while let Some(head) = self.queue.peek() {
            if self.cancelled.remove(&head.id) {
                self.queue.pop();
                continue;
            }
            return head.deadline_ms <= deadline;
        }
        false
    }

    /// Pop the next due task up to `deadline`, advancing the clock to
    /// its fire time. Returns None when nothing is due; the clock then
    /// jumps to `deadline`.
    pub fn pop_due(&mut self, deadline: u64) -> Option<(u64, T)> {
        if self.due_before(deadline) {
            if let Some(entry) = self.queue.pop() {
                self.now_ms = self.now_ms.max(entry.deadline_ms);
                return Some((entry.deadline_ms, entry.task));
            }
        }
        self.now_ms = self.now_ms.max(deadline);
        None
    }

    /// Number of live pending timers
    pub fn pending(&self) -> usize {
        self.queue
            .iter()
            .filter(|e| !self.cancelled.contains(&e.id))
            .count()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fire_order() {
        let mut s: Scheduler<&str> = Scheduler::new();
        s.schedule(20, "b");
        s.schedule(10, "a");
        s.schedule(20, "c");

        let mut fired = Vec::new();
        while let Some((at, task)) = s.pop_due(100) {
            fired.push((at, task));
        }
        // Deadline order, ties in insertion order
        assert_eq!(fired, vec![(10, "a"), (20, "b"), (20, "c")]);
        assert_eq!(s.now_ms(), 100);
    }

    #[test]
    fn test_cancel() {
        let mut s: Scheduler<&str> = Scheduler::new();
        let id = s.schedule(5, "x");
        s.schedule(10, "y");
        s.cancel(id);

        assert_eq!(s.pop_due(50).map(|(_, t)| t), Some("y"));
        assert!(s.pop_due(50).is_none());
    }

    #[test]
    fn test_deadline_cutoff() {
        let mut s: Scheduler<&str> = Scheduler::new();
        s.schedule(100, "later");
        assert!(s.pop_due(50).is_none());
        assert_eq!(s.now_ms(), 50);
        assert_eq!(s.pending(), 1);
        assert!(s.pop_due(100).is_some());
    }

    #[test]
    fn test_clock_advances_to_fire_time() {
        let mut s: Scheduler<&str> = Scheduler::new();
        s.schedule(30, "t");
        let (at, _) = s.pop_due(100).unwrap();
        assert_eq!(at, 30);
        assert_eq!(s.now_ms(), 30);
    }
}
