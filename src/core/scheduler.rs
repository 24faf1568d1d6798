/// Virtual-clock timer queue used to drive playback.
///
/// Nothing here reads the wall clock. The owner moves time forward with
/// [`Scheduler::pop_due`] and [`Scheduler::settle`], which keeps playback
/// deterministic under test and lets any host (a browser frame loop, a
/// terminal loop) supply real elapsed time.
use std::collections::BTreeMap;

/// Handle returned by [`Scheduler::schedule_in`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Timer<T> {
    generation: u64,
    payload: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    now_ms: u64,
    generation: u64,
    next_seq: u64,
    /// Keyed by `(fire_at, schedule order)` so equal deadlines fire FIFO.
    queue: BTreeMap<(u64, u64), Timer<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Scheduler<T> {
    pub fn new() -> Self {
        Self {
            now_ms: 0,
            generation: 0,
            next_seq: 0,
            queue: BTreeMap::new(),
        }
    }

    /// Current virtual time in ms.
    pub fn now(&self) -> u64 {
        self.now_ms
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.queue
            .values()
            .filter(|t| t.generation == self.generation)
            .count()
    }

    pub fn schedule_in(&mut self, delay_ms: u64, payload: T) -> TimerId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.insert(
            (self.now_ms.saturating_add(delay_ms), seq),
            Timer {
                generation: self.generation,
                payload,
            },
        );
        TimerId(seq)
    }

    /// Cancel one timer. Unknown or already-fired ids are ignored.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let key = self.queue.keys().find(|(_, seq)| *seq == id.0).copied();
        match key {
            Some(key) => self.queue.remove(&key).is_some(),
            None => false,
        }
    }

    /// Cancel every outstanding timer. Timers scheduled before this call
    /// can never fire afterwards.
    pub fn cancel_all(&mut self) {
        self.generation += 1;
        self.queue.clear();
    }

    /// Remove and return the earliest live timer due at or before `until`,
    /// moving the clock to its deadline.
    pub fn pop_due(&mut self, until: u64) -> Option<T> {
        loop {
            let (&key, _) = self.queue.iter().next()?;
            if key.0 > until {
                return None;
            }
            let timer = self.queue.remove(&key)?;
            if timer.generation != self.generation {
                continue;
            }
            self.now_ms = self.now_ms.max(key.0);
            return Some(timer.payload);
        }
    }

    /// Finish an advance: the clock rests at `until` unless it is already past it.
    pub fn settle(&mut self, until: u64) {
        self.now_ms = self.now_ms.max(until);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(s: &mut Scheduler<&'static str>, until: u64) -> Vec<&'static str> {
        let mut fired = Vec::new();
        while let Some(p) = s.pop_due(until) {
            fired.push(p);
        }
        s.settle(until);
        fired
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut s = Scheduler::new();
        s.schedule_in(300, "c");
        s.schedule_in(100, "a");
        s.schedule_in(200, "b");
        assert_eq!(drain(&mut s, 250), vec!["a", "b"]);
        assert_eq!(s.now(), 250);
        assert_eq!(drain(&mut s, 1000), vec!["c"]);
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut s = Scheduler::new();
        s.schedule_in(100, "first");
        s.schedule_in(100, "second");
        s.schedule_in(100, "third");
        assert_eq!(drain(&mut s, 100), vec!["first", "second", "third"]);
    }

    #[test]
    fn delays_are_relative_to_now() {
        let mut s = Scheduler::new();
        s.settle(1000);
        s.schedule_in(500, "x");
        assert!(drain(&mut s, 1499).is_empty());
        assert_eq!(drain(&mut s, 1500), vec!["x"]);
    }

    #[test]
    fn cancel_all_drops_everything() {
        let mut s = Scheduler::new();
        s.schedule_in(10, "a");
        s.schedule_in(20, "b");
        assert_eq!(s.pending(), 2);
        s.cancel_all();
        assert_eq!(s.pending(), 0);
        assert!(drain(&mut s, 100).is_empty());
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut s = Scheduler::new();
        let id = s.schedule_in(10, "a");
        assert!(s.cancel(id));
        assert!(!s.cancel(id));
        assert!(!s.cancel(TimerId(999)));
        assert!(drain(&mut s, 100).is_empty());
    }

    #[test]
    fn pop_moves_clock_to_deadline() {
        let mut s = Scheduler::new();
        s.schedule_in(40, "a");
        assert_eq!(s.pop_due(100), Some("a"));
        assert_eq!(s.now(), 40);
    }
}
