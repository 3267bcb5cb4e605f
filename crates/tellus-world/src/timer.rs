use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::ids::{IdAllocator, TimerId};
use crate::script::Script;

/// A one-shot deferred script
#[derive(Debug, Clone)]
struct Timer {
    /// Ticks left before the script fires; always > 0 while scheduled
    remaining: u32,
    script: Script,
}

/// Outcome of [`TimerPool::set_remaining`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reschedule {
    /// The counter was rewritten
    Rescheduled,
    /// A zero counter was requested: the timer was removed and its script is due now
    Due(Script),
    /// No such timer
    Missing,
}

/// Shared pool of one-shot timers counted in ticks.
///
/// The pool never runs scripts. [`tick`](Self::tick), [`take`](Self::take)
/// and [`set_remaining`](Self::set_remaining) hand the due scripts back to the
/// caller, which executes them once the pool lock has been released.
#[derive(Debug)]
pub struct TimerPool {
    timers: Mutex<BTreeMap<TimerId, Timer>>,
    ids: IdAllocator,
}

impl TimerPool {
    pub fn new() -> Self {
        Self {
            timers: Mutex::new(BTreeMap::new()),
            ids: IdAllocator::new(),
        }
    }

    /// Schedule `script` to fire after `ticks` ticks. A zero duration fires on
    /// the next tick.
    pub fn add(&self, ticks: u32, script: Script) -> TimerId {
        let id = self.ids.next();
        let timer = Timer {
            remaining: ticks.max(1),
            script,
        };
        self.lock().insert(id, timer);
        id
    }

    /// Cancel a timer. Returns whether it existed.
    pub fn remove(&self, id: TimerId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Ticks left, or 0 when the timer does not exist.
    pub fn remaining(&self, id: TimerId) -> u32 {
        self.lock().get(&id).map(|t| t.remaining).unwrap_or(0)
    }

    pub fn set_remaining(&self, id: TimerId, remaining: u32) -> Reschedule {
        let mut timers = self.lock();
        if remaining == 0 {
            return match timers.remove(&id) {
                Some(timer) => Reschedule::Due(timer.script),
                None => Reschedule::Missing,
            };
        }
        match timers.get_mut(&id) {
            Some(timer) => {
                timer.remaining = remaining;
                Reschedule::Rescheduled
            }
            None => Reschedule::Missing,
        }
    }

    /// Remove a timer regardless of its counter, returning its script.
    pub fn take(&self, id: TimerId) -> Option<Script> {
        self.lock().remove(&id).map(|t| t.script)
    }

    /// Decrement every timer once and remove the ones reaching zero.
    /// Returns the removed timers in creation order.
    pub fn tick(&self) -> Vec<(TimerId, Script)> {
        let mut timers = self.lock();
        let mut fired = Vec::new();

        for (id, timer) in timers.iter_mut() {
            timer.remaining -= 1;
            if timer.remaining == 0 {
                fired.push(*id);
            }
        }

        fired
            .into_iter()
            .filter_map(|id| timers.remove(&id).map(|t| (id, t.script)))
            .collect()
    }

    /// Drop every scheduled timer without firing it.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Get the number of active timers
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<TimerId, Timer>> {
        self.timers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for TimerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_shot_timer() {
        let pool = TimerPool::new();
        let id = pool.add(3, Script::from("boom"));

        assert!(pool.tick().is_empty());
        assert!(pool.tick().is_empty());
        assert_eq!(pool.remaining(id), 1);

        let fired = pool.tick();
        assert_eq!(fired, vec![(id, Script::from("boom"))]);

        // Removed after firing
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.remaining(id), 0);
        assert!(pool.tick().is_empty());
    }

    #[test]
    fn test_zero_duration_fires_next_tick() {
        let pool = TimerPool::new();
        let id = pool.add(0, Script::from("now"));
        assert_eq!(pool.remaining(id), 1);
        assert_eq!(pool.tick().len(), 1);
    }

    #[test]
    fn test_cancel_timer() {
        let pool = TimerPool::new();
        let id = pool.add(10, Script::from("never"));

        assert!(pool.remove(id));
        assert_eq!(pool.active_count(), 0);
        assert!(!pool.remove(id)); // Already removed
    }

    #[test]
    fn test_set_remaining() {
        let pool = TimerPool::new();
        let id = pool.add(10, Script::from("later"));

        assert_eq!(pool.set_remaining(id, 2), Reschedule::Rescheduled);
        assert_eq!(pool.remaining(id), 2);

        assert_eq!(
            pool.set_remaining(id, 0),
            Reschedule::Due(Script::from("later"))
        );
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.set_remaining(id, 5), Reschedule::Missing);
        assert_eq!(pool.set_remaining(id, 0), Reschedule::Missing);
    }

    #[test]
    fn test_tick_fires_in_creation_order() {
        let pool = TimerPool::new();
        let a = pool.add(1, Script::from("a"));
        let _long = pool.add(5, Script::from("long"));
        let b = pool.add(1, Script::from("b"));

        let fired: Vec<TimerId> = pool.tick().into_iter().map(|(id, _)| id).collect();
        assert_eq!(fired, vec![a, b]);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn test_take() {
        let pool = TimerPool::new();
        let id = pool.add(100, Script::from("x"));
        assert_eq!(pool.take(id), Some(Script::from("x")));
        assert_eq!(pool.take(id), None);
    }
}
