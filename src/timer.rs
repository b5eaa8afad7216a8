//! Cooperative software timers.
//!
//! The main loop calls [`SimpleTimer::run`] every iteration with the current millisecond count.
//! Expired timers come back as events which the owner dispatches with a `match`, so delayed
//! actions never block and never run inside an interrupt.

use embedded_time::duration::Milliseconds;
use heapless::Vec;

/// Handle to a scheduled timer.
///
/// Handles carry a generation so a handle to an expired timer never cancels whatever reused
/// its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerId {
    index: u8,
    generation: u16,
}

#[derive(Debug, Clone, Copy)]
struct Slot<E> {
    event: E,
    start: u32,
    interval: u32,
    repeating: bool,
    generation: u16,
}

/// Fixed-capacity timer table holding up to `N` pending events.
pub struct SimpleTimer<E: Copy, const N: usize> {
    slots: [Option<Slot<E>>; N],
    generations: [u16; N],
    now: Milliseconds<u32>,
}

impl<E: Copy, const N: usize> SimpleTimer<E, N> {
    pub fn new() -> Self {
        SimpleTimer {
            slots: [None; N],
            generations: [0; N],
            now: Milliseconds(0),
        }
    }

    /// Time seen by the last call to [`SimpleTimer::run`].
    pub fn now(&self) -> Milliseconds<u32> {
        self.now
    }

    /// Moves the clock new timers are anchored to, without running anything.
    ///
    /// Callers that schedule outside of [`SimpleTimer::run`] pass their own time here first, so
    /// delays count from the actual request.
    pub fn set_now(&mut self, now: Milliseconds<u32>) {
        self.now = now;
    }

    /// Fires `event` once, `delay` from now.
    pub fn schedule_once(&mut self, delay: Milliseconds<u32>, event: E) -> Option<TimerId> {
        self.insert(delay, event, false)
    }

    /// Fires `event` every `interval` until cancelled.
    pub fn schedule_repeating(&mut self, interval: Milliseconds<u32>, event: E) -> Option<TimerId> {
        self.insert(interval, event, true)
    }

    fn insert(&mut self, interval: Milliseconds<u32>, event: E, repeating: bool) -> Option<TimerId> {
        let Some(index) = self.slots.iter().position(Option::is_none) else {
            warn!("timer table full");
            return None;
        };

        self.generations[index] = self.generations[index].wrapping_add(1);
        let generation = self.generations[index];
        self.slots[index] = Some(Slot {
            event,
            start: self.now.0,
            interval: interval.0,
            repeating,
            generation,
        });

        Some(TimerId {
            index: index as u8,
            generation,
        })
    }

    /// Cancels a timer. Cancelling an expired or already cancelled timer does nothing.
    pub fn cancel(&mut self, id: TimerId) {
        if self.is_scheduled(id) {
            self.slots[id.index as usize] = None;
        }
    }

    pub fn is_scheduled(&self, id: TimerId) -> bool {
        matches!(
            self.slots.get(id.index as usize),
            Some(Some(slot)) if slot.generation == id.generation
        )
    }

    /// Advances the clock to `now` and returns every event that came due, oldest slot first.
    ///
    /// The millisecond counter may wrap; elapsed time is computed modulo 2^32.
    pub fn run(&mut self, now: Milliseconds<u32>) -> Vec<E, N> {
        self.now = now;
        let mut due = Vec::new();

        for slot in self.slots.iter_mut() {
            let Some(timer) = slot.as_mut() else { continue };
            if now.0.wrapping_sub(timer.start) < timer.interval {
                continue;
            }

            // Capacity matches the slot count, so this cannot overflow
            due.push(timer.event).ok();

            if timer.repeating {
                timer.start = timer.start.wrapping_add(timer.interval.max(1));
            } else {
                *slot = None;
            }
        }

        due
    }
}

impl<E: Copy, const N: usize> Default for SimpleTimer<E, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Job {
        Reload,
        Blink,
    }

    #[test]
    fn one_shot_fires_once() {
        let mut timer: SimpleTimer<Job, 4> = SimpleTimer::new();
        let id = timer.schedule_once(Milliseconds(100), Job::Reload).unwrap();

        assert!(timer.run(Milliseconds(99)).is_empty());
        assert!(timer.is_scheduled(id));
        assert_eq!(timer.run(Milliseconds(100)).as_slice(), &[Job::Reload]);
        assert!(!timer.is_scheduled(id));
        assert!(timer.run(Milliseconds(500)).is_empty());
    }

    #[test]
    fn repeating_fires_every_interval() {
        let mut timer: SimpleTimer<Job, 4> = SimpleTimer::new();
        timer.schedule_repeating(Milliseconds(50), Job::Blink).unwrap();

        let mut fired = 0;
        for t in (0..=200).step_by(10) {
            fired += timer.run(Milliseconds(t)).len();
        }
        assert_eq!(fired, 4);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut timer: SimpleTimer<Job, 4> = SimpleTimer::new();
        let id = timer.schedule_once(Milliseconds(100), Job::Reload).unwrap();

        timer.cancel(id);
        timer.cancel(id);
        assert!(!timer.is_scheduled(id));
        assert!(timer.run(Milliseconds(200)).is_empty());
    }

    #[test]
    fn stale_handle_does_not_cancel_reused_slot() {
        let mut timer: SimpleTimer<Job, 1> = SimpleTimer::new();
        let old = timer.schedule_once(Milliseconds(10), Job::Reload).unwrap();
        timer.run(Milliseconds(10));

        let new = timer.schedule_once(Milliseconds(10), Job::Blink).unwrap();
        timer.cancel(old);
        assert!(timer.is_scheduled(new));
    }

    #[test]
    fn full_table_refuses_new_timers() {
        let mut timer: SimpleTimer<Job, 1> = SimpleTimer::new();
        assert!(timer.schedule_once(Milliseconds(10), Job::Reload).is_some());
        assert!(timer.schedule_once(Milliseconds(10), Job::Blink).is_none());
    }

    #[test]
    fn delay_counts_from_set_time() {
        let mut timer: SimpleTimer<Job, 2> = SimpleTimer::new();
        timer.set_now(Milliseconds(60_000));
        timer.schedule_once(Milliseconds(100), Job::Reload).unwrap();

        assert!(timer.run(Milliseconds(60_099)).is_empty());
        assert_eq!(timer.run(Milliseconds(60_100)).as_slice(), &[Job::Reload]);
    }

    #[test]
    fn survives_counter_wrap() {
        let mut timer: SimpleTimer<Job, 2> = SimpleTimer::new();
        timer.run(Milliseconds(u32::MAX - 20));
        timer.schedule_once(Milliseconds(50), Job::Reload).unwrap();

        assert!(timer.run(Milliseconds(u32::MAX)).is_empty());
        assert_eq!(timer.run(Milliseconds(30)).as_slice(), &[Job::Reload]);
    }
}
