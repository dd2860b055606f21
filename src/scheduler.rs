//! Timers that drive the game's phase transitions
//!
//! The session never sleeps or spawns threads. It arms timers on a
//! [`Scheduler`] and the driver calls `GameSession::pump` to dispatch
//! whatever has come due. [`VirtualScheduler`] runs on a clock that only
//! moves when told to, which is what the tests use. [`WallClockScheduler`]
//! reads `Instant::now()`.

use std::time::{Duration, Instant};

/// What a timer means when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Periodic fall step
    Gravity,
    /// Grace period before a resting piece is committed
    LockDelay,
    /// End of the line-clear flash, rows collapse when this fires
    LineClear,
    /// End of the pause between topping out and the fill animation
    GameOverStart,
    /// One row of the game-over fill
    GameOverFill,
}

/// Handle for cancelling a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

pub trait Scheduler {
    /// Fire `timer` once after `delay`
    fn schedule_once(&mut self, delay: Duration, timer: Timer) -> TimerHandle;
    /// Fire `timer` every `interval` until cancelled
    fn schedule_repeating(&mut self, interval: Duration, timer: Timer) -> TimerHandle;
    /// Cancel a timer. Cancelling something that already fired is a no-op.
    fn cancel(&mut self, handle: TimerHandle);
    /// Next timer that has come due, earliest deadline first
    fn pop_due(&mut self) -> Option<Timer>;
}

#[derive(Debug, Clone)]
struct Entry {
    handle: TimerHandle,
    deadline: Duration,
    repeat: Option<Duration>,
    timer: Timer,
}

/// Pending timers keyed by deadline, relative to an arbitrary epoch
#[derive(Debug, Clone, Default)]
struct TimerQueue {
    entries: Vec<Entry>,
    next_id: u64,
}

impl TimerQueue {
    fn push(&mut self, now: Duration, delay: Duration, repeat: Option<Duration>, timer: Timer) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.entries.push(Entry {
            handle,
            deadline: now + delay,
            repeat,
            timer,
        });
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.entries.retain(|e| e.handle != handle);
    }

    /// Remove the earliest entry due at or before `horizon`. Ties go to the
    /// one scheduled first. Repeating entries are pushed back one interval.
    fn pop_due(&mut self, horizon: Duration) -> Option<(Duration, Timer)> {
        let idx = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.deadline <= horizon)
            .min_by_key(|(_, e)| (e.deadline, e.handle.0))
            .map(|(i, _)| i)?;

        let entry = &mut self.entries[idx];
        let fired = (entry.deadline, entry.timer);
        match entry.repeat {
            // A zero interval would fire forever within one pump
            Some(interval) if !interval.is_zero() => entry.deadline += interval,
            _ => {
                self.entries.remove(idx);
            }
        }
        Some(fired)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Scheduler on a virtual clock moved by [`VirtualScheduler::advance`]
#[derive(Debug, Clone, Default)]
pub struct VirtualScheduler {
    queue: TimerQueue,
    /// Time the most recently fired timer was due
    now: Duration,
    /// How far the clock has been advanced
    horizon: Duration,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward. Timers due in the window fire on the next pump.
    pub fn advance(&mut self, by: Duration) {
        self.horizon += by;
    }

    /// Current virtual time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of armed timers
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule_once(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        self.queue.push(self.now, delay, None, timer)
    }

    fn schedule_repeating(&mut self, interval: Duration, timer: Timer) -> TimerHandle {
        self.queue.push(self.now, interval, Some(interval), timer)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle);
    }

    fn pop_due(&mut self) -> Option<Timer> {
        match self.queue.pop_due(self.horizon) {
            Some((deadline, timer)) => {
                // Handlers re-arm relative to when they were due, not to the horizon
                self.now = deadline;
                Some(timer)
            }
            None => {
                self.now = self.horizon;
                None
            }
        }
    }
}

/// Scheduler on the real monotonic clock
#[derive(Debug, Clone)]
pub struct WallClockScheduler {
    queue: TimerQueue,
    epoch: Instant,
}

impl Default for WallClockScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClockScheduler {
    pub fn new() -> Self {
        Self {
            queue: TimerQueue::default(),
            epoch: Instant::now(),
        }
    }

    fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl Scheduler for WallClockScheduler {
    fn schedule_once(&mut self, delay: Duration, timer: Timer) -> TimerHandle {
        let now = self.elapsed();
        self.queue.push(now, delay, None, timer)
    }

    fn schedule_repeating(&mut self, interval: Duration, timer: Timer) -> TimerHandle {
        let now = self.elapsed();
        self.queue.push(now, interval, Some(interval), timer)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.queue.cancel(handle);
    }

    fn pop_due(&mut self) -> Option<Timer> {
        let now = self.elapsed();
        self.queue.pop_due(now).map(|(_, timer)| timer)
    }
}
