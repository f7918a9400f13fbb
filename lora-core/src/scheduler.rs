//! Time-aware periodic task scheduling
//!
//! Each periodic task owns an [`IntervalTimer`] holding the tick at which it
//! fires next. The main loop polls the [`Scheduler`] once per pass; it never
//! runs from interrupt context.

use heapless::Vec;

use crate::clock::{elapsed, reached, Tick};
use crate::types::NodeConfig;

/// Periodic work slots, in the order they are checked on every pass
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeAwareAction {
    /// Keep-alive boundary
    Minute,
    /// Second boundary (no work attached)
    Second,
    /// Dispatcher evaluation
    HundredMillis,
}

/// Compute the deadline following `deadline` for a task with `period`
///
/// A task that is late by less than one period keeps its phase (the next
/// deadline is `deadline + period`, i.e. `now + period - overrun`). A task
/// that fell behind by a full period or more drops the backlog and restarts
/// one period from `now` instead of firing repeatedly to catch up.
pub fn next_deadline(deadline: Tick, period: u32, now: Tick) -> Tick {
    let overrun = elapsed(now, deadline);
    if overrun >= 0 && overrun as u32 >= period {
        now.wrapping_add(period)
    } else {
        deadline.wrapping_add(period)
    }
}

/// Deadline of one periodic task
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IntervalTimer {
    deadline: Tick,
    period: u32,
}

impl IntervalTimer {
    /// Create a timer that is due immediately (deadline zero)
    pub const fn new(period: u32) -> Self {
        Self::starting_at(0, period)
    }

    /// Create a timer with an explicit first deadline
    pub const fn starting_at(deadline: Tick, period: u32) -> Self {
        Self { deadline, period }
    }

    /// Next tick at which the task fires
    pub fn deadline(&self) -> Tick {
        self.deadline
    }

    /// Task period in ticks
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Check whether the deadline has been reached
    pub fn is_due(&self, now: Tick) -> bool {
        reached(now, self.deadline)
    }

    /// Advance the deadline by one period, re-aligning or resynchronizing if late
    pub fn arm(&mut self, now: Tick) {
        self.deadline = next_deadline(self.deadline, self.period, now);
    }

    /// Fire-and-rearm: returns true and re-arms if the task is due
    pub fn poll(&mut self, now: Tick) -> bool {
        if self.is_due(now) {
            self.arm(now);
            true
        } else {
            false
        }
    }
}

/// Due actions of a single scheduler pass
pub type DueActions = Vec<TimeAwareAction, 3>;

/// The three periodic tasks of the link node
#[derive(Clone, Debug)]
pub struct Scheduler {
    minute: IntervalTimer,
    second: IntervalTimer,
    tick: IntervalTimer,
}

impl Scheduler {
    /// Create a scheduler whose tasks all fire on the first pass
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            minute: IntervalTimer::new(config.minute_interval_ms),
            second: IntervalTimer::new(config.second_interval_ms),
            tick: IntervalTimer::new(config.tick_interval_ms),
        }
    }

    /// Check each task once, re-arming the ones that fire
    pub fn poll(&mut self, now: Tick) -> DueActions {
        let mut due = DueActions::new();
        let timers = [
            (&mut self.minute, TimeAwareAction::Minute),
            (&mut self.second, TimeAwareAction::Second),
            (&mut self.tick, TimeAwareAction::HundredMillis),
        ];
        for (timer, action) in timers {
            if timer.poll(now) {
                // Capacity equals the number of tasks
                let _ = due.push(action);
            }
        }
        due
    }

    /// Timer of a given task
    pub fn timer(&self, action: TimeAwareAction) -> &IntervalTimer {
        match action {
            TimeAwareAction::Minute => &self.minute,
            TimeAwareAction::Second => &self.second,
            TimeAwareAction::HundredMillis => &self.tick,
        }
    }
}
