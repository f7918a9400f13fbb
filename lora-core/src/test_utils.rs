//! Test utilities for link node functionality

use core::cell::Cell;

use crate::clock::{Clock, Tick};
use crate::controller::Controller;
use crate::dispatcher::Event;
use crate::hal::Radio;

/// Manually advanced clock
///
/// The microsecond counter runs at exactly 1000x the millisecond counter
/// unless set independently.
#[derive(Default)]
pub struct MockClock {
    ms: Cell<Tick>,
    us: Cell<Tick>,
}

impl MockClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `ms`
    pub fn at(ms: Tick) -> Self {
        let clock = Self::new();
        clock.set(ms);
        clock
    }

    /// Jump to `ms`, wrapping like the hardware counter
    pub fn set(&self, ms: Tick) {
        self.ms.set(ms);
        self.us.set(ms.wrapping_mul(1_000));
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u32) {
        self.set(self.ms.get().wrapping_add(ms));
    }

    /// Override the microsecond counter only
    pub fn set_us(&self, us: Tick) {
        self.us.set(us);
    }
}

impl Clock for MockClock {
    fn now_ms(&self) -> Tick {
        self.ms.get()
    }

    fn now_us(&self) -> Tick {
        self.us.get()
    }
}

/// Poll `controller` every `step_ms` for `duration_ms`, collecting the events
///
/// Calls `on_event` with the tick of the pass and each event it reported.
pub fn run_for<R, const N: usize>(
    controller: &mut Controller<'_, R, &MockClock, N>,
    clock: &MockClock,
    duration_ms: u32,
    step_ms: u32,
    mut on_event: impl FnMut(Tick, &Event),
) where
    R: Radio,
{
    let end = clock.now_ms().wrapping_add(duration_ms);
    while !crate::clock::reached(clock.now_ms(), end) {
        let now = clock.now_ms();
        for event in controller.poll().iter() {
            on_event(now, event);
        }
        clock.advance(step_ms);
    }
}
