//! Wrap-safe tick arithmetic
//!
//! Tick counters are 32 bits wide and wrap at `u32::MAX`, like the platform
//! millisecond and microsecond counters. All due-time comparisons go through
//! [`elapsed`]: the difference is taken with wrapping subtraction and then
//! reinterpreted as signed, which stays correct across an overflow as long as
//! the true span is below [`MAX_SPAN`].

/// Tick counter reading, wraps at `u32::MAX`
pub type Tick = u32;

/// Longest span that [`elapsed`] resolves unambiguously (half the counter range)
pub const MAX_SPAN: u32 = i32::MAX as u32;

/// Signed ticks from `timestamp` to `now`; negative while `timestamp` is still ahead
#[inline]
pub const fn elapsed(now: Tick, timestamp: Tick) -> i32 {
    now.wrapping_sub(timestamp) as i32
}

/// Returns true once `now` is at or past `timer`
#[inline]
pub const fn reached(now: Tick, timer: Tick) -> bool {
    elapsed(now, timer) >= 0
}

/// Free-running millisecond and microsecond counters
pub trait Clock {
    /// Current millisecond counter
    fn now_ms(&self) -> Tick;

    /// Current microsecond counter
    fn now_us(&self) -> Tick;

    /// Milliseconds since `timestamp`, negative if it lies in the future
    fn passed_since(&self, timestamp: Tick) -> i32 {
        elapsed(self.now_ms(), timestamp)
    }

    /// Check whether the millisecond deadline `timer` has been reached
    fn reached(&self, timer: Tick) -> bool {
        self.passed_since(timer) >= 0
    }

    /// Microseconds since `timestamp`, negative if it lies in the future
    fn passed_since_us(&self, timestamp: Tick) -> i32 {
        elapsed(self.now_us(), timestamp)
    }

    /// Check whether the microsecond deadline `timer` has been reached
    fn reached_us(&self, timer: Tick) -> bool {
        self.passed_since_us(timer) >= 0
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> Tick {
        (**self).now_ms()
    }

    fn now_us(&self) -> Tick {
        (**self).now_us()
    }
}

/// Clock backed by the embassy time driver
///
/// The 64-bit embassy instant is truncated to 32 bits, so the readings wrap
/// exactly like a native 32-bit counter would.
#[cfg(feature = "embassy-time")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyClock;

#[cfg(feature = "embassy-time")]
impl Clock for EmbassyClock {
    fn now_ms(&self) -> Tick {
        embassy_time::Instant::now().as_millis() as Tick
    }

    fn now_us(&self) -> Tick {
        embassy_time::Instant::now().as_micros() as Tick
    }
}
