//! Input debounce and per-pin report state
//!
//! A [`PinChannel`] is shared between the pin-change interrupt, which runs the
//! [`DebounceMonitor`] and publishes new stable states, and the main loop,
//! which reports them over the radio. The stable state and its "transmitted"
//! mark live in one atomic byte so the main loop can mark a report as sent
//! only if the state it sent is still the current one.

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::clock::{elapsed, Tick};

const STABLE_HIGH: u8 = 0b01;
const TRANSMITTED: u8 = 0b10;

const fn report_bits(state: bool) -> u8 {
    if state {
        STABLE_HIGH
    } else {
        0
    }
}

/// Shared state of one monitored input
pub struct PinChannel {
    attached: AtomicBool,
    report: AtomicU8,
    last_raw: AtomicBool,
    last_change: AtomicU32,
}

impl PinChannel {
    /// Create a detached channel, stable low, not yet reported
    pub const fn new() -> Self {
        Self {
            attached: AtomicBool::new(false),
            report: AtomicU8::new(0),
            last_raw: AtomicBool::new(false),
            last_change: AtomicU32::new(0),
        }
    }

    /// Mark the channel as wired to a change interrupt (done once at startup)
    pub fn attach(&self) {
        self.attached.store(true, Ordering::Release);
    }

    /// Check if the channel is wired
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Last committed stable state
    pub fn stable_state(&self) -> bool {
        self.report.load(Ordering::Acquire) & STABLE_HIGH != 0
    }

    /// Check if the current stable state has been reported
    pub fn is_transmitted(&self) -> bool {
        self.report.load(Ordering::Acquire) & TRANSMITTED != 0
    }

    /// Stable state awaiting a report, if the channel is attached and unreported
    pub fn pending_state(&self) -> Option<bool> {
        if !self.is_attached() {
            return None;
        }
        let report = self.report.load(Ordering::Acquire);
        if report & TRANSMITTED != 0 {
            None
        } else {
            Some(report & STABLE_HIGH != 0)
        }
    }

    /// Record that `state` was reported
    ///
    /// Fails (returns false) if the stable state moved on since it was read,
    /// leaving the newer state pending.
    pub fn mark_transmitted(&self, state: bool) -> bool {
        let unreported = report_bits(state);
        self.report
            .compare_exchange(unreported, unreported | TRANSMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Publish a new stable state and flag it as unreported
    fn commit(&self, state: bool) {
        self.report.store(report_bits(state), Ordering::Release);
    }
}

impl Default for PinChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed set of monitored inputs
pub struct PinBank<const N: usize> {
    channels: [PinChannel; N],
}

impl<const N: usize> PinBank<N> {
    /// Create a bank of detached channels
    pub const fn new() -> Self {
        Self {
            channels: [const { PinChannel::new() }; N],
        }
    }

    /// Channel by index
    pub fn channel(&self, index: usize) -> Option<&PinChannel> {
        self.channels.get(index)
    }

    /// All channels with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PinChannel)> {
        self.channels.iter().enumerate()
    }
}

impl<const N: usize> Default for PinBank<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounce filter run on every raw reading of an input
///
/// A raw change restarts the hold time. A reading that differs from the
/// stable state is committed once it has held for at least the window.
/// Readings of one channel must not be fed concurrently from two contexts.
#[derive(Copy, Clone, Debug)]
pub struct DebounceMonitor {
    window: u32,
}

impl DebounceMonitor {
    /// Create a monitor with the given window in ticks
    pub const fn new(window: u32) -> Self {
        Self { window }
    }

    /// Debounce window in ticks
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Feed one raw reading taken at `now`
    ///
    /// Returns the newly committed stable state, if this reading committed one.
    pub fn sample(&self, channel: &PinChannel, raw: bool, now: Tick) -> Option<bool> {
        if raw != channel.last_raw.load(Ordering::Relaxed) {
            channel.last_change.store(now, Ordering::Relaxed);
            channel.last_raw.store(raw, Ordering::Relaxed);
        }

        let held = elapsed(now, channel.last_change.load(Ordering::Relaxed));
        if held >= 0 && held as u32 >= self.window && raw != channel.stable_state() {
            channel.commit(raw);
            Some(raw)
        } else {
            None
        }
    }
}
