//! Radio action arbitration between the completion interrupt and the main loop
//!
//! The arbiter is a process-wide static. The main loop claims the radio with
//! [`RadioArbiter::try_acquire`] before starting an operation; the completion
//! interrupt calls [`RadioArbiter::on_completion`], which hands the channel
//! back (action to OFF) and raises the completion flag of the finished kind.
//! The main loop consumes a flag through [`RadioArbiter::take_transmitted`] or
//! [`RadioArbiter::take_received`], which close the interrupt gate for as long
//! as the returned [`GateGuard`] lives.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::types::{Operation, RadioAction};

/// Reason an operation could not be started
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Busy {
    /// Another operation is outstanding
    Outstanding(RadioAction),
    /// The previous operation of this kind has not been consumed yet
    CompletionPending(Operation),
}

#[cfg(feature = "std")]
impl core::fmt::Display for Busy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Busy::Outstanding(action) => write!(f, "Radio busy ({:?} outstanding)", action),
            Busy::CompletionPending(op) => write!(f, "{:?} completion not consumed yet", op),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Busy {}

/// What a completion interrupt did
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// Transmit finished, `transmitted` raised
    Transmitted,
    /// Receive finished, `received` raised
    Received,
    /// Nothing was outstanding
    Spurious,
    /// Gate closed; replayed when the gate re-opens
    Deferred,
}

/// OFF/TX/RX state machine plus completion flags and interrupt gate
pub struct RadioArbiter {
    action: AtomicU8,
    transmitted: AtomicBool,
    received: AtomicBool,
    gate_open: AtomicBool,
    deferred: AtomicBool,
}

impl RadioArbiter {
    /// Idle arbiter: OFF, no flags, gate open
    pub const fn new() -> Self {
        Self {
            action: AtomicU8::new(RadioAction::Off as u8),
            transmitted: AtomicBool::new(false),
            received: AtomicBool::new(false),
            gate_open: AtomicBool::new(true),
            deferred: AtomicBool::new(false),
        }
    }

    /// Operation currently outstanding
    pub fn action(&self) -> RadioAction {
        RadioAction::from_u8(self.action.load(Ordering::Acquire))
    }

    /// Returns true if the channel is free
    pub fn is_idle(&self) -> bool {
        self.action().is_off()
    }

    /// Returns true if the completion interrupt may update state
    pub fn interrupt_enabled(&self) -> bool {
        self.gate_open.load(Ordering::Acquire)
    }

    /// Completion flag of `op` raised and not yet consumed
    pub fn is_pending(&self, op: Operation) -> bool {
        self.flag(op).load(Ordering::Acquire)
    }

    /// Claim the channel for `op` (OFF to TX or RX)
    ///
    /// Rejections are not queued; the caller retries on a later pass.
    /// A transmit is also refused while a received packet is unread, since
    /// loading the FIFO would overwrite it.
    pub fn try_acquire(&self, op: Operation) -> Result<(), Busy> {
        if self.is_pending(op) {
            return Err(Busy::CompletionPending(op));
        }
        if op == Operation::Transmit && self.is_pending(Operation::Receive) {
            return Err(Busy::CompletionPending(Operation::Receive));
        }
        self.action
            .compare_exchange(RadioAction::Off as u8, op.action() as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|raw| Busy::Outstanding(RadioAction::from_u8(raw)))
    }

    /// Give back a claim whose operation the radio refused to start
    pub fn release(&self, op: Operation) -> bool {
        self.action
            .compare_exchange(op.action() as u8, RadioAction::Off as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Completion interrupt entry point
    pub fn on_completion(&self) -> Completion {
        if !self.gate_open.load(Ordering::Acquire) {
            self.deferred.store(true, Ordering::Release);
            return Completion::Deferred;
        }
        self.complete()
    }

    /// Consume a raised `transmitted` flag
    ///
    /// The gate stays closed until the guard is dropped.
    pub fn take_transmitted(&self) -> Option<GateGuard<'_>> {
        self.take(Operation::Transmit)
    }

    /// Consume a raised `received` flag
    ///
    /// The gate stays closed until the guard is dropped; read the packet
    /// while holding it.
    pub fn take_received(&self) -> Option<GateGuard<'_>> {
        self.take(Operation::Receive)
    }

    fn flag(&self, op: Operation) -> &AtomicBool {
        match op {
            Operation::Transmit => &self.transmitted,
            Operation::Receive => &self.received,
        }
    }

    fn take(&self, op: Operation) -> Option<GateGuard<'_>> {
        if !self.is_pending(op) {
            return None;
        }
        self.gate_open.store(false, Ordering::Release);
        let guard = GateGuard { arbiter: self };
        self.flag(op).store(false, Ordering::Release);
        // Normally already OFF; the interrupt hands the channel back itself
        let _ = self.release(op);
        Some(guard)
    }

    fn complete(&self) -> Completion {
        // swap so only one actor claims a given completion
        match RadioAction::from_u8(self.action.swap(RadioAction::Off as u8, Ordering::AcqRel)) {
            RadioAction::Tx => {
                self.transmitted.store(true, Ordering::Release);
                Completion::Transmitted
            }
            RadioAction::Rx => {
                self.received.store(true, Ordering::Release);
                Completion::Received
            }
            RadioAction::Off => Completion::Spurious,
        }
    }

    fn open_gate(&self) {
        self.gate_open.store(true, Ordering::Release);
        if self.deferred.swap(false, Ordering::AcqRel) {
            self.complete();
        }
    }
}

impl Default for RadioArbiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Closed interrupt gate; dropping it re-opens the gate
///
/// A completion that arrived while the gate was closed is applied on drop.
/// Guards must not be nested.
#[must_use = "the gate re-opens as soon as the guard is dropped"]
pub struct GateGuard<'a> {
    arbiter: &'a RadioArbiter,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.arbiter.open_gate();
    }
}
