#![cfg_attr(not(feature = "std"), no_std)]

//! # LoRa Core
//!
//! Interrupt-safe radio arbitration and time-aware scheduling for a
//! half-duplex LoRa link node on a single-threaded microcontroller loop.

// Must stay first so the logging macros are visible to every module
mod fmt;

pub mod types;
pub mod clock;
pub mod scheduler;
pub mod debounce;
pub mod arbiter;
pub mod dispatcher;
pub mod controller;
pub mod hal;
pub mod sx127x;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;


pub use types::*;
pub use clock::{elapsed, reached, Clock, Tick, MAX_SPAN};
#[cfg(feature = "embassy-time")]
pub use clock::EmbassyClock;
pub use scheduler::{next_deadline, DueActions, IntervalTimer, Scheduler, TimeAwareAction};
pub use debounce::{DebounceMonitor, PinBank, PinChannel};
pub use arbiter::{Busy, Completion, GateGuard, RadioArbiter};
pub use dispatcher::{Event, Packet, PacketDispatcher, PassReport};
pub use controller::Controller;
pub use hal::{ChangeInterrupt, HalError, Handler, InitError, MonitoredInput, Radio, RadioError};
pub use sx127x::Sx127x;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default configuration: 868 MHz, 50 ms debounce, 60 s / 1 s / 100 ms tasks
pub fn default_config() -> NodeConfig {
    NodeConfig::default()
}
