//! Core data types for the link node

use core::fmt::Write;
use heapless::String;

use crate::clock::MAX_SPAN;

/// Largest packet the radio can hand back from a receive
pub const MAX_PACKET_LEN: usize = 255;

/// Longest application message composed by this node
pub const MAX_MESSAGE_LEN: usize = 32;

/// Input channels in the pin bank (one is wired on the reference board)
pub const PIN_CHANNELS: usize = 3;

/// Lowest carrier frequency the SX127x family synthesizes
pub const MIN_FREQUENCY_MHZ: f32 = 137.0;

/// Highest carrier frequency the SX127x family synthesizes
pub const MAX_FREQUENCY_MHZ: f32 = 1020.0;

/// Radio operation currently outstanding
#[repr(u8)]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioAction {
    /// Idle, free for either direction
    Off = 0,
    /// Transmit outstanding
    Tx = 1,
    /// Receive outstanding
    Rx = 2,
}

impl RadioAction {
    /// Decode the raw value held by the arbiter's atomic
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            1 => RadioAction::Tx,
            2 => RadioAction::Rx,
            _ => RadioAction::Off,
        }
    }

    /// Returns true if no operation is outstanding
    pub const fn is_off(&self) -> bool {
        matches!(self, RadioAction::Off)
    }
}

/// Operation the main loop may start on the radio
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// Start a transmit
    Transmit,
    /// Start listening
    Receive,
}

impl Operation {
    /// Arbiter state while this operation is outstanding
    pub const fn action(&self) -> RadioAction {
        match self {
            Operation::Transmit => RadioAction::Tx,
            Operation::Receive => RadioAction::Rx,
        }
    }
}

/// Application messages carried over the link
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// First packet after a successful radio start
    SystemUp,
    /// Minute keep-alive
    Heartbeat,
    /// Stable state of a monitored input
    PinState { index: u8, state: bool },
}

impl Message {
    /// Payload text as it goes on air
    pub fn render(&self) -> String<MAX_MESSAGE_LEN> {
        let mut text = String::new();
        // Longest rendering is "Pin255State1", well inside the capacity
        let _ = match self {
            Message::SystemUp => text.write_str("System up"),
            Message::Heartbeat => text.write_str("SYN"),
            Message::PinState { index, state } => {
                write!(text, "Pin{}State{}", index, u8::from(*state))
            }
        };
        text
    }
}

/// Configuration rejected by validation
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Carrier outside what the radio can synthesize
    FrequencyOutOfRange,
    /// A periodic task with a zero period would fire on every pass
    ZeroInterval,
    /// Span longer than the wrap-safe half of the tick counter
    SpanTooLong,
}

#[cfg(feature = "std")]
impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigError::FrequencyOutOfRange => write!(f, "Frequency must be between 137 and 1020 MHz"),
            ConfigError::ZeroInterval => write!(f, "Task intervals must be non-zero"),
            ConfigError::SpanTooLong => write!(f, "Intervals and debounce must stay below 2^31 ticks"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Link node configuration parameters
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Carrier frequency in MHz
    pub frequency_mhz: f32,
    /// Time an input must hold steady before it is accepted
    pub debounce_ms: u32,
    /// Keep-alive period
    pub minute_interval_ms: u32,
    /// Second slot period
    pub second_interval_ms: u32,
    /// Dispatcher evaluation period
    pub tick_interval_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            frequency_mhz: 868.0,
            debounce_ms: 50,
            minute_interval_ms: 60_000,
            second_interval_ms: 1_000,
            tick_interval_ms: 100,
        }
    }
}

impl NodeConfig {
    /// Create a configuration with the default task periods
    pub fn new(frequency_mhz: f32, debounce_ms: u32) -> Result<Self, ConfigError> {
        let config = Self {
            frequency_mhz,
            debounce_ms,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Replace the three task periods
    pub fn with_intervals(self, minute_ms: u32, second_ms: u32, tick_ms: u32) -> Result<Self, ConfigError> {
        let config = Self {
            minute_interval_ms: minute_ms,
            second_interval_ms: second_ms,
            tick_interval_ms: tick_ms,
            ..self
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every field against the radio and tick counter limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(&self.frequency_mhz) {
            return Err(ConfigError::FrequencyOutOfRange);
        }
        let periods = [self.minute_interval_ms, self.second_interval_ms, self.tick_interval_ms];
        if periods.contains(&0) {
            return Err(ConfigError::ZeroInterval);
        }
        if periods.iter().chain(core::iter::once(&self.debounce_ms)).any(|&span| span > MAX_SPAN) {
            return Err(ConfigError::SpanTooLong);
        }
        Ok(())
    }
}
