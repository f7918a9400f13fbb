//! Hardware Abstraction Layer for the link node

/// Interrupt handler registered with a line or with the radio
pub type Handler = fn();

/// Error types for HAL operations
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HalError {
    /// GPIO operation failed
    GpioError,
    /// Bus transfer failed
    BusError,
    /// Interrupt configuration failed
    InterruptError,
    /// Hardware not initialized
    NotInitialized,
    /// Invalid configuration
    InvalidConfig,
}

#[cfg(feature = "std")]
impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            HalError::GpioError => write!(f, "GPIO operation failed"),
            HalError::BusError => write!(f, "Bus transfer failed"),
            HalError::InterruptError => write!(f, "Interrupt configuration failed"),
            HalError::NotInitialized => write!(f, "Hardware not initialized"),
            HalError::InvalidConfig => write!(f, "Invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

/// Result codes of the radio capability
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// Received packet failed its CRC check
    CrcMismatch,
    /// Chip answered with an unexpected silicon version
    ChipNotFound(u8),
    /// Payload exceeds the FIFO
    PacketTooLong,
    /// Carrier outside the synthesizer range
    InvalidFrequency,
    /// Underlying bus, pin or interrupt failure
    Hal(HalError),
}

impl From<HalError> for RadioError {
    fn from(error: HalError) -> Self {
        RadioError::Hal(error)
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for RadioError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            RadioError::CrcMismatch => write!(f, "CRC error"),
            RadioError::ChipNotFound(version) => write!(f, "Radio not found (version 0x{:02x})", version),
            RadioError::PacketTooLong => write!(f, "Packet too long"),
            RadioError::InvalidFrequency => write!(f, "Frequency out of range"),
            RadioError::Hal(error) => write!(f, "{}", error),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for RadioError {}

/// Fatal startup failure
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// Radio `begin` failed
    Radio(RadioError),
    /// Completion handler could not be registered
    CompletionLine(RadioError),
}

#[cfg(feature = "std")]
impl core::fmt::Display for InitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            InitError::Radio(error) => write!(f, "Radio init failed: {}", error),
            InitError::CompletionLine(error) => write!(f, "Completion interrupt setup failed: {}", error),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for InitError {}

/// Half-duplex packet radio with interrupt-signalled completion
///
/// Transmit and receive calls only start the operation; the registered
/// completion handler runs in interrupt context when it finishes.
pub trait Radio {
    /// Reset and configure the chip
    fn begin(&mut self) -> Result<(), RadioError>;

    /// Tune the carrier
    fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError>;

    /// Register the handler run when an operation completes
    fn set_completion_handler(&mut self, handler: Handler) -> Result<(), RadioError>;

    /// Start sending `data`
    fn start_transmit(&mut self, data: &[u8]) -> Result<(), RadioError>;

    /// Start listening for a packet
    fn start_receive(&mut self) -> Result<(), RadioError>;

    /// Copy the last received packet into `buf`, returning its length
    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, RadioError>;

    /// Signal strength of the last received packet in dBm
    fn rssi(&mut self) -> Result<f32, RadioError>;
}

/// Digital input watched by a pin-change interrupt
pub trait MonitoredInput {
    type Error: From<HalError>;

    /// Read the raw pin level
    fn read(&mut self) -> Result<bool, Self::Error>;

    /// Run `handler` on every edge of the pin
    fn attach_change_interrupt(&mut self, handler: Handler) -> Result<(), Self::Error>;
}

/// Interrupt line without a readable level, such as a radio DIO pin
pub trait ChangeInterrupt {
    type Error: From<HalError>;

    /// Run `handler` when the line fires
    fn attach(&mut self, handler: Handler) -> Result<(), Self::Error>;
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! Mock implementations for testing

    use super::*;
    use crate::types::MAX_PACKET_LEN;
    use core::cell::{Cell, RefCell};
    use heapless::Vec;

    /// Transmissions remembered by [`MockRadio`]
    pub const MOCK_SENT_CAPACITY: usize = 16;

    /// Payload recorded by [`MockRadio`]
    pub type Payload = Vec<u8, MAX_PACKET_LEN>;

    /// Scripted radio recording every call
    #[derive(Default)]
    pub struct MockRadio {
        begin_result: Option<RadioError>,
        frequency_result: Option<RadioError>,
        transmit_result: Option<RadioError>,
        receive_result: Option<RadioError>,
        read_result: Option<RadioError>,
        frequency: Option<f32>,
        handler: Option<Handler>,
        sent: Vec<Payload, MOCK_SENT_CAPACITY>,
        inbox: Payload,
        rssi: f32,
        receive_starts: usize,
        reads: usize,
    }

    impl MockRadio {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `begin` fail
        pub fn fail_begin(&mut self, error: RadioError) {
            self.begin_result = Some(error);
        }

        /// Make `set_frequency` fail
        pub fn fail_frequency(&mut self, error: RadioError) {
            self.frequency_result = Some(error);
        }

        /// Make `start_transmit` fail until cleared with `None`
        pub fn set_transmit_error(&mut self, error: Option<RadioError>) {
            self.transmit_result = error;
        }

        /// Make `start_receive` fail until cleared with `None`
        pub fn set_receive_error(&mut self, error: Option<RadioError>) {
            self.receive_result = error;
        }

        /// Make the next reads fail until cleared with `None`
        pub fn set_read_error(&mut self, error: Option<RadioError>) {
            self.read_result = error;
        }

        /// Load the packet returned by `read_data`
        pub fn load_packet(&mut self, data: &[u8], rssi: f32) {
            self.inbox.clear();
            let _ = self.inbox.extend_from_slice(data);
            self.rssi = rssi;
        }

        /// Run the registered completion handler as the interrupt would
        pub fn fire_completion(&self) -> bool {
            match self.handler {
                Some(handler) => {
                    handler();
                    true
                }
                None => false,
            }
        }

        pub fn has_handler(&self) -> bool {
            self.handler.is_some()
        }

        pub fn frequency(&self) -> Option<f32> {
            self.frequency
        }

        /// Payloads accepted by `start_transmit`, oldest first
        pub fn sent(&self) -> &[Payload] {
            &self.sent
        }

        /// Last accepted payload as text
        pub fn last_sent(&self) -> Option<&str> {
            self.sent.last().and_then(|payload| core::str::from_utf8(payload).ok())
        }

        pub fn receive_starts(&self) -> usize {
            self.receive_starts
        }

        pub fn reads(&self) -> usize {
            self.reads
        }
    }

    impl Radio for MockRadio {
        fn begin(&mut self) -> Result<(), RadioError> {
            self.begin_result.map_or(Ok(()), Err)
        }

        fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError> {
            if let Some(error) = self.frequency_result {
                return Err(error);
            }
            self.frequency = Some(mhz);
            Ok(())
        }

        fn set_completion_handler(&mut self, handler: Handler) -> Result<(), RadioError> {
            self.handler = Some(handler);
            Ok(())
        }

        fn start_transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
            if let Some(error) = self.transmit_result {
                return Err(error);
            }
            let payload = Payload::from_slice(data).map_err(|_| RadioError::PacketTooLong)?;
            // Oldest entry makes room once the log is full
            if self.sent.is_full() {
                self.sent.remove(0);
            }
            let _ = self.sent.push(payload);
            Ok(())
        }

        fn start_receive(&mut self) -> Result<(), RadioError> {
            if let Some(error) = self.receive_result {
                return Err(error);
            }
            self.receive_starts += 1;
            Ok(())
        }

        fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
            self.reads += 1;
            if let Some(error) = self.read_result {
                return Err(error);
            }
            let len = self.inbox.len().min(buf.len());
            buf[..len].copy_from_slice(&self.inbox[..len]);
            Ok(len)
        }

        fn rssi(&mut self) -> Result<f32, RadioError> {
            Ok(self.rssi)
        }
    }

    /// Input whose level is set by the test
    #[derive(Default)]
    pub struct MockInput {
        level: Cell<bool>,
        handler: Cell<Option<Handler>>,
    }

    impl MockInput {
        pub fn new() -> Self {
            Self::default()
        }

        /// Change the level and run the edge handler if one is attached
        pub fn set_level(&self, level: bool) {
            let changed = self.level.replace(level) != level;
            if let (true, Some(handler)) = (changed, self.handler.get()) {
                handler();
            }
        }

        pub fn level(&self) -> bool {
            self.level.get()
        }

        pub fn is_attached(&self) -> bool {
            self.handler.get().is_some()
        }
    }

    impl MonitoredInput for MockInput {
        type Error = HalError;

        fn read(&mut self) -> Result<bool, Self::Error> {
            Ok(self.level.get())
        }

        fn attach_change_interrupt(&mut self, handler: Handler) -> Result<(), Self::Error> {
            self.handler.set(Some(handler));
            Ok(())
        }
    }

    /// Interrupt line that can be fired by hand
    #[derive(Default)]
    pub struct MockLine {
        handler: RefCell<Option<Handler>>,
        fail_attach: bool,
    }

    impl MockLine {
        pub fn new() -> Self {
            Self::default()
        }

        /// Line whose `attach` always fails
        pub fn broken() -> Self {
            Self {
                handler: RefCell::new(None),
                fail_attach: true,
            }
        }

        /// Run the attached handler, returning false if none is attached
        pub fn fire(&self) -> bool {
            match *self.handler.borrow() {
                Some(handler) => {
                    handler();
                    true
                }
                None => false,
            }
        }
    }

    impl ChangeInterrupt for MockLine {
        type Error = HalError;

        fn attach(&mut self, handler: Handler) -> Result<(), Self::Error> {
            if self.fail_attach {
                return Err(HalError::InterruptError);
            }
            *self.handler.borrow_mut() = Some(handler);
            Ok(())
        }
    }
}
