//! Blocking register-level driver for SX1276/RFM95-class LoRa modules
//!
//! Operations only start the radio; completion is signalled on DIO0, which
//! the driver maps to TxDone or RxDone before each start. The DIO0 line is
//! any [`ChangeInterrupt`]; the completion handler is attached to it.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::{Operation, SpiDevice};

use crate::hal::{ChangeInterrupt, HalError, Handler, Radio, RadioError};
use crate::types::{MAX_FREQUENCY_MHZ, MAX_PACKET_LEN, MIN_FREQUENCY_MHZ};

#[allow(dead_code)]
pub mod regs {
    pub const FIFO: u8 = 0x00;
    pub const OP_MODE: u8 = 0x01;
    pub const FRF_MSB: u8 = 0x06;
    pub const FRF_MID: u8 = 0x07;
    pub const FRF_LSB: u8 = 0x08;
    pub const PA_CONFIG: u8 = 0x09;
    pub const OCP: u8 = 0x0B;
    pub const LNA: u8 = 0x0C;
    pub const FIFO_ADDR_PTR: u8 = 0x0D;
    pub const FIFO_TX_BASE_ADDR: u8 = 0x0E;
    pub const FIFO_RX_BASE_ADDR: u8 = 0x0F;
    pub const FIFO_RX_CURRENT_ADDR: u8 = 0x10;
    pub const IRQ_FLAGS: u8 = 0x12;
    pub const RX_NB_BYTES: u8 = 0x13;
    pub const PKT_SNR_VALUE: u8 = 0x19;
    pub const PKT_RSSI_VALUE: u8 = 0x1A;
    pub const MODEM_CONFIG1: u8 = 0x1D;
    pub const MODEM_CONFIG2: u8 = 0x1E;
    pub const PREAMBLE_MSB: u8 = 0x20;
    pub const PREAMBLE_LSB: u8 = 0x21;
    pub const PAYLOAD_LENGTH: u8 = 0x22;
    pub const MODEM_CONFIG3: u8 = 0x26;
    pub const SYNC_WORD: u8 = 0x39;
    pub const DIO_MAPPING1: u8 = 0x40;
    pub const VERSION: u8 = 0x42;
    pub const PA_DAC: u8 = 0x4D;
}

pub const MODE_LONG_RANGE: u8 = 0x80;
pub const MODE_SLEEP: u8 = 0x00;
pub const MODE_STDBY: u8 = 0x01;
pub const MODE_TX: u8 = 0x03;
pub const MODE_RX_CONTINUOUS: u8 = 0x05;

pub const IRQ_TX_DONE: u8 = 0x08;
pub const IRQ_PAYLOAD_CRC_ERROR: u8 = 0x20;
pub const IRQ_RX_DONE: u8 = 0x40;
pub const IRQ_ALL: u8 = 0xFF;

/// DIO0 mapping bits [7:6]
pub const DIO0_RX_DONE: u8 = 0x00;
pub const DIO0_TX_DONE: u8 = 0x40;

/// Silicon version of every SX1276/7/8/9
pub const CHIP_VERSION: u8 = 0x12;

const FXOSC: u64 = 32_000_000;

/// Lowest carrier served by the HF port (band 1)
const HF_PORT_MIN_MHZ: f32 = 779.0;
const RSSI_OFFSET_HF: f32 = -157.0;
const RSSI_OFFSET_LF: f32 = -164.0;

/// Register values applied by `begin` after switching to LoRa mode
///
/// BW 125 kHz, CR 4/5, explicit header, SF9, CRC on, AGC auto, preamble 8,
/// PA_BOOST at 17 dBm with 100 mA current limit, private sync word.
pub const LORA_DEFAULTS: [(u8, u8); 12] = [
    (regs::FIFO_TX_BASE_ADDR, 0x00),
    (regs::FIFO_RX_BASE_ADDR, 0x00),
    (regs::LNA, 0x23),
    (regs::MODEM_CONFIG1, 0x72),
    (regs::MODEM_CONFIG2, 0x94),
    (regs::MODEM_CONFIG3, 0x04),
    (regs::PREAMBLE_MSB, 0x00),
    (regs::PREAMBLE_LSB, 0x08),
    (regs::PA_CONFIG, 0x8F),
    (regs::PA_DAC, 0x84),
    (regs::OCP, 0x2B),
    (regs::SYNC_WORD, 0x12),
];

/// Frequency register value for a carrier in MHz
pub fn frf_for(mhz: f32) -> u32 {
    let hz = (mhz * 1_000_000.0) as u64;
    ((hz << 19) / FXOSC) as u32
}

fn bus<E>(_: E) -> RadioError {
    RadioError::Hal(HalError::BusError)
}

/// SX127x LoRa transceiver
pub struct Sx127x<SPI, RST, DLY, IRQ> {
    spi: SPI,
    reset: RST,
    delay: DLY,
    dio0: IRQ,
    frequency_mhz: f32,
    initialized: bool,
}

impl<SPI, RST, DLY, IRQ> Sx127x<SPI, RST, DLY, IRQ>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DLY: DelayNs,
    IRQ: ChangeInterrupt,
    IRQ::Error: Into<RadioError>,
{
    /// Wrap the bus and pins; the chip is not touched until `begin`
    pub fn new(spi: SPI, reset: RST, delay: DLY, dio0: IRQ) -> Self {
        Self {
            spi,
            reset,
            delay,
            dio0,
            frequency_mhz: 0.0,
            initialized: false,
        }
    }

    /// Give back the bus and pins
    pub fn release(self) -> (SPI, RST, DLY, IRQ) {
        (self.spi, self.reset, self.delay, self.dio0)
    }

    /// Last carrier set with `set_frequency`
    pub fn frequency_mhz(&self) -> f32 {
        self.frequency_mhz
    }

    /// Signal-to-noise ratio of the last packet in dB
    pub fn snr(&mut self) -> Result<f32, RadioError> {
        let raw = self.read_register(regs::PKT_SNR_VALUE)? as i8;
        Ok(f32::from(raw) / 4.0)
    }

    /// Put the chip to sleep
    pub fn sleep(&mut self) -> Result<(), RadioError> {
        self.set_mode(MODE_SLEEP)
    }

    pub fn read_register(&mut self, reg: u8) -> Result<u8, RadioError> {
        let mut value = [0u8];
        self.spi
            .transaction(&mut [Operation::Write(&[reg & 0x7F]), Operation::Read(&mut value)])
            .map_err(bus)?;
        Ok(value[0])
    }

    pub fn write_register(&mut self, reg: u8, value: u8) -> Result<(), RadioError> {
        self.spi.write(&[reg | 0x80, value]).map_err(bus)
    }

    fn set_mode(&mut self, mode: u8) -> Result<(), RadioError> {
        self.write_register(regs::OP_MODE, MODE_LONG_RANGE | mode)
    }

    fn hardware_reset(&mut self) -> Result<(), RadioError> {
        self.reset.set_low().map_err(|_| HalError::GpioError)?;
        self.delay.delay_ms(1);
        self.reset.set_high().map_err(|_| HalError::GpioError)?;
        self.delay.delay_ms(10);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<(), RadioError> {
        if self.initialized {
            Ok(())
        } else {
            Err(HalError::NotInitialized.into())
        }
    }
}

impl<SPI, RST, DLY, IRQ> Radio for Sx127x<SPI, RST, DLY, IRQ>
where
    SPI: SpiDevice,
    RST: OutputPin,
    DLY: DelayNs,
    IRQ: ChangeInterrupt,
    IRQ::Error: Into<RadioError>,
{
    fn begin(&mut self) -> Result<(), RadioError> {
        self.initialized = false;
        self.hardware_reset()?;

        let version = self.read_register(regs::VERSION)?;
        if version != CHIP_VERSION {
            return Err(RadioError::ChipNotFound(version));
        }

        // LoRa mode can only be selected while asleep
        self.write_register(regs::OP_MODE, MODE_SLEEP)?;
        self.write_register(regs::OP_MODE, MODE_LONG_RANGE | MODE_SLEEP)?;
        for (reg, value) in LORA_DEFAULTS {
            self.write_register(reg, value)?;
        }
        self.set_mode(MODE_STDBY)?;

        self.initialized = true;
        Ok(())
    }

    fn set_frequency(&mut self, mhz: f32) -> Result<(), RadioError> {
        if !(MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(&mhz) {
            return Err(RadioError::InvalidFrequency);
        }
        let frf = frf_for(mhz);
        self.write_register(regs::FRF_MSB, (frf >> 16) as u8)?;
        self.write_register(regs::FRF_MID, (frf >> 8) as u8)?;
        self.write_register(regs::FRF_LSB, frf as u8)?;
        self.frequency_mhz = mhz;
        Ok(())
    }

    fn set_completion_handler(&mut self, handler: Handler) -> Result<(), RadioError> {
        self.dio0.attach(handler).map_err(Into::into)
    }

    fn start_transmit(&mut self, data: &[u8]) -> Result<(), RadioError> {
        if data.len() > MAX_PACKET_LEN {
            return Err(RadioError::PacketTooLong);
        }
        self.ensure_initialized()?;

        self.set_mode(MODE_STDBY)?;
        self.write_register(regs::FIFO_ADDR_PTR, 0x00)?;
        self.spi
            .transaction(&mut [Operation::Write(&[regs::FIFO | 0x80]), Operation::Write(data)])
            .map_err(bus)?;
        self.write_register(regs::PAYLOAD_LENGTH, data.len() as u8)?;
        self.write_register(regs::DIO_MAPPING1, DIO0_TX_DONE)?;
        self.write_register(regs::IRQ_FLAGS, IRQ_ALL)?;
        self.set_mode(MODE_TX)
    }

    fn start_receive(&mut self) -> Result<(), RadioError> {
        self.ensure_initialized()?;

        self.set_mode(MODE_STDBY)?;
        self.write_register(regs::DIO_MAPPING1, DIO0_RX_DONE)?;
        self.write_register(regs::IRQ_FLAGS, IRQ_ALL)?;
        self.write_register(regs::FIFO_ADDR_PTR, 0x00)?;
        self.set_mode(MODE_RX_CONTINUOUS)
    }

    fn read_data(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let irq = self.read_register(regs::IRQ_FLAGS)?;
        if irq & IRQ_PAYLOAD_CRC_ERROR != 0 {
            self.write_register(regs::IRQ_FLAGS, IRQ_ALL)?;
            return Err(RadioError::CrcMismatch);
        }

        let len = usize::from(self.read_register(regs::RX_NB_BYTES)?).min(buf.len());
        let start = self.read_register(regs::FIFO_RX_CURRENT_ADDR)?;
        self.write_register(regs::FIFO_ADDR_PTR, start)?;
        if len > 0 {
            self.spi
                .transaction(&mut [Operation::Write(&[regs::FIFO & 0x7F]), Operation::Read(&mut buf[..len])])
                .map_err(bus)?;
        }
        self.write_register(regs::IRQ_FLAGS, IRQ_ALL)?;
        Ok(len)
    }

    fn rssi(&mut self) -> Result<f32, RadioError> {
        let raw = self.read_register(regs::PKT_RSSI_VALUE)?;
        let offset = if self.frequency_mhz >= HF_PORT_MIN_MHZ {
            RSSI_OFFSET_HF
        } else {
            RSSI_OFFSET_LF
        };
        let mut rssi = offset + f32::from(raw);
        // Below the noise floor the packet RSSI is corrected by the SNR
        let snr = self.snr()?;
        if snr < 0.0 {
            rssi += snr;
        }
        Ok(rssi)
    }
}
