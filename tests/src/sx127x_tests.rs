//! SX127x driver against scripted SPI and GPIO mocks

use std::sync::atomic::{AtomicU32, Ordering};

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::pin::{Mock as PinMock, State as PinState, Transaction as PinTransaction};
use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

use lora_core::hal::mock::MockLine;
use lora_core::sx127x::{regs, LORA_DEFAULTS};
use lora_core::{HalError, Radio, RadioError, Sx127x};

type Driver = Sx127x<SpiMock<u8>, PinMock, NoopDelay, MockLine>;

static DIO0_FIRED: AtomicU32 = AtomicU32::new(0);

fn dio0_fired() {
    DIO0_FIRED.fetch_add(1, Ordering::Relaxed);
}

fn write(reg: u8, value: u8) -> Vec<SpiTransaction<u8>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![reg | 0x80, value]),
        SpiTransaction::transaction_end(),
    ]
}

fn read(reg: u8, value: u8) -> Vec<SpiTransaction<u8>> {
    vec![
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![reg & 0x7F]),
        SpiTransaction::read_vec(vec![value]),
        SpiTransaction::transaction_end(),
    ]
}

fn reset_pulse() -> Vec<PinTransaction> {
    vec![PinTransaction::set(PinState::Low), PinTransaction::set(PinState::High)]
}

fn begin_sequence() -> Vec<SpiTransaction<u8>> {
    let mut expected = read(regs::VERSION, 0x12);
    expected.extend(write(regs::OP_MODE, 0x00));
    expected.extend(write(regs::OP_MODE, 0x80));
    for (reg, value) in LORA_DEFAULTS {
        expected.extend(write(reg, value));
    }
    expected.extend(write(regs::OP_MODE, 0x81));
    expected
}

fn frequency_sequence(msb: u8, mid: u8, lsb: u8) -> Vec<SpiTransaction<u8>> {
    let mut expected = write(regs::FRF_MSB, msb);
    expected.extend(write(regs::FRF_MID, mid));
    expected.extend(write(regs::FRF_LSB, lsb));
    expected
}

fn driver(spi: &[SpiTransaction<u8>], reset: &[PinTransaction], line: MockLine) -> Driver {
    Sx127x::new(SpiMock::new(spi), PinMock::new(reset), NoopDelay::new(), line)
}

fn finish(radio: Driver) -> MockLine {
    let (mut spi, mut reset, _delay, line) = radio.release();
    spi.done();
    reset.done();
    line
}

#[test]
fn begin_configures_lora_mode() {
    let mut spi = begin_sequence();
    spi.extend(frequency_sequence(0xD9, 0x00, 0x00));
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    radio.begin().unwrap();
    radio.set_frequency(868.0).unwrap();
    assert_eq!(radio.frequency_mhz(), 868.0);
    finish(radio);
}

#[test]
fn begin_rejects_unknown_chip() {
    let spi = read(regs::VERSION, 0x00);
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    assert_eq!(radio.begin(), Err(RadioError::ChipNotFound(0x00)));
    // Still unusable afterwards
    assert_eq!(radio.start_receive(), Err(RadioError::Hal(HalError::NotInitialized)));
    finish(radio);
}

#[test]
fn out_of_band_frequency_touches_nothing() {
    let mut radio = driver(&[], &[], MockLine::new());
    assert_eq!(radio.set_frequency(2400.0), Err(RadioError::InvalidFrequency));
    assert_eq!(radio.set_frequency(100.0), Err(RadioError::InvalidFrequency));
    finish(radio);
}

#[test]
fn transmit_loads_fifo_and_maps_tx_done() {
    let mut spi = begin_sequence();
    spi.extend(write(regs::OP_MODE, 0x81));
    spi.extend(write(regs::FIFO_ADDR_PTR, 0x00));
    spi.extend([
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![0x80]),
        SpiTransaction::write_vec(b"SYN".to_vec()),
        SpiTransaction::transaction_end(),
    ]);
    spi.extend(write(regs::PAYLOAD_LENGTH, 3));
    spi.extend(write(regs::DIO_MAPPING1, 0x40));
    spi.extend(write(regs::IRQ_FLAGS, 0xFF));
    spi.extend(write(regs::OP_MODE, 0x83));
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    radio.begin().unwrap();
    radio.start_transmit(b"SYN").unwrap();
    finish(radio);
}

#[test]
fn transmit_guards() {
    let mut radio = driver(&[], &[], MockLine::new());
    assert_eq!(radio.start_transmit(&[0u8; 256]), Err(RadioError::PacketTooLong));
    assert_eq!(radio.start_transmit(b"x"), Err(RadioError::Hal(HalError::NotInitialized)));
    finish(radio);
}

#[test]
fn receive_maps_rx_done() {
    let mut spi = begin_sequence();
    spi.extend(write(regs::OP_MODE, 0x81));
    spi.extend(write(regs::DIO_MAPPING1, 0x00));
    spi.extend(write(regs::IRQ_FLAGS, 0xFF));
    spi.extend(write(regs::FIFO_ADDR_PTR, 0x00));
    spi.extend(write(regs::OP_MODE, 0x85));
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    radio.begin().unwrap();
    radio.start_receive().unwrap();
    finish(radio);
}

#[test]
fn sleep_keeps_lora_mode() {
    let mut spi = begin_sequence();
    spi.extend(write(regs::OP_MODE, 0x80));
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    radio.begin().unwrap();
    radio.sleep().unwrap();
    finish(radio);
}

#[test]
fn read_packet_and_signal_strength() {
    let mut spi = begin_sequence();
    spi.extend(frequency_sequence(0xD9, 0x00, 0x00));
    // RxDone | ValidHeader
    spi.extend(read(regs::IRQ_FLAGS, 0x50));
    spi.extend(read(regs::RX_NB_BYTES, 5));
    spi.extend(read(regs::FIFO_RX_CURRENT_ADDR, 0x10));
    spi.extend(write(regs::FIFO_ADDR_PTR, 0x10));
    spi.extend([
        SpiTransaction::transaction_start(),
        SpiTransaction::write_vec(vec![regs::FIFO]),
        SpiTransaction::read_vec(b"hello".to_vec()),
        SpiTransaction::transaction_end(),
    ]);
    spi.extend(write(regs::IRQ_FLAGS, 0xFF));
    // Good link: SNR +10 dB leaves the RSSI alone
    spi.extend(read(regs::PKT_RSSI_VALUE, 90));
    spi.extend(read(regs::PKT_SNR_VALUE, 40));
    // Below the noise floor: SNR -5 dB is added
    spi.extend(read(regs::PKT_RSSI_VALUE, 90));
    spi.extend(read(regs::PKT_SNR_VALUE, (-20i8) as u8));
    let mut radio = driver(&spi, &reset_pulse(), MockLine::new());

    radio.begin().unwrap();
    radio.set_frequency(868.0).unwrap();
    let mut buf = [0u8; 255];
    let len = radio.read_data(&mut buf).unwrap();
    assert_eq!(&buf[..len], b"hello");
    assert_eq!(radio.rssi(), Ok(-67.0));
    assert_eq!(radio.rssi(), Ok(-72.0));
    finish(radio);
}

#[test]
fn low_band_uses_low_frequency_rssi_offset() {
    let mut spi = frequency_sequence(0x6C, 0x80, 0x00);
    spi.extend(read(regs::PKT_RSSI_VALUE, 100));
    spi.extend(read(regs::PKT_SNR_VALUE, 0));
    let mut radio = driver(&spi, &[], MockLine::new());

    radio.set_frequency(434.0).unwrap();
    assert_eq!(radio.rssi(), Ok(-64.0));
    finish(radio);
}

#[test]
fn crc_error_clears_flags() {
    let mut spi = read(regs::IRQ_FLAGS, 0x60);
    spi.extend(write(regs::IRQ_FLAGS, 0xFF));
    let mut radio = driver(&spi, &[], MockLine::new());

    let mut buf = [0u8; 16];
    assert_eq!(radio.read_data(&mut buf), Err(RadioError::CrcMismatch));
    finish(radio);
}

#[test]
fn completion_handler_rides_on_dio0() {
    let mut radio = driver(&[], &[], MockLine::new());
    radio.set_completion_handler(dio0_fired).unwrap();
    let line = finish(radio);

    let before = DIO0_FIRED.load(Ordering::Relaxed);
    assert!(line.fire());
    assert_eq!(DIO0_FIRED.load(Ordering::Relaxed), before + 1);

    let mut radio = driver(&[], &[], MockLine::broken());
    assert_eq!(
        radio.set_completion_handler(dio0_fired),
        Err(RadioError::Hal(HalError::InterruptError))
    );
    finish(radio);
}
