//! CH32V203 Hardware Implementation
//!
//! 64KB Flash / 20KB RAM, running from the 8 MHz HSI.
//!
//! Pin assignments:
//! - PA0 = monitored input (pull-up, EXTI0, both edges)
//! - PA1 = radio DIO0 (EXTI1, rising edge)
//! - PA4 = radio NSS (push-pull, driven by software)
//! - PA5/PA6/PA7 = SPI1 SCK/MISO/MOSI
//! - PB0 = radio RESET (push-pull)

use core::cell::Cell;
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};
use lora_core::{ChangeInterrupt, HalError, Handler, MonitoredInput};

/// Core clock after reset (HSI, no PLL)
pub const HCLK_HZ: u32 = 8_000_000;

// Memory map
pub const RCC_BASE: u32 = 0x4002_1000;
pub const AFIO_BASE: u32 = 0x4001_0000;
pub const EXTI_BASE: u32 = 0x4001_0400;
pub const GPIOA_BASE: u32 = 0x4001_0800;
pub const GPIOB_BASE: u32 = 0x4001_0C00;
pub const SPI1_BASE: u32 = 0x4001_3000;
pub const PFIC_BASE: u32 = 0xE000_E000;
pub const STK_BASE: u32 = 0xE000_F000;

// RCC
const RCC_APB2PCENR: u32 = 0x18;
const APB2_AFIO: u32 = 1 << 0;
const APB2_IOPA: u32 = 1 << 2;
const APB2_IOPB: u32 = 1 << 3;
const APB2_SPI1: u32 = 1 << 12;

// GPIO
const GPIO_CFGLR: u32 = 0x00;
const GPIO_INDR: u32 = 0x08;
const GPIO_OUTDR: u32 = 0x0C;
const GPIO_BSHR: u32 = 0x10;

/// CFGLR nibbles
const PIN_INPUT_PULL: u32 = 0x8;
const PIN_INPUT_FLOATING: u32 = 0x4;
const PIN_OUTPUT_PUSH_PULL: u32 = 0x3;
const PIN_AF_PUSH_PULL: u32 = 0xB;

// AFIO
const AFIO_EXTICR1: u32 = 0x08;

// EXTI
const EXTI_INTENR: u32 = 0x00;
const EXTI_RTENR: u32 = 0x08;
const EXTI_FTENR: u32 = 0x0C;
const EXTI_INTFR: u32 = 0x14;

// SPI
const SPI_CTLR1: u32 = 0x00;
const SPI_STATR: u32 = 0x08;
const SPI_DATAR: u32 = 0x0C;
const SPI_MSTR: u32 = 1 << 2;
/// fPCLK / 8 = 1 MHz
const SPI_BR_DIV8: u32 = 0b010 << 3;
const SPI_SPE: u32 = 1 << 6;
const SPI_SSI: u32 = 1 << 8;
const SPI_SSM: u32 = 1 << 9;
const SPI_RXNE: u32 = 1 << 0;
const SPI_TXE: u32 = 1 << 1;
const SPI_BSY: u32 = 1 << 7;

// PFIC
const PFIC_IENR1: u32 = 0x100;
pub const IRQ_SYSTICK: u32 = 12;
pub const IRQ_EXTI0: u32 = 22;
pub const IRQ_EXTI1: u32 = 23;

// SysTick
pub const STK_CTLR: u32 = 0x00;
pub const STK_SR: u32 = 0x04;
pub const STK_CNTL: u32 = 0x08;
pub const STK_CNTH: u32 = 0x0C;
pub const STK_CMPLR: u32 = 0x10;
pub const STK_CMPHR: u32 = 0x14;

/// EXTI lines served by this board
pub const EXTI_LINES: usize = 2;
pub const INPUT_LINE: u8 = 0;
pub const DIO0_LINE: u8 = 1;

const NSS_PIN: u8 = 4;
const RESET_PIN: u8 = 0;

/// Volatile register read
///
/// # Safety
/// `base + offset` must be a valid peripheral register.
#[inline]
pub unsafe fn read_reg(base: u32, offset: u32) -> u32 {
    core::ptr::read_volatile((base + offset) as *const u32)
}

/// Volatile register write
///
/// # Safety
/// `base + offset` must be a valid peripheral register.
#[inline]
pub unsafe fn write_reg(base: u32, offset: u32, value: u32) {
    core::ptr::write_volatile((base + offset) as *mut u32, value);
}

/// Read-modify-write
///
/// # Safety
/// As [`write_reg`]; must not race another writer of the same register.
#[inline]
unsafe fn modify_reg(base: u32, offset: u32, f: impl FnOnce(u32) -> u32) {
    write_reg(base, offset, f(read_reg(base, offset)));
}

/// Set the 4-bit mode/config field of a low pin (0-7)
unsafe fn configure_pin(port: u32, pin: u8, cfg: u32) {
    let shift = u32::from(pin) * 4;
    modify_reg(port, GPIO_CFGLR, |crl| (crl & !(0xF << shift)) | (cfg << shift));
}

/// Enable clocks, pins and SPI1
pub fn hardware_init() {
    unsafe {
        modify_reg(RCC_BASE, RCC_APB2PCENR, |en| en | APB2_AFIO | APB2_IOPA | APB2_IOPB | APB2_SPI1);

        // PA0 input with pull-up
        configure_pin(GPIOA_BASE, INPUT_LINE, PIN_INPUT_PULL);
        modify_reg(GPIOA_BASE, GPIO_OUTDR, |odr| odr | 1 << INPUT_LINE);
        // PA1 floating, driven by the radio
        configure_pin(GPIOA_BASE, DIO0_LINE, PIN_INPUT_FLOATING);
        // NSS idles high
        write_reg(GPIOA_BASE, GPIO_BSHR, 1 << NSS_PIN);
        configure_pin(GPIOA_BASE, NSS_PIN, PIN_OUTPUT_PUSH_PULL);
        configure_pin(GPIOA_BASE, 5, PIN_AF_PUSH_PULL);
        configure_pin(GPIOA_BASE, 6, PIN_INPUT_FLOATING);
        configure_pin(GPIOA_BASE, 7, PIN_AF_PUSH_PULL);
        // RESET released
        write_reg(GPIOB_BASE, GPIO_BSHR, 1 << RESET_PIN);
        configure_pin(GPIOB_BASE, RESET_PIN, PIN_OUTPUT_PUSH_PULL);

        // EXTI0 and EXTI1 from port A
        modify_reg(AFIO_BASE, AFIO_EXTICR1, |cr| cr & !0xFF);

        // Mode 0 master, software NSS
        write_reg(SPI1_BASE, SPI_CTLR1, SPI_MSTR | SPI_BR_DIV8 | SPI_SSM | SPI_SSI);
        modify_reg(SPI1_BASE, SPI_CTLR1, |cr| cr | SPI_SPE);
    }
}

/// Enable an interrupt in the PFIC
pub fn enable_irq(irq: u32) {
    unsafe {
        write_reg(PFIC_BASE, PFIC_IENR1 + (irq / 32) * 4, 1 << (irq % 32));
    }
}

/// Level of the monitored input
pub fn input_level() -> bool {
    unsafe { read_reg(GPIOA_BASE, GPIO_INDR) & (1 << INPUT_LINE) != 0 }
}

// ========================================
// SPI
// ========================================

/// SPI1 with software chip select on PA4
pub struct Spi1Device {
    _private: (),
}

impl Spi1Device {
    /// Requires [`hardware_init`] to have run
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn transfer_byte(&mut self, byte: u8) -> u8 {
        unsafe {
            while read_reg(SPI1_BASE, SPI_STATR) & SPI_TXE == 0 {}
            write_reg(SPI1_BASE, SPI_DATAR, u32::from(byte));
            while read_reg(SPI1_BASE, SPI_STATR) & SPI_RXNE == 0 {}
            read_reg(SPI1_BASE, SPI_DATAR) as u8
        }
    }

    fn select(&mut self, active: bool) {
        unsafe {
            if active {
                write_reg(GPIOA_BASE, GPIO_BSHR, 1 << (NSS_PIN + 16));
            } else {
                while read_reg(SPI1_BASE, SPI_STATR) & SPI_BSY != 0 {}
                write_reg(GPIOA_BASE, GPIO_BSHR, 1 << NSS_PIN);
            }
        }
    }
}

impl Default for Spi1Device {
    fn default() -> Self {
        Self::new()
    }
}

impl SpiErrorType for Spi1Device {
    type Error = Infallible;
}

impl SpiDevice for Spi1Device {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.select(true);
        for operation in operations.iter_mut() {
            match operation {
                Operation::Read(words) => {
                    for word in words.iter_mut() {
                        *word = self.transfer_byte(0x00);
                    }
                }
                Operation::Write(words) => {
                    for &word in words.iter() {
                        self.transfer_byte(word);
                    }
                }
                Operation::Transfer(read, write) => {
                    let len = read.len().max(write.len());
                    for i in 0..len {
                        let received = self.transfer_byte(write.get(i).copied().unwrap_or(0x00));
                        if let Some(slot) = read.get_mut(i) {
                            *slot = received;
                        }
                    }
                }
                Operation::TransferInPlace(words) => {
                    for word in words.iter_mut() {
                        *word = self.transfer_byte(*word);
                    }
                }
                Operation::DelayNs(ns) => CycleDelay.delay_ns(*ns),
            }
        }
        self.select(false);
        Ok(())
    }
}

// ========================================
// GPIO and delay
// ========================================

/// Push-pull output on a low pin (0-7)
pub struct GpioOutput {
    port: u32,
    pin: u8,
}

impl GpioOutput {
    /// Radio reset line on PB0
    pub fn radio_reset() -> Self {
        Self {
            port: GPIOB_BASE,
            pin: RESET_PIN,
        }
    }
}

impl PinErrorType for GpioOutput {
    type Error = Infallible;
}

impl OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        unsafe { write_reg(self.port, GPIO_BSHR, 1 << (self.pin + 16)) };
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        unsafe { write_reg(self.port, GPIO_BSHR, 1 << self.pin) };
        Ok(())
    }
}

/// Busy-wait delay counted in core cycles
#[derive(Copy, Clone, Default)]
pub struct CycleDelay;

impl DelayNs for CycleDelay {
    fn delay_ns(&mut self, ns: u32) {
        let cycles = (u64::from(ns) * u64::from(HCLK_HZ) / 1_000_000_000) as u32;
        unsafe { riscv::asm::delay(cycles.max(1)) };
    }
}

// ========================================
// EXTI
// ========================================

static EXTI_HANDLERS: [Mutex<Cell<Option<Handler>>>; EXTI_LINES] = [const { Mutex::new(Cell::new(None)) }; EXTI_LINES];

fn attach_exti(line: u8, rising: bool, falling: bool, irq: u32, handler: Handler) -> Result<(), HalError> {
    let slot = EXTI_HANDLERS.get(usize::from(line)).ok_or(HalError::InterruptError)?;
    critical_section::with(|cs| slot.borrow(cs).set(Some(handler)));

    let mask = 1u32 << line;
    unsafe {
        write_reg(EXTI_BASE, EXTI_INTFR, mask);
        modify_reg(EXTI_BASE, EXTI_RTENR, |r| if rising { r | mask } else { r & !mask });
        modify_reg(EXTI_BASE, EXTI_FTENR, |r| if falling { r | mask } else { r & !mask });
        modify_reg(EXTI_BASE, EXTI_INTENR, |r| r | mask);
    }
    enable_irq(irq);
    Ok(())
}

/// EXTI interrupt body: acknowledge `line` and run its handler
pub fn dispatch_exti(line: u8) {
    unsafe { write_reg(EXTI_BASE, EXTI_INTFR, 1 << line) };
    let handler = EXTI_HANDLERS
        .get(usize::from(line))
        .and_then(|slot| critical_section::with(|cs| slot.borrow(cs).get()));
    if let Some(handler) = handler {
        handler();
    }
}

/// Monitored input on PA0, interrupt on both edges
pub struct ExtiInput {
    line: u8,
    irq: u32,
}

impl ExtiInput {
    pub fn monitored() -> Self {
        Self {
            line: INPUT_LINE,
            irq: IRQ_EXTI0,
        }
    }
}

impl MonitoredInput for ExtiInput {
    type Error = HalError;

    fn read(&mut self) -> Result<bool, Self::Error> {
        Ok(unsafe { read_reg(GPIOA_BASE, GPIO_INDR) } & (1 << self.line) != 0)
    }

    fn attach_change_interrupt(&mut self, handler: Handler) -> Result<(), Self::Error> {
        attach_exti(self.line, true, true, self.irq, handler)
    }
}

/// Radio DIO0 on PA1, interrupt on the rising edge
pub struct ExtiLine {
    line: u8,
    irq: u32,
}

impl ExtiLine {
    pub fn dio0() -> Self {
        Self {
            line: DIO0_LINE,
            irq: IRQ_EXTI1,
        }
    }
}

impl ChangeInterrupt for ExtiLine {
    type Error = HalError;

    fn attach(&mut self, handler: Handler) -> Result<(), Self::Error> {
        attach_exti(self.line, true, false, self.irq, handler)
    }
}
