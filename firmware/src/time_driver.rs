//! Embassy time driver fed by the CH32V203 SysTick at 1 kHz
//!
//! Readings are scaled to whatever tick rate embassy-time was built with.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_time_driver::{AlarmHandle, Driver, TICK_HZ};

use crate::ch32v203_hardware::{
    enable_irq, write_reg, HCLK_HZ, IRQ_SYSTICK, STK_BASE, STK_CMPHR, STK_CMPLR, STK_CNTH, STK_CNTL, STK_CTLR, STK_SR,
};

/// STK_CTLR: counter enable, interrupt enable, HCLK source, auto-reload
const STK_CTLR_RUN: u32 = 0b1111;

/// Millisecond counter kept by the SysTick interrupt
///
/// 64 bits wide so embassy instants never wrap; the core library truncates
/// readings to its own 32-bit ticks.
pub struct SysTickDriver {
    ticks: Mutex<Cell<u64>>,
}

impl SysTickDriver {
    const fn new() -> Self {
        Self {
            ticks: Mutex::new(Cell::new(0)),
        }
    }

    /// Advance by one tick (called from the SysTick interrupt)
    pub fn tick(&self) {
        critical_section::with(|cs| {
            let ticks = self.ticks.borrow(cs);
            ticks.set(ticks.get().wrapping_add(1));
        });
    }
}

impl Driver for SysTickDriver {
    fn now(&self) -> u64 {
        critical_section::with(|cs| self.ticks.borrow(cs).get()) * (TICK_HZ / 1_000)
    }

    unsafe fn allocate_alarm(&self) -> Option<AlarmHandle> {
        // Nothing awaits timers; the main loop polls
        None
    }

    fn set_alarm_callback(&self, _alarm: AlarmHandle, _callback: fn(*mut ()), _ctx: *mut ()) {}

    fn set_alarm(&self, _alarm: AlarmHandle, _timestamp: u64) -> bool {
        false
    }
}

embassy_time_driver::time_driver_impl!(static DRIVER: SysTickDriver = SysTickDriver::new());

/// Start the 1 ms SysTick
pub fn init() {
    unsafe {
        write_reg(STK_BASE, STK_CTLR, 0);
        write_reg(STK_BASE, STK_CNTL, 0);
        write_reg(STK_BASE, STK_CNTH, 0);
        write_reg(STK_BASE, STK_CMPLR, HCLK_HZ / 1_000 - 1);
        write_reg(STK_BASE, STK_CMPHR, 0);
        write_reg(STK_BASE, STK_SR, 0);
        write_reg(STK_BASE, STK_CTLR, STK_CTLR_RUN);
    }
    enable_irq(IRQ_SYSTICK);
}

/// SysTick interrupt body: acknowledge and count
pub fn on_systick() {
    unsafe {
        write_reg(STK_BASE, STK_SR, 0);
    }
    DRIVER.tick();
}

// Critical section implementation for single-hart RISC-V
struct RiscvCriticalSection;
critical_section::set_impl!(RiscvCriticalSection);

unsafe impl critical_section::Impl for RiscvCriticalSection {
    unsafe fn acquire() -> critical_section::RawRestoreState {
        // Clear MIE and return its previous value in one instruction
        let mstatus: usize;
        core::arch::asm!("csrrci {}, mstatus, 8", out(reg) mstatus);
        (mstatus & 8) as u8
    }

    unsafe fn release(was_enabled: critical_section::RawRestoreState) {
        if was_enabled != 0 {
            core::arch::asm!("csrsi mstatus, 8");
        }
    }
}
