#![no_std]
#![no_main]

#[cfg(feature = "defmt")]
use defmt_rtt as _;

// Panic handler
#[cfg(not(feature = "defmt"))]
use panic_halt as _;
#[cfg(feature = "defmt")]
use panic_probe as _;

use riscv_rt::entry;

use lora_core::*;
use lora_node_firmware::ch32v203_hardware::{DIO0_LINE, INPUT_LINE, IRQ_EXTI0, IRQ_EXTI1, IRQ_SYSTICK};
use lora_node_firmware::*;

/// Index of the monitored input in the pin bank
const INPUT_PIN: usize = 0;
const DEBOUNCE_MS: u32 = 50;

// Shared with the interrupt handlers
static ARBITER: RadioArbiter = RadioArbiter::new();
static PINS: PinBank<PIN_CHANNELS> = PinBank::new();
static MONITOR: DebounceMonitor = DebounceMonitor::new(DEBOUNCE_MS);

type Node = Controller<'static, BoardRadio, EmbassyClock, PIN_CHANNELS>;

/// DIO0 rising edge: the radio finished a transmit or a receive
fn radio_done() {
    let _completion = ARBITER.on_completion();
    #[cfg(feature = "defmt")]
    defmt::trace!("Radio completion: {}", _completion);
}

/// Monitored input changed level
fn input_changed() {
    sample_input();
}

fn sample_input() {
    critical_section::with(|_| {
        let Some(channel) = PINS.channel(INPUT_PIN) else {
            return;
        };
        if let Some(_state) = MONITOR.sample(channel, input_level(), EmbassyClock.now_ms()) {
            #[cfg(feature = "defmt")]
            defmt::debug!("Input {} stable at {}", INPUT_PIN, _state);
        }
    });
}

#[entry]
fn main() -> ! {
    #[cfg(feature = "defmt")]
    defmt::info!("LoRa node firmware starting");

    hardware_init();
    time_driver::init();
    unsafe { riscv::interrupt::enable() };

    let config = NodeConfig::new(868.0, DEBOUNCE_MS).unwrap_or_default();
    let mut node: Node = Controller::new(board_radio(), EmbassyClock, &ARBITER, &PINS, config);

    match node.start(radio_done) {
        Ok(report) => log_events(&report),
        Err(_error) => {
            #[cfg(feature = "defmt")]
            defmt::error!("Startup failed: {}", _error);
            let _ = node.radio_mut().sleep();
            halt();
        }
    }

    let mut input = ExtiInput::monitored();
    if let Err(_error) = node.attach_input(INPUT_PIN, &mut input, input_changed) {
        #[cfg(feature = "defmt")]
        defmt::warn!("Input not attached: {}", _error);
    }

    #[cfg(feature = "defmt")]
    defmt::info!("Node ready");

    main_loop(&mut node)
}

fn main_loop(node: &mut Node) -> ! {
    loop {
        // Commits holds that finished without a further edge
        sample_input();

        log_events(&node.poll());

        // SysTick wakes us every millisecond
        unsafe { riscv::asm::wfi() };
    }
}

#[cfg(feature = "defmt")]
fn log_events(report: &PassReport) {
    for event in report.iter() {
        defmt::info!("{}", event);
    }
}

#[cfg(not(feature = "defmt"))]
fn log_events(_report: &PassReport) {}

fn halt() -> ! {
    loop {
        unsafe { riscv::asm::wfi() };
    }
}

/// Every PFIC interrupt above the core range lands here; dispatch on mcause
#[export_name = "DefaultHandler"]
fn default_handler() {
    let code = riscv::register::mcause::read().code() as u32;
    match code {
        IRQ_SYSTICK => time_driver::on_systick(),
        IRQ_EXTI0 => dispatch_exti(INPUT_LINE),
        IRQ_EXTI1 => dispatch_exti(DIO0_LINE),
        _ => {}
    }
}
