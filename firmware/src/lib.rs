#![no_std]

//! CH32V203 board support for the LoRa link node

pub mod ch32v203_hardware;
pub mod time_driver;

pub use ch32v203_hardware::{
    dispatch_exti, hardware_init, input_level, CycleDelay, ExtiInput, ExtiLine, GpioOutput, Spi1Device,
};

/// Radio driver as wired on this board
pub type BoardRadio = lora_core::Sx127x<Spi1Device, GpioOutput, CycleDelay, ExtiLine>;

/// Build the radio driver; call after [`hardware_init`]
pub fn board_radio() -> BoardRadio {
    lora_core::Sx127x::new(Spi1Device::new(), GpioOutput::radio_reset(), CycleDelay, ExtiLine::dio0())
}
