//! Link node controller: startup and the main-loop pass

use crate::arbiter::RadioArbiter;
use crate::clock::Clock;
use crate::debounce::PinBank;
use crate::dispatcher::{PacketDispatcher, PassReport};
use crate::hal::{Handler, HalError, InitError, MonitoredInput, Radio};
use crate::scheduler::{Scheduler, TimeAwareAction};
use crate::types::{Message, NodeConfig};

/// Owns the radio and the clock and drives the periodic work
///
/// The arbiter and the pin bank are borrowed because the interrupt handlers
/// reach them through statics.
pub struct Controller<'a, R: Radio, C: Clock, const N: usize> {
    radio: R,
    clock: C,
    pins: &'a PinBank<N>,
    scheduler: Scheduler,
    dispatcher: PacketDispatcher<'a>,
    config: NodeConfig,
}

impl<'a, R: Radio, C: Clock, const N: usize> Controller<'a, R, C, N> {
    /// Create a controller; nothing touches the hardware until [`Self::start`]
    pub fn new(radio: R, clock: C, arbiter: &'a RadioArbiter, pins: &'a PinBank<N>, config: NodeConfig) -> Self {
        Self {
            radio,
            clock,
            pins,
            scheduler: Scheduler::new(&config),
            dispatcher: PacketDispatcher::new(arbiter),
            config,
        }
    }

    /// Bring the radio up and send the first packet
    ///
    /// A failed `begin` is fatal. A failed frequency change is only logged
    /// and the radio keeps its power-on carrier.
    pub fn start(&mut self, completion: Handler) -> Result<PassReport, InitError> {
        info!("Initializing radio");
        self.radio.begin().map_err(|error| {
            error!("Radio init failed: {}", error);
            InitError::Radio(error)
        })?;
        info!("Radio init success");

        if let Err(error) = self.radio.set_frequency(self.config.frequency_mhz) {
            warn!("Frequency {} MHz not applied: {}", self.config.frequency_mhz, error);
        }

        self.radio
            .set_completion_handler(completion)
            .map_err(InitError::CompletionLine)?;

        let mut report = PassReport::new();
        // Arbiter is fresh at startup, so the send is always granted
        let _ = self.dispatcher.send(&mut self.radio, Message::SystemUp, &mut report);
        Ok(report)
    }

    /// Wire input `index` to its change interrupt and start reporting it
    pub fn attach_input<I: MonitoredInput>(&self, index: usize, input: &mut I, handler: Handler) -> Result<(), I::Error> {
        let channel = self.pins.channel(index).ok_or(HalError::InvalidConfig)?;
        input.attach_change_interrupt(handler)?;
        channel.attach();
        debug!("Input {} attached", index);
        Ok(())
    }

    /// One main-loop pass: due periodic work, then listen if idle
    pub fn poll(&mut self) -> PassReport {
        let now = self.clock.now_ms();
        let mut report = PassReport::new();
        self.dispatcher.begin_pass();

        for action in self.scheduler.poll(now) {
            match action {
                TimeAwareAction::Minute => self.dispatcher.heartbeat(&mut self.radio, &mut report),
                TimeAwareAction::Second => {}
                TimeAwareAction::HundredMillis => {
                    self.dispatcher.consume_transmit(&mut report);
                    self.dispatcher.consume_receive(&mut self.radio, &mut report);
                    self.dispatcher.publish_pin_states(&mut self.radio, self.pins, &mut report);
                }
            }
        }

        self.dispatcher.ensure_listening(&mut self.radio, &mut report);
        report
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn arbiter(&self) -> &'a RadioArbiter {
        self.dispatcher.arbiter()
    }
}
