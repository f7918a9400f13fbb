//! Packet dispatch: what to send, and what to do with finished operations
//!
//! Every outcome is logged and also recorded as an [`Event`] in the pass
//! report handed back to the caller.

use heapless::Vec;

use crate::arbiter::{Busy, RadioArbiter};
use crate::debounce::PinBank;
use crate::hal::{Radio, RadioError};
use crate::types::{Message, Operation, MAX_PACKET_LEN};

/// Received packet bytes
pub type Packet = Vec<u8, MAX_PACKET_LEN>;

/// Events recorded during one main-loop pass
pub const PASS_EVENTS: usize = 8;

/// Outcomes of one main-loop pass, in the order they happened
pub type PassReport = Vec<Event, PASS_EVENTS>;

/// Observable dispatcher outcome
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Arbiter granted the send and the radio started transmitting
    TransmitStarted(Message),
    /// Channel busy; not queued
    TransmitRejected { message: Message, reason: Busy },
    /// Radio refused to start; the channel was handed back, no retry
    TransmitFailed { message: Message, error: RadioError },
    /// A completed transmit was consumed
    TransmitDone,
    /// Listening for packets
    ReceiveStarted,
    /// Radio refused to listen; retried next pass
    ReceiveStartFailed(RadioError),
    /// A packet arrived intact
    PacketReceived { payload: Packet, rssi: f32 },
    /// A packet arrived with a bad CRC and was discarded
    PacketCorrupted,
    /// Reading the packet failed and it was discarded
    ReceiveFailed(RadioError),
}

fn record(report: &mut PassReport, event: Event) {
    // Full report drops the newest event; the log line is still emitted
    let _ = report.push(event);
}

/// Transmit and receive decisions on top of the arbiter
pub struct PacketDispatcher<'a> {
    arbiter: &'a RadioArbiter,
    tx_requested: bool,
}

impl<'a> PacketDispatcher<'a> {
    pub fn new(arbiter: &'a RadioArbiter) -> Self {
        Self {
            arbiter,
            tx_requested: false,
        }
    }

    /// The arbiter this dispatcher claims the radio through
    pub fn arbiter(&self) -> &'a RadioArbiter {
        self.arbiter
    }

    /// Returns true if a transmit was granted since [`Self::begin_pass`]
    pub fn tx_requested(&self) -> bool {
        self.tx_requested
    }

    /// Start a new main-loop pass
    pub fn begin_pass(&mut self) {
        self.tx_requested = false;
    }

    /// Try to send `message`
    ///
    /// Returns `Err` only when the arbiter refused. A granted send whose start
    /// failed counts as sent: the failure is reported and not retried.
    pub fn send<R: Radio>(&mut self, radio: &mut R, message: Message, report: &mut PassReport) -> Result<(), Busy> {
        let text = message.render();
        if let Err(reason) = self.arbiter.try_acquire(Operation::Transmit) {
            debug!("Send of {=str} deferred: {}", text.as_str(), reason);
            record(report, Event::TransmitRejected { message, reason });
            return Err(reason);
        }
        self.tx_requested = true;

        match radio.start_transmit(text.as_bytes()) {
            Ok(()) => {
                info!("Sending packet {=str}", text.as_str());
                record(report, Event::TransmitStarted(message));
            }
            Err(error) => {
                self.arbiter.release(Operation::Transmit);
                error!("Transmit of {=str} failed: {}", text.as_str(), error);
                record(report, Event::TransmitFailed { message, error });
            }
        }
        Ok(())
    }

    /// Minute keep-alive, best effort
    pub fn heartbeat<R: Radio>(&mut self, radio: &mut R, report: &mut PassReport) {
        // A busy channel drops this beat; the next one comes a minute later
        let _ = self.send(radio, Message::Heartbeat, report);
    }

    /// Consume a finished transmit, if any
    ///
    /// The start result was already checked in [`send`](Self::send): a refused
    /// start is reported there as [`Event::TransmitFailed`] and hands back
    /// the channel, so only transmits the radio accepted complete here.
    pub fn consume_transmit(&mut self, report: &mut PassReport) {
        if let Some(_gate) = self.arbiter.take_transmitted() {
            info!("Transmission finished");
            record(report, Event::TransmitDone);
        }
    }

    /// Consume a finished receive, if any, reading the packet under the gate
    pub fn consume_receive<R: Radio>(&mut self, radio: &mut R, report: &mut PassReport) {
        let Some(_gate) = self.arbiter.take_received() else {
            return;
        };

        let mut payload = Packet::new();
        let _ = payload.resize_default(MAX_PACKET_LEN);
        let event = match radio.read_data(&mut payload) {
            Ok(len) => {
                payload.truncate(len);
                match radio.rssi() {
                    Ok(rssi) => {
                        info!("Received packet {=[u8]:a} RSSI {} dBm", &payload[..], rssi);
                        Event::PacketReceived { payload, rssi }
                    }
                    Err(error) => {
                        error!("RSSI read failed: {}", error);
                        Event::ReceiveFailed(error)
                    }
                }
            }
            Err(RadioError::CrcMismatch) => {
                warn!("CRC error");
                Event::PacketCorrupted
            }
            Err(error) => {
                error!("Receive failed: {}", error);
                Event::ReceiveFailed(error)
            }
        };
        record(report, event);
    }

    /// Send one notification per attached channel with an unreported state
    ///
    /// A channel is marked transmitted only when its send was granted, so a
    /// rejected notification stays pending for a later tick.
    pub fn publish_pin_states<R: Radio, const N: usize>(
        &mut self,
        radio: &mut R,
        pins: &PinBank<N>,
        report: &mut PassReport,
    ) {
        for (index, channel) in pins.iter() {
            let Some(state) = channel.pending_state() else {
                continue;
            };
            let message = Message::PinState {
                index: index as u8,
                state,
            };
            if self.send(radio, message, report).is_ok() && !channel.mark_transmitted(state) {
                trace!("Pin {} changed while being reported", index);
            }
        }
    }

    /// Start listening if the channel is free and no transmit was granted this pass
    pub fn ensure_listening<R: Radio>(&mut self, radio: &mut R, report: &mut PassReport) {
        if self.tx_requested || !self.arbiter.is_idle() {
            return;
        }
        // A raised receive flag blocks re-arming until it is consumed
        if self.arbiter.try_acquire(Operation::Receive).is_err() {
            return;
        }
        match radio.start_receive() {
            Ok(()) => {
                debug!("Listening");
                record(report, Event::ReceiveStarted);
            }
            Err(error) => {
                self.arbiter.release(Operation::Receive);
                error!("Receive start failed: {}", error);
                record(report, Event::ReceiveStartFailed(error));
            }
        }
    }
}
