use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::commands::RomCommand;
use crate::device::EmulatedKey;
use crate::error::{decode_error, OneWireError};
use crate::slave::link::{classify_reset, SlaveLink};
use crate::timing::Speed;

/// Line transition reported by the pin interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Falling,
    Rising,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResponderState {
    #[default]
    Idle,
    /// A falling edge was seen; waiting for the line to rise.
    ResetDetecting,
    PresenceServing,
    CommandServing,
}

/// Called once per accepted reset with the transaction outcome.
pub type ResultCallback = fn(bool);

/// Emulates a single key, driven by line edges.
///
/// The pin interrupt forwards each edge to [`on_edge`](Self::on_edge). A
/// falling edge timestamps the pulse; the rising edge measures it and, for a
/// reset, serves the whole transaction synchronously inside a critical
/// section.
pub struct SingleSlaveResponder<P, C> {
    link: SlaveLink<P, C>,
    key: Option<EmulatedKey>,
    callback: Option<ResultCallback>,
    state: ResponderState,
    pulse_start: u32,
}

impl<P, C> SingleSlaveResponder<P, C>
where
    P: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pin: P, clock: C) -> Self {
        Self::with_speed(pin, clock, Speed::Standard)
    }

    pub fn with_speed(pin: P, clock: C, speed: Speed) -> Self {
        Self {
            link: SlaveLink::new(pin, clock, speed),
            key: None,
            callback: None,
            state: ResponderState::Idle,
            pulse_start: 0,
        }
    }

    /// Attach `key`, handing back the one it replaces.
    pub fn attach(&mut self, key: EmulatedKey) -> Option<EmulatedKey> {
        self.key.replace(key)
    }

    pub fn detach(&mut self) -> Option<EmulatedKey> {
        self.key.take()
    }

    pub fn key(&self) -> Option<&EmulatedKey> {
        self.key.as_ref()
    }

    pub fn set_result_callback(&mut self, callback: ResultCallback) {
        self.callback = Some(callback);
    }

    pub fn start(&mut self) {
        self.state = ResponderState::Idle;
        self.link.start();
    }

    pub fn stop(&mut self) {
        self.link.stop();
        self.state = ResponderState::Idle;
    }

    pub fn is_active(&self) -> bool {
        self.link.is_active()
    }

    pub fn into_inner(self) -> (P, C) {
        self.link.into_inner()
    }

    /// The line, e.g. to wait for the next edge on it.
    pub fn pin_mut(&mut self) -> &mut P {
        self.link.pin_mut()
    }

    pub fn state(&self) -> ResponderState {
        self.state
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.link.error()
    }

    pub fn decode_error(&self) -> &'static str {
        decode_error(self.link.error())
    }

    /// Feed one line edge. Returns the transaction outcome when the edge
    /// closed an accepted reset pulse, `None` otherwise.
    pub fn on_edge(&mut self, edge: Edge) -> Option<bool> {
        if !self.link.is_active() {
            return None;
        }
        match edge {
            Edge::Falling => {
                self.pulse_start = self.link.now();
                self.state = ResponderState::ResetDetecting;
                None
            }
            Edge::Rising => {
                if self.state != ResponderState::ResetDetecting {
                    return None;
                }
                self.state = ResponderState::Idle;
                let width = self.link.elapsed_us(self.pulse_start);
                if let Err(e) = classify_reset(width, self.link.timing()) {
                    self.link.set_error(e);
                    return None;
                }

                let success = critical_section::with(|_| self.serve());
                self.state = ResponderState::Idle;
                if let Some(callback) = self.callback {
                    callback(success);
                }
                Some(success)
            }
        }
    }

    fn serve(&mut self) -> bool {
        self.link.clear_error();
        let Some(key) = self.key else {
            self.link.set_error(OneWireError::IncorrectSlaveUsage);
            return false;
        };

        self.state = ResponderState::PresenceServing;
        if !self.link.show_presence() {
            return false;
        }

        self.state = ResponderState::CommandServing;
        let Some(cmd) = self.link.receive_byte() else {
            return false;
        };

        match RomCommand::try_from(cmd) {
            Ok(RomCommand::ReadRom) => self.link.send(key.rom().as_bytes()),
            Ok(RomCommand::SearchRom) => self.search_rom(&key),
            _ => {
                if key.handle_command(&mut self.link, cmd) {
                    true
                } else {
                    debug!("responder: unsupported command {=u8:#x}", cmd);
                    self.link.set_error(OneWireError::IncorrectOnewireCmd);
                    false
                }
            }
        }
    }

    /// With one key there is never a collision to report; the master's
    /// direction bit is read and accepted.
    fn search_rom(&mut self, key: &EmulatedKey) -> bool {
        let rom = key.rom();
        for i in 0..64 {
            let bit = rom.bit(i);
            if !self.link.send_bit(bit) || !self.link.send_bit(!bit) {
                return false;
            }
            if self.link.receive_bit().is_none() {
                return false;
            }
        }
        true
    }
}
