use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::error::OneWireError;
use crate::timing::{SlaveTiming, Speed};

/// Classify the width of a low pulse seen while idle.
///
/// Both ends of the window are accepted.
pub fn classify_reset(
    width_us: u32,
    timing: &SlaveTiming,
) -> Result<(), OneWireError> {
    if width_us < timing.reset_min {
        Err(OneWireError::VeryShortReset)
    } else if width_us > timing.reset_max {
        Err(OneWireError::VeryLongReset)
    } else {
        Ok(())
    }
}

/// Slave-side bit I/O shared by the single responder and the hub.
///
/// All waits poll the line against the cycle counter and give up after the
/// window from [`SlaveTiming`]; a failed wait records the reason and makes
/// the calling primitive return `false`/`None`.
pub struct SlaveLink<P, C> {
    pin: P,
    clock: C,
    timing: SlaveTiming,
    error: Option<OneWireError>,
    active: bool,
}

impl<P, C> SlaveLink<P, C>
where
    P: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pin: P, clock: C, speed: Speed) -> Self {
        Self {
            pin,
            clock,
            timing: SlaveTiming::for_speed(speed),
            error: None,
            active: false,
        }
    }

    pub fn start(&mut self) {
        self.release();
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.release();
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn into_inner(self) -> (P, C) {
        (self.pin, self.clock)
    }

    pub fn pin_mut(&mut self) -> &mut P {
        &mut self.pin
    }

    pub fn timing(&self) -> &SlaveTiming {
        &self.timing
    }

    pub fn error(&self) -> Option<OneWireError> {
        self.error
    }

    pub fn set_error(&mut self, error: OneWireError) {
        self.error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn now(&self) -> u32 {
        self.clock.now()
    }

    pub fn elapsed_us(&self, since: u32) -> u32 {
        self.clock.elapsed_us(since)
    }

    #[inline]
    fn release(&mut self) {
        let _ = self.pin.set_high();
    }

    #[inline]
    fn drive_low(&mut self) {
        let _ = self.pin.set_low();
    }

    #[inline]
    pub fn line_is_high(&mut self) -> bool {
        self.pin.is_high().unwrap_or(true)
    }

    /// Spin while the line reads `high`, for at most `us` microseconds.
    ///
    /// `Some(tick)` with the counter value of the sample that saw the line
    /// change, `None` on timeout.
    pub fn wait_while(&mut self, high: bool, us: u32) -> Option<u32> {
        let start = self.clock.now();
        let budget = self.clock.us_to_ticks(us);
        loop {
            let level = self.line_is_high();
            let now = self.clock.now();
            if level != high {
                return Some(now);
            }
            if now.wrapping_sub(start) >= budget {
                return None;
            }
        }
    }

    /// Drive the presence pulse after an accepted reset.
    pub fn show_presence(&mut self) -> bool {
        let t = self.timing;
        // Another device may already be answering; follow its edge.
        let _ = self.wait_while(true, t.presence_timeout);

        self.drive_low();
        self.clock.delay_us(t.presence_min);
        self.release();

        if self.wait_while(false, t.presence_max - t.presence_min).is_none() {
            self.error = Some(OneWireError::PresenceLowOnLine);
            return false;
        }
        true
    }

    /// Wait for the master to open the next slot: first for the line to
    /// come back up from the previous one, then for the falling edge.
    fn await_slot(&mut self) -> bool {
        let t = self.timing;
        if self.wait_while(false, t.slot_max).is_none() {
            self.error = Some(OneWireError::ResetInProgress);
            return false;
        }
        if self.wait_while(true, t.msg_high_timeout).is_none() {
            self.error = Some(OneWireError::AwaitTimeslotTimeoutHigh);
            return false;
        }
        true
    }

    /// Answer one read slot with `bit`.
    pub fn send_bit(&mut self, bit: bool) -> bool {
        if !self.await_slot() {
            return false;
        }
        let t = self.timing;
        if bit {
            if self.wait_while(false, t.read_max).is_none() {
                // The master is still holding the line: this is a reset.
                self.error = Some(OneWireError::ResetInProgress);
                return false;
            }
        } else {
            self.drive_low();
            self.clock.delay_us(t.write_zero);
            self.release();
        }
        true
    }

    /// Sample one write slot from the master.
    pub fn receive_bit(&mut self) -> Option<bool> {
        if !self.await_slot() {
            return None;
        }
        // A one is released before read_min, a zero is still low after it.
        Some(self.wait_while(false, self.timing.read_min).is_some())
    }

    /// Send whole bytes, LSB first.
    pub fn send(&mut self, data: &[u8]) -> bool {
        if !self.active {
            self.error = Some(OneWireError::TriedIncorrectWrite);
            return false;
        }
        self.release();
        for &byte in data {
            for i in 0..8 {
                if !self.send_bit((byte >> i) & 1 != 0) {
                    if i == 0
                        && self.error
                            == Some(OneWireError::AwaitTimeslotTimeoutHigh)
                    {
                        self.error = Some(OneWireError::FirstBitOfByteTimeout);
                    }
                    return false;
                }
            }
        }
        true
    }

    pub fn receive_byte(&mut self) -> Option<u8> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.receive_bit()? {
                byte |= 1 << i;
            }
        }
        Some(byte)
    }

    pub fn receive(&mut self, buf: &mut [u8]) -> bool {
        for b in buf.iter_mut() {
            match self.receive_byte() {
                Some(byte) => *b = byte,
                None => return false,
            }
        }
        true
    }

    /// Poll for the next reset pulse from the master.
    ///
    /// Returns `true` for a pulse inside the reset window. A transaction that
    /// was cut short by [`OneWireError::ResetInProgress`] is picked up here:
    /// if the line is still low after a further short window the pulse is
    /// taken as a reset without measuring it from its start.
    pub fn check_reset(&mut self) -> bool {
        let t = self.timing;

        if self.error == Some(OneWireError::ResetInProgress) {
            self.error = None;
            if self.wait_while(false, t.reset_in_progress_window()).is_none() {
                if self.wait_while(false, t.reset_max).is_none() {
                    self.error = Some(OneWireError::VeryLongReset);
                    return false;
                }
                return true;
            }
        }

        // Joining a pulse halfway through would mismeasure it.
        if !self.line_is_high() {
            return false;
        }
        let Some(fall) = self.wait_while(true, t.msg_high_timeout) else {
            return false;
        };
        let Some(rise) = self.wait_while(false, t.reset_max + 1) else {
            self.error = Some(OneWireError::VeryLongReset);
            return false;
        };
        let width = rise.wrapping_sub(fall) / self.clock.ticks_per_us();
        match classify_reset(width, &t) {
            Ok(()) => true,
            Err(e) => {
                self.error = Some(e);
                false
            }
        }
    }
}
