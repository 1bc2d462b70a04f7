use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::commands::{CONDITIONAL_SEARCH, READ_ROM, SEARCH_ROM, SKIP_ROM};
use crate::error::{decode_error, OneWireError};
use crate::rom::{RomCode, ROM_LEN};
use crate::timing::{MasterTiming, Speed};

/// Which search opcode a [`BusMaster::search`] pass sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SearchMode {
    #[default]
    Normal,
    /// Only devices in alarm state take part.
    Conditional,
}

impl SearchMode {
    const fn command(self) -> u8 {
        match self {
            SearchMode::Normal => SEARCH_ROM,
            SearchMode::Conditional => CONDITIONAL_SEARCH,
        }
    }
}

/// Progress of an enumeration between [`BusMaster::search`] calls.
///
/// Bit positions are 1-based; 0 means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SearchState {
    saved_rom: [u8; ROM_LEN],
    last_discrepancy: u8,
    last_family_discrepancy: u8,
    last_device_flag: bool,
}

impl SearchState {
    pub fn saved_rom(&self) -> &[u8; ROM_LEN] {
        &self.saved_rom
    }

    pub fn last_discrepancy(&self) -> u8 {
        self.last_discrepancy
    }

    pub fn last_family_discrepancy(&self) -> u8 {
        self.last_family_discrepancy
    }

    /// `true` once the last device on the bus has been returned.
    pub fn last_device_flag(&self) -> bool {
        self.last_device_flag
    }

    fn restart(&mut self) {
        self.last_discrepancy = 0;
        self.last_device_flag = false;
        self.last_family_discrepancy = 0;
    }

    fn rom_bit(&self, index: u8) -> bool {
        (self.saved_rom[(index >> 3) as usize] >> (index & 7)) & 1 != 0
    }

    fn set_rom_bit(&mut self, index: u8, value: bool) {
        let mask = 1 << (index & 7);
        let byte = &mut self.saved_rom[(index >> 3) as usize];
        if value {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
    }
}

/// Bit-banged 1-Wire master on an open-drain pin.
///
/// `set_high` releases the line to the pull-up, `set_low` drives it. Every
/// operation blocks for its full slot. Pin errors are not propagated: a
/// failed sample reads as low and a failed drive is ignored, the slot
/// timing then shows up as a recorded timeslot error.
pub struct BusMaster<P, C> {
    pin: P,
    clock: C,
    timing: MasterTiming,
    search: SearchState,
    error: Option<OneWireError>,
    active: bool,
}

impl<P, C> BusMaster<P, C>
where
    P: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pin: P, clock: C) -> Self {
        Self::with_speed(pin, clock, Speed::Standard)
    }

    pub fn with_speed(pin: P, clock: C, speed: Speed) -> Self {
        Self::with_timing(pin, clock, MasterTiming::for_speed(speed))
    }

    /// Master with hand-tuned slot timings.
    pub fn with_timing(pin: P, clock: C, timing: MasterTiming) -> Self {
        Self {
            pin,
            clock,
            timing,
            search: SearchState::default(),
            error: None,
            active: false,
        }
    }

    /// Claim the line: release it to idle high.
    pub fn start(&mut self) {
        self.release();
        self.active = true;
    }

    /// Give the line back in its released state.
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

    pub fn timing(&self) -> &MasterTiming {
        &self.timing
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.error
    }

    pub fn decode_error(&self) -> &'static str {
        decode_error(self.error)
    }

    pub fn delay_us(&self, us: u32) {
        self.clock.delay_us(us);
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
    fn line_is_high(&mut self) -> bool {
        self.pin.is_high().unwrap_or(false)
    }

    /// Reset pulse followed by a presence check.
    ///
    /// Returns `true` if at least one device pulled the line low in the
    /// presence window. Starts a new transaction, clearing the recorded
    /// error.
    pub fn reset(&mut self) -> bool {
        self.error = None;
        let t = self.timing;

        self.release();
        let mut polls = t.reset_wait_polls;
        while !self.line_is_high() {
            polls = polls.saturating_sub(1);
            if polls == 0 {
                warn!("1-Wire line held low, cannot reset");
                self.error = Some(OneWireError::WaitResetTimeout);
                return false;
            }
            self.clock.delay_us(t.reset_wait_step);
        }

        self.drive_low();
        self.clock.delay_us(t.reset_low);
        let present = critical_section::with(|_| {
            self.release();
            self.clock.delay_us(t.reset_release);
            !self.line_is_high()
        });
        self.clock.delay_us(t.reset_post);
        trace!("reset: presence={}", present);
        present
    }

    pub fn write_bit(&mut self, bit: bool) {
        let t = self.timing;
        let (low, high) = if bit {
            (t.write_one_low, t.write_one_high)
        } else {
            (t.write_zero_low, t.write_zero_high)
        };
        critical_section::with(|_| {
            self.drive_low();
            self.clock.delay_us(low);
            self.release();
            self.clock.delay_us(high);
        });
        if !self.line_is_high() {
            self.error = Some(OneWireError::WriteTimeslotTimeout);
        }
    }

    pub fn read_bit(&mut self) -> bool {
        let t = self.timing;
        let bit = critical_section::with(|_| {
            self.drive_low();
            self.clock.delay_us(t.read_low);
            self.release();
            self.clock.delay_us(t.read_release);
            self.line_is_high()
        });
        self.clock.delay_us(t.read_post);
        if !self.line_is_high() {
            self.error = Some(OneWireError::ReadTimeslotTimeout);
        }
        bit
    }

    /// Eight slots, least significant bit first.
    pub fn write(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit((byte >> i) & 1 != 0);
        }
    }

    pub fn read(&mut self) -> u8 {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit() {
                byte |= 1 << i;
            }
        }
        byte
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        for &b in data {
            self.write(b);
        }
    }

    pub fn read_bytes(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = self.read();
        }
    }

    /// Address every device at once. Only meaningful with a single device
    /// on the bus.
    pub fn skip(&mut self) {
        self.write(SKIP_ROM);
    }

    /// Reset, Read-ROM, eight bytes back, with no CRC check.
    pub fn read_rom_raw(&mut self) -> Option<[u8; ROM_LEN]> {
        if !self.reset() {
            return None;
        }
        self.write(READ_ROM);
        let mut bytes = [0u8; ROM_LEN];
        self.read_bytes(&mut bytes);
        Some(bytes)
    }

    /// Read the ROM of the single device on the bus; `None` without
    /// presence or when the CRC does not match.
    pub fn read_rom(&mut self) -> Option<RomCode> {
        let bytes = self.read_rom_raw()?;
        match RomCode::try_from(&bytes[..]) {
            Ok(rom) => Some(rom),
            Err(_e) => {
                debug!("read rom rejected: {}", bytes);
                None
            }
        }
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Restart enumeration from the first device.
    pub fn reset_search(&mut self) {
        self.search = SearchState::default();
    }

    /// Restart enumeration at the first device of `family`.
    pub fn target_search(&mut self, family: u8) {
        self.search = SearchState::default();
        self.search.saved_rom[0] = family;
        self.search.last_discrepancy = 64;
    }

    /// One pass of the ROM search: returns the next device, or `None` when
    /// the bus is empty or the enumeration is complete. Once `None` is
    /// returned the next call starts over.
    pub fn search(&mut self, mode: SearchMode) -> Option<RomCode> {
        let mut found = false;

        if !self.search.last_device_flag {
            if !self.reset() {
                self.search.restart();
                return None;
            }
            self.write(mode.command());

            let mut id_bit_number: u8 = 1;
            let mut last_zero: u8 = 0;
            while id_bit_number <= 64 {
                let id_bit = self.read_bit();
                let cmp_id_bit = self.read_bit();
                if id_bit && cmp_id_bit {
                    debug!("search: no device answered bit {}", id_bit_number);
                    break;
                }

                let index = id_bit_number - 1;
                let direction = if id_bit != cmp_id_bit {
                    id_bit
                } else {
                    let direction =
                        if id_bit_number < self.search.last_discrepancy {
                            self.search.rom_bit(index)
                        } else {
                            id_bit_number == self.search.last_discrepancy
                        };
                    if !direction {
                        last_zero = id_bit_number;
                        if last_zero < 9 {
                            self.search.last_family_discrepancy = last_zero;
                        }
                    }
                    direction
                };

                self.search.set_rom_bit(index, direction);
                self.write_bit(direction);
                id_bit_number += 1;
            }

            if id_bit_number > 64 {
                self.search.last_discrepancy = last_zero;
                if last_zero == 0 {
                    self.search.last_device_flag = true;
                }
                found = true;
            }
        }

        if !found || self.search.saved_rom[0] == 0 {
            self.search.restart();
            return None;
        }

        let rom = RomCode::from_raw(self.search.saved_rom);
        debug!("search found {}", rom);
        Some(rom)
    }
}
