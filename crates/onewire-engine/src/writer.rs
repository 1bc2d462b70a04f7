//! Reprogramming rewritable DS1990 clones.
//!
//! The blanks on the market speak mutually incompatible write protocols and
//! cannot be told apart beforehand, so every known sequence is tried in a
//! fixed order until a Read-ROM returns the wanted code. A sequence meant
//! for another chip may leave a blank partially written; nothing is rolled
//! back.

use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::commands::blank::*;
use crate::error::OneWireError;
use crate::key::KeyType;
use crate::master::BusMaster;

const FLAG_SETTLE_US: u32 = 10;
const BIT_COMMIT_US: u32 = 5_000;
const BYTE_COMMIT_US: u32 = 30_000;
const LOCK_SETTLE_US: u32 = 10_000;
const TM2004_CONFIRM_DELAY_US: u32 = 600;
const TM2004_PROGRAM_US: u32 = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteOutcome {
    /// The blank now reads back the requested code.
    Ok,
    /// The key already carried the requested code; nothing was written.
    SameKey,
    Error,
}

/// Vendor write protocols, in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteMethod {
    Rw1990_1,
    Rw1990_2,
    Tm2004,
}

impl WriteMethod {
    pub const ALL: [WriteMethod; 3] =
        [WriteMethod::Rw1990_1, WriteMethod::Rw1990_2, WriteMethod::Tm2004];
}

pub struct BlankWriter<P, C> {
    master: BusMaster<P, C>,
    last_method: Option<WriteMethod>,
}

impl<P, C> BlankWriter<P, C>
where
    P: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pin: P, clock: C) -> Self {
        Self::from_master(BusMaster::new(pin, clock))
    }

    pub fn from_master(master: BusMaster<P, C>) -> Self {
        Self { master, last_method: None }
    }

    pub fn start(&mut self) {
        self.master.start();
    }

    pub fn stop(&mut self) {
        self.master.stop();
    }

    pub fn into_inner(self) -> (P, C) {
        self.master.into_inner()
    }

    pub fn master(&mut self) -> &mut BusMaster<P, C> {
        &mut self.master
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.master.last_error()
    }

    /// Method that produced the most recent [`WriteOutcome::Ok`].
    pub fn last_method(&self) -> Option<WriteMethod> {
        self.last_method
    }

    /// Program `data` into the blank on the line.
    pub fn write(&mut self, key_type: KeyType, data: &[u8]) -> WriteOutcome {
        if !key_type.is_onewire() || data.len() != key_type.data_size() {
            warn!(
                "writer: cannot write {} bytes as a {} key",
                data.len(),
                key_type
            );
            return WriteOutcome::Error;
        }
        if !self.master.reset() {
            debug!("writer: no key on the line");
            return WriteOutcome::Error;
        }
        if self.verify(data) {
            info!("writer: key already holds this code");
            return WriteOutcome::SameKey;
        }

        for method in WriteMethod::ALL {
            let completed = critical_section::with(|_| match method {
                WriteMethod::Rw1990_1 => self.write_1990_1(data),
                WriteMethod::Rw1990_2 => self.write_1990_2(data),
                WriteMethod::Tm2004 => self.write_tm2004(data),
            });
            if completed && self.verify(data) {
                info!("writer: written with {}", method);
                self.last_method = Some(method);
                return WriteOutcome::Ok;
            }
            debug!("writer: {} did not take", method);
        }
        WriteOutcome::Error
    }

    /// Reset, Read-ROM and compare against `data`.
    fn verify(&mut self, data: &[u8]) -> bool {
        self.master
            .read_rom_raw()
            .is_some_and(|rom| rom[..] == data[..])
    }

    fn write_bit_slow(&mut self, bit: bool, settle_us: u32) {
        self.master.write_bit(bit);
        self.master.delay_us(settle_us);
    }

    fn write_byte_slow(&mut self, byte: u8) {
        for i in 0..8 {
            self.write_bit_slow((byte >> i) & 1 != 0, BIT_COMMIT_US);
        }
    }

    /// RW1990.1: unlock with bit 0, data goes in inverted, lock with bit 1.
    fn write_1990_1(&mut self, data: &[u8]) -> bool {
        self.rw1990(
            RW1990_1_WRITE_RECORD_FLAG,
            RW1990_1_WRITE_ROM,
            false,
            data,
            true,
        )
    }

    /// RW1990.2: unlock with bit 1, data goes in as is, lock with bit 0.
    fn write_1990_2(&mut self, data: &[u8]) -> bool {
        self.rw1990(
            RW1990_2_WRITE_RECORD_FLAG,
            RW1990_2_WRITE_ROM,
            true,
            data,
            false,
        )
    }

    fn rw1990(
        &mut self,
        flag_cmd: u8,
        write_cmd: u8,
        unlock_bit: bool,
        data: &[u8],
        invert: bool,
    ) -> bool {
        if !self.master.reset() {
            return false;
        }
        self.master.write(flag_cmd);
        self.master.delay_us(FLAG_SETTLE_US);
        self.write_bit_slow(unlock_bit, BIT_COMMIT_US);

        if !self.master.reset() {
            return false;
        }
        self.master.write(write_cmd);
        for &byte in data {
            self.write_byte_slow(if invert { !byte } else { byte });
            self.master.delay_us(BYTE_COMMIT_US);
        }

        self.master.write(flag_cmd);
        self.write_bit_slow(!unlock_bit, LOCK_SETTLE_US);
        true
    }

    /// TM2004: Write-ROM at address 0, each byte echoed, confirmed with a
    /// program pulse and read back.
    fn write_tm2004(&mut self, data: &[u8]) -> bool {
        if !self.master.reset() {
            return false;
        }
        self.master.write(TM2004_WRITE_ROM);
        self.master.write(0x00);
        self.master.write(0x00);

        let mut ok = true;
        for &byte in data {
            self.master.write(byte);
            let _echo = self.master.read();
            self.master.delay_us(TM2004_CONFIRM_DELAY_US);
            self.write_bit_slow(true, TM2004_PROGRAM_US);
            let stored = self.master.read();
            if stored != byte {
                debug!(
                    "tm2004: wrote {=u8:#x}, read back {=u8:#x}",
                    byte,
                    stored
                );
                ok = false;
                break;
            }
        }
        self.master.reset();
        ok
    }
}
