#![no_std]
//! Bit-banged 1-Wire engine for reading, emulating and rewriting iButton
//! keys.
//!
//! Everything runs on one open-drain GPIO (`embedded-hal` 1.0 pin traits)
//! and a free-running [`CycleClock`]. The roles:
//!
//! - [`BusMaster`] resets the bus, moves bits and bytes and enumerates
//!   devices with the ROM search.
//! - [`SingleSlaveResponder`] answers as one key, driven by pin-edge
//!   interrupts.
//! - [`MultiDeviceHub`] answers as several keys at once by polling the line.
//! - [`BlankWriter`] reprograms rewritable blanks through a [`BusMaster`].
//!
//! Only one role may drive the pin at a time; callers hand the pin to a
//! role, `start()` it, and `stop()` it before passing the pin on.

#[cfg(test)]
extern crate std;

#[macro_use]
mod fmt;

pub mod clock;
pub mod commands;
pub mod crc;
mod device;
mod error;
mod key;
pub mod master;
pub mod rom;
pub mod slave;
pub mod timing;
pub mod writer;

pub use clock::CycleClock;
pub use crc::{crc16_update, maxim_crc16, maxim_crc8};
pub use device::EmulatedKey;
pub use error::{decode_error, OneWireError};
pub use key::KeyType;
pub use master::{BusMaster, SearchMode, SearchState};
pub use rom::{RomCode, RomError, ROM_LEN};
pub use slave::{
    Edge, MultiDeviceHub, ResponderState, SingleSlaveResponder,
    HUB_DEVICE_LIMIT,
};
pub use timing::{MasterTiming, SlaveTiming, Speed};
pub use writer::{BlankWriter, WriteMethod, WriteOutcome};
