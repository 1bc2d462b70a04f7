#![no_std]
//! Board support for the nRF52840 iButton reader.
//!
//! [`Board`] splits the HAL peripherals into what the firmware uses, the
//! key line goes through [`KeyLineFactory`] so only one 1-Wire role drives
//! it at a time, and [`DwtClock`] provides the cycle counter the bus timing
//! is measured against.

mod board;
mod clock;
mod resources;

// Flatten
pub use board::*;
pub use clock::*;
pub use resources::*;
