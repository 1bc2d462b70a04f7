#![no_std]
//! Exclusive ownership of the iButton key line.
//!
//! The reader, the emulators and the writer all bit-bang the same GPIO.
//! [`PinManager`] keeps the unconfigured resources while nobody needs the
//! line, configures the pin for exactly one [`Role`] at a time and hands it
//! out as a [`PinLease`]. Dropping the lease tears the pin down again.

mod error;
mod factory;
mod lease;
mod manager;
mod role;

pub use error::PinError;
pub use factory::PinFactory;
pub use lease::PinLease;
pub use manager::PinManager;
pub use role::Role;
