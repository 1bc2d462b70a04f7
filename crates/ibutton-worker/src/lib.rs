#![no_std]
//! Key-line operations for the iButton firmware.
//!
//! [`KeyWorker`] ties the 1-Wire roles of `onewire-engine` to a
//! [`PinManager`](pin_manager::PinManager): each read, write or emulation
//! leases the key line for its role, runs, and returns the line. Results
//! are reported to an optional [`WorkerCallback`].

#[macro_use]
mod fmt;

mod config;
mod emulation;
mod error;
mod event;
mod worker;

pub use config::WorkerConfig;
pub use emulation::{HubEmulation, SingleEmulation};
pub use error::WorkerError;
pub use event::{WorkerCallback, WorkerEvent};
pub use worker::{KeyList, KeyWorker, MAX_KEYS};
