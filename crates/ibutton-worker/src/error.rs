use core::fmt;

use derive_more::From;
use onewire_engine::OneWireError;
use pin_manager::PinError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkerError<E: fmt::Debug> {
    /// The key line could not be leased.
    Pin(PinError<E>),
    /// Nothing answered the reset pulse.
    NoKey,
    /// A key answered but its ROM failed the CRC or has family 0.
    InvalidKey,
    /// More keys than the hub can emulate.
    TooManyKeys,
    Bus(OneWireError),
}

impl<E: fmt::Debug> fmt::Display for WorkerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Pin(e) => write!(f, "{e}"),
            WorkerError::NoKey => f.write_str("no key on the line"),
            WorkerError::InvalidKey => f.write_str("invalid key code"),
            WorkerError::TooManyKeys => f.write_str("too many keys"),
            WorkerError::Bus(e) => write!(f, "bus error: {e}"),
        }
    }
}
