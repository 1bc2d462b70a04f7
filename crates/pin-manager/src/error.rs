use crate::role::Role;

/// Errors returned when leasing the pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinError<E: core::fmt::Debug> {
    /// The factory could not configure the pin.
    Factory(E),
    /// The pin is leased to another role.
    InUse(Role),
    /// Pin manager is in an unrecoverable state.
    Poisoned,
}

impl<E: core::fmt::Debug> core::fmt::Display for PinError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PinError::Factory(e) => write!(f, "pin factory failed: {e:?}"),
            PinError::InUse(role) => write!(f, "pin leased to {role}"),
            PinError::Poisoned => f.write_str("pin manager poisoned"),
        }
    }
}
