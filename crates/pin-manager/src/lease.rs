use core::ops::{Deref, DerefMut};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::factory::PinFactory;
use crate::manager::PinManager;
use crate::role::Role;

/// RAII guard giving one role exclusive use of the key line.
///
/// Dropping the lease destroys the pin and returns the resources to the
/// [`PinManager`], also when the holder bails out early with an error.
/// The lease forwards the `embedded-hal` pin traits, so it can be handed
/// to a bus role directly.
pub struct PinLease<'a, M: RawMutex, F: PinFactory> {
    manager: &'a PinManager<M, F>,
    role: Role,
}

impl<'a, M: RawMutex, F: PinFactory> PinLease<'a, M, F> {
    /// Create a new lease. Only called by `PinManager`.
    pub(crate) fn new(manager: &'a PinManager<M, F>, role: Role) -> Self {
        Self { manager, role }
    }

    pub fn role(&self) -> Role {
        self.role
    }
}

impl<M: RawMutex, F: PinFactory> Deref for PinLease<'_, M, F> {
    type Target = F::Pin;

    #[inline]
    fn deref(&self) -> &F::Pin {
        // SAFETY: The manager stays Leased for as long as this lease lives
        // and hands out no other lease, so the pin is initialised and not
        // aliased mutably.
        unsafe { &*self.manager.pin_ptr() }
    }
}

impl<M: RawMutex, F: PinFactory> DerefMut for PinLease<'_, M, F> {
    #[inline]
    fn deref_mut(&mut self) -> &mut F::Pin {
        // SAFETY: As for `deref`; `&mut self` makes this the only access.
        unsafe { &mut *self.manager.pin_ptr() }
    }
}

impl<M: RawMutex, F: PinFactory> Drop for PinLease<'_, M, F> {
    fn drop(&mut self) {
        self.manager.release();
    }
}

impl<M, F> ErrorType for PinLease<'_, M, F>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: ErrorType,
{
    type Error = <F::Pin as ErrorType>::Error;
}

impl<M, F> InputPin for PinLease<'_, M, F>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: InputPin,
{
    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        (**self).is_high()
    }

    #[inline]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        (**self).is_low()
    }
}

impl<M, F> OutputPin for PinLease<'_, M, F>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: OutputPin,
{
    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        (**self).set_low()
    }

    #[inline]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        (**self).set_high()
    }
}
