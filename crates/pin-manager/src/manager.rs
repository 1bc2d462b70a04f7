use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex;
use grounded::uninit::GroundedCell;

use crate::error::PinError;
use crate::factory::PinFactory;
use crate::lease::PinLease;
use crate::role::Role;

/// Lifecycle of the key line.
enum Phase<F: PinFactory> {
    /// Pin is not configured; resources are available.
    Idle(F::Resources),
    /// Pin is configured, stored in `pin_cell` and leased to a role.
    Leased(Role, F::Destructor),
    /// Unrecoverable error state (a factory call panicked mid-transition).
    Poisoned,
}

/// Hands out the key line to one role at a time.
///
/// The pin is created on [`acquire`](Self::acquire) and destroyed when the
/// returned [`PinLease`] is dropped, so an idle line is always left in the
/// state the factory's `recover` puts it in.
pub struct PinManager<M: RawMutex, F: PinFactory> {
    pin_cell: GroundedCell<F::Pin>,
    state: Mutex<M, RefCell<Phase<F>>>,
}

// SAFETY: `pin_cell` is written and dropped only while holding `state`'s
// lock, and between those points the single live `PinLease` is the only
// path to the pin. Moving the manager's contents across contexts therefore
// needs the stored types to be `Send`, not `Sync`.
unsafe impl<M, F> Sync for PinManager<M, F>
where
    M: RawMutex + Sync,
    F: PinFactory,
    F::Pin: Send,
    F::Resources: Send,
    F::Destructor: Send,
{
}

impl<M: RawMutex, F: PinFactory> PinManager<M, F> {
    /// Create a new pin manager holding the unconfigured resources.
    pub const fn new(resources: F::Resources) -> Self {
        Self {
            pin_cell: GroundedCell::uninit(),
            state: Mutex::new(RefCell::new(Phase::Idle(resources))),
        }
    }

    /// Configure the pin for `role` and lease it out.
    ///
    /// Fails with [`PinError::InUse`] while another lease is alive. A
    /// factory failure leaves the manager idle with its resources intact.
    pub fn acquire(
        &self,
        role: Role,
    ) -> Result<PinLease<'_, M, F>, PinError<F::Error>> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();

            match &*state {
                Phase::Idle(_) => {
                    // Take resources out, replacing with Poisoned temporarily.
                    let resources =
                        match core::mem::replace(&mut *state, Phase::Poisoned) {
                            Phase::Idle(r) => r,
                            _ => unreachable!(),
                        };

                    match F::create(resources) {
                        Ok((pin, destructor)) => {
                            // SAFETY: We hold the lock and the phase was Idle,
                            // so the cell is uninit and nobody else can reach it.
                            unsafe {
                                self.pin_cell.get().write(pin);
                            }
                            *state = Phase::Leased(role, destructor);
                            Ok(PinLease::new(self, role))
                        }
                        Err((err, resources)) => {
                            *state = Phase::Idle(resources);
                            Err(PinError::Factory(err))
                        }
                    }
                }
                Phase::Leased(holder, _) => Err(PinError::InUse(*holder)),
                Phase::Poisoned => Err(PinError::Poisoned),
            }
        })
    }

    /// Tear the pin down and get the resources back. Called from the
    /// lease's `Drop`.
    pub(crate) fn release(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();

            let destructor =
                match core::mem::replace(&mut *state, Phase::Poisoned) {
                    Phase::Leased(_, d) => d,
                    other => {
                        *state = other;
                        return;
                    }
                };

            // SAFETY: We hold the lock and the lease that pointed at the pin
            // is being dropped. The pin was written in acquire().
            unsafe {
                core::ptr::drop_in_place(self.pin_cell.get());
            }

            *state = Phase::Idle(F::recover(destructor));
        })
    }

    /// Pointer to the configured pin. Only valid while leased.
    pub(crate) fn pin_ptr(&self) -> *mut F::Pin {
        self.pin_cell.get()
    }

    /// Role currently holding the line, if any.
    pub fn holder(&self) -> Option<Role> {
        self.state.lock(|state| match &*state.borrow() {
            Phase::Leased(role, _) => Some(*role),
            _ => None,
        })
    }

    pub fn is_leased(&self) -> bool {
        self.holder().is_some()
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.lock(|state| matches!(&*state.borrow(), Phase::Poisoned))
    }
}
