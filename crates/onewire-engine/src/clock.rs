/// Free-running cycle counter the bus timing is measured against.
///
/// `now` wraps at `u32::MAX`; all arithmetic on its values uses
/// `wrapping_sub`, so a wrap inside a wait is harmless as long as the wait
/// itself is shorter than one full period.
pub trait CycleClock {
    /// Current counter value.
    fn now(&self) -> u32;

    /// Counter ticks per microsecond.
    fn ticks_per_us(&self) -> u32;

    #[inline]
    fn us_to_ticks(&self, us: u32) -> u32 {
        us.wrapping_mul(self.ticks_per_us())
    }

    /// Microseconds since `start`, a value previously returned by `now`.
    #[inline]
    fn elapsed_us(&self, start: u32) -> u32 {
        self.now().wrapping_sub(start) / self.ticks_per_us()
    }

    /// Busy-wait for `us` microseconds.
    fn delay_us(&self, us: u32) {
        let start = self.now();
        let ticks = self.us_to_ticks(us);
        while self.now().wrapping_sub(start) < ticks {}
    }
}

impl<C: CycleClock + ?Sized> CycleClock for &C {
    #[inline]
    fn now(&self) -> u32 {
        (**self).now()
    }

    #[inline]
    fn ticks_per_us(&self) -> u32 {
        (**self).ticks_per_us()
    }

    fn delay_us(&self, us: u32) {
        (**self).delay_us(us)
    }
}
