use cortex_m::peripheral::{DCB, DWT};
use onewire_engine::CycleClock;

/// Core clock of the nRF52840.
pub const CYCLES_PER_US: u32 = 64;

/// [`CycleClock`] backed by the DWT cycle counter.
///
/// Wraps every 67 s at 64 MHz, far beyond any 1-Wire wait.
#[derive(Debug, Clone, Copy)]
pub struct DwtClock {
    _private: (),
}

impl DwtClock {
    /// Start the cycle counter. Consumes the core peripherals so nothing
    /// else can stop it.
    pub fn new(mut dcb: DCB, mut dwt: DWT) -> Self {
        dcb.enable_trace();
        dwt.enable_cycle_counter();
        Self { _private: () }
    }
}

impl CycleClock for DwtClock {
    #[inline]
    fn now(&self) -> u32 {
        DWT::cycle_count()
    }

    #[inline]
    fn ticks_per_us(&self) -> u32 {
        CYCLES_PER_US
    }
}
