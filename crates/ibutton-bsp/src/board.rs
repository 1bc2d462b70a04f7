use embassy_nrf::interrupt::Priority;
use embassy_nrf::peripherals::{self, P0_13, P1_04, WDT};
use embassy_nrf::Peri;

/// The open-drain 1-Wire contact the keys touch.
pub struct KeyLineResources {
    pub pin: Peri<'static, peripherals::P0_31>,
}

/// Represents the peripherals and pins the reader uses.
pub struct Board {
    /// 1-Wire key contact, leased through a `PinManager`.
    pub key_line: KeyLineResources,
    /// User button, active low.
    pub button: Peri<'static, P1_04>,
    /// Status LED, active high.
    pub led: Peri<'static, P0_13>,
    /// Watchdog Timer.
    pub wdt: Peri<'static, WDT>,
}

impl Default for Board {
    fn default() -> Self {
        let mut config = embassy_nrf::config::Config::default();
        // Edge events must preempt the high-priority executor.
        config.gpiote_interrupt_priority = Priority::P2;
        config.time_interrupt_priority = Priority::P2;
        Self::new(config)
    }
}

impl Board {
    /// Create a new instance based on HAL configuration
    pub fn new(config: embassy_nrf::config::Config) -> Self {
        let p = embassy_nrf::init(config);

        Self {
            key_line: KeyLineResources { pin: p.P0_31 },
            button: p.P1_04,
            led: p.P0_13,
            wdt: p.WDT,
        }
    }
}
