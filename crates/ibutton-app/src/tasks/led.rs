use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive};
use embassy_nrf::Peri;
use embassy_sync::channel::Channel;

use crate::prelude::*;

pub static LED_CHAN: Channel<CriticalSectionRawMutex, LedEvent, 4> =
    Channel::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LedEvent {
    Idle,
    Emulating,
    Success,
    Failure,
}

impl From<WorkerEvent> for LedEvent {
    fn from(event: WorkerEvent) -> Self {
        let ok = match event {
            WorkerEvent::ReadDone(ok) | WorkerEvent::Emulated(ok) => ok,
            WorkerEvent::WriteDone(outcome) => outcome != WriteOutcome::Error,
        };
        if ok {
            LedEvent::Success
        } else {
            LedEvent::Failure
        }
    }
}

/// Queue an LED pattern; dropped when the LED is backed up.
pub fn led_show(event: LedEvent) {
    let _ = LED_CHAN.try_send(event);
}

/// Worker completion callback. Runs in whatever context finished the
/// operation, so it only queues.
pub fn on_worker_event(event: WorkerEvent) {
    led_show(event.into());
}

const BLINK_MS: u64 = 150;

#[embassy_executor::task]
pub async fn led_task(pin: Peri<'static, AnyPin>) {
    let mut led = Output::new(pin, Level::Low, OutputDrive::Standard);
    // Level to return to after a blink.
    let mut resting = false;

    loop {
        match LED_CHAN.receive().await {
            LedEvent::Idle => resting = false,
            LedEvent::Emulating => resting = true,
            LedEvent::Success => {
                led.set_level(Level::from(!resting));
                Timer::after_millis(BLINK_MS * 2).await;
            }
            LedEvent::Failure => {
                for _ in 0..3 {
                    led.set_level(Level::from(!resting));
                    Timer::after_millis(BLINK_MS / 2).await;
                    led.set_level(Level::from(resting));
                    Timer::after_millis(BLINK_MS / 2).await;
                }
            }
        }
        led.set_level(Level::from(resting));
    }
}
