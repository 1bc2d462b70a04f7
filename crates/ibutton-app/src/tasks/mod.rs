use crate::events::{ButtonPress, Event};
use crate::prelude::*;
use embassy_nrf::gpio::{AnyPin, Input, Pull};
use embassy_nrf::peripherals::WDT;
use embassy_nrf::wdt;
use embassy_nrf::wdt::Watchdog;
use embassy_nrf::Peri;
use embassy_time::with_timeout;

pub mod key;
pub mod led;

// Re-exports
pub use key::*;
pub use led::*;

// Keeps our system alive
#[embassy_executor::task]
pub async fn watchdog_task(wdt: Peri<'static, WDT>) {
    let wdt_config = unwrap!(wdt::Config::try_new(&wdt));
    let (_wdt, [mut handle]) = match Watchdog::try_new(wdt, wdt_config) {
        Ok(x) => x,
        Err(_) => {
            // Watchdog already active with the wrong number of handles, waiting for it to timeout...
            loop {
                cortex_m::asm::wfe();
            }
        }
    };
    loop {
        handle.pet();
        Timer::after(Duration::from_secs(2)).await;
    }
}

#[embassy_executor::task]
pub async fn button_task(btn_pin: Peri<'static, AnyPin>, sender: EventSender) {
    const DOUBLE_CLICK_DELAY: u64 = 250;
    const HOLD_DELAY: u64 = 1000;

    let mut button = Input::new(btn_pin, Pull::Up);

    button.wait_for_falling_edge().await;
    loop {
        if with_timeout(
            Duration::from_millis(HOLD_DELAY),
            button.wait_for_rising_edge(),
        )
        .await
        .is_err()
        {
            info!("Hold detected");
            sender.send(ButtonPress::Hold.into()).await;
            button.wait_for_rising_edge().await;
        } else if with_timeout(
            Duration::from_millis(DOUBLE_CLICK_DELAY),
            button.wait_for_falling_edge(),
        )
        .await
        .is_err()
        {
            info!("Single click detected");
            sender.send(ButtonPress::Single.into()).await;
        } else {
            info!("Double click detected");
            sender.send(ButtonPress::Double.into()).await;
            button.wait_for_rising_edge().await;
        }
        button.wait_for_falling_edge().await;
    }
}

/// Route events to the key line. Operations run to completion here, so a
/// request queued behind a long one waits.
#[embassy_executor::task]
pub async fn orchestrate(receiver: EventReceiver, mut key_manager: KeyManager) {
    loop {
        let event = match receiver.receive().await {
            Event::ButtonPress(press) => key_manager.key_event(press),
            Event::KeyEvent(event) => event,
        };
        key_manager.handle_event(event, &receiver).await;
    }
}
