#![no_std]
#![no_main]

use static_cell::StaticCell;

#[cfg(feature = "defmt")]
use defmt_rtt as _;
#[cfg(feature = "defmt")]
use panic_probe as _;
#[cfg(not(feature = "defmt"))]
use panic_reset as _;

use ibutton_app::prelude::*;

static KEY_PINS: StaticCell<KeyPins> = StaticCell::new();
static WORKER: StaticCell<Worker> = StaticCell::new();

// Application main entry point. The spawner can be used to start async tasks.
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("iButton firmware {}", FW_VERSION);
    let board = Board::default();
    let core = unwrap!(cortex_m::Peripherals::take());
    let clock = DwtClock::new(core.DCB, core.DWT);

    // Initialize the global event channel.
    let (sender, receiver) = init_event_channel();
    let high_prio_spawner = init_executors();

    let pins = KEY_PINS.init(PinManager::new(board.key_line));
    let mut worker = KeyWorker::with_config(pins, clock, WorkerConfig::DEFAULT);
    worker.set_callback(on_worker_event);
    let worker: &'static Worker = WORKER.init(worker);

    spawner.must_spawn(watchdog_task(board.wdt));
    spawner.must_spawn(led_task(board.led.into()));
    spawner.must_spawn(button_task(board.button.into(), sender));
    spawner.must_spawn(orchestrate(
        receiver,
        KeyManager::new(worker, high_prio_spawner),
    ));
}
