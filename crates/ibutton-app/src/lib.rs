#![no_std]
//! iButton reader firmware: reads keys, emulates them back to a reader and
//! rewrites blanks, all on one GPIO.

pub mod events;
pub mod tasks;
pub mod util;

use embassy_executor::{InterruptExecutor, SendSpawner};
use embassy_nrf::interrupt;
use embassy_nrf::interrupt::{InterruptExt, Priority};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use ibutton_bsp::{DwtClock, KeyLineFactory};
use ibutton_worker::KeyWorker;
use pin_manager::PinManager;
use static_cell::StaticCell;

pub const FW_VERSION: &str = env!("FW_VERSION");

/// Owner of the key contact.
pub type KeyPins = PinManager<CriticalSectionRawMutex, KeyLineFactory>;
pub type Worker =
    KeyWorker<'static, CriticalSectionRawMutex, KeyLineFactory, DwtClock>;

// Statics
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

const EVENT_CAPACITY: usize = 10;
pub type EventMutexType = CriticalSectionRawMutex;
pub type EventChannel = Channel<EventMutexType, events::Event, EVENT_CAPACITY>;
pub type EventSender =
    Sender<'static, EventMutexType, events::Event, EVENT_CAPACITY>;
pub type EventReceiver =
    Receiver<'static, EventMutexType, events::Event, EVENT_CAPACITY>;
static EVENT_CHANNEL: StaticCell<EventChannel> = StaticCell::new();
pub fn init_event_channel() -> (EventSender, EventReceiver) {
    let channel = EVENT_CHANNEL.init(Channel::new());
    (channel.sender(), channel.receiver())
}

// Interrupt executor
#[interrupt]
unsafe fn EGU1_SWI1() {
    EXECUTOR_HIGH.on_interrupt()
}

/// Start the executor single-key emulation runs on. Edge handling must
/// preempt the thread-mode tasks but stay below GPIOTE.
pub fn init_executors() -> SendSpawner {
    interrupt::EGU1_SWI1.set_priority(Priority::P6);
    EXECUTOR_HIGH.start(interrupt::EGU1_SWI1)
}

pub mod prelude {
    pub use super::{
        error, events::*, info, init_event_channel, init_executors,
        tasks::*, unwrap, warn, EventReceiver, EventSender, KeyPins, Worker,
        FW_VERSION,
    };
    pub use embassy_executor::{SendSpawner, Spawner};
    pub use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    pub use embassy_time::{Duration, Timer};

    pub use ibutton_bsp::{Board, DwtClock, KeyLineFactory};
    pub use ibutton_worker::{
        KeyList, KeyWorker, WorkerConfig, WorkerError, WorkerEvent,
    };
    pub use onewire_engine::{KeyType, RomCode, WriteOutcome};
    pub use pin_manager::PinManager;
}
