use embassy_futures::select::{select, Either};
use embassy_futures::yield_now;
use embassy_sync::signal::Signal;
use onewire_engine::Edge;
use portable_atomic::{AtomicBool, Ordering};

use crate::events::{ButtonPress, Event, KeyEvent};
use crate::prelude::*;

/// Ends a running single-key emulation.
static EDGE_STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();
/// Set while `edge_task` holds the key line.
static SINGLE_ACTIVE: AtomicBool = AtomicBool::new(false);

/// Serves [`KeyEvent`]s and remembers the last codes read.
pub struct KeyManager {
    worker: &'static Worker,
    high_prio_spawner: SendSpawner,
    keys: KeyList,
}

impl KeyManager {
    pub fn new(
        worker: &'static Worker,
        high_prio_spawner: SendSpawner,
    ) -> Self {
        Self { worker, high_prio_spawner, keys: KeyList::new() }
    }

    /// What a button press asks for in the current state.
    pub fn key_event(&self, press: ButtonPress) -> KeyEvent {
        match press {
            ButtonPress::Single => KeyEvent::Read,
            ButtonPress::Double if SINGLE_ACTIVE.load(Ordering::Acquire) => {
                KeyEvent::EmulateStop
            }
            ButtonPress::Double => KeyEvent::EmulateStart,
            ButtonPress::Hold => KeyEvent::Write,
        }
    }

    pub async fn handle_event(
        &mut self,
        event: KeyEvent,
        receiver: &EventReceiver,
    ) {
        if SINGLE_ACTIVE.load(Ordering::Acquire)
            && event != KeyEvent::EmulateStop
        {
            warn!("Key line busy emulating, dropped {:?}", event);
            return;
        }
        match event {
            KeyEvent::Read => self.read(),
            KeyEvent::ReadAll => self.read_all(),
            KeyEvent::Write => self.write(),
            KeyEvent::EmulateStart => self.emulate(receiver).await,
            KeyEvent::EmulateStop => EDGE_STOP.signal(()),
        }
    }

    fn remember(&mut self, keys: &[RomCode]) {
        self.keys.clear();
        // Never longer than the list the worker hands out.
        let _ = self.keys.extend_from_slice(keys);
    }

    fn read(&mut self) {
        match self.worker.read() {
            Ok(rom) => {
                info!("Read key {}", rom);
                self.remember(&[rom]);
            }
            // Several keys answering together garble Read ROM.
            Err(WorkerError::InvalidKey) => self.read_all(),
            Err(e) => warn!("Read failed: {:?}", e),
        }
    }

    fn read_all(&mut self) {
        match self.worker.read_all() {
            Ok(keys) => {
                info!("Found {} keys", keys.len());
                self.remember(&keys);
            }
            Err(e) => warn!("Search failed: {:?}", e),
        }
    }

    fn write(&mut self) {
        let Some(rom) = self.keys.first().copied() else {
            warn!("Nothing read yet, nothing to write");
            return;
        };
        match self.worker.write(KeyType::Dallas, rom.as_bytes()) {
            Ok(outcome) => info!("Writing {} gave {:?}", rom, outcome),
            Err(e) => warn!("Write failed: {:?}", e),
        }
    }

    async fn emulate(&mut self, receiver: &EventReceiver) {
        match self.keys.as_slice() {
            [] => warn!("Nothing read yet, nothing to emulate"),
            [rom] => {
                EDGE_STOP.reset();
                SINGLE_ACTIVE.store(true, Ordering::Release);
                self.high_prio_spawner.must_spawn(edge_task(self.worker, *rom));
            }
            _ => self.emulate_hub(receiver).await,
        }
    }

    /// Poll the hub until asked to stop. Other requests are dropped while
    /// the line is busy.
    async fn emulate_hub(&mut self, receiver: &EventReceiver) {
        let mut emulation = match self.worker.emulate_start(&self.keys) {
            Ok(emulation) => emulation,
            Err(e) => {
                warn!("Cannot emulate: {:?}", e);
                return;
            }
        };
        led_show(LedEvent::Emulating);

        loop {
            emulation.poll();
            match receiver.try_receive() {
                Ok(Event::ButtonPress(ButtonPress::Double))
                | Ok(Event::KeyEvent(KeyEvent::EmulateStop)) => break,
                Ok(_event) => {
                    warn!("Key line busy emulating, dropped {:?}", _event)
                }
                Err(_) => {}
            }
            yield_now().await;
        }

        let keys = emulation.stop();
        info!("Stopped emulating {} keys", keys.len());
        led_show(LedEvent::Idle);
    }
}

/// Answer as `rom`, one pin edge at a time, until [`EDGE_STOP`] fires.
///
/// Runs on the high-priority executor: the responder has to see the
/// reader's reset pulse end within a few microseconds.
#[embassy_executor::task]
pub async fn edge_task(worker: &'static Worker, rom: RomCode) {
    let mut emulation = match worker.emulate_single_start(rom) {
        Ok(emulation) => emulation,
        Err(e) => {
            warn!("Cannot emulate: {:?}", e);
            SINGLE_ACTIVE.store(false, Ordering::Release);
            return;
        }
    };
    led_show(LedEvent::Emulating);

    loop {
        let falling = emulation.pin_mut().wait_for_falling_edge();
        if let Either::Second(()) = select(falling, EDGE_STOP.wait()).await {
            break;
        }
        emulation.on_edge(Edge::Falling);
        emulation.pin_mut().wait_for_rising_edge().await;
        emulation.on_edge(Edge::Rising);
    }

    emulation.stop();
    info!("Stopped emulating {}", rom);
    led_show(LedEvent::Idle);
    SINGLE_ACTIVE.store(false, Ordering::Release);
}
