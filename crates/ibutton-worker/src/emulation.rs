use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{InputPin, OutputPin};
use onewire_engine::{
    CycleClock, Edge, MultiDeviceHub, OneWireError, RomCode,
    SingleSlaveResponder, HUB_DEVICE_LIMIT,
};
use pin_manager::{PinFactory, PinLease};

use crate::event::{WorkerCallback, WorkerEvent};
use crate::worker::KeyList;

type Hub<'a, 'c, M, F, C> = MultiDeviceHub<PinLease<'a, M, F>, &'c C>;
type Responder<'a, 'c, M, F, C> =
    SingleSlaveResponder<PinLease<'a, M, F>, &'c C>;

fn notify(callback: Option<WorkerCallback>, event: WorkerEvent) {
    if let Some(callback) = callback {
        callback(event);
    }
}

/// A running multi-key emulation; holds the pin until stopped.
pub struct HubEmulation<'a, 'c, M: RawMutex, F: PinFactory, C> {
    hub: Hub<'a, 'c, M, F, C>,
    callback: Option<WorkerCallback>,
    rounds: u8,
}

impl<'a, 'c, M, F, C> HubEmulation<'a, 'c, M, F, C>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: InputPin + OutputPin,
    C: CycleClock,
{
    pub(crate) fn new(
        hub: Hub<'a, 'c, M, F, C>,
        callback: Option<WorkerCallback>,
        rounds: u8,
    ) -> Self {
        Self { hub, callback, rounds: rounds.max(1) }
    }

    /// Serve whatever the reader sends, for at most the configured number
    /// of `emulate` rounds. Returns `true` if a transaction was served.
    pub fn poll(&mut self) -> bool {
        let mut served = false;
        for _ in 0..self.rounds {
            if !self.hub.emulate() {
                break;
            }
            served = true;
            let ok = matches!(
                self.hub.last_error(),
                None | Some(OneWireError::ResetInProgress)
            );
            notify(self.callback, WorkerEvent::Emulated(ok));
        }
        served
    }

    pub fn device_count(&self) -> usize {
        self.hub.device_count()
    }

    /// Key picked by the reader's last search or match.
    pub fn selected(&self) -> Option<RomCode> {
        let slot = self.hub.selected()?;
        self.hub.key(slot).map(|k| *k.rom())
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.hub.last_error()
    }

    /// Stop answering and release the pin, handing back the keys.
    pub fn stop(mut self) -> KeyList {
        self.hub.stop();
        let mut keys = KeyList::new();
        for slot in 0..HUB_DEVICE_LIMIT as u8 {
            if let Some(key) = self.hub.key(slot) {
                // Capacity matches the hub's slot count.
                let _ = keys.push(*key.rom());
            }
        }
        keys
    }
}

/// A running single-key emulation fed from pin-edge interrupts.
pub struct SingleEmulation<'a, 'c, M: RawMutex, F: PinFactory, C> {
    responder: Responder<'a, 'c, M, F, C>,
    callback: Option<WorkerCallback>,
}

impl<'a, 'c, M, F, C> SingleEmulation<'a, 'c, M, F, C>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: InputPin + OutputPin,
    C: CycleClock,
{
    pub(crate) fn new(
        responder: Responder<'a, 'c, M, F, C>,
        callback: Option<WorkerCallback>,
    ) -> Self {
        Self { responder, callback }
    }

    /// Forward one line edge; see [`SingleSlaveResponder::on_edge`].
    pub fn on_edge(&mut self, edge: Edge) -> Option<bool> {
        let result = self.responder.on_edge(edge);
        if let Some(ok) = result {
            notify(self.callback, WorkerEvent::Emulated(ok));
        }
        result
    }

    /// The leased pin, for waiting on the next edge.
    pub fn pin_mut(&mut self) -> &mut F::Pin {
        &mut **self.responder.pin_mut()
    }

    pub fn last_error(&self) -> Option<OneWireError> {
        self.responder.last_error()
    }

    /// Stop answering and release the pin, handing back the key.
    pub fn stop(mut self) -> Option<RomCode> {
        self.responder.stop();
        self.responder.key().map(|k| *k.rom())
    }
}
