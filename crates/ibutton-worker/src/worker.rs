use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::{InputPin, OutputPin};
use heapless::Vec;
use onewire_engine::{
    BlankWriter, BusMaster, CycleClock, EmulatedKey, KeyType, MultiDeviceHub,
    OneWireError, RomCode, SearchMode, SingleSlaveResponder, WriteOutcome,
    HUB_DEVICE_LIMIT,
};
use pin_manager::{PinFactory, PinLease, PinManager, Role};

use crate::config::WorkerConfig;
use crate::emulation::{HubEmulation, SingleEmulation};
use crate::error::WorkerError;
use crate::event::{WorkerCallback, WorkerEvent};

/// Keys a single [`KeyWorker::read_all`] can return.
pub const MAX_KEYS: usize = HUB_DEVICE_LIMIT;

pub type KeyList = Vec<RomCode, MAX_KEYS>;

type Master<'a, 'c, M, F, C> = BusMaster<PinLease<'a, M, F>, &'c C>;

/// Application entry points for the key line.
///
/// Every operation leases the pin from the [`PinManager`] for its own
/// role and gives it back when done, so a read cannot start while an
/// emulation is running and vice versa.
pub struct KeyWorker<'a, M: RawMutex, F: PinFactory, C> {
    pins: &'a PinManager<M, F>,
    clock: C,
    config: WorkerConfig,
    callback: Option<WorkerCallback>,
}

impl<'a, M, F, C> KeyWorker<'a, M, F, C>
where
    M: RawMutex,
    F: PinFactory,
    F::Pin: InputPin + OutputPin,
    C: CycleClock,
{
    pub fn new(pins: &'a PinManager<M, F>, clock: C) -> Self {
        Self::with_config(pins, clock, WorkerConfig::default())
    }

    pub fn with_config(
        pins: &'a PinManager<M, F>,
        clock: C,
        config: WorkerConfig,
    ) -> Self {
        Self { pins, clock, config, callback: None }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Register the completion callback for reads, writes and emulated
    /// transactions.
    pub fn set_callback(&mut self, callback: WorkerCallback) {
        self.callback = Some(callback);
    }

    fn notify(&self, event: WorkerEvent) {
        if let Some(callback) = self.callback {
            callback(event);
        }
    }

    fn master(
        &self,
        role: Role,
    ) -> Result<Master<'a, '_, M, F, C>, WorkerError<F::Error>> {
        let lease = self.pins.acquire(role)?;
        let mut master =
            BusMaster::with_speed(lease, &self.clock, self.config.speed);
        master.start();
        Ok(master)
    }

    /// Read the code of the key touching the reader.
    pub fn read(&self) -> Result<RomCode, WorkerError<F::Error>> {
        let mut master = self.master(Role::Reader)?;

        let mut result = Err(WorkerError::NoKey);
        for attempt in 0..self.config.read_attempts.max(1) {
            result = read_once(&mut master);
            match &result {
                Ok(rom) => {
                    info!("worker: read {} (attempt {})", rom, attempt + 1);
                    break;
                }
                Err(WorkerError::Bus(_)) => break,
                Err(_) => {}
            }
        }
        master.stop();

        self.notify(WorkerEvent::ReadDone(result.is_ok()));
        result
    }

    /// Enumerate every key on the line.
    pub fn read_all(&self) -> Result<KeyList, WorkerError<F::Error>> {
        let mut master = self.master(Role::Reader)?;
        master.reset_search();

        let mut keys = KeyList::new();
        while let Some(rom) = master.search(SearchMode::Normal) {
            if keys.push(rom).is_err() {
                warn!("worker: more than {} keys, list truncated", MAX_KEYS);
                break;
            }
        }
        let error = master.last_error();
        master.stop();

        self.notify(WorkerEvent::ReadDone(!keys.is_empty()));
        if !keys.is_empty() {
            Ok(keys)
        } else if let Some(e @ OneWireError::WaitResetTimeout) = error {
            Err(WorkerError::Bus(e))
        } else {
            Err(WorkerError::NoKey)
        }
    }

    /// Program `data` into the blank touching the reader.
    pub fn write(
        &self,
        key_type: KeyType,
        data: &[u8],
    ) -> Result<WriteOutcome, WorkerError<F::Error>> {
        let mut writer = BlankWriter::from_master(self.master(Role::Writer)?);
        let outcome = writer.write(key_type, data);
        if let Some(method) = writer.last_method() {
            debug!("worker: blank took {}", method);
        }
        writer.stop();

        self.notify(WorkerEvent::WriteDone(outcome));
        Ok(outcome)
    }

    /// Start answering as all of `keys` at once.
    ///
    /// The pin stays leased to the hub until the returned handle is
    /// stopped or dropped.
    pub fn emulate_start(
        &self,
        keys: &[RomCode],
    ) -> Result<HubEmulation<'a, '_, M, F, C>, WorkerError<F::Error>> {
        if keys.is_empty() {
            return Err(WorkerError::NoKey);
        }
        if keys.len() > HUB_DEVICE_LIMIT {
            return Err(WorkerError::TooManyKeys);
        }

        let lease = self.pins.acquire(Role::Hub)?;
        let mut hub =
            MultiDeviceHub::with_speed(lease, &self.clock, self.config.speed);
        for rom in keys {
            if hub.attach(EmulatedKey::from(*rom)).is_none() {
                warn!("worker: {} listed twice", rom);
            }
        }
        hub.start();
        info!("worker: emulating {} keys", hub.device_count());

        Ok(HubEmulation::new(hub, self.callback, self.config.hub_poll_rounds))
    }

    /// Start answering as `key` from pin-edge interrupts.
    pub fn emulate_single_start(
        &self,
        key: RomCode,
    ) -> Result<SingleEmulation<'a, '_, M, F, C>, WorkerError<F::Error>> {
        let lease = self.pins.acquire(Role::Emulator)?;
        let mut responder = SingleSlaveResponder::with_speed(
            lease,
            &self.clock,
            self.config.speed,
        );
        responder.attach(EmulatedKey::from(key));
        responder.start();
        info!("worker: emulating {}", key);

        Ok(SingleEmulation::new(responder, self.callback))
    }
}

fn read_once<P, C, E>(
    master: &mut BusMaster<P, C>,
) -> Result<RomCode, WorkerError<E>>
where
    P: InputPin + OutputPin,
    C: CycleClock,
    E: core::fmt::Debug,
{
    let Some(bytes) = master.read_rom_raw() else {
        return match master.last_error() {
            Some(e @ OneWireError::WaitResetTimeout) => Err(WorkerError::Bus(e)),
            _ => Err(WorkerError::NoKey),
        };
    };
    match RomCode::try_from(&bytes[..]) {
        Ok(rom) if rom.family() != 0 => Ok(rom),
        Ok(_) => Err(WorkerError::InvalidKey),
        Err(_e) => {
            debug!("worker: rejected {}", _e);
            Err(WorkerError::InvalidKey)
        }
    }
}
