use std::cell::RefCell;
use std::convert::Infallible;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use ibutton_worker::{
    KeyWorker, WorkerConfig, WorkerError, WorkerEvent, MAX_KEYS,
};
use onewire_engine::{KeyType, OneWireError, RomCode, WriteOutcome};
use onewire_sim::{Chip, Script, SimClock, SimKey, SimPin, Wire};
use pin_manager::{PinError, PinFactory, PinManager, Role};

// ---------------------------------------------------------------------------
// Sim factory
// ---------------------------------------------------------------------------

/// Hands out the simulated line; the wire itself is the resource.
struct SimFactory;

impl PinFactory for SimFactory {
    type Pin = SimPin;
    type Resources = Wire;
    type Destructor = Wire;
    type Error = Infallible;

    fn create(
        wire: Self::Resources,
    ) -> Result<(Self::Pin, Self::Destructor), (Self::Error, Self::Resources)>
    {
        Ok((wire.pin(), wire))
    }

    fn recover(wire: Self::Destructor) -> Self::Resources {
        wire
    }
}

type Manager = PinManager<NoopRawMutex, SimFactory>;
type Worker<'a> = KeyWorker<'a, NoopRawMutex, SimFactory, SimClock>;

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn key(n: u8) -> RomCode {
    RomCode::new(0x01, [n, 0x41, 0xCE, 0x67, 0x0F, n ^ 0x5A])
}

fn setup() -> (Wire, Manager) {
    let wire = Wire::new();
    let manager = PinManager::new(wire.clone());
    (wire, manager)
}

thread_local! {
    static EVENTS: RefCell<Vec<WorkerEvent>> = const { RefCell::new(Vec::new()) };
}

fn record(event: WorkerEvent) {
    EVENTS.with(|e| e.borrow_mut().push(event));
}

fn take_events() -> Vec<WorkerEvent> {
    EVENTS.with(|e| std::mem::take(&mut *e.borrow_mut()))
}

fn worker<'a>(wire: &Wire, manager: &'a Manager) -> Worker<'a> {
    take_events();
    let mut worker = KeyWorker::new(manager, wire.clock());
    worker.set_callback(record);
    worker
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

#[test]
fn read_returns_key_and_releases_line() {
    let (wire, manager) = setup();
    wire.attach(SimKey::ds1990(key(1)));
    let worker = worker(&wire, &manager);

    assert_eq!(worker.read(), Ok(key(1)));
    assert!(!manager.is_leased());
    assert_eq!(take_events(), vec![WorkerEvent::ReadDone(true)]);
}

#[test]
fn read_without_key() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);

    assert_eq!(worker.read(), Err(WorkerError::NoKey));
    assert!(!manager.is_leased());
    assert_eq!(take_events(), vec![WorkerEvent::ReadDone(false)]);
}

#[test]
fn read_rejects_bad_crc() {
    let (wire, manager) = setup();
    let mut bytes = *key(1).as_bytes();
    bytes[7] ^= 0xFF;
    wire.attach(SimKey::new(Chip::Ds1990, bytes));
    let worker = worker(&wire, &manager);

    assert_eq!(worker.read(), Err(WorkerError::InvalidKey));
    // Every attempt issued its own Read ROM.
    assert_eq!(
        wire.key(0).commands().len(),
        WorkerConfig::DEFAULT.read_attempts as usize
    );
}

#[test]
fn read_gives_up_on_stuck_line() {
    let (wire, manager) = setup();
    wire.run_master(Script::new().pulse(2_000));
    wire.idle(1);
    let worker = worker(&wire, &manager);

    assert_eq!(
        worker.read(),
        Err(WorkerError::Bus(OneWireError::WaitResetTimeout))
    );
}

#[test]
fn read_all_lists_every_key() {
    let (wire, manager) = setup();
    for n in [3, 1, 2] {
        wire.attach(SimKey::ds1990(key(n)));
    }
    let worker = worker(&wire, &manager);

    let mut keys = worker.read_all().unwrap();
    keys.sort_unstable_by_key(|k| *k.as_bytes());
    let mut expected = vec![key(1), key(2), key(3)];
    expected.sort_unstable_by_key(|k| *k.as_bytes());
    assert_eq!(keys.as_slice(), expected.as_slice());
    assert_eq!(take_events(), vec![WorkerEvent::ReadDone(true)]);
}

#[test]
fn read_all_on_empty_line() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);
    assert_eq!(worker.read_all(), Err(WorkerError::NoKey));
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

#[test]
fn write_programs_blank() {
    let (wire, manager) = setup();
    let blank = RomCode::new(0x01, [0xFF, 0xFF, 0, 0, 0, 0]);
    wire.attach(SimKey::new(Chip::Rw1990_2, *blank.as_bytes()));
    let worker = worker(&wire, &manager);

    let outcome = worker.write(KeyType::Dallas, key(7).as_bytes());
    assert_eq!(outcome, Ok(WriteOutcome::Ok));
    assert_eq!(&wire.key(0).rom(), key(7).as_bytes());
    assert!(!manager.is_leased());
    assert_eq!(take_events(), vec![WorkerEvent::WriteDone(WriteOutcome::Ok)]);
}

#[test]
fn write_reports_same_key() {
    let (wire, manager) = setup();
    wire.attach(SimKey::new(Chip::Rw1990_1, *key(7).as_bytes()));
    let worker = worker(&wire, &manager);

    assert_eq!(
        worker.write(KeyType::Dallas, key(7).as_bytes()),
        Ok(WriteOutcome::SameKey)
    );
}

// ---------------------------------------------------------------------------
// Emulation
// ---------------------------------------------------------------------------

#[test]
fn hub_emulation_answers_search_and_read() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);
    let keys = [key(1), key(2), key(3)];

    let mut emulation = worker.emulate_start(&keys).unwrap();
    assert_eq!(manager.holder(), Some(Role::Hub));
    assert_eq!(emulation.device_count(), 3);

    let script =
        Script::new().reset().search(keys[1]).reset().write(&[0x33]).read(8);
    wire.run_master(script);
    wire.drive_poller(|| emulation.poll());

    assert_eq!(emulation.selected(), Some(keys[1]));
    assert_eq!(wire.log().read_bytes(), keys[1].as_bytes().to_vec());
    assert!(take_events().contains(&WorkerEvent::Emulated(true)));

    let returned = emulation.stop();
    assert_eq!(returned.as_slice(), &keys);
    assert!(!manager.is_leased());
}

#[test]
fn hub_emulation_checks_key_count() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);

    assert!(matches!(worker.emulate_start(&[]), Err(WorkerError::NoKey)));
    let many: Vec<_> = (0..=MAX_KEYS as u8).map(key).collect();
    assert!(matches!(
        worker.emulate_start(&many),
        Err(WorkerError::TooManyKeys)
    ));
    assert!(!manager.is_leased());
}

#[test]
fn single_emulation_answers_read_rom() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);

    let mut emulation = worker.emulate_single_start(key(4)).unwrap();
    assert_eq!(manager.holder(), Some(Role::Emulator));

    wire.run_master(Script::new().reset().write(&[0x33]).read(8));
    wire.drive_edges(|edge| {
        emulation.on_edge(edge);
    });

    assert_eq!(wire.log().read_bytes(), key(4).as_bytes().to_vec());
    assert_eq!(emulation.last_error(), None);
    assert_eq!(take_events(), vec![WorkerEvent::Emulated(true)]);
    assert_eq!(emulation.stop(), Some(key(4)));
    assert!(!manager.is_leased());
}

#[test]
fn line_busy_while_emulating() {
    let (wire, manager) = setup();
    let worker = worker(&wire, &manager);

    let emulation = worker.emulate_single_start(key(4)).unwrap();
    assert_eq!(
        worker.read(),
        Err(WorkerError::Pin(PinError::InUse(Role::Emulator)))
    );
    assert!(matches!(
        worker.emulate_start(&[key(1)]),
        Err(WorkerError::Pin(PinError::InUse(Role::Emulator)))
    ));
    // A refused read reports nothing.
    assert!(take_events().is_empty());

    drop(emulation);
    assert!(!manager.is_leased());
    assert_eq!(worker.read(), Err(WorkerError::NoKey));
}

#[test]
fn config_is_applied() {
    let (wire, manager) = setup();
    let config = WorkerConfig { read_attempts: 1, ..WorkerConfig::DEFAULT };
    let worker: Worker<'_> =
        KeyWorker::with_config(&manager, wire.clock(), config);
    assert_eq!(worker.config().read_attempts, 1);

    let mut bytes = *key(1).as_bytes();
    bytes[7] ^= 0xFF;
    wire.attach(SimKey::new(Chip::Ds1990, bytes));
    assert_eq!(worker.read(), Err(WorkerError::InvalidKey));
    assert_eq!(wire.key(0).commands(), &[0x33]);
}
