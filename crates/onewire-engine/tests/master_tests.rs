use std::collections::BTreeSet;

use onewire_engine::{
    BusMaster, MasterTiming, OneWireError, RomCode, SearchMode, ROM_LEN,
};
use onewire_sim::{Chip, Script, SimClock, SimKey, SimPin, Wire};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn rom(family: u8, serial: u8) -> RomCode {
    RomCode::new(family, [serial, 0xCE, 0x67, 0x0F, serial ^ 0x5A, 0x00])
}

fn master_on(wire: &Wire) -> BusMaster<SimPin, SimClock> {
    let mut master = BusMaster::new(wire.pin(), wire.clock());
    master.start();
    master
}

fn enumerate(master: &mut BusMaster<SimPin, SimClock>) -> Vec<RomCode> {
    let mut found = Vec::new();
    while let Some(rom) = master.search(SearchMode::Normal) {
        found.push(rom);
        assert!(found.len() <= 8, "search never terminated");
    }
    found
}

// ---------------------------------------------------------------------------
// Reset and byte I/O
// ---------------------------------------------------------------------------

#[test]
fn reset_reports_presence() {
    let wire = Wire::new();
    let mut master = master_on(&wire);
    assert!(!master.reset());
    assert_eq!(master.last_error(), None);

    wire.attach(SimKey::ds1990(rom(0x01, 0x41)));
    assert!(master.reset());
    assert!(wire.is_high());
}

#[test]
fn reset_gives_up_on_stuck_line() {
    let wire = Wire::new();
    let mut master = master_on(&wire);
    wire.run_master(Script::new().pulse(2_000));
    wire.idle(1);

    assert!(!master.reset());
    assert_eq!(master.last_error(), Some(OneWireError::WaitResetTimeout));
    assert_eq!(master.decode_error(), "wait reset timeout");
}

#[test]
fn reset_without_wait_polls_still_gives_up() {
    let wire = Wire::new();
    let timing = MasterTiming { reset_wait_polls: 0, ..MasterTiming::STANDARD };
    let mut master = BusMaster::with_timing(wire.pin(), wire.clock(), timing);
    master.start();
    wire.run_master(Script::new().pulse(2_000));
    wire.idle(1);

    assert!(!master.reset());
    assert_eq!(master.last_error(), Some(OneWireError::WaitResetTimeout));
}

#[test]
fn read_rom_returns_key_code() {
    let key = rom(0x01, 0x41);
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(key));
    let mut master = master_on(&wire);

    assert_eq!(master.read_rom(), Some(key));
    assert_eq!(master.last_error(), None);
    assert_eq!(wire.key(0).commands(), &[0x33]);
}

#[test]
fn read_rom_rejects_bad_crc() {
    let mut bytes = *rom(0x01, 0x41).as_bytes();
    bytes[ROM_LEN - 1] ^= 0xFF;
    let wire = Wire::new();
    wire.attach(SimKey::new(Chip::Ds1990, bytes));
    let mut master = master_on(&wire);

    assert_eq!(master.read_rom(), None);
    assert_eq!(master.read_rom_raw(), Some(bytes));
}

#[test]
fn read_rom_without_key() {
    let wire = Wire::new();
    let mut master = master_on(&wire);
    assert_eq!(master.read_rom_raw(), None);
}

#[test]
fn bytes_go_out_lsb_first() {
    let key = rom(0x01, 0x41);
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(key));
    let mut master = master_on(&wire);

    assert!(master.reset());
    master.skip();
    assert!(master.reset());
    master.write_bytes(&[0x0F]);
    let mut buf = [0u8; ROM_LEN];
    master.read_bytes(&mut buf);

    assert_eq!(wire.key(0).commands(), &[0xCC, 0x0F]);
    assert_eq!(&buf, key.as_bytes());
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_finds_every_key_once() {
    let keys = [rom(0x01, 0x41), rom(0x01, 0x42), rom(0x28, 0x10), rom(0x01, 0xC3)];
    let wire = Wire::new();
    for key in keys {
        wire.attach(SimKey::ds1990(key));
    }
    let mut master = master_on(&wire);

    let found = enumerate(&mut master);
    assert_eq!(found.len(), keys.len());
    let found: BTreeSet<_> = found.iter().map(|r| *r.as_bytes()).collect();
    let expected: BTreeSet<_> = keys.iter().map(|r| *r.as_bytes()).collect();
    assert_eq!(found, expected);
}

#[test]
fn search_sets_last_device_flag() {
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(rom(0x01, 0x41)));
    wire.attach(SimKey::ds1990(rom(0x01, 0x42)));
    let mut master = master_on(&wire);

    let first = master.search(SearchMode::Normal);
    assert!(first.is_some());
    assert!(!master.search_state().last_device_flag());
    assert!(master.search(SearchMode::Normal).is_some());
    assert!(master.search_state().last_device_flag());

    // Enumeration is done; the next pass restarts from the first key.
    assert_eq!(master.search(SearchMode::Normal), None);
    assert!(!master.search_state().last_device_flag());
    assert_eq!(master.search(SearchMode::Normal), first);
}

#[test]
fn search_on_empty_bus_keeps_saved_rom() {
    let key = rom(0x01, 0x41);
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(key));
    let mut master = master_on(&wire);

    assert_eq!(master.search(SearchMode::Normal), Some(key));
    assert_eq!(master.search(SearchMode::Normal), None);

    wire.with_key(0, |k| k.set_present(false));
    assert_eq!(master.search(SearchMode::Normal), None);
    let state = master.search_state();
    assert_eq!(state.saved_rom(), key.as_bytes());
    assert_eq!(state.last_discrepancy(), 0);
    assert!(!state.last_device_flag());
}

#[test]
fn search_rejects_family_zero() {
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(rom(0x00, 0x41)));
    let mut master = master_on(&wire);
    assert_eq!(master.search(SearchMode::Normal), None);
}

#[test]
fn target_search_starts_at_family() {
    let thermometer = rom(0x28, 0x10);
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(rom(0x01, 0x41)));
    wire.attach(SimKey::ds1990(thermometer));
    wire.attach(SimKey::ds1990(rom(0x01, 0x42)));
    let mut master = master_on(&wire);

    master.target_search(0x28);
    assert_eq!(master.search(SearchMode::Normal), Some(thermometer));
}

#[test]
fn conditional_search_skips_quiet_keys() {
    let wire = Wire::new();
    wire.attach(SimKey::ds1990(rom(0x01, 0x41)));
    let mut master = master_on(&wire);

    assert_eq!(master.search(SearchMode::Conditional), None);
    assert_eq!(wire.key(0).commands(), &[0xEC]);
}
