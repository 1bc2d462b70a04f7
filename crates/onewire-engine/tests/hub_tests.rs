use onewire_engine::{
    EmulatedKey, MultiDeviceHub, OneWireError, RomCode, HUB_DEVICE_LIMIT,
};
use onewire_sim::{Script, SimClock, SimPin, Wire};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type Hub = MultiDeviceHub<SimPin, SimClock>;

fn key(n: u8) -> RomCode {
    RomCode::new(0x01, [n, n.wrapping_mul(7), 0x67, 0x0F, n ^ 0x33, 0x00])
}

fn hub_with(wire: &Wire, roms: &[RomCode]) -> Hub {
    let mut hub = MultiDeviceHub::new(wire.pin(), wire.clock());
    for rom in roms {
        assert!(hub.attach(EmulatedKey::from(*rom)).is_some());
    }
    hub.start();
    hub
}

/// Poll the hub until the script is done, collecting every error it
/// reports along the way.
fn run(wire: &Wire, hub: &mut Hub, script: Script) -> Vec<OneWireError> {
    wire.run_master(script);
    let mut errors = Vec::new();
    wire.drive_poller(|| {
        let served = hub.emulate();
        errors.extend(hub.last_error());
        served
    });
    errors
}

/// Bit pairs a wired-AND bus would show while a master steers to `target`.
fn expected_pairs(keys: &[RomCode], target: RomCode) -> Vec<(bool, bool)> {
    let mut candidates = keys.to_vec();
    (0..64u8)
        .map(|i| {
            let any_one = candidates.iter().any(|k| k.bit(i));
            let any_zero = candidates.iter().any(|k| !k.bit(i));
            candidates.retain(|k| k.bit(i) == target.bit(i));
            (!any_zero, !any_one)
        })
        .collect()
}

fn read_rom_script() -> Script {
    Script::new().reset().write(&[0x33]).read(8)
}

// ---------------------------------------------------------------------------
// Attach and detach
// ---------------------------------------------------------------------------

#[test]
fn attach_fills_slots_in_order() {
    let wire = Wire::new();
    let mut hub = MultiDeviceHub::new(wire.pin(), wire.clock());
    for n in 0..HUB_DEVICE_LIMIT as u8 {
        assert_eq!(hub.attach(key(n).into()), Some(n));
    }
    assert_eq!(hub.attach(key(100).into()), None);
    assert_eq!(hub.device_count(), HUB_DEVICE_LIMIT);
    assert_eq!(hub.tree().nodes().len(), 2 * HUB_DEVICE_LIMIT - 1);
}

#[test]
fn attach_rejects_duplicate_rom() {
    let wire = Wire::new();
    let mut hub = MultiDeviceHub::new(wire.pin(), wire.clock());
    assert_eq!(hub.attach(key(1).into()), Some(0));
    assert_eq!(hub.attach(key(1).into()), None);
    assert_eq!(hub.device_count(), 1);
}

#[test]
fn detach_rebuilds_tree_and_frees_slot() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1), key(2), key(3)]);
    assert_eq!(hub.tree().leaves().count(), 3);

    assert_eq!(hub.detach(1), Some(EmulatedKey::Ds1990(key(2))));
    assert_eq!(hub.detach(1), None);
    assert_eq!(hub.tree().leaves().count(), 2);
    assert!(hub.detach_rom(&key(3)));
    assert!(!hub.detach_rom(&key(3)));
    assert_eq!(hub.tree().nodes().len(), 1);

    assert_eq!(hub.attach(key(4).into()), Some(1));
    assert_eq!(hub.key(1), Some(&EmulatedKey::Ds1990(key(4))));
}

#[test]
fn emulate_needs_devices_and_start() {
    let wire = Wire::new();
    let mut hub = MultiDeviceHub::new(wire.pin(), wire.clock());
    hub.start();
    assert!(!hub.emulate());
    assert_eq!(hub.last_error(), Some(OneWireError::IncorrectSlaveUsage));

    hub.attach(key(1).into());
    hub.stop();
    assert!(!hub.emulate());
    assert_eq!(hub.decode_error(), "incorrect slave usage");
}

// ---------------------------------------------------------------------------
// Reset detection
// ---------------------------------------------------------------------------

#[test]
fn reset_window_boundaries() {
    let cases = [
        (269, Some(OneWireError::VeryShortReset)),
        (270, None),
        (960, None),
        (961, Some(OneWireError::VeryLongReset)),
    ];
    for (width, error) in cases {
        let wire = Wire::new();
        let mut hub = hub_with(&wire, &[key(1)]);
        let mut script = Script::new().pulse(width);
        if error.is_none() {
            script = script.write(&[0x33]).read(8);
        }

        let errors = run(&wire, &mut hub, script);
        assert_eq!(errors.first().copied(), error, "width {width}");
        assert_eq!(wire.log().presence, vec![error.is_none()], "width {width}");
        if error.is_none() {
            assert_eq!(wire.log().read_bytes(), key(1).as_bytes().to_vec());
        }
    }
}

#[test]
fn overlong_reset_is_not_answered() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1)]);

    let errors = run(&wire, &mut hub, Script::new().pulse(2_000));
    assert_eq!(errors.first(), Some(&OneWireError::VeryLongReset));
    assert_eq!(wire.log().presence, vec![false]);
}

// ---------------------------------------------------------------------------
// ROM commands
// ---------------------------------------------------------------------------

#[test]
fn single_key_answers_read_rom() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1)]);

    let errors = run(&wire, &mut hub, read_rom_script());
    assert!(errors.is_empty(), "{errors:?}");
    assert_eq!(wire.log().presence, vec![true]);
    assert_eq!(wire.log().read_bytes(), key(1).as_bytes().to_vec());
}

#[test]
fn read_rom_stays_silent_with_several_keys() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1), key(2)]);

    run(&wire, &mut hub, read_rom_script());
    assert_eq!(wire.log().presence, vec![true]);
    assert_eq!(wire.log().read_bytes(), vec![0xFF; 8]);
}

#[test]
fn search_reaches_each_key() {
    let keys = [key(1), key(2), key(3), key(0x80), key(0x81)];
    for (slot, target) in keys.iter().enumerate() {
        let wire = Wire::new();
        let mut hub = hub_with(&wire, &keys);

        let errors = run(&wire, &mut hub, Script::new().reset().search(*target));
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(wire.log().search_pairs(), expected_pairs(&keys, *target));
        assert_eq!(hub.selected(), Some(slot as u8));
    }
}

#[test]
fn search_then_read_rom_addresses_selection() {
    let keys = [key(1), key(2), key(3)];
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &keys);

    let script = Script::new()
        .reset()
        .search(keys[2])
        .reset()
        .write(&[0x33])
        .read(8);
    run(&wire, &mut hub, script);
    assert_eq!(wire.log().presence, vec![true, true]);
    assert_eq!(wire.log().read_bytes(), keys[2].as_bytes().to_vec());
}

#[test]
fn search_for_missing_rom_selects_nothing() {
    let keys = [key(1), key(2)];
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &keys);

    let stranger = RomCode::new(0x01, [0xFF; 6]);
    run(&wire, &mut hub, Script::new().reset().search(stranger));
    assert_eq!(hub.selected(), None);
    // The hub dropped out: the tail of the search reads an empty bus.
    assert_eq!(wire.log().search_pairs().last(), Some(&(true, true)));
}

#[test]
fn match_rom_selects_and_reset_ends_transaction() {
    let keys = [key(1), key(2), key(3)];
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &keys);

    let script = Script::new()
        .reset()
        .write(&[0x55])
        .write(keys[1].as_bytes())
        .reset()
        .write(&[0x33])
        .read(8);
    let errors = run(&wire, &mut hub, script);

    assert!(
        errors.iter().all(|e| *e == OneWireError::ResetInProgress),
        "{errors:?}"
    );
    assert_eq!(hub.selected(), Some(1));
    assert_eq!(wire.log().presence, vec![true, true]);
    assert_eq!(wire.log().read_bytes(), keys[1].as_bytes().to_vec());
}

#[test]
fn match_rom_for_unknown_code() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1), key(2)]);

    let stranger = RomCode::new(0x01, [9; 6]);
    let script = Script::new().reset().write(&[0x55]).write(stranger.as_bytes());
    run(&wire, &mut hub, script);
    assert_eq!(hub.selected(), None);
}

#[test]
fn skip_rom_only_with_one_key() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1)]);
    run(&wire, &mut hub, Script::new().reset().write(&[0xCC]).idle(100));
    assert_eq!(hub.selected(), Some(0));

    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1), key(2)]);
    run(&wire, &mut hub, Script::new().reset().write(&[0xCC]).idle(100));
    assert_eq!(hub.selected(), None);
}

#[test]
fn unknown_command_is_reported_and_next_reset_served() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1)]);

    let script = Script::new()
        .reset()
        .write(&[0x3E])
        .idle(100)
        .reset()
        .write(&[0x33])
        .read(8);
    let errors = run(&wire, &mut hub, script);

    assert_eq!(errors, vec![OneWireError::IncorrectOnewireCmd]);
    assert_eq!(wire.log().presence, vec![true, true]);
    assert_eq!(wire.log().read_bytes(), key(1).as_bytes().to_vec());
}

#[test]
fn conditional_search_gets_no_answer() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1)]);

    let errors =
        run(&wire, &mut hub, Script::new().reset().write(&[0xEC]).read_bits(2));
    assert!(!errors.contains(&OneWireError::IncorrectOnewireCmd));
    assert_eq!(wire.log().reads, vec![true, true]);
}

#[test]
fn attach_clears_selection() {
    let wire = Wire::new();
    let mut hub = hub_with(&wire, &[key(1), key(2)]);
    run(&wire, &mut hub, Script::new().reset().search(key(2)));
    assert_eq!(hub.selected(), Some(1));

    hub.attach(key(3).into());
    assert_eq!(hub.selected(), None);
}
