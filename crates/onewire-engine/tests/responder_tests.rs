use std::cell::RefCell;

use onewire_engine::{
    EmulatedKey, OneWireError, ResponderState, RomCode, SingleSlaveResponder,
};
use onewire_sim::{Script, SimClock, SimPin, Wire};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const KEY: RomCode =
    RomCode::from_raw([0x01, 0x41, 0xCE, 0x67, 0x0F, 0x00, 0x00, 0xB6]);

type Responder = SingleSlaveResponder<SimPin, SimClock>;

fn responder_on(wire: &Wire) -> Responder {
    let mut responder = SingleSlaveResponder::new(wire.pin(), wire.clock());
    responder.attach(EmulatedKey::Ds1990(KEY));
    responder.start();
    responder
}

/// Run `script` against the responder; one entry per served reset.
fn run(
    wire: &Wire,
    responder: &mut Responder,
    script: Script,
) -> Vec<(bool, Option<OneWireError>)> {
    wire.run_master(script);
    let mut outcomes = Vec::new();
    wire.drive_edges(|edge| {
        if let Some(ok) = responder.on_edge(edge) {
            outcomes.push((ok, responder.last_error()));
        }
    });
    outcomes
}

thread_local! {
    static RESULTS: RefCell<Vec<bool>> = const { RefCell::new(Vec::new()) };
}

fn record_result(success: bool) {
    RESULTS.with(|r| r.borrow_mut().push(success));
}

// ---------------------------------------------------------------------------
// ROM commands
// ---------------------------------------------------------------------------

#[test]
fn answers_read_rom() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);

    let outcomes =
        run(&wire, &mut responder, Script::new().reset().write(&[0x33]).read(8));

    assert_eq!(outcomes, vec![(true, None)]);
    let log = wire.log();
    assert_eq!(log.presence, vec![true]);
    assert_eq!(log.read_bytes(), KEY.as_bytes().to_vec());
    assert_eq!(responder.state(), ResponderState::Idle);
}

#[test]
fn answers_legacy_read_rom() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);

    run(&wire, &mut responder, Script::new().reset().write(&[0x0F]).read(8));
    assert_eq!(wire.log().read_bytes(), KEY.as_bytes().to_vec());
}

#[test]
fn answers_search_without_collisions() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);

    let outcomes =
        run(&wire, &mut responder, Script::new().reset().search(KEY));

    assert_eq!(outcomes, vec![(true, None)]);
    let pairs = wire.log().search_pairs();
    assert_eq!(pairs.len(), 64);
    for (i, (bit, cmp)) in pairs.into_iter().enumerate() {
        assert_eq!(bit, KEY.bit(i as u8), "bit {i}");
        assert_eq!(cmp, !bit, "complement of bit {i}");
    }
}

#[test]
fn unknown_command_fails_then_recovers() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);

    let script = Script::new()
        .reset()
        .write(&[0x3E])
        .idle(100)
        .reset()
        .write(&[0x33])
        .read(8);
    let outcomes = run(&wire, &mut responder, script);

    assert_eq!(
        outcomes,
        vec![(false, Some(OneWireError::IncorrectOnewireCmd)), (true, None)]
    );
    assert_eq!(wire.log().read_bytes(), KEY.as_bytes().to_vec());
}

#[test]
fn serves_back_to_back_transactions() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);

    let script = Script::new()
        .reset()
        .write(&[0x33])
        .read(8)
        .reset()
        .write(&[0x33])
        .read(8);
    let outcomes = run(&wire, &mut responder, script);

    assert_eq!(outcomes.len(), 2);
    let mut twice = KEY.as_bytes().to_vec();
    twice.extend_from_slice(KEY.as_bytes());
    assert_eq!(wire.log().read_bytes(), twice);
}

// ---------------------------------------------------------------------------
// Reset detection
// ---------------------------------------------------------------------------

#[test]
fn reset_window_boundaries() {
    let cases = [
        (269, None, Some(OneWireError::VeryShortReset)),
        (270, Some(true), None),
        (960, Some(true), None),
        (961, None, Some(OneWireError::VeryLongReset)),
    ];
    for (width, outcome, error) in cases {
        let wire = Wire::new();
        let mut responder = responder_on(&wire);
        let mut script = Script::new().pulse(width);
        if outcome.is_some() {
            script = script.write(&[0x33]).read(8);
        }
        let outcomes = run(&wire, &mut responder, script);
        assert_eq!(outcomes.first().map(|o| o.0), outcome, "width {width}");
        assert_eq!(wire.log().presence, vec![outcome.is_some()]);
        assert_eq!(responder.last_error(), error, "width {width}");
    }
}

#[test]
fn reset_measured_across_counter_wrap() {
    let wire = Wire::new();
    wire.set_time(u32::MAX - 200);
    let mut responder = responder_on(&wire);

    let outcomes =
        run(&wire, &mut responder, Script::new().reset().write(&[0x33]).read(8));
    assert_eq!(outcomes, vec![(true, None)]);
    assert_eq!(wire.log().read_bytes(), KEY.as_bytes().to_vec());
}

#[test]
fn rising_edge_alone_is_ignored() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);
    assert_eq!(responder.on_edge(onewire_engine::Edge::Rising), None);
    assert_eq!(responder.state(), ResponderState::Idle);
}

// ---------------------------------------------------------------------------
// Usage errors and callback
// ---------------------------------------------------------------------------

#[test]
fn no_key_means_no_presence() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);
    assert_eq!(responder.detach(), Some(EmulatedKey::Ds1990(KEY)));

    let outcomes = run(&wire, &mut responder, Script::new().reset());
    assert_eq!(
        outcomes,
        vec![(false, Some(OneWireError::IncorrectSlaveUsage))]
    );
    assert_eq!(wire.log().presence, vec![false]);
    assert_eq!(responder.decode_error(), "incorrect slave usage");
}

#[test]
fn stopped_responder_ignores_the_bus() {
    let wire = Wire::new();
    let mut responder = responder_on(&wire);
    responder.stop();

    let outcomes = run(&wire, &mut responder, Script::new().reset());
    assert!(outcomes.is_empty());
    assert_eq!(wire.log().presence, vec![false]);
}

#[test]
fn callback_sees_every_transaction() {
    RESULTS.with(|r| r.borrow_mut().clear());
    let wire = Wire::new();
    let mut responder = responder_on(&wire);
    responder.set_result_callback(record_result);

    let script = Script::new()
        .reset()
        .write(&[0x33])
        .read(8)
        .reset()
        .write(&[0xAA])
        .idle(100)
        .pulse(100);
    run(&wire, &mut responder, script);

    RESULTS.with(|r| assert_eq!(*r.borrow(), vec![true, false]));
}

#[test]
fn attach_replaces_key() {
    let other = RomCode::new(0x01, [1, 2, 3, 4, 5, 6]);
    let wire = Wire::new();
    let mut responder = responder_on(&wire);
    assert_eq!(
        responder.attach(EmulatedKey::from(other)),
        Some(EmulatedKey::Ds1990(KEY))
    );

    run(&wire, &mut responder, Script::new().reset().write(&[0x33]).read(8));
    assert_eq!(wire.log().read_bytes(), other.as_bytes().to_vec());
}
