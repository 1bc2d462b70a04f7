//! Deterministic, virtual-time model of a 1-Wire line for host tests.
//!
//! A [`Wire`] owns the time base and everything connected to the line: the
//! engine under test (through [`SimPin`] and [`SimClock`]), any number of
//! simulated keys and an optional scripted master. Time only moves when the
//! engine reads its clock, one microsecond per read, so every run is
//! reproducible.
//!
//! Two set-ups are supported:
//!
//! - the engine is the master and [`SimKey`]s answer it;
//! - the engine is a slave and a [`Script`] plays the master.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use onewire_engine::{CycleClock, Edge};

mod key;
mod script;

pub use key::{Chip, SimKey};
pub use script::{MasterLog, Script};

use key::Drive;
use script::ScriptMaster;

/// Upper bound on poll rounds in [`Wire::drive_poller`].
const POLL_LIMIT: usize = 1_000_000;

#[derive(Debug, Default)]
struct State {
    time: u32,
    engine_low: bool,
    engine_low_since: u32,
    keys: Vec<SimKey>,
    drives: Vec<Drive>,
    master: ScriptMaster,
    capture: bool,
    last_level: bool,
    edges: VecDeque<Edge>,
}

impl State {
    fn keys_high(&self) -> bool {
        let t = self.time;
        !self.drives.iter().any(|d| d.from <= t && t < d.to)
    }

    fn line_high(&self) -> bool {
        !self.engine_low && !self.master.is_low() && self.keys_high()
    }

    fn tick(&mut self) {
        self.time = self.time.wrapping_add(1);
        let t = self.time;
        let others_high = !self.engine_low && self.keys_high();
        self.master.step(t, others_high);
        self.drives.retain(|d| d.to > t);

        let level = self.line_high();
        if self.capture && level != self.last_level {
            self.edges.push_back(if level { Edge::Rising } else { Edge::Falling });
        }
        self.last_level = level;
    }

    fn engine_drive(&mut self, low: bool) {
        if low == self.engine_low {
            return;
        }
        let t = self.time;
        self.engine_low = low;
        if low {
            self.engine_low_since = t;
            let drives: Vec<_> =
                self.keys.iter_mut().filter_map(|k| k.on_falling(t)).collect();
            self.drives.extend(drives);
        } else {
            let width = t.wrapping_sub(self.engine_low_since);
            let drives: Vec<_> = self
                .keys
                .iter_mut()
                .filter_map(|k| k.on_rising(t, width))
                .collect();
            self.drives.extend(drives);
        }
    }
}

/// Shared handle to one simulated line.
#[derive(Debug, Clone)]
pub struct Wire {
    state: Rc<RefCell<State>>,
}

impl Default for Wire {
    fn default() -> Self {
        Self::new()
    }
}

impl Wire {
    pub fn new() -> Self {
        let state = State { last_level: true, ..State::default() };
        Self { state: Rc::new(RefCell::new(state)) }
    }

    /// Open-drain pin for the engine.
    pub fn pin(&self) -> SimPin {
        SimPin { wire: self.clone() }
    }

    /// Cycle counter for the engine, one tick per microsecond.
    pub fn clock(&self) -> SimClock {
        SimClock { wire: self.clone() }
    }

    pub fn now(&self) -> u32 {
        self.state.borrow().time
    }

    /// Jump the time base, e.g. to measure a pulse from a known start.
    pub fn set_time(&self, t: u32) {
        self.state.borrow_mut().time = t;
    }

    /// Let `us` microseconds pass without the engine looking.
    pub fn idle(&self, us: u32) {
        let mut state = self.state.borrow_mut();
        for _ in 0..us {
            state.tick();
        }
    }

    pub fn is_high(&self) -> bool {
        self.state.borrow().line_high()
    }

    /// Connect a key, returning its index.
    pub fn attach(&self, key: SimKey) -> usize {
        let mut state = self.state.borrow_mut();
        state.keys.push(key);
        state.keys.len() - 1
    }

    /// Snapshot of the key at `index`.
    pub fn key(&self, index: usize) -> SimKey {
        self.state.borrow().keys[index].clone()
    }

    pub fn with_key<R>(&self, index: usize, f: impl FnOnce(&mut SimKey) -> R) -> R {
        f(&mut self.state.borrow_mut().keys[index])
    }

    /// Queue a master script; it starts on the next tick. Line edges are
    /// recorded from now on.
    pub fn run_master(&self, script: Script) {
        let mut state = self.state.borrow_mut();
        state.master.push(script);
        if !state.capture {
            state.capture = true;
            state.last_level = state.line_high();
        }
    }

    pub fn script_done(&self) -> bool {
        self.state.borrow().master.is_done()
    }

    pub fn log(&self) -> MasterLog {
        self.state.borrow().master.log().clone()
    }

    /// Advance until the line changes level, returning the edge. `None`
    /// once the script has run out and no edge is pending.
    pub fn next_edge(&self) -> Option<Edge> {
        let mut state = self.state.borrow_mut();
        loop {
            if let Some(edge) = state.edges.pop_front() {
                return Some(edge);
            }
            if state.master.is_done() {
                return None;
            }
            state.tick();
        }
    }

    /// Drop edges the engine caused or already handled while it was busy.
    pub fn sync_edges(&self) {
        let mut state = self.state.borrow_mut();
        state.edges.clear();
        state.last_level = state.line_high();
    }

    /// Play the part of the pin interrupt: deliver every edge to
    /// `on_edge` until the script is done.
    pub fn drive_edges(&self, mut on_edge: impl FnMut(Edge)) {
        while let Some(edge) = self.next_edge() {
            on_edge(edge);
            self.sync_edges();
        }
    }

    /// Call a polling slave until the script is done. `poll` returns
    /// whether it consumed bus time; if it did not, a microsecond passes.
    pub fn drive_poller(&self, mut poll: impl FnMut() -> bool) {
        for _ in 0..POLL_LIMIT {
            if self.script_done() {
                return;
            }
            if !poll() {
                self.idle(1);
            }
        }
        panic!("script did not finish within {POLL_LIMIT} polls");
    }
}

/// Engine side of the line.
#[derive(Debug, Clone)]
pub struct SimPin {
    wire: Wire,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.wire.is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.wire.is_high())
    }
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.wire.state.borrow_mut().engine_drive(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.wire.state.borrow_mut().engine_drive(false);
        Ok(())
    }
}

/// Virtual cycle counter: every read returns the current microsecond and
/// then moves the line forward by one.
#[derive(Debug, Clone)]
pub struct SimClock {
    wire: Wire,
}

impl CycleClock for SimClock {
    fn now(&self) -> u32 {
        let mut state = self.wire.state.borrow_mut();
        let t = state.time;
        state.tick();
        t
    }

    fn ticks_per_us(&self) -> u32 {
        1
    }
}
