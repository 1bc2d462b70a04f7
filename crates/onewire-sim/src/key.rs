//! Simulated keys reacting to a bus master.

use onewire_engine::commands::blank::*;
use onewire_engine::RomCode;

/// Low time (µs) from which a pulse counts as a reset.
const RESET_THRESHOLD: u32 = 270;
/// Low time (µs) below which a write slot carries a one.
const ONE_THRESHOLD: u32 = 15;
/// Presence pulse, relative to the end of the reset pulse.
const PRESENCE_DELAY: u32 = 15;
const PRESENCE_LEN: u32 = 120;
/// Zero bit hold, relative to the start of the read slot.
const ZERO_HOLD: u32 = 30;

/// Chip behind a simulated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    /// Factory-programmed DS1990A; cannot be rewritten.
    Ds1990,
    Rw1990_1,
    Rw1990_2,
    Tm2004,
}

/// Interval `[from, to)` during which a key pulls the line low.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Drive {
    pub from: u32,
    pub to: u32,
}

#[derive(Debug, Clone, Copy)]
enum Io {
    Idle,
    Receive { want: u8, got: u8, acc: u64 },
    Send { data: u64, len: u8, sent: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Command,
    ReadRom,
    SearchPair(u8),
    SearchDirection(u8),
    MatchRom,
    Flag,
    WriteRom,
    TmAddress,
    TmData,
    TmEcho,
    TmPulse,
    TmReadback,
}

#[derive(Debug, Clone)]
pub struct SimKey {
    chip: Chip,
    rom: [u8; 8],
    present: bool,
    io: Io,
    stage: Stage,
    slot_taken: bool,
    unlocked: bool,
    tm_address: usize,
    tm_pending: u8,
    selected: bool,
    commands: Vec<u8>,
}

impl SimKey {
    pub fn new(chip: Chip, rom: [u8; 8]) -> Self {
        Self {
            chip,
            rom,
            present: true,
            io: Io::Idle,
            stage: Stage::Command,
            slot_taken: false,
            unlocked: false,
            tm_address: 0,
            tm_pending: 0,
            selected: false,
            commands: Vec::new(),
        }
    }

    pub fn ds1990(rom: RomCode) -> Self {
        Self::new(Chip::Ds1990, *rom.as_bytes())
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn rom(&self) -> [u8; 8] {
        self.rom
    }

    pub fn is_present(&self) -> bool {
        self.present
    }

    pub fn set_present(&mut self, present: bool) {
        self.present = present;
        self.io = Io::Idle;
    }

    /// Every command byte received after a reset, in order.
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Command bytes that belong to a blank-writing protocol.
    pub fn vendor_commands(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| {
                matches!(
                    **c,
                    RW1990_1_WRITE_RECORD_FLAG
                        | RW1990_1_WRITE_ROM
                        | RW1990_2_WRITE_RECORD_FLAG
                        | TM2004_WRITE_ROM
                        | TM2004_FINALIZE
                )
            })
            .count()
    }

    /// `true` after a Match-ROM or a completed search picked this key.
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub(crate) fn on_falling(&mut self, t: u32) -> Option<Drive> {
        if !self.present {
            return None;
        }
        let Io::Send { data, len, sent } = self.io else {
            return None;
        };
        let bit = (data >> sent) & 1 != 0;
        self.slot_taken = true;
        if sent + 1 == len {
            self.complete(data);
        } else {
            self.io = Io::Send { data, len, sent: sent + 1 };
        }
        (!bit).then_some(Drive { from: t, to: t + ZERO_HOLD })
    }

    pub(crate) fn on_rising(&mut self, t: u32, low_us: u32) -> Option<Drive> {
        if !self.present {
            return None;
        }
        if low_us >= RESET_THRESHOLD {
            self.slot_taken = false;
            self.selected = false;
            self.receive(8, Stage::Command);
            return Some(Drive {
                from: t + PRESENCE_DELAY,
                to: t + PRESENCE_DELAY + PRESENCE_LEN,
            });
        }
        if core::mem::take(&mut self.slot_taken) {
            return None;
        }
        if let Io::Receive { want, got, acc } = self.io {
            let bit = low_us < ONE_THRESHOLD;
            let acc = acc | ((bit as u64) << got);
            if got + 1 == want {
                self.complete(acc);
            } else {
                self.io = Io::Receive { want, got: got + 1, acc };
            }
        }
        None
    }

    fn receive(&mut self, bits: u8, stage: Stage) {
        self.io = Io::Receive { want: bits, got: 0, acc: 0 };
        self.stage = stage;
    }

    fn send(&mut self, data: u64, bits: u8, stage: Stage) {
        self.io = Io::Send { data, len: bits, sent: 0 };
        self.stage = stage;
    }

    fn idle(&mut self) {
        self.io = Io::Idle;
    }

    fn rom_bit(&self, index: u8) -> bool {
        (self.rom[(index >> 3) as usize] >> (index & 7)) & 1 != 0
    }

    fn send_search_pair(&mut self, index: u8) {
        let bit = self.rom_bit(index) as u64;
        self.send(bit | ((bit ^ 1) << 1), 2, Stage::SearchPair(index));
    }

    fn complete(&mut self, value: u64) {
        match self.stage {
            Stage::Command => self.command(value as u8),
            Stage::ReadRom => self.idle(),
            Stage::SearchPair(i) => self.receive(1, Stage::SearchDirection(i)),
            Stage::SearchDirection(i) => {
                let direction = value & 1 != 0;
                if direction != self.rom_bit(i) {
                    self.idle();
                } else if i == 63 {
                    self.selected = true;
                    self.idle();
                } else {
                    self.send_search_pair(i + 1);
                }
            }
            Stage::MatchRom => {
                self.selected = value.to_le_bytes() == self.rom;
                self.idle();
            }
            Stage::Flag => {
                let bit = value & 1 != 0;
                self.unlocked = match self.chip {
                    Chip::Rw1990_1 => !bit,
                    _ => bit,
                };
                self.receive(8, Stage::Command);
            }
            Stage::WriteRom => {
                if self.unlocked {
                    let bytes = value.to_le_bytes();
                    self.rom = match self.chip {
                        Chip::Rw1990_1 => bytes.map(|b| !b),
                        _ => bytes,
                    };
                }
                self.receive(8, Stage::Command);
            }
            Stage::TmAddress => {
                self.tm_address = value as usize;
                self.receive(8, Stage::TmData);
            }
            Stage::TmData => {
                self.tm_pending = value as u8;
                self.send(value & 0xFF, 8, Stage::TmEcho);
            }
            Stage::TmEcho => self.receive(1, Stage::TmPulse),
            Stage::TmPulse => {
                let address = self.tm_address;
                if value & 1 != 0 && address < self.rom.len() {
                    self.rom[address] = self.tm_pending;
                }
                let stored = self.rom.get(address).copied().unwrap_or(0xFF);
                self.tm_address += 1;
                self.send(stored as u64, 8, Stage::TmReadback);
            }
            Stage::TmReadback => self.receive(8, Stage::TmData),
        }
    }

    fn command(&mut self, cmd: u8) {
        self.commands.push(cmd);
        match (self.chip, cmd) {
            (_, 0x33 | 0x0F) => {
                self.send(u64::from_le_bytes(self.rom), 64, Stage::ReadRom)
            }
            (_, 0xF0) => self.send_search_pair(0),
            (_, 0x55) => self.receive(64, Stage::MatchRom),
            (Chip::Rw1990_1, RW1990_1_WRITE_RECORD_FLAG)
            | (Chip::Rw1990_2, RW1990_2_WRITE_RECORD_FLAG) => {
                self.receive(1, Stage::Flag)
            }
            (Chip::Rw1990_1 | Chip::Rw1990_2, RW1990_1_WRITE_ROM) => {
                self.receive(64, Stage::WriteRom)
            }
            (Chip::Tm2004, TM2004_WRITE_ROM) => {
                self.receive(16, Stage::TmAddress)
            }
            _ => self.idle(),
        }
    }
}
