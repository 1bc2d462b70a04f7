//! A scripted bus master that exercises the engine's slave roles.

use std::collections::VecDeque;

use onewire_engine::RomCode;

const STANDARD_RESET_US: u32 = 480;
const PRESENCE_SAMPLE_US: u32 = 70;
const RESET_RECOVERY_US: u32 = 480;
const SLOT_US: u32 = 75;
const WRITE_ONE_LOW_US: u32 = 6;
const WRITE_ZERO_LOW_US: u32 = 60;
const READ_LOW_US: u32 = 2;
const READ_SAMPLE_US: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadKind {
    Data,
    Search,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Pulse(u32),
    Write(bool),
    Read(ReadKind),
    Idle(u32),
}

/// Sequence of master operations, built up front and replayed against the
/// wire.
#[derive(Debug, Clone, Default)]
pub struct Script {
    slots: Vec<Slot>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Standard 480 µs reset followed by the presence sample.
    pub fn reset(self) -> Self {
        self.pulse(STANDARD_RESET_US)
    }

    /// Low pulse of any width. The presence sample and the recovery time
    /// follow as after a reset.
    pub fn pulse(mut self, low_us: u32) -> Self {
        self.slots.push(Slot::Pulse(low_us));
        self
    }

    pub fn write(mut self, bytes: &[u8]) -> Self {
        for &byte in bytes {
            for i in 0..8 {
                self.slots.push(Slot::Write((byte >> i) & 1 != 0));
            }
        }
        self
    }

    pub fn write_bits(mut self, bits: &[bool]) -> Self {
        self.slots.extend(bits.iter().map(|&b| Slot::Write(b)));
        self
    }

    pub fn read(self, bytes: usize) -> Self {
        self.read_bits(bytes * 8)
    }

    pub fn read_bits(mut self, bits: usize) -> Self {
        self.slots.extend((0..bits).map(|_| Slot::Read(ReadKind::Data)));
        self
    }

    /// Search-ROM command and all 64 triplets, always steering toward
    /// `target`. The bit pairs the slaves answer are logged.
    pub fn search(mut self, target: RomCode) -> Self {
        self = self.write(&[onewire_engine::commands::SEARCH_ROM]);
        for i in 0..64 {
            self.slots.push(Slot::Read(ReadKind::Search));
            self.slots.push(Slot::Read(ReadKind::Search));
            self.slots.push(Slot::Write(target.bit(i)));
        }
        self
    }

    pub fn idle(mut self, us: u32) -> Self {
        self.slots.push(Slot::Idle(us));
        self
    }
}

/// What the scripted master observed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MasterLog {
    /// One entry per reset pulse: `true` if a slave answered.
    pub presence: Vec<bool>,
    /// Data read slots, in order.
    pub reads: Vec<bool>,
    /// Search read slots, two per bit position.
    pub search: Vec<bool>,
}

impl MasterLog {
    /// Data reads packed into bytes, least significant bit first.
    pub fn read_bytes(&self) -> Vec<u8> {
        self.reads
            .chunks(8)
            .map(|bits| {
                bits.iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i))
            })
            .collect()
    }

    /// `(id_bit, cmp_id_bit)` per searched position.
    pub fn search_pairs(&self) -> Vec<(bool, bool)> {
        self.search.chunks(2).map(|p| (p[0], p.get(1) == Some(&true))).collect()
    }
}

#[derive(Debug, Default)]
pub(crate) struct ScriptMaster {
    queue: VecDeque<Slot>,
    current: Option<(Slot, u32)>,
    low: bool,
    log: MasterLog,
}

impl ScriptMaster {
    pub fn push(&mut self, script: Script) {
        self.queue.extend(script.slots);
    }

    pub fn is_done(&self) -> bool {
        self.current.is_none() && self.queue.is_empty()
    }

    pub fn is_low(&self) -> bool {
        self.low
    }

    pub fn log(&self) -> &MasterLog {
        &self.log
    }

    /// Advance to time `t`. `others_high` is the line as driven by
    /// everything except this master.
    pub fn step(&mut self, t: u32, others_high: bool) {
        loop {
            let Some((slot, start)) = self.current else {
                match self.queue.pop_front() {
                    Some(slot) => {
                        self.current = Some((slot, t));
                        continue;
                    }
                    None => return,
                }
            };
            let rel = t.wrapping_sub(start);
            let done = match slot {
                Slot::Pulse(width) => {
                    if rel == 0 {
                        self.low = true;
                    }
                    if rel == width {
                        self.low = false;
                    }
                    if rel == width + PRESENCE_SAMPLE_US {
                        self.log.presence.push(!others_high);
                    }
                    rel >= width + RESET_RECOVERY_US
                }
                Slot::Write(bit) => {
                    let low =
                        if bit { WRITE_ONE_LOW_US } else { WRITE_ZERO_LOW_US };
                    if rel == 0 {
                        self.low = true;
                    }
                    if rel == low {
                        self.low = false;
                    }
                    rel >= SLOT_US
                }
                Slot::Read(kind) => {
                    if rel == 0 {
                        self.low = true;
                    }
                    if rel == READ_LOW_US {
                        self.low = false;
                    }
                    if rel == READ_SAMPLE_US {
                        match kind {
                            ReadKind::Data => self.log.reads.push(others_high),
                            ReadKind::Search => {
                                self.log.search.push(others_high)
                            }
                        }
                    }
                    rel >= SLOT_US
                }
                Slot::Idle(us) => rel >= us,
            };
            if !done {
                return;
            }
            self.current = None;
        }
    }
}
