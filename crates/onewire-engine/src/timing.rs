//! Microsecond windows for both ends of the bus.
//!
//! Standard speed is what every call path uses unless a [`Speed`] is passed
//! explicitly. The overdrive rows are carried for completeness.

/// Bus speed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Speed {
    #[default]
    Standard,
    Overdrive,
}

/// Timing used when this side drives the bus as master.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterTiming {
    /// Reset pulse: low time.
    pub reset_low: u32,
    /// Reset pulse: release time before presence is sampled.
    pub reset_release: u32,
    /// Reset pulse: remainder of the reset slot after sampling.
    pub reset_post: u32,
    pub write_one_low: u32,
    pub write_one_high: u32,
    pub write_zero_low: u32,
    pub write_zero_high: u32,
    pub read_low: u32,
    /// Release time before a read slot is sampled.
    pub read_release: u32,
    pub read_post: u32,
    /// Number of polls while waiting for the line to float high before a reset.
    pub reset_wait_polls: u32,
    /// Delay between those polls.
    pub reset_wait_step: u32,
}

impl MasterTiming {
    pub const STANDARD: Self = Self {
        reset_low: 480,
        reset_release: 70,
        reset_post: 410,
        write_one_low: 9,
        write_one_high: 64,
        write_zero_low: 64,
        write_zero_high: 14,
        read_low: 3,
        read_release: 9,
        read_post: 55,
        reset_wait_polls: 125,
        reset_wait_step: 2,
    };

    pub const OVERDRIVE: Self = Self {
        reset_low: 70,
        reset_release: 9,
        reset_post: 40,
        write_one_low: 1,
        write_one_high: 8,
        write_zero_low: 8,
        write_zero_high: 3,
        read_low: 1,
        read_release: 1,
        read_post: 7,
        reset_wait_polls: 125,
        reset_wait_step: 2,
    };

    pub const fn for_speed(speed: Speed) -> Self {
        match speed {
            Speed::Standard => Self::STANDARD,
            Speed::Overdrive => Self::OVERDRIVE,
        }
    }
}

impl Default for MasterTiming {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Timing used when this side answers the bus as an emulated key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveTiming {
    /// Shortest low pulse accepted as a reset (inclusive).
    pub reset_min: u32,
    /// Longest low pulse accepted as a reset (inclusive).
    pub reset_max: u32,
    /// Time the master waits before it looks for presence.
    pub presence_timeout: u32,
    pub presence_min: u32,
    pub presence_max: u32,
    /// Longest a bit slot may keep the line low.
    pub slot_max: u32,
    /// Longest the line may stay idle high inside a transaction.
    pub msg_high_timeout: u32,
    pub read_min: u32,
    pub read_max: u32,
    /// How long a zero is held when this side sends.
    pub write_zero: u32,
}

impl SlaveTiming {
    pub const STANDARD: Self = Self {
        reset_min: 270,
        reset_max: 960,
        presence_timeout: 20,
        presence_min: 100,
        presence_max: 480,
        slot_max: 135,
        msg_high_timeout: 15_000,
        read_min: 20,
        read_max: 60,
        write_zero: 30,
    };

    pub const OVERDRIVE: Self = Self {
        reset_min: 48,
        reset_max: 80,
        presence_timeout: 2,
        presence_min: 16,
        presence_max: 48,
        slot_max: 30,
        msg_high_timeout: 15_000,
        read_min: 4,
        read_max: 10,
        write_zero: 8,
    };

    pub const fn for_speed(speed: Speed) -> Self {
        match speed {
            Speed::Standard => Self::STANDARD,
            Speed::Overdrive => Self::OVERDRIVE,
        }
    }

    /// Extra low time tolerated after a bit slot overran into what looks
    /// like a reset, before that reset is taken as genuine.
    pub const fn reset_in_progress_window(&self) -> u32 {
        self.reset_min - self.slot_max - self.read_max
    }
}

impl Default for SlaveTiming {
    fn default() -> Self {
        Self::STANDARD
    }
}
