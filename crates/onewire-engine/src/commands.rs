//! Command bytes on the wire.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// ROM-level commands understood by every 1-Wire device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum RomCommand {
    /// `0x0F` is the legacy DS1990 opcode for the same thing.
    #[num_enum(alternatives = [0x0F])]
    ReadRom = 0x33,
    SearchRom = 0xF0,
    /// Search restricted to devices in alarm state.
    ConditionalSearch = 0xEC,
    SkipRom = 0xCC,
    MatchRom = 0x55,
}

pub const READ_ROM: u8 = RomCommand::ReadRom as u8;
pub const READ_ROM_LEGACY: u8 = 0x0F;
pub const SEARCH_ROM: u8 = RomCommand::SearchRom as u8;
pub const CONDITIONAL_SEARCH: u8 = RomCommand::ConditionalSearch as u8;
pub const SKIP_ROM: u8 = RomCommand::SkipRom as u8;
pub const MATCH_ROM: u8 = RomCommand::MatchRom as u8;

/// Rewritable blank opcodes.
pub mod blank {
    pub const RW1990_1_WRITE_RECORD_FLAG: u8 = 0xD1;
    pub const RW1990_1_WRITE_ROM: u8 = 0xD5;
    pub const RW1990_2_WRITE_RECORD_FLAG: u8 = 0x1D;
    pub const RW1990_2_WRITE_ROM: u8 = 0xD5;
    pub const TM2004_WRITE_ROM: u8 = 0x3C;
    pub const TM2004_FINALIZE: u8 = 0x35;
}
