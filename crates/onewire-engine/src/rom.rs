use core::fmt;

use crate::crc::maxim_crc8;

/// Number of bytes in a ROM code.
pub const ROM_LEN: usize = 8;

/// 64-bit device identity: `[family, serial x6, crc8]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RomCode([u8; ROM_LEN]);

/// Why a byte slice is not a usable ROM code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RomError {
    /// Slice was not exactly eight bytes long.
    Length(usize),
    /// Byte 7 does not match the CRC-8 of bytes 0..7.
    Crc { expected: u8, found: u8 },
}

impl fmt::Display for RomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RomError::Length(n) => write!(f, "rom code must be 8 bytes, got {n}"),
            RomError::Crc { expected, found } => write!(
                f,
                "rom crc mismatch: expected {expected:#04x}, found {found:#04x}"
            ),
        }
    }
}

impl RomCode {
    /// Build a code from a family byte and six serial bytes; the CRC is computed.
    pub fn new(family: u8, serial: [u8; 6]) -> Self {
        let mut id = [0u8; 7];
        id[0] = family;
        id[1..].copy_from_slice(&serial);
        Self::from_id_bytes(&id)
    }

    /// Build a code from the seven leading bytes; the CRC is computed.
    pub fn from_id_bytes(id: &[u8; 7]) -> Self {
        let mut bytes = [0u8; ROM_LEN];
        bytes[..7].copy_from_slice(id);
        bytes[7] = maxim_crc8(id, 0);
        Self(bytes)
    }

    /// Take all eight bytes verbatim. The CRC is trusted, not checked.
    pub const fn from_raw(bytes: [u8; ROM_LEN]) -> Self {
        Self(bytes)
    }

    /// Overwrite all eight bytes verbatim.
    pub fn set_raw(&mut self, bytes: [u8; ROM_LEN]) {
        self.0 = bytes;
    }

    pub const fn as_bytes(&self) -> &[u8; ROM_LEN] {
        &self.0
    }

    pub const fn family(&self) -> u8 {
        self.0[0]
    }

    pub fn serial(&self) -> [u8; 6] {
        let mut serial = [0u8; 6];
        serial.copy_from_slice(&self.0[1..7]);
        serial
    }

    pub const fn crc(&self) -> u8 {
        self.0[7]
    }

    /// `true` when byte 7 is the CRC-8 of the other seven.
    pub fn is_valid(&self) -> bool {
        maxim_crc8(&self.0[..7], 0) == self.0[7]
    }

    /// Bit `index` (0..64) in bus order: byte-wise LSB first.
    #[inline]
    pub const fn bit(&self, index: u8) -> bool {
        (self.0[(index >> 3) as usize] >> (index & 7)) & 1 != 0
    }
}

impl From<[u8; ROM_LEN]> for RomCode {
    fn from(bytes: [u8; ROM_LEN]) -> Self {
        Self::from_raw(bytes)
    }
}

impl TryFrom<&[u8]> for RomCode {
    type Error = RomError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let raw: [u8; ROM_LEN] =
            bytes.try_into().map_err(|_| RomError::Length(bytes.len()))?;
        let rom = Self(raw);
        let expected = maxim_crc8(&raw[..7], 0);
        if expected != rom.crc() {
            return Err(RomError::Crc { expected, found: rom.crc() });
        }
        Ok(rom)
    }
}

impl fmt::Display for RomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        Ok(())
    }
}
