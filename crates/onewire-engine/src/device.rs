use embedded_hal::digital::{InputPin, OutputPin};

use crate::clock::CycleClock;
use crate::rom::RomCode;
use crate::slave::SlaveLink;

/// A key the slave roles can impersonate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EmulatedKey {
    /// DS1990A serial number button: ROM only, no function commands.
    Ds1990(RomCode),
}

impl EmulatedKey {
    pub fn rom(&self) -> &RomCode {
        match self {
            EmulatedKey::Ds1990(rom) => rom,
        }
    }

    /// Serve a function command once this key has been addressed.
    ///
    /// Returns `false` when the key does not implement `cmd`.
    pub fn handle_command<P, C>(
        &self,
        _link: &mut SlaveLink<P, C>,
        cmd: u8,
    ) -> bool
    where
        P: InputPin + OutputPin,
        C: CycleClock,
    {
        match self {
            EmulatedKey::Ds1990(_) => {
                debug!("ds1990 has no function command {=u8:#x}", cmd);
                false
            }
        }
    }
}

impl From<RomCode> for EmulatedKey {
    fn from(rom: RomCode) -> Self {
        EmulatedKey::Ds1990(rom)
    }
}
