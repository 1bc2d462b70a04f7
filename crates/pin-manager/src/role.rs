use core::fmt;

/// What a lease holder does with the key line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    /// Bus master reading keys.
    Reader,
    /// Edge-driven single-key emulation.
    Emulator,
    /// Polling multi-key emulation.
    Hub,
    /// Bus master programming blanks.
    Writer,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Reader => "reader",
            Role::Emulator => "emulator",
            Role::Hub => "hub",
            Role::Writer => "writer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
