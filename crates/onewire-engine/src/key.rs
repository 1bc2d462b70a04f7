use core::fmt;

/// Key families the device handles. Only Dallas keys use 1-Wire; the
/// others are listed so callers can be told that up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyType {
    Dallas,
    Cyfral,
    Metakom,
}

impl KeyType {
    /// Number of data bytes a key of this type carries.
    pub const fn data_size(self) -> usize {
        match self {
            KeyType::Dallas => 8,
            KeyType::Cyfral => 2,
            KeyType::Metakom => 4,
        }
    }

    pub const fn is_onewire(self) -> bool {
        matches!(self, KeyType::Dallas)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KeyType::Dallas => "Dallas",
            KeyType::Cyfral => "Cyfral",
            KeyType::Metakom => "Metakom",
        })
    }
}
