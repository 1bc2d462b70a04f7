use derive_more::From;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonPress {
    Single,
    Double,
    Hold,
}

/// Requests for the key line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum KeyEvent {
    /// Read the key on the contact; falls back to a search when several
    /// keys answer at once.
    Read,
    /// Enumerate every key on the contact.
    ReadAll,
    /// Program the last read code into a blank.
    Write,
    /// Answer as the last read key(s).
    EmulateStart,
    EmulateStop,
}

#[derive(Debug, From)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    ButtonPress(ButtonPress),
    KeyEvent(KeyEvent),
}
