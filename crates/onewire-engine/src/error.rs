use core::fmt;

/// Failure recorded by a protocol operation.
///
/// Operations report plain success/failure; the reason is kept on the role
/// and read back through `last_error()`. It is cleared when the next
/// transaction starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OneWireError {
    ReadTimeslotTimeout,
    WriteTimeslotTimeout,
    WaitResetTimeout,
    VeryLongReset,
    VeryShortReset,
    PresenceLowOnLine,
    AwaitTimeslotTimeoutHigh,
    IncorrectOnewireCmd,
    IncorrectSlaveUsage,
    TriedIncorrectWrite,
    FirstBitOfByteTimeout,
    ResetInProgress,
}

impl OneWireError {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OneWireError::ReadTimeslotTimeout => "read timeslot timeout",
            OneWireError::WriteTimeslotTimeout => "write timeslot timeout",
            OneWireError::WaitResetTimeout => "wait reset timeout",
            OneWireError::VeryLongReset => "very long reset",
            OneWireError::VeryShortReset => "very short reset",
            OneWireError::PresenceLowOnLine => "presence low on line",
            OneWireError::AwaitTimeslotTimeoutHigh => {
                "await timeslot timeout high"
            }
            OneWireError::IncorrectOnewireCmd => "incorrect onewire command",
            OneWireError::IncorrectSlaveUsage => "incorrect slave usage",
            OneWireError::TriedIncorrectWrite => "tried incorrect write",
            OneWireError::FirstBitOfByteTimeout => "first bit of byte timeout",
            OneWireError::ResetInProgress => "reset in progress",
        }
    }
}

impl fmt::Display for OneWireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable form of a recorded error, `"no error"` for `None`.
pub fn decode_error(error: Option<OneWireError>) -> &'static str {
    error.map_or("no error", |e| e.as_str())
}
