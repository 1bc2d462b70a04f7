use onewire_engine::Speed;

/// Run-time knobs of a [`KeyWorker`](crate::KeyWorker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WorkerConfig {
    /// Bus speed for every role.
    pub speed: Speed,
    /// Read-ROM attempts before a read gives up.
    pub read_attempts: u8,
    /// Upper bound on hub transactions served per
    /// [`HubEmulation::poll`](crate::HubEmulation::poll).
    pub hub_poll_rounds: u8,
}

impl WorkerConfig {
    pub const DEFAULT: Self =
        Self { speed: Speed::Standard, read_attempts: 3, hub_poll_rounds: 4 };
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
