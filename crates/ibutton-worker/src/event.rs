use onewire_engine::WriteOutcome;

/// Completion notice passed to the worker callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkerEvent {
    /// A read finished; `true` if a valid code was obtained.
    ReadDone(bool),
    WriteDone(WriteOutcome),
    /// An emulated transaction was served.
    Emulated(bool),
}

/// Plain function pointer so it can be called from interrupt context.
pub type WorkerCallback = fn(WorkerEvent);
