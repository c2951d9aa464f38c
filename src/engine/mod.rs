//! 断点驱动的命令调度引擎

pub mod classify;
pub mod copier;
pub mod dispatcher;
pub mod host;
pub mod instruction;
pub mod policy;

#[cfg(test)]
pub(crate) mod testing;

pub use classify::{BreakpointCommand, BreakpointKind, classify};
pub use copier::{AbortReason, CopyJob, CopyOutcome};
pub use dispatcher::{
    DispatchState, Dispatcher, EngineError, Session, SessionReport, Termination,
};
pub use host::{Host, HostError, PidHost};
pub use instruction::{extract_immediate, fetch_instruction_word};
pub use policy::{AllocationMode, DispatchPolicy, StreakReset, TerminationMode};
