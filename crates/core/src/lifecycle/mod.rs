//! Uniform lifecycle control over external subprocesses and sessions.
//!
//! - [`ProcessHandle`]: start a command, consume its merged output
//!   incrementally, terminate it idempotently with a bounded grace period.
//! - [`Stoppable`]: anything external that must be torn down on cancel
//!   (processes, headless browser sessions).
//! - [`CancelHandle`]: the per-task cancellation token. A flag plus one
//!   registered stoppable resource; cancelling tears the resource down
//!   immediately instead of waiting for the next flag check.

mod cancel;
mod process;

pub use cancel::{CancelHandle, ResourceGuard, Stoppable};
pub use process::{
    run_captured, CapturedOutput, CommandSpec, ExitInfo, ProcessError, ProcessHandle,
    ProcessOutput, DEFAULT_KILL_GRACE,
};
