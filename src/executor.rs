//! Executor trait and execution error types.
//!
//! An executor turns program text into something runnable and runs it one
//! repetition at a time:
//!
//! ```text
//!   parse(source) ──→ Program ──→ run_once() × shots
//!      (sync)                     (sync, blocking pool)
//! ```
//!
//! ## Design principles
//!
//! - **Pure**: executors hold no per-job state. A parsed [`Program`] may be run
//!   any number of times.
//! - **Thread-safe**: `Send + Sync` bounds let one executor serve every job.
//! - **Blocking**: both methods are synchronous. Callers are responsible for
//!   running shots off the async executor threads.
//! - **Checked repetitions**: a repetition reports every outcome it observed,
//!   and [`execute_shots`] rejects any repetition that did not observe exactly
//!   one.

use thiserror::Error;

/// Errors produced while parsing or running a program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExecError {
    /// Program text is malformed or fails validation.
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Program text failed validation outside any particular line.
    #[error("{0}")]
    Invalid(String),

    /// A repetition failed while running.
    #[error("{0}")]
    Execution(String),

    /// A repetition observed a number of outcomes other than one.
    #[error("expected exactly one outcome per shot, got {0}")]
    UnexpectedOutcome(usize),
}

impl ExecError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Returns `true` if the error was raised before any repetition ran.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Invalid(_))
    }
}

/// Result type for executor operations.
pub type ExecResult<T> = Result<T, ExecError>;

/// Most result slots reserved before the first repetition runs.
const RESERVE_SHOTS: u32 = 4096;

/// A validated program, ready to run.
pub trait Program: Send + Sync {
    /// Run one repetition and return the outcomes it observed.
    ///
    /// A well-behaved program returns exactly one outcome.
    fn run_once(&self) -> ExecResult<Vec<String>>;
}

/// Trait for circuit executors.
pub trait Executor: Send + Sync {
    /// Name of this executor, used in logs.
    fn name(&self) -> &str;

    /// Parse and validate program text.
    fn parse(&self, source: &str) -> ExecResult<Box<dyn Program>>;
}

/// Run `program` for `shots` repetitions and collect one outcome per shot,
/// in repetition order.
///
/// The first failing repetition aborts the whole run. No partial results are
/// returned.
pub fn execute_shots(program: &dyn Program, shots: u32) -> ExecResult<Vec<String>> {
    let mut results = Vec::with_capacity(shots.min(RESERVE_SHOTS) as usize);
    for _ in 0..shots {
        let mut outcomes = program.run_once()?;
        if outcomes.len() != 1 {
            return Err(ExecError::UnexpectedOutcome(outcomes.len()));
        }
        results.append(&mut outcomes);
    }
    Ok(results)
}
