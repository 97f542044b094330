//! Error taxonomy of the engine.
//!
//! Everything is surfaced synchronously at the violating call site and
//! nothing is retried. [`Signal`] variants are internal control
//! transfers (loop break, skipped block) that the owning construct
//! must absorb before returning to its caller; a signal escaping a
//! run is an engine defect, not a legitimate outcome.

use thiserror::Error;

/// Local control-transfer raised inside a construct body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Early loop exit. Carries the block terminators of conditionals
    /// the signal unwound through, emitted by the loop that absorbs it.
    Break(Vec<String>),
    /// Skip the rest of the enclosing block (false branch, dead case).
    SkipBlock,
}

/// Errors raised by the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The output sink is already redirected.
    #[error("sink is busy: already redirected")]
    SinkBusy,

    /// A name was registered twice.
    #[error("duplicate name: \"{0}\"")]
    DuplicateName(String),

    /// An operand or assigned value had the wrong primitive kind.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A control-flow or loop construct was sequenced illegally.
    #[error("ordering error: {0}")]
    OrderingError(String),

    /// A stack frame exceeded its configured depth or capacity. Fatal.
    #[error("stack overflow: {0}")]
    StackOverflow(String),

    /// A frame was popped with no frame open. Fatal.
    #[error("stack underflow: no open frame")]
    StackUnderflow,

    /// Internal control transfer; absorbed by the owning construct.
    #[error("uncaught control signal")]
    Signal(Signal),
}

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;
