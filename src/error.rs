use std::fmt;

/// Error taxonomy for the trainer, evaluator and agent.
///
/// Configuration and I/O errors are meant to be reported and abort the
/// process at the entry point; invariant violations are fatal mid tree-walk.
#[derive(Debug)]
pub enum TrainerError {
    /// Unknown algorithm, negative/zero iteration count, missing strategy path.
    Config(String),
    /// Strategy file missing, unreadable, or malformed.
    Io(String),
    /// A loaded profile lacks a key the agent/trainer encountered, or its
    /// action count is incompatible with the current game.
    ProfileMismatch(String),
    /// External/outcome sampling invoked with a fixed opponent, a NodeTable
    /// key reused with a mismatched action count, or any other condition the
    /// algorithm cannot continue meaningfully through.
    InvariantViolation(String),
}

impl fmt::Display for TrainerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerError::Config(msg) => write!(f, "config error: {msg}"),
            TrainerError::Io(msg) => write!(f, "io error: {msg}"),
            TrainerError::ProfileMismatch(msg) => write!(f, "profile mismatch: {msg}"),
            TrainerError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
        }
    }
}

impl std::error::Error for TrainerError {}

impl From<std::io::Error> for TrainerError {
    fn from(e: std::io::Error) -> Self {
        TrainerError::Io(e.to_string())
    }
}

impl From<bincode::Error> for TrainerError {
    fn from(e: bincode::Error) -> Self {
        TrainerError::Io(e.to_string())
    }
}
