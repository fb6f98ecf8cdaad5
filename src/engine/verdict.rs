//! Verdict taxonomy - status codes and the reason text sent back with them

use std::fmt;

use nix::sys::signal::Signal;

use super::runner::Termination;

/// Submitted code was empty
pub const CODE_EMPTY: i32 = -1;
/// Internal failure before the program could run
pub const UNKNOWN_ERROR: i32 = -2;
/// Toolchain produced no binary
pub const COMPILE_ERROR: i32 = -3;
/// Program ran and exited normally
pub const SUCCESS: i32 = 0;

/// Outcome of a judge cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Success,
    CodeEmpty,
    UnknownError,
    /// Carries the compiler diagnostic text
    CompileError(String),
    /// Program was killed by the given signal
    Signaled(i32),
}

impl Verdict {
    pub fn from_termination(termination: Termination) -> Self {
        match termination.legacy_code() {
            SUCCESS => Verdict::Success,
            sig => Verdict::Signaled(sig),
        }
    }

    /// Integer status on the wire
    pub fn status_code(&self) -> i32 {
        match self {
            Verdict::Success => SUCCESS,
            Verdict::CodeEmpty => CODE_EMPTY,
            Verdict::UnknownError => UNKNOWN_ERROR,
            Verdict::CompileError(_) => COMPILE_ERROR,
            Verdict::Signaled(sig) => *sig,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Success => write!(f, "compiled and ran successfully"),
            Verdict::CodeEmpty => write!(f, "submitted code is empty"),
            Verdict::UnknownError => write!(f, "unknown error"),
            Verdict::CompileError(diagnostic) => write!(f, "compile error:\n{}", diagnostic),
            Verdict::Signaled(sig) => match Signal::try_from(*sig) {
                Ok(Signal::SIGABRT) => write!(f, "memory limit exceeded"),
                Ok(Signal::SIGXCPU) => write!(f, "time limit exceeded"),
                Ok(Signal::SIGFPE) => write!(f, "floating point error"),
                _ => write!(f, "runtime error code {}", sig),
            },
        }
    }
}
