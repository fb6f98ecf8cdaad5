//! Error types for the judge engine and the dispatcher

use std::path::PathBuf;

use thiserror::Error;

/// Failures inside a judging cycle that are not attributable to the submission
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn toolchain `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of the process runner before or while waiting on the child
#[derive(Debug, Error)]
pub enum RunError {
    #[error("no binary at {0}")]
    NoBinary(PathBuf),
    #[error("failed to create stream file {path}: {source}")]
    MakeFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to spawn {path}: {source}")]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for child: {0}")]
    Wait(#[source] std::io::Error),
}

/// Failures talking to a single judge node
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response at all: connection refused, reset, or timed out
    #[error("node {address} unreachable: {message}")]
    Unreachable { address: String, message: String },
    /// Node answered with a non-success HTTP status
    #[error("node {address} rejected request with status {status}")]
    Rejected { address: String, status: u16 },
    /// Node answered 2xx but the body is not a judge response
    #[error("node {address} sent a malformed response: {message}")]
    Malformed { address: String, message: String },
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, TransportError::Unreachable { .. })
    }
}

/// Failures of a dispatch as seen by the user-facing surface
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("problem {0} not found")]
    ProblemNotFound(String),
    #[error("all judge nodes are offline")]
    Unavailable,
    #[error("gave up after {0} attempts")]
    RetriesExhausted(u32),
    #[error("dispatch deadline exceeded")]
    DeadlineExceeded,
    #[error("dispatch cancelled")]
    Cancelled,
}
