//! Sandboxed execution engine
//!
//! A judge node turns a self-contained [`JudgeRequest`](crate::protocol::JudgeRequest)
//! into a [`JudgeResponse`](crate::protocol::JudgeResponse):
//! - `workspace`: unique temporary files per cycle and their cleanup
//! - `compiler`: toolchain invocation
//! - `runner`: resource-limited child process execution
//! - `verdict`: status taxonomy and reasons
//! - `judge`: the cycle itself
//! - `server`: the node's HTTP endpoint

pub mod compiler;
pub mod judge;
pub mod runner;
pub mod server;
pub mod verdict;
pub mod workspace;

pub use compiler::Compiler;
pub use judge::Judge;
pub use runner::{RunLimits, Runner, Termination};
pub use verdict::Verdict;
pub use workspace::{NameSequence, Workspace, WorkspaceManager};
