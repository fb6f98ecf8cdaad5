//! Load-balanced dispatcher
//!
//! Holds the problem catalogue and the node pool, assembles submissions into
//! judge requests, and forwards them to the least loaded reachable node.

pub mod client;
pub mod dispatcher;
pub mod problems;
pub mod registry;
pub mod server;

pub use client::{HttpNodeClient, NodeClient};
pub use dispatcher::{Dispatcher, RetryPolicy};
pub use problems::{Problem, ProblemStore};
pub use registry::{Node, Registry, RegistrySnapshot};
