//! Dispatcher - load-balanced forwarding of judge requests
//!
//! Each dispatch picks the least loaded online node, brackets the forwarded
//! request with a load increment/decrement, demotes nodes that do not answer
//! and retries on the remaining pool. The loop is bounded by an attempt budget
//! and an overall deadline, and can be cancelled from outside.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::client::NodeClient;
use super::problems::ProblemStore;
use super::registry::{Node, Registry};
use crate::error::DispatchError;
use crate::protocol::{JudgeRequest, JudgeResponse};

/// Bounds on a single dispatch
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of node attempts
    pub max_attempts: u32,
    /// Overall time budget across all attempts
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 16,
            deadline: Duration::from_secs(120),
        }
    }
}

/// Holds one unit of load on a node until dropped
struct LoadTicket {
    node: Arc<Node>,
}

impl LoadTicket {
    fn acquire(node: Arc<Node>) -> Self {
        node.increase_load();
        Self { node }
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        self.node.decrease_load();
    }
}

pub struct Dispatcher {
    problems: Arc<ProblemStore>,
    registry: Arc<Registry>,
    client: Arc<dyn NodeClient>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        problems: Arc<ProblemStore>,
        registry: Arc<Registry>,
        client: Arc<dyn NodeClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            problems,
            registry,
            client,
            policy,
        }
    }

    pub fn problems(&self) -> &ProblemStore {
        &self.problems
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Judge `user_code` against a problem on whichever node can take it
    pub async fn dispatch(
        &self,
        problem_id: &str,
        user_code: &str,
        user_stdin: &str,
        cancel: &CancellationToken,
    ) -> Result<JudgeResponse, DispatchError> {
        let problem = self
            .problems
            .get(problem_id)
            .ok_or_else(|| DispatchError::ProblemNotFound(problem_id.to_string()))?;

        let req = JudgeRequest {
            code: problem.assemble(user_code),
            stdin: user_stdin.to_string(),
            cpu_limit_secs: problem.cpu_limit,
            memory_limit_kb: problem.memory_limit,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Dispatch of problem {} cancelled", problem_id);
                Err(DispatchError::Cancelled)
            }
            result = tokio::time::timeout(self.policy.deadline, self.forward(&req)) => {
                result.unwrap_or_else(|_| {
                    warn!("Dispatch of problem {} exceeded {:?}", problem_id, self.policy.deadline);
                    Err(DispatchError::DeadlineExceeded)
                })
            }
        }
    }

    /// Send a ready request to the pool until a node answers
    pub async fn forward(&self, req: &JudgeRequest) -> Result<JudgeResponse, DispatchError> {
        let max_attempts = self.policy.max_attempts.max(1);
        // Nodes that answered with an error are tried again only when no other node is left.
        let mut erroring: Vec<usize> = Vec::new();

        for attempt in 1..=max_attempts {
            let (index, node) = match self.registry.select_least_loaded_excluding(&erroring) {
                Some(selected) => selected,
                None => {
                    warn!("All judge nodes are offline");
                    return Err(DispatchError::Unavailable);
                }
            };

            let ticket = LoadTicket::acquire(node.clone());
            info!(
                "Selected node {} ({}) for attempt {}",
                index,
                node.address(),
                attempt
            );

            match self.client.compile_and_run(node.address(), req).await {
                Ok(response) => {
                    drop(ticket);
                    return Ok(response);
                }
                Err(e) if e.is_unreachable() => {
                    drop(ticket);
                    warn!("{}; trying another node", e);
                    self.registry.demote(index);
                    let snapshot = self.registry.snapshot();
                    info!(
                        "Online nodes: {:?}, offline nodes: {:?}",
                        snapshot.online, snapshot.offline
                    );
                }
                Err(e) => {
                    drop(ticket);
                    warn!("{}; retrying", e);
                    if !erroring.contains(&index) {
                        erroring.push(index);
                    }
                }
            }
        }

        Err(DispatchError::RetriesExhausted(max_attempts))
    }
}
