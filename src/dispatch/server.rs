//! Dispatcher HTTP surface
//!
//! User routes:
//! - `GET /problems`
//! - `GET /problems/{id}`
//! - `POST /judge/{id}`
//!
//! Admin routes:
//! - `GET /nodes`
//! - `POST /nodes/{index}/readmit`

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::dispatcher::Dispatcher;
use super::problems::{ProblemDetail, ProblemSummary};
use crate::error::DispatchError;
use crate::protocol::{JudgeResponse, SubmitRequest};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
}

/// Node state as shown to operators
#[derive(Debug, Serialize)]
struct NodeStatus {
    index: usize,
    address: String,
    online: bool,
    load: u64,
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::ProblemNotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::RetriesExhausted(_) | DispatchError::DeadlineExceeded => {
                StatusCode::GATEWAY_TIMEOUT
            }
            DispatchError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// `shutdown` cancels in-flight dispatches when the server stops
pub fn router(dispatcher: Arc<Dispatcher>, shutdown: CancellationToken) -> Router {
    Router::new()
        .route("/problems", get(list_problems))
        .route("/problems/{id}", get(get_problem))
        .route("/judge/{id}", post(judge))
        .route("/nodes", get(list_nodes))
        .route("/nodes/{index}/readmit", post(readmit_node))
        .with_state(AppState {
            dispatcher,
            shutdown,
        })
}

/// Serve until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Dispatcher listening on {}", listener.local_addr()?);
    let app = router(dispatcher, shutdown.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

async fn list_problems(State(state): State<AppState>) -> Json<Vec<ProblemSummary>> {
    let problems = state.dispatcher.problems().all();
    Json(problems.into_iter().map(|p| p.summary()).collect())
}

async fn get_problem(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProblemDetail>, DispatchError> {
    state
        .dispatcher
        .problems()
        .get(&id)
        .map(|p| Json(p.detail()))
        .ok_or(DispatchError::ProblemNotFound(id))
}

/// POST /judge/{id}
/// JSON: SubmitRequest => JudgeResponse
async fn judge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(submit): Json<SubmitRequest>,
) -> Result<Json<JudgeResponse>, DispatchError> {
    let cancel = state.shutdown.child_token();
    let response = state
        .dispatcher
        .dispatch(&id, &submit.code, &submit.input, &cancel)
        .await
        .inspect_err(|e| warn!("Submission for problem {} failed: {}", id, e))?;
    Ok(Json(response))
}

async fn list_nodes(State(state): State<AppState>) -> Json<Vec<NodeStatus>> {
    let registry = state.dispatcher.registry();
    let snapshot = registry.snapshot();
    let nodes = snapshot
        .loads
        .iter()
        .enumerate()
        .filter_map(|(index, &load)| {
            registry.node(index).map(|node| NodeStatus {
                index,
                address: node.address().to_string(),
                online: snapshot.online.contains(&index),
                load,
            })
        })
        .collect();
    Json(nodes)
}

async fn readmit_node(State(state): State<AppState>, Path(index): Path<usize>) -> StatusCode {
    if state.dispatcher.registry().readmit(index) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::CONFLICT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::client::NodeClient;
    use crate::dispatch::dispatcher::RetryPolicy;
    use crate::dispatch::problems::{Problem, ProblemStore};
    use crate::dispatch::registry::Registry;
    use crate::error::TransportError;
    use crate::protocol::JudgeRequest;
    use async_trait::async_trait;
    use serde_json::Value;

    struct EchoClient;

    #[async_trait]
    impl NodeClient for EchoClient {
        async fn compile_and_run(
            &self,
            address: &str,
            req: &JudgeRequest,
        ) -> Result<JudgeResponse, TransportError> {
            if address == "down:1" {
                return Err(TransportError::Unreachable {
                    address: address.to_string(),
                    message: "connection refused".into(),
                });
            }
            Ok(JudgeResponse {
                status_code: 0,
                reason: "compiled and ran successfully".into(),
                stdout: req.stdin.clone(),
                stderr: String::new(),
            })
        }
    }

    fn problem(id: &str) -> Problem {
        Problem {
            id: id.into(),
            title: format!("P{}", id),
            difficulty: "easy".into(),
            cpu_limit: 1,
            memory_limit: 30000,
            description: "desc\n".into(),
            code_skeleton: "class Solution {};\n".into(),
            judge_harness: "int main() {}\n".into(),
        }
    }

    async fn spawn_server(nodes: &[&str]) -> (String, CancellationToken) {
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(ProblemStore::new([problem("10"), problem("2")])),
            Arc::new(Registry::new(nodes.iter().copied())),
            Arc::new(EchoClient),
            RetryPolicy::default(),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let shutdown = CancellationToken::new();
        tokio::spawn(serve(listener, dispatcher, shutdown.clone()));
        (base, shutdown)
    }

    #[tokio::test]
    async fn test_list_and_get_problems() {
        let (base, shutdown) = spawn_server(&["up:1"]).await;
        let client = reqwest::Client::new();

        let list: Value = client
            .get(format!("{}/problems", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ids: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["2", "10"]);

        let detail: Value = client
            .get(format!("{}/problems/2", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(detail["title"], "P2");
        assert_eq!(detail["code_skeleton"], "class Solution {};\n");
        assert!(detail.get("judge_harness").is_none());

        let missing = client
            .get(format!("{}/problems/99", base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_judge_route() {
        let (base, shutdown) = spawn_server(&["up:1"]).await;
        let client = reqwest::Client::new();

        let resp: Value = client
            .post(format!("{}/judge/2", base))
            .json(&json!({ "Code": "class Solution {};", "Input": "abc" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(resp["Status"], 0);
        assert_eq!(resp["Stdout"], "abc");

        let missing = client
            .post(format!("{}/judge/99", base))
            .json(&json!({ "Code": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_pool_exhausted_is_503_and_readmit() {
        let (base, shutdown) = spawn_server(&["down:1"]).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/judge/2", base))
            .json(&json!({ "Code": "x" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

        let nodes: Value = client
            .get(format!("{}/nodes", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(nodes[0]["address"], "down:1");
        assert_eq!(nodes[0]["online"], false);

        let readmit = client
            .post(format!("{}/nodes/0/readmit", base))
            .send()
            .await
            .unwrap();
        assert_eq!(readmit.status(), reqwest::StatusCode::NO_CONTENT);

        let again = client
            .post(format!("{}/nodes/0/readmit", base))
            .send()
            .await
            .unwrap();
        assert_eq!(again.status(), reqwest::StatusCode::CONFLICT);

        shutdown.cancel();
    }
}
