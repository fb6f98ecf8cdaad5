//! Judge node HTTP surface

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::judge::Judge;
use crate::protocol::{JudgeRequest, JudgeResponse};

pub const COMPILE_AND_RUN_PATH: &str = "/CompileAndRun";

pub fn router(judge: Arc<Judge>) -> Router {
    Router::new()
        .route(COMPILE_AND_RUN_PATH, post(compile_and_run))
        .with_state(judge)
}

/// Serve the node router until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    judge: Arc<Judge>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    info!("Judge node listening on {}", listener.local_addr()?);
    axum::serve(listener, router(judge))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}

/// POST /CompileAndRun
/// JSON: JudgeRequest => JudgeResponse
async fn compile_and_run(
    State(judge): State<Arc<Judge>>,
    Json(req): Json<JudgeRequest>,
) -> Json<JudgeResponse> {
    debug!(
        "Received judge request: {} bytes of code, cpu={}s, memory={}KB",
        req.code.len(),
        req.cpu_limit_secs,
        req.memory_limit_kb
    );
    Json(judge.judge(&req).await)
}
