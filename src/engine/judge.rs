//! Judging orchestrator
//!
//! One request, one sequential cycle: materialize, compile, run, classify,
//! collect output, clean up. Every failure becomes a [`JudgeResponse`]; nothing
//! escapes `judge`, and the workspace is removed on every path.

use tracing::{error, info};

use super::compiler::Compiler;
use super::runner::{RunLimits, Runner};
use super::verdict::Verdict;
use super::workspace::{read_lines_kept, Workspace, WorkspaceManager};
use crate::protocol::{JudgeRequest, JudgeResponse};

/// Compile-and-run service of a judge node
#[derive(Clone)]
pub struct Judge {
    workspaces: WorkspaceManager,
    compiler: Compiler,
    runner: Runner,
}

impl Judge {
    pub fn new(workspaces: WorkspaceManager, compiler: Compiler, runner: Runner) -> Self {
        Self {
            workspaces,
            compiler,
            runner,
        }
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Judge one request. The workspace files are gone once this returns or
    /// once the future is dropped.
    pub async fn judge(&self, req: &JudgeRequest) -> JudgeResponse {
        let ws = self.workspaces.new_workspace();
        self.judge_in(&ws, req).await
    }

    async fn judge_in(&self, ws: &Workspace, req: &JudgeRequest) -> JudgeResponse {
        let verdict = self.classify(ws, req).await;
        info!(
            "Judged {}: status={} ({})",
            ws.base_name,
            verdict.status_code(),
            verdict
        );

        let stdout = read_lines_kept(&ws.stdout).await;
        let stderr = read_lines_kept(&ws.stderr).await;

        JudgeResponse {
            status_code: verdict.status_code(),
            reason: verdict.to_string(),
            stdout,
            stderr,
        }
    }

    async fn classify(&self, ws: &Workspace, req: &JudgeRequest) -> Verdict {
        if req.code.is_empty() {
            return Verdict::CodeEmpty;
        }

        if let Err(e) = self.workspaces.materialize_source(ws, &req.code).await {
            error!("Failed to materialize source for {}: {}", ws.base_name, e);
            return Verdict::UnknownError;
        }

        if !self.compiler.compile(ws).await {
            return Verdict::CompileError(read_lines_kept(&ws.compile_error).await);
        }

        let limits = RunLimits::new(req.cpu_limit_secs, req.memory_limit_kb);
        match self.runner.run(ws, &req.stdin, limits).await {
            Ok(termination) => Verdict::from_termination(termination),
            Err(e) => {
                error!("Run of {} could not start: {}", ws.base_name, e);
                Verdict::UnknownError
            }
        }
    }
}
