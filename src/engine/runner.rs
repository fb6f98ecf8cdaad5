//! Runner module - Executes compiled submissions
//!
//! The binary runs as a child process with its standard streams redirected to
//! the workspace files and with CPU-time and address-space ceilings applied in
//! the child before exec. Exceeding the CPU ceiling delivers SIGXCPU; running out
//! of address space typically ends in SIGABRT from the C++ runtime.
//!
//! The runner does NOT:
//! - Interpret terminations as verdicts
//! - Measure wall-clock time or kill on a timer

use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::Stdio;

use nix::sys::resource::{getrlimit, setrlimit, Resource};
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, info};

use super::workspace::Workspace;
use crate::error::RunError;

/// Resource ceilings for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunLimits {
    /// CPU time in seconds
    pub cpu_secs: u32,
    /// Address space in KB
    pub memory_kb: u64,
}

impl RunLimits {
    pub fn new(cpu_secs: u32, memory_kb: u64) -> Self {
        Self {
            cpu_secs,
            memory_kb,
        }
    }
}

/// How the child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited normally with the given exit code
    Exited(i32),
    /// Killed by the given signal
    Signaled(i32),
}

impl Termination {
    /// Collapse to the legacy integer: 0 for any normal exit, the signal number otherwise
    pub fn legacy_code(&self) -> i32 {
        match self {
            Termination::Exited(_) => 0,
            Termination::Signaled(sig) => *sig,
        }
    }
}

/// Runs workspace binaries under resource limits
#[derive(Debug, Clone, Default)]
pub struct Runner;

impl Runner {
    pub fn new() -> Self {
        Self
    }

    /// Run `ws.binary` with `stdin` as its input and wait for it to terminate
    pub async fn run(
        &self,
        ws: &Workspace,
        stdin: &str,
        limits: RunLimits,
    ) -> Result<Termination, RunError> {
        if fs::metadata(&ws.binary).await.is_err() {
            return Err(RunError::NoBinary(ws.binary.clone()));
        }

        fs::write(&ws.stdin, stdin)
            .await
            .map_err(|source| make_file_error(&ws.stdin, source))?;
        let stdin_file = open_stream(&ws.stdin, false).await?;
        let stdout_file = open_stream(&ws.stdout, true).await?;
        let stderr_file = open_stream(&ws.stderr, true).await?;

        let mut cmd = Command::new(&ws.binary);
        cmd.stdin(Stdio::from(stdin_file))
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true);

        let cpu_secs = limits.cpu_secs as u64;
        let memory_bytes = limits.memory_kb.saturating_mul(1024);
        // SAFETY: the closure only issues getrlimit/setrlimit, which are async-signal-safe.
        unsafe {
            cmd.pre_exec(move || {
                apply_limit(Resource::RLIMIT_CPU, cpu_secs)?;
                apply_limit(Resource::RLIMIT_AS, memory_bytes)?;
                Ok(())
            });
        }

        debug!(
            "Running {} with cpu={}s memory={}KB",
            ws.binary.display(),
            limits.cpu_secs,
            limits.memory_kb
        );

        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            path: ws.binary.clone(),
            source,
        })?;
        let status = child.wait().await.map_err(RunError::Wait)?;

        let termination = match (status.code(), status.signal()) {
            (_, Some(sig)) => Termination::Signaled(sig),
            (Some(code), None) => Termination::Exited(code),
            (None, None) => Termination::Exited(0),
        };

        info!("Run of {} finished: {:?}", ws.base_name, termination);
        Ok(termination)
    }
}

/// Lower the soft limit, leaving the hard limit where it is
fn apply_limit(resource: Resource, soft: u64) -> std::io::Result<()> {
    let (_, hard) = getrlimit(resource)?;
    setrlimit(resource, soft.min(hard), hard)?;
    Ok(())
}

async fn open_stream(path: &Path, create: bool) -> Result<std::fs::File, RunError> {
    let file = if create {
        fs::File::create(path).await
    } else {
        fs::File::open(path).await
    };
    let file = file.map_err(|source| make_file_error(path, source))?;
    Ok(file.into_std().await)
}

fn make_file_error(path: &Path, source: std::io::Error) -> RunError {
    RunError::MakeFile {
        path: path.to_path_buf(),
        source,
    }
}
