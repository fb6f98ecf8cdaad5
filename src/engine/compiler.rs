//! Compiler module - Source code compilation
//!
//! Runs the configured toolchain on a workspace's source file. The compiler's
//! standard error lands in the workspace diagnostic file. Success is judged by
//! the binary existing afterwards, not by the toolchain's exit code.

use std::process::Stdio;

use tokio::fs;
use tokio::process::Command;
use tracing::{debug, error, info};

use super::workspace::Workspace;
use crate::error::EngineError;
use crate::toolchain::Toolchain;

/// Compiles workspaces with a single toolchain
#[derive(Debug, Clone)]
pub struct Compiler {
    toolchain: Toolchain,
}

impl Compiler {
    pub fn new(toolchain: Toolchain) -> Self {
        Self { toolchain }
    }

    /// Compile `ws.source` into `ws.binary`, returning whether a binary was produced
    pub async fn compile(&self, ws: &Workspace) -> bool {
        if let Err(e) = self.invoke(ws).await {
            error!("Compilation of {} did not run: {}", ws.base_name, e);
            return false;
        }

        if fs::metadata(&ws.binary).await.is_err() {
            info!("No binary produced for {}", ws.base_name);
            return false;
        }

        info!("Compiled {} -> {}", ws.base_name, ws.binary.display());
        true
    }

    async fn invoke(&self, ws: &Workspace) -> Result<(), EngineError> {
        let command = self.toolchain.command_for(&ws.source, &ws.binary);
        let (program, args) = match command.split_first() {
            Some(split) => split,
            None => {
                return Err(EngineError::Spawn {
                    program: String::new(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
                })
            }
        };

        let diagnostic = fs::File::create(&ws.compile_error)
            .await
            .map_err(|source| EngineError::Io {
                path: ws.compile_error.clone(),
                source,
            })?
            .into_std()
            .await;

        debug!("Compiling with {:?}", command);

        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(diagnostic))
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| EngineError::Spawn {
                program: program.clone(),
                source,
            })?;

        debug!("Toolchain exited with {}", status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::workspace::{read_lines_kept, NameSequence, WorkspaceManager};
    use std::sync::Arc;

    fn manager(dir: &tempfile::TempDir) -> WorkspaceManager {
        WorkspaceManager::new(dir.path(), Arc::new(NameSequence::new()))
    }

    #[tokio::test]
    async fn test_compile_success_when_binary_appears() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let ws = manager.new_workspace();
        manager.materialize_source(&ws, "#!/bin/sh\necho hi\n").await.unwrap();

        let compiler = Compiler::new(Toolchain::new(["install", "-m", "755", "{source}", "{binary}"]));
        assert!(compiler.compile(&ws).await);
        assert!(ws.binary.exists());
        assert!(ws.compile_error.exists());
    }

    #[tokio::test]
    async fn test_compile_failure_keeps_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let ws = manager.new_workspace();
        manager.materialize_source(&ws, "garbage").await.unwrap();

        let compiler = Compiler::new(Toolchain::new([
            "sh",
            "-c",
            "echo 'error: expected ; before }' >&2; exit 1",
        ]));
        assert!(!compiler.compile(&ws).await);
        assert!(!ws.binary.exists());
        assert_eq!(
            read_lines_kept(&ws.compile_error).await,
            "error: expected ; before }\n"
        );
    }

    #[tokio::test]
    async fn test_exit_code_ignored_when_binary_exists() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let ws = manager.new_workspace();
        manager.materialize_source(&ws, "x").await.unwrap();

        let script = format!("touch {}; exit 3", ws.binary.display());
        let compiler = Compiler::new(Toolchain::new(["sh".to_string(), "-c".to_string(), script]));
        assert!(compiler.compile(&ws).await);
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let ws = manager.new_workspace();
        manager.materialize_source(&ws, "x").await.unwrap();

        let compiler = Compiler::new(Toolchain::new(["/nonexistent/toolchain", "{source}"]));
        assert!(!compiler.compile(&ws).await);
    }

    #[tokio::test]
    async fn test_unwritable_diagnostic_is_failure() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager(&dir);
        let ws = manager.new_workspace();
        manager.materialize_source(&ws, "x").await.unwrap();
        fs::create_dir(&ws.compile_error).await.unwrap();

        let compiler = Compiler::new(Toolchain::new(["install", "-m", "755", "{source}", "{binary}"]));
        assert!(!compiler.compile(&ws).await);
        assert!(!ws.binary.exists());
        fs::remove_dir(&ws.compile_error).await.unwrap();
    }
}
