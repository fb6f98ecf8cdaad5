//! Workspace management
//!
//! Every judge cycle owns a set of uniquely named files under the workspace root.
//! Names come from a [`NameSequence`] injected into the [`WorkspaceManager`], so
//! concurrent cycles never collide and tests can pin the generated names.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs;
use tracing::{debug, warn};

use crate::error::EngineError;

type Clock = Box<dyn Fn() -> u128 + Send + Sync>;

/// Process-scoped generator of unique base names (`<millis>_<counter>`)
pub struct NameSequence {
    counter: AtomicU64,
    clock: Clock,
}

impl NameSequence {
    /// Sequence backed by the system clock
    pub fn new() -> Self {
        Self::with_clock(|| {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default()
        })
    }

    /// Sequence backed by a caller-provided millisecond clock
    pub fn with_clock(clock: impl Fn() -> u128 + Send + Sync + 'static) -> Self {
        Self {
            counter: AtomicU64::new(0),
            clock: Box::new(clock),
        }
    }

    pub fn next_name(&self) -> String {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}_{}", (self.clock)(), id)
    }
}

impl Default for NameSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Paths of all files backing one judge cycle.
///
/// Dropping the workspace removes its files, so an abandoned cycle leaves
/// nothing behind under the root.
#[derive(Debug)]
pub struct Workspace {
    pub base_name: String,
    pub source: PathBuf,
    pub binary: PathBuf,
    pub stdin: PathBuf,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub compile_error: PathBuf,
}

impl Workspace {
    fn new(root: &Path, base_name: String) -> Self {
        let path = |suffix: &str| root.join(format!("{}{}", base_name, suffix));
        Self {
            source: path(".cpp"),
            binary: path(".exe"),
            stdin: path(".stdin"),
            stdout: path(".stdout"),
            stderr: path(".stderr"),
            compile_error: path(".compile_error"),
            base_name,
        }
    }

    /// All files a cycle may create, in no particular order
    pub fn files(&self) -> [&Path; 6] {
        [
            &self.source,
            &self.binary,
            &self.stdin,
            &self.stdout,
            &self.stderr,
            &self.compile_error,
        ]
    }

    /// Remove every file of the workspace that exists; safe to repeat
    pub fn cleanup(&self) {
        for path in self.files() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }
        debug!("Cleaned up workspace {}", self.base_name);
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Allocates workspaces under a root directory and tears them down
#[derive(Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    sequence: Arc<NameSequence>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, sequence: Arc<NameSequence>) -> Self {
        Self {
            root: root.into(),
            sequence,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the workspace root if it does not exist yet
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    /// Allocate a fresh workspace; nothing is touched on disk
    pub fn new_workspace(&self) -> Workspace {
        Workspace::new(&self.root, self.sequence.next_name())
    }

    /// Write the submission source into the workspace
    pub async fn materialize_source(&self, ws: &Workspace, code: &str) -> Result<(), EngineError> {
        fs::write(&ws.source, code)
            .await
            .map_err(|source| EngineError::Io {
                path: ws.source.clone(),
                source,
            })
    }
}

/// Read a captured text file, re-terminating every line with `\n`.
/// A missing file reads as empty.
pub async fn read_lines_kept(path: &Path) -> String {
    let content = match fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => return String::new(),
    };

    let mut out = String::with_capacity(content.len() + 1);
    for line in content.lines() {
        out.push_str(line);
        out.push('\n');
    }
    out
}
