//! Process configuration
//!
//! Every setting can be given as a CLI flag or as an environment variable
//! (`.env` files are loaded first by `main`). Unset values fall back to the
//! defaults below.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use tracing::info;

use crate::dispatch::RetryPolicy;
use crate::toolchain::Toolchain;

/// Judge node settings
#[derive(Debug, Clone, Args)]
pub struct NodeConfig {
    /// Interface to bind
    #[arg(long, env = "NODE_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[arg(long, env = "NODE_PORT", default_value_t = 8081)]
    pub port: u16,
    /// Directory holding per-cycle temporary files
    #[arg(long = "workspace", env = "WORKSPACE_DIR", default_value = "./temp")]
    pub workspace_dir: PathBuf,
    /// Toolchain TOML file; the built-in g++ toolchain is used when unset
    #[arg(long = "toolchain", env = "TOOLCHAIN_CONFIG")]
    pub toolchain_config: Option<PathBuf>,
}

impl NodeConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_bind_addr(&self.host, self.port)
    }

    pub fn toolchain(&self) -> anyhow::Result<Toolchain> {
        match &self.toolchain_config {
            Some(path) => {
                let toolchain = Toolchain::load(path)?;
                info!("Loaded toolchain from {}", path.display());
                Ok(toolchain)
            }
            None => {
                info!("Using built-in toolchain");
                Toolchain::embedded()
            }
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Args)]
pub struct DispatcherConfig {
    /// Interface to bind
    #[arg(long, env = "DISPATCHER_HOST", default_value = "0.0.0.0")]
    pub host: String,
    /// Port to bind
    #[arg(long, env = "DISPATCHER_PORT", default_value_t = 8888)]
    pub port: u16,
    /// Node list, one `host:port` per line
    #[arg(long = "nodes", env = "NODES_CONFIG", default_value = "./conf/nodes.conf")]
    pub nodes_config: PathBuf,
    /// Directory containing `questions.list` and the problem assets
    #[arg(long = "problems", env = "PROBLEMS_DIR", default_value = "./questions")]
    pub problems_dir: PathBuf,
    #[arg(long, env = "DISPATCH_MAX_ATTEMPTS", default_value_t = 16)]
    pub max_attempts: u32,
    #[arg(long, env = "DISPATCH_DEADLINE_SECS", default_value_t = 120)]
    pub deadline_secs: u64,
    #[arg(long, env = "NODE_CONNECT_TIMEOUT_MS", default_value_t = 2000)]
    pub connect_timeout_ms: u64,
    #[arg(long, env = "NODE_REQUEST_TIMEOUT_SECS", default_value_t = 60)]
    pub request_timeout_secs: u64,
}

impl DispatcherConfig {
    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        parse_bind_addr(&self.host, self.port)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            deadline: Duration::from_secs(self.deadline_secs),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_bind_addr(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", host, port))
}
