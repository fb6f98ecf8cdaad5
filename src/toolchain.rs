//! Toolchain configuration for compiling submissions

use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

const SOURCE_PLACEHOLDER: &str = "{source}";
const BINARY_PLACEHOLDER: &str = "{binary}";

/// The single compiler toolchain used by a judge node
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Compile command template; `{source}` and `{binary}` are substituted per workspace
    pub compile_command: Vec<String>,
}

/// Raw TOML configuration for the toolchain
#[derive(Debug, Deserialize)]
struct RawToolchain {
    compile_command: String,
}

impl Toolchain {
    /// Build a toolchain directly from a command template
    pub fn new(compile_command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            compile_command: compile_command.into_iter().map(Into::into).collect(),
        }
    }

    /// Parse a toolchain from TOML text
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let raw: RawToolchain = toml::from_str(content).context("Invalid toolchain TOML")?;
        let compile_command = into_command(&raw.compile_command);
        if compile_command.is_empty() {
            anyhow::bail!("Toolchain compile_command is empty");
        }
        Ok(Self { compile_command })
    }

    /// Load a toolchain from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read toolchain config {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// The toolchain shipped with the crate (g++, C++11)
    pub fn embedded() -> anyhow::Result<Self> {
        Self::from_toml_str(include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/files/toolchain.toml"
        )))
    }

    /// Concrete command line (program + args) for one source/binary pair
    pub fn command_for(&self, source: &Path, binary: &Path) -> Vec<String> {
        let source = source.to_string_lossy();
        let binary = binary.to_string_lossy();
        self.compile_command
            .iter()
            .map(|part| {
                part.replace(SOURCE_PLACEHOLDER, &source)
                    .replace(BINARY_PLACEHOLDER, &binary)
            })
            .collect()
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
