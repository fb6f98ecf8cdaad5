//! Problem repository
//!
//! Loaded once at startup from `<dir>/questions.list` plus one asset directory
//! per problem (`desc.txt`, `header.cpp`, `tail.cpp`), then read-only.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use tracing::{info, warn};

const LIST_FILE: &str = "questions.list";
const DESCRIPTION_FILE: &str = "desc.txt";
const SKELETON_FILE: &str = "header.cpp";
const HARNESS_FILE: &str = "tail.cpp";

/// A judgeable problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    /// CPU time limit in seconds
    pub cpu_limit: u32,
    /// Memory limit in KB
    pub memory_limit: u64,
    pub description: String,
    /// Starting code shown to the user
    pub code_skeleton: String,
    /// Test driver appended to the user's code before compilation
    pub judge_harness: String,
}

/// Listing entry for a problem
#[derive(Debug, Clone, Serialize)]
pub struct ProblemSummary {
    pub id: String,
    pub title: String,
    pub difficulty: String,
    pub cpu_limit: u32,
    pub memory_limit: u64,
}

/// Full user-visible view of a problem; the harness is never exposed
#[derive(Debug, Clone, Serialize)]
pub struct ProblemDetail {
    #[serde(flatten)]
    pub summary: ProblemSummary,
    pub description: String,
    pub code_skeleton: String,
}

impl Problem {
    pub fn summary(&self) -> ProblemSummary {
        ProblemSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            difficulty: self.difficulty.clone(),
            cpu_limit: self.cpu_limit,
            memory_limit: self.memory_limit,
        }
    }

    pub fn detail(&self) -> ProblemDetail {
        ProblemDetail {
            summary: self.summary(),
            description: self.description.clone(),
            code_skeleton: self.code_skeleton.clone(),
        }
    }

    /// Source unit compiled for a submission: user code, newline, harness
    pub fn assemble(&self, user_code: &str) -> String {
        format!("{}\n{}", user_code, self.judge_harness)
    }
}

/// Immutable lookup of problems by id
#[derive(Debug, Default)]
pub struct ProblemStore {
    problems: HashMap<String, Problem>,
}

impl ProblemStore {
    pub fn new(problems: impl IntoIterator<Item = Problem>) -> Self {
        Self {
            problems: problems.into_iter().map(|p| (p.id.clone(), p)).collect(),
        }
    }

    /// Load every problem listed in `<dir>/questions.list`
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let list_path = dir.join(LIST_FILE);
        let content = fs::read_to_string(&list_path)
            .with_context(|| format!("Failed to read problem list {}", list_path.display()))?;

        let mut problems = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let Some(entry) = parse_entry(line) else {
                warn!(
                    "Skipping malformed problem entry at line {}: {:?}",
                    lineno + 1,
                    line
                );
                continue;
            };

            let assets = dir.join(&entry.id);
            problems.push(Problem {
                description: read_asset(&assets.join(DESCRIPTION_FILE)),
                code_skeleton: read_asset(&assets.join(SKELETON_FILE)),
                judge_harness: read_asset(&assets.join(HARNESS_FILE)),
                ..entry
            });
        }

        let store = Self::new(problems);
        info!("Loaded {} problems from {}", store.len(), dir.display());
        Ok(store)
    }

    pub fn get(&self, id: &str) -> Option<&Problem> {
        self.problems.get(id)
    }

    /// All problems ordered by id (numeric ids numerically)
    pub fn all(&self) -> Vec<&Problem> {
        let mut problems: Vec<&Problem> = self.problems.values().collect();
        problems.sort_by(|a, b| match (a.id.parse::<u64>(), b.id.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.id.cmp(&b.id),
        });
        problems
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

/// `id title difficulty cpu_limit memory_limit`, whitespace separated
fn parse_entry(line: &str) -> Option<Problem> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return None;
    }
    Some(Problem {
        id: fields[0].to_string(),
        title: fields[1].to_string(),
        difficulty: fields[2].to_string(),
        cpu_limit: fields[3].parse().ok()?,
        memory_limit: fields[4].parse().ok()?,
        description: String::new(),
        code_skeleton: String::new(),
        judge_harness: String::new(),
    })
}

fn read_asset(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(content) => content.lines().map(|l| format!("{}\n", l)).collect(),
        Err(e) => {
            warn!("Problem asset {} unreadable: {}", path.display(), e);
            String::new()
        }
    }
}
