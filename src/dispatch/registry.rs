//! Node registry
//!
//! Two synchronization domains:
//! - the structural lock guards the online/offline partition of node indices
//! - each node's own lock guards its load counter
//!
//! Lock order is structural -> node, never the reverse, and neither lock is
//! held across network I/O.

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use tracing::{info, warn};

/// One judge node endpoint
#[derive(Debug)]
pub struct Node {
    address: String,
    load: Mutex<u64>,
}

impl Node {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            load: Mutex::new(0),
        }
    }

    /// `host:port` of the node
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn increase_load(&self) {
        *self.lock_load() += 1;
    }

    pub fn decrease_load(&self) {
        let mut load = self.lock_load();
        *load = load.saturating_sub(1);
    }

    pub fn load(&self) -> u64 {
        *self.lock_load()
    }

    pub fn reset_load(&self) {
        *self.lock_load() = 0;
    }

    fn lock_load(&self) -> MutexGuard<'_, u64> {
        // A poisoned lock still holds a valid count.
        self.load.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Default)]
struct Partition {
    online: Vec<usize>,
    offline: Vec<usize>,
}

/// Point-in-time view of the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySnapshot {
    pub online: Vec<usize>,
    pub offline: Vec<usize>,
    pub loads: Vec<u64>,
}

/// Fixed pool of judge nodes partitioned into online and offline
#[derive(Debug)]
pub struct Registry {
    nodes: Vec<Arc<Node>>,
    partition: Mutex<Partition>,
}

impl Registry {
    /// Registry with every given address online, in order
    pub fn new(addresses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let nodes: Vec<Arc<Node>> = addresses
            .into_iter()
            .map(|a| Arc::new(Node::new(a)))
            .collect();
        let partition = Partition {
            online: (0..nodes.len()).collect(),
            offline: Vec::new(),
        };
        Self {
            nodes,
            partition: Mutex::new(partition),
        }
    }

    /// Parse a node list: one `host:port` per line, malformed lines skipped
    pub fn parse(content: &str) -> Self {
        let mut addresses = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_address(line) {
                Some(address) => addresses.push(address),
                None => warn!(
                    "Skipping malformed node entry at line {}: {:?}",
                    lineno + 1,
                    line
                ),
            }
        }
        Self::new(addresses)
    }

    /// Load the node list from a file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read node list {}", path.display()))?;
        let registry = Self::parse(&content);
        info!(
            "Loaded {} judge nodes from {}",
            registry.len(),
            path.display()
        );
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> Option<&Arc<Node>> {
        self.nodes.get(index)
    }

    /// Online node with the lowest load; the first one wins ties
    pub fn select_least_loaded(&self) -> Option<(usize, Arc<Node>)> {
        self.select_least_loaded_excluding(&[])
    }

    /// Like [`select_least_loaded`](Self::select_least_loaded), but skips the
    /// `excluded` indices while any other online node remains
    pub fn select_least_loaded_excluding(&self, excluded: &[usize]) -> Option<(usize, Arc<Node>)> {
        let partition = self.lock_partition();

        let preferred = partition.online.iter().filter(|&&i| !excluded.contains(&i));
        self.least_loaded(preferred)
            .or_else(|| self.least_loaded(partition.online.iter()))
            .map(|index| (index, self.nodes[index].clone()))
    }

    fn least_loaded<'a>(&self, candidates: impl Iterator<Item = &'a usize>) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for &index in candidates {
            let load = self.nodes[index].load();
            match best {
                Some((_, min)) if min <= load => {}
                _ => best = Some((index, load)),
            }
        }
        best.map(|(index, _)| index)
    }

    /// Take a node out of the online pool after it proved unreachable
    pub fn demote(&self, index: usize) {
        let mut partition = self.lock_partition();

        let pos = match partition.online.iter().position(|&i| i == index) {
            Some(pos) => pos,
            None => {
                warn!("Node {} is not online, ignoring demotion", index);
                return;
            }
        };

        self.nodes[index].reset_load();
        partition.online.remove(pos);
        partition.offline.push(index);
        warn!(
            "Node {} ({}) demoted to offline",
            index, self.nodes[index].address
        );
    }

    /// Administratively put an offline node back into the online pool
    pub fn readmit(&self, index: usize) -> bool {
        let mut partition = self.lock_partition();

        let pos = match partition.offline.iter().position(|&i| i == index) {
            Some(pos) => pos,
            None => return false,
        };

        self.nodes[index].reset_load();
        partition.offline.remove(pos);
        partition.online.push(index);
        info!(
            "Node {} ({}) readmitted to online",
            index, self.nodes[index].address
        );
        true
    }

    pub fn is_online(&self, index: usize) -> bool {
        self.lock_partition().online.contains(&index)
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        let partition = self.lock_partition();
        RegistrySnapshot {
            online: partition.online.clone(),
            offline: partition.offline.clone(),
            loads: self.nodes.iter().map(|n| n.load()).collect(),
        }
    }

    fn lock_partition(&self) -> MutexGuard<'_, Partition> {
        self.partition.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_address(line: &str) -> Option<String> {
    let parts: Vec<&str> = line.split(':').filter(|s| !s.is_empty()).collect();
    if parts.len() != 2 {
        return None;
    }
    let host = parts[0].trim();
    let port: u16 = parts[1].trim().parse().ok()?;
    if host.is_empty() {
        return None;
    }
    Some(format!("{}:{}", host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::thread;

    fn registry_with_loads(loads: &[u64]) -> Registry {
        let registry = Registry::new((0..loads.len()).map(|i| format!("10.0.0.{}:8081", i)));
        for (i, &load) in loads.iter().enumerate() {
            for _ in 0..load {
                registry.node(i).unwrap().increase_load();
            }
        }
        registry
    }

    #[test]
    fn test_select_least_loaded_first_wins_ties() {
        let registry = registry_with_loads(&[5, 2, 2, 8]);

        let (index, node) = registry.select_least_loaded().unwrap();
        assert_eq!(index, 1);
        assert_eq!(node.address(), "10.0.0.1:8081");
        assert_eq!(node.load(), 2);
    }

    #[test]
    fn test_select_excluding_prefers_other_nodes() {
        let registry = registry_with_loads(&[0, 3, 1]);

        let (index, _) = registry.select_least_loaded_excluding(&[0]).unwrap();
        assert_eq!(index, 2);
        let (index, _) = registry.select_least_loaded_excluding(&[0, 2]).unwrap();
        assert_eq!(index, 1);
    }

    #[test]
    fn test_select_excluding_everything_falls_back() {
        let registry = registry_with_loads(&[2, 1]);
        registry.demote(1);

        let (index, _) = registry.select_least_loaded_excluding(&[0]).unwrap();
        assert_eq!(index, 0);
        assert!(Registry::new(Vec::<String>::new())
            .select_least_loaded_excluding(&[0])
            .is_none());
    }

    #[test]
    fn test_select_returns_backing_index_after_demotion() {
        let registry = registry_with_loads(&[0, 3, 1]);
        registry.demote(0);

        let (index, _) = registry.select_least_loaded().unwrap();
        assert_eq!(index, 2);
    }

    #[test]
    fn test_demote_until_exhausted() {
        let registry = registry_with_loads(&[1, 4]);

        registry.demote(0);
        assert_eq!(registry.node(0).unwrap().load(), 0);
        assert!(!registry.is_online(0));
        let (index, _) = registry.select_least_loaded().unwrap();
        assert_eq!(index, 1);

        registry.demote(1);
        assert!(registry.select_least_loaded().is_none());

        let snapshot = registry.snapshot();
        assert!(snapshot.online.is_empty());
        assert_eq!(snapshot.offline, vec![0, 1]);
        assert_eq!(snapshot.loads, vec![0, 0]);
    }

    #[test]
    fn test_demote_twice_is_noop() {
        let registry = registry_with_loads(&[0, 0]);
        registry.demote(1);
        registry.demote(1);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.online, vec![0]);
        assert_eq!(snapshot.offline, vec![1]);
    }

    #[test]
    fn test_readmit() {
        let registry = registry_with_loads(&[0, 0]);
        registry.demote(0);

        assert!(registry.readmit(0));
        assert!(!registry.readmit(0));
        assert!(registry.is_online(0));
        assert_eq!(registry.snapshot().offline, Vec::<usize>::new());
    }

    #[test]
    fn test_empty_registry() {
        let registry = Registry::new(Vec::<String>::new());
        assert!(registry.is_empty());
        assert!(registry.select_least_loaded().is_none());
    }

    #[test]
    fn test_concurrent_paired_load_updates() {
        let registry = Arc::new(registry_with_loads(&[0, 0]));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let (_, node) = registry.select_least_loaded().unwrap();
                        node.increase_load();
                        node.decrease_load();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.snapshot().loads, vec![0, 0]);
    }

    #[test]
    fn test_concurrent_increments_not_lost() {
        let registry = Arc::new(registry_with_loads(&[0]));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let node = registry.node(0).unwrap().clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        node.increase_load();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.node(0).unwrap().load(), 4000);
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let registry = Registry::parse("127.0.0.1:8081\n\nnot-a-node\n127.0.0.1:notaport\n10.0.0.2:8082\n");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.node(0).unwrap().address(), "127.0.0.1:8081");
        assert_eq!(registry.node(1).unwrap().address(), "10.0.0.2:8082");
        assert_eq!(registry.snapshot().online, vec![0, 1]);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "127.0.0.1:8081").unwrap();
        writeln!(file, "127.0.0.1:8082").unwrap();

        let registry = Registry::from_file(file.path()).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_from_missing_file_fails() {
        assert!(Registry::from_file("/nonexistent/nodes.conf").is_err());
    }
}
