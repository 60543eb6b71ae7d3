//! Symbol dependency graph
//!
//! Nodes are symbol names; an edge `a -> b` means `a` depends on `b`.
//! Edges may be latent: they can name a node that is not present yet and
//! only participate in ordering and cycle detection once both endpoints
//! exist. Removing a node returns its incoming edges to the latent state,
//! so re-adding the producer restores the wiring.
//!
//! Iteration order is deterministic everywhere: node and edge sets are
//! B-tree collections and the topological sort breaks ties
//! lexicographically.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use thiserror::Error;

/// Graph mutation / query errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The operation would create (or the query found) a dependency cycle.
    /// The path lists the nodes along the cycle, with the starting node
    /// repeated at the end.
    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
}

/// Dependency graph over named nodes with latent edge support.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyGraph {
    nodes: BTreeSet<String>,
    /// node -> the nodes it depends on (targets may be absent)
    dependencies: BTreeMap<String, BTreeSet<String>>,
    /// node -> the nodes that depend on it (sources may be absent)
    dependents: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// Add a node. Latent edges naming it become active; if that closes a
    /// cycle the insertion is rolled back.
    pub fn add_node(&mut self, name: &str) -> Result<(), GraphError> {
        if !self.nodes.insert(name.to_string()) {
            return Ok(());
        }
        if let Some(path) = self.find_cycle() {
            self.nodes.remove(name);
            return Err(GraphError::Cycle { path });
        }
        Ok(())
    }

    /// Remove a node. Its outgoing edges are dropped; edges pointing at it
    /// from other nodes stay recorded and become latent.
    pub fn remove_node(&mut self, name: &str) {
        if !self.nodes.remove(name) {
            return;
        }
        if let Some(deps) = self.dependencies.remove(name) {
            for dep in deps {
                if let Some(set) = self.dependents.get_mut(&dep) {
                    set.remove(name);
                    if set.is_empty() {
                        self.dependents.remove(&dep);
                    }
                }
            }
        }
    }

    /// Record that `from` depends on `to`. Either endpoint may be absent;
    /// the edge only becomes active once both exist. An edge that closes a
    /// cycle among present nodes is rolled back.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let inserted = self
            .dependencies
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
        self.dependents
            .entry(to.to_string())
            .or_default()
            .insert(from.to_string());

        if inserted {
            if let Some(path) = self.find_cycle() {
                self.remove_edge(from, to);
                return Err(GraphError::Cycle { path });
            }
        }
        Ok(())
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(set) = self.dependencies.get_mut(from) {
            set.remove(to);
            if set.is_empty() {
                self.dependencies.remove(from);
            }
        }
        if let Some(set) = self.dependents.get_mut(to) {
            set.remove(from);
            if set.is_empty() {
                self.dependents.remove(to);
            }
        }
    }

    /// Present nodes `name` directly depends on.
    pub fn dependencies_of(&self, name: &str) -> BTreeSet<String> {
        self.active(self.dependencies.get(name))
    }

    /// Present nodes that directly depend on `name`.
    pub fn dependents_of(&self, name: &str) -> BTreeSet<String> {
        self.active(self.dependents.get(name))
    }

    fn active(&self, edges: Option<&BTreeSet<String>>) -> BTreeSet<String> {
        edges
            .into_iter()
            .flatten()
            .filter(|other| self.nodes.contains(*other))
            .cloned()
            .collect()
    }

    /// Downstream closure: every present node that transitively depends on
    /// `name`. Does not include `name` itself.
    pub fn affected_by(&self, name: &str) -> BTreeSet<String> {
        let mut affected = BTreeSet::new();
        let mut queue: Vec<String> = self.dependents_of(name).into_iter().collect();
        while let Some(node) = queue.pop() {
            if affected.insert(node.clone()) {
                queue.extend(self.dependents_of(&node));
            }
        }
        affected
    }

    /// Kahn's algorithm over the active edges, dependencies first. Ties
    /// break lexicographically. A cycle is reported with its path.
    pub fn topological_order(&self) -> Result<Vec<String>, GraphError> {
        let order = self.kahn_order();
        if order.len() == self.nodes.len() {
            Ok(order)
        } else {
            let path = self.find_cycle().unwrap_or_default();
            Err(GraphError::Cycle { path })
        }
    }

    /// True if the active edges contain a cycle.
    pub fn has_cycle(&self) -> bool {
        self.kahn_order().len() != self.nodes.len()
    }

    fn kahn_order(&self) -> Vec<String> {
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();
        for node in &self.nodes {
            pending.insert(node, self.dependencies_of(node).len());
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_first() {
            pending.remove(node);
            order.push(node.to_string());
            for dependent in self.dependents_of(node) {
                if let Some((key, count)) = pending.remove_entry(dependent.as_str()) {
                    if count <= 1 {
                        ready.insert(key);
                        pending.insert(key, 0);
                    } else {
                        pending.insert(key, count - 1);
                    }
                }
            }
        }
        order
    }

    /// DFS for a concrete cycle path, for error reporting. Returns the
    /// nodes along the cycle with the starting node repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = BTreeSet::new();
        let mut on_path = BTreeSet::new();
        let mut path = Vec::new();
        for node in &self.nodes {
            if !visited.contains(node.as_str()) {
                if let Some(cycle) =
                    self.dfs_cycle(node, &mut visited, &mut on_path, &mut path)
                {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle<'a>(
        &'a self,
        node: &'a str,
        visited: &mut BTreeSet<&'a str>,
        on_path: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_path.insert(node);
        path.push(node);

        if let Some(deps) = self.dependencies.get(node) {
            for dep in deps {
                if !self.nodes.contains(dep) {
                    continue; // latent edge
                }
                if on_path.contains(dep.as_str()) {
                    let start = path.iter().position(|n| *n == dep).unwrap_or(0);
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| n.to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                if !visited.contains(dep.as_str()) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, on_path, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        path.pop();
        on_path.remove(node);
        None
    }
}
