//! Dependency graph module.
//!
//! Provides the `ModuleGraph` type, which represents module dependencies as
//! a directed acyclic graph (DAG). Nodes are stored in an arena in
//! declaration order, so a node's index doubles as its declaration index and
//! the resolution order can break ties deterministically.

use crate::error::ConfigError;
use crate::module_id::ModuleId;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A directed acyclic graph (DAG) of module dependencies.
///
/// If module A depends on module B, B must be constructed before A. Edges
/// point from the dependency to the dependent.
///
/// # Examples
///
/// ```rust
/// use combatlog::graph::ModuleGraph;
/// use combatlog::ModuleId;
///
/// let mut graph = ModuleGraph::new();
/// let uptime = ModuleId::new("furiousSlashUptime");
/// let stacks = ModuleId::new("furiousSlashTimesByStacks");
///
/// graph.add_node(uptime.clone());
/// graph.add_node(stacks.clone());
/// graph.add_edge(&uptime, &stacks);
///
/// let order = graph.topological_sort().unwrap();
/// assert_eq!(order, vec![stacks, uptime]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    graph: DiGraph<ModuleId, ()>,
    node_map: HashMap<ModuleId, NodeIndex>,
}

impl ModuleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph if it doesn't exist.
    ///
    /// Returns the node's index, which is its declaration index.
    pub fn add_node(&mut self, module: ModuleId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&module) {
            idx
        } else {
            let idx = self.graph.add_node(module.clone());
            self.node_map.insert(module, idx);
            idx
        }
    }

    /// Record that `dependent` depends on `dependency`.
    ///
    /// Both nodes are added if they don't exist yet.
    pub fn add_edge(&mut self, dependent: &ModuleId, dependency: &ModuleId) {
        let dependent_idx = self.add_node(dependent.clone());
        let dependency_idx = self.add_node(dependency.clone());
        self.graph.update_edge(dependency_idx, dependent_idx, ());
    }

    pub fn contains_node(&self, module: &ModuleId) -> bool {
        self.node_map.contains_key(module)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies of `module`, in declaration order.
    pub fn dependencies_of(&self, module: &ModuleId) -> Vec<ModuleId> {
        let Some(&idx) = self.node_map.get(module) else {
            return Vec::new();
        };
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Incoming)
            .collect();
        deps.sort();
        deps.into_iter().map(|d| self.graph[d].clone()).collect()
    }

    /// Detect cycles in the graph.
    ///
    /// # Returns
    ///
    /// * `Ok(())` if no cycles are detected
    /// * `Err(ConfigError::Cycle)` with the path following "depends on"
    ///   edges, closed by repeating the first module
    ///
    /// # Examples
    ///
    /// ```rust
    /// use combatlog::graph::ModuleGraph;
    /// use combatlog::{ConfigError, ModuleId};
    ///
    /// let mut graph = ModuleGraph::new();
    /// let a = ModuleId::new("A");
    /// let b = ModuleId::new("B");
    ///
    /// graph.add_edge(&a, &b);
    /// assert!(graph.detect_cycles().is_ok());
    ///
    /// graph.add_edge(&b, &a);
    /// assert_eq!(
    ///     graph.detect_cycles(),
    ///     Err(ConfigError::Cycle { path: vec![a.clone(), b, a] })
    /// );
    /// ```
    pub fn detect_cycles(&self) -> Result<(), ConfigError> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();

        for node_idx in self.graph.node_indices() {
            if !visited.contains(&node_idx) {
                let mut cycle_path = Vec::new();
                if let Some(cycle) =
                    self.dfs_cycle_detect(node_idx, &mut visited, &mut on_stack, &mut cycle_path)
                {
                    return Err(cycle);
                }
            }
        }

        Ok(())
    }

    fn dfs_cycle_detect(
        &self,
        node: NodeIndex,
        visited: &mut HashSet<NodeIndex>,
        on_stack: &mut HashSet<NodeIndex>,
        cycle_path: &mut Vec<NodeIndex>,
    ) -> Option<ConfigError> {
        visited.insert(node);
        on_stack.insert(node);
        cycle_path.push(node);

        let mut dependencies: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        dependencies.sort();

        for dependency in dependencies {
            if !visited.contains(&dependency) {
                if let Some(cycle) = self.dfs_cycle_detect(dependency, visited, on_stack, cycle_path)
                {
                    return Some(cycle);
                }
            } else if on_stack.contains(&dependency) {
                // the dependency is on the current path, so the cycle starts there
                let start = cycle_path
                    .iter()
                    .position(|&idx| idx == dependency)
                    .unwrap_or(0);
                let mut path: Vec<ModuleId> = cycle_path[start..]
                    .iter()
                    .map(|&idx| self.graph[idx].clone())
                    .collect();
                path.push(self.graph[dependency].clone());
                return Some(ConfigError::Cycle { path });
            }
        }

        on_stack.remove(&node);
        cycle_path.pop();
        None
    }

    /// Get the construction order of all modules.
    ///
    /// Dependencies come before dependents. Among modules whose dependencies
    /// are all satisfied, the one declared first comes first, so the order is
    /// identical on every run for the same declarations.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ModuleId>)` - The resolution order
    /// * `Err(ConfigError::Cycle)` - If a cycle is detected
    pub fn topological_sort(&self) -> Result<Vec<ModuleId>, ConfigError> {
        self.detect_cycles()?;

        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.graph.neighbors_directed(idx, Direction::Incoming).count())
            .collect();

        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(idx, _)| Reverse(idx))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(idx)) = ready.pop() {
            let node = NodeIndex::new(idx);
            order.push(self.graph[node].clone());
            for dependent in self.graph.neighbors_directed(node, Direction::Outgoing) {
                let deg = &mut in_degree[dependent.index()];
                *deg -= 1;
                if *deg == 0 {
                    ready.push(Reverse(dependent.index()));
                }
            }
        }

        Ok(order)
    }
}
