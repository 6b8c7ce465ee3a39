// src/graph/mod.rs

//! Generic precedence graphs
//!
//! A directed graph over any vertex type with equality, hashing, and a total
//! order. Edges mean "must be processed before". The graph exposes the
//! operations the parallel executor needs: deterministic topological order,
//! depth-first traversal, undirected connectivity, and strongly-connected-
//! component decomposition for cycle reporting.
//!
//! Nothing in here knows about repositories; the same engine drives any
//! dependency graph.

pub mod executor;

use petgraph::algo::{connected_components, kosaraju_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;

/// A directed graph whose vertices are ordinary values
///
/// Vertices are deduplicated by equality; the vertex order (`Ord`) decides
/// which of several ready vertices is picked first, so e.g. repository
/// priority translates directly into scheduling preference.
#[derive(Debug, Clone)]
pub struct DirectedGraph<V> {
    graph: DiGraph<V, ()>,
    indices: HashMap<V, NodeIndex>,
}

impl<V: Clone + Eq + Hash + Ord> Default for DirectedGraph<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone + Eq + Hash + Ord> DirectedGraph<V> {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            indices: HashMap::new(),
        }
    }

    /// Add a vertex; re-adding an equal vertex is a no-op
    pub fn add_vertex(&mut self, vertex: V) {
        self.index_of(vertex);
    }

    /// Add a precedence edge: `from` must be processed before `to`
    ///
    /// Missing endpoints are added implicitly; duplicate edges collapse.
    pub fn add_edge(&mut self, from: V, to: V) {
        let from = self.index_of(from);
        let to = self.index_of(to);
        self.graph.update_edge(from, to, ());
    }

    fn index_of(&mut self, vertex: V) -> NodeIndex {
        if let Some(&index) = self.indices.get(&vertex) {
            return index;
        }
        let index = self.graph.add_node(vertex.clone());
        self.indices.insert(vertex, index);
        index
    }

    pub fn contains(&self, vertex: &V) -> bool {
        self.indices.contains_key(vertex)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn vertices(&self) -> impl Iterator<Item = &V> {
        self.graph.node_weights()
    }

    /// Direct predecessors of a vertex
    pub fn predecessors(&self, vertex: &V) -> Vec<V> {
        self.neighbors(vertex, Direction::Incoming)
    }

    /// Direct successors of a vertex
    pub fn successors(&self, vertex: &V) -> Vec<V> {
        self.neighbors(vertex, Direction::Outgoing)
    }

    fn neighbors(&self, vertex: &V, direction: Direction) -> Vec<V> {
        match self.indices.get(vertex) {
            Some(&index) => self
                .graph
                .neighbors_directed(index, direction)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Depth-first traversal from a vertex, the vertex itself included
    pub fn dfs(&self, from: &V) -> Vec<V> {
        let start = match self.indices.get(from) {
            Some(&index) => index,
            None => return Vec::new(),
        };
        let mut visit = Dfs::new(&self.graph, start);
        let mut visited = Vec::new();
        while let Some(index) = visit.next(&self.graph) {
            visited.push(self.graph[index].clone());
        }
        visited
    }

    /// Every vertex reachable from `vertex` by at least one edge
    pub fn descendants(&self, vertex: &V) -> Vec<V> {
        let mut reachable = self.dfs(vertex);
        reachable.retain(|v| v != vertex);
        reachable
    }

    /// Vertices in topological order, deterministically
    ///
    /// Kahn's algorithm with the ready set ordered by the vertex order, so
    /// among unconstrained vertices the smallest (e.g. the highest-priority
    /// repository) comes first. On a cyclic graph the offending components
    /// are returned instead.
    pub fn topological(&self) -> Result<Vec<V>, Vec<Vec<V>>> {
        let mut waiting: HashMap<V, usize> = HashMap::new();
        let mut ready: BTreeSet<V> = BTreeSet::new();
        for vertex in self.vertices() {
            let unmet = self.predecessors(vertex).len();
            if unmet == 0 {
                ready.insert(vertex.clone());
            } else {
                waiting.insert(vertex.clone(), unmet);
            }
        }

        let mut order = Vec::with_capacity(self.len());
        while let Some(vertex) = ready.pop_first() {
            for successor in self.successors(&vertex) {
                if let Some(unmet) = waiting.get_mut(&successor) {
                    *unmet -= 1;
                    if *unmet == 0 {
                        waiting.remove(&successor);
                        ready.insert(successor);
                    }
                }
            }
            order.push(vertex);
        }

        if order.len() == self.len() {
            Ok(order)
        } else {
            Err(self.cycles())
        }
    }

    /// Strongly connected components (Kosaraju)
    pub fn sccs(&self) -> Vec<Vec<V>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Non-trivial strongly connected components: components of more than
    /// one vertex, plus single vertices with a self-loop
    pub fn cycles(&self) -> Vec<Vec<V>> {
        kosaraju_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&index| self.graph.contains_edge(index, index))
            })
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Whether the graph, viewed as undirected, is in one piece
    pub fn is_connected(&self) -> bool {
        connected_components(&self.graph) <= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(edges: &[(u32, u32)]) -> DirectedGraph<u32> {
        let mut graph = DirectedGraph::new();
        for &(from, to) in edges {
            graph.add_edge(from, to);
        }
        graph
    }

    #[test]
    fn test_add_vertex_is_idempotent() {
        let mut graph = DirectedGraph::new();
        graph.add_vertex(1);
        graph.add_vertex(1);
        graph.add_edge(1, 2);
        graph.add_edge(1, 2);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.successors(&1), vec![2]);
    }

    #[test]
    fn test_topological_diamond() {
        // 1 -> {2, 3} -> 4
        let graph = chain(&[(1, 2), (1, 3), (2, 4), (3, 4)]);
        let order = graph.topological().unwrap();
        assert_eq!(order, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_topological_prefers_smallest_ready_vertex() {
        let mut graph = DirectedGraph::new();
        for v in [30, 10, 20] {
            graph.add_vertex(v);
        }
        assert_eq!(graph.topological().unwrap(), vec![10, 20, 30]);
    }

    #[test]
    fn test_topological_reports_cycles() {
        let graph = chain(&[(1, 2), (2, 1), (3, 4)]);
        let components = graph.topological().unwrap_err();
        assert_eq!(components.len(), 1);
        let mut cycle = components[0].clone();
        cycle.sort();
        assert_eq!(cycle, vec![1, 2]);
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let graph = chain(&[(1, 1)]);
        assert_eq!(graph.cycles(), vec![vec![1]]);
    }

    #[test]
    fn test_acyclic_graph_has_no_cycles() {
        let graph = chain(&[(1, 2), (2, 3)]);
        assert!(graph.cycles().is_empty());
    }

    #[test]
    fn test_dfs_and_descendants() {
        let graph = chain(&[(1, 2), (2, 3), (4, 5)]);
        let mut reachable = graph.descendants(&1);
        reachable.sort();
        assert_eq!(reachable, vec![2, 3]);
        assert!(graph.dfs(&1).contains(&1));
        assert!(graph.descendants(&3).is_empty());
    }

    #[test]
    fn test_connectivity() {
        assert!(chain(&[(1, 2), (2, 3)]).is_connected());
        assert!(!chain(&[(1, 2), (3, 4)]).is_connected());
        // Direction does not matter for connectivity
        assert!(chain(&[(1, 2), (3, 2)]).is_connected());
        assert!(DirectedGraph::<u32>::new().is_connected());
    }
}
