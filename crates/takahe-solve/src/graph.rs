//! Directed constraint graphs over atoms.
//!
//! Nodes are atoms (variables or base types); an edge `u -> v` records the
//! atomic constraint `u <: v`. Built on petgraph, with a `BTreeMap` from atom
//! to node index so lookups and iteration stay deterministic.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use takahe_types::Atom;

/// A directed graph on atoms with set semantics for edges.
#[derive(Debug, Clone, Default)]
pub struct ConstraintGraph {
    graph: DiGraph<Atom, ()>,
    indices: BTreeMap<Atom, NodeIndex>,
}

impl ConstraintGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from atomic subtype pairs.
    ///
    /// Every atom mentioned becomes a node; every pair becomes an edge.
    /// Duplicate pairs collapse to a single edge.
    pub fn from_pairs(pairs: &[(Atom, Atom)]) -> Self {
        let mut graph = Self::new();
        for (src, dst) in pairs {
            graph.add_edge(src, dst);
        }
        graph
    }

    /// Insert an atom as a node, returning its index. Idempotent.
    pub fn add_atom(&mut self, atom: &Atom) -> NodeIndex {
        match self.indices.get(atom) {
            Some(index) => *index,
            None => {
                let index = self.graph.add_node(atom.clone());
                self.indices.insert(atom.clone(), index);
                index
            }
        }
    }

    /// Insert the edge `src -> dst`, inserting either endpoint as needed.
    pub fn add_edge(&mut self, src: &Atom, dst: &Atom) {
        let src = self.add_atom(src);
        let dst = self.add_atom(dst);
        self.graph.update_edge(src, dst, ());
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, atom: &Atom) -> bool {
        self.indices.contains_key(atom)
    }

    /// All atoms in the graph, in their natural order.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.indices.keys()
    }

    /// All edges as `(src, dst)` pairs.
    pub fn edge_pairs(&self) -> BTreeSet<(Atom, Atom)> {
        self.graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].clone(),
                    self.graph[edge.target()].clone(),
                )
            })
            .collect()
    }

    /// Direct successors of an atom: every `b` with `atom -> b`.
    pub fn successors(&self, atom: &Atom) -> BTreeSet<Atom> {
        self.neighbors(atom, Direction::Outgoing)
    }

    /// Direct predecessors of an atom: every `b` with `b -> atom`.
    pub fn predecessors(&self, atom: &Atom) -> BTreeSet<Atom> {
        self.neighbors(atom, Direction::Incoming)
    }

    fn neighbors(&self, atom: &Atom, direction: Direction) -> BTreeSet<Atom> {
        let Some(index) = self.indices.get(atom) else {
            return BTreeSet::new();
        };
        self.graph
            .neighbors_directed(*index, direction)
            .map(|n| self.graph[n].clone())
            .collect()
    }

    /// Whether the graph contains a directed cycle.
    pub fn has_cycle(&self) -> bool {
        is_cyclic_directed(&self.graph)
    }

    /// Strongly connected components as atom sets.
    ///
    /// Components come out in reverse topological order of the condensation;
    /// atoms within a component are unordered.
    pub fn sccs(&self) -> Vec<Vec<Atom>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .map(|component| {
                component
                    .into_iter()
                    .map(|index| self.graph[index].clone())
                    .collect()
            })
            .collect()
    }

    /// Weakly connected components as sorted atom sets, sorted by their
    /// smallest atom.
    pub fn weak_components(&self) -> Vec<Vec<Atom>> {
        let mut seen: BTreeSet<NodeIndex> = BTreeSet::new();
        let mut components = Vec::new();
        // Iterate in atom order so component discovery is deterministic.
        for index in self.indices.values() {
            if seen.contains(index) {
                continue;
            }
            let mut component = Vec::new();
            let mut stack = vec![*index];
            seen.insert(*index);
            while let Some(node) = stack.pop() {
                component.push(self.graph[node].clone());
                for neighbor in self.graph.neighbors_undirected(node) {
                    if seen.insert(neighbor) {
                        stack.push(neighbor);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components.sort_by(|a, b| a.first().cmp(&b.first()));
        components
    }

    /// Relabel every node through `f`, merging nodes whose images coincide.
    ///
    /// Edges follow their endpoints; edges whose endpoints collapse onto the
    /// same node are dropped, so mapping every member of a strongly connected
    /// component to one representative yields the condensation.
    pub fn map_atoms(&self, f: impl Fn(&Atom) -> Atom) -> ConstraintGraph {
        let mut mapped = ConstraintGraph::new();
        for atom in self.atoms() {
            mapped.add_atom(&f(atom));
        }
        for edge in self.graph.edge_references() {
            let src = f(&self.graph[edge.source()]);
            let dst = f(&self.graph[edge.target()]);
            if src != dst {
                mapped.add_edge(&src, &dst);
            }
        }
        mapped
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use takahe_types::{BaseName, TypeVarId};

    fn var(id: u32) -> Atom {
        Atom::Var(TypeVarId(id))
    }

    fn base(name: &str) -> Atom {
        Atom::Base(BaseName::new(name))
    }

    #[test]
    fn from_pairs_deduplicates_edges() {
        let pairs = vec![
            (var(0), var(1)),
            (var(0), var(1)),
            (var(1), base("Int")),
        ];
        let graph = ConstraintGraph::from_pairs(&pairs);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn successors_and_predecessors() {
        let graph = ConstraintGraph::from_pairs(&[
            (var(0), var(1)),
            (var(0), base("Int")),
            (var(2), var(0)),
        ]);
        let succs = graph.successors(&var(0));
        assert!(succs.contains(&var(1)));
        assert!(succs.contains(&base("Int")));
        assert_eq!(graph.predecessors(&var(0)), [var(2)].into());
        assert!(graph.successors(&var(9)).is_empty());
    }

    #[test]
    fn sccs_find_the_cycle() {
        let graph = ConstraintGraph::from_pairs(&[
            (var(0), var(1)),
            (var(1), var(0)),
            (var(1), var(2)),
        ]);
        let mut cycle_sizes: Vec<usize> = graph.sccs().iter().map(Vec::len).collect();
        cycle_sizes.sort();
        assert_eq!(cycle_sizes, vec![1, 2]);
        assert!(graph.has_cycle());
    }

    #[test]
    fn map_atoms_collapses_a_component() {
        let graph = ConstraintGraph::from_pairs(&[
            (var(0), var(1)),
            (var(1), var(0)),
            (var(1), var(2)),
        ]);
        // Send both cycle members to t0.
        let mapped = graph.map_atoms(|atom| {
            if *atom == var(1) { var(0) } else { atom.clone() }
        });
        assert_eq!(mapped.node_count(), 2);
        assert_eq!(mapped.edge_pairs(), [(var(0), var(2))].into());
        assert!(!mapped.has_cycle());
    }

    #[test]
    fn weak_components_ignore_direction() {
        let graph = ConstraintGraph::from_pairs(&[
            (var(0), var(1)),
            (var(2), var(1)),
            (var(3), var(4)),
        ]);
        let components = graph.weak_components();
        assert_eq!(
            components,
            vec![vec![var(0), var(1), var(2)], vec![var(3), var(4)]]
        );
    }

    #[test]
    fn isolated_atoms_form_singleton_components() {
        let mut graph = ConstraintGraph::new();
        graph.add_atom(&var(5));
        assert_eq!(graph.weak_components(), vec![vec![var(5)]]);
    }
}
