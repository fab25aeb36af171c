use std::collections::VecDeque;

use indexmap::IndexSet;

use super::pedigree::PedigreeGraph;

/// A chain of individuals from a start node up to an ancestor, following
/// sire/dam links only. No node appears twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AncestorPath {
    nodes: Vec<usize>,
}

impl AncestorPath {
    /// Node indices from the start up to the ancestor.
    pub fn nodes(&self) -> &[usize] {
        &self.nodes
    }

    /// Number of generations spanned (edges, not nodes).
    pub fn len(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    /// A trivial path (start is the target) has no edges.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, node: usize) -> bool {
        self.nodes.contains(&node)
    }

    /// Whether `self` and `other` meet only at their shared endpoint.
    pub fn is_independent_of(&self, other: &AncestorPath, ancestor: usize) -> bool {
        self.nodes
            .iter()
            .all(|&node| node == ancestor || !other.contains(node))
    }
}

/// Read-only walks over a [`PedigreeGraph`].
#[derive(Debug, Clone, Copy)]
pub struct PathEnumerator<'g> {
    graph: &'g PedigreeGraph,
}

impl<'g> PathEnumerator<'g> {
    /// Enumerator over `graph`.
    pub fn new(graph: &'g PedigreeGraph) -> Self {
        Self { graph }
    }

    /// Every ancestor of `start` (excluding `start`), in breadth-first
    /// discovery order with sires visited before dams.
    ///
    /// Pedigrees reconverge; an individual is enqueued at most once.
    pub fn ancestors_of(&self, start: usize) -> IndexSet<usize> {
        let mut seen: IndexSet<usize> = IndexSet::new();
        let mut queue: VecDeque<usize> = VecDeque::new();
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            for parent in self.graph.parents(node) {
                if parent != start && seen.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }

        seen
    }

    /// `ancestors_of(start)` plus `start` itself, with `start` first.
    pub fn closure_of(&self, start: usize) -> IndexSet<usize> {
        let mut closure = IndexSet::new();
        closure.insert(start);
        closure.extend(self.ancestors_of(start));
        closure
    }

    /// All simple paths from `start` up to `target`.
    ///
    /// Iterative depth-first search; an extension that would revisit a node
    /// already on the current path is rejected. Returns one single-node path
    /// when `start == target` and nothing when `target` is unreachable.
    pub fn simple_paths(&self, start: usize, target: usize) -> Vec<AncestorPath> {
        if start == target {
            return vec![AncestorPath { nodes: vec![start] }];
        }

        let mut paths = Vec::new();
        let mut stack: Vec<Vec<usize>> = vec![vec![start]];

        while let Some(path) = stack.pop() {
            let Some(&tip) = path.last() else {
                continue;
            };
            // Push dam before sire so the sire branch is expanded first.
            let parents: Vec<usize> = self.graph.parents(tip).collect();
            for &parent in parents.iter().rev() {
                if path.contains(&parent) {
                    continue;
                }
                let mut next = path.clone();
                next.push(parent);
                if parent == target {
                    paths.push(AncestorPath { nodes: next });
                } else {
                    stack.push(next);
                }
            }
        }

        paths
    }
}
