//! Three depth-first traversal variants over an [`EdgeContainer`]. They are
//! kept distinct on purpose: pre/post-order construction needs the raw
//! counter-accurate walk,
//! `find_connected` on an adjacency list needs at-most-once-per-node, and
//! statistics collection needs cycle detection.
//!
//! Generic over the container `C` (held by value, usually a `&'a Storage`)
//! rather than a boxed trait object, so a caller can hand in a lightweight
//! adapter (e.g. one that flips edge direction for an inverse walk) without
//! fighting borrow lifetimes.

use std::collections::HashSet;

use super::EdgeContainer;
use crate::types::NodeID;

/// Depth-first traversal honouring `[min, max]` distance bounds. May revisit
/// a node multiple times via different paths; used where exact visit counts
/// matter (e.g. pre/post-order numbering, `dfs_visit_ratio`).
pub struct RawDFS<C> {
    container: C,
    min_distance: usize,
    max_distance: usize,
    stack: Vec<(NodeID, usize)>,
}

impl<C: EdgeContainer> RawDFS<C> {
    pub fn new(container: C, start: NodeID, min_distance: usize, max_distance: usize) -> Self {
        RawDFS {
            container,
            min_distance,
            max_distance,
            stack: vec![(start, 0)],
        }
    }
}

impl<C: EdgeContainer> Iterator for RawDFS<C> {
    type Item = (NodeID, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, dist)) = self.stack.pop() {
            if dist < self.max_distance {
                for child in self.container.out_edges(node) {
                    self.stack.push((child, dist + 1));
                }
            }
            if dist >= self.min_distance && dist <= self.max_distance {
                return Some((node, dist));
            }
        }
        None
    }
}

/// As [`RawDFS`], but suppresses repeat emission of a node already returned —
/// used by the adjacency list's `find_connected` to satisfy
/// at-most-one-result-per-node.
pub struct UniqueDFS<C> {
    inner: RawDFS<C>,
    visited: HashSet<NodeID>,
}

impl<C: EdgeContainer> UniqueDFS<C> {
    pub fn new(container: C, start: NodeID, min_distance: usize, max_distance: usize) -> Self {
        UniqueDFS {
            inner: RawDFS::new(container, start, min_distance, max_distance),
            visited: HashSet::new(),
        }
    }
}

impl<C: EdgeContainer> Iterator for UniqueDFS<C> {
    type Item = NodeID;

    fn next(&mut self) -> Option<Self::Item> {
        for (node, _) in self.inner.by_ref() {
            if self.visited.insert(node) {
                return Some(node);
            }
        }
        None
    }
}

/// Outcome of one `CycleSafeDFS` step: either entry to a fresh node, or
/// detection of a back-edge to a node already on the current path.
#[derive(Debug, PartialEq, Eq)]
pub enum DFSStep {
    Entered { node: NodeID, distance: usize },
    Cycle { node: NodeID, distance: usize },
}

/// Depth-first traversal that maintains the current path as a set; re-entry
/// into a node already on the path is reported as a cycle and pruned (no
/// descent past it). Used by `calculate_statistics` to detect `cyclic=true`.
pub struct CycleSafeDFS<C> {
    container: C,
    min_distance: usize,
    max_distance: usize,
    stack: Vec<(NodeID, usize)>,
    path: Vec<NodeID>,
    nodes_in_path: HashSet<NodeID>,
    last_distance: usize,
}

impl<C: EdgeContainer> CycleSafeDFS<C> {
    pub fn new(container: C, start: NodeID, min_distance: usize, max_distance: usize) -> Self {
        CycleSafeDFS {
            container,
            min_distance,
            max_distance,
            stack: vec![(start, 0)],
            path: Vec::new(),
            nodes_in_path: HashSet::new(),
            last_distance: 0,
        }
    }

    fn enter_node(&mut self, node: NodeID, dist: usize) -> DFSStep {
        if self.last_distance >= dist {
            for n in self.path.drain(dist..) {
                self.nodes_in_path.remove(&n);
            }
        }
        self.last_distance = dist;

        if self.nodes_in_path.contains(&node) {
            return DFSStep::Cycle {
                node,
                distance: dist,
            };
        }

        self.path.push(node);
        self.nodes_in_path.insert(node);

        if dist < self.max_distance {
            for child in self.container.out_edges(node) {
                self.stack.push((child, dist + 1));
            }
        }
        DFSStep::Entered {
            node,
            distance: dist,
        }
    }
}

impl<C: EdgeContainer> Iterator for CycleSafeDFS<C> {
    type Item = DFSStep;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, dist)) = self.stack.pop() {
            let step = self.enter_node(node, dist);
            match &step {
                DFSStep::Cycle { .. } => return Some(step),
                DFSStep::Entered { distance, .. } => {
                    if *distance >= self.min_distance && *distance <= self.max_distance {
                        return Some(step);
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::storage::adjacencylist::AdjacencyListStorage;
    use crate::graph::storage::WriteableGraphStorage;
    use crate::types::Edge;

    fn sample_dag() -> AdjacencyListStorage {
        let mut gs = AdjacencyListStorage::new();
        let edges = [(1, 2), (2, 4), (1, 3), (3, 4), (3, 5), (5, 6), (5, 7)];
        for (s, t) in edges {
            gs.add_edge(Edge {
                source: s,
                target: t,
            })
            .unwrap();
        }
        gs
    }

    #[test]
    fn unique_dfs_collapses_duplicate_reachable_node() {
        // sample DAG {1->2, 2->4, 1->3, 3->4, 3->5, 5->6, 5->7}, root 1,
        // min=1, max=usize::MAX: yields {2,3,4,5,6,7} each exactly once.
        let gs = sample_dag();
        let mut found: Vec<NodeID> = UniqueDFS::new(&gs, 1, 1, usize::MAX).collect();
        found.sort_unstable();
        assert_eq!(found, vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn cycle_safe_dfs_detects_back_edge() {
        let mut gs = AdjacencyListStorage::new();
        gs.add_edge(Edge {
            source: 1,
            target: 2,
        })
        .unwrap();
        gs.add_edge(Edge {
            source: 2,
            target: 1,
        })
        .unwrap();
        let steps: Vec<DFSStep> = CycleSafeDFS::new(&gs, 1, 0, usize::MAX).collect();
        assert!(steps.iter().any(|s| matches!(s, DFSStep::Cycle { .. })));
    }
}
