//! The fallback strategy: general-purpose and the only one that
//! is writable. Chosen for shallow (`max_depth <= 1`) or cyclic graphs, and
//! used unconditionally while a corpus is being built via `apply_update`.

use std::any::Any;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::dfs::{CycleSafeDFS, DFSStep, UniqueDFS};
use super::{EdgeContainer, GraphStatistic, GraphStorage, WriteableGraphStorage};
use crate::annostorage::inmemory::AnnoStorageImpl;
use crate::annostorage::AnnotationStorage;
use crate::errors::Result;
use crate::types::{AnnoKey, Annotation, Edge, NodeID};

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AdjacencyListStorage {
    edges: BTreeSet<Edge>,
    inverse_edges: BTreeSet<Edge>,
    annos: AnnoStorageImpl<Edge>,
    stats: Option<GraphStatistic>,
}

impl AdjacencyListStorage {
    pub fn new() -> AdjacencyListStorage {
        AdjacencyListStorage::default()
    }

    fn source_range(&self, source: NodeID) -> impl Iterator<Item = &Edge> {
        let start = Edge {
            source,
            target: NodeID::MIN,
        };
        let end = Edge {
            source,
            target: NodeID::MAX,
        };
        self.edges.range(start..=end)
    }

    fn target_range(&self, target: NodeID) -> impl Iterator<Item = &Edge> {
        let start = Edge {
            source: target,
            target: NodeID::MIN,
        };
        let end = Edge {
            source: target,
            target: NodeID::MAX,
        };
        self.inverse_edges.range(start..=end).map(|e| {
            debug_assert_eq!(e.source, target);
            e
        })
    }
}

impl EdgeContainer for AdjacencyListStorage {
    fn out_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(self.source_range(node).map(|e| e.target))
    }

    fn in_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(self.target_range(node).map(|e| e.target))
    }

    fn get_statistics(&self) -> Option<&GraphStatistic> {
        self.stats.as_ref()
    }

    fn source_nodes<'a>(&'a self) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(self.edges.iter().map(|e| e.source).collect::<BTreeSet<_>>().into_iter())
    }
}

impl GraphStorage for AdjacencyListStorage {
    fn find_connected<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(UniqueDFS::new(self, node, min_distance, max_distance))
    }

    fn find_connected_inverse<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(UniqueDFS::new(
            InverseView(self),
            node,
            min_distance,
            max_distance,
        ))
    }

    fn distance(&self, source: NodeID, target: NodeID) -> Option<usize> {
        CycleSafeDFS::new(self, source, 0, usize::MAX)
            .filter_map(|step| match step {
                DFSStep::Entered { node, distance } if node == target => Some(distance),
                _ => None,
            })
            .next()
    }

    fn get_anno_storage(&self) -> &dyn AnnotationStorage<Edge> {
        &self.annos
    }

    fn copy(&mut self, _node_annos: &dyn AnnotationStorage<NodeID>, orig: &dyn GraphStorage) -> Result<()> {
        self.edges.clear();
        self.inverse_edges.clear();
        self.annos = AnnoStorageImpl::new();
        self.stats = None;
        for source in orig.source_nodes() {
            for target in orig.out_edges(source) {
                let edge = Edge { source, target };
                self.add_edge(edge)?;
                for anno in orig.edge_annos(&edge) {
                    self.add_edge_anno(edge, anno)?;
                }
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_edgecontainer(&self) -> &dyn EdgeContainer {
        self
    }

    fn as_writeable(&mut self) -> Option<&mut dyn WriteableGraphStorage> {
        Some(self)
    }

    fn calculate_statistics(&mut self) {
        let mut stats = GraphStatistic {
            max_depth: 1,
            ..Default::default()
        };

        let mut all_nodes: BTreeSet<NodeID> = BTreeSet::new();
        let mut roots: BTreeSet<NodeID> = BTreeSet::new();
        let mut has_incoming: BTreeSet<NodeID> = BTreeSet::new();
        stats.rooted_tree = true;
        for e in &self.edges {
            roots.insert(e.source);
            all_nodes.insert(e.source);
            all_nodes.insert(e.target);
            if stats.rooted_tree {
                if has_incoming.contains(&e.target) {
                    stats.rooted_tree = false;
                } else {
                    has_incoming.insert(e.target);
                }
            }
        }
        stats.nodes = all_nodes.len();

        let mut fan_outs: Vec<usize> = Vec::new();
        let mut sum_fan_out = 0usize;
        let mut last_source: Option<NodeID> = None;
        let mut current_fan_out = 0usize;
        for e in &self.edges {
            roots.remove(&e.target);
            if let Some(last) = last_source {
                if last != e.source {
                    stats.max_fan_out = stats.max_fan_out.max(current_fan_out);
                    sum_fan_out += current_fan_out;
                    fan_outs.push(current_fan_out);
                    current_fan_out = 0;
                }
            }
            last_source = Some(e.source);
            current_fan_out += 1;
        }
        if last_source.is_some() {
            stats.max_fan_out = stats.max_fan_out.max(current_fan_out);
            sum_fan_out += current_fan_out;
            fan_outs.push(current_fan_out);
        }
        fan_outs.sort_unstable();
        if let Some(&last) = fan_outs.last() {
            stats.fan_out_99_percentile = last;
        }
        if fan_outs.len() >= 100 {
            let idx = fan_outs.len() / 100;
            stats.fan_out_99_percentile = fan_outs[idx];
        }

        let mut number_of_visits = 0usize;
        if roots.is_empty() && !self.edges.is_empty() {
            stats.cyclic = true;
        } else {
            for root in &roots {
                for step in CycleSafeDFS::new(self, *root, 0, usize::MAX) {
                    match step {
                        DFSStep::Entered { distance, .. } => {
                            number_of_visits += 1;
                            stats.max_depth = stats.max_depth.max(distance);
                        }
                        DFSStep::Cycle { .. } => stats.cyclic = true,
                    }
                }
            }
        }

        if stats.cyclic {
            stats.rooted_tree = false;
            stats.max_depth = 0;
            stats.dfs_visit_ratio = 0.0;
        } else if stats.nodes > 0 {
            stats.dfs_visit_ratio = number_of_visits as f64 / stats.nodes as f64;
        }

        if stats.nodes > 0 {
            stats.avg_fan_out = sum_fan_out as f64 / stats.nodes as f64;
        }

        self.stats = Some(stats);
    }

    fn serialization_id(&self) -> String {
        "AdjacencyListV1".to_string()
    }

    fn save_to(&self, location: &Path) -> Result<()> {
        let f = File::create(location.join("component.bin"))?;
        bincode::serialize_into(BufWriter::new(f), self)?;
        Ok(())
    }
}

impl WriteableGraphStorage for AdjacencyListStorage {
    fn add_edge(&mut self, edge: Edge) -> Result<()> {
        // self-loops are silently discarded on insertion
        if edge.source != edge.target {
            self.inverse_edges.insert(edge.inverse());
            self.edges.insert(edge);
            self.stats = None;
        }
        Ok(())
    }

    fn add_edge_anno(&mut self, edge: Edge, anno: Annotation) -> Result<()> {
        if self.edges.contains(&edge) {
            self.annos.insert(edge, anno)?;
        }
        Ok(())
    }

    fn delete_edge(&mut self, edge: &Edge) -> Result<()> {
        self.edges.remove(edge);
        self.inverse_edges.remove(&edge.inverse());
        self.annos.remove_item(edge);
        self.stats = None;
        Ok(())
    }

    fn delete_edge_anno(&mut self, edge: &Edge, key: &AnnoKey) -> Result<()> {
        self.annos.remove_annotation_for_item(edge, key)?;
        Ok(())
    }

    fn delete_node(&mut self, node: NodeID) -> Result<()> {
        let to_delete: Vec<Edge> = self
            .source_range(node)
            .chain(self.target_range(node))
            .cloned()
            .collect();
        for e in to_delete {
            self.delete_edge(&e)?;
        }
        Ok(())
    }
}

/// Flips the edge direction so the same DFS code can walk "backwards" for
/// `find_connected_inverse`. Held by value inside the `UniqueDFS` it drives,
/// so the returned iterator owns its view instead of borrowing a temporary.
struct InverseView<'a>(&'a AdjacencyListStorage);

impl<'a> EdgeContainer for InverseView<'a> {
    fn out_edges<'b>(&'b self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'b> {
        self.0.in_edges(node)
    }
    fn in_edges<'b>(&'b self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'b> {
        self.0.out_edges(node)
    }
    fn source_nodes<'b>(&'b self) -> Box<dyn Iterator<Item = NodeID> + 'b> {
        self.0.source_nodes()
    }
}

pub fn load_from(location: &Path) -> Result<AdjacencyListStorage> {
    let f = File::open(location.join("component.bin"))?;
    let storage = bincode::deserialize_from(BufReader::new(f))?;
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AdjacencyListStorage {
        let mut gs = AdjacencyListStorage::new();
        for (s, t) in [(1, 2), (2, 4), (1, 3), (3, 5), (5, 7), (5, 6), (3, 4)] {
            gs.add_edge(Edge {
                source: s,
                target: t,
            })
            .unwrap();
        }
        gs
    }

    #[test]
    fn out_edges_are_returned_in_target_order() {
        let gs = sample();
        assert_eq!(gs.out_edges(1).collect::<Vec<_>>(), vec![2, 3]);
        assert_eq!(gs.out_edges(3).collect::<Vec<_>>(), vec![4, 5]);
        assert_eq!(gs.out_edges(6).count(), 0);
    }

    #[test]
    fn find_connected_respects_distance_bounds() {
        let gs = sample();
        let mut reachable: Vec<NodeID> = gs.find_connected(1, 1, 100).collect();
        reachable.sort_unstable();
        assert_eq!(reachable, vec![2, 3, 4, 5, 6, 7]);

        let mut reachable: Vec<NodeID> = gs.find_connected(3, 2, 100).collect();
        reachable.sort_unstable();
        assert_eq!(reachable, vec![6, 7]);

        assert!(gs.find_connected(7, 1, 100).next().is_none());
    }

    #[test]
    fn find_connected_inverse_walks_edges_backwards() {
        let gs = sample();
        let mut reachable: Vec<NodeID> = gs.find_connected_inverse(4, 1, 100).collect();
        reachable.sort_unstable();
        assert_eq!(reachable, vec![1, 2, 3]);
    }

    #[test]
    fn self_loops_are_discarded() {
        let mut gs = AdjacencyListStorage::new();
        gs.add_edge(Edge {
            source: 1,
            target: 1,
        })
        .unwrap();
        assert_eq!(gs.out_edges(1).count(), 0);
    }

    #[test]
    fn delete_node_removes_incident_edges_and_annotations() {
        let mut gs = sample();
        gs.add_edge_anno(
            Edge {
                source: 1,
                target: 2,
            },
            Annotation {
                key: AnnoKey {
                    ns: "test".into(),
                    name: "a".into(),
                },
                val: "x".into(),
            },
        )
        .unwrap();
        gs.delete_node(2).unwrap();
        assert_eq!(gs.out_edges(1).collect::<Vec<_>>(), vec![3]);
        assert!(gs
            .get_anno_storage()
            .get_annotations_for_item(&Edge {
                source: 1,
                target: 2
            })
            .is_empty());
    }

    #[test]
    fn statistics_detect_cyclic_graph() {
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
        gs.calculate_statistics();
        assert!(gs.get_statistics().unwrap().cyclic);
    }

    #[test]
    fn statistics_detect_rooted_tree() {
        let mut gs = sample();
        gs.calculate_statistics();
        let stats = gs.get_statistics().unwrap();
        assert!(!stats.cyclic);
        assert_eq!(stats.nodes, 7);
    }
}
