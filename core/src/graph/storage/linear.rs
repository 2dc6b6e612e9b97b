//! `Linear<Pos>`: chosen for a rooted tree whose `max_fan_out`
//! is at most 1, i.e. the component is a disjoint union of straight chains.
//! Each node is assigned a position along its chain; connectivity reduces to
//! position arithmetic, no traversal needed.

use std::any::Any;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::numvalue::NumValue;
use super::{EdgeContainer, GraphStatistic, GraphStorage, WriteableGraphStorage};
use crate::annostorage::inmemory::AnnoStorageImpl;
use crate::annostorage::AnnotationStorage;
use crate::errors::Result;
use crate::types::{Annotation, Edge, NodeID};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct LinearStorage<Pos: NumValue> {
    /// `node -> (chain root, position within chain)`.
    node_chains: FxHashMap<NodeID, (NodeID, Pos)>,
    /// `(chain root, position) -> node`, ordered for range queries.
    chain_nodes: BTreeMap<(NodeID, Pos), NodeID>,
    annos: AnnoStorageImpl<Edge>,
    stats: Option<GraphStatistic>,
}

impl<Pos: NumValue + Serialize + DeserializeOwned> Default for LinearStorage<Pos> {
    fn default() -> Self {
        LinearStorage {
            node_chains: FxHashMap::default(),
            chain_nodes: BTreeMap::new(),
            annos: AnnoStorageImpl::new(),
            stats: None,
        }
    }
}

impl<Pos: NumValue + Serialize + DeserializeOwned> LinearStorage<Pos> {
    pub fn new() -> Self {
        Self::default()
    }

    fn position_of(&self, node: NodeID) -> Option<(NodeID, Pos)> {
        self.node_chains.get(&node).copied()
    }
}

impl<Pos: NumValue + Serialize + DeserializeOwned> EdgeContainer for LinearStorage<Pos> {
    fn out_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        if let Some((root, pos)) = self.position_of(node) {
            if let Some(next_pos) = pos.checked_add_one() {
                if let Some(&child) = self.chain_nodes.get(&(root, next_pos)) {
                    return Box::new(std::iter::once(child));
                }
            }
        }
        Box::new(std::iter::empty())
    }

    fn in_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        if let Some((root, pos)) = self.position_of(node) {
            if pos.to_usize() > 0 {
                if let Some(prev_pos) = Pos::from_usize(pos.to_usize() - 1) {
                    if let Some(&parent) = self.chain_nodes.get(&(root, prev_pos)) {
                        return Box::new(std::iter::once(parent));
                    }
                }
            }
        }
        Box::new(std::iter::empty())
    }

    fn get_statistics(&self) -> Option<&GraphStatistic> {
        self.stats.as_ref()
    }

    fn source_nodes<'a>(&'a self) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        Box::new(
            self.node_chains
                .keys()
                .copied()
                .filter(move |n| self.out_edges(*n).next().is_some()),
        )
    }
}

impl<Pos: NumValue + Serialize + DeserializeOwned> GraphStorage for LinearStorage<Pos> {
    fn find_connected<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        let (root, pos) = match self.position_of(node) {
            Some(v) => v,
            None => return Box::new(std::iter::empty()),
        };
        let lower = pos.to_usize().saturating_add(min_distance.max(1));
        let upper = pos.to_usize().saturating_add(max_distance);
        let it = (lower..=upper).filter_map(move |p| {
            let p = Pos::from_usize(p)?;
            self.chain_nodes.get(&(root, p)).copied()
        });
        Box::new(it)
    }

    fn find_connected_inverse<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        let (root, pos) = match self.position_of(node) {
            Some(v) => v,
            None => return Box::new(std::iter::empty()),
        };
        let pos = pos.to_usize();
        let lower = min_distance.max(1);
        let upper = max_distance.min(pos);
        if lower > upper {
            return Box::new(std::iter::empty());
        }
        let it = (lower..=upper).rev().filter_map(move |d| {
            let p = Pos::from_usize(pos - d)?;
            self.chain_nodes.get(&(root, p)).copied()
        });
        Box::new(it)
    }

    fn distance(&self, source: NodeID, target: NodeID) -> Option<usize> {
        let (root_s, pos_s) = self.position_of(source)?;
        let (root_t, pos_t) = self.position_of(target)?;
        if root_s != root_t || pos_t < pos_s {
            return None;
        }
        Some(pos_t.to_usize() - pos_s.to_usize())
    }

    fn get_anno_storage(&self) -> &dyn AnnotationStorage<Edge> {
        &self.annos
    }

    fn copy(&mut self, _node_annos: &dyn AnnotationStorage<NodeID>, orig: &dyn GraphStorage) -> Result<()> {
        self.node_chains.clear();
        self.chain_nodes.clear();
        self.annos = AnnoStorageImpl::new();
        self.stats = orig.get_statistics().cloned();

        let mut has_incoming: std::collections::HashSet<NodeID> = std::collections::HashSet::new();
        let mut all_sources: Vec<NodeID> = orig.source_nodes().collect();
        for &s in &all_sources {
            for t in orig.out_edges(s) {
                has_incoming.insert(t);
            }
        }
        all_sources.sort_unstable();

        for &root in &all_sources {
            if has_incoming.contains(&root) {
                continue;
            }
            let mut node = root;
            let mut pos = 0usize;
            loop {
                let p = match Pos::from_usize(pos) {
                    Some(p) => p,
                    None => break,
                };
                self.node_chains.insert(node, (root, p));
                self.chain_nodes.insert((root, p), node);
                let mut children = orig.out_edges(node);
                let next = children.next();
                match next {
                    Some(child) => {
                        let edge = Edge {
                            source: node,
                            target: child,
                        };
                        for anno in orig.edge_annos(&edge) {
                            self.annos.insert(edge, anno)?;
                        }
                        node = child;
                        pos += 1;
                    }
                    None => break,
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

    fn calculate_statistics(&mut self) {
        // statistics of a chain family are carried over from the source
        // component at `copy()` time; nothing to recompute here.
    }

    fn serialization_id(&self) -> String {
        format!("LinearV1_{}", std::mem::size_of::<Pos>())
    }

    fn save_to(&self, location: &Path) -> Result<()> {
        let f = File::create(location.join("component.bin"))?;
        bincode::serialize_into(BufWriter::new(f), self)?;
        Ok(())
    }
}

pub fn load_from<Pos>(location: &Path) -> Result<LinearStorage<Pos>>
where
    Pos: NumValue + Serialize + DeserializeOwned,
{
    let f = File::open(location.join("component.bin"))?;
    let storage = bincode::deserialize_from(BufReader::new(f))?;
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::storage::adjacencylist::AdjacencyListStorage;

    fn chain() -> AdjacencyListStorage {
        let mut gs = AdjacencyListStorage::new();
        for (s, t) in [(1, 2), (2, 3), (3, 4)] {
            gs.add_edge(Edge {
                source: s,
                target: t,
            })
            .unwrap();
        }
        gs
    }

    #[test]
    fn copy_assigns_sequential_positions_along_chain() {
        let src = chain();
        let mut linear: LinearStorage<u8> = LinearStorage::new();
        let node_annos = AnnoStorageImpl::<NodeID>::new();
        linear.copy(&node_annos, &src).unwrap();
        assert_eq!(linear.distance(1, 4), Some(3));
        assert_eq!(linear.out_edges(1).collect::<Vec<_>>(), vec![2]);
        assert_eq!(linear.in_edges(4).collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn find_connected_respects_bounds() {
        let src = chain();
        let mut linear: LinearStorage<u8> = LinearStorage::new();
        let node_annos = AnnoStorageImpl::<NodeID>::new();
        linear.copy(&node_annos, &src).unwrap();
        let reachable: Vec<NodeID> = linear.find_connected(1, 2, 3).collect();
        assert_eq!(reachable, vec![3, 4]);
    }
}
