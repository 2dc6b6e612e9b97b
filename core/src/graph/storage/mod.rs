//! The graph-storage family: one edge container per component,
//! behind a common read interface, with a writable sub-trait implemented by
//! exactly one strategy (the adjacency list).

pub mod adjacencylist;
pub mod dfs;
pub mod linear;
pub mod numvalue;
pub mod prepost;
pub mod registry;

use std::any::Any;

use graphannis_malloc_size_of::MallocSizeOf;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::annostorage::AnnotationStorage;
use crate::errors::Result;
use crate::types::{AnnoKey, Annotation, Edge, NodeID};

/// Derived per-component metrics used by the planner for selectivity
/// estimation and by the registry heuristic to choose a storage strategy.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, MallocSizeOf)]
pub struct GraphStatistic {
    pub cyclic: bool,
    pub rooted_tree: bool,
    pub nodes: usize,
    pub avg_fan_out: f64,
    pub fan_out_99_percentile: usize,
    pub max_fan_out: usize,
    pub max_depth: usize,
    /// Only meaningful for acyclic graphs: `visits / nodes` of a DFS walk.
    pub dfs_visit_ratio: f64,
}

/// The read-only edge-container interface every storage strategy implements.
pub trait EdgeContainer: Sync + Send {
    fn out_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a>;
    fn in_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a>;

    fn get_statistics(&self) -> Option<&GraphStatistic> {
        None
    }

    /// Nodes that are the source of at least one edge in this component.
    fn source_nodes<'a>(&'a self) -> Box<dyn Iterator<Item = NodeID> + 'a>;
}

/// Lets `dfs` hold a plain reference to any `EdgeContainer` by value, so the
/// same DFS structs work whether the container is borrowed directly or
/// wrapped in an adapter (e.g. an inverse-direction view).
impl<'b, T: EdgeContainer + ?Sized> EdgeContainer for &'b T {
    fn out_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        (**self).out_edges(node)
    }
    fn in_edges<'a>(&'a self, node: NodeID) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        (**self).in_edges(node)
    }
    fn get_statistics(&self) -> Option<&GraphStatistic> {
        (**self).get_statistics()
    }
    fn source_nodes<'a>(&'a self) -> Box<dyn Iterator<Item = NodeID> + 'a> {
        (**self).source_nodes()
    }
}

/// The full read-only graph storage interface.
pub trait GraphStorage: EdgeContainer {
    fn find_connected<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a>;

    fn find_connected_inverse<'a>(
        &'a self,
        node: NodeID,
        min_distance: usize,
        max_distance: usize,
    ) -> Box<dyn Iterator<Item = NodeID> + 'a>;

    fn distance(&self, source: NodeID, target: NodeID) -> Option<usize>;

    fn is_connected(&self, source: NodeID, target: NodeID, min_distance: usize, max_distance: usize) -> bool {
        self.distance(source, target)
            .map_or(false, |d| d >= min_distance && d <= max_distance)
    }

    fn get_anno_storage(&self) -> &dyn AnnotationStorage<Edge>;

    fn edge_annos(&self, edge: &Edge) -> Vec<Annotation> {
        self.get_anno_storage().get_annotations_for_item(edge)
    }

    /// Copy every edge and edge annotation of `orig` into `self`, used by the
    /// registry's `convert_component`.
    fn copy(&mut self, node_annos: &dyn AnnotationStorage<NodeID>, orig: &dyn GraphStorage) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_edgecontainer(&self) -> &dyn EdgeContainer;
    fn as_writeable(&mut self) -> Option<&mut dyn WriteableGraphStorage> {
        None
    }

    fn calculate_statistics(&mut self) {}

    /// A short tag identifying the concrete strategy, persisted as `impl.cfg`
    /// next to the component's binary payload.
    fn serialization_id(&self) -> String;

    fn save_to(&self, location: &Path) -> Result<()>;

    /// Rough in-memory footprint in bytes, used by the corpus manager's
    /// cache byte-budget. Derived from the component's own
    /// statistics rather than a full allocator walk, since the strategies
    /// behind this trait object don't uniformly expose one.
    fn size_estimate_bytes(&self) -> usize {
        self.get_statistics()
            .map_or(4096, |s| (s.nodes as usize).saturating_mul(64))
    }
}

/// The writable sub-trait; only the adjacency-list strategy implements it
///.
pub trait WriteableGraphStorage: GraphStorage {
    fn add_edge(&mut self, edge: Edge) -> Result<()>;
    fn add_edge_anno(&mut self, edge: Edge, anno: Annotation) -> Result<()>;

    fn delete_edge(&mut self, edge: &Edge) -> Result<()>;
    fn delete_edge_anno(&mut self, edge: &Edge, key: &AnnoKey) -> Result<()>;

    /// Remove `node` as the source or target of every edge in this component,
    /// along with its edge annotations.
    fn delete_node(&mut self, node: NodeID) -> Result<()>;
}
