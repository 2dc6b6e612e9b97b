//! The corpus graph: node annotations plus a set of
//! components, each backed by one of the strategies in [`storage`]. This is
//! the unit the corpus manager (graphannis crate) loads, mutates via
//! [`Graph::apply_update`], and persists.

pub mod storage;
pub mod update;

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::annostorage::inmemory::AnnoStorageImpl;
use crate::annostorage::AnnotationStorage;
use crate::errors::{GraphAnnisCoreError, Result};
use crate::graph::storage::registry;
use crate::graph::storage::{GraphStorage, WriteableGraphStorage};
use crate::types::{AnnoKey, Annotation, Component, ComponentType, Edge, NodeID};
use update::{GraphUpdate, UpdateEvent};

pub const ANNIS_NS: &str = "annis";
pub const NODE_NAME: &str = "node_name";
pub const NODE_TYPE: &str = "node_type";
pub const TOK: &str = "tok";

/// A fully in-memory representation of a corpus graph: node annotations plus
/// a set of components, each carrying its own edge storage.
pub struct Graph {
    node_annos: AnnoStorageImpl<NodeID>,
    components: BTreeMap<Component, Option<Arc<dyn GraphStorage>>>,
    location: Option<PathBuf>,
    current_change_id: u64,
}

/// The key of the reserved `(annis_ns, node_name)` annotation every content
/// node carries exactly one of.
pub fn node_name_key() -> AnnoKey {
    AnnoKey {
        ns: ANNIS_NS.to_string(),
        name: NODE_NAME.to_string(),
    }
}

/// The key of the reserved `(annis_ns, node_type)` annotation distinguishing
/// content nodes (`"node"`) from sub-corpus/document nodes (`"corpus"`).
pub fn node_type_key() -> AnnoKey {
    AnnoKey {
        ns: ANNIS_NS.to_string(),
        name: NODE_TYPE.to_string(),
    }
}

/// The key of the reserved `(annis_ns, tok)` annotation a token node carries
/// at most one of.
pub fn token_key() -> AnnoKey {
    AnnoKey {
        ns: ANNIS_NS.to_string(),
        name: TOK.to_string(),
    }
}

fn component_to_relative_path(c: &Component) -> PathBuf {
    let mut p = PathBuf::new();
    p.push("gs");
    p.push(c.ctype.to_string());
    p.push(if c.layer.is_empty() { "default_layer" } else { &c.layer });
    p.push(&c.name);
    p
}

impl Default for Graph {
    fn default() -> Self {
        Graph {
            node_annos: AnnoStorageImpl::new(),
            components: BTreeMap::new(),
            location: None,
            current_change_id: 0,
        }
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear(&mut self) {
        self.node_annos = AnnoStorageImpl::new();
        self.components.clear();
        self.current_change_id = 0;
    }

    pub fn get_node_annos(&self) -> &dyn AnnotationStorage<NodeID> {
        &self.node_annos
    }

    pub fn get_node_annos_mut(&mut self) -> &mut dyn AnnotationStorage<NodeID> {
        &mut self.node_annos
    }

    pub fn get_node_id_from_name(&self, node_name: &str) -> Option<NodeID> {
        let key = node_name_key();
        self.node_annos
            .exact_anno_search(Some(&key.ns), &key.name, crate::annostorage::ValueSearch::Some(node_name))
            .map(|(node, _)| node)
            .next()
    }

    /// Rough in-memory footprint in bytes, used by the corpus manager's
    /// cache byte-budget.
    pub fn estimate_memory_size(&self) -> usize {
        let anno_bytes = self.node_annos.len().saturating_mul(96);
        let component_bytes: usize = self
            .components
            .values()
            .filter_map(|c| c.as_ref())
            .map(|gs| gs.size_estimate_bytes())
            .sum();
        anno_bytes + component_bytes
    }

    pub fn get_all_components(&self, ctype: Option<ComponentType>, name: Option<&str>) -> Vec<Component> {
        self.components
            .keys()
            .filter(|c| ctype.map_or(true, |t| c.ctype == t))
            .filter(|c| name.map_or(true, |n| c.name == n))
            .cloned()
            .collect()
    }

    pub fn is_loaded(&self, c: &Component) -> bool {
        matches!(self.components.get(c), Some(Some(_)))
    }

    /// Get a read-only, reference-counted handle to a component's storage.
    pub fn get_graphstorage(&self, c: &Component) -> Option<Arc<dyn GraphStorage>> {
        self.components.get(c).and_then(|gs| gs.clone())
    }

    pub fn get_graphstorage_as_ref<'a>(&'a self, c: &Component) -> Option<&'a dyn GraphStorage> {
        self.components.get(c).and_then(|gs| gs.as_deref())
    }

    /// Get the given component's storage, creating an empty adjacency list if
    /// absent, or converting an existing non-writable storage in place —
    /// the adjacency list is the only strategy that implements the
    /// writable sub-trait.
    pub fn get_or_create_writable(&mut self, c: &Component) -> Result<&mut dyn WriteableGraphStorage> {
        if !self.components.contains_key(c) {
            self.components
                .insert(c.clone(), Some(Arc::new(registry::create_writeable())));
        } else {
            self.insert_or_copy_writeable(c)?;
        }

        let entry = self
            .components
            .get_mut(c)
            .ok_or_else(|| GraphAnnisCoreError::MissingComponent(c.to_string()))?
            .as_mut()
            .ok_or_else(|| GraphAnnisCoreError::ComponentNotLoaded(c.to_string()))?;
        let gs_mut = Arc::get_mut(entry).ok_or_else(|| GraphAnnisCoreError::NonExclusiveComponentReference(c.to_string()))?;
        gs_mut
            .as_writeable()
            .ok_or_else(|| GraphAnnisCoreError::ReadOnlyComponent(c.to_string()))
    }

    fn insert_or_copy_writeable(&mut self, c: &Component) -> Result<()> {
        self.ensure_loaded(c)?;
        let is_adjacency_list = match self.components.get(c) {
            Some(Some(gs)) => gs
                .as_any()
                .downcast_ref::<storage::adjacencylist::AdjacencyListStorage>()
                .is_some(),
            _ => true,
        };
        if !is_adjacency_list {
            let orig = self
                .components
                .get(c)
                .and_then(|gs| gs.clone())
                .ok_or_else(|| GraphAnnisCoreError::MissingComponent(c.to_string()))?;
            let mut copy = registry::create_writeable();
            copy.copy(&self.node_annos, orig.as_ref())?;
            self.components.insert(c.clone(), Some(Arc::new(copy)));
        }
        Ok(())
    }

    pub fn ensure_loaded(&mut self, c: &Component) -> Result<()> {
        if let Some(None) = self.components.get(c) {
            let location = self.component_path(c).ok_or(GraphAnnisCoreError::EmptyComponentPath)?;
            let gs = load_component_from_disk(&location)?;
            self.components.insert(c.clone(), Some(gs));
        }
        Ok(())
    }

    pub fn ensure_loaded_all(&mut self) -> Result<()> {
        use rayon::prelude::*;

        let to_load: Vec<Component> = self
            .components
            .iter()
            .filter(|(_, gs)| gs.is_none())
            .map(|(c, _)| c.clone())
            .collect();
        if to_load.is_empty() {
            return Ok(());
        }

        let this: &Graph = self;
        let loaded: Vec<(Component, Result<Arc<dyn GraphStorage>>)> = to_load
            .into_par_iter()
            .map(|c| {
                let result = this
                    .component_path(&c)
                    .ok_or(GraphAnnisCoreError::EmptyComponentPath)
                    .and_then(|p| load_component_from_disk(&p));
                (c, result)
            })
            .collect();

        for (c, gs) in loaded {
            self.components.insert(c, Some(gs?));
        }
        Ok(())
    }

    pub fn calculate_component_statistics(&mut self, c: &Component) -> Result<()> {
        self.ensure_loaded(c)?;
        let entry = self
            .components
            .get_mut(c)
            .ok_or_else(|| GraphAnnisCoreError::MissingComponent(c.to_string()))?
            .as_mut()
            .ok_or_else(|| GraphAnnisCoreError::ComponentNotLoaded(c.to_string()))?;
        if let Some(gs_mut) = Arc::get_mut(entry) {
            gs_mut.calculate_statistics();
        }
        Ok(())
    }

    /// Convert the component's storage to the strategy the registry
    /// recommends for its current statistics, if different.
    pub fn optimize_impl(&mut self, c: &Component) -> Result<()> {
        self.ensure_loaded(c)?;
        let (current_id, stats) = match self.get_graphstorage(c) {
            Some(gs) => (gs.serialization_id(), gs.get_statistics().cloned()),
            None => return Ok(()),
        };
        let stats = match stats {
            Some(s) => s,
            None => return Ok(()),
        };
        let target_id = registry::recommended_serialization_id(&stats);
        if target_id != current_id {
            let orig = self.get_graphstorage(c).unwrap();
            let new_gs = registry::convert_component(&target_id, &self.node_annos, orig.as_ref())?;
            self.components.insert(c.clone(), Some(Arc::from(new_gs)));
            log::info!("converted component {} to implementation {}", c, target_id);
        }
        Ok(())
    }

    fn component_path(&self, c: &Component) -> Option<PathBuf> {
        let location = self.location.as_ref()?;
        Some(location.join("current").join(component_to_relative_path(c)))
    }

    /// Apply a sequence of updates in order, only persisting the write-ahead
    /// log if this graph has a disk location.
    pub fn apply_update(&mut self, u: &mut GraphUpdate) -> Result<()> {
        self.ensure_loaded_all()?;
        self.apply_update_in_memory(u)?;

        if let Some(location) = self.location.clone() {
            let current_path = location.join("current");
            fs::create_dir_all(&current_path)?;
            let log_path = current_path.join("update_log.bin");
            let tmp = tempfile::NamedTempFile::new_in(&current_path)?;
            bincode::serialize_into(tmp.as_file(), &u)?;
            tmp.as_file().flush()?;
            tmp.persist(&log_path)?;
        }
        Ok(())
    }

    fn apply_update_in_memory(&mut self, u: &mut GraphUpdate) -> Result<()> {
        if !u.is_consistent() {
            u.finish();
        }

        let all_components = self.get_all_components(None, None);
        let mut node_ids: FxHashMap<String, Option<NodeID>> = FxHashMap::default();

        for (id, change) in u.iter() {
            log::trace!("applying event {:?}", change);
            match change {
                UpdateEvent::AddNode { node_name, node_type } => {
                    if self.cached_node_id(node_name, &mut node_ids).is_none() {
                        let new_id = self.node_annos.get_largest_item().map_or(0, |i| i + 1);
                        self.node_annos.insert(
                            new_id,
                            Annotation {
                                key: node_name_key(),
                                val: node_name.clone(),
                            },
                        )?;
                        self.node_annos.insert(
                            new_id,
                            Annotation {
                                key: node_type_key(),
                                val: node_type.clone(),
                            },
                        )?;
                        node_ids.insert(node_name.clone(), Some(new_id));
                    }
                }
                UpdateEvent::DeleteNode { node_name } => {
                    if let Some(existing) = self.cached_node_id(node_name, &mut node_ids) {
                        for a in self.node_annos.get_annotations_for_item(&existing) {
                            self.node_annos.remove_annotation_for_item(&existing, &a.key)?;
                        }
                        for c in &all_components {
                            if let Ok(gs) = self.get_or_create_writable(c) {
                                gs.delete_node(existing)?;
                            }
                        }
                    }
                }
                UpdateEvent::AddNodeLabel {
                    node_name,
                    anno_ns,
                    anno_name,
                    anno_value,
                } => {
                    if let Some(existing) = self.cached_node_id(node_name, &mut node_ids) {
                        self.node_annos.insert(
                            existing,
                            Annotation {
                                key: AnnoKey {
                                    ns: anno_ns.clone(),
                                    name: anno_name.clone(),
                                },
                                val: anno_value.clone(),
                            },
                        )?;
                    }
                }
                UpdateEvent::DeleteNodeLabel {
                    node_name,
                    anno_ns,
                    anno_name,
                } => {
                    if let Some(existing) = self.cached_node_id(node_name, &mut node_ids) {
                        self.node_annos.remove_annotation_for_item(
                            &existing,
                            &AnnoKey {
                                ns: anno_ns.clone(),
                                name: anno_name.clone(),
                            },
                        )?;
                    }
                }
                UpdateEvent::AddEdge {
                    source_node,
                    target_node,
                    layer,
                    component_type,
                    component_name,
                } => {
                    let source = self.cached_node_id(source_node, &mut node_ids);
                    let target = self.cached_node_id(target_node, &mut node_ids);
                    if let (Some(source), Some(target)) = (source, target) {
                        if let Ok(ctype) = component_type.parse::<ComponentType>() {
                            let c = Component::new(ctype, layer.clone(), component_name.clone());
                            let gs = self.get_or_create_writable(&c)?;
                            gs.add_edge(Edge { source, target })?;
                        }
                    }
                }
                UpdateEvent::DeleteEdge {
                    source_node,
                    target_node,
                    layer,
                    component_type,
                    component_name,
                } => {
                    let source = self.cached_node_id(source_node, &mut node_ids);
                    let target = self.cached_node_id(target_node, &mut node_ids);
                    if let (Some(source), Some(target)) = (source, target) {
                        if let Ok(ctype) = component_type.parse::<ComponentType>() {
                            let c = Component::new(ctype, layer.clone(), component_name.clone());
                            let gs = self.get_or_create_writable(&c)?;
                            gs.delete_edge(&Edge { source, target })?;
                        }
                    }
                }
                UpdateEvent::AddEdgeLabel {
                    source_node,
                    target_node,
                    layer,
                    component_type,
                    component_name,
                    anno_ns,
                    anno_name,
                    anno_value,
                } => {
                    let source = self.cached_node_id(source_node, &mut node_ids);
                    let target = self.cached_node_id(target_node, &mut node_ids);
                    if let (Some(source), Some(target)) = (source, target) {
                        if let Ok(ctype) = component_type.parse::<ComponentType>() {
                            let c = Component::new(ctype, layer.clone(), component_name.clone());
                            let gs = self.get_or_create_writable(&c)?;
                            if gs.is_connected(source, target, 1, 1) {
                                gs.add_edge_anno(
                                    Edge { source, target },
                                    Annotation {
                                        key: AnnoKey {
                                            ns: anno_ns.clone(),
                                            name: anno_name.clone(),
                                        },
                                        val: anno_value.clone(),
                                    },
                                )?;
                            }
                        }
                    }
                }
                UpdateEvent::DeleteEdgeLabel {
                    source_node,
                    target_node,
                    layer,
                    component_type,
                    component_name,
                    anno_ns,
                    anno_name,
                } => {
                    let source = self.cached_node_id(source_node, &mut node_ids);
                    let target = self.cached_node_id(target_node, &mut node_ids);
                    if let (Some(source), Some(target)) = (source, target) {
                        if let Ok(ctype) = component_type.parse::<ComponentType>() {
                            let c = Component::new(ctype, layer.clone(), component_name.clone());
                            let gs = self.get_or_create_writable(&c)?;
                            if gs.is_connected(source, target, 1, 1) {
                                gs.delete_edge_anno(
                                    &Edge { source, target },
                                    &AnnoKey {
                                        ns: anno_ns.clone(),
                                        name: anno_name.clone(),
                                    },
                                )?;
                            }
                        }
                    }
                }
            }
            self.current_change_id = id;
        }
        Ok(())
    }

    fn cached_node_id(&self, node_name: &str, cache: &mut FxHashMap<String, Option<NodeID>>) -> Option<NodeID> {
        if let Some(id) = cache.get(node_name) {
            return *id;
        }
        let id = self.get_node_id_from_name(node_name);
        cache.insert(node_name.to_string(), id);
        id
    }

    pub fn current_change_id(&self) -> u64 {
        self.current_change_id
    }

    fn internal_save(&mut self, location: &Path) -> Result<()> {
        self.ensure_loaded_all()?;
        fs::create_dir_all(location)?;
        self.node_annos.save_annotations_to(location)?;

        for (c, entry) in &self.components {
            if let Some(gs) = entry {
                let dir = location.join(component_to_relative_path(c));
                fs::create_dir_all(&dir)?;
                gs.save_to(&dir)?;
                let mut f = fs::File::create(dir.join("impl.cfg"))?;
                f.write_all(gs.serialization_id().as_bytes())?;
            }
        }
        Ok(())
    }

    /// Save to `location/current`, without remembering it as this graph's
    /// on-disk location.
    pub fn save_to(&mut self, location: &Path) -> Result<()> {
        self.internal_save(&location.join("current"))
    }

    /// Save to `location/current` and remember `location` as this graph's
    /// on-disk location for subsequent `apply_update` calls.
    pub fn persist_to(&mut self, location: &Path) -> Result<()> {
        self.location = Some(location.to_path_buf());
        self.internal_save(&location.join("current"))
    }

    /// Load a corpus from `location`. If `backup/`
    /// is present it is the last consistent snapshot and is loaded instead
    /// of `current/`; any outstanding `update_log.bin` is replayed
    /// afterwards.
    pub fn load_from(&mut self, location: &Path, preload: bool) -> Result<()> {
        self.clear();
        self.location = Some(location.to_path_buf());

        let backup = location.join("backup");
        let backup_was_loaded = backup.is_dir();
        let dir_to_load = if backup_was_loaded { backup.clone() } else { location.join("current") };

        let mut node_annos = AnnoStorageImpl::new();
        node_annos.load_annotations_from(&dir_to_load)?;
        self.node_annos = node_annos;

        self.find_components_from_disk(&dir_to_load)?;

        let log_path = dir_to_load.join("update_log.bin");
        let logfile_exists = log_path.is_file();

        if preload || logfile_exists || backup_was_loaded {
            self.ensure_loaded_all()?;
        }

        if logfile_exists {
            let f = fs::File::open(&log_path)?;
            let update: GraphUpdate = bincode::deserialize_from(f)?;
            let watermark = self.current_change_id;
            let mut replay = GraphUpdate::new();
            for (_, e) in update.iter_after(watermark) {
                replay.add_event(e.clone());
            }
            replay.finish();
            self.apply_update_in_memory(&mut replay)?;
        }

        if backup_was_loaded {
            self.internal_save(&location.join("current"))?;
            fs::remove_dir_all(&backup)?;
        }

        Ok(())
    }

    fn find_components_from_disk(&mut self, location: &Path) -> Result<()> {
        self.components.clear();
        for &ctype in ComponentType::all() {
            let ctype_path = location.join("gs").join(ctype.to_string());
            if !ctype_path.is_dir() {
                continue;
            }
            for layer_entry in fs::read_dir(&ctype_path)? {
                let layer_entry = layer_entry?;
                if !layer_entry.path().is_dir() {
                    continue;
                }
                let layer = layer_entry.file_name().to_string_lossy().to_string();
                let empty = Component::new(ctype, layer.clone(), String::new());
                if location.join(component_to_relative_path(&empty)).join("impl.cfg").is_file() {
                    self.components.insert(empty, None);
                }
                for name_entry in fs::read_dir(layer_entry.path())? {
                    let name_entry = name_entry?;
                    let name = name_entry.file_name().to_string_lossy().to_string();
                    let named = Component::new(ctype, layer.clone(), name);
                    if location.join(component_to_relative_path(&named)).join("impl.cfg").is_file() {
                        self.components.insert(named, None);
                    }
                }
            }
        }
        Ok(())
    }
}

fn load_component_from_disk(location: &Path) -> Result<Arc<dyn GraphStorage>> {
    let impl_path = location.join("impl.cfg");
    let impl_name = fs::read_to_string(impl_path)?;
    let gs = registry::load_by_serialization_id(&impl_name, location)?;
    Ok(Arc::from(gs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_node_and_edge_via_update_script() {
        let mut g = Graph::new();
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNode {
            node_name: "n2".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddEdge {
            source_node: "n1".into(),
            target_node: "n2".into(),
            layer: "test".into(),
            component_type: "Pointing".into(),
            component_name: "dep".into(),
        });
        u.finish();
        g.apply_update(&mut u).unwrap();

        let n1 = g.get_node_id_from_name("n1").unwrap();
        let n2 = g.get_node_id_from_name("n2").unwrap();
        let c = Component::new(ComponentType::Pointing, "test".into(), "dep".into());
        let gs = g.get_graphstorage(&c).unwrap();
        assert_eq!(gs.distance(n1, n2), Some(1));
    }

    #[test]
    fn delete_node_removes_incident_edges() {
        let mut g = Graph::new();
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNode {
            node_name: "n2".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddEdge {
            source_node: "n1".into(),
            target_node: "n2".into(),
            layer: "".into(),
            component_type: "Pointing".into(),
            component_name: "dep".into(),
        });
        u.add_event(UpdateEvent::DeleteNode { node_name: "n2".into() });
        u.finish();
        g.apply_update(&mut u).unwrap();

        assert!(g.get_node_id_from_name("n2").is_none());
        let c = Component::new(ComponentType::Pointing, "".into(), "dep".into());
        let gs = g.get_graphstorage(&c).unwrap();
        assert_eq!(gs.source_nodes().count(), 0);
    }
}
