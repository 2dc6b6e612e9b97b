//! Lifecycle of named corpora on disk: a memory cache with a byte-budget
//! eviction policy, a read-write lock per corpus, atomic update application
//! with write-ahead log and backup-on-save, and the user-facing query API
//! (`count`, `find`, `frequency`, `subgraph`).
//!
//! This is the only layer that returns errors to callers; everything below
//! it signals via `Option`/`bool`/empty iterators instead.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;

use graphannis_core::graph::update::GraphUpdate;

use crate::errors::{GraphAnnisError, Result};
use crate::graph::{node_name_key, AnnoKey, ANNIS_NS, Component, ComponentType, EdgeContainer, Graph, GraphStorage, Match, NodeID};
use crate::plan::planner::{self, PlannerConfig};
use crate::query::QueryPlanDescription;

/// Caller-configurable knobs; constructed programmatically,
/// but shaped so a caller-side `toml`/`serde` deserialization of the same
/// struct is trivial.
#[derive(Clone, Debug)]
pub struct CorpusStorageConfig {
    /// Byte budget for the in-memory corpus cache; `0` means unlimited.
    pub max_cache_bytes: usize,
    /// `>= 2` switches joins to their thread-parallel siblings.
    pub num_background_tasks: usize,
}

impl Default for CorpusStorageConfig {
    fn default() -> CorpusStorageConfig {
        CorpusStorageConfig {
            max_cache_bytes: 0,
            num_background_tasks: 1,
        }
    }
}

impl CorpusStorageConfig {
    fn planner_config(&self) -> PlannerConfig {
        PlannerConfig {
            num_background_tasks: self.num_background_tasks,
        }
    }
}

/// One row of a [`FrequencyTable`]: the tabulated annotation values for one
/// combination, plus how many match tuples produced that combination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrequencyTableRow {
    pub values: Vec<String>,
    pub count: u64,
}

#[derive(Clone, Debug, Default)]
pub struct FrequencyTable(pub Vec<FrequencyTableRow>);

/// One column of a `frequency` query: which query node's annotation to
/// tabulate.
#[derive(Clone, Debug)]
pub struct FrequencyDefEntry {
    pub node_ref: usize,
    pub ns: Option<String>,
    pub name: String,
}

struct CorpusLoader {
    graph: RwLock<Graph>,
    location: PathBuf,
}

struct BackgroundWriter {
    handle: JoinHandle<()>,
    interrupt: Arc<AtomicBool>,
}

/// Lifecycle manager for every corpus under a base directory.
pub struct CorpusStorage {
    base_dir: PathBuf,
    corpora: Mutex<HashMap<String, Arc<CorpusLoader>>>,
    writers: Mutex<HashMap<String, BackgroundWriter>>,
    config: CorpusStorageConfig,
}

impl CorpusStorage {
    /// Open (or create) the corpus storage directory with an unlimited cache
    /// budget. `use_parallel_joins` maps to four background tasks.
    pub fn with_auto_cache_size(db_dir: &Path, use_parallel_joins: bool) -> Result<CorpusStorage> {
        let config = CorpusStorageConfig {
            max_cache_bytes: 0,
            num_background_tasks: if use_parallel_joins { 4 } else { 1 },
        };
        CorpusStorage::with_config(db_dir, config)
    }

    pub fn with_max_cache_bytes(db_dir: &Path, max_cache_bytes: usize, use_parallel_joins: bool) -> Result<CorpusStorage> {
        let config = CorpusStorageConfig {
            max_cache_bytes,
            num_background_tasks: if use_parallel_joins { 4 } else { 1 },
        };
        CorpusStorage::with_config(db_dir, config)
    }

    pub fn with_config(db_dir: &Path, config: CorpusStorageConfig) -> Result<CorpusStorage> {
        fs::create_dir_all(db_dir)?;
        Ok(CorpusStorage {
            base_dir: db_dir.to_path_buf(),
            corpora: Mutex::new(HashMap::new()),
            writers: Mutex::new(HashMap::new()),
            config,
        })
    }

    /// Every subdirectory of the base directory is a corpus name.
    pub fn list_corpora(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.path().is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn corpus_location(&self, corpus_name: &str) -> PathBuf {
        self.base_dir.join(corpus_name)
    }

    /// Get (or lazily create) the named corpus's loader, then run a
    /// garbage-collection pass over the cache.
    fn get_corpus(&self, corpus_name: &str) -> Result<Arc<CorpusLoader>> {
        let loader = {
            let mut corpora = self.corpora.lock().map_err(|_| GraphAnnisError::LockPoisoned("corpus cache".to_string()))?;
            if let Some(existing) = corpora.get(corpus_name) {
                existing.clone()
            } else {
                let location = self.corpus_location(corpus_name);
                let mut graph = Graph::new();
                if location.join("current").is_dir() || location.join("backup").is_dir() {
                    graph.load_from(&location, false)?;
                } else {
                    fs::create_dir_all(&location)?;
                    graph.persist_to(&location)?;
                }
                let loader = Arc::new(CorpusLoader {
                    graph: RwLock::new(graph),
                    location,
                });
                corpora.insert(corpus_name.to_string(), loader.clone());
                loader
            }
        };
        self.run_gc(corpus_name);
        Ok(loader)
    }

    /// Walk the cache ordered by estimated size (largest first, so the
    /// fewest evictions reach the budget), try to take an exclusive lock on
    /// each corpus other than `just_loaded`, and unload until the total
    /// cached size is within budget.
    fn run_gc(&self, just_loaded: &str) {
        let budget = self.config.max_cache_bytes;
        if budget == 0 {
            return;
        }
        loop {
            let corpora = match self.corpora.lock() {
                Ok(c) => c,
                Err(_) => return,
            };
            let mut sized: Vec<(String, usize)> = Vec::new();
            let mut total = 0usize;
            for (name, loader) in corpora.iter() {
                if let Ok(g) = loader.graph.read() {
                    let size = g.estimate_memory_size();
                    total += size;
                    if name != just_loaded {
                        sized.push((name.clone(), size));
                    }
                }
            }
            if total <= budget {
                return;
            }
            sized.sort_by(|a, b| b.1.cmp(&a.1));
            let mut corpora = corpora;
            let mut evicted = false;
            for (name, _) in sized {
                if let Some(loader) = corpora.get(&name) {
                    if loader.graph.try_write().is_ok() {
                        log::info!("evicting corpus '{}' from cache to stay within byte budget", name);
                        corpora.remove(&name);
                        evicted = true;
                        break;
                    }
                }
            }
            if !evicted {
                log::warn!("corpus cache is over its byte budget ({} > {}) but every other corpus is locked", total, budget);
                return;
            }
        }
    }

    /// Load every component of the corpus into memory.
    pub fn preload(&self, corpus_name: &str) -> Result<()> {
        let loader = self.get_corpus(corpus_name)?;
        let mut g = loader.graph.write().map_err(|_| GraphAnnisError::LockPoisoned(corpus_name.to_string()))?;
        g.ensure_loaded_all()?;
        Ok(())
    }

    /// Evict a corpus from the cache without touching its on-disk state.
    pub fn unload(&self, corpus_name: &str) {
        if let Ok(mut corpora) = self.corpora.lock() {
            corpora.remove(corpus_name);
        }
    }

    /// Remove a corpus's on-disk directory entirely, returning `true` iff it
    /// existed and was fully removed.
    pub fn delete(&self, corpus_name: &str) -> Result<bool> {
        self.join_background_writer(corpus_name);
        self.unload(corpus_name);
        let location = self.corpus_location(corpus_name);
        if !location.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&location)?;
        Ok(true)
    }

    fn join_background_writer(&self, corpus_name: &str) {
        let writer = {
            let mut writers = match self.writers.lock() {
                Ok(w) => w,
                Err(_) => return,
            };
            writers.remove(corpus_name)
        };
        if let Some(writer) = writer {
            writer.interrupt.store(true, Ordering::SeqCst);
            let _ = writer.handle.join();
        }
    }

    /// Apply a sequence of updates to a corpus, creating it if it does not
    /// yet exist. A corpus is created by applying a sequence of updates to
    /// an empty model.
    pub fn apply_update(&self, corpus_name: &str, update: &mut GraphUpdate) -> Result<()> {
        // step 1: kill and join any background writer still moving the
        // previous snapshot into place.
        self.join_background_writer(corpus_name);

        // step 2: finalise an inconsistent script before persisting it.
        if !update.is_consistent() {
            update.finish();
        }

        let loader = self.get_corpus(corpus_name)?;

        // steps 3-4: acquire the write lock, fully load, apply in order, and
        // persist the write-ahead log before returning success.
        {
            let mut g = loader.graph.write().map_err(|_| GraphAnnisError::LockPoisoned(corpus_name.to_string()))?;
            g.apply_update(update)?;
        }

        // step 5: start a new background writer that folds the update log
        // back into a clean snapshot, interruptible at well-defined points.
        self.spawn_background_writer(corpus_name, loader);
        Ok(())
    }

    fn spawn_background_writer(&self, corpus_name: &str, loader: Arc<CorpusLoader>) {
        let interrupt = Arc::new(AtomicBool::new(false));
        let interrupt_for_thread = interrupt.clone();
        let location = loader.location.clone();
        let handle = std::thread::spawn(move || {
            // checkpoint: after acquiring the read lock.
            if interrupt_for_thread.load(Ordering::SeqCst) {
                return;
            }
            let current = location.join("current");
            let backup = location.join("backup");

            let mut g = match loader.graph.write() {
                Ok(g) => g,
                Err(_) => return,
            };

            // checkpoint: before moving current/ to backup/.
            if interrupt_for_thread.load(Ordering::SeqCst) {
                return;
            }
            if current.is_dir() {
                if backup.is_dir() {
                    let _ = fs::remove_dir_all(&backup);
                }
                if fs::rename(&current, &backup).is_err() {
                    log::warn!("background writer for '{}' could not move current/ to backup/", location.display());
                    return;
                }
            }

            // checkpoint: before writing the new snapshot.
            if interrupt_for_thread.load(Ordering::SeqCst) {
                return;
            }
            if g.save_to(&location).is_err() {
                log::warn!("background writer for '{}' failed to write new snapshot", location.display());
                return;
            }

            // checkpoint: before deleting backup/.
            if interrupt_for_thread.load(Ordering::SeqCst) {
                return;
            }
            let _ = fs::remove_dir_all(&backup);
        });
        if let Ok(mut writers) = self.writers.lock() {
            writers.insert(corpus_name.to_string(), BackgroundWriter { handle, interrupt });
        }
    }

    fn with_plan<R>(&self, corpus_name: &str, f: impl FnOnce(&Graph, planner::PlannerConfig) -> Result<R>) -> Result<R> {
        let loader = self.get_corpus(corpus_name)?;
        let mut g = loader.graph.write().map_err(|_| GraphAnnisError::LockPoisoned(corpus_name.to_string()))?;
        g.ensure_loaded_all()?;
        f(&g, self.config.planner_config())
    }

    /// Number of match tuples for `query` on a single corpus (0 on an empty
    /// result).
    fn count_single(&self, corpus_name: &str, query: &QueryPlanDescription) -> Result<u64> {
        self.with_plan(corpus_name, |g, cfg| {
            let plan = planner::plan(g, query, &cfg)?;
            Ok(plan.count() as u64)
        })
    }

    /// Total match count across `corpus_names`: the multi-corpus path
    /// concatenates per-corpus results with order preserved by corpus
    /// name sort.
    pub fn count(&self, corpus_names: &[String], query: &QueryPlanDescription) -> Result<u64> {
        let mut names: Vec<&String> = corpus_names.iter().collect();
        names.sort();
        let mut total = 0u64;
        for name in names {
            total += self.count_single(name, query)?;
        }
        Ok(total)
    }

    /// Resolve a match tuple's node IDs to their `(annis_ns, node_name)`
    /// values, for an externally displayable result row.
    fn tuple_to_names(g: &Graph, tuple: &[Match]) -> Vec<String> {
        let key = node_name_key();
        tuple
            .iter()
            .map(|m| {
                g.get_node_annos()
                    .get_value_for_item(&m.node, &key)
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Match tuples for `query`, concatenated across `corpus_names` in
    /// corpus-name sort order, with `offset`/`limit` applied to the
    /// concatenation as a whole. Returns an empty sequence once
    /// `offset >= result_count`.
    pub fn find(
        &self,
        corpus_names: &[String],
        query: &QueryPlanDescription,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Vec<String>>> {
        let mut names: Vec<&String> = corpus_names.iter().collect();
        names.sort();
        let mut results = Vec::new();
        let mut skipped = 0usize;
        'corpora: for name in names {
            let rows = self.with_plan(name, |g, cfg| {
                let plan = planner::plan(g, query, &cfg)?;
                Ok(plan.map(|t| CorpusStorage::tuple_to_names(g, &t)).collect::<Vec<_>>())
            })?;
            for row in rows {
                if skipped < offset {
                    skipped += 1;
                    continue;
                }
                results.push(row);
                if let Some(limit) = limit {
                    if results.len() >= limit {
                        break 'corpora;
                    }
                }
            }
        }
        Ok(results)
    }

    /// Tabulate the annotation values named by `frequency_def` over every
    /// match of `query`, one row per distinct combination, sorted by count
    /// descending.
    pub fn frequency(
        &self,
        corpus_names: &[String],
        query: &QueryPlanDescription,
        frequency_def: &[FrequencyDefEntry],
    ) -> Result<FrequencyTable> {
        let mut counts: HashMap<Vec<String>, u64> = HashMap::new();
        let mut names: Vec<&String> = corpus_names.iter().collect();
        names.sort();
        for name in names {
            let rows = self.with_plan(name, |g, cfg| {
                let plan = planner::plan(g, query, &cfg)?;
                let rows: Vec<Vec<String>> = plan
                    .map(|tuple| {
                        frequency_def
                            .iter()
                            .map(|def| {
                                tuple
                                    .get(def.node_ref)
                                    .and_then(|m| {
                                        let key = AnnoKey {
                                            ns: def.ns.clone().unwrap_or_default(),
                                            name: def.name.clone(),
                                        };
                                        g.get_node_annos().get_value_for_item(&m.node, &key)
                                    })
                                    .unwrap_or_default()
                            })
                            .collect()
                    })
                    .collect();
                Ok(rows)
            })?;
            for row in rows {
                *counts.entry(row).or_insert(0) += 1;
            }
        }
        let mut table: Vec<FrequencyTableRow> = counts
            .into_iter()
            .map(|(values, count)| FrequencyTableRow { values, count })
            .collect();
        table.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.values.cmp(&b.values)));
        Ok(FrequencyTable(table))
    }

    /// The induced subgraph over the named nodes, plus `ctx_left`/`ctx_right`
    /// tokens of ordering context on either side; an unknown node name
    /// contributes nothing, so querying a non-existent node id returns an
    /// empty graph.
    pub fn subgraph(
        &self,
        corpus_name: &str,
        node_names: &[String],
        ctx_left: usize,
        ctx_right: usize,
    ) -> Result<Graph> {
        let loader = self.get_corpus(corpus_name)?;
        let mut g = loader.graph.write().map_err(|_| GraphAnnisError::LockPoisoned(corpus_name.to_string()))?;
        g.ensure_loaded_all()?;

        let order_component = Component::new(ComponentType::Ordering, ANNIS_NS, "");
        let gs_order = g.get_graphstorage(&order_component);

        let mut seeds: Vec<NodeID> = node_names.iter().filter_map(|n| g.get_node_id_from_name(n)).collect();
        if let Some(gs_order) = &gs_order {
            if ctx_left > 0 || ctx_right > 0 {
                let mut context = Vec::new();
                for &seed in &seeds {
                    context.extend(gs_order.find_connected_inverse(seed, 1, ctx_left.max(1)));
                    context.extend(gs_order.find_connected(seed, 1, ctx_right.max(1)));
                }
                seeds.extend(context);
            }
        }
        seeds.sort_unstable();
        seeds.dedup();

        let mut result = Graph::new();
        let mut update = GraphUpdate::new();
        let seed_set: std::collections::HashSet<_> = seeds.iter().copied().collect();
        let mut names_by_id = HashMap::new();
        let key = node_name_key();
        for &id in &seeds {
            if let Some(name) = g.get_node_annos().get_value_for_item(&id, &key) {
                names_by_id.insert(id, name.to_string());
            }
        }
        for (&id, name) in &names_by_id {
            update.add_event(graphannis_core::graph::update::UpdateEvent::AddNode {
                node_name: name.clone(),
                node_type: "node".to_string(),
            });
            for anno in g.get_node_annos().get_annotations_for_item(&id) {
                update.add_event(graphannis_core::graph::update::UpdateEvent::AddNodeLabel {
                    node_name: name.clone(),
                    anno_ns: anno.key.ns,
                    anno_name: anno.key.name,
                    anno_value: anno.val,
                });
            }
        }
        for component in g.get_all_components(None, None) {
            if let Some(gs) = g.get_graphstorage(&component) {
                for &source in &seeds {
                    let source_name = match names_by_id.get(&source) {
                        Some(n) => n.clone(),
                        None => continue,
                    };
                    for target in gs.out_edges(source) {
                        if !seed_set.contains(&target) {
                            continue;
                        }
                        let target_name = match names_by_id.get(&target) {
                            Some(n) => n.clone(),
                            None => continue,
                        };
                        update.add_event(graphannis_core::graph::update::UpdateEvent::AddEdge {
                            source_node: source_name.clone(),
                            target_node: target_name,
                            layer: component.layer.clone(),
                            component_type: component.ctype.to_string(),
                            component_name: component.name.clone(),
                        });
                    }
                }
            }
        }
        update.finish();
        result.apply_update(&mut update)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{NodeSearchSpec, TextMatching};
    use graphannis_core::graph::update::UpdateEvent;
    use tempfile::TempDir;

    fn any_node_query() -> QueryPlanDescription {
        QueryPlanDescription {
            nodes: vec![NodeSearchSpec {
                ns: None,
                name: None,
                value: None,
                matching: TextMatching::Any,
                root: true,
                is_token: false,
            }],
            joins: vec![],
        }
    }

    fn two_node_update() -> GraphUpdate {
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNode {
            node_name: "n2".into(),
            node_type: "node".into(),
        });
        u.finish();
        u
    }

    #[test]
    fn apply_update_creates_corpus_and_persists_it() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
        let mut u = two_node_update();
        cs.apply_update("mycorpus", &mut u).unwrap();

        let count = cs.count(&["mycorpus".to_string()], &any_node_query()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(cs.list_corpora().unwrap(), vec!["mycorpus".to_string()]);
    }

    #[test]
    fn count_on_nonexistent_corpus_creates_an_empty_one() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
        let count = cs.count(&["empty".to_string()], &any_node_query()).unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn delete_reports_whether_corpus_existed() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
        let mut u = two_node_update();
        cs.apply_update("mycorpus", &mut u).unwrap();

        assert!(cs.delete("mycorpus").unwrap());
        assert!(!cs.delete("mycorpus").unwrap());
    }

    #[test]
    fn multi_corpus_count_sums_across_corpora_in_name_order() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
        cs.apply_update("b_corpus", &mut two_node_update()).unwrap();
        cs.apply_update("a_corpus", &mut two_node_update()).unwrap();

        let total = cs
            .count(&["b_corpus".to_string(), "a_corpus".to_string()], &any_node_query())
            .unwrap();
        assert_eq!(total, 4);
    }

    #[test]
    fn reload_after_apply_update_yields_the_same_count() {
        let tmp = TempDir::new().unwrap();
        {
            let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
            cs.apply_update("mycorpus", &mut two_node_update()).unwrap();
            cs.join_background_writer("mycorpus");
        }
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();
        let count = cs.count(&["mycorpus".to_string()], &any_node_query()).unwrap();
        assert_eq!(count, 2);
    }

    fn pointing_query_with_edge_anno(val: Option<&str>) -> QueryPlanDescription {
        QueryPlanDescription {
            nodes: vec![NodeSearchSpec::any_node(), NodeSearchSpec::any_node()],
            joins: vec![crate::query::JoinSpec {
                op_name: "Pointing".to_string(),
                left: 0,
                right: 1,
                min_distance: 1,
                max_distance: 1,
                layer: None,
                name: Some("dep".to_string()),
                edge_annotations: val
                    .map(|v| {
                        vec![crate::operator::EdgeAnnoSearchSpec::ExactValue {
                            ns: Some("ns".to_string()),
                            name: "anno".to_string(),
                            val: Some(v.to_string()),
                        }]
                    })
                    .unwrap_or_default(),
                segmentation: None,
            }],
        }
    }

    /// Adding then deleting an edge label toggles a labelled-edge query
    /// between 1 and 0 matches, while the unlabelled edge query keeps
    /// returning 1 match throughout.
    #[test]
    fn edge_label_add_then_delete_toggles_labelled_query() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();

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
        u.add_event(UpdateEvent::AddEdgeLabel {
            source_node: "n1".into(),
            target_node: "n2".into(),
            layer: "".into(),
            component_type: "Pointing".into(),
            component_name: "dep".into(),
            anno_ns: "ns".into(),
            anno_name: "anno".into(),
            anno_value: "x".into(),
        });
        u.finish();
        cs.apply_update("mycorpus", &mut u).unwrap();

        let labelled = pointing_query_with_edge_anno(Some("x"));
        let unlabelled = pointing_query_with_edge_anno(None);
        assert_eq!(cs.count(&["mycorpus".to_string()], &labelled).unwrap(), 1);
        assert_eq!(cs.count(&["mycorpus".to_string()], &unlabelled).unwrap(), 1);

        let mut u2 = GraphUpdate::new();
        u2.add_event(UpdateEvent::DeleteEdgeLabel {
            source_node: "n1".into(),
            target_node: "n2".into(),
            layer: "".into(),
            component_type: "Pointing".into(),
            component_name: "dep".into(),
            anno_ns: "ns".into(),
            anno_name: "anno".into(),
        });
        u2.finish();
        cs.apply_update("mycorpus", &mut u2).unwrap();

        assert_eq!(cs.count(&["mycorpus".to_string()], &labelled).unwrap(), 0);
        assert_eq!(cs.count(&["mycorpus".to_string()], &unlabelled).unwrap(), 1);
    }

    /// Deleting a node removes its annotations along with it, so a
    /// subsequent `node` query sees nothing.
    #[test]
    fn delete_node_removes_its_annotations_and_itself() {
        let tmp = TempDir::new().unwrap();
        let cs = CorpusStorage::with_auto_cache_size(tmp.path(), false).unwrap();

        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNodeLabel {
            node_name: "n1".into(),
            anno_ns: "test".into(),
            anno_name: "anno".into(),
            anno_value: "v".into(),
        });
        u.add_event(UpdateEvent::DeleteNode {
            node_name: "n1".into(),
        });
        u.finish();
        cs.apply_update("mycorpus", &mut u).unwrap();

        assert_eq!(cs.count(&["mycorpus".to_string()], &any_node_query()).unwrap(), 0);
    }
}
