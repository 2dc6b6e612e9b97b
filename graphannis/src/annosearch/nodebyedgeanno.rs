//! Node-by-edge-annotation search: given a set of graph storages and a
//! required edge annotation, enumerate every node that is the source of at
//! least one matching edge, each at most once, then emit its
//! node-annotation match via a caller-supplied generator.
//!
//! This is the search the planner's edge-annotation rewrite substitutes for
//! an LHS node-annotation search when seeking the edge index is cheaper
//! than the node-annotation index.

use std::sync::Arc;

use graphannis_core::annostorage::AnnotationStorage;
use rustc_hash::FxHashSet;

use crate::graph::{Annotation, Edge, EdgeContainer, Graph, GraphStorage, Match, NodeID};
use crate::operator::EdgeAnnoSearchSpec;

fn edge_matches(edge_anno: &EdgeAnnoSearchSpec, gs: &dyn GraphStorage, edge: Edge) -> bool {
    let annos = gs.edge_annos(&edge);
    match edge_anno {
        EdgeAnnoSearchSpec::ExactValue { ns, name, val } => annos.iter().any(|a| {
            &a.key.name == name && ns.as_ref().map_or(true, |n| n == &a.key.ns) && val.as_ref().map_or(true, |v| v == &a.val)
        }),
        EdgeAnnoSearchSpec::RegexValue { ns, name, val } => {
            let pattern = graphannis_core::util::regex_full_match(val);
            match regex::Regex::new(&pattern) {
                Ok(re) => annos
                    .iter()
                    .any(|a| &a.key.name == name && ns.as_ref().map_or(true, |n| n == &a.key.ns) && re.is_match(&a.val)),
                Err(_) => false,
            }
        }
    }
}

pub struct NodeByEdgeAnnoSearch<'a> {
    db: &'a Graph,
    gs: Vec<Arc<dyn GraphStorage>>,
    edge_anno: EdgeAnnoSearchSpec,
    const_output: Option<Annotation>,
    it: Box<dyn Iterator<Item = Match> + 'a>,
}

fn make_iter<'a>(
    gs: Vec<Arc<dyn GraphStorage>>,
    edge_anno: EdgeAnnoSearchSpec,
    const_output: Option<Annotation>,
) -> Box<dyn Iterator<Item = Match> + 'a>
where
    'a: 'a,
{
    let mut visited: FxHashSet<NodeID> = FxHashSet::default();
    let mut out: Vec<NodeID> = Vec::new();
    for g in &gs {
        for src in g.source_nodes() {
            if visited.contains(&src) {
                continue;
            }
            let has_match = g
                .out_edges(src)
                .any(|tgt| edge_matches(&edge_anno, g.as_ref(), Edge { source: src, target: tgt }));
            if has_match {
                visited.insert(src);
                out.push(src);
            }
        }
    }
    let anno = const_output.unwrap_or_default();
    Box::new(out.into_iter().map(move |node| Match { node, anno: anno.clone() }))
}

impl<'a> NodeByEdgeAnnoSearch<'a> {
    pub fn new(
        db: &'a Graph,
        gs: Vec<Arc<dyn GraphStorage>>,
        edge_anno: EdgeAnnoSearchSpec,
        const_output: Option<Annotation>,
    ) -> NodeByEdgeAnnoSearch<'a> {
        NodeByEdgeAnnoSearch {
            db,
            it: make_iter(gs.clone(), edge_anno.clone(), const_output.clone()),
            gs,
            edge_anno,
            const_output,
        }
    }
}

impl<'a> Iterator for NodeByEdgeAnnoSearch<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.it.next()
    }
}

impl<'a> super::NodeSearch<'a> for NodeByEdgeAnnoSearch<'a> {
    fn reset(&mut self) {
        let _ = self.db;
        self.it = make_iter(self.gs.clone(), self.edge_anno.clone(), self.const_output.clone());
    }

    fn guess_max_count(&self) -> i64 {
        let mut total = 0i64;
        for g in &self.gs {
            let anno_storage = g.get_anno_storage();
            let total_annos = anno_storage.len();
            if total_annos == 0 {
                continue;
            }
            let guessed = match &self.edge_anno {
                EdgeAnnoSearchSpec::ExactValue { ns, name, val } => {
                    if let Some(val) = val {
                        anno_storage.guess_max_count(ns.as_deref(), name, val, val)
                    } else {
                        anno_storage.number_of_annotations_by_key(ns.as_deref(), name) as i64
                    }
                }
                EdgeAnnoSearchSpec::RegexValue { ns, name, val } => anno_storage.guess_max_count_regex(ns.as_deref(), name, val),
            };
            total += guessed.max(0);
        }
        total
    }
}
