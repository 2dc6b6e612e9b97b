//! The abstract edge operator and its three named specs:
//! `Dominance` (`>`), `Pointing` (`->`) and `PartOfSubcorpus` (`@`).
//! `Precedence` is also an edge operator over the `Ordering` component, but
//! lives in [`super::precedence`] because it additionally needs the
//! left/right-token helpers.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use graphannis_core::annostorage::AnnotationStorage;
use graphannis_core::types::{ComponentType, Edge, NodeID};

use crate::graph::{node_type_key, ANNIS_NS, Component, EdgeContainer, Graph, GraphStatistic, GraphStorage, Match};
use crate::operator::{EdgeAnnoSearchSpec, EstimationType, Operator, OperatorSpec, RangeSpec};

#[derive(Clone, Debug)]
pub struct BaseEdgeOpSpec {
    pub components: Vec<Component>,
    pub dist: RangeSpec,
    pub edge_anno: Option<EdgeAnnoSearchSpec>,
    pub is_reflexive: bool,
    pub op_str: Option<String>,
}

pub struct BaseEdgeOp {
    gs: Vec<Arc<dyn GraphStorage>>,
    spec: BaseEdgeOpSpec,
    max_nodes_estimate: usize,
    inverse: bool,
}

impl BaseEdgeOp {
    pub fn new(db: &Graph, spec: BaseEdgeOpSpec) -> Option<BaseEdgeOp> {
        let mut gs: Vec<Arc<dyn GraphStorage>> = Vec::new();
        for c in &spec.components {
            gs.push(db.get_graphstorage(c)?);
        }
        let node_type = node_type_key();
        let max_nodes_estimate = db
            .get_node_annos()
            .guess_max_count(Some(&node_type.ns), &node_type.name, "node", "node")
            .max(0) as usize;
        Some(BaseEdgeOp {
            gs,
            spec,
            max_nodes_estimate,
            inverse: false,
        })
    }
}

impl OperatorSpec for BaseEdgeOpSpec {
    fn necessary_components(&self, _db: &Graph) -> HashSet<Component> {
        self.components.iter().cloned().collect()
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        BaseEdgeOp::new(db, self.clone()).map(|op| Box::new(op) as Box<dyn Operator + Sync>)
    }

    fn get_edge_anno_spec(&self) -> Option<EdgeAnnoSearchSpec> {
        self.edge_anno.clone()
    }
}

fn check_edge_annotation(
    edge_anno: &Option<EdgeAnnoSearchSpec>,
    gs: &dyn GraphStorage,
    source: NodeID,
    target: NodeID,
) -> bool {
    let edge_anno = match edge_anno {
        Some(e) => e,
        None => return true,
    };
    let annos = gs.edge_annos(&Edge { source, target });
    match edge_anno {
        EdgeAnnoSearchSpec::ExactValue { ns, name, val } => annos.iter().any(|a| {
            &a.key.name == name
                && ns.as_ref().map_or(true, |n| n == &a.key.ns)
                && val.as_ref().map_or(true, |v| v == &a.val)
        }),
        EdgeAnnoSearchSpec::RegexValue { ns, name, val } => {
            let pattern = graphannis_core::util::regex_full_match(val);
            match regex::Regex::new(&pattern) {
                Ok(re) => annos.iter().any(|a| {
                    &a.key.name == name
                        && ns.as_ref().map_or(true, |n| n == &a.key.ns)
                        && re.is_match(&a.val)
                }),
                Err(_) => false,
            }
        }
    }
}

impl fmt::Display for BaseEdgeOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let anno_frag = self
            .spec
            .edge_anno
            .as_ref()
            .map_or(String::new(), |e| format!("[{}]", e));
        match &self.spec.op_str {
            Some(op_str) if self.inverse => write!(f, "{}{}{}^", op_str, self.spec.dist, anno_frag),
            Some(op_str) => write!(f, "{}{}{}", op_str, self.spec.dist, anno_frag),
            None => write!(f, "?"),
        }
    }
}

impl Operator for BaseEdgeOp {
    fn retrieve_matches<'a>(&'a self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'a> {
        let lhs_node = lhs.node;
        let min_dist = self.spec.dist.min_dist();
        let max_dist = self.spec.dist.max_dist_or(usize::MAX);
        let mut out: Vec<NodeID> = Vec::new();
        for gs in &self.gs {
            let gs = gs.as_ref();
            let found: Vec<NodeID> = if self.inverse {
                gs.find_connected_inverse(lhs_node, min_dist, max_dist)
                    .filter(|candidate| check_edge_annotation(&self.spec.edge_anno, gs, *candidate, lhs_node))
                    .collect()
            } else {
                gs.find_connected(lhs_node, min_dist, max_dist)
                    .filter(|candidate| check_edge_annotation(&self.spec.edge_anno, gs, lhs_node, *candidate))
                    .collect()
            };
            out.extend(found);
        }
        if self.gs.len() > 1 {
            out.sort_unstable();
            out.dedup();
        }
        Box::new(out.into_iter().map(crate::graph::any_node_match))
    }

    fn filter_match(&self, lhs: &Match, rhs: &Match) -> bool {
        let min_dist = self.spec.dist.min_dist();
        let max_dist = self.spec.dist.max_dist_or(usize::MAX);
        for gs in &self.gs {
            let gs = gs.as_ref();
            let (src, tgt) = if self.inverse {
                (rhs.node, lhs.node)
            } else {
                (lhs.node, rhs.node)
            };
            if gs.is_connected(src, tgt, min_dist, max_dist) && check_edge_annotation(&self.spec.edge_anno, gs, src, tgt) {
                return true;
            }
        }
        false
    }

    fn is_reflexive(&self) -> bool {
        self.spec.is_reflexive
    }

    fn get_inverse_operator<'a>(&self, _graph: &'a Graph) -> Option<Box<dyn Operator + 'a>> {
        Some(Box::new(BaseEdgeOp {
            gs: self.gs.clone(),
            spec: self.spec.clone(),
            max_nodes_estimate: self.max_nodes_estimate,
            inverse: !self.inverse,
        }))
    }

    fn estimation_type(&self) -> EstimationType {
        if self.gs.is_empty() {
            return EstimationType::Selectivity(0.0);
        }
        let max_nodes = self.max_nodes_estimate.max(1) as f64;
        let mut worst_sel = 0.0f64;
        for gs in &self.gs {
            if let Some(stats) = gs.get_statistics() {
                let stats: &GraphStatistic = stats;
                if stats.cyclic {
                    return EstimationType::Selectivity(1.0);
                }
                let max_dist = self.spec.dist.max_dist_or(stats.max_depth).min(stats.max_depth) as i32;
                let min_dist = (self.spec.dist.min_dist().saturating_sub(1)) as i32;
                let sel = if stats.avg_fan_out > 1.0 {
                    let k = stats.avg_fan_out;
                    let reachable_max = ((k.powi(max_dist) - 1.0) / (k - 1.0)).ceil();
                    let reachable_min = ((k.powi(min_dist) - 1.0) / (k - 1.0)).ceil();
                    (reachable_max - reachable_min) / max_nodes
                } else {
                    let reachable_max = (stats.avg_fan_out * f64::from(max_dist)).ceil();
                    let reachable_min = (stats.avg_fan_out * f64::from(min_dist)).ceil();
                    (reachable_max - reachable_min) / max_nodes
                };
                if sel > worst_sel {
                    worst_sel = sel;
                }
            } else {
                worst_sel = worst_sel.max(0.01);
            }
        }
        EstimationType::Selectivity(worst_sel)
    }

    fn edge_anno_selectivity(&self) -> Option<f64> {
        let edge_anno = self.spec.edge_anno.as_ref()?;
        let mut worst_sel = 0.0f64;
        for gs in &self.gs {
            let anno_storage = gs.get_anno_storage();
            let total = anno_storage.len();
            if total == 0 {
                return Some(0.0);
            }
            let guessed = match edge_anno {
                EdgeAnnoSearchSpec::ExactValue { ns, name, val } => {
                    if let Some(val) = val {
                        anno_storage.guess_max_count(ns.as_deref(), name, val, val)
                    } else {
                        anno_storage.number_of_annotations_by_key(ns.as_deref(), name) as i64
                    }
                }
                EdgeAnnoSearchSpec::RegexValue { ns, name, val } => {
                    anno_storage.guess_max_count_regex(ns.as_deref(), name, val)
                }
            };
            let sel = (guessed.max(0) as f64) / (total as f64);
            worst_sel = worst_sel.max(sel);
        }
        Some(worst_sel)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DominanceSpec {
    pub name: String,
    pub dist: RangeSpec,
    pub edge_anno: Option<EdgeAnnoSearchSpec>,
}

impl OperatorSpec for DominanceSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        db.get_all_components(Some(ComponentType::Dominance), Some(&self.name))
            .into_iter()
            .collect()
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        let components = db.get_all_components(Some(ComponentType::Dominance), Some(&self.name));
        let op_str = if self.name.is_empty() {
            ">".to_string()
        } else {
            format!(">{} ", self.name)
        };
        BaseEdgeOpSpec {
            op_str: Some(op_str),
            components,
            dist: self.dist.clone(),
            edge_anno: self.edge_anno.clone(),
            is_reflexive: true,
        }
        .create_operator(db)
    }

    fn get_edge_anno_spec(&self) -> Option<EdgeAnnoSearchSpec> {
        self.edge_anno.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PointingSpec {
    pub name: String,
    pub dist: RangeSpec,
    pub edge_anno: Option<EdgeAnnoSearchSpec>,
}

impl OperatorSpec for PointingSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        db.get_all_components(Some(ComponentType::Pointing), Some(&self.name))
            .into_iter()
            .collect()
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        let components = db.get_all_components(Some(ComponentType::Pointing), Some(&self.name));
        let op_str = if self.name.is_empty() {
            "->".to_string()
        } else {
            format!("->{} ", self.name)
        };
        BaseEdgeOpSpec {
            components,
            dist: self.dist.clone(),
            edge_anno: self.edge_anno.clone(),
            is_reflexive: true,
            op_str: Some(op_str),
        }
        .create_operator(db)
    }

    fn get_edge_anno_spec(&self) -> Option<EdgeAnnoSearchSpec> {
        self.edge_anno.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartOfSubcorpusSpec {
    pub dist: RangeSpec,
}

impl OperatorSpec for PartOfSubcorpusSpec {
    fn necessary_components(&self, _db: &Graph) -> HashSet<Component> {
        let mut c = HashSet::default();
        c.insert(Component::new(ComponentType::PartOfSubcorpus, ANNIS_NS, ""));
        c
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        let components = vec![Component::new(ComponentType::PartOfSubcorpus, ANNIS_NS, "")];
        BaseEdgeOpSpec {
            op_str: Some("@".to_string()),
            components,
            dist: self.dist.clone(),
            edge_anno: None,
            is_reflexive: false,
        }
        .create_operator(db)
    }
}
