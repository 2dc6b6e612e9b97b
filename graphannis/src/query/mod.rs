//! The query-plan description: the one externally-facing input
//! format the planner accepts. It is deliberately alternative-free at the
//! single-query level — no AQL string parsing, no operator precedence, just
//! a node-search map and an ordered join list — because parsing natural
//! query syntax is the out-of-scope front-end's job.

use std::collections::HashMap;

use graphannis_core::annostorage::ValueSearch;

use crate::annosearch::{ExactKeySearch, ExactValueSearch, NodeSearch, RegexValueSearch};
use crate::graph::{Graph, Match};
use crate::operator::{
    DominanceSpec, EdgeAnnoSearchSpec, IdenticalCoverageSpec, IdenticalNodeSpec, InclusionSpec, OperatorSpec,
    OverlapSpec, PartOfSubcorpusSpec, PointingSpec, PrecedenceSpec, RangeSpec,
};

/// How a [`NodeSearchSpec`]'s value constrains candidate values.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextMatching {
    ExactEqual,
    Regexp,
    /// No constraint on the value; matches any value for the key (or any
    /// node at all, if `name` is also `None`).
    Any,
}

/// One query variable's node-search specification: a mapping from variable
/// to node-search spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSearchSpec {
    pub ns: Option<String>,
    pub name: Option<String>,
    pub value: Option<String>,
    pub matching: TextMatching,
    /// The query root must include at least one node with `root = true`
    /// (mirrors the AQL requirement that every query mentions at least one
    /// node), carried here so the planner can reject a plan with none.
    pub root: bool,
    /// `true` if this variable is constrained to tokens only (used to
    /// decide whether `node_name`'s uniqueness shortcut applies).
    pub is_token: bool,
}

impl NodeSearchSpec {
    pub fn any_node() -> NodeSearchSpec {
        NodeSearchSpec {
            ns: None,
            name: None,
            value: None,
            matching: TextMatching::Any,
            root: true,
            is_token: false,
        }
    }

    /// Instantiate the annotation search this spec describes.
    /// Applies the planner's unbound-regex rewrite inline: a `.*` pattern
    /// becomes the cheaper exact-key search.
    pub fn create_search<'a>(&self, db: &'a Graph) -> Box<dyn NodeSearch<'a> + 'a> {
        let name = match &self.name {
            Some(n) => n.clone(),
            None => {
                return Box::new(ExactKeySearch::new(db, self.ns.as_deref(), crate::graph::node_type_key().name.as_str()))
            }
        };
        match (&self.matching, &self.value) {
            (TextMatching::Any, _) | (_, None) => Box::new(ExactKeySearch::new(db, self.ns.as_deref(), &name)),
            (TextMatching::ExactEqual, Some(v)) => {
                Box::new(ExactValueSearch::new(db, self.ns.as_deref(), &name, ValueSearch::Some(v.clone())))
            }
            (TextMatching::Regexp, Some(v)) if v == ".*" => Box::new(ExactKeySearch::new(db, self.ns.as_deref(), &name)),
            (TextMatching::Regexp, Some(v)) => Box::new(RegexValueSearch::new(db, self.ns.as_deref(), &name, v, false)),
        }
    }
}

/// One join of the ordered operator list: `{op_name, left_var, right_var,
/// op_params}`.
#[derive(Clone, Debug)]
pub struct JoinSpec {
    pub op_name: String,
    pub left: usize,
    pub right: usize,
    pub min_distance: usize,
    pub max_distance: usize,
    pub layer: Option<String>,
    pub name: Option<String>,
    pub edge_annotations: Vec<EdgeAnnoSearchSpec>,
    pub segmentation: Option<String>,
}

impl JoinSpec {
    fn dist(&self) -> RangeSpec {
        if self.min_distance == 1 && self.max_distance == 1 {
            RangeSpec::Bound {
                min_dist: 1,
                max_dist: 1,
            }
        } else if self.max_distance == usize::MAX {
            RangeSpec::Unbound
        } else {
            RangeSpec::Bound {
                min_dist: self.min_distance,
                max_dist: self.max_distance,
            }
        }
    }

    fn edge_anno(&self) -> Option<EdgeAnnoSearchSpec> {
        self.edge_annotations.first().cloned()
    }

    /// Build the [`OperatorSpec`] this join names.
    ///
    /// `op_name` is one of: `Dominance`, `Pointing`, `PartOfSubcorpus`,
    /// `Precedence`, `Overlap`, `Inclusion`, `IdenticalCoverage`, `Identity`.
    pub fn to_operator_spec(&self) -> Option<Box<dyn OperatorSpec>> {
        match self.op_name.as_str() {
            "Dominance" => Some(Box::new(DominanceSpec {
                name: self.name.clone().unwrap_or_default(),
                dist: self.dist(),
                edge_anno: self.edge_anno(),
            })),
            "Pointing" => Some(Box::new(PointingSpec {
                name: self.name.clone().unwrap_or_default(),
                dist: self.dist(),
                edge_anno: self.edge_anno(),
            })),
            "PartOfSubcorpus" => Some(Box::new(PartOfSubcorpusSpec { dist: self.dist() })),
            "Precedence" => Some(Box::new(PrecedenceSpec {
                dist: self.dist(),
                segmentation: self.segmentation.clone(),
            })),
            "Overlap" => Some(Box::new(OverlapSpec)),
            "Inclusion" => Some(Box::new(InclusionSpec)),
            "IdenticalCoverage" => Some(Box::new(IdenticalCoverageSpec)),
            "Identity" => Some(Box::new(IdenticalNodeSpec)),
            _ => None,
        }
    }
}

/// A single query alternative: a list of node variables plus the joins that
/// connect them. The top-level union of alternatives is
/// [`Vec<QueryPlanDescription>`]; each compiles independently and results
/// concatenate, preserving per-alternative order.
#[derive(Clone, Debug, Default)]
pub struct QueryPlanDescription {
    pub nodes: Vec<NodeSearchSpec>,
    pub joins: Vec<JoinSpec>,
}

pub type MatchTuple = Vec<Match>;

/// Resolved component names -> node index, used by the executor to label
/// output columns the way a front-end would print variable names.
pub fn variable_names(desc: &QueryPlanDescription) -> HashMap<usize, String> {
    desc.nodes
        .iter()
        .enumerate()
        .map(|(i, _)| (i, format!("#{}", i + 1)))
        .collect()
}
