//! The operator algebra: binary predicates over node matches.
//!
//! An [`OperatorSpec`] is the reusable, cloneable description of an operator
//! as it appears in a query; [`Operator`] is the instantiated, borrowed-graph
//! form a spec produces once it has resolved which components it needs.

use std::collections::HashSet;
use std::fmt::Debug;
use std::fmt::Display;
use std::ops::Bound;

use graphannis_core::types::Component;

use crate::graph::{Graph, Match};

pub mod edge_op;
pub mod identical_coverage;
pub mod identical_node;
pub mod inclusion;
pub mod overlap;
pub mod precedence;

pub use edge_op::{DominanceSpec, PartOfSubcorpusSpec, PointingSpec};
pub use identical_coverage::IdenticalCoverageSpec;
pub use identical_node::IdenticalNodeSpec;
pub use inclusion::InclusionSpec;
pub use overlap::OverlapSpec;
pub use precedence::PrecedenceSpec;

/// How an operator's [`Operator::estimation_type`] should be read by the
/// planner's cost model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EstimationType {
    /// Estimated fraction of `lhs x rhs` pairs that match.
    Selectivity(f64),
    /// The operator always matches exactly one RHS per LHS (e.g. identity).
    Min,
    /// No useful estimate is available; the planner should treat this as the
    /// worst case.
    Max,
}

/// A half-open or closed, possibly unbounded, distance range, as used by the
/// edge operators and `Precedence`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeSpec {
    Bound { min_dist: usize, max_dist: usize },
    Unbound,
}

impl RangeSpec {
    pub fn min_dist(&self) -> usize {
        match self {
            RangeSpec::Bound { min_dist, .. } => *min_dist,
            RangeSpec::Unbound => 1,
        }
    }

    pub fn max_dist(&self) -> Bound<usize> {
        match self {
            RangeSpec::Bound { max_dist, .. } => Bound::Included(*max_dist),
            RangeSpec::Unbound => Bound::Unbounded,
        }
    }

    /// `max_dist` resolved to a concrete, finite upper bound for use in
    /// arithmetic (callers pick the sentinel that fits their context).
    pub fn max_dist_or(&self, unbounded_value: usize) -> usize {
        match self.max_dist() {
            Bound::Included(d) => d,
            Bound::Excluded(d) => d.saturating_sub(1),
            Bound::Unbounded => unbounded_value,
        }
    }
}

impl Display for RangeSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RangeSpec::Bound { min_dist, max_dist } if *min_dist == 1 && *max_dist == 1 => {
                write!(f, "")
            }
            RangeSpec::Bound { min_dist, max_dist } => write!(f, "{},{}", min_dist, max_dist),
            RangeSpec::Unbound => write!(f, "*"),
        }
    }
}

/// How an edge-annotation filter constrains the candidate edges of an edge
/// operator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EdgeAnnoSearchSpec {
    ExactValue {
        ns: Option<String>,
        name: String,
        val: Option<String>,
    },
    RegexValue {
        ns: Option<String>,
        name: String,
        val: String,
    },
}

impl Display for EdgeAnnoSearchSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EdgeAnnoSearchSpec::ExactValue { ns, name, val } => {
                if let Some(ns) = ns {
                    write!(f, "{}:{}", ns, name)?;
                } else {
                    write!(f, "{}", name)?;
                }
                if let Some(val) = val {
                    write!(f, "=\"{}\"", val)?;
                }
                Ok(())
            }
            EdgeAnnoSearchSpec::RegexValue { ns, name, val } => {
                if let Some(ns) = ns {
                    write!(f, "{}:{}=/{}/", ns, name, val)
                } else {
                    write!(f, "{}=/{}/", name, val)
                }
            }
        }
    }
}

/// An instantiated operator, holding whatever graph-storage handles it needs
///. `Sync` so the parallel join variants can share
/// one operator instance across worker threads.
pub trait Operator: Display + Sync {
    /// Index-lookup path: every RHS match reachable from `lhs`.
    fn retrieve_matches<'a>(&'a self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'a>;

    /// Nested-loop path: does the pair satisfy the operator?
    fn filter_match(&self, lhs: &Match, rhs: &Match) -> bool;

    fn is_reflexive(&self) -> bool {
        true
    }

    fn is_commutative(&self) -> bool {
        false
    }

    /// The same relation with LHS/RHS swapped, if it can be computed at the
    /// same or lower cost.
    fn get_inverse_operator<'a>(&self, _graph: &'a Graph) -> Option<Box<dyn Operator + 'a>> {
        None
    }

    fn estimation_type(&self) -> EstimationType {
        EstimationType::Selectivity(0.1)
    }

    /// Multiplicative selectivity contributed by an edge-annotation filter,
    /// if this operator carries one.
    fn edge_anno_selectivity(&self) -> Option<f64> {
        None
    }
}

/// The reusable, query-time description of an [`Operator`]: an ordered
/// join's operator name plus its parameters.
pub trait OperatorSpec: Debug {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component>;

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>>;

    fn get_edge_anno_spec(&self) -> Option<EdgeAnnoSearchSpec> {
        None
    }
}
