//! The execution plan: a tree whose leaves are annotation
//! searches and whose internal nodes are joins, driven one tuple at a time.

pub mod exec;
pub mod planner;

use std::collections::BTreeMap;
use std::fmt;

use crate::graph::Match;

pub type Tuple = Vec<Match>;

/// Estimated output cardinality plus the accumulated cost of everything
/// below this node in the plan.
#[derive(Clone, Debug)]
pub struct CostEstimate {
    pub output: usize,
    pub intermediate_sum: usize,
}

impl CostEstimate {
    pub fn base(output: usize) -> CostEstimate {
        CostEstimate {
            output,
            intermediate_sum: output,
        }
    }

    /// Combine two operand costs under a join of the given fixed overhead
    /// (index-seed joins are cheaper than nested-loop).
    pub fn join(lhs: &CostEstimate, rhs: &CostEstimate, output: usize, join_overhead: usize) -> CostEstimate {
        CostEstimate {
            output,
            intermediate_sum: lhs.intermediate_sum + rhs.intermediate_sum + output + join_overhead,
        }
    }
}

/// Debug/explain metadata threaded through the plan tree so the planner can
/// compare alternative join orders and an operator can locate its operands'
/// column positions in the tuple.
#[derive(Clone, Debug)]
pub struct Desc {
    /// Which connected component of the query graph this (sub-)plan covers,
    /// used by the planner to decide when two operands are already joined.
    pub component_nr: usize,
    /// Maps a query node index to its column position in this plan's output
    /// tuples.
    pub node_pos: BTreeMap<usize, usize>,
    pub cost: Option<CostEstimate>,
    pub description: String,
}

impl Desc {
    pub fn leaf(component_nr: usize, cost: Option<CostEstimate>, description: String) -> Desc {
        let mut node_pos = BTreeMap::new();
        node_pos.insert(component_nr, 0);
        Desc {
            component_nr,
            node_pos,
            cost,
            description,
        }
    }

    pub fn join(
        component_nr: usize,
        lhs: &Desc,
        rhs: &Desc,
        cost: Option<CostEstimate>,
        description: String,
    ) -> Desc {
        let mut node_pos = BTreeMap::new();
        for (k, v) in &lhs.node_pos {
            node_pos.insert(*k, *v);
        }
        let offset = lhs.node_pos.len();
        for (k, v) in &rhs.node_pos {
            node_pos.insert(*k, *v + offset);
        }
        Desc {
            component_nr,
            node_pos,
            cost,
            description,
        }
    }
}

/// A node of the execution tree: an iterator over match tuples
/// plus enough metadata for the planner to reason about the tree it built.
pub trait ExecutionNode: Iterator<Item = Tuple> {
    fn get_desc(&self) -> Option<&Desc> {
        None
    }
}

impl fmt::Display for Desc {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} (component #{})", self.description, self.component_nr)
    }
}
