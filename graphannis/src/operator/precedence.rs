//! Precedence operator: `right_token(lhs)` precedes
//! `left_token(rhs)` in the ordering component within `[min, max]` steps.
//! When a segmentation is named, the ordering component is the
//! segmentation-named one and the token-boundary functions become the
//! identity (the segmentation nodes are their own boundaries).

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use graphannis_core::types::{ComponentType, NodeID};

use crate::graph::{any_node_match, ANNIS_NS, Component, EdgeContainer, Graph, GraphStorage, Match};
use crate::operator::{EstimationType, Operator, OperatorSpec, RangeSpec};
use crate::token_helper::{self, TokenHelper};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrecedenceSpec {
    pub dist: RangeSpec,
    pub segmentation: Option<String>,
}

fn order_component(segmentation: Option<&str>) -> Component {
    Component::new(ComponentType::Ordering, ANNIS_NS, segmentation.unwrap_or(""))
}

pub struct Precedence<'a> {
    db: &'a Graph,
    gs_order: Arc<dyn GraphStorage>,
    tok_helper: Option<TokenHelper>,
    spec: PrecedenceSpec,
}

impl<'a> Precedence<'a> {
    pub fn new(db: &'a Graph, spec: PrecedenceSpec) -> Option<Precedence<'a>> {
        let gs_order = db.get_graphstorage(&order_component(spec.segmentation.as_deref()))?;
        // with a segmentation, token boundaries are the identity: no need
        // for left/right-token edges.
        let tok_helper = if spec.segmentation.is_some() {
            None
        } else {
            Some(TokenHelper::new(db)?)
        };
        Some(Precedence {
            db,
            gs_order,
            tok_helper,
            spec,
        })
    }

    fn right_boundary(&self, n: NodeID) -> Option<NodeID> {
        match &self.tok_helper {
            Some(h) => h.right_token_for(self.db, n),
            None => Some(n),
        }
    }

    fn left_boundary(&self, n: NodeID) -> Option<NodeID> {
        match &self.tok_helper {
            Some(h) => h.left_token_for(self.db, n),
            None => Some(n),
        }
    }

    /// `min=0, max=0` means "any distance" for segmentation precedence;
    /// resolved here rather than left ambiguous, since it is load-bearing
    /// for any query that uses it.
    fn effective_bounds(&self) -> (usize, usize) {
        let min = self.spec.dist.min_dist();
        let max = self.spec.dist.max_dist_or(usize::MAX);
        if self.spec.segmentation.is_some() && min == 0 && max == 0 {
            (1, usize::MAX)
        } else {
            (min.max(1), max)
        }
    }
}

impl OperatorSpec for PrecedenceSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        let mut c = HashSet::default();
        c.insert(order_component(self.segmentation.as_deref()));
        if self.segmentation.is_none() {
            c.extend(token_helper::necessary_components(db));
        }
        c
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        Precedence::new(db, self.clone()).map(|op| Box::new(op) as Box<dyn Operator + Sync>)
    }
}

impl<'a> fmt::Display for Precedence<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, ".{}", self.spec.dist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::RangeSpec;
    use graphannis_core::graph::update::{GraphUpdate, UpdateEvent};

    /// A 3-node segmentation chain `s1 -> s2 -> s3` on the `"seg"` ordering
    /// component, no token boundary edges (segmentation precedence never
    /// consults `LeftToken`/`RightToken`).
    fn segmentation_chain() -> Graph {
        let mut g = Graph::new();
        let mut u = GraphUpdate::new();
        for name in ["s1", "s2", "s3"] {
            u.add_event(UpdateEvent::AddNode {
                node_name: name.into(),
                node_type: "node".into(),
            });
        }
        for (src, tgt) in [("s1", "s2"), ("s2", "s3")] {
            u.add_event(UpdateEvent::AddEdge {
                source_node: src.into(),
                target_node: tgt.into(),
                layer: ANNIS_NS.into(),
                component_type: "Ordering".into(),
                component_name: "seg".into(),
            });
        }
        u.finish();
        g.apply_update(&mut u).unwrap();
        g
    }

    #[test]
    fn segmentation_precedence_with_zero_zero_means_any_distance() {
        let g = segmentation_chain();
        let spec = PrecedenceSpec {
            dist: RangeSpec::Bound {
                min_dist: 0,
                max_dist: 0,
            },
            segmentation: Some("seg".to_string()),
        };
        let op = Precedence::new(&g, spec).unwrap();
        let s1 = any_node_match(g.get_node_id_from_name("s1").unwrap());
        let s3 = any_node_match(g.get_node_id_from_name("s3").unwrap());
        // two steps apart, yet still matches under the "any distance" reading.
        assert!(op.filter_match(&s1, &s3));
    }

    #[test]
    fn segmentation_precedence_with_explicit_bound_is_not_reinterpreted() {
        let g = segmentation_chain();
        let spec = PrecedenceSpec {
            dist: RangeSpec::Bound {
                min_dist: 1,
                max_dist: 1,
            },
            segmentation: Some("seg".to_string()),
        };
        let op = Precedence::new(&g, spec).unwrap();
        let s1 = any_node_match(g.get_node_id_from_name("s1").unwrap());
        let s3 = any_node_match(g.get_node_id_from_name("s3").unwrap());
        assert!(!op.filter_match(&s1, &s3));
    }
}

impl<'a> Operator for Precedence<'a> {
    fn retrieve_matches<'b>(&'b self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'b> {
        let (min, max) = self.effective_bounds();
        let start = match self.right_boundary(lhs.node) {
            Some(n) => n,
            None => return Box::new(std::iter::empty()),
        };
        Box::new(self.gs_order.find_connected(start, min, max).map(any_node_match))
    }

    fn filter_match(&self, lhs: &Match, rhs: &Match) -> bool {
        let (min, max) = self.effective_bounds();
        if let (Some(start), Some(end)) = (self.right_boundary(lhs.node), self.left_boundary(rhs.node)) {
            self.gs_order.is_connected(start, end, min, max)
        } else {
            false
        }
    }

    fn estimation_type(&self) -> EstimationType {
        if let Some(stats) = self.gs_order.get_statistics() {
            let (min, max) = self.effective_bounds();
            let max_reachable = max.min(stats.max_depth) as f64;
            let min = min as f64;
            let nodes = stats.nodes.max(2) as f64;
            EstimationType::Selectivity(((max_reachable - min + 1.0).max(0.0)) / (nodes / 2.0))
        } else {
            EstimationType::Selectivity(0.1)
        }
    }
}
