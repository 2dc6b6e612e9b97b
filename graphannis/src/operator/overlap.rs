//! Token-geometry operator: `lhs` overlaps `rhs` iff their covered-token
//! ranges share at least one token.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use graphannis_core::types::ComponentType;

use crate::graph::{any_node_match, ANNIS_NS, Component, EdgeContainer, Graph, GraphStorage, Match};
use crate::operator::{EstimationType, Operator, OperatorSpec};
use crate::token_helper::{self, TokenHelper};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OverlapSpec;

fn order_component() -> Component {
    Component::new(ComponentType::Ordering, ANNIS_NS, "")
}

fn coverage_component() -> Component {
    Component::new(ComponentType::Coverage, ANNIS_NS, "")
}

fn inverse_coverage_component() -> Component {
    Component::new(ComponentType::InverseCoverage, ANNIS_NS, "")
}

pub struct Overlap<'a> {
    db: &'a Graph,
    gs_order: Arc<dyn GraphStorage>,
    gs_cov: Arc<dyn GraphStorage>,
    gs_invcov: Arc<dyn GraphStorage>,
    tok_helper: TokenHelper,
}

impl<'a> Overlap<'a> {
    pub fn new(db: &'a Graph) -> Option<Overlap<'a>> {
        Some(Overlap {
            db,
            gs_order: db.get_graphstorage(&order_component())?,
            gs_cov: db.get_graphstorage(&coverage_component())?,
            gs_invcov: db.get_graphstorage(&inverse_coverage_component())?,
            tok_helper: TokenHelper::new(db)?,
        })
    }
}

impl OperatorSpec for OverlapSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        let mut c = HashSet::default();
        c.insert(order_component());
        c.insert(coverage_component());
        c.insert(inverse_coverage_component());
        c.extend(token_helper::necessary_components(db));
        c
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        Overlap::new(db).map(|op| Box::new(op) as Box<dyn Operator + Sync>)
    }
}

impl<'a> fmt::Display for Overlap<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_o_")
    }
}

impl<'a> Operator for Overlap<'a> {
    fn retrieve_matches<'b>(&'b self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'b> {
        // collect all spans covering any token covered by lhs.
        let mut result = HashSet::new();
        for t in self.tok_helper.covered_token(lhs.node) {
            for n in self.gs_invcov.find_connected(t, 1, 1) {
                result.insert(n);
            }
            result.insert(t);
        }
        Box::new(result.into_iter().map(any_node_match))
    }

    fn filter_match(&self, lhs: &Match, rhs: &Match) -> bool {
        // the source ships an overlap selectivity formula that double-counts
        // a span's own coverage (see estimation_type below); filter_match
        // itself stays the textbook overlap definition.
        if let (Some(start_lhs), Some(end_lhs), Some(start_rhs), Some(end_rhs)) = (
            self.tok_helper.left_token_for(self.db, lhs.node),
            self.tok_helper.right_token_for(self.db, lhs.node),
            self.tok_helper.left_token_for(self.db, rhs.node),
            self.tok_helper.right_token_for(self.db, rhs.node),
        ) {
            self.gs_order.distance(start_lhs, end_rhs).is_some()
                && self.gs_order.distance(start_rhs, end_lhs).is_some()
        } else {
            false
        }
    }

    fn is_reflexive(&self) -> bool {
        false
    }

    fn is_commutative(&self) -> bool {
        true
    }

    fn estimation_type(&self) -> EstimationType {
        if let (Some(stats_cov), Some(stats_order), Some(stats_invcov)) = (
            self.gs_cov.get_statistics(),
            self.gs_order.get_statistics(),
            self.gs_invcov.get_statistics(),
        ) {
            let num_of_token = stats_order.nodes.max(1) as f64;
            if stats_cov.nodes == 0 {
                return EstimationType::Selectivity(1.0 / num_of_token);
            }
            // the legacy formula adds the covered-token count and the
            // aligned-non-token count without subtracting the overlap
            // between them, so a span that covers itself is counted twice;
            // kept verbatim, see
            // `overlap_selectivity_double_counts_self_coverage` below.
            let covered_token_per_node = stats_cov.fan_out_99_percentile as f64;
            let aligned_non_token = covered_token_per_node * (stats_invcov.fan_out_99_percentile as f64);
            let sum_included = covered_token_per_node + aligned_non_token;
            EstimationType::Selectivity(sum_included / stats_cov.nodes as f64)
        } else {
            EstimationType::Selectivity(0.1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ANNIS_NS, NodeID};
    use graphannis_core::graph::update::{GraphUpdate, UpdateEvent};

    fn sample_graph() -> Graph {
        let mut g = Graph::new();
        let mut u = GraphUpdate::new();
        for (name, tok) in [("t1", "The"), ("t2", "cat")] {
            u.add_event(UpdateEvent::AddNode {
                node_name: name.into(),
                node_type: "node".into(),
            });
            u.add_event(UpdateEvent::AddNodeLabel {
                node_name: name.into(),
                anno_ns: ANNIS_NS.into(),
                anno_name: "tok".into(),
                anno_value: tok.into(),
            });
        }
        u.add_event(UpdateEvent::AddNode {
            node_name: "span".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddEdge {
            source_node: "t1".into(),
            target_node: "t2".into(),
            layer: ANNIS_NS.into(),
            component_type: "Ordering".into(),
            component_name: "".into(),
        });
        for tgt in ["t1", "t2"] {
            u.add_event(UpdateEvent::AddEdge {
                source_node: "span".into(),
                target_node: tgt.into(),
                layer: ANNIS_NS.into(),
                component_type: "Coverage".into(),
                component_name: "".into(),
            });
            u.add_event(UpdateEvent::AddEdge {
                source_node: tgt.into(),
                target_node: "span".into(),
                layer: ANNIS_NS.into(),
                component_type: "InverseCoverage".into(),
                component_name: "".into(),
            });
            u.add_event(UpdateEvent::AddEdge {
                source_node: "span".into(),
                target_node: tgt.into(),
                layer: ANNIS_NS.into(),
                component_type: if tgt == "t1" { "LeftToken" } else { "RightToken" }.into(),
                component_name: "".into(),
            });
        }
        u.finish();
        g.apply_update(&mut u).unwrap();
        g
    }

    #[test]
    fn span_overlaps_its_own_tokens() {
        let g = sample_graph();
        let op = Overlap::new(&g).unwrap();
        let span: NodeID = g.get_node_id_from_name("span").unwrap();
        let t1: NodeID = g.get_node_id_from_name("t1").unwrap();
        let lhs = any_node_match(span);
        let rhs = any_node_match(t1);
        assert!(op.filter_match(&lhs, &rhs));
        assert!(!op.is_reflexive());
        assert!(op.is_commutative());
    }

    /// The selectivity formula sums covered-token count and aligned-non-token
    /// count without subtracting their overlap, so a one-span, two-token
    /// graph (where the span covers itself) reports a value strictly
    /// greater than `num_covered_tokens / num_spans`. Kept verbatim rather
    /// than "corrected" — pinned here so a future refactor can't silently
    /// change the formula.
    #[test]
    fn overlap_selectivity_double_counts_self_coverage() {
        let mut g = sample_graph();
        for c in [order_component(), coverage_component(), inverse_coverage_component()] {
            g.calculate_component_statistics(&c).unwrap();
        }
        let op = Overlap::new(&g).unwrap();
        // coverage fan-out 2 (span -> t1, t2), inverse-coverage fan-out 1
        // (token -> span), 3 participant nodes {span, t1, t2}: the formula
        // adds `covered_token_per_node` (2) to `aligned_non_token` (2*1=2)
        // without subtracting their overlap, so it reports 4/3 rather than
        // the non-double-counting 2/3.
        match op.estimation_type() {
            EstimationType::Selectivity(s) => assert!((s - 4.0 / 3.0).abs() < 1e-9),
            other => panic!("expected a selectivity estimate, got {:?}", other),
        }
    }
}
