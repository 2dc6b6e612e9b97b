//! Token-geometry operator: `lhs` includes `rhs` iff `rhs`'s covered-token
//! range lies entirely inside `lhs`'s.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use graphannis_core::types::ComponentType;

use crate::graph::{any_node_match, ANNIS_NS, Component, EdgeContainer, Graph, GraphStorage, Match};
use crate::operator::{EstimationType, Operator, OperatorSpec};
use crate::token_helper::{self, TokenHelper};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InclusionSpec;

fn order_component() -> Component {
    Component::new(ComponentType::Ordering, ANNIS_NS, "")
}

fn inverse_coverage_component() -> Component {
    Component::new(ComponentType::InverseCoverage, ANNIS_NS, "")
}

pub struct Inclusion<'a> {
    db: &'a Graph,
    gs_order: Arc<dyn GraphStorage>,
    gs_invcov: Arc<dyn GraphStorage>,
    tok_helper: TokenHelper,
}

impl<'a> Inclusion<'a> {
    pub fn new(db: &'a Graph) -> Option<Inclusion<'a>> {
        Some(Inclusion {
            db,
            gs_order: db.get_graphstorage(&order_component())?,
            gs_invcov: db.get_graphstorage(&inverse_coverage_component())?,
            tok_helper: TokenHelper::new(db)?,
        })
    }
}

impl OperatorSpec for InclusionSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        let mut c = HashSet::default();
        c.insert(order_component());
        c.insert(inverse_coverage_component());
        c.extend(token_helper::necessary_components(db));
        c
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        Inclusion::new(db).map(|op| Box::new(op) as Box<dyn Operator + Sync>)
    }
}

impl<'a> fmt::Display for Inclusion<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_i_")
    }
}

impl<'a> Operator for Inclusion<'a> {
    fn retrieve_matches<'b>(&'b self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'b> {
        // candidates are every node that shares at least one covered token
        // with lhs; filter_match then narrows to strict inclusion.
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
        if let (Some(left_lhs), Some(right_lhs), Some(left_rhs), Some(right_rhs)) = (
            self.tok_helper.left_token_for(self.db, lhs.node),
            self.tok_helper.right_token_for(self.db, lhs.node),
            self.tok_helper.left_token_for(self.db, rhs.node),
            self.tok_helper.right_token_for(self.db, rhs.node),
        ) {
            let left_ok = left_lhs == left_rhs || self.gs_order.distance(left_lhs, left_rhs).is_some();
            let right_ok = right_lhs == right_rhs || self.gs_order.distance(right_rhs, right_lhs).is_some();
            left_ok && right_ok
        } else {
            false
        }
    }

    fn is_reflexive(&self) -> bool {
        false
    }

    fn estimation_type(&self) -> EstimationType {
        if let Some(stats) = self.gs_invcov.get_statistics() {
            EstimationType::Selectivity((stats.fan_out_99_percentile.max(1) as f64) / stats.nodes.max(1) as f64)
        } else {
            EstimationType::Selectivity(0.1)
        }
    }
}
