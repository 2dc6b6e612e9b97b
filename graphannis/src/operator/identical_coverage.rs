//! Token-geometry operator: `lhs` and `rhs` cover exactly the same tokens
//!.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use graphannis_core::types::ComponentType;

use crate::graph::{any_node_match, ANNIS_NS, Component, EdgeContainer, Graph, GraphStorage, Match};
use crate::operator::{EstimationType, Operator, OperatorSpec};
use crate::token_helper::{self, TokenHelper};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdenticalCoverageSpec;

fn inverse_coverage_component() -> Component {
    Component::new(ComponentType::InverseCoverage, ANNIS_NS, "")
}

pub struct IdenticalCoverage<'a> {
    db: &'a Graph,
    gs_invcov: Arc<dyn GraphStorage>,
    tok_helper: TokenHelper,
}

impl<'a> IdenticalCoverage<'a> {
    pub fn new(db: &'a Graph) -> Option<IdenticalCoverage<'a>> {
        Some(IdenticalCoverage {
            db,
            gs_invcov: db.get_graphstorage(&inverse_coverage_component())?,
            tok_helper: TokenHelper::new(db)?,
        })
    }
}

impl OperatorSpec for IdenticalCoverageSpec {
    fn necessary_components(&self, db: &Graph) -> HashSet<Component> {
        let mut c = HashSet::default();
        c.insert(inverse_coverage_component());
        c.extend(token_helper::necessary_components(db));
        c
    }

    fn create_operator<'a>(&self, db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        IdenticalCoverage::new(db).map(|op| Box::new(op) as Box<dyn Operator + Sync>)
    }
}

impl<'a> fmt::Display for IdenticalCoverage<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_=_")
    }
}

impl<'a> Operator for IdenticalCoverage<'a> {
    fn retrieve_matches<'b>(&'b self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'b> {
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
        let lhs_range = (
            self.tok_helper.left_token_for(self.db, lhs.node),
            self.tok_helper.right_token_for(self.db, lhs.node),
        );
        let rhs_range = (
            self.tok_helper.left_token_for(self.db, rhs.node),
            self.tok_helper.right_token_for(self.db, rhs.node),
        );
        matches!((lhs_range, rhs_range), ((Some(a), Some(b)), (Some(c), Some(d))) if a == c && b == d)
    }

    fn is_commutative(&self) -> bool {
        true
    }

    fn estimation_type(&self) -> EstimationType {
        if let Some(stats) = self.gs_invcov.get_statistics() {
            EstimationType::Selectivity(1.0 / stats.nodes.max(1) as f64)
        } else {
            EstimationType::Selectivity(0.01)
        }
    }
}
