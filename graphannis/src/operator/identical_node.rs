//! Identity operator: matches iff `lhs` and
//! `rhs` are the same node. Needs no graph storage, hence no components.

use std::collections::HashSet;
use std::fmt;

use crate::graph::{any_node_match, Component, Graph, Match};
use crate::operator::{EstimationType, Operator, OperatorSpec};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdenticalNodeSpec;

pub struct IdenticalNode;

impl OperatorSpec for IdenticalNodeSpec {
    fn necessary_components(&self, _db: &Graph) -> HashSet<Component> {
        HashSet::default()
    }

    fn create_operator<'a>(&self, _db: &'a Graph) -> Option<Box<dyn Operator + Sync + 'a>> {
        Some(Box::new(IdenticalNode))
    }
}

impl fmt::Display for IdenticalNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "_ident_")
    }
}

impl Operator for IdenticalNode {
    fn retrieve_matches<'a>(&'a self, lhs: &Match) -> Box<dyn Iterator<Item = Match> + 'a> {
        Box::new(std::iter::once(any_node_match(lhs.node)))
    }

    fn filter_match(&self, lhs: &Match, rhs: &Match) -> bool {
        lhs.node == rhs.node
    }

    fn is_commutative(&self) -> bool {
        true
    }

    fn estimation_type(&self) -> EstimationType {
        EstimationType::Min
    }
}
