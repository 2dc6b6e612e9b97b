//! Left/right-token boundary helpers used by the token-geometry operators
//!: `left_token(n)`/`right_token(n)` resolve a possibly-non-token
//! node to the token that bounds it on that side.

use std::collections::HashSet;
use std::sync::Arc;

use graphannis_core::types::{ComponentType, NodeID};

use crate::graph::{token_key, ANNIS_NS, Component, Graph, GraphStorage};

fn left_component() -> Component {
    Component::new(ComponentType::LeftToken, ANNIS_NS, "")
}

fn right_component() -> Component {
    Component::new(ComponentType::RightToken, ANNIS_NS, "")
}

/// Components a `TokenHelper` needs loaded; used by operator specs'
/// `necessary_components` so the planner/corpus-manager know to load them.
pub fn necessary_components(db: &Graph) -> HashSet<Component> {
    let mut result = HashSet::default();
    result.insert(left_component());
    result.insert(right_component());
    result.extend(db.get_all_components(Some(ComponentType::Coverage), None));
    result
}

#[derive(Clone)]
pub struct TokenHelper {
    left_edges: Arc<dyn GraphStorage>,
    right_edges: Arc<dyn GraphStorage>,
    cov_edges: Vec<Arc<dyn GraphStorage>>,
    tok_key: graphannis_core::types::AnnoKey,
}

impl TokenHelper {
    pub fn new(db: &Graph) -> Option<TokenHelper> {
        let cov_edges = db
            .get_all_components(Some(ComponentType::Coverage), None)
            .into_iter()
            .filter_map(|c| db.get_graphstorage(&c))
            .collect();
        Some(TokenHelper {
            left_edges: db.get_graphstorage(&left_component())?,
            right_edges: db.get_graphstorage(&right_component())?,
            cov_edges,
            tok_key: token_key(),
        })
    }

    /// A node is a token iff it carries the `tok` annotation and covers
    /// nothing itself.
    pub fn is_token(&self, db: &Graph, n: NodeID) -> bool {
        if db.get_node_annos().get_value_for_item(&n, &self.tok_key).is_none() {
            return false;
        }
        !self.cov_edges.iter().any(|c| c.out_edges(n).next().is_some())
    }

    pub fn left_token_for(&self, db: &Graph, n: NodeID) -> Option<NodeID> {
        if self.is_token(db, n) {
            Some(n)
        } else {
            self.left_edges.out_edges(n).next()
        }
    }

    pub fn right_token_for(&self, db: &Graph, n: NodeID) -> Option<NodeID> {
        if self.is_token(db, n) {
            Some(n)
        } else {
            self.right_edges.out_edges(n).next()
        }
    }

    pub fn left_right_token_for(&self, db: &Graph, n: NodeID) -> (Option<NodeID>, Option<NodeID>) {
        if self.is_token(db, n) {
            (Some(n), Some(n))
        } else {
            (self.left_edges.out_edges(n).next(), self.right_edges.out_edges(n).next())
        }
    }

    pub fn covered_token(&self, n: NodeID) -> Box<dyn Iterator<Item = NodeID> + '_> {
        if self.cov_edges.is_empty() {
            return Box::new(std::iter::once(n));
        }
        let mut out = Vec::new();
        for c in &self.cov_edges {
            out.extend(c.find_connected(n, 1, 1));
        }
        if out.is_empty() {
            out.push(n);
        }
        Box::new(out.into_iter())
    }

    pub fn covering_nodes(&self, token: NodeID) -> Box<dyn Iterator<Item = NodeID> + '_> {
        let mut out = vec![token];
        for c in &self.cov_edges {
            out.extend(c.find_connected_inverse(token, 1, 1));
        }
        Box::new(out.into_iter())
    }
}
