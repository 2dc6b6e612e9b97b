//! Thin bridge over `graphannis-core`'s corpus graph, so the rest of this
//! crate names one `graph` module instead of importing
//! `graphannis_core::graph` everywhere.

pub use graphannis_core::graph::storage::{EdgeContainer, GraphStatistic, GraphStorage};
pub use graphannis_core::graph::{node_name_key, node_type_key, token_key, Graph, ANNIS_NS};
pub use graphannis_core::types::{Annotation, AnnoKey, Component, ComponentType, Edge, Match, NodeID};

/// The annotation a search/operator reports when it only cares about node
/// identity, not a specific annotation value — a constant output
/// annotation.
pub fn any_node_match(node: NodeID) -> Match {
    Match {
        node,
        anno: Annotation::default(),
    }
}
