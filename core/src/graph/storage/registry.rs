//! Selects a concrete [`GraphStorage`] strategy for a component from its
//! [`GraphStatistic`], and knows how to load/save any strategy
//! by its `serialization_id` tag so the corpus manager never needs a match
//! on component type when persisting.

use std::path::Path;

use super::adjacencylist::AdjacencyListStorage;
use super::linear::LinearStorage;
use super::numvalue::{narrowest_signed_width, narrowest_unsigned_width};
use super::prepost::PrePostOrderStorage;
use super::{GraphStatistic, GraphStorage};
use crate::annostorage::AnnotationStorage;
use crate::errors::{GraphAnnisCoreError, Result};
use crate::types::NodeID;

/// The only writable strategy. Used unconditionally
/// while a corpus is being built via `apply_update`.
pub fn create_writeable() -> AdjacencyListStorage {
    AdjacencyListStorage::new()
}

/// Picks the strategy tag to convert a component to, given its statistics.
/// The adjacency list is kept when the rules below don't match.
pub fn recommended_serialization_id(stats: &GraphStatistic) -> String {
    if stats.cyclic {
        return "AdjacencyListV1".to_string();
    }
    if stats.rooted_tree && stats.max_fan_out <= 1 {
        let width = narrowest_unsigned_width(stats.max_depth);
        return format!("LinearV1_{}", width_bytes(width));
    }
    if (stats.rooted_tree && stats.max_fan_out > 1) || stats.dfs_visit_ratio <= 1.03 {
        let order_width = narrowest_unsigned_width(stats.nodes.saturating_mul(2));
        let level_width = narrowest_signed_width(stats.max_depth);
        return format!("PrePostOrderV1_{}_{}", width_bytes(order_width), width_bytes(level_width));
    }
    "AdjacencyListV1".to_string()
}

fn width_bytes(name: &str) -> usize {
    match name {
        "u8" | "i8" => 1,
        "u16" | "i16" => 2,
        _ => 4,
    }
}

/// Instantiate the target strategy and copy every edge and edge annotation
/// from `orig` into it.
pub fn convert_component(
    serialization_id: &str,
    node_annos: &dyn AnnotationStorage<NodeID>,
    orig: &dyn GraphStorage,
) -> Result<Box<dyn GraphStorage>> {
    let mut target = instantiate(serialization_id)?;
    target.copy(node_annos, orig)?;
    Ok(target)
}

fn instantiate(serialization_id: &str) -> Result<Box<dyn GraphStorage>> {
    if serialization_id == "AdjacencyListV1" {
        return Ok(Box::new(AdjacencyListStorage::new()));
    }
    if let Some(rest) = serialization_id.strip_prefix("LinearV1_") {
        return match rest {
            "1" => Ok(Box::new(LinearStorage::<u8>::new())),
            "2" => Ok(Box::new(LinearStorage::<u16>::new())),
            "4" => Ok(Box::new(LinearStorage::<u32>::new())),
            _ => Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string())),
        };
    }
    if let Some(rest) = serialization_id.strip_prefix("PrePostOrderV1_") {
        let mut parts = rest.split('_');
        let order = parts.next();
        let level = parts.next();
        return match (order, level) {
            (Some("1"), Some("1")) => Ok(Box::new(PrePostOrderStorage::<u8, i8>::new())),
            (Some("2"), Some("2")) => Ok(Box::new(PrePostOrderStorage::<u16, i16>::new())),
            (Some("4"), Some("4")) => Ok(Box::new(PrePostOrderStorage::<u32, i32>::new())),
            (Some("1"), Some("2")) => Ok(Box::new(PrePostOrderStorage::<u8, i16>::new())),
            (Some("2"), Some("1")) => Ok(Box::new(PrePostOrderStorage::<u16, i8>::new())),
            (Some("1"), Some("4")) => Ok(Box::new(PrePostOrderStorage::<u8, i32>::new())),
            (Some("2"), Some("4")) => Ok(Box::new(PrePostOrderStorage::<u16, i32>::new())),
            (Some("4"), Some("1")) => Ok(Box::new(PrePostOrderStorage::<u32, i8>::new())),
            (Some("4"), Some("2")) => Ok(Box::new(PrePostOrderStorage::<u32, i16>::new())),
            _ => Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string())),
        };
    }
    Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string()))
}

/// Load a component's payload from `location`, dispatching on the
/// `serialization_id` written alongside it.
pub fn load_by_serialization_id(serialization_id: &str, location: &Path) -> Result<Box<dyn GraphStorage>> {
    if serialization_id == "AdjacencyListV1" {
        return Ok(Box::new(super::adjacencylist::load_from(location)?));
    }
    if let Some(rest) = serialization_id.strip_prefix("LinearV1_") {
        return match rest {
            "1" => Ok(Box::new(super::linear::load_from::<u8>(location)?)),
            "2" => Ok(Box::new(super::linear::load_from::<u16>(location)?)),
            "4" => Ok(Box::new(super::linear::load_from::<u32>(location)?)),
            _ => Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string())),
        };
    }
    if let Some(rest) = serialization_id.strip_prefix("PrePostOrderV1_") {
        let mut parts = rest.split('_');
        let order = parts.next();
        let level = parts.next();
        return match (order, level) {
            (Some("1"), Some("1")) => Ok(Box::new(super::prepost::load_from::<u8, i8>(location)?)),
            (Some("2"), Some("2")) => Ok(Box::new(super::prepost::load_from::<u16, i16>(location)?)),
            (Some("4"), Some("4")) => Ok(Box::new(super::prepost::load_from::<u32, i32>(location)?)),
            (Some("1"), Some("2")) => Ok(Box::new(super::prepost::load_from::<u8, i16>(location)?)),
            (Some("2"), Some("1")) => Ok(Box::new(super::prepost::load_from::<u16, i8>(location)?)),
            (Some("1"), Some("4")) => Ok(Box::new(super::prepost::load_from::<u8, i32>(location)?)),
            (Some("2"), Some("4")) => Ok(Box::new(super::prepost::load_from::<u16, i32>(location)?)),
            (Some("4"), Some("1")) => Ok(Box::new(super::prepost::load_from::<u32, i8>(location)?)),
            (Some("4"), Some("2")) => Ok(Box::new(super::prepost::load_from::<u32, i16>(location)?)),
            _ => Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string())),
        };
    }
    Err(GraphAnnisCoreError::UnknownGraphStorageImpl(serialization_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_graph_always_picks_adjacency_list() {
        let stats = GraphStatistic {
            cyclic: true,
            ..Default::default()
        };
        assert_eq!(recommended_serialization_id(&stats), "AdjacencyListV1");
    }

    #[test]
    fn single_fan_out_tree_picks_linear() {
        let stats = GraphStatistic {
            rooted_tree: true,
            max_fan_out: 1,
            max_depth: 10,
            ..Default::default()
        };
        assert_eq!(recommended_serialization_id(&stats), "LinearV1_1");
    }

    #[test]
    fn branching_tree_picks_prepost_order() {
        let stats = GraphStatistic {
            rooted_tree: true,
            max_fan_out: 3,
            nodes: 1000,
            max_depth: 5,
            ..Default::default()
        };
        assert_eq!(recommended_serialization_id(&stats), "PrePostOrderV1_2_1");
    }

    #[test]
    fn low_dfs_visit_ratio_picks_prepost_order() {
        let stats = GraphStatistic {
            rooted_tree: false,
            dfs_visit_ratio: 1.0,
            nodes: 10,
            max_depth: 2,
            ..Default::default()
        };
        assert_eq!(recommended_serialization_id(&stats), "PrePostOrderV1_1_1");
    }
}
