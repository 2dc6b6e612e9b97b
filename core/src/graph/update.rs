//! The graph-update script: the only contract the front-end parser,
//! importer, and C ABI have with the core. An ordered list of events, each
//! carrying a monotonically increasing `change_id`, plus a
//! `last_consistent_change_id` watermark — only events at or below the
//! watermark are ever applied.

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum UpdateEvent {
    AddNode {
        node_name: String,
        node_type: String,
    },
    DeleteNode {
        node_name: String,
    },
    AddNodeLabel {
        node_name: String,
        anno_ns: String,
        anno_name: String,
        anno_value: String,
    },
    DeleteNodeLabel {
        node_name: String,
        anno_ns: String,
        anno_name: String,
    },
    AddEdge {
        source_node: String,
        target_node: String,
        layer: String,
        component_type: String,
        component_name: String,
    },
    DeleteEdge {
        source_node: String,
        target_node: String,
        layer: String,
        component_type: String,
        component_name: String,
    },
    AddEdgeLabel {
        source_node: String,
        target_node: String,
        layer: String,
        component_type: String,
        component_name: String,
        anno_ns: String,
        anno_name: String,
        anno_value: String,
    },
    DeleteEdgeLabel {
        source_node: String,
        target_node: String,
        layer: String,
        component_type: String,
        component_name: String,
        anno_ns: String,
        anno_name: String,
    },
}

/// An ordered, append-only list of [`UpdateEvent`]s.
///
/// Events are only considered part of a *consistent* script once
/// `finish()` has stamped `last_consistent_change_id`; this mirrors the
/// corpus manager's `apply_update` step 2, which finalises an
/// inconsistent script before persisting it.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct GraphUpdate {
    diffs: Vec<(u64, UpdateEvent)>,
    last_consistent_change_id: u64,
}

impl GraphUpdate {
    pub fn new() -> GraphUpdate {
        GraphUpdate::default()
    }

    pub fn add_event(&mut self, event: UpdateEvent) {
        let change_id = self.diffs.last().map_or(1, |(id, _)| id + 1);
        self.diffs.push((change_id, event));
    }

    pub fn is_consistent(&self) -> bool {
        match self.diffs.last() {
            None => true,
            Some((last_id, _)) => self.last_consistent_change_id == *last_id,
        }
    }

    /// Stamp the current last event as consistent, as the corpus manager does
    /// before writing the script to disk.
    pub fn finish(&mut self) {
        if let Some((last_id, _)) = self.diffs.last() {
            self.last_consistent_change_id = *last_id;
        }
    }

    pub fn last_consistent_change_id(&self) -> u64 {
        self.last_consistent_change_id
    }

    /// Iterate the events with `change_id <= last_consistent_change_id`, in
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &UpdateEvent)> {
        let watermark = self.last_consistent_change_id;
        self.diffs
            .iter()
            .filter(move |(id, _)| *id <= watermark)
            .map(|(id, e)| (*id, e))
    }

    /// Events with `change_id` strictly greater than `after`, used by crash
    /// recovery to replay only what the last consistent snapshot is missing
    ///.
    pub fn iter_after(&self, after: u64) -> impl Iterator<Item = (u64, &UpdateEvent)> {
        let watermark = self.last_consistent_change_id;
        self.diffs
            .iter()
            .filter(move |(id, _)| *id > after && *id <= watermark)
            .map(|(id, e)| (*id, e))
    }

    pub fn len(&self) -> usize {
        self.diffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diffs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_script_is_consistent() {
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        assert!(!u.is_consistent());
        u.finish();
        assert!(u.is_consistent());
    }

    #[test]
    fn change_ids_are_monotonic() {
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNode {
            node_name: "n2".into(),
            node_type: "node".into(),
        });
        let ids: Vec<u64> = u.diffs.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn iter_after_only_returns_unreplayed_consistent_events() {
        let mut u = GraphUpdate::new();
        u.add_event(UpdateEvent::AddNode {
            node_name: "n1".into(),
            node_type: "node".into(),
        });
        u.add_event(UpdateEvent::AddNode {
            node_name: "n2".into(),
            node_type: "node".into(),
        });
        u.finish();
        let replayed: Vec<_> = u.iter_after(1).collect();
        assert_eq!(replayed.len(), 1);
        assert_eq!(replayed[0].0, 2);
    }
}
