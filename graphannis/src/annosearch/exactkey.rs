//! Exact key search: seeks the inverse index on `(name[, ns])`
//! and reports every matching annotation, regardless of value.

use graphannis_core::annostorage::ValueSearch;

use crate::annosearch::NodeSearch;
use crate::graph::{Graph, Match, NodeID};

pub struct ExactKeySearch<'a> {
    db: &'a Graph,
    ns: Option<String>,
    name: String,
    it: Box<dyn Iterator<Item = Match> + 'a>,
}

fn make_iter<'a>(db: &'a Graph, ns: Option<&str>, name: &str) -> Box<dyn Iterator<Item = Match> + 'a> {
    let ns = ns.map(str::to_string);
    let name = name.to_string();
    Box::new(
        db.get_node_annos()
            .exact_anno_search(ns.as_deref(), &name, ValueSearch::Any)
            .map(|(node, anno): (NodeID, _)| Match { node, anno }),
    )
}

impl<'a> ExactKeySearch<'a> {
    pub fn new(db: &'a Graph, ns: Option<&str>, name: &str) -> ExactKeySearch<'a> {
        ExactKeySearch {
            db,
            ns: ns.map(str::to_string),
            name: name.to_string(),
            it: make_iter(db, ns, name),
        }
    }
}

impl<'a> Iterator for ExactKeySearch<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.it.next()
    }
}

impl<'a> NodeSearch<'a> for ExactKeySearch<'a> {
    fn reset(&mut self) {
        self.it = make_iter(self.db, self.ns.as_deref(), &self.name);
    }

    fn guess_max_count(&self) -> i64 {
        self.db
            .get_node_annos()
            .number_of_annotations_by_key(self.ns.as_deref(), &self.name) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use graphannis_core::graph::update::{GraphUpdate, UpdateEvent};

    #[test]
    fn finds_all_values_of_a_key() {
        let mut g = Graph::new();
        let mut u = GraphUpdate::new();
        for (name, val) in [("n1", "NN"), ("n2", "ART")] {
            u.add_event(UpdateEvent::AddNode {
                node_name: name.into(),
                node_type: "node".into(),
            });
            u.add_event(UpdateEvent::AddNodeLabel {
                node_name: name.into(),
                anno_ns: "tiger".into(),
                anno_name: "pos".into(),
                anno_value: val.into(),
            });
        }
        u.finish();
        g.apply_update(&mut u).unwrap();

        let mut search = ExactKeySearch::new(&g, Some("tiger"), "pos");
        assert_eq!(search.guess_max_count(), 2);
        let found: Vec<_> = (&mut search).collect();
        assert_eq!(found.len(), 2);
        search.reset();
        assert_eq!(search.count(), 2);
    }
}
