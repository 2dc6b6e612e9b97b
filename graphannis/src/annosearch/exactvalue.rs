//! Exact value search: seeks `(name[, ns], value)`. Negated
//! values (`NotSome`) are supported for the AQL `!=` form.

use graphannis_core::annostorage::ValueSearch;

use crate::annosearch::NodeSearch;
use crate::graph::{node_name_key, Graph, Match, NodeID, ANNIS_NS};

pub struct ExactValueSearch<'a> {
    db: &'a Graph,
    ns: Option<String>,
    name: String,
    value: ValueSearch<String>,
    it: Box<dyn Iterator<Item = Match> + 'a>,
}

fn to_value_search(v: &ValueSearch<String>) -> ValueSearch<&str> {
    match v {
        ValueSearch::Any => ValueSearch::Any,
        ValueSearch::Some(s) => ValueSearch::Some(s.as_str()),
        ValueSearch::NotSome(s) => ValueSearch::NotSome(s.as_str()),
    }
}

fn make_iter<'a>(
    db: &'a Graph,
    ns: Option<&str>,
    name: &str,
    value: &ValueSearch<String>,
) -> Box<dyn Iterator<Item = Match> + 'a> {
    let ns = ns.map(str::to_string);
    let name = name.to_string();
    let value = value.clone();
    Box::new(
        db.get_node_annos()
            .exact_anno_search(ns.as_deref(), &name, to_value_search(&value))
            .map(|(node, anno): (NodeID, _)| Match { node, anno }),
    )
}

impl<'a> ExactValueSearch<'a> {
    pub fn new(db: &'a Graph, ns: Option<&str>, name: &str, value: ValueSearch<String>) -> ExactValueSearch<'a> {
        ExactValueSearch {
            db,
            ns: ns.map(str::to_string),
            name: name.to_string(),
            it: make_iter(db, ns, name, &value),
            value,
        }
    }
}

impl<'a> Iterator for ExactValueSearch<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.it.next()
    }
}

impl<'a> NodeSearch<'a> for ExactValueSearch<'a> {
    fn reset(&mut self) {
        self.it = make_iter(self.db, self.ns.as_deref(), &self.name, &self.value);
    }

    fn guess_max_count(&self) -> i64 {
        // node names are unique across a corpus: short
        // circuit instead of sampling a one-entry histogram.
        let node_name = node_name_key();
        if self.ns.as_deref() == Some(ANNIS_NS) && self.name == node_name.name {
            return 1;
        }
        match &self.value {
            ValueSearch::Some(v) => self.db.get_node_annos().guess_max_count(self.ns.as_deref(), &self.name, v, v),
            ValueSearch::Any => self
                .db
                .get_node_annos()
                .number_of_annotations_by_key(self.ns.as_deref(), &self.name) as i64,
            ValueSearch::NotSome(_) => self
                .db
                .get_node_annos()
                .number_of_annotations_by_key(self.ns.as_deref(), &self.name) as i64,
        }
    }
}
