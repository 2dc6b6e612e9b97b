//! Regex value search: applies a compiled pattern to every value
//! of the candidate keys. The planner's unbound-regex rewrite replaces a
//! `.*` pattern with the cheaper [`super::ExactKeySearch`] before this type
//! is ever instantiated for that case.

use crate::annosearch::NodeSearch;
use crate::graph::{Graph, Match, NodeID};

pub struct RegexValueSearch<'a> {
    db: &'a Graph,
    ns: Option<String>,
    name: String,
    pattern: String,
    negated: bool,
    it: Box<dyn Iterator<Item = Match> + 'a>,
}

fn make_iter<'a>(
    db: &'a Graph,
    ns: Option<&str>,
    name: &str,
    pattern: &str,
    negated: bool,
) -> Box<dyn Iterator<Item = Match> + 'a> {
    let ns = ns.map(str::to_string);
    let name = name.to_string();
    let pattern = pattern.to_string();
    Box::new(
        db.get_node_annos()
            .regex_anno_search(ns.as_deref(), &name, &pattern, negated)
            .map(|(node, anno): (NodeID, _)| Match { node, anno }),
    )
}

impl<'a> RegexValueSearch<'a> {
    pub fn new(db: &'a Graph, ns: Option<&str>, name: &str, pattern: &str, negated: bool) -> RegexValueSearch<'a> {
        RegexValueSearch {
            db,
            ns: ns.map(str::to_string),
            name: name.to_string(),
            pattern: pattern.to_string(),
            negated,
            it: make_iter(db, ns, name, pattern, negated),
        }
    }
}

impl<'a> Iterator for RegexValueSearch<'a> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        self.it.next()
    }
}

impl<'a> NodeSearch<'a> for RegexValueSearch<'a> {
    fn reset(&mut self) {
        self.it = make_iter(self.db, self.ns.as_deref(), &self.name, &self.pattern, self.negated);
    }

    fn guess_max_count(&self) -> i64 {
        self.db
            .get_node_annos()
            .guess_max_count_regex(self.ns.as_deref(), &self.name, &self.pattern)
    }
}
