//! The leaf of every execution tree: a single annotation search wrapped so
//! each match becomes a one-column tuple.

use crate::annosearch::NodeSearch;
use crate::graph::Match;
use crate::plan::{CostEstimate, Desc, ExecutionNode, Tuple};

pub struct NodeSearchExec<'a> {
    it: Box<dyn NodeSearch<'a> + 'a>,
    desc: Desc,
}

impl<'a> NodeSearchExec<'a> {
    pub fn new(it: Box<dyn NodeSearch<'a> + 'a>, component_nr: usize, description: String) -> NodeSearchExec<'a> {
        let cost = CostEstimate::base(it.guess_max_count().max(0) as usize);
        let desc = Desc::leaf(component_nr, Some(cost), description);
        NodeSearchExec { it, desc }
    }
}

impl<'a> Iterator for NodeSearchExec<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.it.next().map(|m: Match| vec![m])
    }
}

impl<'a> ExecutionNode for NodeSearchExec<'a> {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}
