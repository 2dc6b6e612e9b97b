//! Degenerate join: when an operator's two
//! operands are already in the same sub-plan, applying it adds no column —
//! it only drops tuples that fail `filter_match`.

use std::fmt;

use crate::operator::Operator;
use crate::plan::{Desc, ExecutionNode, Tuple};

pub struct Filter<'a> {
    inner: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
    left_idx: usize,
    right_idx: usize,
    op: Box<dyn Operator + 'a>,
    desc: Desc,
}

impl<'a> Filter<'a> {
    pub fn new(
        inner: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        left_idx: usize,
        right_idx: usize,
        op: Box<dyn Operator + 'a>,
    ) -> Filter<'a> {
        let mut desc = inner
            .get_desc()
            .cloned()
            .unwrap_or_else(|| Desc::leaf(0, None, String::new()));
        desc.description = format!("filter {}", op);
        Filter {
            inner,
            left_idx,
            right_idx,
            op,
            desc,
        }
    }
}

impl<'a> fmt::Debug for Filter<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Filter({})", self.op)
    }
}

impl<'a> Iterator for Filter<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        for m in &mut self.inner {
            let lhs = &m[self.left_idx];
            let rhs = &m[self.right_idx];
            let reflexive_ok =
                self.op.is_reflexive() || lhs.node != rhs.node || lhs.anno.key != rhs.anno.key;
            if reflexive_ok && self.op.filter_match(lhs, rhs) {
                return Some(m);
            }
        }
        None
    }
}

impl<'a> ExecutionNode for Filter<'a> {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}
