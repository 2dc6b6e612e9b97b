//! Nested-loop join: the fallback when neither operand is a bare
//! annotation search the operator can index-seed. The smaller operand (by
//! estimated cost) becomes the outer loop; the inner side is cached after
//! its first full pass so later outer tuples replay it instead of
//! re-iterating the underlying plan.

use std::fmt;

use crate::operator::Operator;
use crate::plan::{CostEstimate, Desc, ExecutionNode, Tuple};

pub struct NestedLoop<'a> {
    outer: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
    current_outer: Option<Tuple>,
    inner: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
    inner_cache: Vec<Tuple>,
    cache_pos: Option<usize>,
    op: Box<dyn Operator + 'a>,
    outer_idx: usize,
    inner_idx: usize,
    left_is_outer: bool,
    desc: Desc,
}

impl<'a> NestedLoop<'a> {
    pub fn new(
        lhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        rhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        lhs_idx: usize,
        rhs_idx: usize,
        op: Box<dyn Operator + 'a>,
        new_component_nr: usize,
    ) -> NestedLoop<'a> {
        let lhs_cost = lhs.get_desc().and_then(|d| d.cost.as_ref()).map(|c| c.output);
        let rhs_cost = rhs.get_desc().and_then(|d| d.cost.as_ref()).map(|c| c.output);
        let left_is_outer = match (lhs_cost, rhs_cost) {
            (Some(l), Some(r)) => l <= r,
            _ => true,
        };

        let (lhs_desc, rhs_desc) = (lhs.get_desc().cloned(), rhs.get_desc().cloned());
        let cost = match (&lhs_desc, &rhs_desc) {
            (Some(l), Some(r)) => l.cost.as_ref().and_then(|lc| {
                r.cost.as_ref().map(|rc| {
                    let sel = match op.estimation_type() {
                        crate::operator::EstimationType::Selectivity(s) => s,
                        _ => 1.0,
                    };
                    let output = ((lc.output as f64) * (rc.output as f64) * sel).ceil().max(0.0) as usize;
                    CostEstimate::join(lc, rc, output, 4)
                })
            }),
            _ => None,
        };

        let placeholder = Desc::leaf(0, None, String::new());
        let desc = match (&lhs_desc, &rhs_desc) {
            (Some(l), Some(r)) => Desc::join(new_component_nr, l, r, cost, format!("nestedloop {}", op)),
            _ => Desc::join(new_component_nr, &placeholder, &placeholder, cost, format!("nestedloop {}", op)),
        };

        let (mut outer, inner, outer_idx, inner_idx) = if left_is_outer {
            (lhs, rhs, lhs_idx, rhs_idx)
        } else {
            (rhs, lhs, rhs_idx, lhs_idx)
        };
        let current_outer = outer.next();

        NestedLoop {
            outer,
            current_outer,
            inner,
            inner_cache: Vec::new(),
            cache_pos: None,
            op,
            outer_idx,
            inner_idx,
            left_is_outer,
            desc,
        }
    }
}

impl<'a> fmt::Debug for NestedLoop<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NestedLoop({})", self.op)
    }
}

impl<'a> Iterator for NestedLoop<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            let m_outer = self.current_outer.as_ref()?;

            if let Some(mut pos) = self.cache_pos {
                while pos < self.inner_cache.len() {
                    let m_inner = &self.inner_cache[pos];
                    pos += 1;
                    self.cache_pos = Some(pos);
                    if let Some(result) = self.combine(m_outer, m_inner) {
                        return Some(result);
                    }
                }
            } else {
                while let Some(m_inner) = self.inner.next() {
                    self.inner_cache.push(m_inner.clone());
                    if let Some(result) = self.combine(m_outer, &m_inner) {
                        return Some(result);
                    }
                }
                self.cache_pos = Some(0);
                continue;
            }

            self.current_outer = self.outer.next();
        }
    }
}

impl<'a> NestedLoop<'a> {
    fn combine(&self, m_outer: &Tuple, m_inner: &Tuple) -> Option<Tuple> {
        // the tuple layout must always be (original lhs columns, original
        // rhs columns), independent of which side ended up as the outer
        // loop, since `desc.node_pos` was computed in that fixed order.
        let (m_lhs, m_rhs) = if self.left_is_outer {
            (m_outer, m_inner)
        } else {
            (m_inner, m_outer)
        };
        let (lhs, rhs) = (&m_lhs[self.lhs_col_idx()], &m_rhs[self.rhs_col_idx()]);

        if !self.op.filter_match(lhs, rhs) {
            return None;
        }
        // reflexivity filter: drop tuples whose matched nodes
        // are literally the same node/annotation-key pair.
        if !self.op.is_reflexive() && lhs.node == rhs.node && lhs.anno.key == rhs.anno.key {
            return None;
        }
        let mut result = m_lhs.clone();
        result.extend(m_rhs.iter().cloned());
        Some(result)
    }

    fn lhs_col_idx(&self) -> usize {
        if self.left_is_outer {
            self.outer_idx
        } else {
            self.inner_idx
        }
    }

    fn rhs_col_idx(&self) -> usize {
        if self.left_is_outer {
            self.inner_idx
        } else {
            self.outer_idx
        }
    }
}

impl<'a> ExecutionNode for NestedLoop<'a> {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}
