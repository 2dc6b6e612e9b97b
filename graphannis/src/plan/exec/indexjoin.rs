//! Index-seed join: for each LHS tuple, ask the operator for its
//! matching RHS candidates directly instead of scanning every RHS tuple.

use std::fmt;

use crate::operator::Operator;
use crate::plan::{CostEstimate, Desc, ExecutionNode, Tuple};

pub struct IndexJoin<'a> {
    lhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
    lhs_idx: usize,
    op: Box<dyn Operator + 'a>,
    current_lhs: Option<Tuple>,
    rhs_candidates: std::vec::IntoIter<crate::graph::Match>,
    desc: Desc,
}

impl<'a> IndexJoin<'a> {
    pub fn new(
        mut lhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        lhs_idx: usize,
        op: Box<dyn Operator + 'a>,
        rhs_desc: &Desc,
        new_component_nr: usize,
    ) -> IndexJoin<'a> {
        let lhs_desc = lhs.get_desc().cloned();
        let cost = lhs_desc.as_ref().and_then(|l| l.cost.as_ref()).and_then(|lc| {
            rhs_desc.cost.as_ref().map(|r| {
                let sel = match op.estimation_type() {
                    crate::operator::EstimationType::Selectivity(s) => s,
                    crate::operator::EstimationType::Min => 1.0 / (r.output.max(1) as f64),
                    crate::operator::EstimationType::Max => 1.0,
                };
                let output = ((lc.output as f64) * (r.output as f64) * sel).ceil().max(0.0) as usize;
                CostEstimate::join(lc, r, output, 1)
            })
        });

        let desc = Desc::join(
            new_component_nr,
            lhs_desc.as_ref().unwrap_or(&Desc::leaf(0, None, String::new())),
            rhs_desc,
            cost,
            format!("indexjoin {}", op),
        );

        let current_lhs = lhs.next();
        let rhs_candidates = if let Some(m) = &current_lhs {
            op.retrieve_matches(&m[lhs_idx]).collect::<Vec<_>>().into_iter()
        } else {
            Vec::new().into_iter()
        };

        IndexJoin {
            lhs,
            lhs_idx,
            op,
            current_lhs,
            rhs_candidates,
            desc,
        }
    }
}

impl<'a> fmt::Debug for IndexJoin<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IndexJoin({})", self.op)
    }
}

impl<'a> Iterator for IndexJoin<'a> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            let m_lhs = self.current_lhs.as_ref()?;
            if let Some(m_rhs) = self.rhs_candidates.next() {
                let lhs_node = m_lhs[self.lhs_idx].node;
                let different = m_rhs.node != lhs_node;
                if self.op.is_reflexive() || different {
                    let mut result = m_lhs.clone();
                    result.push(m_rhs);
                    return Some(result);
                }
                continue;
            }
            // rhs candidates exhausted for this lhs tuple, advance outer
            self.current_lhs = self.lhs.next();
            if let Some(m) = &self.current_lhs {
                self.rhs_candidates = self.op.retrieve_matches(&m[self.lhs_idx]).collect::<Vec<_>>().into_iter();
            } else {
                return None;
            }
        }
    }
}

impl<'a> ExecutionNode for IndexJoin<'a> {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}
