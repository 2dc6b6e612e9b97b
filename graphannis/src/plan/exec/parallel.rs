//! Task/thread-parallel join variants. Workers push results
//! onto a shared bounded queue (`std::sync::mpsc::sync_channel`); the queue
//! shuts down once every worker has finished, so draining it never blocks
//! past the last result.
//!
//! Unlike the sequential joins, these materialise their output eagerly
//! inside `new()`: a lazily-pulled cross-thread generator would need
//! non-scoped (`'static`) worker threads, which the borrowed-graph operators
//! here cannot offer. Parallelism buys the computation, not the pull.

use std::sync::mpsc;

use crate::operator::Operator;
use crate::plan::{CostEstimate, Desc, ExecutionNode, Tuple};

fn worker_count(num_background_tasks: usize, work_items: usize) -> usize {
    num_background_tasks.max(1).min(work_items.max(1))
}

fn chunk_size(total: usize, num_workers: usize) -> usize {
    ((total + num_workers - 1) / num_workers.max(1)).max(1)
}

pub struct ParallelIndexJoin {
    results: std::vec::IntoIter<Tuple>,
    desc: Desc,
}

impl ParallelIndexJoin {
    pub fn new<'a>(
        lhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        lhs_idx: usize,
        op: Box<dyn Operator + Sync + 'a>,
        rhs_desc: &Desc,
        new_component_nr: usize,
        num_background_tasks: usize,
    ) -> ParallelIndexJoin {
        let lhs_desc = lhs.get_desc().cloned();
        let lhs_tuples: Vec<Tuple> = lhs.collect();

        let num_workers = worker_count(num_background_tasks, lhs_tuples.len());
        let (tx, rx) = mpsc::sync_channel::<Tuple>(256);
        let op_ref = op.as_ref();

        std::thread::scope(|scope| {
            for chunk in lhs_tuples.chunks(chunk_size(lhs_tuples.len(), num_workers)) {
                let tx = tx.clone();
                scope.spawn(move || {
                    for m_lhs in chunk {
                        for m_rhs in op_ref.retrieve_matches(&m_lhs[lhs_idx]) {
                            let different = m_rhs.node != m_lhs[lhs_idx].node;
                            if op_ref.is_reflexive() || different {
                                let mut result = m_lhs.clone();
                                result.push(m_rhs);
                                if tx.send(result).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
            drop(tx);
        });

        let results: Vec<Tuple> = rx.into_iter().collect();
        let output = results.len();
        let cost = lhs_desc
            .as_ref()
            .and_then(|d| d.cost.clone())
            .zip(rhs_desc.cost.clone())
            .map(|(lc, rc)| CostEstimate::join(&lc, &rc, output, 1));
        let placeholder = Desc::leaf(0, None, String::new());
        let desc = Desc::join(
            new_component_nr,
            lhs_desc.as_ref().unwrap_or(&placeholder),
            rhs_desc,
            cost,
            "parallel indexjoin".to_string(),
        );

        ParallelIndexJoin {
            results: results.into_iter(),
            desc,
        }
    }
}

impl Iterator for ParallelIndexJoin {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.results.next()
    }
}

impl ExecutionNode for ParallelIndexJoin {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}

pub struct ParallelNestedLoop {
    results: std::vec::IntoIter<Tuple>,
    desc: Desc,
}

impl ParallelNestedLoop {
    pub fn new<'a>(
        lhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        rhs: Box<dyn ExecutionNode<Item = Tuple> + 'a>,
        lhs_idx: usize,
        rhs_idx: usize,
        op: Box<dyn Operator + Sync + 'a>,
        new_component_nr: usize,
        num_background_tasks: usize,
    ) -> ParallelNestedLoop {
        let lhs_desc = lhs.get_desc().cloned();
        let rhs_desc = rhs.get_desc().cloned();
        let outer_tuples: Vec<Tuple> = lhs.collect();
        // every worker scans the same materialised RHS cache, built once up
        // front rather than by a "first worker to finish" race.
        let inner_cache: Vec<Tuple> = rhs.collect();

        let num_workers = worker_count(num_background_tasks, outer_tuples.len());
        let (tx, rx) = mpsc::sync_channel::<Tuple>(256);
        let op_ref = op.as_ref();
        let inner_cache_ref = &inner_cache;

        std::thread::scope(|scope| {
            for chunk in outer_tuples.chunks(chunk_size(outer_tuples.len(), num_workers)) {
                let tx = tx.clone();
                scope.spawn(move || {
                    for m_lhs in chunk {
                        for m_rhs in inner_cache_ref {
                            if !op_ref.filter_match(&m_lhs[lhs_idx], &m_rhs[rhs_idx]) {
                                continue;
                            }
                            let lhs_m = &m_lhs[lhs_idx];
                            let rhs_m = &m_rhs[rhs_idx];
                            if !op_ref.is_reflexive() && lhs_m.node == rhs_m.node && lhs_m.anno.key == rhs_m.anno.key {
                                continue;
                            }
                            let mut result = m_lhs.clone();
                            result.extend(m_rhs.iter().cloned());
                            if tx.send(result).is_err() {
                                return;
                            }
                        }
                    }
                });
            }
            drop(tx);
        });

        let results: Vec<Tuple> = rx.into_iter().collect();
        let output = results.len();
        let cost = lhs_desc
            .as_ref()
            .and_then(|d| d.cost.clone())
            .zip(rhs_desc.as_ref().and_then(|d| d.cost.clone()))
            .map(|(lc, rc)| CostEstimate::join(&lc, &rc, output, 4));
        let placeholder = Desc::leaf(0, None, String::new());
        let desc = Desc::join(
            new_component_nr,
            lhs_desc.as_ref().unwrap_or(&placeholder),
            rhs_desc.as_ref().unwrap_or(&placeholder),
            cost,
            "parallel nestedloop".to_string(),
        );

        ParallelNestedLoop {
            results: results.into_iter(),
            desc,
        }
    }
}

impl Iterator for ParallelNestedLoop {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        self.results.next()
    }
}

impl ExecutionNode for ParallelNestedLoop {
    fn get_desc(&self) -> Option<&Desc> {
        Some(&self.desc)
    }
}
