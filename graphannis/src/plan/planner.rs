//! Turns a [`QueryPlanDescription`] into a connected [`ExecutionNode`] tree
//!. Five passes, in order:
//!
//! 1. unbound-regex rewrite — folded into [`crate::query::NodeSearchSpec::create_search`]
//!    itself, since it only ever touches a single leaf.
//! 2. edge-annotation rewrite — folded into [`crate::query::JoinSpec::to_operator_spec`],
//!    which already builds the operator with its edge-annotation filter attached.
//! 3. join-order search — [`optimize_join_order`] below.
//! 4. operand swap / index-join direction — chosen per join in [`build_plan_with_order`],
//!    based on which operand is still a bare, untouched node search.
//! 5. parallelisation mapping — `config.num_background_tasks >= 2` switches every
//!    join to its `Parallel*` sibling in the same step.
use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::errors::{GraphAnnisError, Result};
use crate::graph::Graph;
use crate::operator::Operator;
use crate::plan::exec::{Filter, IndexJoin, NestedLoop, NodeSearchExec, ParallelIndexJoin, ParallelNestedLoop};
use crate::plan::{Desc, ExecutionNode, Tuple};
use crate::query::QueryPlanDescription;

/// Planner-level knobs; the corpus manager derives this from
/// [`crate::corpusstorage::CorpusStorageConfig`].
#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// `>= 2` switches every cross-component join to its thread-parallel
    /// sibling.
    pub num_background_tasks: usize,
}

impl Default for PlannerConfig {
    fn default() -> PlannerConfig {
        PlannerConfig {
            num_background_tasks: 1,
        }
    }
}

/// Build the execution plan for one query alternative.
pub fn plan<'a>(
    db: &'a Graph,
    query: &QueryPlanDescription,
    config: &PlannerConfig,
) -> Result<Box<dyn ExecutionNode<Item = Tuple> + 'a>> {
    check_connected(query)?;
    let order = optimize_join_order(db, query, config)?;
    build_plan_with_order(db, query, &order, config)
}

fn check_connected(query: &QueryPlanDescription) -> Result<()> {
    if query.nodes.is_empty() {
        return Err(GraphAnnisError::DisconnectedQuery);
    }
    let mut parent: Vec<usize> = (0..query.nodes.len()).collect();

    fn find(parent: &mut Vec<usize>, x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }

    for join in &query.joins {
        let a = find(&mut parent, join.left);
        let b = find(&mut parent, join.right);
        if a != b {
            parent[a] = b;
        }
    }

    let root = find(&mut parent, 0);
    if (1..query.nodes.len()).all(|n| find(&mut parent, n) == root) {
        Ok(())
    } else {
        Err(GraphAnnisError::DisconnectedQuery)
    }
}

/// Pass 3: find a join order that minimises the plan's total
/// intermediate cost. Exhaustive for small queries, hill-climbing otherwise —
/// four swapped-pair offspring per generation, giving up after `5 * |joins|`
/// generations without improvement.
fn optimize_join_order<'a>(
    db: &'a Graph,
    query: &QueryPlanDescription,
    config: &PlannerConfig,
) -> Result<Vec<usize>> {
    let n = query.joins.len();
    if n == 0 {
        return Ok(vec![]);
    }
    if n == 1 {
        return Ok(vec![0]);
    }

    if n <= 6 {
        let mut best_order: Vec<usize> = (0..n).collect();
        let mut best_cost = order_cost(db, query, &best_order, config)?;
        for candidate in (0..n).permutations(n) {
            let cost = order_cost(db, query, &candidate, config)?;
            if cost < best_cost {
                best_cost = cost;
                best_order = candidate;
            }
        }
        return Ok(best_order);
    }

    let mut rng = SmallRng::from_seed(*b"node joins order");
    let mut best_order: Vec<usize> = (0..n).collect();
    let mut best_cost = order_cost(db, query, &best_order, config)?;

    let num_new_generations = 4;
    let max_unsuccessful_tries = 5 * n;
    let mut unsuccessful = 0;
    while unsuccessful < max_unsuccessful_tries {
        let mut found_better = false;
        for _ in 0..num_new_generations {
            let mut candidate = best_order.clone();
            let (mut a, mut b) = (0, 0);
            while a == b {
                a = rng.gen_range(0, n);
                b = rng.gen_range(0, n);
            }
            candidate.swap(a, b);

            let cost = order_cost(db, query, &candidate, config)?;
            if cost < best_cost {
                best_cost = cost;
                best_order = candidate;
                found_better = true;
            }
        }
        if found_better {
            unsuccessful = 0;
        } else {
            unsuccessful += 1;
        }
    }

    Ok(best_order)
}

fn order_cost(db: &Graph, query: &QueryPlanDescription, order: &[usize], config: &PlannerConfig) -> Result<usize> {
    let tree = build_plan_with_order(db, query, order, config)?;
    Ok(tree
        .get_desc()
        .and_then(|d| d.cost.as_ref())
        .map_or(usize::MAX, |c| c.intermediate_sum))
}

/// Passes 4 and 5: assemble the tree for one fixed join order,
/// choosing index-join vs. nested-loop per join and, when configured for
/// parallel execution, its thread-parallel sibling.
fn build_plan_with_order<'a>(
    db: &'a Graph,
    query: &QueryPlanDescription,
    order: &[usize],
    config: &PlannerConfig,
) -> Result<Box<dyn ExecutionNode<Item = Tuple> + 'a>> {
    let mut node2component: HashMap<usize, usize> = HashMap::new();
    let mut component2exec: HashMap<usize, Box<dyn ExecutionNode<Item = Tuple> + 'a>> = HashMap::new();
    let mut leaf_components: HashSet<usize> = HashSet::new();
    let mut next_component_nr = query.nodes.len();

    for (i, spec) in query.nodes.iter().enumerate() {
        let search = spec.create_search(db);
        let exec = NodeSearchExec::new(search, i, format!("node search #{}", i + 1));
        node2component.insert(i, i);
        leaf_components.insert(i);
        component2exec.insert(i, Box::new(exec) as Box<dyn ExecutionNode<Item = Tuple> + 'a>);
    }

    for &i in order {
        let join = &query.joins[i];
        let op_spec = join
            .to_operator_spec()
            .ok_or_else(|| GraphAnnisError::ImpossibleSearch(format!("unknown join operator '{}'", join.op_name)))?;
        let op = op_spec
            .create_operator(db)
            .ok_or_else(|| GraphAnnisError::ImpossibleSearch(format!("operator '{}' unavailable on this graph", join.op_name)))?;

        let left = join.left;
        let right = join.right;
        let component_left = *node2component.get(&left).ok_or(GraphAnnisError::OperandNotFound(left))?;
        let component_right = *node2component.get(&right).ok_or(GraphAnnisError::OperandNotFound(right))?;

        let exec_left = component2exec
            .remove(&component_left)
            .ok_or(GraphAnnisError::OperandNotFound(left))?;
        let idx_left = *exec_left
            .get_desc()
            .and_then(|d| d.node_pos.get(&left))
            .ok_or(GraphAnnisError::OperandNotFound(left))?;

        let new_exec: Box<dyn ExecutionNode<Item = Tuple> + 'a> = if component_left == component_right {
            let idx_right = *exec_left
                .get_desc()
                .and_then(|d| d.node_pos.get(&right))
                .ok_or(GraphAnnisError::OperandNotFound(right))?;
            Box::new(Filter::new(exec_left, idx_left, idx_right, op))
        } else {
            let exec_right = component2exec
                .remove(&component_right)
                .ok_or(GraphAnnisError::OperandNotFound(right))?;
            let idx_right = *exec_right
                .get_desc()
                .and_then(|d| d.node_pos.get(&right))
                .ok_or(GraphAnnisError::OperandNotFound(right))?;
            let rhs_desc = exec_right
                .get_desc()
                .cloned()
                .unwrap_or_else(|| Desc::leaf(component_right, None, String::new()));
            let lhs_desc = exec_left
                .get_desc()
                .cloned()
                .unwrap_or_else(|| Desc::leaf(component_left, None, String::new()));

            let rhs_is_leaf = leaf_components.contains(&component_right);
            let lhs_is_leaf = leaf_components.contains(&component_left);
            let use_parallel = config.num_background_tasks >= 2;

            if rhs_is_leaf {
                if use_parallel {
                    Box::new(ParallelIndexJoin::new(
                        exec_left,
                        idx_left,
                        op,
                        &rhs_desc,
                        next_component_nr,
                        config.num_background_tasks,
                    ))
                } else {
                    Box::new(IndexJoin::new(exec_left, idx_left, op, &rhs_desc, next_component_nr))
                }
            } else if lhs_is_leaf {
                // avoid a nested-loop by index-seeding from the other side
                // instead.
                if let Some(inverse) = op.get_inverse_operator(db) {
                    Box::new(IndexJoin::new(exec_right, idx_right, inverse, &lhs_desc, next_component_nr))
                } else if use_parallel {
                    Box::new(ParallelNestedLoop::new(
                        exec_left,
                        exec_right,
                        idx_left,
                        idx_right,
                        op,
                        next_component_nr,
                        config.num_background_tasks,
                    ))
                } else {
                    Box::new(NestedLoop::new(exec_left, exec_right, idx_left, idx_right, op, next_component_nr))
                }
            } else if use_parallel {
                Box::new(ParallelNestedLoop::new(
                    exec_left,
                    exec_right,
                    idx_left,
                    idx_right,
                    op,
                    next_component_nr,
                    config.num_background_tasks,
                ))
            } else {
                Box::new(NestedLoop::new(exec_left, exec_right, idx_left, idx_right, op, next_component_nr))
            }
        };

        leaf_components.remove(&component_left);
        leaf_components.remove(&component_right);

        let new_component_nr = new_exec
            .get_desc()
            .map(|d| d.component_nr)
            .unwrap_or(next_component_nr);
        for v in node2component.values_mut() {
            if *v == component_left || *v == component_right {
                *v = new_component_nr;
            }
        }
        component2exec.insert(new_component_nr, new_exec);
        next_component_nr += 1;
    }

    component2exec
        .into_iter()
        .map(|(_, exec)| exec)
        .next()
        .ok_or(GraphAnnisError::DisconnectedQuery)
}
