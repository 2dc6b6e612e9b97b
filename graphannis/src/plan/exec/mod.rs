//! Leaf and join implementations of the execution tree.

pub mod filter;
pub mod indexjoin;
pub mod nestedloop;
pub mod nodesearch;
pub mod parallel;

pub use filter::Filter;
pub use indexjoin::IndexJoin;
pub use nestedloop::NestedLoop;
pub use nodesearch::NodeSearchExec;
pub use parallel::{ParallelIndexJoin, ParallelNestedLoop};
