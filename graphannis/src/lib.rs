pub mod annosearch;
pub mod corpusstorage;
pub mod errors;
pub mod graph;
pub mod operator;
pub mod plan;
pub mod query;
pub mod token_helper;

pub use corpusstorage::{
    CorpusStorage, CorpusStorageConfig, FrequencyDefEntry, FrequencyTable, FrequencyTableRow,
};
pub use errors::{GraphAnnisError, Result};
pub use query::{JoinSpec, NodeSearchSpec, QueryPlanDescription, TextMatching};

// Keep the allocator pinned to the system one, so `Graph::estimate_memory_size`
// measures what the OS actually hands out rather than an allocator-internal view.
use std::alloc::System;
#[global_allocator]
static GLOBAL: System = System;
