//! Dictionary-encoded string storage, generic annotation indices, and the
//! graph-storage family that together make up a corpus graph. This crate has
//! no query-language knowledge; it is consumed by the `graphannis` crate's
//! operator algebra, planner and executor.

pub mod annostorage;
pub mod dict;
pub mod errors;
pub mod graph;
pub mod types;
pub mod util;
