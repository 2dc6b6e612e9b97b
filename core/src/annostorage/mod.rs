//! Generic annotation store: forward map `(T, AnnoKey) -> value`,
//! inverse multi-map `Annotation -> T`, per-key counters and histograms.
//!
//! The store is generic over the entity kind `T` it annotates: `NodeID` for
//! node annotations, `Edge` for edge annotations.

pub mod inmemory;

use std::fmt::Debug;
use std::hash::Hash;

use graphannis_malloc_size_of::MallocSizeOf;
use serde::{de::DeserializeOwned, Serialize};

use crate::dict::StringDictionary;
use crate::errors::Result;
use crate::types::{AnnoKey, Annotation};

/// How a caller wants to constrain an annotation value in a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueSearch<T> {
    /// No constraint on the value; any value is matched ("key-only" search).
    Any,
    /// The value must equal `0`.
    Some(T),
    /// The value must differ from `0`.
    NotSome(T),
}

impl<T> ValueSearch<T> {
    pub fn as_option(&self) -> Option<&T> {
        match self {
            ValueSearch::Some(v) => Some(v),
            _ => None,
        }
    }
}

/// A group of `(item, annotation)` pairs produced together, e.g. by a
/// node-by-edge-annotation search that emits one result per generator output
/// for a single source node.
pub type MatchGroup<T> = Vec<(T, Annotation)>;

/// Sorted sample of observed values for one annotation key, used by
/// `guess_max_count` to approximate selectivity without scanning all values
///.
#[derive(Clone, Debug, Default, Serialize, Deserialize, MallocSizeOf)]
pub struct Histogram {
    /// Sorted bucket bounds; `bounds.len() - 1` buckets, each covering
    /// `[bounds[i], bounds[i+1])` and assumed to hold an equal share of the
    /// universe of values for this key.
    pub bounds: Vec<String>,
}

impl Histogram {
    /// Up to how many samples are drawn before bucketing.
    pub const SAMPLE_SIZE: usize = 2500;
    /// Up to how many bucket bounds are kept.
    pub const NUM_BUCKETS: usize = 250;

    pub fn fraction_overlapping(&self, lower: &str, upper: &str) -> f64 {
        if self.bounds.len() < 2 {
            return 1.0;
        }
        let num_buckets = self.bounds.len() - 1;
        let mut overlapping = 0usize;
        for w in self.bounds.windows(2) {
            let (b_lower, b_upper) = (&w[0], &w[1]);
            if b_lower.as_str() <= upper && lower <= b_upper.as_str() {
                overlapping += 1;
            }
        }
        overlapping as f64 / num_buckets as f64
    }
}

/// Generic annotation storage over an entity kind `T`.
///
/// Implementors must keep the forward map, inverse map and per-key counters
/// consistent: ∀ annotation `a`, `a` is in the forward map iff it is in the
/// inverse map, and `counter(key) == |{forward entries with key}|`.
pub trait AnnotationStorage<T>: Send + Sync
where
    T: Clone + Ord + Hash + Debug + Serialize + DeserializeOwned + MallocSizeOf,
{
    /// Insert a single annotation for `item`. Idempotent overwrite of the
    /// same key replaces the previous value (keeping counters consistent).
    fn insert(&mut self, item: T, anno: Annotation) -> Result<()>;

    /// Insert many annotations at once; required to be equivalent to calling
    /// `insert` in order, but may sort/batch internally for bulk loads.
    fn bulk_insert(&mut self, annos: Vec<(T, Annotation)>) -> Result<()>;

    /// Remove the annotation with `key` from `item`. No-op (returns `Ok(None)`)
    /// if it does not exist — deletion of an absent key is not an error.
    fn remove_annotation_for_item(&mut self, item: &T, key: &AnnoKey) -> Result<Option<String>>;

    /// Remove every annotation belonging to `item` (used when a node/edge is
    /// deleted).
    fn remove_item(&mut self, item: &T);

    fn get_annotations_for_item(&self, item: &T) -> Vec<Annotation>;

    fn get_value_for_item(&self, item: &T, key: &AnnoKey) -> Option<&str>;

    fn get_keys_for_iterator(
        &self,
        ns: Option<&str>,
        name: Option<&str>,
        items: Box<dyn Iterator<Item = T> + '_>,
    ) -> MatchGroup<T>;

    /// All distinct annotation keys currently in use.
    fn annotation_keys(&self) -> Vec<AnnoKey>;

    /// Exact-key / exact-value search: seeks the inverse index on
    /// `(name[, ns[, value]])`. Returns `(item, annotation)`
    /// pairs; callers over `NodeID` storages wrap these into `Match`.
    fn exact_anno_search<'a>(
        &'a self,
        ns: Option<&str>,
        name: &str,
        value: ValueSearch<&str>,
    ) -> Box<dyn Iterator<Item = (T, Annotation)> + 'a>;

    /// Regex value search: candidates are restricted to keys matching
    /// `ns`/`name`, then the compiled pattern is applied to each value.
    fn regex_anno_search<'a>(
        &'a self,
        ns: Option<&str>,
        name: &str,
        pattern: &str,
        negated: bool,
    ) -> Box<dyn Iterator<Item = (T, Annotation)> + 'a>;

    /// The largest item currently stored, used to derive the next free
    /// `NodeID` on load.
    fn get_largest_item(&self) -> Option<T>;

    /// Number of distinct items annotated with `key` (sum used by exact-key
    /// search cardinality estimation).
    fn number_of_annotations_by_key(&self, ns: Option<&str>, name: &str) -> usize;

    /// Recompute histograms: sample up to [`Histogram::SAMPLE_SIZE`] values
    /// per key, sort, then pick up to [`Histogram::NUM_BUCKETS`] bounds.
    fn calculate_statistics(&mut self, strings: &StringDictionary);

    /// Estimate the number of entries whose value falls in `[lower, upper]`
    /// for any key matching `ns`/`name`. Returns 0 if no statistics are
    /// available.
    fn guess_max_count(&self, ns: Option<&str>, name: &str, lower_val: &str, upper_val: &str) -> i64;

    /// As `guess_max_count`, but the range is derived from a regex pattern's
    /// literal prefix.
    fn guess_max_count_regex(&self, ns: Option<&str>, name: &str, pattern: &str) -> i64;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
