use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use graphannis_malloc_size_of::MallocSizeOf;
use graphannis_malloc_size_of_derive::MallocSizeOf;
use rand::seq::SliceRandom;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{AnnotationStorage, Histogram, MatchGroup, ValueSearch};
use crate::dict::StringDictionary;
use crate::errors::Result;
use crate::types::{AnnoKey, Annotation};
use crate::util::regex_full_match;

/// The in-memory implementation of [`AnnotationStorage`].
///
/// `by_anno` is keyed `(name, ns, value)` so that range queries give the
/// prefix seeks needed on `(name)`, `(name, ns)` and `(name, ns, value)`.
#[derive(Serialize, Deserialize, Clone, Debug, MallocSizeOf)]
pub struct AnnoStorageImpl<T: Ord + Hash + MallocSizeOf> {
    by_container: BTreeMap<T, Vec<Annotation>>,
    by_anno: BTreeMap<(String, String, String), BTreeSet<T>>,
    anno_keys: BTreeMap<AnnoKey, usize>,
    histograms: BTreeMap<AnnoKey, Histogram>,
    largest_item: Option<T>,
    total_number_of_annos: usize,
}

impl<T> Default for AnnoStorageImpl<T>
where
    T: Ord + Hash + MallocSizeOf,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AnnoStorageImpl<T>
where
    T: Ord + Hash + Clone + MallocSizeOf,
{
    pub fn new() -> Self {
        AnnoStorageImpl {
            by_container: BTreeMap::new(),
            by_anno: BTreeMap::new(),
            anno_keys: BTreeMap::new(),
            histograms: BTreeMap::new(),
            largest_item: None,
            total_number_of_annos: 0,
        }
    }

    fn update_largest(&mut self, item: &T) {
        if self.largest_item.as_ref().map_or(true, |l| item > l) {
            self.largest_item = Some(item.clone());
        }
    }

    fn anno_key_tuple(anno: &Annotation) -> (String, String, String) {
        (anno.key.name.clone(), anno.key.ns.clone(), anno.val.clone())
    }
}

impl<T> AnnotationStorage<T> for AnnoStorageImpl<T>
where
    T: Clone + Ord + Hash + Debug + Serialize + DeserializeOwned + MallocSizeOf + Send + Sync,
{
    fn insert(&mut self, item: T, anno: Annotation) -> Result<()> {
        // overwrite: if this item already carries a value for the key, first
        // remove the stale inverse-index entry so forward/inverse stay
        // consistent.
        self.remove_annotation_for_item(&item, &anno.key)?;

        self.update_largest(&item);
        let key_tuple = Self::anno_key_tuple(&anno);
        self.by_anno.entry(key_tuple).or_default().insert(item.clone());
        *self.anno_keys.entry(anno.key.clone()).or_insert(0) += 1;
        self.by_container.entry(item).or_default().push(anno);
        self.total_number_of_annos += 1;
        Ok(())
    }

    fn bulk_insert(&mut self, mut annos: Vec<(T, Annotation)>) -> Result<()> {
        annos.sort_by(|a, b| (a.1.key.clone(), &a.0).cmp(&(b.1.key.clone(), &b.0)));
        for (item, anno) in annos {
            self.insert(item, anno)?;
        }
        Ok(())
    }

    fn remove_annotation_for_item(&mut self, item: &T, key: &AnnoKey) -> Result<Option<String>> {
        let mut removed_value = None;
        if let Some(annos) = self.by_container.get_mut(item) {
            if let Some(pos) = annos.iter().position(|a| &a.key == key) {
                let anno = annos.remove(pos);
                removed_value = Some(anno.val.clone());
                let key_tuple = Self::anno_key_tuple(&anno);
                if let Some(items) = self.by_anno.get_mut(&key_tuple) {
                    items.remove(item);
                    if items.is_empty() {
                        self.by_anno.remove(&key_tuple);
                    }
                }
                if let Some(counter) = self.anno_keys.get_mut(key) {
                    *counter -= 1;
                    if *counter == 0 {
                        self.anno_keys.remove(key);
                        self.histograms.remove(key);
                    }
                }
                self.total_number_of_annos -= 1;
            }
            if annos.is_empty() {
                self.by_container.remove(item);
            }
        }
        Ok(removed_value)
    }

    fn remove_item(&mut self, item: &T) {
        if let Some(annos) = self.by_container.remove(item) {
            for anno in annos {
                let key_tuple = Self::anno_key_tuple(&anno);
                if let Some(items) = self.by_anno.get_mut(&key_tuple) {
                    items.remove(item);
                    if items.is_empty() {
                        self.by_anno.remove(&key_tuple);
                    }
                }
                if let Some(counter) = self.anno_keys.get_mut(&anno.key) {
                    *counter -= 1;
                    if *counter == 0 {
                        self.anno_keys.remove(&anno.key);
                        self.histograms.remove(&anno.key);
                    }
                }
                self.total_number_of_annos -= 1;
            }
        }
    }

    fn get_annotations_for_item(&self, item: &T) -> Vec<Annotation> {
        self.by_container.get(item).cloned().unwrap_or_default()
    }

    fn get_value_for_item(&self, item: &T, key: &AnnoKey) -> Option<&str> {
        self.by_container
            .get(item)?
            .iter()
            .find(|a| &a.key == key)
            .map(|a| a.val.as_str())
    }

    fn get_keys_for_iterator(
        &self,
        ns: Option<&str>,
        name: Option<&str>,
        items: Box<dyn Iterator<Item = T> + '_>,
    ) -> MatchGroup<T> {
        let mut result = Vec::new();
        for item in items {
            for anno in self.get_annotations_for_item(&item) {
                if let Some(name) = name {
                    if anno.key.name != name {
                        continue;
                    }
                }
                if let Some(ns) = ns {
                    if anno.key.ns != ns {
                        continue;
                    }
                }
                result.push((item.clone(), anno));
            }
        }
        result
    }

    fn annotation_keys(&self) -> Vec<AnnoKey> {
        self.anno_keys.keys().cloned().collect()
    }

    fn exact_anno_search<'a>(
        &'a self,
        ns: Option<&str>,
        name: &str,
        value: ValueSearch<&str>,
    ) -> Box<dyn Iterator<Item = (T, Annotation)> + 'a> {
        let name = name.to_string();
        let ns = ns.map(|s| s.to_string());
        let value = match value {
            ValueSearch::Any => None,
            ValueSearch::Some(v) => Some((false, v.to_string())),
            ValueSearch::NotSome(v) => Some((true, v.to_string())),
        };
        let start = (name.clone(), String::new(), String::new());
        let iter = self
            .by_anno
            .range(start..)
            .take_while(move |((n, _, _), _)| n == &name)
            .filter(move |((_, found_ns, _), _)| {
                ns.as_ref().map_or(true, |expected| expected == found_ns)
            })
            .filter(move |((_, _, found_val), _)| match &value {
                None => true,
                Some((negated, expected)) => (found_val == expected) != *negated,
            })
            .flat_map(move |((key_name, key_ns, val), items)| {
                let key = AnnoKey {
                    ns: key_ns.clone(),
                    name: key_name.clone(),
                };
                let val = val.clone();
                items.iter().cloned().map(move |item| {
                    (
                        item,
                        Annotation {
                            key: key.clone(),
                            val: val.clone(),
                        },
                    )
                })
            });
        Box::new(iter)
    }

    fn regex_anno_search<'a>(
        &'a self,
        ns: Option<&str>,
        name: &str,
        pattern: &str,
        negated: bool,
    ) -> Box<dyn Iterator<Item = (T, Annotation)> + 'a> {
        let full_pattern = regex_full_match(pattern);
        let re = match Regex::new(&full_pattern) {
            Ok(re) => re,
            Err(_) => return Box::new(std::iter::empty()),
        };
        let name = name.to_string();
        let ns = ns.map(|s| s.to_string());
        let start = (name.clone(), String::new(), String::new());
        let iter = self
            .by_anno
            .range(start..)
            .take_while(move |((n, _, _), _)| n == &name)
            .filter(move |((_, found_ns, _), _)| {
                ns.as_ref().map_or(true, |expected| expected == found_ns)
            })
            .filter(move |((_, _, val), _)| re.is_match(val) != negated)
            .flat_map(move |((key_name, key_ns, val), items)| {
                let key = AnnoKey {
                    ns: key_ns.clone(),
                    name: key_name.clone(),
                };
                let val = val.clone();
                items.iter().cloned().map(move |item| {
                    (
                        item,
                        Annotation {
                            key: key.clone(),
                            val: val.clone(),
                        },
                    )
                })
            });
        Box::new(iter)
    }

    fn get_largest_item(&self) -> Option<T> {
        self.largest_item.clone()
    }

    fn number_of_annotations_by_key(&self, ns: Option<&str>, name: &str) -> usize {
        self.anno_keys
            .iter()
            .filter(|(k, _)| k.name == name && ns.map_or(true, |ns| ns == k.ns))
            .map(|(_, count)| *count)
            .sum()
    }

    fn calculate_statistics(&mut self, _strings: &StringDictionary) {
        let keys: Vec<AnnoKey> = self.anno_keys.keys().cloned().collect();
        let mut rng = rand::thread_rng();
        for key in keys {
            let mut values: Vec<String> = Vec::new();
            let start = (key.name.clone(), key.ns.clone(), String::new());
            for ((n, ns, val), items) in self.by_anno.range(start..) {
                if n != &key.name || ns != &key.ns {
                    break;
                }
                for _ in 0..items.len() {
                    values.push(val.clone());
                }
            }
            let sampled: Vec<String> = if values.len() > Histogram::SAMPLE_SIZE {
                values
                    .choose_multiple(&mut rng, Histogram::SAMPLE_SIZE)
                    .cloned()
                    .collect()
            } else {
                values
            };
            let mut sampled = sampled;
            sampled.sort();
            if sampled.is_empty() {
                continue;
            }
            let num_buckets = Histogram::NUM_BUCKETS.min(sampled.len());
            let mut bounds = Vec::with_capacity(num_buckets + 1);
            for i in 0..=num_buckets {
                let idx = (i * (sampled.len() - 1)) / num_buckets.max(1);
                bounds.push(sampled[idx].clone());
            }
            bounds.dedup();
            self.histograms.insert(key, Histogram { bounds });
        }
    }

    fn guess_max_count(&self, ns: Option<&str>, name: &str, lower_val: &str, upper_val: &str) -> i64 {
        let mut sum = 0i64;
        for (key, universe_size) in self.anno_keys.iter() {
            if key.name != name || ns.map_or(false, |ns| ns != key.ns) {
                continue;
            }
            let fraction = self
                .histograms
                .get(key)
                .map(|h| h.fraction_overlapping(lower_val, upper_val))
                .unwrap_or(0.0);
            sum += (*universe_size as f64 * fraction).ceil() as i64;
        }
        sum
    }

    fn guess_max_count_regex(&self, ns: Option<&str>, name: &str, pattern: &str) -> i64 {
        let (lower, upper) = crate::util::regex_prefix_range(pattern);
        match upper {
            Some(upper) => self.guess_max_count(ns, name, &lower, &upper),
            None => self.number_of_annotations_by_key(ns, name) as i64,
        }
    }

    fn len(&self) -> usize {
        self.total_number_of_annos
    }
}

impl<T> AnnoStorageImpl<T>
where
    T: Ord + Hash + Clone + MallocSizeOf + Serialize + DeserializeOwned,
{
    /// Persist to `nodes.bin` under `location`.
    pub fn save_annotations_to(&self, location: &Path) -> Result<()> {
        let f = File::create(location.join("nodes.bin"))?;
        bincode::serialize_into(BufWriter::new(f), self)?;
        Ok(())
    }

    /// Replace the contents of this store with what's at `nodes.bin` under
    /// `location`, or leave it empty if the file doesn't exist yet (a fresh
    /// corpus has no snapshot to load).
    pub fn load_annotations_from(&mut self, location: &Path) -> Result<()> {
        let path = location.join("nodes.bin");
        if !path.is_file() {
            *self = Self::new();
            return Ok(());
        }
        let f = File::open(path)?;
        *self = bincode::deserialize_from(BufReader::new(f))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeID;

    fn anno(ns: &str, name: &str, val: &str) -> Annotation {
        Annotation {
            key: AnnoKey {
                ns: ns.to_string(),
                name: name.to_string(),
            },
            val: val.to_string(),
        }
    }

    #[test]
    fn insert_and_remove_keep_counters_consistent() {
        let mut store: AnnoStorageImpl<NodeID> = AnnoStorageImpl::new();
        store.insert(1, anno("tiger", "pos", "NN")).unwrap();
        store.insert(2, anno("tiger", "pos", "ART")).unwrap();
        assert_eq!(store.number_of_annotations_by_key(Some("tiger"), "pos"), 2);

        store
            .remove_annotation_for_item(
                &1,
                &AnnoKey {
                    ns: "tiger".into(),
                    name: "pos".into(),
                },
            )
            .unwrap();
        assert_eq!(store.number_of_annotations_by_key(Some("tiger"), "pos"), 1);
        assert!(store.annotation_keys().contains(&AnnoKey {
            ns: "tiger".into(),
            name: "pos".into()
        }));
    }

    #[test]
    fn key_is_dropped_once_counter_reaches_zero() {
        let mut store: AnnoStorageImpl<NodeID> = AnnoStorageImpl::new();
        store.insert(1, anno("tiger", "pos", "NN")).unwrap();
        store
            .remove_annotation_for_item(
                &1,
                &AnnoKey {
                    ns: "tiger".into(),
                    name: "pos".into(),
                },
            )
            .unwrap();
        assert!(store.annotation_keys().is_empty());
    }

    #[test]
    fn overwriting_a_key_does_not_duplicate_inverse_entries() {
        let mut store: AnnoStorageImpl<NodeID> = AnnoStorageImpl::new();
        store.insert(1, anno("tiger", "pos", "NN")).unwrap();
        store.insert(1, anno("tiger", "pos", "ART")).unwrap();
        assert_eq!(store.number_of_annotations_by_key(Some("tiger"), "pos"), 1);
        assert_eq!(
            store.get_value_for_item(
                &1,
                &AnnoKey {
                    ns: "tiger".into(),
                    name: "pos".into()
                }
            ),
            Some("ART")
        );
    }

    #[test]
    fn remove_item_clears_all_its_annotations() {
        let mut store: AnnoStorageImpl<NodeID> = AnnoStorageImpl::new();
        store.insert(1, anno("tiger", "pos", "NN")).unwrap();
        store.insert(1, anno("annis", "tok", "house")).unwrap();
        store.remove_item(&1);
        assert!(store.get_annotations_for_item(&1).is_empty());
        assert!(store.annotation_keys().is_empty());
    }
}
