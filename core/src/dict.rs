//! Bijective string <-> ID dictionary.
//!
//! IDs are stable for the lifetime of a corpus and the dictionary only ever
//! grows: deleting a string is not supported, matching the "dictionary grows
//! monotonically during a load" contract.

use graphannis_malloc_size_of_derive::MallocSizeOf;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::errors::{GraphAnnisCoreError, Result};
use crate::types::StringID;
use crate::util::regex_full_match;

/// The empty string is always interned at a fixed ID.
pub const EMPTY_STRING_ID: StringID = 0;

#[derive(Serialize, Deserialize, Clone, Debug, MallocSizeOf)]
pub struct StringDictionary {
    by_id: FxHashMap<StringID, String>,
    by_value: FxHashMap<String, StringID>,
    next_id: StringID,
}

impl Default for StringDictionary {
    fn default() -> Self {
        Self::new()
    }
}

impl StringDictionary {
    pub fn new() -> StringDictionary {
        let mut dict = StringDictionary {
            by_id: FxHashMap::default(),
            by_value: FxHashMap::default(),
            next_id: 0,
        };
        // reserve ID 0 for the empty string unconditionally
        let id = dict.add("");
        debug_assert_eq!(id, EMPTY_STRING_ID);
        dict
    }

    /// Add `val` to the dictionary, returning its ID. Idempotent: adding the
    /// same string twice returns the same ID.
    pub fn add(&mut self, val: &str) -> StringID {
        if let Some(existing) = self.by_value.get(val) {
            return *existing;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_id.insert(id, val.to_string());
        self.by_value.insert(val.to_string(), id);
        id
    }

    pub fn id_of(&self, val: &str) -> Option<StringID> {
        self.by_value.get(val).copied()
    }

    /// Reverse lookup. Fails with `UnknownStringID` when called on an ID that
    /// was never interned — this is a programmer error, never a
    /// recoverable data condition.
    pub fn str(&self, id: StringID) -> Result<&str> {
        self.by_id
            .get(&id)
            .map(|s| s.as_str())
            .ok_or(GraphAnnisCoreError::UnknownStringID(id))
    }

    /// All IDs whose string fully matches `pattern`, used by regex anno
    /// searches to narrow the set of candidate values.
    pub fn find_regex(&self, pattern: &str) -> Result<FxHashSet<StringID>> {
        let full_match_pattern = regex_full_match(pattern);
        let re = regex::Regex::new(&full_match_pattern)?;
        Ok(self
            .by_value
            .iter()
            .filter(|(s, _)| re.is_match(s))
            .map(|(_, id)| *id)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn avg_length(&self) -> f64 {
        if self.by_id.is_empty() {
            return 0.0;
        }
        let sum: usize = self.by_id.values().map(|s| s.len()).sum();
        sum as f64 / self.by_id.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_is_idempotent() {
        let mut dict = StringDictionary::new();
        let a = dict.add("hello");
        let b = dict.add("hello");
        assert_eq!(a, b);
        assert_eq!(dict.str(a).unwrap(), "hello");
    }

    #[test]
    fn empty_string_has_reserved_id() {
        let dict = StringDictionary::new();
        assert_eq!(dict.id_of(""), Some(EMPTY_STRING_ID));
    }

    #[test]
    fn unknown_id_is_an_error() {
        let dict = StringDictionary::new();
        assert!(dict.str(9999).is_err());
    }

    #[test]
    fn find_regex_matches_full_string_only() {
        let mut dict = StringDictionary::new();
        dict.add("Bilharziose");
        dict.add("Bilharz");
        let found = dict.find_regex("Bilharz.*").unwrap();
        assert_eq!(found.len(), 2);
        let found = dict.find_regex("Bilharz").unwrap();
        assert_eq!(found.len(), 1);
    }
}
