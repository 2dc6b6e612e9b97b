use std::fmt;

use graphannis_malloc_size_of_derive::MallocSizeOf;
use serde::{Deserialize, Serialize};

/// Identifier of a node in the corpus graph. Dense, monotonically assigned,
/// never reused within the lifetime of a loaded corpus.
pub type NodeID = u32;

/// Identifier of an interned string in the [`crate::dict::StringDictionary`].
pub type StringID = u32;

/// A qualified annotation name, `(namespace, name)`.
#[derive(
    Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, MallocSizeOf,
)]
pub struct AnnoKey {
    pub ns: String,
    pub name: String,
}

impl fmt::Display for AnnoKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.ns.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.ns, self.name)
        }
    }
}

/// A fully resolved annotation: a key plus the (decoded) string value.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, MallocSizeOf)]
pub struct Annotation {
    pub key: AnnoKey,
    pub val: String,
}

/// A directed edge between two nodes. Ordering is `(source, target)`, as
/// required so graph storages can seek by source prefix.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, MallocSizeOf)]
pub struct Edge {
    pub source: NodeID,
    pub target: NodeID,
}

impl Edge {
    pub fn inverse(&self) -> Edge {
        Edge {
            source: self.target,
            target: self.source,
        }
    }
}

/// The closed set of component kinds a corpus graph's edges can belong to.
///
/// Closed by design, modelled as a sum type: there is no plugin mechanism
/// for new component types.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, MallocSizeOf,
)]
pub enum ComponentType {
    Coverage,
    InverseCoverage,
    Dominance,
    Pointing,
    Ordering,
    LeftToken,
    RightToken,
    PartOfSubcorpus,
}

impl ComponentType {
    pub fn all() -> &'static [ComponentType] {
        use ComponentType::*;
        &[
            Coverage,
            InverseCoverage,
            Dominance,
            Pointing,
            Ordering,
            LeftToken,
            RightToken,
            PartOfSubcorpus,
        ]
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            ComponentType::Coverage => "Coverage",
            ComponentType::InverseCoverage => "InverseCoverage",
            ComponentType::Dominance => "Dominance",
            ComponentType::Pointing => "Pointing",
            ComponentType::Ordering => "Ordering",
            ComponentType::LeftToken => "LeftToken",
            ComponentType::RightToken => "RightToken",
            ComponentType::PartOfSubcorpus => "PartOfSubcorpus",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for ComponentType {
    type Err = crate::errors::GraphAnnisCoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Coverage" => Ok(ComponentType::Coverage),
            "InverseCoverage" => Ok(ComponentType::InverseCoverage),
            "Dominance" => Ok(ComponentType::Dominance),
            "Pointing" => Ok(ComponentType::Pointing),
            "Ordering" => Ok(ComponentType::Ordering),
            "LeftToken" => Ok(ComponentType::LeftToken),
            "RightToken" => Ok(ComponentType::RightToken),
            "PartOfSubcorpus" => Ok(ComponentType::PartOfSubcorpus),
            _ => Err(crate::errors::GraphAnnisCoreError::InvalidComponentType(
                s.to_string(),
            )),
        }
    }
}

/// A named partition of edges with uniform semantics: `(type, layer, name)`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, MallocSizeOf,
)]
pub struct Component {
    pub ctype: ComponentType,
    pub layer: String,
    pub name: String,
}

impl Component {
    pub fn new(ctype: ComponentType, layer: impl Into<String>, name: impl Into<String>) -> Self {
        Component {
            ctype,
            layer: layer.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.ctype, self.layer, self.name)
    }
}

/// A `(NodeID, Annotation)` pair produced by a search or operator (glossary).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Match {
    pub node: NodeID,
    pub anno: Annotation,
}
