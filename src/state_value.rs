//! C1 — the state-value model.
//!
//! A [`StateValue`] is the runtime shape of a live configuration: a leaf
//! name, a single-key record mapping a compound node's active child's name
//! to what's active inside that child, or a multi-key record holding every
//! region of a parallel state. See `SPEC_FULL.md` §4.1.
//!
//! This module only provides the representation and its pure algebra —
//! encoding/decoding paths, merging region maps, and query matching. The
//! *decision* of which child is active, and the collapsing of an atomic
//! child into a bare [`StateValue::Leaf`], belongs to the target resolver
//! (`crate::target`), which is the only component with access to node
//! kinds.
//!
//! Grounded on `other_examples` `leptos-state`'s
//! `StateValue::{Simple, Compound, Parallel}` (see `core_types.rs`), adapted
//! to collapse atomic children the way XState-style state values do.

use std::collections::BTreeMap;
use std::fmt;

use crate::node::Path;

/// A live configuration, or a fragment of one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    /// An atomic (leaf) state, identified by name.
    Leaf(String),
    /// A compound state's single active child, by name, and what is active
    /// within that child.
    Compound(String, Box<StateValue>),
    /// Every region of a parallel state, keyed by region name.
    Parallel(BTreeMap<String, StateValue>),
}

impl StateValue {
    /// Encodes a single root-to-leaf path as a [`StateValue`]. Every segment
    /// but the last becomes a [`StateValue::Compound`] wrapper; the last
    /// segment becomes the terminal [`StateValue::Leaf`].
    ///
    /// Panics if `segments` is empty — a path always names at least the
    /// active leaf.
    pub fn from_path_segments(segments: &[String]) -> StateValue {
        let (last, prefix) = segments
            .split_last()
            .expect("a path must have at least one segment");
        let mut value = StateValue::Leaf(last.clone());
        for name in prefix.iter().rev() {
            value = StateValue::Compound(name.clone(), Box::new(value));
        }
        value
    }

    /// Every root-to-leaf path encoded by this value.
    pub fn paths(&self) -> Vec<Path> {
        match self {
            StateValue::Leaf(name) => vec![Path::from_segments([name.clone()])],
            StateValue::Compound(name, inner) => inner
                .paths()
                .into_iter()
                .map(|p| p.prepend(name.clone()))
                .collect(),
            StateValue::Parallel(regions) => regions
                .iter()
                .flat_map(|(name, value)| {
                    value.paths().into_iter().map(|p| p.prepend(name.clone()))
                })
                .collect(),
        }
    }

    /// The active node set: every path returned by [`Self::paths`] plus
    /// every non-empty prefix of each, deduplicated.
    pub fn node_paths(&self) -> Vec<Path> {
        let mut seen = Vec::new();
        for path in self.paths() {
            for len in 1..=path.len() {
                let prefix = path.prefix(len);
                if !seen.contains(&prefix) {
                    seen.push(prefix);
                }
            }
        }
        seen
    }

    /// The names of this value's immediate children, without recursing:
    /// one name for [`StateValue::Compound`], the full key set for
    /// [`StateValue::Parallel`], none for [`StateValue::Leaf`].
    ///
    /// Used by the history projector (`crate::target`) to implement the
    /// shallow flavor: it keeps this layer and re-resolves everything below
    /// it via `initial`.
    pub fn top_level_child_names(&self) -> Vec<String> {
        match self {
            StateValue::Leaf(_) => Vec::new(),
            StateValue::Compound(name, _) => vec![name.clone()],
            StateValue::Parallel(regions) => regions.keys().cloned().collect(),
        }
    }

    /// Merges `updates` into the region map of a parallel state's value,
    /// keeping any region present in `existing` but absent from `updates`.
    /// Used to combine untouched regions with a newly resolved
    /// sub-configuration (§4.4).
    pub fn merge_regions(
        existing: Option<&StateValue>,
        updates: BTreeMap<String, StateValue>,
    ) -> StateValue {
        let mut map = match existing {
            Some(StateValue::Parallel(regions)) => regions.clone(),
            _ => BTreeMap::new(),
        };
        map.extend(updates);
        StateValue::Parallel(map)
    }

    /// Does every path in `query` prefix some active path in `self`?
    pub fn matches(&self, query: &StateQuery) -> bool {
        let active = self.paths();
        query
            .paths()
            .iter()
            .all(|q| active.iter().any(|p| p.has_prefix(q)))
    }

    /// Convenience over [`Self::matches`] for a dotted-string query such as
    /// `"parent.b"`.
    pub fn matches_str(&self, query: &str) -> bool {
        self.matches(&StateQuery::from_dotted(query))
    }

    /// The sub-value rooted at `path`, descending through `Compound`/
    /// `Parallel` keys. Used when recording history: the fragment stored
    /// for a history pseudo-state is the current sub-value at its parent's
    /// path, not the whole machine value.
    pub fn at_path(&self, path: &Path) -> Option<&StateValue> {
        let mut current = self;
        for name in path.segments() {
            current = match current {
                StateValue::Leaf(_) => return None,
                StateValue::Compound(key, inner) if key == name => inner.as_ref(),
                StateValue::Compound(_, _) => return None,
                StateValue::Parallel(regions) => regions.get(name)?,
            };
        }
        Some(current)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Leaf(name) => write!(f, "{name}"),
            StateValue::Compound(name, inner) => write!(f, "{{{name}: {inner}}}"),
            StateValue::Parallel(regions) => {
                write!(f, "{{")?;
                for (i, (name, value)) in regions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl serde::Serialize for StateValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            StateValue::Leaf(name) => serializer.serialize_str(name),
            StateValue::Compound(name, inner) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(name, inner.as_ref())?;
                map.end()
            }
            StateValue::Parallel(regions) => {
                let mut map = serializer.serialize_map(Some(regions.len()))?;
                for (name, value) in regions {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
        }
    }
}

/// A value matched against a [`StateValue`] by [`StateValue::matches`].
///
/// Structurally identical to [`StateValue`] but deserializable without
/// machine context, since a query never needs to distinguish "one active
/// parallel region" from "a compound's active child" — both succeed under
/// the same prefix rule.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(untagged)]
pub enum StateQuery {
    Leaf(String),
    Node(BTreeMap<String, StateQuery>),
}

impl StateQuery {
    /// Parses a dotted path such as `"parent.b"` into a nested query.
    pub fn from_dotted(dotted: &str) -> StateQuery {
        let segments: Vec<&str> = dotted.split('.').collect();
        let (last, prefix) = segments.split_last().expect("dotted query must not be empty");
        let mut query = StateQuery::Leaf(last.to_string());
        for name in prefix.iter().rev() {
            let mut map = BTreeMap::new();
            map.insert(name.to_string(), query);
            query = StateQuery::Node(map);
        }
        query
    }

    fn paths(&self) -> Vec<Path> {
        match self {
            StateQuery::Leaf(name) => vec![Path::from_segments([name.clone()])],
            StateQuery::Node(children) => children
                .iter()
                .flat_map(|(name, q)| q.paths().into_iter().map(|p| p.prepend(name.clone())))
                .collect(),
        }
    }
}
