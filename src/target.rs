//! C4 — the target resolver: turning a transition's target spec into an
//! absolute [`Path`], and turning a resolved target node into the
//! [`StateValue`] fragment that becomes active at and below it (§4.4).
//!
//! Grounded on `other_examples` `leptos-state` `core_types.rs`'s
//! `resolve_target_state`/`execute_entry_actions` recursive descent;
//! history projection (shallow vs. deep) has no direct analogue in the
//! example pack and is built straight from `SPEC_FULL.md` §4.4.

use std::collections::BTreeMap;

use crate::builder::MachineDefinition;
use crate::node::{Kind, Path, StateNode};
use crate::state_value::StateValue;

/// Per-history-pseudo-state recorded fragments, keyed by the history node's
/// own path. Populated by the actor runtime (C5) whenever a compound or
/// parallel node carrying history children is exited.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore(BTreeMap<Path, StateValue>);

impl HistoryStore {
    pub fn new() -> HistoryStore {
        HistoryStore::default()
    }

    pub fn record(&mut self, history_path: Path, fragment: StateValue) {
        self.0.insert(history_path, fragment);
    }

    pub fn get(&self, history_path: &Path) -> Option<&StateValue> {
        self.0.get(history_path)
    }

    /// Drops every recorded fragment at or below `path` — used when a
    /// history-bearing region is torn down entirely (e.g. by a parent
    /// transition) rather than merely re-entered.
    pub fn forget_below(&mut self, path: &Path) {
        self.0.retain(|k, _| !k.has_prefix(path) || k == path);
    }
}

/// Resolves a transition's `target` string to an absolute path, searching
/// from the transition's source outward through ancestors for a matching
/// child chain, and falling back to an absolute lookup from the root.
pub fn resolve_target_path(def: &MachineDefinition, source: &Path, spec: &str) -> Option<Path> {
    let segments: Vec<&str> = spec.split('.').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }

    let mut base = Some(source.clone());
    while let Some(candidate) = base {
        if let Some(resolved) = resolve_from(def, &candidate, &segments) {
            return Some(resolved);
        }
        base = candidate.parent();
    }
    resolve_from(def, &Path::root(), &segments)
}

fn resolve_from(def: &MachineDefinition, base: &Path, segments: &[&str]) -> Option<Path> {
    let mut current = def.node(base)?;
    let mut path = base.clone();
    for segment in segments {
        let child = current.child(segment)?;
        path = path.child(*segment);
        current = child;
    }
    Some(path)
}

/// The whole machine's initial configuration: recurses from the (unnamed)
/// root through `initial`/regions until every branch bottoms out at an
/// atomic leaf.
pub fn initial_value(def: &MachineDefinition, history: &HistoryStore) -> StateValue {
    enter(def, def.root.as_ref(), history)
}

/// The value to merge in at `path`'s *parent* when `path` is entered by a
/// transition: keyed by `path`'s own name (via [`wrap`]), then recursed
/// through `initial`/regions/history below it.
pub fn resolve_entry_value(def: &MachineDefinition, path: &Path, history: &HistoryStore) -> StateValue {
    let node = def
        .node(path)
        .expect("resolve_target_path only returns paths that exist");
    wrap(def, node, history)
}

fn enter(def: &MachineDefinition, node: &StateNode, history: &HistoryStore) -> StateValue {
    match node.kind {
        Kind::Atomic | Kind::Final => StateValue::Leaf(node.name().to_string()),
        Kind::Compound => {
            let initial_name = node
                .initial
                .as_deref()
                .expect("compound nodes with children are validated to have `initial`");
            let child = node
                .child(initial_name)
                .expect("`initial` is validated to name an existing child");
            wrap(def, child, history)
        }
        Kind::Parallel => {
            let mut regions = BTreeMap::new();
            for region in &node.children {
                regions.insert(region.name().to_string(), enter(def, region, history));
            }
            StateValue::Parallel(regions)
        }
        Kind::History { deep } => enter_history(def, node, deep, history),
    }
}

fn wrap(def: &MachineDefinition, child: &StateNode, history: &HistoryStore) -> StateValue {
    match child.kind {
        Kind::Atomic | Kind::Final => StateValue::Leaf(child.name().to_string()),
        Kind::History { .. } => enter(def, child, history),
        _ => StateValue::Compound(child.name().to_string(), Box::new(enter(def, child, history))),
    }
}

fn enter_history(
    def: &MachineDefinition,
    history_node: &StateNode,
    deep: bool,
    history: &HistoryStore,
) -> StateValue {
    let parent_path = history_node
        .path
        .parent()
        .expect("history nodes are validated to have a parent");
    let parent = def.node(&parent_path).expect("parent exists");

    if let Some(recorded) = history.get(&history_node.path) {
        return if deep {
            recorded.clone()
        } else {
            reresolve_shallow(def, parent, recorded, history)
        };
    }

    // Nothing recorded yet: fall back to the declared default, or the
    // parent's own `initial`.
    match history_node
        .history_default
        .as_deref()
        .or(parent.initial.as_deref())
    {
        Some(name) => {
            let child = parent
                .child(name)
                .expect("validated at build time to name an existing sibling");
            wrap(def, child, history)
        }
        None => enter(def, parent, history),
    }
}

/// Shallow history keeps only the immediate child identity recorded for
/// `parent` and re-resolves everything below that child fresh via
/// `initial`, rather than trusting the deeper recorded structure.
fn reresolve_shallow(
    def: &MachineDefinition,
    parent: &StateNode,
    recorded: &StateValue,
    history: &HistoryStore,
) -> StateValue {
    match recorded {
        StateValue::Leaf(name) => StateValue::Leaf(name.clone()),
        StateValue::Compound(name, _inner) => {
            let child = parent
                .child(name)
                .expect("recorded fragment names one of the parent's own children");
            wrap(def, child, history)
        }
        StateValue::Parallel(_) => enter(def, parent, history),
    }
}

/// Walks `value` looking for any parallel node whose regions aren't all
/// represented, and fills in the missing ones via `initial` (§4.4's
/// autocompletion rule, exercised when a target only names some regions of
/// a parallel state explicitly).
pub fn autocomplete_parallel_regions(
    def: &MachineDefinition,
    node: &StateNode,
    value: StateValue,
    history: &HistoryStore,
) -> StateValue {
    match (node.kind, value) {
        (Kind::Parallel, StateValue::Parallel(mut regions)) => {
            for region in &node.children {
                regions
                    .entry(region.name().to_string())
                    .or_insert_with(|| enter(def, region, history));
            }
            for region in &node.children {
                if let Some(existing) = regions.remove(region.name()) {
                    let completed = autocomplete_parallel_regions(def, region, existing, history);
                    regions.insert(region.name().to_string(), completed);
                }
            }
            StateValue::Parallel(regions)
        }
        (Kind::Compound, StateValue::Compound(name, inner)) => {
            let child = node.child(&name).expect("value names an existing child");
            StateValue::Compound(name, Box::new(autocomplete_parallel_regions(def, child, *inner, history)))
        }
        (_, other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::config::MachineConfig;

    fn build(json: &str) -> MachineDefinition {
        let config: MachineConfig = serde_json::from_str(json).unwrap();
        MachineBuilder::from_config(config).build().unwrap()
    }

    #[test]
    fn resolves_nested_initial_chain() {
        let def = build(
            r#"{
                "initial": "parent",
                "states": {
                    "parent": {
                        "initial": "b",
                        "states": { "a": {}, "b": {} }
                    }
                }
            }"#,
        );
        let history = HistoryStore::new();
        let value = initial_value(&def, &history);
        assert_eq!(
            value,
            StateValue::Compound("parent".into(), Box::new(StateValue::Leaf("b".into())))
        );
    }

    #[test]
    fn resolves_sibling_relative_target() {
        let def = build(
            r#"{
                "initial": "a",
                "states": {
                    "a": { "on": { "NEXT": "b" } },
                    "b": {}
                }
            }"#,
        );
        let path = resolve_target_path(&def, &Path::from_segments(["a".into()]), "b").unwrap();
        assert_eq!(path, Path::from_segments(["b".into()]));
    }

    #[test]
    fn shallow_history_re_resolves_below_recorded_child() {
        let def = build(
            r#"{
                "initial": "parent",
                "states": {
                    "parent": {
                        "initial": "a",
                        "states": {
                            "a": {},
                            "b": {
                                "initial": "b1",
                                "states": { "b1": {}, "b2": {} }
                            },
                            "hist": { "type": "history" }
                        }
                    }
                }
            }"#,
        );
        let mut history = HistoryStore::new();
        let parent_path = Path::from_segments(["parent".into()]);
        history.record(
            parent_path.child("hist"),
            StateValue::Compound(
                "b".into(),
                Box::new(StateValue::Leaf("b2".into())),
            ),
        );
        let hist_node_path = parent_path.child("hist");
        let value = resolve_entry_value(&def, &hist_node_path, &history);
        // Shallow history keeps "b" but re-resolves its interior via `initial` (b1), not b2.
        assert_eq!(
            value,
            StateValue::Compound("b".into(), Box::new(StateValue::Leaf("b1".into())))
        );
    }
}
