//! C3 — the transition resolver: selecting which transition(s) fire for an
//! event (or for `always`), and deriving the exit/entry sets from the
//! least common ancestor of source and target (§4.3).
//!
//! Grounded on the teacher's `StateExt::{depth, common_ancestor_depth,
//! transition_path}` and `Superstate::handle`'s `Response::Super` bubbling
//! (`blocking/state.rs`, `blocking/superstate.rs`), generalized from a
//! fixed compile-time enum chain to an arbitrary-depth runtime path walk
//! over `crate::node::StateNode`.

use crate::builder::MachineDefinition;
use crate::node::{ActionRef, GuardRef, Path};
use crate::state_value::StateValue;
use crate::target::{self, HistoryStore};

/// One fired transition: the node it was declared on, and what to do.
#[derive(Debug, Clone)]
pub struct Selection {
    pub source: Path,
    /// `None` means an internal transition — no state is exited or
    /// entered, only `actions` run.
    pub target: Option<String>,
    pub actions: Vec<ActionRef>,
}

/// The exit/entry sets and resolved entry value for one external
/// transition, computed from its [`Selection`] and the currently active
/// [`StateValue`].
#[derive(Debug, Clone)]
pub struct ExitEntry {
    pub lca: Path,
    /// Currently active node paths to exit, deepest first.
    pub exit_paths: Vec<Path>,
    /// Node paths to enter, shallowest first.
    pub entry_paths: Vec<Path>,
    /// The value to merge into `lca`'s region map (or, if `lca` is the
    /// root, the whole new top-level value for this branch).
    pub entry_value: StateValue,
    pub target_path: Path,
}

/// Every node on `path`, from `path` itself up to (and including) the
/// root, nearest first — the order `on`/`always` handlers are searched in.
fn self_and_ancestors(path: &Path) -> impl Iterator<Item = Path> + '_ {
    std::iter::once(path.clone()).chain(path.ancestors())
}

/// Selects, independently for each currently active leaf path (i.e.
/// region-by-region for a parallel configuration), the first transition
/// whose guard passes among those registered for `event_name` at that
/// path's node or one of its ancestors.
pub fn select_for_event(
    def: &MachineDefinition,
    active: &StateValue,
    event_name: &str,
    mut guard_ok: impl FnMut(&GuardRef) -> bool,
) -> Vec<Selection> {
    let mut selections = Vec::new();
    for leaf_path in active.paths() {
        for candidate in self_and_ancestors(&leaf_path) {
            let Some(node) = def.node(&candidate) else {
                continue;
            };
            let Some(list) = node.on.get(event_name) else {
                continue;
            };
            if let Some(t) = list
                .iter()
                .find(|t| t.guard.as_ref().map(|g| guard_ok(g)).unwrap_or(true))
            {
                selections.push(Selection {
                    source: candidate,
                    target: t.target.clone(),
                    actions: t.actions.clone(),
                });
                break;
            }
        }
    }
    selections
}

/// Selects eventless (`always`) transitions, region-by-region, exactly
/// like [`select_for_event`] but reading each node's `always` list.
pub fn select_always(
    def: &MachineDefinition,
    active: &StateValue,
    mut guard_ok: impl FnMut(&GuardRef) -> bool,
) -> Vec<Selection> {
    let mut selections = Vec::new();
    for leaf_path in active.paths() {
        for candidate in self_and_ancestors(&leaf_path) {
            let Some(node) = def.node(&candidate) else {
                continue;
            };
            if node.always.is_empty() {
                continue;
            }
            if let Some(t) = node
                .always
                .iter()
                .find(|t| t.guard.as_ref().map(|g| guard_ok(g)).unwrap_or(true))
            {
                selections.push(Selection {
                    source: candidate,
                    target: t.target.clone(),
                    actions: t.actions.clone(),
                });
                break;
            }
        }
    }
    selections
}

/// Computes the least common ancestor, exit set, and entry set for an
/// external (targeted) transition. `target==source` is the "restart"
/// special case: the LCA is taken to be `source`'s parent, so the source
/// state is exited and freshly re-entered instead of being a no-op.
pub fn compute_exit_entry(
    def: &MachineDefinition,
    active: &StateValue,
    source: &Path,
    target_spec: &str,
    history: &HistoryStore,
) -> Option<ExitEntry> {
    let target_path = target::resolve_target_path(def, source, target_spec)?;

    let lca = if &target_path == source {
        source.parent().unwrap_or_else(Path::root)
    } else {
        source.common_ancestor(&target_path)
    };

    let mut exit_paths: Vec<Path> = active
        .node_paths()
        .into_iter()
        .filter(|p| lca.is_ancestor_of(p))
        .collect();
    exit_paths.sort_by_key(|p| std::cmp::Reverse(p.len()));

    let entry_value = target::resolve_entry_value(def, &target_path, history);
    let target_parent = target_path.parent().unwrap_or_else(Path::root);

    let mut entry_paths: Vec<Path> = target_path
        .ancestors()
        .take_while(|p| p.len() > lca.len())
        .collect();
    entry_paths.reverse();

    for relative in entry_value.node_paths() {
        let absolute = target_parent.join(&relative);
        if !entry_paths.contains(&absolute) {
            entry_paths.push(absolute);
        }
    }
    entry_paths.sort_by_key(|p| p.len());

    Some(ExitEntry {
        lca,
        exit_paths,
        entry_paths,
        entry_value,
        target_path,
    })
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
    fn toggle_selects_sibling_transition() {
        let def = build(
            r#"{
                "initial": "inactive",
                "states": {
                    "inactive": { "on": { "TOGGLE": "active" } },
                    "active": { "on": { "TOGGLE": "inactive" } }
                }
            }"#,
        );
        let active = StateValue::Leaf("inactive".into());
        let selections = select_for_event(&def, &active, "TOGGLE", |_| true);
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].target.as_deref(), Some("active"));
    }

    #[test]
    fn parallel_regions_select_independently() {
        let def = build(
            r#"{
                "type": "parallel",
                "states": {
                    "region1": {
                        "initial": "off",
                        "states": {
                            "off": { "on": { "FLIP": "on" } },
                            "on": { "on": { "FLIP": "off" } }
                        }
                    },
                    "region2": {
                        "initial": "static",
                        "states": { "static": {} }
                    }
                }
            }"#,
        );
        let mut regions = std::collections::BTreeMap::new();
        regions.insert("region1".to_string(), StateValue::Leaf("off".into()));
        regions.insert("region2".to_string(), StateValue::Leaf("static".into()));
        let active = StateValue::Parallel(regions);

        let selections = select_for_event(&def, &active, "FLIP", |_| true);
        assert_eq!(selections.len(), 1);
        assert_eq!(selections[0].target.as_deref(), Some("on"));
    }

    #[test]
    fn exit_entry_restarts_self_transition_through_parent() {
        let def = build(
            r#"{
                "initial": "a",
                "states": { "a": { "on": { "RESTART": "a" } } }
            }"#,
        );
        let active = StateValue::Leaf("a".into());
        let history = HistoryStore::new();
        let ee = compute_exit_entry(
            &def,
            &active,
            &Path::from_segments(["a".into()]),
            "a",
            &history,
        )
        .unwrap();
        assert_eq!(ee.lca, Path::root());
        assert_eq!(ee.exit_paths, vec![Path::from_segments(["a".into()])]);
        assert_eq!(ee.entry_paths, vec![Path::from_segments(["a".into()])]);
    }

    #[test]
    fn exit_entry_crosses_into_sibling_compound() {
        let def = build(
            r#"{
                "initial": "parent",
                "states": {
                    "parent": {
                        "initial": "a",
                        "states": {
                            "a": { "on": { "GO": "other" } },
                            "b": {}
                        }
                    },
                    "other": { "initial": "x", "states": { "x": {} } }
                }
            }"#,
        );
        let active = StateValue::Compound("parent".into(), Box::new(StateValue::Leaf("a".into())));
        let history = HistoryStore::new();
        let ee = compute_exit_entry(
            &def,
            &active,
            &Path::from_segments(["parent".into(), "a".into()]),
            "other",
            &history,
        )
        .unwrap();
        assert_eq!(ee.lca, Path::root());
        assert_eq!(
            ee.exit_paths,
            vec![
                Path::from_segments(["parent".into(), "a".into()]),
                Path::from_segments(["parent".into()]),
            ]
        );
        assert_eq!(
            ee.entry_paths,
            vec![
                Path::from_segments(["other".into()]),
                Path::from_segments(["other".into(), "x".into()]),
            ]
        );
    }
}
