//! C2 — turning a [`crate::config::MachineConfig`] into a validated
//! [`MachineDefinition`].
//!
//! Grounded in shape on `other_examples` `uml_state_machine`'s
//! `StateMachineBuilder`/`StateBuilder` (validate-on-build, one error per
//! structural defect), adapted from an imperative fluent API to a single
//! recursive pass over a deserialized config tree, since that is this
//! crate's primary entry point (§4.2, §4.11).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{HistoryFlavor, StateConfig, StateType, TransitionConfig};
use crate::error::BuildError;
use crate::node::{
    ActionRef, DelayRef, DelayedTransition, GuardRef, InvokeDescriptor, Kind, Path, StateNode,
    TransitionDescriptor,
};

/// The immutable, validated machine shape shared by every
/// `crate::machine::Machine<C>` built from it. Cheap to clone (an
/// `Arc<StateNode>` plus an id string).
#[derive(Debug, Clone)]
pub struct MachineDefinition {
    pub id: String,
    pub root: Arc<StateNode>,
}

impl MachineDefinition {
    pub fn node(&self, path: &Path) -> Option<&StateNode> {
        let mut current = self.root.as_ref();
        for name in path.segments() {
            current = current.child(name)?;
        }
        Some(current)
    }
}

/// Builds a [`MachineDefinition`] from a [`StateConfig`] tree, validating
/// every structural invariant from `SPEC_FULL.md` §4.2 as it goes.
pub struct MachineBuilder {
    id: String,
    root: StateConfig,
}

impl MachineBuilder {
    pub fn new(id: impl Into<String>, root: StateConfig) -> MachineBuilder {
        MachineBuilder {
            id: id.into(),
            root,
        }
    }

    pub fn from_config(config: crate::config::MachineConfig) -> MachineBuilder {
        let id = config.id.unwrap_or_else(|| "machine".to_string());
        MachineBuilder::new(id, config.root)
    }

    pub fn build(self) -> Result<MachineDefinition, BuildError> {
        let root = build_node(Path::root(), &self.root, true)?;
        let def = MachineDefinition {
            id: self.id,
            root: Arc::new(root),
        };
        validate_transition_targets(&def, def.root.as_ref())?;
        Ok(def)
    }
}

/// Every transition's `target`, if any, must resolve to a real node from
/// its declaring state — checked here, once the whole tree exists, rather
/// than during `build_node`'s single downward pass (a target can name a
/// state anywhere in the tree, not just an as-yet-unbuilt sibling).
fn validate_transition_targets(def: &MachineDefinition, node: &StateNode) -> Result<(), BuildError> {
    for transitions in node.on.values() {
        for transition in transitions {
            check_transition_target(def, node, transition)?;
        }
    }
    for transition in &node.always {
        check_transition_target(def, node, transition)?;
    }
    for delayed in &node.after {
        check_transition_target(def, node, &delayed.transition)?;
    }
    for child in &node.children {
        validate_transition_targets(def, child)?;
    }
    Ok(())
}

fn check_transition_target(
    def: &MachineDefinition,
    node: &StateNode,
    transition: &TransitionDescriptor,
) -> Result<(), BuildError> {
    if let Some(target) = &transition.target {
        if crate::target::resolve_target_path(def, &node.path, target).is_none() {
            return Err(BuildError::UnknownTransitionTarget {
                path: node.path.clone(),
                target: target.clone(),
            });
        }
    }
    Ok(())
}

fn build_node(path: Path, config: &StateConfig, is_root: bool) -> Result<StateNode, BuildError> {
    let kind = infer_kind(&path, config, is_root)?;

    if matches!(kind, Kind::History { .. }) && is_root {
        return Err(BuildError::HistoryOutsideCompoundParent { path });
    }

    let mut children = Vec::with_capacity(config.states.len());
    for (name, child_config) in &config.states {
        children.push(build_node(path.child(name), child_config, false)?);
    }

    match kind {
        Kind::Compound => {
            if !children.is_empty() {
                match &config.initial {
                    None => return Err(BuildError::MissingInitial { path }),
                    Some(initial) => {
                        if !children.iter().any(|c| c.name() == initial) {
                            return Err(BuildError::UnknownInitialChild {
                                path,
                                child: initial.clone(),
                            });
                        }
                    }
                }
            }
        }
        Kind::History { .. } => {
            if let Some(target) = &config.target {
                // The target must name a sibling; siblings aren't known
                // until the parent finishes building its children, so the
                // parent re-validates this (see `validate_history_targets`).
                let _ = target;
            }
        }
        _ => {}
    }

    let mut invoke = Vec::with_capacity(config.invoke.len());
    for (index, invoke_config) in config.invoke.iter().enumerate() {
        let id = invoke_config
            .id
            .clone()
            .unwrap_or_else(|| format!("{}{index}", invoke_config.src));
        invoke.push(InvokeDescriptor {
            id,
            src: invoke_config.src.clone(),
            input: invoke_config.input.clone(),
        });
    }

    let mut on = BTreeMap::new();
    for (event, list) in &config.on {
        on.insert(event.clone(), build_transitions(&path, list.clone().into_vec())?);
    }

    // `invoke`'s `onDone`/`onError` are sugar for `on` entries keyed by the
    // synthesized `done.invoke.<id>`/`error.invoke.<id>` event names, using
    // this invoke's resolved (possibly defaulted) id rather than whatever
    // the config happened to spell.
    for (invoke_config, descriptor) in config.invoke.iter().zip(&invoke) {
        if let Some(on_done) = &invoke_config.on_done {
            let event = format!("done.invoke.{}", descriptor.id);
            on.entry(event)
                .or_insert_with(Vec::new)
                .push(build_transition(&path, on_done)?);
        }
        if let Some(on_error) = &invoke_config.on_error {
            let event = format!("error.invoke.{}", descriptor.id);
            on.entry(event)
                .or_insert_with(Vec::new)
                .push(build_transition(&path, on_error)?);
        }
    }

    let always = build_transitions(&path, config.always.clone())?;

    let mut after = Vec::with_capacity(config.after.len());
    for (key, list) in &config.after {
        let delay = parse_delay(key);
        for transition_config in list.clone().into_vec() {
            after.push(DelayedTransition {
                delay: delay.clone(),
                transition: build_transition(&path, &transition_config)?,
            });
        }
    }

    let node = StateNode {
        path: path.clone(),
        kind,
        initial: config.initial.clone(),
        history_default: config.target.clone(),
        children,
        entry: config.entry.iter().cloned().map(ActionRef).collect(),
        exit: config.exit.iter().cloned().map(ActionRef).collect(),
        on,
        always,
        after,
        invoke,
    };

    validate_history_targets(&node)?;

    Ok(node)
}

/// History pseudo-states declare their default `target` by sibling name;
/// this can only be checked once the parent's full child list is known.
fn validate_history_targets(node: &StateNode) -> Result<(), BuildError> {
    for history in node.children.iter().filter(|c| c.is_history()) {
        if let Some(target) = &history.history_default {
            if !node.children.iter().any(|c| c.name() == target) {
                return Err(BuildError::UnknownHistoryTarget {
                    path: history.path.clone(),
                    target: target.clone(),
                });
            }
        }
    }
    Ok(())
}

fn infer_kind(path: &Path, config: &StateConfig, is_root: bool) -> Result<Kind, BuildError> {
    let _ = is_root;
    Ok(match config.r#type {
        Some(StateType::Atomic) => Kind::Atomic,
        Some(StateType::Compound) => Kind::Compound,
        Some(StateType::Parallel) => Kind::Parallel,
        Some(StateType::Final) => Kind::Final,
        Some(StateType::History) => Kind::History {
            deep: config.history == HistoryFlavor::Deep,
        },
        None => {
            let _ = path;
            if config.states.is_empty() {
                Kind::Atomic
            } else {
                Kind::Compound
            }
        }
    })
}

fn build_transitions(
    path: &Path,
    configs: Vec<TransitionConfig>,
) -> Result<Vec<TransitionDescriptor>, BuildError> {
    configs.iter().map(|c| build_transition(path, c)).collect()
}

fn build_transition(
    _path: &Path,
    config: &TransitionConfig,
) -> Result<TransitionDescriptor, BuildError> {
    Ok(TransitionDescriptor {
        target: config.target().map(str::to_string),
        guard: config.guard().map(|g| GuardRef(g.to_string())),
        actions: config.actions().iter().cloned().map(ActionRef).collect(),
    })
}

fn parse_delay(key: &str) -> DelayRef {
    match key.parse::<u64>() {
        Ok(millis) => DelayRef::Millis(millis),
        Err(_) => DelayRef::Named(key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MachineConfig;

    fn build(json: &str) -> Result<MachineDefinition, BuildError> {
        let config: MachineConfig = serde_json::from_str(json).unwrap();
        MachineBuilder::from_config(config).build()
    }

    #[test]
    fn toggle_machine_builds() {
        let def = build(
            r#"{
                "initial": "inactive",
                "states": {
                    "inactive": { "on": { "TOGGLE": "active" } },
                    "active": { "on": { "TOGGLE": "inactive" } }
                }
            }"#,
        )
        .unwrap();
        assert!(def.root.is_compound());
        assert_eq!(def.root.children.len(), 2);
    }

    #[test]
    fn missing_initial_on_nonempty_compound_is_an_error() {
        let err = build(r#"{ "states": { "a": {} } }"#).unwrap_err();
        assert!(matches!(err, BuildError::MissingInitial { .. }));
    }

    #[test]
    fn initial_naming_unknown_child_is_an_error() {
        let err = build(r#"{ "initial": "missing", "states": { "a": {} } }"#).unwrap_err();
        assert!(matches!(err, BuildError::UnknownInitialChild { .. }));
    }

    #[test]
    fn transition_to_an_unknown_state_is_an_error() {
        let err = build(
            r#"{
                "initial": "a",
                "states": {
                    "a": { "on": { "GO": "nowhere" } }
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnknownTransitionTarget { .. }));
    }

    #[test]
    fn invoke_ondone_onerror_synthesize_on_entries() {
        let def = build(
            r#"{
                "initial": "working",
                "states": {
                    "working": {
                        "invoke": [{ "id": "p0", "src": "worker", "onDone": "success", "onError": "failure" }]
                    },
                    "success": {},
                    "failure": {}
                }
            }"#,
        )
        .unwrap();
        let working = def.root.child("working").unwrap();
        assert!(working.on.contains_key("done.invoke.p0"));
        assert!(working.on.contains_key("error.invoke.p0"));
    }

    #[test]
    fn history_target_must_be_a_sibling() {
        let err = build(
            r#"{
                "initial": "a",
                "states": {
                    "a": {},
                    "hist": { "type": "history", "target": "missing" }
                }
            }"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::UnknownHistoryTarget { .. }));
    }

    #[test]
    fn history_at_root_is_rejected() {
        let err = build(r#"{ "type": "history" }"#).unwrap_err();
        assert!(matches!(err, BuildError::HistoryOutsideCompoundParent { .. }));
    }

    #[test]
    fn parallel_regions_do_not_require_initial() {
        let def = build(
            r#"{
                "type": "parallel",
                "states": {
                    "region1": { "initial": "off", "states": { "off": {}, "on": {} } },
                    "region2": { "initial": "static", "states": { "static": {} } }
                }
            }"#,
        )
        .unwrap();
        assert!(def.root.is_parallel());
    }
}
