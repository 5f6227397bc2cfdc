//! C11 — the data-driven configuration schema.
//!
//! Mirrors `SPEC_FULL.md` §6's configuration table one field at a time:
//! `initial`, `states`, `type`, `history`, `target`, `on`, `always`,
//! `after`, `entry`, `exit`, `invoke`. Action/guard/delay fields are kept as
//! bare strings — symbolic tags resolved later against a machine's
//! `crate::machine::Implementations` table, never callables embedded in the
//! document itself.
//!
//! Grounded on the teacher's optional `serde` feature (manual
//! `Serialize`/`Deserialize` for a *live* `Inner`), generalized here to the
//! inverse direction: deserializing a machine *definition* is the primary
//! build path for this crate rather than a debugging afterthought, so the
//! schema is its own module rather than a feature-gated add-on.

use std::collections::BTreeMap;

/// The structural kind of a configured state, mirroring `crate::node::Kind`
/// minus the `Final` terminal marker (inferred from an empty `states` map
/// with no `initial`, not declared explicitly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Atomic,
    Compound,
    Parallel,
    History,
    Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFlavor {
    Shallow,
    Deep,
}

impl Default for HistoryFlavor {
    fn default() -> Self {
        HistoryFlavor::Shallow
    }
}

/// A transition entry under `on`, `always`, or `after`. The bare-string
/// shorthand (`"target"`) is equivalent to `{ target: "target" }` with no
/// guard and no actions.
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum TransitionConfig {
    Target(String),
    Full {
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        guard: Option<String>,
        #[serde(default)]
        actions: Vec<String>,
    },
}

impl TransitionConfig {
    pub fn target(&self) -> Option<&str> {
        match self {
            TransitionConfig::Target(t) => Some(t.as_str()),
            TransitionConfig::Full { target, .. } => target.as_deref(),
        }
    }

    pub fn guard(&self) -> Option<&str> {
        match self {
            TransitionConfig::Target(_) => None,
            TransitionConfig::Full { guard, .. } => guard.as_deref(),
        }
    }

    pub fn actions(&self) -> &[String] {
        match self {
            TransitionConfig::Target(_) => &[],
            TransitionConfig::Full { actions, .. } => actions,
        }
    }
}

/// One or many transitions configured under a single event/delay key —
/// the first whose guard passes is taken (§4.3).
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(ts) => ts,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
pub struct InvokeConfig {
    pub src: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub input: Option<String>,
    /// Sugar for an `on: { "done.invoke.<id>": ... }` entry in the
    /// declaring state, synthesized at build time against this invoke's
    /// (possibly defaulted) id.
    #[serde(rename = "onDone", default)]
    pub on_done: Option<TransitionConfig>,
    /// Sugar for an `on: { "error.invoke.<id>": ... }` entry, synthesized
    /// the same way.
    #[serde(rename = "onError", default)]
    pub on_error: Option<TransitionConfig>,
}

/// One state's configuration, and recursively its children's. Also doubles
/// as the top-level machine document (a machine is just its root state's
/// configuration, plus an id used for log messages and for qualifying
/// invocation ids).
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct StateConfig {
    #[serde(default)]
    pub r#type: Option<StateType>,
    #[serde(default)]
    pub initial: Option<String>,
    #[serde(default)]
    pub states: BTreeMap<String, StateConfig>,
    #[serde(default)]
    pub history: HistoryFlavor,
    /// For a `history` state: the child of its parent to enter the first
    /// time the parent is activated (before anything has been recorded).
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub entry: Vec<String>,
    #[serde(default)]
    pub exit: Vec<String>,
    #[serde(default)]
    pub on: BTreeMap<String, OneOrMany<TransitionConfig>>,
    #[serde(default)]
    pub always: Vec<TransitionConfig>,
    #[serde(default)]
    pub after: BTreeMap<String, OneOrMany<TransitionConfig>>,
    #[serde(default)]
    pub invoke: Vec<InvokeConfig>,
}

/// The root of a configuration document, with an optional machine id used
/// to qualify generated invocation ids and log spans.
#[derive(Debug, Clone, Default, serde::Deserialize, serde::Serialize)]
pub struct MachineConfig {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(flatten)]
    pub root: StateConfig,
}

impl MachineConfig {
    pub fn from_json(json: &str) -> Result<MachineConfig, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_toggle_machine() {
        let json = r#"{
            "initial": "inactive",
            "states": {
                "inactive": { "on": { "TOGGLE": "active" } },
                "active": { "on": { "TOGGLE": "inactive" } }
            }
        }"#;
        let config: MachineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.root.initial.as_deref(), Some("inactive"));
        assert_eq!(config.root.states.len(), 2);
        let inactive = &config.root.states["inactive"];
        let on_toggle = inactive.on.get("TOGGLE").unwrap().clone().into_vec();
        assert_eq!(on_toggle[0].target(), Some("active"));
    }

    #[test]
    fn transition_shorthand_string_is_bare_target() {
        let t: TransitionConfig = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(t.target(), Some("active"));
        assert_eq!(t.guard(), None);
        assert!(t.actions().is_empty());
    }

    #[test]
    fn guarded_transition_list_parses_in_order() {
        let json = r#"[
            { "target": "b", "guard": "isReady" },
            { "target": "c" }
        ]"#;
        let list: OneOrMany<TransitionConfig> = serde_json::from_str(json).unwrap();
        let vec = list.into_vec();
        assert_eq!(vec.len(), 2);
        assert_eq!(vec[0].guard(), Some("isReady"));
        assert_eq!(vec[1].target(), Some("c"));
    }
}
