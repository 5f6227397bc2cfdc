//! C2 — the machine definition's static shape: paths, state nodes, and the
//! symbolic references a node carries to actions, guards, delays, and
//! invocations. See `SPEC_FULL.md` §4.2.
//!
//! A [`StateNode`] tree is built once by `crate::builder::MachineBuilder`
//! and never mutated afterward; `crate::actor` only ever walks it by
//! shared reference. Actions/guards/delays are held here as symbolic
//! [`ActionRef`]/[`GuardRef`]/[`DelayRef`] names rather than boxed
//! closures, because the same tree is shared by every clone of a
//! `crate::machine::Machine` and resolved against that machine's own
//! `crate::machine::Implementations` table — the generalization of the
//! teacher's per-state-machine `IntoStateMachine::Context` association to a
//! runtime, name-addressed registry.

use std::fmt;

/// A root-to-node path, segment per nested state name. The empty path
/// denotes the implicit machine root.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Path(Vec<String>);

impl Path {
    pub fn root() -> Path {
        Path(Vec::new())
    }

    pub fn from_segments<I>(segments: I) -> Path
    where
        I: IntoIterator<Item = String>,
    {
        Path(segments.into_iter().collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns a new path with `name` inserted at the front.
    pub fn prepend(mut self, name: String) -> Path {
        self.0.insert(0, name);
        self
    }

    /// Returns a new path with `name` appended.
    pub fn child(&self, name: impl Into<String>) -> Path {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Path(segments)
    }

    /// This path with its last segment dropped, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// The first `len` segments of this path.
    ///
    /// Panics if `len > self.len()`.
    pub fn prefix(&self, len: usize) -> Path {
        Path(self.0[..len].to_vec())
    }

    /// Is `other` a prefix of (or equal to) this path?
    pub fn has_prefix(&self, other: &Path) -> bool {
        other.0.len() <= self.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Is `self` a strict ancestor of `other`?
    pub fn is_ancestor_of(&self, other: &Path) -> bool {
        self.0.len() < other.0.len() && other.has_prefix(self)
    }

    /// The deepest path that is a prefix of both `self` and `other` — the
    /// least common ancestor used throughout C3/C4.
    pub fn common_ancestor(&self, other: &Path) -> Path {
        let shared = self
            .0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        Path(self.0[..shared].to_vec())
    }

    /// All ancestor paths from `self` up to and including the root, nearest
    /// first. Excludes `self`.
    pub fn ancestors(&self) -> impl Iterator<Item = Path> + '_ {
        (0..self.0.len()).rev().map(|len| self.prefix(len))
    }

    /// Concatenates `suffix`'s segments onto this path.
    pub fn join(&self, suffix: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(suffix.0.iter().cloned());
        Path(segments)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0.join("."))
        }
    }
}

/// What structural role a [`StateNode`] plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// No children; the configuration terminates here.
    Atomic,
    /// Exactly one child active at a time, selected by `initial` or by a
    /// transition target.
    Compound,
    /// Every child (region) active simultaneously.
    Parallel,
    /// A pseudo-state resolved away during target resolution (§4.4);
    /// never itself part of a live configuration.
    History { deep: bool },
    /// Terminal marker for a compound's completion (§4.2, done events).
    Final,
}

/// A symbolic reference to an action implementation, resolved by name
/// against a machine's `crate::machine::Implementations` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRef(pub String);

/// A symbolic reference to a guard implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRef(pub String);

/// A symbolic reference to a delay, either a named implementation that
/// computes a `Duration` from context/event, or a literal constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelayRef {
    Named(String),
    Millis(u64),
}

/// One candidate transition attached to an event handler, an `always`
/// list, or a delayed (`after`) entry.
#[derive(Debug, Clone, Default)]
pub struct TransitionDescriptor {
    /// `None` means an internal transition: no state is exited or entered,
    /// only `actions` run.
    pub target: Option<String>,
    pub guard: Option<GuardRef>,
    pub actions: Vec<ActionRef>,
}

/// An `after` entry: a delay paired with the transition it fires.
#[derive(Debug, Clone)]
pub struct DelayedTransition {
    pub delay: DelayRef,
    pub transition: TransitionDescriptor,
}

/// A child actor or callback adapter started on entry to the declaring
/// state and stopped on exit from it (§4.7).
#[derive(Debug, Clone)]
pub struct InvokeDescriptor {
    /// Defaults to a generated id (`(src)(n)`) if the config omits one;
    /// always concrete by the time a [`StateNode`] is built.
    pub id: String,
    /// Name of the `crate::adapter::Logic` registered under this key in
    /// `crate::machine::Implementations`.
    pub src: String,
    /// Name of a registered input-mapper implementation, or `None` to pass
    /// no input.
    pub input: Option<String>,
}

/// One node in the static machine definition tree.
#[derive(Debug, Clone)]
pub struct StateNode {
    pub path: Path,
    pub kind: Kind,
    /// Name of the initial child, required for every non-empty `Compound`
    /// node, absent otherwise.
    pub initial: Option<String>,
    /// For a `History` node, the child to enter on first activation
    /// (before any history has been recorded).
    pub history_default: Option<String>,
    pub children: Vec<StateNode>,
    pub entry: Vec<ActionRef>,
    pub exit: Vec<ActionRef>,
    pub on: std::collections::BTreeMap<String, Vec<TransitionDescriptor>>,
    pub always: Vec<TransitionDescriptor>,
    pub after: Vec<DelayedTransition>,
    pub invoke: Vec<InvokeDescriptor>,
}

impl StateNode {
    pub fn name(&self) -> &str {
        self.path.last().unwrap_or("")
    }

    pub fn is_atomic(&self) -> bool {
        matches!(self.kind, Kind::Atomic | Kind::Final)
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.kind, Kind::Compound)
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.kind, Kind::Parallel)
    }

    pub fn is_history(&self) -> bool {
        matches!(self.kind, Kind::History { .. })
    }

    pub fn child(&self, name: &str) -> Option<&StateNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Depth-first iterator over this node and every descendant.
    pub fn iter(&self) -> impl Iterator<Item = &StateNode> + '_ {
        StateNodeIter {
            stack: vec![self],
        }
    }
}

struct StateNodeIter<'a> {
    stack: Vec<&'a StateNode>,
}

impl<'a> Iterator for StateNodeIter<'a> {
    type Item = &'a StateNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_ancestor_of_siblings_is_their_parent() {
        let a = Path::from_segments(["active".into(), "region1".into(), "on".into()]);
        let b = Path::from_segments(["active".into(), "region2".into(), "static".into()]);
        assert_eq!(a.common_ancestor(&b), Path::from_segments(["active".into()]));
    }

    #[test]
    fn common_ancestor_of_ancestor_and_descendant_is_the_ancestor() {
        let a = Path::from_segments(["parent".into()]);
        let b = Path::from_segments(["parent".into(), "b".into()]);
        assert_eq!(a.common_ancestor(&b), a);
        assert!(a.is_ancestor_of(&b));
    }

    #[test]
    fn display_renders_dotted_path() {
        let p = Path::from_segments(["parent".into(), "b".into()]);
        assert_eq!(p.to_string(), "parent.b");
        assert_eq!(Path::root().to_string(), "<root>");
    }
}
