//! Ties a [`MachineDefinition`] (C2) to a concrete set of action, guard,
//! delay, and invocation implementations, producing the `Machine<C>` that
//! `crate::actor::Actor` runs.
//!
//! Grounded on the teacher's `IntoStateMachine` associated-type pattern
//! (`Context`/`Event`/`State` tied to one machine type at compile time),
//! generalized here to a runtime name-addressed registry since the
//! definition itself is data, not a Rust enum (§4.2, §4.11).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::actor::effect::ActionContext;
use crate::adapter::Logic;
use crate::builder::MachineDefinition;
use crate::event::Event;
use crate::node::{ActionRef, DelayRef, GuardRef};

type ActionFn<C> = dyn Fn(&mut ActionContext<C>, &Event) + Send + Sync;
type GuardFn<C> = dyn Fn(&C, &Event) -> bool + Send + Sync;
type DelayFn<C> = dyn Fn(&C, &Event) -> Duration + Send + Sync;
type InputFn<C> = dyn Fn(&C, &Event) -> serde_json::Value + Send + Sync;

/// The named overlay of callables a [`MachineDefinition`]'s symbolic
/// [`ActionRef`]/[`GuardRef`]/[`DelayRef`]/invoke-`src` references are
/// resolved against.
///
/// A name with no registered implementation is never a build error (§7):
/// `run_action` is a no-op, `eval_guard` defaults to `true`, and
/// `resolve_delay` defaults to zero — each logged once at `warn` through
/// `tracing`.
pub struct Implementations<C> {
    actions: HashMap<String, Arc<ActionFn<C>>>,
    guards: HashMap<String, Arc<GuardFn<C>>>,
    delays: HashMap<String, Arc<DelayFn<C>>>,
    logics: HashMap<String, Arc<dyn Logic>>,
    inputs: HashMap<String, Arc<InputFn<C>>>,
}

impl<C> Default for Implementations<C> {
    fn default() -> Self {
        Implementations {
            actions: HashMap::new(),
            guards: HashMap::new(),
            delays: HashMap::new(),
            logics: HashMap::new(),
            inputs: HashMap::new(),
        }
    }
}

impl<C> Implementations<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut ActionContext<C>, &Event) + Send + Sync + 'static,
    ) -> Self {
        self.actions.insert(name.into(), Arc::new(f));
        self
    }

    pub fn guard(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&C, &Event) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.guards.insert(name.into(), Arc::new(f));
        self
    }

    pub fn delay(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&C, &Event) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.delays.insert(name.into(), Arc::new(f));
        self
    }

    pub fn logic(mut self, name: impl Into<String>, logic: impl Logic + 'static) -> Self {
        self.logics.insert(name.into(), Arc::new(logic));
        self
    }

    pub fn input(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&C, &Event) -> serde_json::Value + Send + Sync + 'static,
    ) -> Self {
        self.inputs.insert(name.into(), Arc::new(f));
        self
    }

    /// Merges `other`'s entries over `self`'s, `other` winning on conflicts
    /// — the semantics `Machine::provide` needs for test-time overrides.
    fn merge(mut self, other: Implementations<C>) -> Self {
        self.actions.extend(other.actions);
        self.guards.extend(other.guards);
        self.delays.extend(other.delays);
        self.logics.extend(other.logics);
        self.inputs.extend(other.inputs);
        self
    }

    pub(crate) fn run_action(&self, action: &ActionRef, context: &mut ActionContext<C>, event: &Event) {
        match self.actions.get(&action.0) {
            Some(f) => f(context, event),
            None => tracing::warn!(action = %action.0, "no implementation registered; treated as a no-op"),
        }
    }

    pub(crate) fn eval_guard(&self, guard: &GuardRef, context: &C, event: &Event) -> bool {
        match self.guards.get(&guard.0) {
            Some(f) => f(context, event),
            None => {
                tracing::warn!(guard = %guard.0, "no implementation registered; treated as truthy");
                true
            }
        }
    }

    pub(crate) fn resolve_delay(&self, delay: &DelayRef, context: &C, event: &Event) -> Duration {
        match delay {
            DelayRef::Millis(millis) => Duration::from_millis(*millis),
            DelayRef::Named(name) => match self.delays.get(name) {
                Some(f) => f(context, event),
                None => {
                    tracing::warn!(delay = %name, "no implementation registered; treated as zero delay");
                    Duration::ZERO
                }
            },
        }
    }

    pub(crate) fn logic_for(&self, src: &str) -> Option<Arc<dyn Logic>> {
        let found = self.logics.get(src).cloned();
        if found.is_none() {
            tracing::warn!(src = %src, "no invocation logic registered; invocation is a no-op");
        }
        found
    }

    pub(crate) fn resolve_input(&self, name: &str, context: &C, event: &Event) -> serde_json::Value {
        match self.inputs.get(name) {
            Some(f) => f(context, event),
            None => {
                tracing::warn!(input = %name, "no input mapper registered; passing null");
                serde_json::Value::Null
            }
        }
    }
}

/// A validated [`MachineDefinition`] paired with a concrete
/// [`Implementations`] overlay — the unit `crate::actor::Actor::spawn`
/// consumes. Cheap to clone: both fields are reference-counted.
pub struct Machine<C> {
    pub(crate) definition: Arc<MachineDefinition>,
    pub(crate) implementations: Arc<Implementations<C>>,
}

impl<C> Clone for Machine<C> {
    fn clone(&self) -> Self {
        Machine {
            definition: self.definition.clone(),
            implementations: self.implementations.clone(),
        }
    }
}

impl<C> Machine<C> {
    pub fn new(definition: MachineDefinition, implementations: Implementations<C>) -> Machine<C> {
        Machine {
            definition: Arc::new(definition),
            implementations: Arc::new(implementations),
        }
    }

    pub fn definition(&self) -> &MachineDefinition {
        &self.definition
    }

    /// Returns a new `Machine` sharing this one's definition but with
    /// `overrides` merged over its implementations — for swapping in test
    /// doubles without rebuilding the state tree.
    pub fn provide(&self, overrides: Implementations<C>) -> Machine<C>
    where
        C: 'static,
    {
        let merged = Implementations::default().merge(clone_into(&self.implementations)).merge(overrides);
        Machine {
            definition: self.definition.clone(),
            implementations: Arc::new(merged),
        }
    }
}

/// `Implementations` holds `Arc<dyn Fn...>` entries, so cloning it is just
/// cloning each `Arc` — cheap, and avoids requiring a separate `Clone`
/// bound on every stored closure.
fn clone_into<C>(implementations: &Implementations<C>) -> Implementations<C> {
    Implementations {
        actions: implementations.actions.clone(),
        guards: implementations.guards.clone(),
        delays: implementations.delays.clone(),
        logics: implementations.logics.clone(),
        inputs: implementations.inputs.clone(),
    }
}
