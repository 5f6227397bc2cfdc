//! C5 — the actor runtime: the macro-step algorithm, timer/invocation
//! reconciliation, observer fan-out, and the spawn/stop/subscribe surface
//! (§4.5, §5).
//!
//! Grounded on the teacher's `blocking::InitializedStateMachine`/
//! `Inner::{handle_with_context, transition}` sequencing (exit actions,
//! then the firing transition's own actions, then entry actions), adapted
//! from the teacher's `unsafe fn state_mut` escape hatch to a safe
//! `std::sync::Mutex`-guarded `ActorState`, since background timer and
//! invocation tasks must be able to deliver events to the same actor from
//! another task.

pub mod effect;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;

use crate::builder::MachineDefinition;
use crate::error::ActorError;
use crate::event::Event;
use crate::invoke::InvocationManager;
use crate::machine::Machine;
use crate::node::Path;
use crate::services::{Clock, IdGenerator, SystemClock, UuidGenerator};
use crate::state_value::{StateQuery, StateValue};
use crate::target::{self, HistoryStore};
use crate::timer::TimerManager;
use crate::transition::{self, ExitEntry, Selection};

pub use effect::{ActionContext, Effect};

/// Safety bound on the eventless (`always`) closure, so a guard cycle
/// between `always` transitions can't spin an event's macro-step forever.
const ALWAYS_ITERATION_CAP: usize = 100;

/// An immutable view of an actor at one point between macro-steps.
#[derive(Clone)]
pub struct Snapshot<C> {
    pub value: StateValue,
    pub context: C,
    machine: Arc<Machine<C>>,
}

impl<C> Snapshot<C> {
    pub fn matches(&self, query: &StateQuery) -> bool {
        self.value.matches(query)
    }

    /// Convenience over [`Self::matches`] for a dotted-string query, as
    /// `StateValue::matches_str`.
    pub fn matches_str(&self, query: &str) -> bool {
        self.value.matches_str(query)
    }

    /// Dry-runs C3 selection for `event` and reports whether anything would
    /// fire. Guards are assumed pure; an impure guard may be invoked for
    /// real here, same as the teacher's handler-dispatch classification.
    pub fn can(&self, event: &Event) -> bool {
        let selections = transition::select_for_event(
            self.machine.definition(),
            &self.value,
            &event.name,
            |guard| self.machine.implementations.eval_guard(guard, &self.context, event),
        );
        !selections.is_empty()
    }
}

/// Construction-time options for [`spawn_actor`].
pub struct ActorOptions<C> {
    pub context: C,
    pub id: Option<String>,
    pub parent: Option<mpsc::UnboundedSender<Event>>,
}

impl<C: Default> Default for ActorOptions<C> {
    fn default() -> Self {
        ActorOptions {
            context: C::default(),
            id: None,
            parent: None,
        }
    }
}

type Observer<C> = Arc<dyn Fn(&Snapshot<C>) + Send + Sync>;

/// A child addressable by `sendTo`: either a fully spawned actor, sharing
/// this crate's context type, or an invocation declared at some path.
enum Route<C> {
    Child(Arc<Actor<C>>),
    Invocation(Path),
}

struct ActorState<C, Clk> {
    value: StateValue,
    context: C,
    history: HistoryStore,
    timers: TimerManager<Clk>,
    invocations: InvocationManager,
    routes: HashMap<String, Route<C>>,
    running: bool,
}

/// A running (or stopped) instance of a [`Machine`], following one event at
/// a time to quiescence.
///
/// `Clk` defaults to [`SystemClock`]; tests construct with
/// [`crate::services::testing::VirtualClock`] via [`spawn_actor_with_clock`]
/// for deterministic timer behavior.
pub struct Actor<C, Clk = SystemClock> {
    id: String,
    machine: Arc<Machine<C>>,
    state: Mutex<ActorState<C, Clk>>,
    observers: Mutex<Vec<(u64, Observer<C>)>>,
    next_observer_id: AtomicU64,
    mailbox_tx: mpsc::UnboundedSender<Event>,
    parent: Option<mpsc::UnboundedSender<Event>>,
    clock: Arc<Clk>,
    ids: Arc<dyn IdGenerator>,
    self_weak: Mutex<Weak<Actor<C, Clk>>>,
}

/// An observer registration; dropping it unsubscribes.
pub struct Subscription<C, Clk = SystemClock> {
    id: u64,
    actor: Weak<Actor<C, Clk>>,
}

impl<C, Clk> Drop for Subscription<C, Clk> {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.upgrade() {
            actor.observers.lock().unwrap().retain(|(id, _)| *id != self.id);
        }
    }
}

/// Creates an actor in the stopped state, using the system clock and a
/// UUID-backed id generator.
pub fn spawn_actor<C>(machine: Arc<Machine<C>>, options: ActorOptions<C>) -> Arc<Actor<C, SystemClock>>
where
    C: Clone + Send + Sync + 'static,
{
    spawn_actor_with_clock(machine, options, Arc::new(SystemClock), Arc::new(UuidGenerator))
}

/// As [`spawn_actor`], but with an injected clock and id generator — the
/// entry point tests use to get deterministic timers via
/// `crate::services::testing::VirtualClock`.
pub fn spawn_actor_with_clock<C, Clk>(
    machine: Arc<Machine<C>>,
    options: ActorOptions<C>,
    clock: Arc<Clk>,
    ids: Arc<dyn IdGenerator>,
) -> Arc<Actor<C, Clk>>
where
    C: Clone + Send + Sync + 'static,
    Clk: Clock + 'static,
{
    let (mailbox_tx, mailbox_rx) = mpsc::unbounded_channel();
    let id = options.id.unwrap_or_else(|| ids.next_id());

    let initial_history = HistoryStore::new();
    let initial_value = target::initial_value(machine.definition(), &initial_history);

    let actor = Arc::new_cyclic(|weak| Actor {
        id,
        machine,
        state: Mutex::new(ActorState {
            value: initial_value,
            context: options.context,
            history: initial_history,
            timers: TimerManager::new(clock.clone()),
            invocations: InvocationManager::new(),
            routes: HashMap::new(),
            running: false,
        }),
        observers: Mutex::new(Vec::new()),
        next_observer_id: AtomicU64::new(0),
        mailbox_tx,
        parent: options.parent,
        clock,
        ids,
        self_weak: Mutex::new(weak.clone()),
    });

    spawn_mailbox_pump(Arc::downgrade(&actor), mailbox_rx);
    actor
}

fn spawn_mailbox_pump<C, Clk>(actor: Weak<Actor<C, Clk>>, mut rx: mpsc::UnboundedReceiver<Event>)
where
    C: Clone + Send + Sync + 'static,
    Clk: Clock + 'static,
{
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Some(actor) = actor.upgrade() else {
                break;
            };
            if let Err(err) = actor.send(event) {
                tracing::warn!(actor = %actor.id, error = %err, "dropped mailbox-delivered event");
            }
        }
    });
}

impl<C, Clk> Actor<C, Clk>
where
    C: Clone + Send + Sync + 'static,
    Clk: Clock + 'static,
{
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn definition(&self) -> &MachineDefinition {
        self.machine.definition()
    }

    /// Runs entry actions for the whole initial configuration, starts its
    /// timers/invocations, and runs the eventless closure. Idempotent: a
    /// second call logs a warning and does nothing.
    pub fn start(&self) {
        let mut guard = self.state.lock().unwrap();
        if guard.running {
            tracing::warn!(actor = %self.id, "start() called on an already-running actor");
            return;
        }
        guard.running = true;

        let mut nodes: Vec<Path> = guard.value.node_paths();
        nodes.sort_by_key(Path::len);
        let start_event = Event::new("$start");
        let mut effects = Vec::new();
        for path in &nodes {
            if let Some(node) = self.machine.definition().node(path) {
                for action in &node.entry {
                    let mut ctx = ActionContext::new(&mut guard.context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                    self.machine.implementations.run_action(action, &mut ctx, &start_event);
                    effects.extend(ctx.into_effects());
                }
            }
        }
        self.reconcile(&mut guard, &HashSet::new(), &nodes.into_iter().collect());
        self.run_always_closure(&mut guard);
        self.apply_effects(&mut guard, effects);
        drop(guard);
        self.notify();
    }

    /// Processes one external event to quiescence. Returns
    /// [`ActorError::Reentrant`] instead of deadlocking if called while this
    /// actor is already mid-macro-step on another thread.
    pub fn send(&self, event: Event) -> Result<(), ActorError> {
        let mut guard = match self.state.try_lock() {
            Ok(guard) => guard,
            Err(_) => return Err(ActorError::Reentrant),
        };
        if !guard.running {
            tracing::warn!(actor = %self.id, event = %event.name, "send() on a stopped actor; dropping event");
            return Ok(());
        }

        let pre_value = guard.value.clone();
        let pre_context = guard.context.clone();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_event(&mut guard, &event)));
        match outcome {
            Ok(()) => {
                drop(guard);
                self.notify();
                Ok(())
            }
            Err(payload) => {
                guard.value = pre_value;
                guard.context = pre_context;
                drop(guard);
                panic::resume_unwind(payload);
            }
        }
    }

    fn run_event(&self, guard: &mut ActorState<C, Clk>, event: &Event) {
        let selections = if let Some(delayed) = parse_delay_event(&event.name) {
            self.select_delayed(guard, &delayed)
        } else {
            transition::select_for_event(
                self.machine.definition(),
                &guard.value,
                &event.name,
                |g| self.machine.implementations.eval_guard(g, &guard.context, event),
            )
        };
        if selections.is_empty() {
            return;
        }
        let effects = self.apply_selections(guard, selections, event);
        self.run_always_closure(guard);
        self.apply_effects(guard, effects);
    }

    fn select_delayed(&self, guard: &ActorState<C, Clk>, delayed: &DelayedEventRef) -> Vec<Selection> {
        let Some(node) = self.machine.definition().node(&delayed.path) else {
            return Vec::new();
        };
        let Some(entry) = node.after.get(delayed.index) else {
            return Vec::new();
        };
        if !guard.value.node_paths().contains(&delayed.path) {
            return Vec::new();
        }
        let guard_ok = entry
            .transition
            .guard
            .as_ref()
            .map(|g| self.machine.implementations.eval_guard(g, &guard.context, &Event::new("")))
            .unwrap_or(true);
        if !guard_ok {
            return Vec::new();
        }
        vec![Selection {
            source: delayed.path.clone(),
            target: entry.transition.target.clone(),
            actions: entry.transition.actions.clone(),
        }]
    }

    /// Runs exit/transition/entry actions for a batch of independently
    /// selected transitions (one macro-step's worth — either one external
    /// event or one `always` pass), publishes the new state value and
    /// context, and reconciles timers/invocations against it. Returns
    /// effects collected along the way.
    fn apply_selections(
        &self,
        guard: &mut ActorState<C, Clk>,
        selections: Vec<Selection>,
        event: &Event,
    ) -> Vec<Effect<C>> {
        let def = self.machine.definition();
        let previous_value = guard.value.clone();
        let mut next_value = previous_value.clone();
        let mut working_context = guard.context.clone();
        let mut effects = Vec::new();

        for selection in selections {
            match &selection.target {
                None => {
                    for action in &selection.actions {
                        let mut ctx = ActionContext::new(&mut working_context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                        self.machine.implementations.run_action(action, &mut ctx, event);
                        effects.extend(ctx.into_effects());
                    }
                }
                Some(target_spec) => {
                    let Some(ee) = transition::compute_exit_entry(
                        def,
                        &previous_value,
                        &selection.source,
                        target_spec,
                        &guard.history,
                    ) else {
                        tracing::warn!(target = %target_spec, source = %selection.source, "transition target did not resolve; treated as a no-op");
                        continue;
                    };

                    record_history(def, &previous_value, &ee, &mut guard.history);

                    for exit_path in &ee.exit_paths {
                        if let Some(node) = def.node(exit_path) {
                            for action in &node.exit {
                                let mut ctx = ActionContext::new(&mut working_context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                                self.machine.implementations.run_action(action, &mut ctx, event);
                                effects.extend(ctx.into_effects());
                            }
                        }
                    }
                    for action in &selection.actions {
                        let mut ctx = ActionContext::new(&mut working_context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                        self.machine.implementations.run_action(action, &mut ctx, event);
                        effects.extend(ctx.into_effects());
                    }
                    for entry_path in &ee.entry_paths {
                        if let Some(node) = def.node(entry_path) {
                            for action in &node.entry {
                                let mut ctx = ActionContext::new(&mut working_context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                                self.machine.implementations.run_action(action, &mut ctx, event);
                                effects.extend(ctx.into_effects());
                            }
                        }
                    }

                    next_value = splice_subtree(&next_value, &ee, &previous_value, def);
                    next_value = target::autocomplete_parallel_regions(
                        def,
                        def.root.as_ref(),
                        next_value,
                        &guard.history,
                    );
                }
            }
        }

        let prev_nodes: HashSet<Path> = previous_value.node_paths().into_iter().collect();
        let next_nodes: HashSet<Path> = next_value.node_paths().into_iter().collect();

        guard.value = next_value;
        guard.context = working_context;

        self.reconcile(guard, &prev_nodes, &next_nodes);

        effects
    }

    fn run_always_closure(&self, guard: &mut ActorState<C, Clk>) {
        let always_event = Event::new(crate::event::ALWAYS);
        for _ in 0..ALWAYS_ITERATION_CAP {
            let selections = transition::select_always(self.machine.definition(), &guard.value, |g| {
                self.machine.implementations.eval_guard(g, &guard.context, &always_event)
            });
            if selections.is_empty() {
                return;
            }
            let effects = self.apply_selections(guard, selections, &always_event);
            self.apply_effects(guard, effects);
        }
        tracing::warn!(actor = %self.id, "eventless closure exceeded its iteration cap; stopping early");
    }

    fn reconcile(&self, guard: &mut ActorState<C, Clk>, prev_nodes: &HashSet<Path>, next_nodes: &HashSet<Path>) {
        let def = self.machine.definition();

        for path in prev_nodes.difference(next_nodes) {
            if let Some(node) = def.node(path) {
                for index in 0..node.after.len() {
                    guard.timers.cancel(path, index);
                }
                for invoke in &node.invoke {
                    guard.invocations.stop(path, &invoke.id);
                    guard.routes.remove(&invoke.id);
                }
            }
        }

        for path in next_nodes.difference(prev_nodes) {
            let Some(node) = def.node(path) else { continue };
            for (index, delayed) in node.after.iter().enumerate() {
                let duration = self
                    .machine
                    .implementations
                    .resolve_delay(&delayed.delay, &guard.context, &Event::new(""));
                let message = Event::new(format!("$delay.{path}.{index}"));
                guard.timers.schedule(path.clone(), index, duration, self.mailbox_tx.clone(), message);
            }
            for invoke in &node.invoke {
                let Some(logic) = self.machine.implementations.logic_for(&invoke.src) else {
                    continue;
                };
                let input = match &invoke.input {
                    Some(name) => self.machine.implementations.resolve_input(name, &guard.context, &Event::new("")),
                    None => serde_json::Value::Null,
                };
                let has_error_handler = node.on.contains_key(&format!("error.invoke.{}", invoke.id));
                guard
                    .invocations
                    .start(path.clone(), invoke, logic, input, self.mailbox_tx.clone(), has_error_handler);
                guard.routes.insert(invoke.id.clone(), Route::Invocation(path.clone()));
            }
        }
    }

    fn apply_effects(&self, guard: &mut ActorState<C, Clk>, effects: Vec<Effect<C>>) {
        for effect in effects {
            match effect {
                Effect::SendTo { actor, event } => match guard.routes.get(&actor) {
                    Some(Route::Child(child)) => {
                        if let Err(err) = child.send(event) {
                            tracing::warn!(target = %actor, error = %err, "sendTo delivery failed");
                        }
                    }
                    Some(Route::Invocation(path)) => {
                        guard.invocations.send_to(path, &actor, event);
                    }
                    None => tracing::warn!(target = %actor, "sendTo named an unknown actor; dropping event"),
                },
                Effect::SendParent { event } => match &self.parent {
                    Some(sink) => {
                        let _ = sink.send(event);
                    }
                    None => tracing::warn!(actor = %self.id, "sendParent with no parent; dropping event"),
                },
                Effect::Spawn { id, actor } => {
                    if guard.routes.contains_key(&id) {
                        tracing::warn!(
                            actor = %self.id,
                            id = %id,
                            "duplicate spawn id; stopping the new actor instead of overwriting the existing route"
                        );
                        actor.stop();
                    } else {
                        guard.routes.insert(id, Route::Child(actor));
                    }
                }
            }
        }
    }

    /// Cancels all timers, stops all invocations and spawned children, runs
    /// exit actions for every active node deepest-first with a synthesized
    /// `$stop` event, and clears observers.
    pub fn stop(&self) {
        let mut guard = self.state.lock().unwrap();
        if !guard.running {
            return;
        }
        guard.running = false;

        let root = Path::root();
        guard.timers.cancel_all_under(&root);
        guard.invocations.stop_all_under(&root);
        for route in guard.routes.values() {
            if let Route::Child(child) = route {
                child.stop();
            }
        }
        guard.routes.clear();

        let mut nodes = guard.value.node_paths();
        nodes.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let stop_event = Event::new("$stop");
        for path in &nodes {
            if let Some(node) = self.machine.definition().node(path) {
                for action in &node.exit {
                    let mut ctx = ActionContext::new(&mut guard.context, self.ids.as_ref(), Some(self.mailbox_tx.clone()), &guard.routes);
                    self.machine.implementations.run_action(action, &mut ctx, &stop_event);
                    let _ = ctx.into_effects();
                }
            }
        }
        drop(guard);
        self.observers.lock().unwrap().clear();
    }

    pub fn get_snapshot(&self) -> Snapshot<C> {
        let guard = self.state.lock().unwrap();
        Snapshot {
            value: guard.value.clone(),
            context: guard.context.clone(),
            machine: self.machine.clone(),
        }
    }

    /// Registers `observer` to be called with a snapshot after every future
    /// macro-step. A panic inside `observer` is caught and logged; it does
    /// not affect other observers or the actor (§4.5's observer contract).
    pub fn subscribe(&self, observer: impl Fn(&Snapshot<C>) + Send + Sync + 'static) -> Subscription<C, Clk> {
        let id = self.next_observer_id.fetch_add(1, Ordering::SeqCst);
        self.observers.lock().unwrap().push((id, Arc::new(observer)));
        Subscription {
            id,
            actor: self.self_weak.lock().unwrap().clone(),
        }
    }

    fn notify(&self) {
        let snapshot = self.get_snapshot();
        let observers = self.observers.lock().unwrap().clone();
        for (_, observer) in observers {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(&snapshot))) {
                let message = panic_message(&payload);
                tracing::error!(actor = %self.id, error = %message, "observer panicked; swallowed");
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct DelayedEventRef {
    path: Path,
    index: usize,
}

fn parse_delay_event(name: &str) -> Option<DelayedEventRef> {
    let rest = name.strip_prefix("$delay.")?;
    let (path_str, index_str) = rest.rsplit_once('.')?;
    let index = index_str.parse().ok()?;
    let segments: Vec<String> = path_str.split('.').filter(|s| !s.is_empty()).map(String::from).collect();
    Some(DelayedEventRef {
        path: Path::from_segments(segments),
        index,
    })
}

/// Records, for every history pseudo-state declared directly under a node
/// about to be exited, the sub-value that node held just before exit
/// (§4.5 step 5).
fn record_history(def: &MachineDefinition, previous_value: &StateValue, ee: &ExitEntry, history: &mut HistoryStore) {
    for exit_path in &ee.exit_paths {
        let Some(node) = def.node(exit_path) else { continue };
        if !(node.is_compound() || node.is_parallel()) {
            continue;
        }
        let Some(fragment) = previous_value.at_path(exit_path) else {
            continue;
        };
        for history_child in node.children.iter().filter(|c| c.is_history()) {
            history.record(history_child.path.clone(), fragment.clone());
        }
    }
}

/// Installs `ee.entry_value` into `current`'s tree at `ee.lca`, preserving
/// every region untouched by this transition — including sibling regions
/// of any parallel node on the path from `ee.lca` down to the target.
fn splice_subtree(current: &StateValue, ee: &ExitEntry, previous_value: &StateValue, def: &MachineDefinition) -> StateValue {
    let target_parent = ee.target_path.parent().unwrap_or_else(Path::root);
    let between = &target_parent.segments()[ee.lca.len()..];

    let old_at_lca = previous_value.at_path(&ee.lca).cloned().unwrap_or_else(|| StateValue::Leaf(String::new()));
    let installed = install(def, &old_at_lca, &ee.lca, between, &ee.entry_value);

    splice(current, &ee.lca, &installed)
}

/// Builds the value to install at `path` (which must equal `path_so_far`
/// extended by `remaining`), preserving untouched parallel regions at each
/// level, bottoming out at `leaf` once `remaining` is exhausted.
fn install(def: &MachineDefinition, old: &StateValue, path_so_far: &Path, remaining: &[String], leaf: &StateValue) -> StateValue {
    match remaining.split_first() {
        None => leaf.clone(),
        Some((name, rest)) => {
            let child_path = path_so_far.child(name);
            let is_parallel = def.node(path_so_far).map(|n| n.is_parallel()).unwrap_or(false);
            if is_parallel {
                let mut regions = match old {
                    StateValue::Parallel(regions) => regions.clone(),
                    _ => BTreeMap::new(),
                };
                let old_child = regions.get(name).cloned().unwrap_or_else(|| StateValue::Leaf(String::new()));
                let new_child = install(def, &old_child, &child_path, rest, leaf);
                regions.insert(name.clone(), new_child);
                StateValue::Parallel(regions)
            } else {
                let old_child = match old {
                    StateValue::Compound(n, inner) if n == name => inner.as_ref().clone(),
                    _ => StateValue::Leaf(String::new()),
                };
                let new_child = install(def, &old_child, &child_path, rest, leaf);
                StateValue::Compound(name.clone(), Box::new(new_child))
            }
        }
    }
}

/// Replaces the subtree at `path` within `value` with `replacement`,
/// preserving every sibling outside that subtree along the way down.
fn splice(value: &StateValue, path: &Path, replacement: &StateValue) -> StateValue {
    match path.segments().split_first() {
        None => replacement.clone(),
        Some((name, rest_segments)) => {
            let rest = Path::from_segments(rest_segments.to_vec());
            match value {
                StateValue::Compound(n, inner) if n == name => {
                    StateValue::Compound(n.clone(), Box::new(splice(inner, &rest, replacement)))
                }
                StateValue::Parallel(regions) => {
                    let mut regions = regions.clone();
                    let updated = regions
                        .get(name)
                        .map(|v| splice(v, &rest, replacement))
                        .unwrap_or_else(|| replacement.clone());
                    regions.insert(name.clone(), updated);
                    StateValue::Parallel(regions)
                }
                _ => replacement.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::MachineBuilder;
    use crate::config::MachineConfig;
    use crate::machine::Implementations;
    use crate::services::testing::{SequentialIdGenerator, VirtualClock};
    use std::sync::atomic::AtomicUsize;

    fn build(json: &str) -> Arc<Machine<()>> {
        let config: MachineConfig = serde_json::from_str(json).unwrap();
        let def = MachineBuilder::from_config(config).build().unwrap();
        Arc::new(Machine::new(def, Implementations::new()))
    }

    #[tokio::test]
    async fn toggle_actor_flips_on_event() {
        let machine = build(
            r#"{
                "initial": "inactive",
                "states": {
                    "inactive": { "on": { "TOGGLE": "active" } },
                    "active": { "on": { "TOGGLE": "inactive" } }
                }
            }"#,
        );
        let actor = spawn_actor(machine, ActorOptions { context: (), id: None, parent: None });
        actor.start();
        assert!(actor.get_snapshot().matches_str("inactive"));
        actor.send(Event::new("TOGGLE")).unwrap();
        assert!(actor.get_snapshot().matches_str("active"));
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_transition_fires_after_entry() {
        let machine = build(
            r#"{
                "initial": "waiting",
                "states": {
                    "waiting": { "after": { "50": "done" } },
                    "done": {}
                }
            }"#,
        );
        let actor = spawn_actor_with_clock(
            machine,
            ActorOptions { context: (), id: None, parent: None },
            Arc::new(VirtualClock),
            Arc::new(SequentialIdGenerator::default()),
        );
        actor.start();
        tokio::time::advance(std::time::Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert!(actor.get_snapshot().matches_str("done"));
    }

    #[derive(Clone, Default)]
    struct Counter(i32);

    #[tokio::test]
    async fn guarded_transition_only_fires_when_guard_passes() {
        let config: MachineConfig = serde_json::from_str(
            r#"{
                "initial": "open",
                "states": {
                    "open": { "on": { "CLOSE": { "target": "closed", "guard": "isReady" } } },
                    "closed": {}
                }
            }"#,
        )
        .unwrap();
        let def = MachineBuilder::from_config(config).build().unwrap();
        let ready = Arc::new(AtomicUsize::new(0));
        let ready_clone = ready.clone();
        let implementations = Implementations::<Counter>::new()
            .guard("isReady", move |_ctx: &Counter, _event| ready_clone.load(Ordering::SeqCst) != 0);
        let machine = Arc::new(Machine::new(def, implementations));
        let actor = spawn_actor(machine, ActorOptions { context: Counter(0), id: None, parent: None });
        actor.start();

        actor.send(Event::new("CLOSE")).unwrap();
        assert!(actor.get_snapshot().matches_str("open"));

        ready.store(1, Ordering::SeqCst);
        actor.send(Event::new("CLOSE")).unwrap();
        assert!(actor.get_snapshot().matches_str("closed"));
    }
}
