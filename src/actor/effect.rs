//! Effect descriptors: declarative requests an action can make beyond
//! mutating its own actor's context (§4.5's "effect descriptors" and
//! "spawning").
//!
//! Grounded on `SecBear-neuron/layer0`'s effect-as-value pattern (an action
//! hands back data describing what should happen, rather than performing
//! I/O itself), adapted to the two shapes the interpreter names: delivering
//! an event to another actor, and spawning one.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::ActorError;
use crate::event::Event;
use crate::machine::Machine;

use super::{Actor, ActorOptions, Route};

/// A declarative request collected while running entry/transition/exit
/// actions, applied by the actor after the macro-step's context and state
/// value have been published (§4.5 step 11).
pub enum Effect<C> {
    SendTo { actor: String, event: Event },
    SendParent { event: Event },
    Spawn { id: String, actor: Arc<Actor<C>> },
}

/// The view an action closure gets of its actor: mutable access to the
/// working context, plus the ability to request effects and spawn child
/// actors. Derefs to `C` so existing field-mutating action bodies read the
/// same as if they took `&mut C` directly.
pub struct ActionContext<'a, C> {
    context: &'a mut C,
    effects: Vec<Effect<C>>,
    ids: &'a (dyn crate::services::IdGenerator),
    parent_mailbox: Option<mpsc::UnboundedSender<Event>>,
    routes: &'a std::collections::HashMap<String, Route<C>>,
}

impl<'a, C> ActionContext<'a, C> {
    pub(crate) fn new(
        context: &'a mut C,
        ids: &'a dyn crate::services::IdGenerator,
        parent_mailbox: Option<mpsc::UnboundedSender<Event>>,
        routes: &'a std::collections::HashMap<String, Route<C>>,
    ) -> Self {
        ActionContext {
            context,
            effects: Vec::new(),
            ids,
            parent_mailbox,
            routes,
        }
    }

    /// Requests delivery of `event` to the child actor registered under
    /// `actor_id` (spawned or invoked). A warning is logged at apply time if
    /// no such child exists.
    pub fn send_to(&mut self, actor_id: impl Into<String>, event: Event) {
        self.effects.push(Effect::SendTo {
            actor: actor_id.into(),
            event,
        });
    }

    /// Requests delivery of `event` to this actor's parent, if any.
    pub fn send_parent(&mut self, event: Event) {
        self.effects.push(Effect::SendParent { event });
    }

    /// Spawns a new child actor from `machine` with the given initial
    /// context, registering it under a generated or supplied id, and
    /// returns that id so the caller can address it with [`Self::send_to`]
    /// in subsequent actions. The child's `sendParent` effects are routed
    /// back to this actor. The child is started immediately; it does not
    /// wait for this macro-step to finish.
    ///
    /// Fails with [`ActorError::DuplicateSpawnId`] without starting
    /// anything if `id` (explicit or generated) already names a live route
    /// — a child actor or a running invocation. This only catches
    /// conflicts with routes that existed when this macro-step began; a
    /// collision between two spawns queued in the same step is still
    /// caught, but later, when effects are applied.
    pub fn spawn(&mut self, machine: Machine<C>, context: C, id: Option<String>) -> Result<String, ActorError>
    where
        C: Clone + Send + Sync + 'static,
    {
        let id = id.unwrap_or_else(|| self.ids.next_id());
        if self.routes.contains_key(&id) {
            return Err(ActorError::DuplicateSpawnId { id });
        }
        let actor = super::spawn_actor(
            Arc::new(machine),
            ActorOptions {
                context,
                id: Some(id.clone()),
                parent: self.parent_mailbox.clone(),
            },
        );
        actor.start();
        self.effects.push(Effect::Spawn {
            id: id.clone(),
            actor,
        });
        Ok(id)
    }

    pub(crate) fn into_effects(self) -> Vec<Effect<C>> {
        self.effects
    }
}

impl<'a, C> Deref for ActionContext<'a, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.context
    }
}

impl<'a, C> DerefMut for ActionContext<'a, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.context
    }
}
