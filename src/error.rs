//! Error taxonomy for the build path and the actor runtime.
//!
//! Configuration errors (missing `initial`, dangling transition targets, ...)
//! are build-time failures and never surface once a [`crate::machine::Machine`]
//! exists. Implementation-reference errors (an action/guard/delay name with no
//! registered implementation) are not represented here at all: per §7 they are
//! warnings, logged through `tracing`, and treated as a no-op/truthy-guard/
//! zero-delay rather than failing anything.

use crate::node::Path;

/// Failure building a [`crate::machine::Machine`] from a [`crate::builder::MachineBuilder`]
/// or a [`crate::config::MachineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("compound state {path} declares children but no `initial`")]
    MissingInitial { path: Path },

    #[error("state {path} declares `initial` = {child:?}, which is not one of its children")]
    UnknownInitialChild { path: Path, child: String },

    #[error("transition at {path} targets unknown state {target:?}")]
    UnknownTransitionTarget { path: Path, target: String },

    #[error("history state {path} is not a child of a compound or parallel state")]
    HistoryOutsideCompoundParent { path: Path },

    #[error("history state {path} declares `target` = {target:?}, which is not one of its parent's children")]
    UnknownHistoryTarget { path: Path, target: String },
}

/// Failure raised out of [`crate::actor::Actor::send`] or while spawning a child actor.
#[derive(Debug, thiserror::Error)]
pub enum ActorError {
    #[error("actor is already processing an event on this thread; re-entrant send() is not supported, use an effect descriptor instead")]
    Reentrant,

    #[error("duplicate spawn id {id:?}")]
    DuplicateSpawnId { id: String },

    #[error("action or guard panicked while handling event {event:?}: {message}")]
    ActionPanicked { event: String, message: String },
}
