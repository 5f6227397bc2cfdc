//! A hierarchical statechart interpreter.
//!
//! A machine is described as data — a tree of nested, parallel, and history
//! states built from a [`config::MachineConfig`] (deserialized from JSON/YAML)
//! or a [`builder::MachineBuilder`] — rather than as a Rust enum. Action,
//! guard, and delay *names* live in that tree; the closures behind them are
//! supplied separately through [`machine::Implementations`], so the same
//! definition can be driven by different implementations (production code,
//! a test double) without rebuilding the tree.
//!
//! The moving pieces:
//!
//! - [`state_value`] — the runtime shape of a live configuration (C1).
//! - [`node`] and [`builder`] — the machine's static shape and how it's
//!   validated into existence (C2).
//! - [`transition`] — selecting which transition(s) fire for an event, and
//!   computing the resulting exit/entry sets (C3).
//! - [`target`] — resolving a transition's target into a full configuration,
//!   including history and parallel-region completion (C4).
//! - [`actor`] — [`actor::Actor`], the running instance: the macro-step loop,
//!   timers, invoked children, and the observer/snapshot API (C5).
//! - [`timer`] and [`invoke`] — the background machinery `actor` reconciles
//!   against the active configuration after every macro-step (C6, C7).
//! - [`adapter`] — wrapping an async computation or long-lived callback
//!   process as something [`invoke`] can start and stop (C8).
//! - [`error`] — the build-time and runtime error taxonomy (C9).
//! - [`services`] — the injectable clock and id generator (C10).
//! - [`config`] — the serde schema a machine definition is deserialized from
//!   (C11).
//!
//! ```
//! use statechart::builder::MachineBuilder;
//! use statechart::config::MachineConfig;
//! use statechart::machine::{Implementations, Machine};
//! use statechart::actor::{spawn_actor, ActorOptions};
//! use statechart::event::Event;
//!
//! # fn main() {
//! let config: MachineConfig = serde_json::from_str(r#"{
//!     "initial": "inactive",
//!     "states": {
//!         "inactive": { "on": { "TOGGLE": "active" } },
//!         "active": { "on": { "TOGGLE": "inactive" } }
//!     }
//! }"#).unwrap();
//!
//! let definition = MachineBuilder::from_config(config).build().unwrap();
//! let machine = Machine::new(definition, Implementations::<()>::new());
//! let actor = spawn_actor(std::sync::Arc::new(machine), ActorOptions { context: (), id: None, parent: None });
//! actor.start();
//! assert!(actor.get_snapshot().matches_str("inactive"));
//! # }
//! ```

pub mod actor;
pub mod adapter;
pub mod builder;
pub mod config;
pub mod error;
pub mod event;
pub mod invoke;
pub mod machine;
pub mod node;
pub mod services;
pub mod state_value;
pub mod target;
pub mod timer;
pub mod transition;

pub use actor::{Actor, ActorOptions, Snapshot, Subscription};
pub use error::{ActorError, BuildError};
pub use event::Event;
pub use machine::{Implementations, Machine};
