//! C7 — the invocation manager: starting a child process on entry to the
//! state that declares it, and stopping it on exit, with zombie prevention
//! for anything still in flight at that point (§4.7).
//!
//! Adapts the teacher's entry/exit action hooks
//! (`State::call_entry_action`/`call_exit_action`) to also start and stop a
//! background task rather than just calling a plain closure.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::adapter::{InvocationHandle, InvocationSink, Logic};
use crate::event::Event;
use crate::node::{InvokeDescriptor, Path};

/// Tracks every invocation currently running for one actor, keyed by the
/// path of the state that declared it and the invocation's own id (unique
/// within that state, per `crate::builder`'s id synthesis).
pub struct InvocationManager {
    running: HashMap<(Path, String), (InvocationHandle, Arc<AtomicBool>)>,
}

impl InvocationManager {
    pub fn new() -> InvocationManager {
        InvocationManager {
            running: HashMap::new(),
        }
    }

    /// Starts `descriptor` declared at `path`, delivering its `done.invoke`/
    /// `error.invoke` events (or any `sendBack` events from a callback
    /// logic) onto `sender`.
    pub fn start(
        &mut self,
        path: Path,
        descriptor: &InvokeDescriptor,
        logic: Arc<dyn Logic>,
        input: serde_json::Value,
        sender: mpsc::UnboundedSender<Event>,
        has_error_handler: bool,
    ) {
        let stopped = Arc::new(AtomicBool::new(false));
        let sink = InvocationSink::new(descriptor.id.clone(), sender, stopped.clone(), has_error_handler);
        let handle = logic.start(input, sink);
        self.running
            .insert((path, descriptor.id.clone()), (handle, stopped));
    }

    /// Stops one invocation: aborts its task and flips its stopped flag so
    /// any event already in flight is dropped by `InvocationSink::send`
    /// instead of reaching a handler for a state that's no longer active.
    pub fn stop(&mut self, path: &Path, id: &str) {
        if let Some((handle, stopped)) = self.running.remove(&(path.clone(), id.to_string())) {
            stopped.store(true, Ordering::SeqCst);
            handle.abort();
        }
    }

    /// Stops every invocation declared at or below `path` — called when a
    /// compound or parallel node is exited, taking every invocation nested
    /// under it down with it.
    pub fn stop_all_under(&mut self, path: &Path) {
        let keys: Vec<(Path, String)> = self
            .running
            .keys()
            .filter(|(p, _)| p.has_prefix(path))
            .cloned()
            .collect();
        for key in keys {
            if let Some((handle, stopped)) = self.running.remove(&key) {
                stopped.store(true, Ordering::SeqCst);
                handle.abort();
            }
        }
    }

    pub fn is_running(&self, path: &Path, id: &str) -> bool {
        self.running.contains_key(&(path.clone(), id.to_string()))
    }

    /// Forwards `event` into the `receive` queue of the invocation declared
    /// at `path` with id `id`, if it's still running and its logic has one
    /// (a callback logic; a promise logic silently ignores this). This is
    /// how the owning actor delivers events to a long-lived invocation
    /// instead of the invocation's output only ever flowing outward.
    pub fn send_to(&self, path: &Path, id: &str, event: Event) {
        if let Some((handle, _)) = self.running.get(&(path.clone(), id.to_string())) {
            handle.send(event);
        }
    }
}

impl Default for InvocationManager {
    fn default() -> Self {
        InvocationManager::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::from_promise;

    #[tokio::test]
    async fn zombie_invocation_cannot_deliver_after_stop() {
        let mut manager = InvocationManager::new();
        let logic = Arc::new(from_promise(|_input: serde_json::Value| async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            Ok(serde_json::Value::Null)
        }));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let path = Path::from_segments(["busy".into()]);
        let descriptor = InvokeDescriptor {
            id: "p0".into(),
            src: "worker".into(),
            input: None,
        };
        manager.start(path.clone(), &descriptor, logic, serde_json::Value::Null, tx, true);
        manager.stop(&path, "p0");

        tokio::time::sleep(std::time::Duration::from_millis(40)).await;
        assert!(rx.try_recv().is_err());
    }
}
