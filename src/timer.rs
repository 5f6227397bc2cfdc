//! C6 — the timer manager: scheduling and cancelling `after` transitions.
//!
//! A delayed transition is keyed by `(declaring node's path, index within
//! that node's `after` list)`, and its task handle is held just long
//! enough to be aborted if the declaring state is exited before the delay
//! elapses (§4.6). A zero-delay entry still goes through `tokio::spawn` and
//! a real suspension point — it is never resolved synchronously inside the
//! macro-step that scheduled it.
//!
//! Grounded on the "spawn a task, hold the handle, abort on cancel" idiom
//! exercised by the teacher's async feature set in its `async_io`/
//! `async_blinky` examples, adapted to generic messages since this crate's
//! actor mailbox type is internal to `crate::actor`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::node::Path;
use crate::services::Clock;

/// Tracks every live `after` timer for one actor.
pub struct TimerManager<Clk> {
    clock: Arc<Clk>,
    handles: HashMap<(Path, usize), JoinHandle<()>>,
}

impl<Clk> TimerManager<Clk>
where
    Clk: Clock + 'static,
{
    pub fn new(clock: Arc<Clk>) -> TimerManager<Clk> {
        TimerManager {
            clock,
            handles: HashMap::new(),
        }
    }

    /// Schedules `message` to be sent on `sender` after `duration`,
    /// replacing any existing timer for the same `(path, index)`.
    pub fn schedule<T>(
        &mut self,
        path: Path,
        index: usize,
        duration: Duration,
        sender: mpsc::UnboundedSender<T>,
        message: T,
    ) where
        T: Send + 'static,
    {
        self.cancel(&path, index);
        let clock = self.clock.clone();
        let handle = tokio::spawn(async move {
            clock.sleep(duration).await;
            let _ = sender.send(message);
        });
        self.handles.insert((path, index), handle);
    }

    pub fn cancel(&mut self, path: &Path, index: usize) {
        if let Some(handle) = self.handles.remove(&(path.clone(), index)) {
            handle.abort();
        }
    }

    /// Cancels every timer declared at or below `path` — called when a
    /// compound or parallel node carrying `after` entries is exited.
    pub fn cancel_all_under(&mut self, path: &Path) {
        let keys: Vec<(Path, usize)> = self
            .handles
            .keys()
            .filter(|(p, _)| p.has_prefix(path))
            .cloned()
            .collect();
        for key in keys {
            if let Some(handle) = self.handles.remove(&key) {
                handle.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::VirtualClock;

    #[tokio::test(start_paused = true)]
    async fn fires_after_the_configured_delay() {
        let mut timers = TimerManager::new(Arc::new(VirtualClock));
        let (tx, mut rx) = mpsc::unbounded_channel();
        timers.schedule(
            Path::from_segments(["a".into()]),
            0,
            Duration::from_millis(100),
            tx,
            "fired",
        );
        tokio::time::advance(Duration::from_millis(150)).await;
        assert_eq!(rx.recv().await, Some("fired"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_firing() {
        let mut timers = TimerManager::new(Arc::new(VirtualClock));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let path = Path::from_segments(["a".into()]);
        timers.schedule(path.clone(), 0, Duration::from_millis(100), tx, "fired");
        timers.cancel(&path, 0);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(rx.try_recv().is_err());
    }
}
