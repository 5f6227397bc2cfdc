//! C8 — adapters: wrapping an arbitrary async computation or callback
//! process as something `crate::invoke` can start on entry and stop on
//! exit (§4.7, §4.8).
//!
//! Grounded on `SecBear-neuron/layer0`'s effect-future wrapping (an effect
//! is a boxed future whose resolution is reported back through a sink)
//! combined with `SPEC_FULL.md` §4.8's promise/callback split.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::Event;

/// The channel an invoked process reports back through, plus the
/// zombie-prevention flag `crate::invoke` sets the moment the declaring
/// state is exited.
#[derive(Clone)]
pub struct InvocationSink {
    id: String,
    sender: mpsc::UnboundedSender<Event>,
    stopped: Arc<AtomicBool>,
    has_error_handler: bool,
}

impl InvocationSink {
    pub fn new(
        id: impl Into<String>,
        sender: mpsc::UnboundedSender<Event>,
        stopped: Arc<AtomicBool>,
        has_error_handler: bool,
    ) -> InvocationSink {
        InvocationSink {
            id: id.into(),
            sender,
            stopped,
            has_error_handler,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the declaring state's `on` map has an `error.invoke.<id>`
    /// handler — computed once at invocation start, since the active
    /// configuration can't change while this invocation is in flight and
    /// still be the one that started it.
    pub fn has_error_handler(&self) -> bool {
        self.has_error_handler
    }

    /// Delivers `event` to the invoking actor's queue, unless the
    /// invocation has already been stopped — the core of zombie
    /// prevention: a child whose state has since been exited can still be
    /// mid-flight, but its output is silently dropped instead of being
    /// delivered to a handler that no longer exists.
    pub fn send(&self, event: Event) {
        if !self.stopped.load(Ordering::SeqCst) {
            let _ = self.sender.send(event);
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// A running invocation's task handle, held by `crate::invoke` so it can be
/// aborted when the declaring state is exited.
pub struct InvocationHandle {
    pub(crate) join: JoinHandle<()>,
    /// Populated only by logics with a `receive` queue (callback logics):
    /// the sender half `crate::invoke` forwards parent-observed events
    /// through, so they reach the running callback's own receiver. A
    /// promise logic, which has no such queue, leaves this `None`.
    pub(crate) inbound: Option<mpsc::UnboundedSender<Event>>,
}

impl InvocationHandle {
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Forwards `event` into this invocation's `receive` queue, if it has
    /// one. A no-op for invocations started from a [`PromiseLogic`].
    pub fn send(&self, event: Event) {
        if let Some(sender) = &self.inbound {
            let _ = sender.send(event);
        }
    }
}

/// Something `crate::invoke` can start given resolved input and a sink to
/// report through, and later stop.
pub trait Logic: Send + Sync {
    fn start(&self, input: serde_json::Value, sink: InvocationSink) -> InvocationHandle;
}

/// A `Logic` driven by a single future: `done.invoke.<id>` fires with its
/// `Ok` payload, `error.invoke.<id>` with its `Err` message.
pub struct PromiseLogic<F> {
    f: F,
}

impl<F> PromiseLogic<F>
where
    F: Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, String>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> PromiseLogic<F> {
        PromiseLogic { f }
    }
}

/// Wraps a closure returning a boxed future as invokable promise logic.
pub fn from_promise<F, Fut>(f: F) -> PromiseLogic<impl Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, String>> + Send + Sync + 'static>
where
    F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<serde_json::Value, String>> + Send + 'static,
{
    PromiseLogic::new(move |input| Box::pin(f(input)) as BoxFuture<'static, Result<serde_json::Value, String>>)
}

impl<F> Logic for PromiseLogic<F>
where
    F: Fn(serde_json::Value) -> BoxFuture<'static, Result<serde_json::Value, String>>
        + Send
        + Sync
        + 'static,
{
    fn start(&self, input: serde_json::Value, sink: InvocationSink) -> InvocationHandle {
        let future = (self.f)(input);
        let join = tokio::spawn(async move {
            match future.await {
                Ok(output) => sink.send(Event::done_invoke(sink.id(), output)),
                Err(message) => {
                    if !sink.has_error_handler() {
                        tracing::warn!(
                            id = %sink.id(),
                            error = %message,
                            "invocation failed but its declaring state has no error.invoke handler"
                        );
                    }
                    sink.send(Event::error_invoke(sink.id(), &message));
                }
            }
        });
        InvocationHandle { join, inbound: None }
    }
}

/// A `Logic` driven by a long-lived callback process: started with a
/// `sendBack` sink and a `receive` queue of events forwarded to it from the
/// invoking actor, and run until the declaring state is exited.
pub struct CallbackLogic<F> {
    f: F,
}

impl<F> CallbackLogic<F>
where
    F: Fn(serde_json::Value, InvocationSink, mpsc::UnboundedReceiver<Event>) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync
        + 'static,
{
    pub fn new(f: F) -> CallbackLogic<F> {
        CallbackLogic { f }
    }
}

/// Wraps an async closure `(input, sendBack, receive) -> ()` as invokable
/// callback logic. The returned [`mpsc::UnboundedSender<Event>`] is handed
/// to `crate::invoke` so the invoking actor can forward events into the
/// callback's `receive` queue.
pub fn from_callback<F, Fut>(
    f: F,
) -> (
    CallbackLogic<impl Fn(serde_json::Value, InvocationSink, mpsc::UnboundedReceiver<Event>) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static>,
)
where
    F: Fn(serde_json::Value, InvocationSink, mpsc::UnboundedReceiver<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    (CallbackLogic::new(move |input, sink, receiver| {
        Box::pin(f(input, sink, receiver)) as Pin<Box<dyn Future<Output = ()> + Send>>
    }),)
}

impl<F> Logic for CallbackLogic<F>
where
    F: Fn(serde_json::Value, InvocationSink, mpsc::UnboundedReceiver<Event>) -> Pin<Box<dyn Future<Output = ()> + Send>>
        + Send
        + Sync
        + 'static,
{
    fn start(&self, input: serde_json::Value, sink: InvocationSink) -> InvocationHandle {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let future = (self.f)(input, sink, inbound_rx);
        let join = tokio::spawn(future);
        InvocationHandle {
            join,
            inbound: Some(inbound_tx),
        }
    }
}
