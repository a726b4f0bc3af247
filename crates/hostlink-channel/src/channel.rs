use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use hostlink_transport::{InboundEvent, Topology, Transport};
use hostlink_wire::{InboundEnvelope, OutboundEnvelope, RequestId};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::correlator::{Correlator, PendingCall};
use crate::error::{ChannelError, Result};
use crate::queue::ReadinessQueue;
use crate::registry::{HandlerRegistry, PushHandler, WeakPushHandler};

/// A live connection to the host.
///
/// Owns the request correlator, the readiness queue and the push-handler
/// registry for one embedding. Cloning is cheap and yields another handle to
/// the same channel. Re-embedding constructs a fresh `Channel`.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Box<dyn Transport>,
    state: Mutex<State>,
}

struct State {
    correlator: Correlator,
    queue: ReadinessQueue<OutboundEnvelope>,
    handlers: HandlerRegistry,
    closed: bool,
}

/// What happened to one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Settled (or advanced) the pending call with this id.
    Settled(RequestId),
    /// Delivered to the push handler registered under this name.
    Handled(String),
    /// Addressed to this channel but nobody was interested.
    Dropped,
    /// Rejected by the transport filter (foreign origin, not an envelope).
    Filtered,
}

impl fmt::Display for Dispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dispatch::Settled(id) => write!(f, "settled #{id}"),
            Dispatch::Handled(event) => write!(f, "handled {event}"),
            Dispatch::Dropped => f.write_str("dropped"),
            Dispatch::Filtered => f.write_str("filtered"),
        }
    }
}

impl Channel {
    /// Create a channel over `transport`. The channel starts not ready.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport: Box::new(transport),
                state: Mutex::new(State {
                    correlator: Correlator::new(),
                    queue: ReadinessQueue::new(),
                    handlers: HandlerRegistry::new(),
                    closed: false,
                }),
            }),
        }
    }

    /// Topology of the underlying transport.
    pub fn topology(&self) -> Topology {
        self.inner.transport.topology()
    }

    /// Send a correlated request and return a future for its response.
    ///
    /// The request is buffered if the channel is not ready yet. The future
    /// resolves with the response args, or rejects with the host's error, or
    /// with [`ChannelError::ChannelClosed`] on teardown.
    pub fn call(&self, func: &str, args: Vec<Value>) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        let id = self.submit_request(func, args, PendingCall::Single(tx), false)?;
        Ok(PendingResponse { id, rx })
    }

    /// Send a correlated request whose answer may arrive in several parts.
    ///
    /// The stream yields every response the host flags as partial, then the
    /// final one, then ends.
    pub fn call_streaming(&self, func: &str, args: Vec<Value>) -> Result<ResponseStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.submit_request(func, args, PendingCall::Streaming(tx), false)?;
        Ok(ResponseStream {
            id,
            rx,
            channel: Arc::downgrade(&self.inner),
        })
    }

    /// Send a correlated request ahead of the readiness queue.
    ///
    /// Only the readiness handshake itself needs this.
    pub(crate) fn call_unqueued(&self, func: &str, args: Vec<Value>) -> Result<PendingResponse> {
        let (tx, rx) = oneshot::channel();
        let id = self.submit_request(func, args, PendingCall::Single(tx), true)?;
        Ok(PendingResponse { id, rx })
    }

    /// Send a fire-and-forget message.
    pub fn notify(&self, func: &str, args: Vec<Value>) -> Result<()> {
        let mut state = self.state();
        if state.closed {
            return Err(ChannelError::ChannelClosed);
        }
        self.deliver(&mut state, OutboundEnvelope::notification(func, args), false);
        Ok(())
    }

    fn submit_request(
        &self,
        func: &str,
        args: Vec<Value>,
        call: PendingCall,
        bypass_queue: bool,
    ) -> Result<RequestId> {
        let mut state = self.state();
        if state.closed {
            return Err(ChannelError::ChannelClosed);
        }
        let id = state.correlator.allocate();
        state.correlator.insert(id, call);
        self.deliver(
            &mut state,
            OutboundEnvelope::request(id, func, args),
            bypass_queue,
        );
        Ok(id)
    }

    fn deliver(&self, state: &mut State, envelope: OutboundEnvelope, bypass_queue: bool) {
        if bypass_queue {
            self.inner.transport.send(&envelope);
            return;
        }
        match state.queue.submit(envelope) {
            Some(envelope) => self.inner.transport.send(&envelope),
            None => tracing::debug!(queued = state.queue.len(), "channel not ready; message queued"),
        }
    }

    /// Signal that the host handshake completed and flush queued messages in
    /// submission order.
    pub fn mark_ready(&self) {
        let mut state = self.state();
        if state.closed {
            tracing::debug!("ignoring readiness signal on closed channel");
            return;
        }
        let flushed = state.queue.mark_ready();
        if !flushed.is_empty() {
            tracing::debug!(count = flushed.len(), "flushing queued messages");
        }
        for envelope in &flushed {
            self.inner.transport.send(envelope);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state().queue.is_ready()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// Register a push handler, replacing any previous handler for `event`.
    pub fn register_handler<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        self.register_push_handler(event.into(), Arc::new(handler));
    }

    pub(crate) fn register_push_handler(&self, event: String, handler: PushHandler) {
        let mut state = self.state();
        if state.closed {
            tracing::debug!(event = %event, "ignoring handler registration on closed channel");
            return;
        }
        if state.handlers.register(event.clone(), handler) {
            tracing::debug!(event = %event, "push handler replaced");
        }
    }

    /// Register a push handler that is removed when the returned guard drops.
    pub fn register_scoped<F>(&self, event: impl Into<String>, handler: F) -> HandlerRegistration
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        let event = event.into();
        let handler: PushHandler = Arc::new(handler);
        let identity = Arc::downgrade(&handler);
        self.register_push_handler(event.clone(), handler);
        HandlerRegistration {
            event,
            handler: identity,
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Remove the handler for `event`. Idempotent.
    pub fn unregister_handler(&self, event: &str) -> bool {
        self.state().handlers.unregister(event)
    }

    /// Remove the handler for `event` if it is still `handler`.
    pub(crate) fn unregister_handler_if_current(
        &self,
        event: &str,
        handler: &WeakPushHandler,
    ) -> bool {
        self.state().handlers.unregister_if_current(event, handler)
    }

    pub fn has_handler(&self, event: &str) -> bool {
        self.state().handlers.contains(event)
    }

    /// Entry point for the runtime's inbound event mechanism.
    pub fn on_receive(&self, event: &InboundEvent) -> Dispatch {
        match self.inner.transport.accept(event) {
            Some(envelope) => self.dispatch(envelope),
            None => Dispatch::Filtered,
        }
    }

    /// Route a decoded inbound envelope.
    ///
    /// Known correlation ids go to their pending call, otherwise a registered
    /// push handler for `func` is invoked, otherwise the message is dropped.
    /// Handlers run after the channel lock is released, so they may call back
    /// into the channel.
    pub fn dispatch(&self, envelope: InboundEnvelope) -> Dispatch {
        let handler = {
            let mut state = self.state();
            if state.closed {
                tracing::debug!(id = ?envelope.id, func = ?envelope.func, "dropping message for closed channel");
                return Dispatch::Dropped;
            }

            if let Some(id) = envelope.id {
                if state.correlator.is_pending(id) {
                    state.correlator.settle(envelope);
                    return Dispatch::Settled(id);
                }
            }

            match envelope.func.as_deref() {
                Some(func) => state.handlers.get(func).map(|handler| (func.to_string(), handler)),
                None => None,
            }
        };

        match handler {
            Some((event, handler)) => {
                handler(envelope.args);
                Dispatch::Handled(event)
            }
            None => {
                tracing::debug!(id = ?envelope.id, func = ?envelope.func, "no pending call or handler; dropping message");
                Dispatch::Dropped
            }
        }
    }

    /// Invoke the push handler for `event` directly. Returns false if none is registered.
    pub fn dispatch_event(&self, event: &str, args: Vec<Value>) -> bool {
        matches!(
            self.dispatch(InboundEnvelope::push(event, args)),
            Dispatch::Handled(_)
        )
    }

    /// Tear the channel down.
    ///
    /// Every outstanding call is rejected with [`ChannelError::ChannelClosed`],
    /// queued messages and handlers are discarded and the id counter is reset.
    /// Later sends fail with `ChannelClosed`; later inbound messages are dropped.
    pub fn teardown(&self) {
        let mut state = self.state();
        if state.closed {
            return;
        }
        state.closed = true;
        let rejected = state.correlator.close_all();
        let handlers = state.handlers.clear();
        let queued = state.queue.clear();
        tracing::debug!(rejected, handlers, queued, "channel torn down");
    }

    /// Number of outstanding calls.
    pub fn pending_count(&self) -> usize {
        self.state().correlator.len()
    }

    /// Number of registered push handlers.
    pub fn handler_count(&self) -> usize {
        self.state().handlers.len()
    }

    /// Number of messages waiting for readiness.
    pub fn queued_count(&self) -> usize {
        self.state().queue.len()
    }

    /// The id the next request will be stamped with.
    pub fn next_request_id(&self) -> RequestId {
        self.state().correlator.peek_next_id()
    }

    pub(crate) fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        lock_state(&self.inner)
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Channel")
            .field("topology", &self.inner.transport.topology())
            .field("ready", &state.queue.is_ready())
            .field("closed", &state.closed)
            .field("pending", &state.correlator.len())
            .field("handlers", &state.handlers)
            .finish()
    }
}

fn lock_state(inner: &Inner) -> MutexGuard<'_, State> {
    inner.state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Non-owning handle, held by handlers stored inside the channel itself.
#[derive(Clone)]
pub(crate) struct WeakChannel {
    inner: Weak<Inner>,
}

impl WeakChannel {
    pub(crate) fn upgrade(&self) -> Option<Channel> {
        self.inner.upgrade().map(|inner| Channel { inner })
    }
}

/// Future for the response to a single request.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Result<Vec<Value>>>,
}

impl PendingResponse {
    /// Correlation id of the request.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Vec<Value>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ChannelError::ChannelClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Stream of responses to a multi-part request.
///
/// Dropping the stream releases the pending call.
pub struct ResponseStream {
    id: RequestId,
    rx: mpsc::UnboundedReceiver<Result<Vec<Value>>>,
    channel: Weak<Inner>,
}

impl ResponseStream {
    /// Correlation id of the request.
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Receive the next response. `None` once the final response was delivered.
    pub async fn next(&mut self) -> Option<Result<Vec<Value>>> {
        self.rx.recv().await
    }
}

impl futures_core::Stream for ResponseStream {
    type Item = Result<Vec<Value>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for ResponseStream {
    fn drop(&mut self) {
        if let Some(inner) = self.channel.upgrade() {
            if lock_state(&inner).correlator.release(self.id) {
                tracing::debug!(id = self.id, "response stream dropped before final response");
            }
        }
    }
}

impl fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseStream").field("id", &self.id).finish()
    }
}

/// Guard returned by [`Channel::register_scoped`]; unregisters on drop.
pub struct HandlerRegistration {
    event: String,
    handler: WeakPushHandler,
    channel: Weak<Inner>,
}

impl HandlerRegistration {
    /// Event name the handler is registered under.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The channel this registration belongs to, if it is still alive.
    pub(crate) fn channel(&self) -> Option<Channel> {
        self.channel.upgrade().map(|inner| Channel { inner })
    }
}

impl Drop for HandlerRegistration {
    fn drop(&mut self) {
        if let Some(inner) = self.channel.upgrade() {
            if !lock_state(&inner)
                .handlers
                .unregister_if_current(&self.event, &self.handler)
            {
                tracing::trace!(event = %self.event, "scoped handler already replaced");
            }
        }
    }
}

impl fmt::Debug for HandlerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("event", &self.event)
            .finish()
    }
}
