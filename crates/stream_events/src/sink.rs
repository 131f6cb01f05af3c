use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SinkError;

/// A consumer of decoded events, invoked synchronously from the read loop.
///
/// A sink that blocks stalls ingestion for its stream.
pub trait EventSink<E>: Send {
    fn name(&self) -> &str;
    fn on_event(&mut self, event: &E) -> Result<(), SinkError>;
}

/// Shared event router, usually one per process and fed by many readers.
///
/// Implementations must tolerate calls from several reader tasks at once.
pub trait Dispatch<E>: Send + Sync {
    fn dispatch(&self, event: &E);
}

pub struct CallbackSink<F> {
    callback: F,
}

impl<F> CallbackSink<F> {
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<E, F> EventSink<E> for CallbackSink<F>
where
    F: FnMut(&E) -> Result<(), SinkError> + Send,
{
    fn name(&self) -> &str {
        "callback"
    }

    fn on_event(&mut self, event: &E) -> Result<(), SinkError> {
        (self.callback)(event)
    }
}

pub struct DispatchSink<E> {
    dispatcher: Arc<dyn Dispatch<E>>,
}

impl<E> DispatchSink<E> {
    pub fn new(dispatcher: Arc<dyn Dispatch<E>>) -> Self {
        Self { dispatcher }
    }
}

impl<E: 'static> EventSink<E> for DispatchSink<E> {
    fn name(&self) -> &str {
        "dispatch"
    }

    fn on_event(&mut self, event: &E) -> Result<(), SinkError> {
        self.dispatcher.dispatch(event);
        Ok(())
    }
}

/// Forwards a clone of every event into an unbounded channel.
pub struct ChannelSink<E> {
    sender: mpsc::UnboundedSender<E>,
}

impl<E> ChannelSink<E> {
    pub fn new(sender: mpsc::UnboundedSender<E>) -> Self {
        Self { sender }
    }
}

impl<E: Clone + Send> EventSink<E> for ChannelSink<E> {
    fn name(&self) -> &str {
        "channel"
    }

    fn on_event(&mut self, event: &E) -> Result<(), SinkError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SinkError::Closed)
    }
}

/// Failure from one sink during [`SinkChain::deliver`].
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: SinkError,
}

/// Ordered set of sinks; every event visits each sink in insertion order.
pub struct SinkChain<E> {
    sinks: Vec<Box<dyn EventSink<E>>>,
}

impl<E> Default for SinkChain<E> {
    fn default() -> Self {
        Self { sinks: Vec::new() }
    }
}

impl<E> fmt::Debug for SinkChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.sinks.iter().map(|sink| sink.name()))
            .finish()
    }
}

impl<E: 'static> SinkChain<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl EventSink<E> + 'static) -> &mut Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with(mut self, sink: impl EventSink<E> + 'static) -> Self {
        self.push(sink);
        self
    }

    pub fn with_callback<F>(self, callback: F) -> Self
    where
        F: FnMut(&E) -> Result<(), SinkError> + Send + 'static,
    {
        self.with(CallbackSink::new(callback))
    }

    pub fn with_dispatcher(self, dispatcher: Arc<dyn Dispatch<E>>) -> Self {
        self.with(DispatchSink::new(dispatcher))
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Hands `event` to every sink in order. A failing sink does not stop the rest.
    pub fn deliver(&mut self, event: &E) -> Vec<SinkFailure> {
        let mut failures = Vec::new();
        for sink in &mut self.sinks {
            if let Err(error) = sink.on_event(event) {
                failures.push(SinkFailure {
                    sink: sink.name().to_string(),
                    error,
                });
            }
        }
        failures
    }
}
