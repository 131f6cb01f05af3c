#![allow(dead_code)]

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use stream_events::{Dispatch, Event, SinkError};
use tokio::io::{AsyncRead, ReadBuf};
use tracing::field::{Field, Visit};
use tracing::subscriber::DefaultGuard;
use tracing::{Level, Subscriber};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

pub enum Step {
    Data(Vec<u8>),
    Fail(io::Error),
}

/// Byte source that replays a fixed script, then reports end-of-stream.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
        }
    }
}

pub fn data(bytes: &[u8]) -> Step {
    Step::Data(bytes.to_vec())
}

pub fn fail(message: &str) -> Step {
    Step::Fail(io::Error::other(message.to_string()))
}

impl AsyncRead for ScriptedSource {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.steps.pop_front() {
            None => Poll::Ready(Ok(())),
            Some(Step::Fail(err)) => Poll::Ready(Err(err)),
            Some(Step::Data(bytes)) => {
                let n = buf.remaining().min(bytes.len());
                buf.put_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.steps.push_front(Step::Data(bytes[n..].to_vec()));
                }
                Poll::Ready(Ok(()))
            }
        }
    }
}

/// Shared, ordered record of what each sink saw.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn callback(&self) -> impl FnMut(&Event) -> Result<(), SinkError> + Send + 'static {
        let journal = self.clone();
        move |event: &Event| {
            journal.push(format!("callback:{}", event.name));
            Ok(())
        }
    }

    pub fn dispatcher(&self) -> Arc<dyn Dispatch<Event>> {
        Arc::new(JournalDispatch(self.clone()))
    }
}

struct JournalDispatch(Journal);

impl Dispatch<Event> for JournalDispatch {
    fn dispatch(&self, event: &Event) {
        self.0.push(format!("dispatch:{}", event.name));
    }
}

#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<(Level, String)>>>);

impl CapturedLogs {
    /// Routes this thread's tracing events into the capture until the guard drops.
    pub fn install() -> (Self, DefaultGuard) {
        let logs = Self::default();
        let guard = tracing_subscriber::registry()
            .with(logs.clone())
            .set_default();
        (logs, guard)
    }

    pub fn at(&self, level: Level) -> Vec<String> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(lvl, _)| *lvl == level)
            .map(|(_, line)| line.clone())
            .collect()
    }
}

impl<S: Subscriber> Layer<S> for CapturedLogs {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        let mut fields = FieldWriter(String::new());
        event.record(&mut fields);
        self.0
            .lock()
            .unwrap()
            .push((*event.metadata().level(), fields.0));
    }
}

struct FieldWriter(String);

impl Visit for FieldWriter {
    fn record_str(&mut self, field: &Field, value: &str) {
        let _ = write!(self.0, "{}={} ", field.name(), value);
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let _ = write!(self.0, "{}={:?} ", field.name(), value);
    }
}

pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
