use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info_span, warn, Instrument, Span};

use crate::config::{CancelMode, ReaderConfig};
use crate::error::{FrameError, ReaderError, SinkError};
use crate::event::Event;
use crate::frame::{trim_frame, Frame, FrameReader};
use crate::sink::{Dispatch, SinkChain};
use crate::termination::{MarkerClassifier, TerminationClassifier};

/// Releases the OS resource behind a reader's byte source.
pub trait SourceCloser: Send + Sync {
    fn close(&self) -> io::Result<()>;
}

impl<F> SourceCloser for F
where
    F: Fn() -> io::Result<()> + Send + Sync,
{
    fn close(&self) -> io::Result<()> {
        self()
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StopReason {
    /// The cancellation token was observed.
    Cancelled,
    /// End-of-stream, a benign termination error, or [`ReaderHandle::close`].
    StreamEnded,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RunSummary {
    pub reason: StopReason,
    pub frames_read: usize,
    pub events_decoded: usize,
    pub frames_dropped: usize,
    pub read_errors: usize,
    pub sink_errors: usize,
}

struct CloseState {
    signal: CancellationToken,
    closed: AtomicBool,
    closer: Mutex<Option<Box<dyn SourceCloser>>>,
}

/// Owner-side lifecycle handle for a [`StreamEventReader`].
///
/// Obtain it with [`StreamEventReader::handle`] before handing the reader to its task.
#[derive(Clone)]
pub struct ReaderHandle {
    state: Arc<CloseState>,
}

impl ReaderHandle {
    /// Releases the byte source and wakes a read loop blocked on it.
    ///
    /// Only the first call reaches the underlying closer; later calls return
    /// [`ReaderError::AlreadyClosed`].
    pub fn close(&self) -> Result<(), ReaderError> {
        if self.state.closed.swap(true, Ordering::SeqCst) {
            return Err(ReaderError::AlreadyClosed);
        }

        let closer = self
            .state
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let result = match closer {
            Some(closer) => closer.close().map_err(ReaderError::Close),
            None => Ok(()),
        };
        self.state.signal.cancel();
        result
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

/// Reads newline-delimited JSON events from `R` and feeds them through a [`SinkChain`].
pub struct StreamEventReader<R, E = Event> {
    cancel: CancellationToken,
    source: R,
    sinks: SinkChain<E>,
    config: ReaderConfig,
    span: Option<Span>,
    termination: Option<Box<dyn TerminationClassifier>>,
    close: Arc<CloseState>,
}

impl<R, E> StreamEventReader<R, E>
where
    R: AsyncRead + Unpin + Send,
    E: DeserializeOwned + Send + 'static,
{
    /// Builds a reader that hands each event to `callback` and then to `dispatcher`.
    pub fn new<F>(
        cancel: CancellationToken,
        source: R,
        callback: F,
        dispatcher: Arc<dyn Dispatch<E>>,
    ) -> Self
    where
        F: FnMut(&E) -> Result<(), SinkError> + Send + 'static,
    {
        let sinks = SinkChain::new()
            .with_callback(callback)
            .with_dispatcher(dispatcher);
        Self::with_sinks(cancel, source, sinks)
    }

    pub fn with_sinks(cancel: CancellationToken, source: R, sinks: SinkChain<E>) -> Self {
        Self {
            cancel,
            source,
            sinks,
            config: ReaderConfig::default(),
            span: None,
            termination: None,
            close: Arc::new(CloseState {
                signal: CancellationToken::new(),
                closed: AtomicBool::new(false),
                closer: Mutex::new(None),
            }),
        }
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    /// Emits every log event of this reader inside `span` instead of the default one.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_closer(self, closer: impl SourceCloser + 'static) -> Self {
        *self
            .close
            .closer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(closer));
        self
    }

    /// Replaces the marker classifier built from [`ReaderConfig::benign_markers`].
    pub fn with_termination(mut self, classifier: impl TerminationClassifier + 'static) -> Self {
        self.termination = Some(Box::new(classifier));
        self
    }

    pub fn handle(&self) -> ReaderHandle {
        ReaderHandle {
            state: Arc::clone(&self.close),
        }
    }

    /// Runs the ingestion loop until cancellation or end of stream.
    ///
    /// Read and decode failures are logged and skipped; they never end the loop.
    pub async fn run(self) -> RunSummary {
        let span = self
            .span
            .clone()
            .unwrap_or_else(|| info_span!("stream_events", stream = %self.config.label));
        self.run_loop().instrument(span).await
    }

    async fn run_loop(self) -> RunSummary {
        let Self {
            cancel,
            source,
            mut sinks,
            config,
            termination,
            close,
            ..
        } = self;
        let termination = termination
            .unwrap_or_else(|| Box::new(MarkerClassifier::new(&config.benign_markers)));
        let mut frames =
            FrameReader::with_capacity(config.read_buffer_bytes, source, config.max_frame_bytes);
        let closed = close.signal.clone();

        let mut events_decoded = 0;
        let mut frames_dropped = 0;
        let mut read_errors = 0;
        let mut sink_errors = 0;

        let reason = 'ingest: loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if closed.is_cancelled() {
                break StopReason::StreamEnded;
            }

            let next = match config.cancel_mode {
                CancelMode::FrameBoundary => tokio::select! {
                    biased;
                    _ = closed.cancelled() => break 'ingest StopReason::StreamEnded,
                    next = frames.next_frame() => next,
                },
                CancelMode::Immediate => tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'ingest StopReason::Cancelled,
                    _ = closed.cancelled() => break 'ingest StopReason::StreamEnded,
                    next = frames.next_frame() => next,
                },
            };

            let frame = match next {
                Ok(Some(frame)) => frame,
                Ok(None) => break StopReason::StreamEnded,
                Err(err) if termination.is_benign_termination(&err) => {
                    debug!(error = %err, "event stream closed by peer");
                    break StopReason::StreamEnded;
                }
                Err(err) => {
                    read_errors += 1;
                    error!(error = %err, "error while reading event stream");
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            let frame_number = frame.frame_number();
            let event = match decode_frame::<E>(frame, config.log_frames) {
                Ok(event) => event,
                Err(err) => {
                    frames_dropped += 1;
                    log_dropped_frame(frame_number, &err);
                    continue;
                }
            };
            events_decoded += 1;

            for failure in sinks.deliver(&event) {
                sink_errors += 1;
                warn!(
                    frame_number,
                    sink = %failure.sink,
                    error = %failure.error,
                    "event sink failed"
                );
            }
        };

        let summary = RunSummary {
            reason,
            frames_read: frames.frames_seen(),
            events_decoded,
            frames_dropped,
            read_errors,
            sink_errors,
        };
        debug!(?summary, "event reader stopped");
        summary
    }
}

fn decode_frame<E: DeserializeOwned>(frame: Frame, log_frames: bool) -> Result<E, FrameError> {
    let (frame_number, bytes) = match frame {
        Frame::Complete {
            frame_number,
            bytes,
        } => (frame_number, bytes),
        Frame::TooLong {
            observed_bytes,
            max_frame_bytes,
            ..
        } => {
            return Err(FrameError::TooLong {
                observed_bytes,
                max_frame_bytes,
            })
        }
    };

    let trimmed = trim_frame(&bytes);
    if log_frames {
        debug!(
            frame_number,
            frame = %String::from_utf8_lossy(trimmed),
            "received frame"
        );
    }

    serde_json::from_slice(trimmed).map_err(|source| FrameError::Decode {
        source,
        raw: String::from_utf8_lossy(trimmed).into_owned(),
    })
}

fn log_dropped_frame(frame_number: usize, err: &FrameError) {
    match err {
        FrameError::Decode { source, raw } => {
            error!(frame_number, error = %source, frame = %raw, "failed to decode frame");
        }
        FrameError::TooLong {
            observed_bytes,
            max_frame_bytes,
        } => {
            error!(
                frame_number,
                observed_bytes, max_frame_bytes, "dropping oversized frame"
            );
        }
    }
}
