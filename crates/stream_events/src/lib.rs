#![forbid(unsafe_code)]
//! Line-delimited event ingestion for a cooperating process's output stream.
//!
//! A [`StreamEventReader`] owns the readable half of a byte stream, splits it
//! into `\n`-terminated frames, decodes each frame as JSON and hands the event
//! to an ordered [`SinkChain`] (by default: a callback, then a shared
//! [`Dispatch`] registry). Malformed frames and transient read errors are
//! logged through `tracing` and skipped. The loop stops on cancellation or when
//! the stream ends.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use stream_events::{Dispatch, Event, StreamEventReader};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Router;
//!
//! impl Dispatch<Event> for Router {
//!     fn dispatch(&self, event: &Event) {
//!         println!("{}", event.name);
//!     }
//! }
//!
//! # async fn demo(stdout: tokio::process::ChildStdout) {
//! let cancel = CancellationToken::new();
//! let reader = StreamEventReader::new(cancel.clone(), stdout, |_: &Event| Ok(()), Arc::new(Router));
//! let handle = reader.handle();
//! let task = tokio::spawn(reader.run());
//!
//! handle.close().ok();
//! let summary = task.await.unwrap();
//! # let _ = summary;
//! # }
//! ```

mod config;
mod error;
mod event;
mod frame;
mod reader;
mod sink;
mod termination;

pub use config::{CancelMode, ReaderConfig};
pub use error::{ConfigError, FrameError, ReaderError, SinkError};
pub use event::Event;
pub use frame::{trim_frame, Frame, FrameReader};
pub use reader::{ReaderHandle, RunSummary, SourceCloser, StopReason, StreamEventReader};
pub use sink::{CallbackSink, ChannelSink, Dispatch, DispatchSink, EventSink, SinkChain, SinkFailure};
pub use termination::{MarkerClassifier, TerminationClassifier};
