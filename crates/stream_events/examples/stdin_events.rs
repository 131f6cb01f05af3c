//! Reads newline-delimited JSON events from stdin and prints each one.
//!
//! Usage:
//! - `printf '{"name":"ready"}\n' | cargo run -p stream_events --example stdin_events`
//! - Optional reader config: `cargo run -p stream_events --example stdin_events -- reader.toml`
//! - Raw frame tracing: `RUST_LOG=stream_events=debug`

use std::{env, error::Error, fs, sync::Arc};

use stream_events::{Dispatch, Event, ReaderConfig, StreamEventReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

struct PrintDispatch;

impl Dispatch<Event> for PrintDispatch {
    fn dispatch(&self, event: &Event) {
        match &event.target_id {
            Some(target) => println!("{} -> {target}", event.name),
            None => println!("{}", event.name),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config()?;
    let mut seen = 0usize;
    let reader = StreamEventReader::new(
        CancellationToken::new(),
        tokio::io::stdin(),
        move |event: &Event| {
            seen += 1;
            tracing::info!(seen, name = %event.name, "event");
            Ok(())
        },
        Arc::new(PrintDispatch),
    )
    .with_config(config);

    let summary = tokio::spawn(reader.run()).await?;
    eprintln!("{summary:?}");
    Ok(())
}

fn load_config() -> Result<ReaderConfig, Box<dyn Error>> {
    match env::args().nth(1) {
        Some(path) => Ok(ReaderConfig::from_toml_str(&fs::read_to_string(path)?)?),
        None => Ok(ReaderConfig::default()),
    }
}
