use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use transcript_viewer::app;
use transcript_viewer::sample::SampleSource;
use transcript_viewer::source::{ConversationSource, JsonFileSource};
use transcript_viewer::viewmodel::ConversationViewModel;

/// Render an agent chat transcript in the terminal.
#[derive(Debug, Parser)]
#[command(name = "transcript-viewer", version)]
struct Args {
    /// JSON transcript to load; uses the built-in sample conversation when
    /// omitted.
    transcript: Option<PathBuf>,

    /// Print the derived transcript to stdout and exit instead of running
    /// the interactive viewer.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.once)?;

    let source: Box<dyn ConversationSource> = match &args.transcript {
        Some(path) => Box::new(JsonFileSource::new(path)),
        None => Box::new(SampleSource),
    };
    // Only the sample conversation has a driver that resolves its pending
    // tool call; a file's pending calls stay pending.
    let resolve_pending = args.transcript.is_none();
    let mut engine = ConversationViewModel::new(source);

    if args.once {
        engine.load_conversation().await?;
        print_transcript(&engine);
        return Ok(());
    }

    app::run(engine, resolve_pending).await
}

/// Logging goes to stderr for one-shot runs; in the interactive viewer it
/// goes to a file so the alternate screen stays clean. Off unless RUST_LOG
/// is set.
fn init_tracing(to_stderr: bool) -> Result<()> {
    if std::env::var_os("RUST_LOG").is_none() {
        return Ok(());
    }
    let filter = EnvFilter::from_default_env();
    if to_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        let file = std::fs::File::create("transcript-viewer.log")?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .init();
    }
    Ok(())
}

fn print_transcript(engine: &ConversationViewModel) {
    for line in transcript_viewer::render::transcript_lines(engine.groups(), None, 100) {
        let text: String = line.spans.iter().map(|span| span.content.as_ref()).collect();
        println!("{text}");
    }
    if engine.has_pending_tool_results() {
        println!();
        println!("(tool results still pending)");
    }
}
