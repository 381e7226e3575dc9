//! Askstream CLI
//!
//! Terminal front end for the askstream engine: asks a question and streams
//! the answer to stdout as the pacing policy commits it.
//!
//! # Usage
//!
//! ```bash
//! # One question
//! askstream "What is the capital of France?"
//!
//! # Interactive: one question per line from stdin
//! askstream
//!
//! # Typewriter effect, 3 characters every 30ms
//! askstream --pacing char-rate:3/30 "Tell me a story"
//!
//! # Verbose logging (to stderr)
//! askstream --log-level debug "ping"
//! ```
//!
//! # Environment Variables
//!
//! - `ASKSTREAM_API_URL`: Base URL of the ask endpoint
//! - `ASKSTREAM_TOKEN`: Bearer token
//! - `ASKSTREAM_PACING`: Pacing policy
//! - `RUST_LOG`: Overrides `--log-level`
//!
//! # Signals
//!
//! - SIGINT: Cancels the answer in flight; a second Ctrl+C while idle exits

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use askstream_core::{
    load_config_from_path, ChatBubble, ConfigOverrides, Conversation, DeliveryEvent,
    DeliverySink, ErrorKind, Framing, PacingPolicy, SessionId, SubmitError,
};
use clap::Parser;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Parser)]
#[command(name = "askstream", version, about = "Ask a question and stream the answer")]
struct Args {
    /// Question to ask; questions are read from stdin when omitted
    question: Option<String>,

    /// Base URL of the ask endpoint
    #[arg(long)]
    api_url: Option<String>,

    /// Configuration file (defaults to the XDG config location)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Response framing: event-stream or raw
    #[arg(long)]
    framing: Option<Framing>,

    /// Pacing: immediate, chunk:<n>, interval:<ms> or char-rate:<chars>/<ms>
    #[arg(long)]
    pacing: Option<PacingPolicy>,

    /// Bearer token for the ask endpoint
    #[arg(long)]
    token: Option<String>,

    /// Fail a stream that produces nothing for this long (0 disables)
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Show the preamble that precedes the answer on stderr
    #[arg(long)]
    show_process: bool,

    /// Log level when RUST_LOG is unset
    #[arg(long, default_value = "warn")]
    log_level: String,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides::new();
        if let Some(url) = &self.api_url {
            overrides = overrides.with_api_url(url.clone());
        }
        if let Some(token) = &self.token {
            overrides = overrides.with_auth_token(token.clone());
        }
        if let Some(framing) = self.framing {
            overrides = overrides.with_framing(framing);
        }
        if let Some(pacing) = self.pacing {
            overrides = overrides.with_pacing(pacing);
        }
        if let Some(ms) = self.read_timeout_ms {
            overrides = overrides.with_read_timeout_ms(ms);
        }
        overrides
    }
}

/// Sink that writes the answer to the terminal as it is committed
struct TerminalSink {
    bubble: ChatBubble,
    show_process: bool,
    /// Bytes of answer and process text already written
    printed: Mutex<(usize, usize)>,
}

impl TerminalSink {
    fn new(show_process: bool) -> Self {
        Self {
            bubble: ChatBubble::new(),
            show_process,
            printed: Mutex::new((0, 0)),
        }
    }
}

/// Write the part of `text` past `printed`, returning the new length
fn write_suffix(out: &mut impl Write, text: &str, printed: usize) -> usize {
    let Some(suffix) = text.get(printed..) else {
        return printed;
    };
    if suffix.is_empty() {
        return printed;
    }
    if let Err(e) = out.write_all(suffix.as_bytes()).and_then(|()| out.flush()) {
        warn!(error = %e, "Failed to write output");
    }
    text.len()
}

impl DeliverySink for TerminalSink {
    fn on_session_start(&self, session_id: &SessionId) {
        self.bubble.on_session_start(session_id);
        *self.printed.lock() = (0, 0);
    }

    fn on_delta(&self, event: &DeliveryEvent) {
        self.bubble.on_delta(event);
        let mut printed = self.printed.lock();
        printed.0 = write_suffix(&mut std::io::stdout(), &event.text, printed.0);

        if event.terminal {
            match event.error {
                None => println!(),
                Some(ErrorKind::UserCancelled) => eprintln!("\n[cancelled]"),
                Some(_) => eprintln!("\n{}", self.bubble.render()),
            }
        }
    }

    fn on_process(&self, session_id: &SessionId, text: &str, closed: bool) {
        self.bubble.on_process(session_id, text, closed);
        if !self.show_process {
            return;
        }
        let mut printed = self.printed.lock();
        printed.1 = write_suffix(&mut std::io::stderr(), text, printed.1);
        if closed {
            eprintln!();
        }
    }
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(format!(
            "askstream={level},askstream_core={level}"
        ))
    })?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
    Ok(())
}

/// Ask one question and wait for its terminal event; `Ok(false)` on failure
async fn ask(
    conversation: &Conversation,
    question: &str,
    show_process: bool,
) -> anyhow::Result<bool> {
    let sink = Arc::new(TerminalSink::new(show_process));
    let handle = match conversation.submit(question, sink) {
        Ok(handle) => handle,
        Err(SubmitError::EmptyQuestion) => return Ok(true),
    };
    debug!(session_id = %handle.id(), "Waiting for answer");

    let terminal = tokio::select! {
        event = handle.wait() => event,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!(session_id = %handle.id(), "Interrupted, cancelling");
            handle.cancel();
            handle.wait().await
        }
    };
    Ok(terminal.is_success())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let mut config =
        load_config_from_path(args.config.clone()).context("Failed to load configuration")?;
    args.overrides()
        .apply(&mut config)
        .context("Invalid command line option")?;
    config.validate().context("Invalid configuration")?;
    info!(
        url = %config.ask_url(),
        framing = %config.framing,
        pacing = %config.pacing,
        source = ?config.source(),
        "Configuration loaded"
    );

    let conversation =
        Conversation::from_config(&config).context("Failed to create HTTP client")?;

    if let Some(question) = &args.question {
        if !ask(&conversation, question, args.show_process).await? {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let line = tokio::select! {
            line = lines.next_line() => line.context("Failed to read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        ask(&conversation, &line, args.show_process).await?;
    }
    Ok(())
}
