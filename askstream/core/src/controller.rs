//! Session Controller
//!
//! Owns one session end to end: opens the transport, feeds every read through
//! the frame decoder into the accumulator, lets the pacer decide commits, and
//! delivers exactly one terminal event.
//!
//! # State machine
//!
//! ```text
//! Idle ─submit─▶ Connecting ─open ok─▶ Streaming ─producer done─▶ Draining
//!                    │                     │                          │
//!                    │ open failed         │ read/decode error        │ pending == 0
//!                    ▼                     ▼                          ▼
//!                  Failed               Failed                    Completed
//!
//! any state ─cancel / superseded─▶ Cancelled
//! ```
//!
//! The session runs as a single tokio task. Reads and ticks are awaited from
//! one `select!` loop, so the pipeline state itself is never shared; the only
//! cross-task state is the [`DeliveryGate`], which settles races with
//! `cancel()`.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::accumulator::Accumulator;
use crate::decoder::{DecodedFrame, DecoderOptions, FrameDecoder, Framing};
use crate::error::{DecodeError, ErrorKind, StreamError};
use crate::messages::{DeliveryEvent, SessionId, SessionState};
use crate::pacing::{Completion, Pacer, PacingPolicy};
use crate::scheduler::{Scheduler, Ticker};
use crate::session::{DeliveryGate, SessionHandle};
use crate::sink::DeliverySink;
use crate::transport::{AskRequest, Transport};

/// Immutable per-session settings
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSettings {
    /// Framing assumed when the response has no usable content type
    pub framing: Framing,
    /// Pacing policy
    pub pacing: PacingPolicy,
    /// Decoder tuning
    pub decoder: DecoderOptions,
}

/// Start a session on the current tokio runtime
///
/// The sink is told about the new session before this returns; everything
/// else happens on a spawned task.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn start_session(
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    request: AskRequest,
    settings: SessionSettings,
    sink: Arc<dyn DeliverySink>,
) -> SessionHandle {
    let session_id = SessionId::new();
    sink.on_session_start(&session_id);

    let gate = Arc::new(DeliveryGate::new(session_id, sink));
    let (cancel_tx, cancel_rx) = watch::channel(false);
    gate.transition(SessionState::Connecting);

    let controller = SessionController {
        gate: Arc::clone(&gate),
        transport,
        scheduler,
        settings,
        cancel: cancel_rx,
    };
    tokio::spawn(controller.run(request));

    SessionHandle::new(gate, cancel_tx)
}

struct SessionController {
    gate: Arc<DeliveryGate>,
    transport: Arc<dyn Transport>,
    scheduler: Arc<dyn Scheduler>,
    settings: SessionSettings,
    cancel: watch::Receiver<bool>,
}

impl SessionController {
    async fn run(mut self, request: AskRequest) {
        let session_id = self.gate.session_id().clone();
        info!(
            session_id = %session_id,
            transport = self.transport.name(),
            pacing = %self.settings.pacing,
            "Session started"
        );

        let opened = tokio::select! {
            biased;
            () = cancelled(&mut self.cancel) => {
                debug!(session_id = %session_id, "Cancelled while connecting");
                return;
            }
            opened = self.transport.open(&request) => opened,
        };

        let mut source = match opened {
            Ok(source) => source,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Transport open failed");
                self.gate.deliver_terminal(DeliveryEvent::failed(
                    session_id,
                    String::new(),
                    ErrorKind::TransportError,
                    e.to_string(),
                ));
                return;
            }
        };

        let framing = source
            .content_type()
            .and_then(Framing::from_content_type)
            .unwrap_or(request.framing);
        debug!(session_id = %session_id, framing = %framing, "Response opened");
        if framing == Framing::EventStream {
            self.gate.transition(SessionState::Streaming);
        }

        let mut pipeline = Pipeline {
            gate: Arc::clone(&self.gate),
            decoder: FrameDecoder::new(framing, &self.settings.decoder),
            accumulator: Accumulator::new(),
            pacer: Pacer::new(self.settings.pacing),
            process: String::new(),
        };
        let mut ticker = self
            .settings
            .pacing
            .tick_period()
            .map(|period| self.scheduler.start(period));
        let mut producer_done = false;

        loop {
            tokio::select! {
                biased;
                () = cancelled(&mut self.cancel) => break,
                read = source.next(), if !producer_done => match read {
                    Some(Ok(chunk)) => {
                        if let Err(e) = pipeline.on_chunk(&chunk) {
                            pipeline.fail(&e.into());
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        pipeline.salvage();
                        pipeline.fail(&e.into());
                        break;
                    }
                    None => {
                        producer_done = true;
                        match pipeline.on_producer_done() {
                            Ok(Completion::Finish) => {
                                pipeline.complete();
                                break;
                            }
                            Ok(Completion::Drain) => {
                                self.gate.transition(SessionState::Draining);
                            }
                            Err(e) => {
                                pipeline.fail(&e.into());
                                break;
                            }
                        }
                    }
                },
                tick = next_tick(&mut ticker) => {
                    if tick.is_some() {
                        pipeline.on_tick();
                        if let Some(ticker) = &ticker {
                            ticker.settle();
                        }
                    } else {
                        ticker = None;
                    }
                    if producer_done && (ticker.is_none() || pipeline.is_drained()) {
                        pipeline.complete();
                        break;
                    }
                }
            }

            if self.gate.is_terminal() {
                break;
            }
        }

        if let Some(mut ticker) = ticker {
            ticker.stop();
        }
        source.abort();
        debug!(
            session_id = %session_id,
            state = ?self.gate.state(),
            fragments = pipeline.accumulator.fragment_count(),
            "Session torn down"
        );
    }
}

/// Decoder, accumulator and pacer of one open session
struct Pipeline {
    gate: Arc<DeliveryGate>,
    decoder: FrameDecoder,
    accumulator: Accumulator,
    pacer: Pacer,
    /// Preamble text shown on the process channel
    process: String,
}

impl Pipeline {
    /// Decode one read; frames before a decode error are still applied
    fn on_chunk(&mut self, chunk: &str) -> Result<(), DecodeError> {
        let mut frames = Vec::new();
        let decoded = self.decoder.push(chunk, &mut frames);
        for frame in frames {
            self.apply(frame);
        }
        decoded
    }

    fn on_producer_done(&mut self) -> Result<Completion, DecodeError> {
        let mut frames = Vec::new();
        let decoded = self.decoder.finish(&mut frames);
        for frame in frames {
            self.apply(frame);
        }
        decoded?;
        Ok(self.pacer.on_producer_done(&self.accumulator))
    }

    /// Flush the decoder after a read error so buffered text is not lost
    fn salvage(&mut self) {
        let mut frames = Vec::new();
        if let Err(e) = self.decoder.finish(&mut frames) {
            debug!(session_id = %self.gate.session_id(), error = %e, "Dropping malformed tail");
        }
        for frame in frames {
            self.apply(frame);
        }
    }

    fn apply(&mut self, frame: DecodedFrame) {
        match frame {
            DecodedFrame::Text(text) => {
                if text.is_empty() {
                    return;
                }
                self.gate.transition(SessionState::Streaming);
                self.accumulator.append_text(&text);
                if let Some(target) = self.pacer.on_fragment(&self.accumulator) {
                    self.commit(target);
                }
            }
            DecodedFrame::Process(grown) => {
                self.gate.transition(SessionState::Streaming);
                self.process.push_str(&grown);
                self.gate.deliver_process(&self.process, false);
            }
            DecodedFrame::PreambleClosed(preamble) => {
                self.gate.transition(SessionState::Streaming);
                self.process = preamble;
                self.gate.deliver_process(&self.process, true);
            }
            DecodedFrame::ProcessDiscarded => {
                self.process.clear();
                self.gate.deliver_process("", false);
            }
        }
    }

    fn on_tick(&mut self) {
        if let Some(target) = self.pacer.on_tick(&self.accumulator) {
            self.commit(target);
        }
    }

    fn commit(&mut self, target: usize) {
        match self.accumulator.commit(target) {
            Ok(true) => {
                self.gate.deliver_delta(self.accumulator.committed_text());
            }
            Ok(false) => {}
            Err(e) => warn!(session_id = %self.gate.session_id(), error = %e, "Rejected commit"),
        }
    }

    fn is_drained(&self) -> bool {
        self.pacer.is_drained(&self.accumulator)
    }

    fn complete(&mut self) {
        self.accumulator.commit_all();
        let delivered = self.gate.deliver_terminal(DeliveryEvent::completed(
            self.gate.session_id().clone(),
            self.accumulator.text(),
        ));
        if delivered {
            info!(
                session_id = %self.gate.session_id(),
                chars = self.accumulator.text().chars().count(),
                "Session completed"
            );
        }
    }

    fn fail(&mut self, error: &StreamError) {
        warn!(session_id = %self.gate.session_id(), error = %error, "Session failed");
        self.accumulator.commit_all();
        self.gate.deliver_terminal(DeliveryEvent::failed(
            self.gate.session_id().clone(),
            self.accumulator.text(),
            error.kind(),
            error.to_string(),
        ));
    }
}

/// Resolves once cancellation is requested; never if the handle went away
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|requested| *requested).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Next tick of the policy's timer; pending forever for tick-less policies
async fn next_tick(ticker: &mut Option<Ticker>) -> Option<()> {
    match ticker {
        Some(ticker) => ticker.tick().await,
        None => std::future::pending().await,
    }
}
