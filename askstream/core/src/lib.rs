//! Askstream Core - Streaming Answer Delivery Engine
//!
//! This crate consumes long-lived text responses from an ask endpoint and
//! exposes partial answers to a UI under a controllable pacing policy, while
//! handling completion, mid-stream errors and cancellation. It has no UI
//! dependencies: any surface (terminal, GUI, test harness) drives it through
//! a [`DeliverySink`].
//!
//! # Architecture
//!
//! ```text
//!  network bytes
//!       │  Transport (HttpTransport)
//!       ▼
//!  text fragments ── FrameDecoder (event-stream | raw + marker)
//!       │                     │
//!       │                     └──▶ process preamble ──▶ sink.on_process
//!       ▼
//!  Accumulator ◀── Pacer (Immediate | ChunkThreshold | Interval | CharRate)
//!       │                ▲
//!       │ commits        └── Scheduler ticks
//!       ▼
//!  DeliveryGate ──▶ sink.on_delta (full committed text, one terminal event)
//! ```
//!
//! Control flows the other way: [`Conversation::submit`] creates a session,
//! [`SessionHandle::cancel`] or a newer submit tears it down.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use askstream_core::{load_config, ChatBubble, Conversation};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let conversation = Conversation::from_config(&config)?;
//!     let bubble = Arc::new(ChatBubble::new());
//!
//!     let handle = conversation.submit("What is the answer?", bubble.clone())?;
//!     handle.wait().await;
//!     println!("{}", bubble.render());
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`transport`]: ask endpoint client and fragment streams
//! - [`decoder`]: event-stream and raw framing
//! - [`accumulator`]: accumulated and committed text
//! - [`pacing`]: pacing policies and the per-session pacer
//! - [`scheduler`]: tick sources (tokio timers, manual clock)
//! - [`sink`]: delivery sinks (chat bubble, channel, callbacks)
//! - [`controller`]: the session state machine
//! - [`conversation`]: one active session per conversation
//! - [`config`]: TOML / environment configuration

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod accumulator;
pub mod config;
pub mod controller;
pub mod conversation;
pub mod decoder;
pub mod error;
pub mod messages;
pub mod pacing;
pub mod scheduler;
pub mod session;
pub mod sink;
pub mod transport;

// Re-export main types for convenience
pub use accumulator::Accumulator;
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, EngineConfig,
};
pub use controller::{start_session, SessionSettings};
pub use conversation::Conversation;
pub use decoder::{DecodedFrame, DecoderOptions, FrameDecoder, Framing};
pub use error::{
    AccumulatorError, DecodeError, ErrorKind, ReadError, StreamError, SubmitError, TransportError,
};
pub use messages::{DeliveryEvent, RawFragment, SessionId, SessionState};
pub use pacing::{PacingPolicy, Pacer};
pub use scheduler::{ManualScheduler, Scheduler, Ticker, TokioScheduler};
pub use session::SessionHandle;
pub use sink::{BubbleStatus, CallbackSink, ChannelSink, ChatBubble, DeliverySink};
pub use transport::{AskRequest, FragmentSource, HttpTransport, Transport};
