//! Frame Decoding
//!
//! Turns the raw text fragments coming off the transport into logical
//! records. The backend uses one of two framings, picked per response by its
//! content type:
//!
//! - **Event stream** (`text/event-stream`): blank-line separated records whose
//!   `data:` lines carry the payload. See [`EventStreamDecoder`].
//! - **Raw** (`text/plain`): the body is one evolving answer, optionally led by
//!   a "process" preamble closed by an in-band marker. See [`RawDecoder`].
//!
//! Both decoders buffer across physical reads, so a delimiter or marker split
//! between two reads is handled the same as one that arrives whole.

mod event_stream;
mod raw;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use event_stream::EventStreamDecoder;
pub use raw::RawDecoder;

use crate::error::DecodeError;

/// In-band marker ending the raw-framed preamble
pub const DEFAULT_MARKER: &str = "PREQUESTIONEND";

/// Default cap on an unterminated event-stream record (1 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 1024 * 1024;

/// Response framing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Blank-line separated `data:` records
    #[default]
    EventStream,
    /// One continuous text body
    Raw,
}

impl Framing {
    /// `Accept` header value requesting this framing
    #[must_use]
    pub fn accept_header(self) -> &'static str {
        match self {
            Self::EventStream => "text/event-stream",
            Self::Raw => "text/plain",
        }
    }

    /// Framing implied by a response `Content-Type`, if recognizable
    #[must_use]
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if essence == "text/event-stream" {
            Some(Self::EventStream)
        } else if essence.starts_with("text/") {
            Some(Self::Raw)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EventStream => write!(f, "event_stream"),
            Self::Raw => write!(f, "raw"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event_stream" | "event-stream" | "sse" => Ok(Self::EventStream),
            "raw" | "text" | "plain" => Ok(Self::Raw),
            other => Err(format!("unknown framing '{other}' (expected event_stream or raw)")),
        }
    }
}

/// One logical record produced by a decoder
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodedFrame {
    /// Answer text for the accumulator
    Text(String),
    /// Preamble ("process") text that became visible since the last frame
    Process(String),
    /// The marker was found; carries the whole preamble
    PreambleClosed(String),
    /// Body ended without a marker; the preamble shown so far is the answer
    ProcessDiscarded,
}

/// Tuning shared by both decoders
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecoderOptions {
    /// Raw-framed preamble marker
    pub marker: String,
    /// Largest unterminated event-stream record tolerated
    pub max_record_bytes: usize,
}

impl Default for DecoderOptions {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
        }
    }
}

/// Decoder for one session, in either framing
#[derive(Debug)]
pub enum FrameDecoder {
    /// Event-stream framing
    EventStream(EventStreamDecoder),
    /// Raw framing
    Raw(RawDecoder),
}

impl FrameDecoder {
    /// Create a decoder for `framing`
    #[must_use]
    pub fn new(framing: Framing, options: &DecoderOptions) -> Self {
        match framing {
            Framing::EventStream => {
                Self::EventStream(EventStreamDecoder::new(options.max_record_bytes))
            }
            Framing::Raw => Self::Raw(RawDecoder::new(options.marker.clone())),
        }
    }

    /// Framing this decoder handles
    #[must_use]
    pub fn framing(&self) -> Framing {
        match self {
            Self::EventStream(_) => Framing::EventStream,
            Self::Raw(_) => Framing::Raw,
        }
    }

    /// Feed one physical read, appending decoded frames to `frames`
    ///
    /// Frames decoded before a malformed record are still appended.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the framing is malformed.
    pub fn push(&mut self, chunk: &str, frames: &mut Vec<DecodedFrame>) -> Result<(), DecodeError> {
        match self {
            Self::EventStream(decoder) => decoder.push_into(chunk, frames),
            Self::Raw(decoder) => {
                frames.extend(decoder.push(chunk));
                Ok(())
            }
        }
    }

    /// Flush whatever is still buffered at end of body
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if the trailing record is malformed.
    pub fn finish(&mut self, frames: &mut Vec<DecodedFrame>) -> Result<(), DecodeError> {
        match self {
            Self::EventStream(decoder) => decoder.finish_into(frames),
            Self::Raw(decoder) => {
                frames.extend(decoder.finish());
                Ok(())
            }
        }
    }

    /// Whether a raw-framed preamble has been closed by its marker
    #[must_use]
    pub fn preamble_closed(&self) -> bool {
        match self {
            Self::EventStream(_) => false,
            Self::Raw(decoder) => decoder.preamble_closed(),
        }
    }
}
