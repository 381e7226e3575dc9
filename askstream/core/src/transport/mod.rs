//! Transport Layer
//!
//! Opens ask requests and streams their bodies as text fragments.
//!
//! - [`Transport`]: the seam between the engine and the network
//! - [`HttpTransport`]: reqwest implementation against the ask endpoint
//! - [`FragmentSource`]: the arrival-ordered fragment stream of one response

mod http;
mod traits;
mod utf8;

pub use http::HttpTransport;
pub use traits::{AskBody, AskRequest, FragmentSource, Transport, FRAGMENT_CHANNEL_CAPACITY};
pub use utf8::Utf8Decoder;
