//! Transcoding and delivery engine.
//!
//! Turns a library item plus the client's acceptable types into bytes on
//! the wire:
//!
//! ```text
//! negotiate(item, accept, mode) -> Negotiation { mime, cached, .. }
//! deliver(item, negotiation)    -> Delivery::File | Delivery::Stream
//! ```
//!
//! Foreground requests for an uncached item stream the encoder's output
//! while it is also written to the cache; when `transcode.streaming` is off
//! they wait for the whole file instead.

mod error;
mod negotiator;
mod stream;
mod types;

pub use error::EngineError;
pub use negotiator::Engine;
pub use stream::TranscodeStream;
pub use types::{Delivery, Negotiation, RequestMode};
