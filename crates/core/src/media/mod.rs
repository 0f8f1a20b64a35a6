//! Media formats, items and client format preferences.

mod accept;
mod types;

pub use accept::AcceptList;
pub use types::{AudioCodec, Container, MediaItem};
