//! Error types for the delivery engine.

use thiserror::Error;

use crate::library::LibraryError;
use crate::transcoder::TranscodeError;

/// Errors surfaced by negotiation and delivery.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The item does not exist in the library.
    #[error("Media item not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Library(LibraryError),
}

impl From<LibraryError> for EngineError {
    fn from(e: LibraryError) -> Self {
        match e {
            LibraryError::NotFound(id) => Self::NotFound(id),
            other => Self::Library(other),
        }
    }
}
