//! Transcode cache: `<media_id>.<ext>` files and their in-memory index.
//!
//! The index is owned by the [`supervisor`](crate::supervisor) task; other
//! code reaches it through [`SupervisorHandle`](crate::supervisor::SupervisorHandle).

mod index;

pub use index::{CacheEntry, CacheIndex, PARTIAL_EXTENSION};
