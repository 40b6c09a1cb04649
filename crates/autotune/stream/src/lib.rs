#![deny(unsafe_code)]
//! # autotune-stream
//!
//! The ordered event stream the engine consumes. Reads block until entries
//! exist past a cursor and accept a cancellation token, so a consumer can be
//! stopped without waiting out a read.

pub mod codec;
pub mod entry;
pub mod error;
pub mod stream;

pub use codec::{decode_batch, decode_entry, encode_event, DecodedBatch, EVENT_FIELD, TYPE_FIELD};
pub use entry::{EntryId, StreamCursor, StreamEntry};
pub use error::{StreamError, StreamResult};
pub use stream::{EventStream, InMemoryEventStream};
