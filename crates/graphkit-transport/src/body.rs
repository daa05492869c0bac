//! Request bodies
//!
//! A body is either buffered (known length, can be re-sent on retry or
//! redirect) or a forward-only stream whose length is unknown.

use bytes::Bytes;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// A forward-only stream of body chunks.
pub type BodyStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

/// The body of an outbound request.
#[derive(Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Fully buffered bytes. Replayable.
    Buffered(Bytes),
    /// A stream that can be taken exactly once. Not replayable.
    ///
    /// Clones share the same underlying stream.
    Streaming(Arc<Mutex<Option<BodyStream>>>),
}

impl RequestBody {
    /// Wrap a stream as a one-shot body.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self::Streaming(Arc::new(Mutex::new(Some(Box::pin(stream)))))
    }

    /// Length of the body when known.
    ///
    /// Streaming bodies report `None`, which is what disables retries.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Buffered(bytes) => Some(bytes.len() as u64),
            Self::Streaming(_) => None,
        }
    }

    /// Whether the same bytes can be sent again.
    pub fn is_replayable(&self) -> bool {
        self.content_length().is_some()
    }

    /// Whether there is no body at all.
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Buffered bytes, if this body is buffered.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Buffered(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Take the stream out of a streaming body.
    ///
    /// Returns `None` for non-streaming bodies or when the stream was taken already.
    pub fn take_stream(&self) -> Option<BodyStream> {
        match self {
            Self::Streaming(slot) => slot.lock().ok().and_then(|mut guard| guard.take()),
            _ => None,
        }
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Buffered(Bytes::from(bytes))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Buffered(bytes)
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Buffered(Bytes::from(text))
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Buffered(bytes) => f.debug_tuple("Buffered").field(&bytes.len()).finish(),
            Self::Streaming(_) => f.write_str("Streaming"),
        }
    }
}
