//! Session Output Layer
//!
//! One collection session produces one output artifact. Two shapes are
//! supported:
//!
//! - [`SessionWriter`]: batch mode — the whole sample buffer serialized as a
//!   single JSON document at finalize time
//! - [`LineSink`]: streaming mode — parsed records appended line by line as
//!   they arrive
//!
//! Both release the underlying file handle on every exit path, including the
//! fault path.

mod writer;

pub use writer::{LineSink, SessionError, SessionWriter};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One timestamped reading taken during a collection session.
///
/// Samples are immutable once appended; the buffer preserves insertion order,
/// which equals sampling order.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    /// Wall-clock instant the reading was taken (UTC).
    pub ts: DateTime<Utc>,
    /// Raw command output for this reading.
    pub payload: String,
}

impl Sample {
    /// Create a sample stamped with the given instant.
    pub fn at(ts: DateTime<Utc>, payload: impl Into<String>) -> Self {
        Self {
            ts,
            payload: payload.into(),
        }
    }

    /// Create a sample stamped with the current instant.
    pub fn now(payload: impl Into<String>) -> Self {
        Self::at(Utc::now(), payload)
    }
}
