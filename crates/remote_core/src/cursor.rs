//! Event cursors.
//!
//! A [`Cursor`] is an epoch-millisecond timestamp separating events a client
//! has already seen from events it has not.
//!
//! Event timestamps and the cursors handed back to clients are drawn from one
//! process-wide clock ([`Cursor::issue`]). It tracks wall-clock time but never
//! repeats a value, so a cursor issued before an event is always below that
//! event's timestamp, whichever runtime recorded it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::RemoteError;

static LAST_ISSUED: AtomicU64 = AtomicU64::new(0);

/// Epoch-millisecond boundary between seen and unseen events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(u64);

impl Cursor {
    /// The current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }

    /// Issue the next value of the process-wide event clock.
    ///
    /// Returns the current time, or one past the last issued value if the
    /// clock has run ahead of wall time. Every call returns a value greater
    /// than all earlier calls.
    #[must_use]
    pub fn issue() -> Self {
        let now = Self::now().0;
        match LAST_ISSUED.fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
            Some(now.max(last + 1))
        }) {
            Ok(last) | Err(last) => Self(now.max(last + 1)),
        }
    }

    /// Create a cursor from raw epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the raw epoch milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Parse the `ts` field of a poll request.
    ///
    /// Absent, blank and `"null"` values mean "now", taken from the event
    /// clock.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::MalformedRequest`] if the value is not a
    /// non-negative integer.
    pub fn parse(raw: Option<&str>) -> Result<Self, RemoteError> {
        let Some(raw) = raw.map(str::trim) else {
            return Ok(Self::issue());
        };
        if raw.is_empty() || raw == "null" {
            return Ok(Self::issue());
        }
        raw.parse::<u64>()
            .map(Self)
            .map_err(|_| RemoteError::MalformedRequest(format!("invalid cursor '{raw}'")))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
