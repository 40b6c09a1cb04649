use crate::error::StreamError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Position of an entry in the stream, rendered as `<millis>-<seq>`.
///
/// Ids are strictly increasing in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId {
    pub millis: u64,
    pub seq: u64,
}

impl EntryId {
    /// Sorts before every real entry.
    pub const ZERO: EntryId = EntryId { millis: 0, seq: 0 };

    pub fn new(millis: u64, seq: u64) -> Self {
        Self { millis, seq }
    }

    /// Smallest id strictly greater than `self` for a clock reading `now_ms`.
    pub fn next_after(&self, now_ms: u64) -> Self {
        if now_ms > self.millis {
            Self::new(now_ms, 0)
        } else {
            Self::new(self.millis, self.seq + 1)
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.millis, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StreamError::InvalidEntryId(s.to_string());
        let (millis, seq) = match s.split_once('-') {
            Some((m, q)) => (m, q),
            None => (s, "0"),
        };
        Ok(Self {
            millis: millis.parse().map_err(|_| invalid())?,
            seq: seq.parse().map_err(|_| invalid())?,
        })
    }
}

/// Where a read starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamCursor {
    /// Only entries appended after the read begins.
    New,
    /// Entries strictly after the given id.
    After(EntryId),
}

/// One stream entry: an id plus a flat string field map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: BTreeMap<String, String>,
}

impl StreamEntry {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}
