//! Domain model: series identifiers, draw records, and the history document.
//!
//! The history document is the durable contract shared with display
//! front-ends, so its serialized field names follow the published file
//! format rather than the Rust field names:
//!
//! ```text
//! {
//!   "loteria": "megasena",
//!   "updatedAt": "2026-01-03T22:10:04.512331Z",
//!   "lastConcurso": 2750,
//!   "items": [ { "concurso": 2750, "data": "01/01/2026", "dezenas": [1, 10, 18, 25, 39, 56] } ]
//! }
//! ```
//!
//! # Invariants
//!
//! - `items` is ordered by ascending contest number.
//! - `items` holds at most the retention cap; overflow drops the oldest.
//! - `last_contest` never decreases across successful reconciliations.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;

/// Sequential draw number within a series.
pub type ContestNumber = u64;

/// Default number of draws retained per series.
pub const MAX_KEEP: usize = 2000;

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Rejected series identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid series id {raw:?}: must be non-empty and free of whitespace")]
pub struct InvalidSeriesId {
    pub raw: String,
}

impl InvalidSeriesId {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::InvalidSeriesId
    }
}

/// Stable key of a tracked lottery game (e.g. `megasena`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SeriesId(String);

impl SeriesId {
    /// Validate and wrap a series key.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSeriesId`] for empty keys or keys containing
    /// whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, InvalidSeriesId> {
        let raw = raw.into();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(InvalidSeriesId { raw });
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system safe form of the key.
    ///
    /// Bytes outside `[A-Za-z0-9._-]` are percent-encoded, so distinct keys
    /// always map to distinct file names.
    #[must_use]
    pub fn file_stem(&self) -> String {
        let mut encoded = String::with_capacity(self.0.len());

        for byte in self.0.bytes() {
            let is_safe =
                byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' || byte == b'.';
            if is_safe {
                encoded.push(char::from(byte));
            } else {
                push_percent_encoded_byte(&mut encoded, byte);
            }
        }

        encoded
    }

    /// Catalog entry for well-known series.
    #[must_use]
    pub fn meta(&self) -> Option<&'static SeriesMeta> {
        KNOWN_SERIES.iter().find(|meta| meta.key == self.0)
    }

    /// Display label, falling back to the raw key.
    #[must_use]
    pub fn label(&self) -> &str {
        self.meta().map_or(self.as_str(), |meta| meta.label)
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SeriesId {
    type Err = InvalidSeriesId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

fn push_percent_encoded_byte(buffer: &mut String, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";

    buffer.push('%');
    buffer.push(char::from(HEX[usize::from(byte >> 4)]));
    buffer.push(char::from(HEX[usize::from(byte & 0x0F)]));
}

/// Display metadata for a known game.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesMeta {
    pub key: &'static str,
    pub label: &'static str,
    /// Smallest number that can be drawn.
    pub min: u32,
    /// Largest number that can be drawn.
    pub max: u32,
}

pub const KNOWN_SERIES: &[SeriesMeta] = &[
    SeriesMeta {
        key: "megasena",
        label: "Mega-Sena",
        min: 1,
        max: 60,
    },
    SeriesMeta {
        key: "lotofacil",
        label: "Lotofácil",
        min: 1,
        max: 25,
    },
];

/// Series tracked when nothing else is configured.
#[must_use]
pub fn default_series() -> Vec<SeriesId> {
    KNOWN_SERIES
        .iter()
        .map(|meta| SeriesId(meta.key.to_string()))
        .collect()
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

/// One drawn result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draw {
    #[serde(rename = "concurso")]
    pub contest_number: ContestNumber,
    /// Opaque date text, kept in the source format.
    #[serde(rename = "data", default)]
    pub draw_date: String,
    /// Drawn numbers in the order the source listed them.
    #[serde(rename = "dezenas", default)]
    pub numbers: Vec<u32>,
}

// ---------------------------------------------------------------------------
// HistoryDocument
// ---------------------------------------------------------------------------

/// Persisted per-series history: a bounded ordered log plus its cursor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryDocument {
    /// Key the document is stored under; not part of the file body.
    #[serde(skip)]
    pub key: SeriesId,
    #[serde(rename = "loteria")]
    pub series_id: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
    /// Highest contest fully merged locally.
    #[serde(rename = "lastConcurso")]
    pub last_contest: ContestNumber,
    pub items: Vec<Draw>,
    /// Top-level keys written by other tools, carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl HistoryDocument {
    /// A fresh document with cursor 0 and no items.
    #[must_use]
    pub fn new(series: &SeriesId) -> Self {
        Self {
            key: series.clone(),
            series_id: series.to_string(),
            updated_at: String::new(),
            last_contest: 0,
            items: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Drop the oldest items so at most `max_keep` remain.
    ///
    /// Returns the number of items removed.
    pub fn apply_retention(&mut self, max_keep: usize) -> usize {
        let excess = self.items.len().saturating_sub(max_keep);
        if excess > 0 {
            self.items.drain(..excess);
        }
        excess
    }

    /// The newest `n` items, oldest first.
    #[must_use]
    pub fn latest(&self, n: usize) -> &[Draw] {
        let start = self.items.len().saturating_sub(n);
        &self.items[start..]
    }

    /// Look up a retained draw by contest number.
    #[must_use]
    pub fn find(&self, contest: ContestNumber) -> Option<&Draw> {
        self.items
            .iter()
            .rev()
            .find(|draw| draw.contest_number == contest)
    }

    /// True when the retained items form a contiguous ascending run ending
    /// at the cursor.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        let Some(last) = self.items.last() else {
            return true;
        };
        last.contest_number == self.last_contest
            && self
                .items
                .windows(2)
                .all(|pair| pair[0].contest_number + 1 == pair[1].contest_number)
    }
}
