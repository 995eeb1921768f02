//! Span records: labeled character ranges over a field's canonical text.
//!
//! A [`Span`] is the atomic unit of annotation. It is always expressed in
//! **character offsets** (not bytes) into the owning field's canonical
//! text, because the rendering surface and the persistence layer both
//! count characters. Use [`crate::offset::char_slice`] to recover the
//! surface form of a span from canonical text.
//!
//! Spans are immutable once created: every change goes through
//! [`crate::store::SpanStore::update`], which keeps the interval index in
//! sync. Nothing in this module mutates a stored offset in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Unique identifier for a span within a session.
pub type SpanId = u64;

/// A labeled character range `[start, end)` over one field's canonical text.
///
/// Invariants (enforced by [`crate::store::SpanStore`], not by this type):
/// `start <= end`, `end <= char_len(canonical_text(field))`. Zero-width
/// spans (`start == end`) are legal and render as markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Unique identifier within the owning session.
    pub id: SpanId,
    /// Name of the field this span annotates.
    pub field: String,
    /// Start offset (characters, inclusive).
    pub start: usize,
    /// End offset (characters, exclusive).
    pub end: usize,
    /// Annotation label (e.g., "positive", "Person").
    pub label: String,
    /// Name of the schema the label belongs to.
    pub schema: String,
    /// Annotator or session that created this span.
    pub owner: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Span {
    /// Create a new span record.
    ///
    /// The id is normally assigned by the owning store; callers building
    /// records for restore pass the persisted id through unchanged.
    #[must_use]
    pub fn new(
        id: SpanId,
        field: impl Into<String>,
        start: usize,
        end: usize,
        label: impl Into<String>,
        schema: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            id,
            field: field.into(),
            start,
            end,
            label: label.into(),
            schema: schema.into(),
            owner: owner.into(),
            created_at: Utc::now(),
        }
    }

    /// Set an explicit creation time (restore path).
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    /// Character range of this span.
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Length in characters.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether this is a zero-width marker span.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether this span's interval intersects `[start, end)`.
    ///
    /// Half-open semantics: spans that merely touch at a boundary
    /// (`self.end == start`) do not overlap, and zero-width spans
    /// intersect nothing.
    #[must_use]
    pub const fn overlaps(&self, start: usize, end: usize) -> bool {
        let lo = if self.start > start { self.start } else { start };
        let hi = if self.end < end { self.end } else { end };
        lo < hi
    }

    /// Whether this span's interval fully contains `[start, end)`.
    #[must_use]
    pub const fn contains(&self, start: usize, end: usize) -> bool {
        self.start <= start && end <= self.end
    }

    /// Extract this span's surface form from the field's canonical text.
    ///
    /// Offsets are characters, so this walks `char_indices` rather than
    /// slicing bytes. Returns an empty string for a zero-width span.
    #[must_use]
    pub fn extract<'a>(&self, canonical_text: &'a str) -> &'a str {
        crate::offset::char_slice(canonical_text, self.start, self.end).unwrap_or("")
    }
}
