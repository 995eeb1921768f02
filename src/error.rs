//! Error types for notate.

use thiserror::Error;

use crate::link::LinkId;
use crate::span::SpanId;

/// Result type for notate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for notate operations.
///
/// Every variant is a local, recoverable failure: the store, index, and
/// graph are left exactly as they were before the failing call. Anything
/// unrecoverable (corrupted persisted data, a surface that disagrees with
/// canonical text) is rejected at the load boundary as [`Error::Corrupt`]
/// or [`Error::SurfaceMismatch`] before it can reach the index.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Offsets out of bounds for the field's canonical text, or `start >= end`
    /// where a non-empty range is required.
    #[error("invalid offset [{start}, {end}) for field of length {text_len}")]
    InvalidOffset {
        /// Start offset (characters, inclusive).
        start: usize,
        /// End offset (characters, exclusive).
        end: usize,
        /// Canonical text length of the field, in characters.
        text_len: usize,
    },

    /// The selected text could not be reconciled against canonical text.
    #[error("selection {0:?} not found in canonical text")]
    TextNotFound(String),

    /// The rendering surface's plain text disagrees with canonical text.
    #[error("surface text diverges from canonical text at char {at}")]
    SurfaceMismatch {
        /// First character offset at which the two disagree.
        at: usize,
    },

    /// The field's schema forbids overlapping spans with the same label.
    #[error("span [{start}, {end}) with label {label:?} overlaps an existing {label:?} span")]
    OverlapDisallowed {
        /// Requested start offset.
        start: usize,
        /// Requested end offset.
        end: usize,
        /// Label shared with the existing span.
        label: String,
    },

    /// Operation on a span id that is not currently live.
    #[error("no span with id {0}")]
    SpanNotFound(SpanId),

    /// Operation on a link id that is not currently live.
    #[error("no link with id {0}")]
    LinkNotFound(LinkId),

    /// Operation on a field name the schema does not declare.
    #[error("no field named {0:?}")]
    FieldNotFound(String),

    /// No applicable span schema with the given name.
    #[error("no applicable span schema {0:?}")]
    SchemaNotFound(String),

    /// A link references a span id that is not currently live.
    #[error("link endpoint {0} is not a live span")]
    InvalidEndpoint(SpanId),

    /// Endpoint count does not match the link kind's arity.
    #[error("link kind {kind} requires {expected} endpoints, got {got}")]
    ArityMismatch {
        /// The link kind as declared.
        kind: &'static str,
        /// Arity requirement, e.g. "exactly 2" or "at least 2".
        expected: &'static str,
        /// Endpoint count supplied by the caller.
        got: usize,
    },

    /// The endpoint labels are not declared compatible for this link label.
    //
    // Field is `source_label`, not `source`: thiserror reserves `source`
    // for the error cause chain.
    #[error("labels ({source_label:?}, {target_label:?}) are not compatible for link {link_label:?}")]
    IncompatibleLabels {
        /// Label of the source (or first offending) endpoint span.
        source_label: String,
        /// Label of the target endpoint span.
        target_label: String,
        /// The link label whose compatibility table rejected the pair.
        link_label: String,
    },

    /// An undirected or n-ary link with the same endpoint set and label
    /// already exists.
    #[error("duplicate link: an equivalent link already exists with id {0}")]
    DuplicateLink(LinkId),

    /// A label the schema does not declare for this field or link.
    #[error("label {label:?} is not declared in schema {schema:?}")]
    UnknownLabel {
        /// The undeclared label.
        label: String,
        /// Name of the schema that was consulted.
        schema: String,
    },

    /// Persisted data failed load-boundary validation.
    #[error("corrupt persisted data: {0}")]
    Corrupt(String),
}

impl Error {
    /// Create an invalid-offset error.
    #[must_use]
    pub fn invalid_offset(start: usize, end: usize, text_len: usize) -> Self {
        Error::InvalidOffset {
            start,
            end,
            text_len,
        }
    }

    /// Create a text-not-found error.
    #[must_use]
    pub fn text_not_found(selection: impl Into<String>) -> Self {
        Error::TextNotFound(selection.into())
    }

    /// Create an unknown-label error.
    #[must_use]
    pub fn unknown_label(label: impl Into<String>, schema: impl Into<String>) -> Self {
        Error::UnknownLabel {
            label: label.into(),
            schema: schema.into(),
        }
    }

    /// Create a corrupt-data error.
    #[must_use]
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }
}
