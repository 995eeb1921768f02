//! # notate
//!
//! Span annotation and linking engine for configuration-driven
//! annotation tools.
//!
//! - **Spans**: labeled character ranges over per-field canonical text,
//!   indexed in an augmented red-black interval tree
//! - **Overlap rendering**: boundary-sweep decomposition of overlapping
//!   spans into a flat, paint-ready segment list
//! - **Offsets**: selection-to-canonical-offset resolution that is
//!   immune to markup injected for previously rendered spans
//! - **Links**: directed, undirected, and n-ary relations between spans
//!   with schema-declared label compatibility
//!
//! ## Quick Start
//!
//! ```rust
//! use notate::{
//!     AnnotationSession, LinkKind, LinkSchema, Project, Selection, SpanSchema, SurfaceFragment,
//! };
//!
//! let project = Project::new()
//!     .with_span_schema(SpanSchema::new("sentiment", "text", ["positive", "strong"]))
//!     .with_link_schema(LinkSchema::new("intensifies").with_pair("strong", "positive"));
//!
//! let mut session = AnnotationSession::new(project, "alice")?;
//! session.add_field("text", "I am absolutely thrilled today")?;
//!
//! // A selection event from the display layer resolves to canonical
//! // offsets before the span is created.
//! let surface = vec![SurfaceFragment::text("I am absolutely thrilled today")];
//! let positive = session.annotate(
//!     "text",
//!     &surface,
//!     &Selection::new("absolutely"),
//!     "sentiment",
//!     "positive",
//! )?;
//! assert_eq!((positive.start, positive.end), (5, 15));
//!
//! // Overlapping spans are fine; the render feed decomposes them.
//! let strong = session.create_span("text", 8, 20, "strong", "sentiment")?;
//! session.create_link(LinkKind::Directed, &[strong.id, positive.id], "intensifies")?;
//!
//! let feed = session.render_field("text")?;
//! assert_eq!(feed.segments.len(), 5);
//! assert_eq!(feed.segments[2].active_span_ids, vec![positive.id, strong.id]);
//! # Ok::<(), notate::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! selection event ──► OffsetMapper ──► canonical offsets
//!                                            │
//!                                            ▼
//!                     SpanStore.create ──► IntervalIndex.insert
//!                                            │
//!                                            ▼ (synchronous)
//!                     segment recompute ──► render feed
//!
//! LinkGraph references spans by id; span deletion cascades.
//! ```
//!
//! Each annotator session is single-writer: one [`AnnotationSession`]
//! per annotator per instance, with no shared mutation between
//! sessions. Read-only aggregation across sessions (review tooling)
//! needs no locking.
//!
//! ## Design Philosophy
//!
//! - **Validate at the boundary**: offsets, labels, arity, and
//!   compatibility are checked before any index is touched; a failed
//!   call leaves no partial state
//! - **Canonical text is the source of truth**: rendering markup never
//!   shifts an offset, and a surface that disagrees with canonical
//!   text is rejected rather than reconciled by guesswork
//! - **Derived data is never stored**: segment lists are recomputed on
//!   every mutation, synchronously, and persisted snapshots carry only
//!   spans and links

pub mod error;
pub mod interval;
pub mod link;
pub mod offset;
pub mod schema;
pub mod segment;
pub mod session;
pub mod span;
pub mod store;

// Re-exports for convenience
pub use error::{Error, Result};
pub use interval::{IndexEntry, IntervalIndex};
pub use link::{CascadeOutcome, Link, LinkGraph, LinkId, LinkKind};
pub use offset::{
    verify_surface, OffsetMapper, SurfaceFragment, SurfacePoint, SurfaceRange,
};
pub use schema::{LinkSchema, Project, SpanSchema, ValidationIssue};
pub use segment::{render_segments, Segment};
pub use session::{AnnotationSession, FieldRecord, RenderFeed, Selection, SessionSnapshot};
pub use span::{Span, SpanId};
pub use store::{SpanPatch, SpanStore};
