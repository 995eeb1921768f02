//! The per-editing-session annotation service.
//!
//! One [`AnnotationSession`] exists per annotator per instance: it owns
//! that annotator's [`SpanStore`] and [`LinkGraph`], stamps created
//! spans with the session owner, and wires the cross-component rules
//! the parts cannot enforce alone (selection ingest through the offset
//! mapper, span-deletion cascade into the link graph, relabel checks
//! against existing links).
//!
//! Sessions are created on instance load and discarded on navigation
//! away; the surrounding application owns the lifecycle and passes the
//! session by reference to whoever mutates it. A session is
//! single-writer by construction — review tooling aggregating several
//! annotators only ever calls the read methods on sessions it does not
//! own.
//!
//! Persistence is a [`SessionSnapshot`]: a plain serde value holding
//! the project, fields, spans, and links. Restoring a snapshot re-runs
//! full validation on every record, so corrupted data is rejected at
//! this boundary and never reaches an index, and the restored session
//! answers every overlap and link query exactly like the one that
//! produced the snapshot.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::link::{Link, LinkGraph, LinkId, LinkKind};
use crate::offset::{OffsetMapper, SurfaceFragment, SurfaceRange};
use crate::schema::Project;
use crate::segment::Segment;
use crate::span::{Span, SpanId};
use crate::store::{SpanPatch, SpanStore};

/// A selection event from the display layer: the selected text plus an
/// approximate canonical position to disambiguate repeated substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    /// The text the user selected, verbatim.
    pub text: String,
    /// Approximate canonical character position of the selection start,
    /// if the display layer can supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

impl Selection {
    /// A selection without a position hint.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: None,
        }
    }

    /// Attach an approximate canonical position.
    #[must_use]
    pub const fn near(mut self, position: usize) -> Self {
        self.position = Some(position);
        self
    }
}

/// Everything the display layer needs to paint one field: the segment
/// decomposition plus the live span and link lists, so the caller never
/// re-derives overlap logic.
#[derive(Debug)]
pub struct RenderFeed<'a> {
    /// Field name.
    pub field: &'a str,
    /// The field's canonical text.
    pub canonical_text: &'a str,
    /// Non-overlapping segment decomposition, in document order.
    pub segments: &'a [Segment],
    /// Live spans in the field, ascending by offset.
    pub spans: Vec<&'a Span>,
    /// Links touching any span of the field, in creation order.
    pub links: Vec<&'a Link>,
}

/// One field's persisted identity: name plus canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Field name.
    pub name: String,
    /// Canonical text.
    pub text: String,
}

/// Serializable capture of a session's full annotation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session owner (annotator id).
    pub owner: String,
    /// Project schemas the session was built against.
    pub project: Project,
    /// Fields with their canonical text.
    pub fields: Vec<FieldRecord>,
    /// Span records in creation order.
    pub spans: Vec<Span>,
    /// Link records in creation order.
    pub links: Vec<Link>,
}

impl SessionSnapshot {
    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::corrupt(e.to_string()))
    }

    /// Deserialize from JSON. Structural validation happens later, in
    /// [`AnnotationSession::restore`].
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::corrupt(e.to_string()))
    }
}

/// The span annotation and linking engine for one annotator session.
#[derive(Debug)]
pub struct AnnotationSession {
    owner: String,
    store: SpanStore,
    links: LinkGraph,
}

impl AnnotationSession {
    /// Create a session for `owner` over a validated project.
    ///
    /// A project with structural issues is rejected here, before any
    /// annotation can be attempted against it.
    pub fn new(project: Project, owner: impl Into<String>) -> Result<Self> {
        let issues = project.validate();
        if let Some(issue) = issues.first() {
            return Err(Error::corrupt(format!(
                "project failed validation ({} issue(s), first: {issue:?})",
                issues.len()
            )));
        }
        Ok(Self {
            owner: owner.into(),
            store: SpanStore::new(project),
            links: LinkGraph::new(),
        })
    }

    /// The session owner's annotator id.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Read-only access to the span store (safe for cross-session
    /// aggregation).
    #[must_use]
    pub fn store(&self) -> &SpanStore {
        &self.store
    }

    /// Read-only access to the link graph.
    #[must_use]
    pub fn link_graph(&self) -> &LinkGraph {
        &self.links
    }

    /// Register a field with its canonical text (instance load).
    pub fn add_field(&mut self, name: impl Into<String>, canonical: impl Into<String>) -> Result<()> {
        self.store.add_field(name, canonical)
    }

    // =========================================================================
    // Ingest
    // =========================================================================

    /// Turn a raw selection event into a span: verify the surface
    /// against canonical text, resolve offsets, then create.
    pub fn annotate(
        &mut self,
        field: &str,
        surface: &[SurfaceFragment],
        selection: &Selection,
        schema: &str,
        label: &str,
    ) -> Result<Span> {
        let (start, end) = self.resolve_selection(field, surface, selection)?;
        self.create_span(field, start, end, label, schema)
    }

    /// Resolve a selection to canonical offsets without creating a span.
    pub fn resolve_selection(
        &self,
        field: &str,
        surface: &[SurfaceFragment],
        selection: &Selection,
    ) -> Result<(usize, usize)> {
        let canonical = self
            .store
            .canonical_text(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        let mapper = OffsetMapper::new(canonical, surface)?;
        mapper.resolve(&selection.text, selection.position)
    }

    /// Resolve a surface pointer range to canonical offsets.
    pub fn resolve_range(
        &self,
        field: &str,
        surface: &[SurfaceFragment],
        range: &SurfaceRange,
    ) -> Result<(usize, usize)> {
        let canonical = self
            .store
            .canonical_text(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        let mapper = OffsetMapper::new(canonical, surface)?;
        mapper.resolve_range(range)
    }

    // =========================================================================
    // Span mutation
    // =========================================================================

    /// Create a span from canonical offsets, stamped with the session
    /// owner.
    pub fn create_span(
        &mut self,
        field: &str,
        start: usize,
        end: usize,
        label: &str,
        schema: &str,
    ) -> Result<Span> {
        let owner = self.owner.clone();
        self.store.create(field, start, end, label, schema, &owner)
    }

    /// Update a span's label or offsets.
    ///
    /// A label change is first checked against every link referencing
    /// the span; the update fails with
    /// [`IncompatibleLabels`](Error::IncompatibleLabels) rather than
    /// leaving a link invalid.
    pub fn update_span(&mut self, id: SpanId, patch: SpanPatch) -> Result<Span> {
        if let Some(new_label) = &patch.label {
            let current = self.store.get(id).ok_or(Error::SpanNotFound(id))?;
            if current.label != *new_label {
                self.links
                    .check_relabel(self.store.project(), &self.store, id, new_label)?;
            }
        }
        self.store.update(id, patch)
    }

    /// Delete a span, cascading into the link graph. Returns `false`
    /// if the id is not live.
    pub fn delete_span(&mut self, id: SpanId) -> bool {
        if !self.store.delete(id) {
            return false;
        }
        let outcome = self.links.on_span_deleted(id);
        debug!(
            id,
            removed_links = outcome.removed.len(),
            trimmed_links = outcome.trimmed.len(),
            "span deleted"
        );
        true
    }

    // =========================================================================
    // Link mutation
    // =========================================================================

    /// Create a typed link over existing spans.
    pub fn create_link(
        &mut self,
        kind: LinkKind,
        endpoints: &[SpanId],
        label: &str,
    ) -> Result<Link> {
        self.links
            .create_link(self.store.project(), &self.store, kind, endpoints, label)
    }

    /// Delete a link explicitly.
    pub fn delete_link(&mut self, id: LinkId) -> Result<()> {
        self.links.delete_link(id)
    }

    /// All links referencing a span, in creation order.
    #[must_use]
    pub fn links_for(&self, span: SpanId) -> Vec<&Link> {
        self.links.links_for(span)
    }

    // =========================================================================
    // Render feed
    // =========================================================================

    /// The complete paint-ready view of one field.
    ///
    /// The feed borrows both the session and the `field` name, so the
    /// returned lifetime is the shorter of the two.
    pub fn render_field<'a>(&'a self, field: &'a str) -> Result<RenderFeed<'a>> {
        let canonical_text = self
            .store
            .canonical_text(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        let segments = self.store.segments(field)?;
        let spans = self.store.list_by_field(field)?;
        let mut links: Vec<&Link> = Vec::new();
        for span in &spans {
            for link in self.links.links_for(span.id) {
                if !links.iter().any(|l| l.id == link.id) {
                    links.push(link);
                }
            }
        }
        links.sort_by_key(|l| l.id);
        Ok(RenderFeed {
            field,
            canonical_text,
            segments,
            spans,
            links,
        })
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Capture the session state for persistence.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            owner: self.owner.clone(),
            project: self.store.project().clone(),
            fields: self
                .store
                .field_names()
                .map(|name| FieldRecord {
                    name: name.to_owned(),
                    text: self
                        .store
                        .canonical_text(name)
                        .unwrap_or_default()
                        .to_owned(),
                })
                .collect(),
            spans: self.store.spans().cloned().collect(),
            links: self.links.links().cloned().collect(),
        }
    }

    /// Rebuild a session from a snapshot, validating every record.
    ///
    /// The restored session reproduces the original's query behavior
    /// exactly: overlap queries, segment lists, and `links_for` all
    /// answer identically.
    pub fn restore(snapshot: SessionSnapshot) -> Result<Self> {
        let mut session = Self::new(snapshot.project, snapshot.owner)?;
        for field in snapshot.fields {
            session.store.add_field(field.name, field.text)?;
        }
        for span in snapshot.spans {
            session.store.insert_restored(span)?;
        }
        for link in snapshot.links {
            session
                .links
                .insert_restored(session.store.project(), &session.store, link)?;
        }
        Ok(session)
    }
}
