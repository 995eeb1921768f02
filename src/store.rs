//! Per-session span storage: canonical text, interval indices, and the
//! segment cache, one field at a time.
//!
//! The store is the single owner of its spans and of one
//! [`IntervalIndex`] per field; fields never share an index, so spans in
//! different fields are entirely independent. Every mutation validates
//! before it touches the index — a failed call leaves store and index
//! exactly as they were — and recomputes the affected field's segment
//! list before returning, so callers can read
//! [`SpanStore::segments`] immediately after any mutation without ever
//! observing a torn state.
//!
//! Stored offsets are immutable: [`SpanStore::update`] is the only way
//! to change a span, and it reinserts the interval into the index as
//! part of the same call.

use std::collections::BTreeMap;
use tracing::debug;

use crate::error::{Error, Result};
use crate::interval::IntervalIndex;
use crate::schema::Project;
use crate::segment::{render_segments, Segment};
use crate::span::{Span, SpanId};

/// A partial update to an existing span. Unset fields keep their
/// current value.
#[derive(Debug, Clone, Default)]
pub struct SpanPatch {
    /// New label, if changing.
    pub label: Option<String>,
    /// New start offset, if changing.
    pub start: Option<usize>,
    /// New end offset, if changing.
    pub end: Option<usize>,
}

impl SpanPatch {
    /// An empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Change the offsets (drag-resize).
    #[must_use]
    pub const fn range(mut self, start: usize, end: usize) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }
}

#[derive(Debug, Clone)]
struct FieldState {
    canonical: String,
    /// Character length of `canonical`, cached.
    text_len: usize,
    index: IntervalIndex,
    /// Recomputed synchronously on every mutation of this field.
    segments: Vec<Segment>,
}

/// Ordered collection of [`Span`]s for one annotator session, indexed
/// per field.
#[derive(Debug, Clone)]
pub struct SpanStore {
    project: Project,
    fields: BTreeMap<String, FieldState>,
    spans: BTreeMap<SpanId, Span>,
    next_span_id: SpanId,
}

impl SpanStore {
    /// Create an empty store over a project's schemas.
    #[must_use]
    pub fn new(project: Project) -> Self {
        Self {
            project,
            fields: BTreeMap::new(),
            spans: BTreeMap::new(),
            next_span_id: 0,
        }
    }

    /// The project schemas this store validates against.
    #[must_use]
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// Register a field with its canonical text.
    ///
    /// Fields come from instance load; a duplicate name there is bad
    /// load data, rejected as [`Error::Corrupt`].
    pub fn add_field(&mut self, name: impl Into<String>, canonical: impl Into<String>) -> Result<()> {
        let name = name.into();
        if self.fields.contains_key(&name) {
            return Err(Error::corrupt(format!("field {name:?} declared twice")));
        }
        let canonical = canonical.into();
        let text_len = crate::offset::char_len(&canonical);
        let segments = render_segments(&[], text_len);
        self.fields.insert(
            name,
            FieldState {
                canonical,
                text_len,
                index: IntervalIndex::new(),
                segments,
            },
        );
        Ok(())
    }

    /// Create a span from validated canonical offsets.
    ///
    /// Validation order: field, schema, label, offsets, overlap policy.
    /// Nothing is inserted unless every check passes.
    pub fn create(
        &mut self,
        field: &str,
        start: usize,
        end: usize,
        label: &str,
        schema: &str,
        owner: &str,
    ) -> Result<Span> {
        self.validate_span(field, start, end, label, schema, None)?;
        let id = self.next_span_id;
        self.next_span_id += 1;
        let span = Span::new(id, field, start, end, label, schema, owner);
        self.insert_unchecked(span.clone());
        debug!(id, field, start, end, label, "span created");
        Ok(span)
    }

    /// Apply a label or offset change to a live span.
    ///
    /// The span keeps its id; an offset change reinserts the interval
    /// in the field's index within the same call.
    pub fn update(&mut self, id: SpanId, patch: SpanPatch) -> Result<Span> {
        let current = self.spans.get(&id).ok_or(Error::SpanNotFound(id))?;
        let field = current.field.clone();
        let schema = current.schema.clone();
        let start = patch.start.unwrap_or(current.start);
        let end = patch.end.unwrap_or(current.end);
        let label = patch.label.unwrap_or_else(|| current.label.clone());
        self.validate_span(&field, start, end, &label, &schema, Some(id))?;

        let span = self.spans.get_mut(&id).ok_or(Error::SpanNotFound(id))?;
        let offsets_changed = span.start != start || span.end != end;
        span.start = start;
        span.end = end;
        span.label = label;
        let updated = span.clone();
        if offsets_changed {
            let state = self
                .fields
                .get_mut(&field)
                .ok_or_else(|| Error::FieldNotFound(field.clone()))?;
            state.index.remove(id);
            state.index.insert(id, start, end);
        }
        self.recompute_segments(&field);
        debug!(id, start, end, "span updated");
        Ok(updated)
    }

    /// Delete a span. Returns `false` if the id is not live.
    ///
    /// The owning session cascades the deletion into its link graph.
    pub fn delete(&mut self, id: SpanId) -> bool {
        let Some(span) = self.spans.remove(&id) else {
            return false;
        };
        if let Some(state) = self.fields.get_mut(&span.field) {
            state.index.remove(id);
        }
        self.recompute_segments(&span.field);
        debug!(id, field = %span.field, "span deleted");
        true
    }

    /// Look up a live span.
    #[must_use]
    pub fn get(&self, id: SpanId) -> Option<&Span> {
        self.spans.get(&id)
    }

    /// All spans in a field, ascending by `(start, end, creation order)`.
    pub fn list_by_field(&self, field: &str) -> Result<Vec<&Span>> {
        let state = self
            .fields
            .get(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        Ok(state
            .index
            .iter()
            .filter_map(|entry| self.spans.get(&entry.id))
            .collect())
    }

    /// All spans belonging to `owner`, in creation order, across fields.
    #[must_use]
    pub fn list_by_owner(&self, owner: &str) -> Vec<&Span> {
        self.spans.values().filter(|s| s.owner == owner).collect()
    }

    /// Spans in `field` whose interval intersects `[start, end)`,
    /// ascending. Delegates to the field's interval index.
    pub fn overlaps(&self, field: &str, start: usize, end: usize) -> Result<Vec<&Span>> {
        let state = self
            .fields
            .get(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        Ok(state
            .index
            .query_overlapping(start, end)
            .into_iter()
            .filter_map(|id| self.spans.get(&id))
            .collect())
    }

    /// The current segment decomposition of a field. Always consistent
    /// with the last completed mutation.
    pub fn segments(&self, field: &str) -> Result<&[Segment]> {
        self.fields
            .get(field)
            .map(|state| state.segments.as_slice())
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))
    }

    /// Canonical text of a field.
    #[must_use]
    pub fn canonical_text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(|state| state.canonical.as_str())
    }

    /// Character length of a field's canonical text.
    #[must_use]
    pub fn text_len(&self, field: &str) -> Option<usize> {
        self.fields.get(field).map(|state| state.text_len)
    }

    /// Names of all registered fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// All live spans in creation order.
    pub fn spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.values()
    }

    /// Number of live spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Check if the store holds no spans.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Re-insert a persisted span, keeping its id and timestamp.
    ///
    /// Runs the full create-path validation; persisted data that fails
    /// it is rejected before anything reaches the index.
    pub fn insert_restored(&mut self, span: Span) -> Result<()> {
        if self.spans.contains_key(&span.id) {
            return Err(Error::corrupt(format!("duplicate span id {}", span.id)));
        }
        self.validate_span(&span.field, span.start, span.end, &span.label, &span.schema, None)?;
        self.next_span_id = self.next_span_id.max(span.id + 1);
        self.insert_unchecked(span);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn validate_span(
        &self,
        field: &str,
        start: usize,
        end: usize,
        label: &str,
        schema_name: &str,
        exclude: Option<SpanId>,
    ) -> Result<()> {
        let state = self
            .fields
            .get(field)
            .ok_or_else(|| Error::FieldNotFound(field.to_owned()))?;
        let schema = self
            .project
            .span_schema(schema_name)
            .filter(|s| s.field == field)
            .ok_or_else(|| Error::SchemaNotFound(schema_name.to_owned()))?;
        if !schema.declares(label) {
            return Err(Error::unknown_label(label, schema_name));
        }
        if start >= end || end > state.text_len {
            return Err(Error::invalid_offset(start, end, state.text_len));
        }
        if !schema.allow_same_label_overlap {
            let clash = state
                .index
                .query_overlapping(start, end)
                .into_iter()
                .filter(|id| Some(*id) != exclude)
                .filter_map(|id| self.spans.get(&id))
                .any(|other| other.label == label && other.schema == schema_name);
            if clash {
                return Err(Error::OverlapDisallowed {
                    start,
                    end,
                    label: label.to_owned(),
                });
            }
        }
        Ok(())
    }

    /// Insert a validated span and bring index + segment cache in sync.
    fn insert_unchecked(&mut self, span: Span) {
        let field = span.field.clone();
        if let Some(state) = self.fields.get_mut(&field) {
            state.index.insert(span.id, span.start, span.end);
        }
        self.spans.insert(span.id, span);
        self.recompute_segments(&field);
    }

    fn recompute_segments(&mut self, field: &str) {
        let Some(state) = self.fields.get(field) else {
            return;
        };
        let text_len = state.text_len;
        // Creation order = id order, which is the stacking order.
        let field_spans: Vec<Span> = self
            .spans
            .values()
            .filter(|s| s.field == field)
            .cloned()
            .collect();
        let segments = render_segments(&field_spans, text_len);
        if let Some(state) = self.fields.get_mut(field) {
            state.segments = segments;
        }
    }
}
