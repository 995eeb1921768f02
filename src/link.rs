//! Typed relations over span ids.
//!
//! Links reference spans by id only — never by ownership — so a missing
//! id is a validation failure or a cascade trigger, not a crash. The
//! graph maintains a reverse index from span id to the links touching
//! it, keeping [`LinkGraph::links_for`] and cascade deletion cheap.
//!
//! Validation order on creation: arity first, then endpoint liveness,
//! then label compatibility against the project's
//! [`LinkSchema`](crate::schema::LinkSchema), then duplicate detection
//! for the unordered kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::Project;
use crate::span::SpanId;
use crate::store::SpanStore;

/// Unique identifier for a link within a session.
pub type LinkId = u64;

/// The relation type of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Ordered pair: endpoint 0 is the source, endpoint 1 the target.
    Directed,
    /// Unordered pair.
    Undirected,
    /// Unordered set of two or more endpoints.
    Nary,
}

impl LinkKind {
    /// Human-readable name, used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            LinkKind::Directed => "directed",
            LinkKind::Undirected => "undirected",
            LinkKind::Nary => "n-ary",
        }
    }

    /// Whether endpoint order carries meaning.
    #[must_use]
    pub const fn is_ordered(self) -> bool {
        matches!(self, LinkKind::Directed)
    }

    fn check_arity(self, got: usize) -> Result<()> {
        let ok = match self {
            LinkKind::Directed | LinkKind::Undirected => got == 2,
            LinkKind::Nary => got >= 2,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::ArityMismatch {
                kind: self.name(),
                expected: match self {
                    LinkKind::Directed | LinkKind::Undirected => "exactly 2",
                    LinkKind::Nary => "at least 2",
                },
                got,
            })
        }
    }
}

/// A typed relation between two or more spans.
///
/// `endpoints` preserves insertion order for display; equality of
/// undirected and n-ary links is decided on the sorted endpoint set
/// plus label, so two such links with the same members in a different
/// order are the same link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique identifier within the owning session.
    pub id: LinkId,
    /// Relation type.
    pub kind: LinkKind,
    /// Endpoint span ids, in insertion order. For directed links,
    /// index 0 is the source and index 1 the target.
    pub endpoints: Vec<SpanId>,
    /// Link label (declared by a [`LinkSchema`](crate::schema::LinkSchema)).
    pub label: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Link {
    /// Source span of a directed link.
    #[must_use]
    pub fn source(&self) -> Option<SpanId> {
        self.kind.is_ordered().then(|| self.endpoints[0])
    }

    /// Target span of a directed link.
    #[must_use]
    pub fn target(&self) -> Option<SpanId> {
        self.kind.is_ordered().then(|| self.endpoints[1])
    }

    /// Whether this link references the given span.
    #[must_use]
    pub fn references(&self, span: SpanId) -> bool {
        self.endpoints.contains(&span)
    }

    /// Identity key for the unordered kinds: sorted endpoint set.
    fn unordered_key(&self) -> Vec<SpanId> {
        let mut key = self.endpoints.clone();
        key.sort_unstable();
        key.dedup();
        key
    }
}

/// What a span-deletion cascade did to the graph.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeOutcome {
    /// Links removed entirely (binary links, or n-ary links whose
    /// arity would have dropped below 2).
    pub removed: Vec<LinkId>,
    /// N-ary links that survived with the endpoint spliced out.
    pub trimmed: Vec<LinkId>,
}

/// The relation layer over one session's spans.
#[derive(Debug, Clone, Default)]
pub struct LinkGraph {
    links: BTreeMap<LinkId, Link>,
    by_span: HashMap<SpanId, Vec<LinkId>>,
    next_link_id: LinkId,
}

impl LinkGraph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Check if the graph holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Validate and create a link over live spans.
    pub fn create_link(
        &mut self,
        project: &Project,
        store: &SpanStore,
        kind: LinkKind,
        endpoints: &[SpanId],
        label: &str,
    ) -> Result<Link> {
        self.validate(project, store, kind, endpoints, label, |id| {
            store.get(id).map(|s| s.label.clone())
        })?;
        if !kind.is_ordered() {
            let mut key: Vec<SpanId> = endpoints.to_vec();
            key.sort_unstable();
            key.dedup();
            if let Some(existing) = self
                .links
                .values()
                .find(|l| l.kind == kind && l.label == label && l.unordered_key() == key)
            {
                return Err(Error::DuplicateLink(existing.id));
            }
        }

        let id = self.next_link_id;
        self.next_link_id += 1;
        let link = Link {
            id,
            kind,
            endpoints: endpoints.to_vec(),
            label: label.to_owned(),
            created_at: Utc::now(),
        };
        self.index_link(&link);
        self.links.insert(id, link.clone());
        debug!(id, kind = kind.name(), label, "link created");
        Ok(link)
    }

    /// Delete a link explicitly.
    pub fn delete_link(&mut self, id: LinkId) -> Result<()> {
        let link = self.links.remove(&id).ok_or(Error::LinkNotFound(id))?;
        self.unindex_link(&link);
        debug!(id, "link deleted");
        Ok(())
    }

    /// Look up a live link.
    #[must_use]
    pub fn get(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// All links referencing a span, in creation order.
    #[must_use]
    pub fn links_for(&self, span: SpanId) -> Vec<&Link> {
        let mut ids = self.by_span.get(&span).cloned().unwrap_or_default();
        ids.sort_unstable();
        ids.iter().filter_map(|id| self.links.get(id)).collect()
    }

    /// All live links in creation order.
    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Cascade a span deletion through the graph.
    ///
    /// Binary links referencing the span are removed; n-ary links drop
    /// the endpoint and survive while at least two remain. A trimmed
    /// link whose endpoint set and label now coincide with another live
    /// link of the same kind collapses into it: the pre-existing link
    /// holds that identity, the trimmed one is removed.
    pub fn on_span_deleted(&mut self, span: SpanId) -> CascadeOutcome {
        let mut outcome = CascadeOutcome::default();
        let Some(ids) = self.by_span.remove(&span) else {
            return outcome;
        };
        for id in ids {
            let trimmed = match self.links.get_mut(&id) {
                None => continue,
                Some(link) if link.kind == LinkKind::Nary => {
                    link.endpoints.retain(|&e| e != span);
                    link.endpoints.len() >= 2
                }
                Some(_) => false,
            };
            let survives = trimmed && !self.has_live_twin(id);
            if survives {
                outcome.trimmed.push(id);
            } else if let Some(link) = self.links.remove(&id) {
                // by_span entry for the deleted span is already gone;
                // clear the entries of the remaining endpoints.
                self.unindex_link(&link);
                outcome.removed.push(id);
            }
        }
        if !outcome.removed.is_empty() || !outcome.trimmed.is_empty() {
            debug!(
                span,
                removed = outcome.removed.len(),
                trimmed = outcome.trimmed.len(),
                "span deletion cascaded into links"
            );
        }
        outcome
    }

    /// Check that a span could take `new_label` without invalidating
    /// any link that references it.
    pub fn check_relabel(
        &self,
        project: &Project,
        store: &SpanStore,
        span: SpanId,
        new_label: &str,
    ) -> Result<()> {
        for link in self.links_for(span) {
            self.validate(project, store, link.kind, &link.endpoints, &link.label, |id| {
                if id == span {
                    Some(new_label.to_owned())
                } else {
                    store.get(id).map(|s| s.label.clone())
                }
            })?;
        }
        Ok(())
    }

    /// Re-insert a persisted link, keeping its id and timestamp.
    ///
    /// Runs full creation validation (including duplicate detection)
    /// against the already-restored spans.
    pub fn insert_restored(
        &mut self,
        project: &Project,
        store: &SpanStore,
        link: Link,
    ) -> Result<()> {
        if self.links.contains_key(&link.id) {
            return Err(Error::corrupt(format!("duplicate link id {}", link.id)));
        }
        self.validate(project, store, link.kind, &link.endpoints, &link.label, |id| {
            store.get(id).map(|s| s.label.clone())
        })?;
        if !link.kind.is_ordered() {
            let key = link.unordered_key();
            if let Some(existing) = self
                .links
                .values()
                .find(|l| l.kind == link.kind && l.label == link.label && l.unordered_key() == key)
            {
                return Err(Error::DuplicateLink(existing.id));
            }
        }
        self.next_link_id = self.next_link_id.max(link.id + 1);
        self.index_link(&link);
        self.links.insert(link.id, link);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Arity, endpoint liveness, then label compatibility, in that order.
    fn validate(
        &self,
        project: &Project,
        store: &SpanStore,
        kind: LinkKind,
        endpoints: &[SpanId],
        label: &str,
        span_label: impl Fn(SpanId) -> Option<String>,
    ) -> Result<()> {
        kind.check_arity(endpoints.len())?;
        for &endpoint in endpoints {
            if store.get(endpoint).is_none() {
                return Err(Error::InvalidEndpoint(endpoint));
            }
        }
        let schema = project
            .link_schema(label)
            .ok_or_else(|| Error::unknown_label(label, "links"))?;
        let labels: Vec<String> = endpoints
            .iter()
            .map(|&id| span_label(id).ok_or(Error::InvalidEndpoint(id)))
            .collect::<Result<_>>()?;
        let label_refs: Vec<&str> = labels.iter().map(String::as_str).collect();
        if !schema.allows(kind, &label_refs) {
            return Err(Error::IncompatibleLabels {
                source_label: label_refs.first().map(|&s| s.to_owned()).unwrap_or_default(),
                target_label: label_refs.get(1).map(|&s| s.to_owned()).unwrap_or_default(),
                link_label: label.to_owned(),
            });
        }
        Ok(())
    }

    fn index_link(&mut self, link: &Link) {
        for &endpoint in &link.endpoints {
            let ids = self.by_span.entry(endpoint).or_default();
            if !ids.contains(&link.id) {
                ids.push(link.id);
            }
        }
    }

    fn has_live_twin(&self, id: LinkId) -> bool {
        let Some(link) = self.links.get(&id) else {
            return false;
        };
        let key = link.unordered_key();
        self.links.values().any(|other| {
            other.id != id
                && other.kind == link.kind
                && other.label == link.label
                && other.unordered_key() == key
        })
    }

    fn unindex_link(&mut self, link: &Link) {
        for &endpoint in &link.endpoints {
            if let Some(ids) = self.by_span.get_mut(&endpoint) {
                ids.retain(|&id| id != link.id);
                if ids.is_empty() {
                    self.by_span.remove(&endpoint);
                }
            }
        }
    }
}
