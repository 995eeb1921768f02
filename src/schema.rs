//! Annotation schemas: the label vocabulary and validity rules a project
//! declares up front.
//!
//! A project declares:
//! - [`SpanSchema`]s: for one field, the set of labels spans may carry
//!   and whether same-label spans may overlap.
//! - [`LinkSchema`]s: for one link label, the allow-list of
//!   `(source_label, target_label)` pairs for binary links and the
//!   member-label set for n-ary links.
//!
//! Compatibility is an explicit allow-list, never inferred: a directed
//! pair `(A, B)` does not imply `(B, A)`. Undirected links accept a pair
//! if either orientation is declared, because an undirected link has no
//! source to give the table an orientation.
//!
//! [`Project::validate`] reports structural problems (duplicate names,
//! labels referenced but never declared) as [`ValidationIssue`]s so the
//! loading layer can reject a bad configuration before any annotation is
//! attempted.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::link::LinkKind;

/// Span label declarations for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanSchema {
    /// Schema name (referenced by `Span::schema`).
    pub name: String,
    /// Name of the field this schema annotates.
    pub field: String,
    /// Declared labels.
    pub labels: Vec<String>,
    /// Whether two spans with the same label may overlap.
    #[serde(default)]
    pub allow_same_label_overlap: bool,
}

impl SpanSchema {
    /// Declare a span schema over a field.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        labels: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            labels: labels.into_iter().map(Into::into).collect(),
            allow_same_label_overlap: false,
        }
    }

    /// Permit overlapping spans with the same label.
    #[must_use]
    pub fn with_same_label_overlap(mut self) -> Self {
        self.allow_same_label_overlap = true;
        self
    }

    /// Whether `label` is declared by this schema.
    #[must_use]
    pub fn declares(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Compatibility declarations for one link label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSchema {
    /// The link label (e.g. "causes", "same-as").
    pub label: String,
    /// Allowed `(source_label, target_label)` pairs for binary links.
    #[serde(default)]
    pub compatible_pairs: HashSet<(String, String)>,
    /// Allowed endpoint labels for n-ary links.
    #[serde(default)]
    pub nary_labels: HashSet<String>,
}

impl LinkSchema {
    /// Declare a link schema with no compatible pairs yet.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            compatible_pairs: HashSet::new(),
            nary_labels: HashSet::new(),
        }
    }

    /// Declare a `(source, target)` pair as compatible. Order matters;
    /// declare the reciprocal pair explicitly if it is also valid.
    #[must_use]
    pub fn with_pair(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.compatible_pairs.insert((source.into(), target.into()));
        self
    }

    /// Declare a label as a valid n-ary member.
    #[must_use]
    pub fn with_nary_label(mut self, label: impl Into<String>) -> Self {
        self.nary_labels.insert(label.into());
        self
    }

    /// Whether the endpoint labels satisfy this schema for `kind`.
    #[must_use]
    pub fn allows(&self, kind: LinkKind, endpoint_labels: &[&str]) -> bool {
        match kind {
            LinkKind::Directed => {
                let [source, target] = endpoint_labels else {
                    return false;
                };
                self.allows_pair(source, target)
            }
            LinkKind::Undirected => {
                let [a, b] = endpoint_labels else {
                    return false;
                };
                // No orientation to apply the table with.
                self.allows_pair(a, b) || self.allows_pair(b, a)
            }
            LinkKind::Nary => endpoint_labels
                .iter()
                .all(|label| self.nary_labels.contains(*label)),
        }
    }

    fn allows_pair(&self, source: &str, target: &str) -> bool {
        self.compatible_pairs
            .iter()
            .any(|(s, t)| s == source && t == target)
    }
}

/// A structural problem found by [`Project::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationIssue {
    /// Two span schemas share a name.
    DuplicateSchema(String),
    /// Two link schemas share a label.
    DuplicateLinkLabel(String),
    /// A span schema declares no labels.
    EmptyLabelSet(String),
    /// A link schema references a span label no span schema declares.
    UndeclaredLabel {
        /// The link schema's label.
        link_label: String,
        /// The span label that is nowhere declared.
        span_label: String,
    },
}

/// The full annotation configuration for a project: span schemas plus
/// link schemas. Shared read-only by every session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Span schemas, one or more per field.
    pub span_schemas: Vec<SpanSchema>,
    /// Link schemas, one per link label.
    pub link_schemas: Vec<LinkSchema>,
}

impl Project {
    /// Create an empty project.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a span schema.
    #[must_use]
    pub fn with_span_schema(mut self, schema: SpanSchema) -> Self {
        self.span_schemas.push(schema);
        self
    }

    /// Add a link schema.
    #[must_use]
    pub fn with_link_schema(mut self, schema: LinkSchema) -> Self {
        self.link_schemas.push(schema);
        self
    }

    /// Look up a span schema by name.
    #[must_use]
    pub fn span_schema(&self, name: &str) -> Option<&SpanSchema> {
        self.span_schemas.iter().find(|s| s.name == name)
    }

    /// Look up a link schema by link label.
    #[must_use]
    pub fn link_schema(&self, label: &str) -> Option<&LinkSchema> {
        self.link_schemas.iter().find(|s| s.label == label)
    }

    /// Report structural issues. An empty report means the project is
    /// safe to annotate against.
    #[must_use]
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let mut seen = HashSet::new();
        for schema in &self.span_schemas {
            if !seen.insert(schema.name.as_str()) {
                issues.push(ValidationIssue::DuplicateSchema(schema.name.clone()));
            }
            if schema.labels.is_empty() {
                issues.push(ValidationIssue::EmptyLabelSet(schema.name.clone()));
            }
        }

        let declared: HashSet<&str> = self
            .span_schemas
            .iter()
            .flat_map(|s| s.labels.iter().map(String::as_str))
            .collect();

        let mut seen_links = HashSet::new();
        for link in &self.link_schemas {
            if !seen_links.insert(link.label.as_str()) {
                issues.push(ValidationIssue::DuplicateLinkLabel(link.label.clone()));
            }
            let referenced = link
                .compatible_pairs
                .iter()
                .flat_map(|(s, t)| [s.as_str(), t.as_str()])
                .chain(link.nary_labels.iter().map(String::as_str));
            for span_label in referenced {
                if !declared.contains(span_label) {
                    issues.push(ValidationIssue::UndeclaredLabel {
                        link_label: link.label.clone(),
                        span_label: span_label.to_owned(),
                    });
                }
            }
        }
        issues
    }
}
