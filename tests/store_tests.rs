//! Store-level behavior: validation atomicity, overlap policy, and the
//! synchronous segment cache, exercised through the session API.

use notate::{
    AnnotationSession, Error, LinkSchema, Project, Selection, SpanPatch, SpanSchema,
    SurfaceFragment,
};

const TEXT: &str = "I am absolutely thrilled today";

fn session() -> AnnotationSession {
    let project = Project::new()
        .with_span_schema(SpanSchema::new("sentiment", "text", ["positive", "strong"]))
        .with_span_schema(
            SpanSchema::new("emphasis", "title", ["shout"]).with_same_label_overlap(),
        )
        .with_link_schema(LinkSchema::new("intensifies").with_pair("strong", "positive"));
    let mut session = AnnotationSession::new(project, "alice").unwrap();
    session.add_field("text", TEXT).unwrap();
    session.add_field("title", "Feelings").unwrap();
    session
}

#[test]
fn end_to_end_selection_to_segments() {
    let mut session = session();
    let surface = vec![SurfaceFragment::text(TEXT)];
    let positive = session
        .annotate("text", &surface, &Selection::new("absolutely"), "sentiment", "positive")
        .unwrap();
    assert_eq!((positive.start, positive.end), (5, 15));

    let strong = session.create_span("text", 8, 20, "strong", "sentiment").unwrap();

    let segments = session.store().segments("text").unwrap();
    assert_eq!(segments.len(), 5);
    assert_eq!((segments[0].start, segments[0].end), (0, 5));
    assert!(segments[0].active_span_ids.is_empty());
    assert_eq!(segments[1].active_span_ids, vec![positive.id]);
    assert_eq!(segments[2].active_span_ids, vec![positive.id, strong.id]);
    assert_eq!(segments[3].active_span_ids, vec![strong.id]);
    assert_eq!((segments[4].start, segments[4].end), (20, 30));
}

#[test]
fn fields_are_independent() {
    let mut session = session();
    session.create_span("text", 5, 15, "positive", "sentiment").unwrap();
    let title_span = session.create_span("title", 0, 8, "shout", "emphasis").unwrap();
    // The text field's index never sees the title span.
    assert!(session.store().overlaps("text", 0, 30).unwrap().len() == 1);
    let title_overlaps = session.store().overlaps("title", 0, 8).unwrap();
    assert_eq!(title_overlaps.len(), 1);
    assert_eq!(title_overlaps[0].id, title_span.id);
    // Schemas are bound to their field.
    assert!(matches!(
        session.create_span("title", 0, 4, "positive", "sentiment"),
        Err(Error::SchemaNotFound(_))
    ));
}

#[test]
fn failed_mutations_leave_no_trace() {
    let mut session = session();
    let span = session.create_span("text", 5, 15, "positive", "sentiment").unwrap();
    let segments_before = session.store().segments("text").unwrap().to_vec();
    let count_before = session.store().len();

    // Invalid offsets.
    assert!(session.create_span("text", 15, 12, "positive", "sentiment").is_err());
    // Same-label overlap.
    assert!(session.create_span("text", 10, 20, "positive", "sentiment").is_err());
    // Unknown label.
    assert!(session.create_span("text", 16, 20, "negative", "sentiment").is_err());
    // Overlapping resize of a brand-new span onto the existing label.
    let other = session.create_span("text", 16, 20, "positive", "sentiment").unwrap();
    assert!(session.update_span(other.id, SpanPatch::new().range(10, 20)).is_err());
    session.delete_span(other.id);

    assert_eq!(session.store().len(), count_before);
    assert_eq!(session.store().segments("text").unwrap(), segments_before.as_slice());
    assert_eq!(session.store().get(span.id).unwrap().range(), 5..15);
}

#[test]
fn owner_scoped_reads() {
    let mut alice = session();
    alice.create_span("text", 5, 15, "positive", "sentiment").unwrap();
    let spans = alice.store().list_by_owner("alice");
    assert_eq!(spans.len(), 1);
    assert!(alice.store().list_by_owner("bob").is_empty());
}

#[test]
fn cross_session_aggregation_is_read_only() {
    // Review tooling pattern: two sessions over the same instance,
    // aggregated through read methods only.
    let mut alice = session();
    let mut bob = {
        let project = alice.store().project().clone();
        let mut s = AnnotationSession::new(project, "bob").unwrap();
        s.add_field("text", TEXT).unwrap();
        s.add_field("title", "Feelings").unwrap();
        s
    };
    alice.create_span("text", 5, 15, "positive", "sentiment").unwrap();
    bob.create_span("text", 5, 15, "strong", "sentiment").unwrap();

    let sessions = [&alice, &bob];
    let total: usize = sessions
        .iter()
        .map(|s| s.store().list_by_field("text").unwrap().len())
        .sum();
    assert_eq!(total, 2);
    let labels: Vec<&str> = sessions
        .iter()
        .flat_map(|s| s.store().list_by_field("text").unwrap())
        .map(|span| span.label.as_str())
        .collect();
    assert_eq!(labels, vec!["positive", "strong"]);
}

#[test]
fn drag_resize_updates_overlap_queries() {
    let mut session = session();
    let span = session.create_span("text", 5, 15, "positive", "sentiment").unwrap();
    session.update_span(span.id, SpanPatch::new().range(21, 29)).unwrap();
    assert!(session.store().overlaps("text", 5, 15).unwrap().is_empty());
    let hits = session.store().overlaps("text", 25, 26).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, span.id);
    // Segment cache followed the move synchronously.
    let segments = session.store().segments("text").unwrap();
    assert_eq!(
        segments.iter().find(|s| !s.active_span_ids.is_empty()).map(|s| (s.start, s.end)),
        Some((21, 29))
    );
}
