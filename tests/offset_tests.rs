//! Selection resolution scenarios for the offset mapper.

use notate::{verify_surface, Error, OffsetMapper, SurfaceFragment, SurfacePoint, SurfaceRange};

const TEXT: &str = "I am absolutely very thrilled today";

/// A surface as the display layer would present it after one span
/// ("absolutely") has already been rendered with decoration chrome.
fn decorated_surface() -> Vec<SurfaceFragment> {
    vec![
        SurfaceFragment::text("I am "),
        SurfaceFragment::decoration("<mark class=\"positive\">"),
        SurfaceFragment::text("absolutely"),
        SurfaceFragment::decoration("</mark><button>x</button>"),
        SurfaceFragment::text(" very thrilled today"),
    ]
}

#[test]
fn selection_resolves_against_canonical_offsets() {
    let surface = decorated_surface();
    let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
    assert_eq!(mapper.resolve("thrilled", None).unwrap(), (21, 29));
}

#[test]
fn prior_markup_never_shifts_offsets() {
    let plain = vec![SurfaceFragment::text(TEXT)];
    let decorated = decorated_surface();
    let plain_mapper = OffsetMapper::new(TEXT, &plain).unwrap();
    let decorated_mapper = OffsetMapper::new(TEXT, &decorated).unwrap();
    for needle in ["I am", "absolutely", "thrilled", "today", " "] {
        assert_eq!(
            plain_mapper.resolve(needle, None).unwrap(),
            decorated_mapper.resolve(needle, None).unwrap(),
            "offsets diverged for {needle:?}"
        );
    }
}

#[test]
fn verbatim_mismatch_is_text_not_found() {
    let surface = decorated_surface();
    let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
    // Selection captured decoration content.
    assert!(matches!(
        mapper.resolve("absolutely</mark>", None),
        Err(Error::TextNotFound(_))
    ));
    // Whitespace normalization differs.
    assert!(matches!(
        mapper.resolve("absolutely  thrilled", None),
        Err(Error::TextNotFound(_))
    ));
    // Empty selections resolve to nothing.
    assert!(matches!(mapper.resolve("", None), Err(Error::TextNotFound(_))));
}

#[test]
fn divergent_surface_is_rejected_up_front() {
    assert!(verify_surface(TEXT, &decorated_surface()).is_ok());
    // The surface appended a trailing space: contract violation.
    let surface = vec![SurfaceFragment::text("I am absolutely very thrilled today ")];
    assert!(matches!(
        OffsetMapper::new(TEXT, &surface),
        Err(Error::SurfaceMismatch { at: 35 })
    ));
    assert!(verify_surface(TEXT, &surface).is_err());
}

#[test]
fn repeated_text_uses_the_position_hint() {
    let text = "the cat saw the cat saw the cat";
    let surface = vec![SurfaceFragment::text(text)];
    let mapper = OffsetMapper::new(text, &surface).unwrap();
    assert_eq!(mapper.resolve("the cat", None).unwrap(), (0, 7));
    assert_eq!(mapper.resolve("the cat", Some(14)).unwrap(), (12, 19));
    assert_eq!(mapper.resolve("the cat", Some(30)).unwrap(), (24, 31));
}

#[test]
fn pointer_range_spanning_fragments_resolves() {
    let surface = decorated_surface();
    let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
    // From "abso|lutely" to " very thr|illed": fragment-relative points.
    let range = SurfaceRange {
        start: SurfacePoint { fragment: 2, offset: 4 },
        end: SurfacePoint { fragment: 4, offset: 9 },
    };
    assert_eq!(mapper.resolve_range(&range).unwrap(), (9, 24));
}

#[test]
fn pointer_in_decoration_fails() {
    let surface = decorated_surface();
    let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
    let range = SurfaceRange {
        start: SurfacePoint { fragment: 1, offset: 2 },
        end: SurfacePoint { fragment: 2, offset: 5 },
    };
    assert!(matches!(
        mapper.resolve_range(&range),
        Err(Error::TextNotFound(_))
    ));
}

#[test]
fn unicode_selection_counts_characters() {
    let text = "naïve café critique";
    let surface = vec![
        SurfaceFragment::text("naïve "),
        SurfaceFragment::decoration("‹"),
        SurfaceFragment::text("café"),
        SurfaceFragment::decoration("›"),
        SurfaceFragment::text(" critique"),
    ];
    let mapper = OffsetMapper::new(text, &surface).unwrap();
    assert_eq!(mapper.resolve("café", None).unwrap(), (6, 10));
    assert_eq!(mapper.resolve("critique", None).unwrap(), (11, 19));
}
