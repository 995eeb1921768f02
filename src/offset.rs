//! Reconciling surface selections with canonical character offsets.
//!
//! # The Offset Corruption Problem
//!
//! The text a user selects lives on a rendering surface that already
//! contains markup for previously painted spans: highlight wrappers,
//! label chips, delete buttons. Canonical offsets must be computed
//! against the field's plain text only; counting a single decoration
//! character shifts every subsequent span in the field.
//!
//! ```text
//! canonical:  I am absolutely thrilled today
//!             0    5          16
//!
//! surface:    [I am ][absolutely][×][ thrilled today]
//!              plain   plain      ^decoration: contributes
//!                                  nothing to offsets
//! ```
//!
//! The surface is modelled as ordered [`SurfaceFragment`]s; only
//! non-decoration fragments accumulate canonical offset. Resolution
//! either succeeds exactly or fails with
//! [`TextNotFound`](crate::Error::TextNotFound) — it never guesses,
//! because one wrong offset silently corrupts every span created after
//! it.
//!
//! The hard precondition (validated by [`OffsetMapper::new`]): the
//! concatenated plain text of the surface is character-for-character
//! identical to the canonical text. A surface that normalizes
//! whitespace or trims characters is rejected up front with
//! [`SurfaceMismatch`](crate::Error::SurfaceMismatch).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Character length of a string.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Slice `text` by character offsets `[start, end)`.
///
/// Returns `None` when the offsets exceed the text's character length.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let byte_start = char_to_byte(text, start)?;
    let byte_end = char_to_byte(text, end)?;
    text.get(byte_start..byte_end)
}

/// Convert a character offset to a byte offset. `None` if out of range.
#[must_use]
pub fn char_to_byte(text: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    text.char_indices()
        .nth(char_offset - 1)
        .map(|(byte, c)| byte + c.len_utf8())
}

/// Convert a byte offset (on a char boundary) to a character offset.
#[must_use]
pub fn byte_to_char(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].chars().count()
}

/// One piece of a field's rendering surface, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceFragment {
    /// Text content of this fragment.
    pub text: String,
    /// Decoration fragments (highlight chrome, label chips, delete
    /// affordances) contribute nothing to canonical offsets.
    pub decoration: bool,
}

impl SurfaceFragment {
    /// A plain-text fragment that counts toward canonical offsets.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            decoration: false,
        }
    }

    /// An injected decoration fragment, invisible to offsets.
    #[must_use]
    pub fn decoration(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            decoration: true,
        }
    }
}

/// A position on the rendering surface: a fragment plus a character
/// offset within that fragment's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfacePoint {
    /// Index into the fragment list.
    pub fragment: usize,
    /// Character offset within the fragment.
    pub offset: usize,
}

/// A selection expressed as two surface points. May be backwards
/// (end before start); resolution normalizes the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceRange {
    /// Anchor point of the selection.
    pub start: SurfacePoint,
    /// Focus point of the selection.
    pub end: SurfacePoint,
}

/// Translates surface selections into canonical character offsets for
/// one field.
///
/// Construction verifies the canonical-text contract; a verified mapper
/// cannot produce an offset that disagrees with canonical text.
#[derive(Debug)]
pub struct OffsetMapper<'a> {
    canonical: &'a str,
    fragments: &'a [SurfaceFragment],
    /// Canonical char offset at each fragment start; `None` for
    /// decoration fragments.
    fragment_starts: Vec<Option<usize>>,
}

impl<'a> OffsetMapper<'a> {
    /// Build a mapper over a field's surface, verifying that the plain
    /// fragments reproduce `canonical` exactly.
    pub fn new(canonical: &'a str, fragments: &'a [SurfaceFragment]) -> Result<Self> {
        let mut fragment_starts = Vec::with_capacity(fragments.len());
        let mut cursor = 0usize;
        let mut canonical_chars = canonical.chars();
        for fragment in fragments {
            if fragment.decoration {
                fragment_starts.push(None);
                continue;
            }
            fragment_starts.push(Some(cursor));
            for c in fragment.text.chars() {
                match canonical_chars.next() {
                    Some(expected) if expected == c => cursor += 1,
                    _ => return Err(Error::SurfaceMismatch { at: cursor }),
                }
            }
        }
        if canonical_chars.next().is_some() {
            return Err(Error::SurfaceMismatch { at: cursor });
        }
        Ok(Self {
            canonical,
            fragments,
            fragment_starts,
        })
    }

    /// Canonical text this mapper was built against.
    #[must_use]
    pub fn canonical(&self) -> &str {
        self.canonical
    }

    /// Resolve selected text to canonical offsets.
    ///
    /// When `selected_text` occurs more than once, the occurrence whose
    /// start is nearest to `approximate_position` wins; exact ties
    /// prefer the earlier occurrence, and without a hint the first
    /// occurrence wins. Fails with [`Error::TextNotFound`] when the
    /// selection does not appear verbatim in canonical text (e.g. it
    /// captured decoration content or normalized whitespace).
    pub fn resolve(
        &self,
        selected_text: &str,
        approximate_position: Option<usize>,
    ) -> Result<(usize, usize)> {
        if selected_text.is_empty() {
            return Err(Error::text_not_found(selected_text));
        }
        let width = char_len(selected_text);
        let mut best: Option<(usize, usize)> = None; // (distance, start)
        for (byte_start, _) in self.canonical.match_indices(selected_text) {
            let start = byte_to_char(self.canonical, byte_start);
            let distance = match approximate_position {
                Some(hint) => start.abs_diff(hint),
                None => start,
            };
            match best {
                Some((best_distance, _)) if best_distance <= distance => {}
                _ => best = Some((distance, start)),
            }
        }
        match best {
            Some((_, start)) => Ok((start, start + width)),
            None => Err(Error::text_not_found(selected_text)),
        }
    }

    /// Resolve a surface pointer range to canonical offsets.
    ///
    /// Fails with [`Error::TextNotFound`] when either endpoint sits in a
    /// decoration fragment, and with [`Error::InvalidOffset`] when a
    /// point lies outside its fragment's text.
    pub fn resolve_range(&self, range: &SurfaceRange) -> Result<(usize, usize)> {
        let a = self.resolve_point(&range.start)?;
        let b = self.resolve_point(&range.end)?;
        Ok((a.min(b), a.max(b)))
    }

    fn resolve_point(&self, point: &SurfacePoint) -> Result<usize> {
        let fragment = self
            .fragments
            .get(point.fragment)
            .ok_or(Error::TextNotFound(format!(
                "no surface fragment {}",
                point.fragment
            )))?;
        let base = self.fragment_starts[point.fragment].ok_or_else(|| {
            Error::text_not_found(format!(
                "selection touches decoration fragment {}",
                point.fragment
            ))
        })?;
        let fragment_len = char_len(&fragment.text);
        if point.offset > fragment_len {
            return Err(Error::invalid_offset(
                point.offset,
                point.offset,
                fragment_len,
            ));
        }
        Ok(base + point.offset)
    }
}

/// Standalone canonical-text contract check: verifies that the
/// surface's plain text equals `canonical` without building a mapper.
pub fn verify_surface(canonical: &str, fragments: &[SurfaceFragment]) -> Result<()> {
    OffsetMapper::new(canonical, fragments).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEXT: &str = "I am absolutely very thrilled today";

    fn plain_surface() -> Vec<SurfaceFragment> {
        vec![SurfaceFragment::text(TEXT)]
    }

    #[test]
    fn resolves_unique_selection() {
        let surface = plain_surface();
        let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
        assert_eq!(mapper.resolve("thrilled", None).unwrap(), (21, 29));
    }

    #[test]
    fn missing_selection_fails() {
        let surface = plain_surface();
        let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
        assert!(matches!(
            mapper.resolve("ecstatic", Some(4)),
            Err(Error::TextNotFound(_))
        ));
    }

    #[test]
    fn decoration_does_not_shift_offsets() {
        let surface = vec![
            SurfaceFragment::text("I am "),
            SurfaceFragment::decoration("["),
            SurfaceFragment::text("absolutely"),
            SurfaceFragment::decoration("] (positive)"),
            SurfaceFragment::text(" very thrilled today"),
        ];
        let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
        assert_eq!(mapper.resolve("thrilled", None).unwrap(), (21, 29));
        assert_eq!(mapper.resolve("absolutely", None).unwrap(), (5, 15));
    }

    #[test]
    fn hint_picks_nearest_occurrence() {
        let text = "aba aba aba";
        let surface = vec![SurfaceFragment::text(text)];
        let mapper = OffsetMapper::new(text, &surface).unwrap();
        assert_eq!(mapper.resolve("aba", None).unwrap(), (0, 3));
        assert_eq!(mapper.resolve("aba", Some(5)).unwrap(), (4, 7));
        assert_eq!(mapper.resolve("aba", Some(100)).unwrap(), (8, 11));
        // Equidistant: earlier occurrence wins.
        assert_eq!(mapper.resolve("aba", Some(2)).unwrap(), (0, 3));
    }

    #[test]
    fn surface_divergence_is_rejected() {
        let surface = vec![SurfaceFragment::text("I am  absolutely very thrilled today")];
        let err = OffsetMapper::new(TEXT, &surface).unwrap_err();
        assert!(matches!(err, Error::SurfaceMismatch { at: 5 }));
    }

    #[test]
    fn truncated_surface_is_rejected() {
        let surface = vec![SurfaceFragment::text("I am absolutely")];
        assert!(matches!(
            OffsetMapper::new(TEXT, &surface),
            Err(Error::SurfaceMismatch { at: 15 })
        ));
    }

    #[test]
    fn pointer_range_resolution() {
        let surface = vec![
            SurfaceFragment::text("I am "),
            SurfaceFragment::decoration("[chip]"),
            SurfaceFragment::text("absolutely very thrilled today"),
        ];
        let mapper = OffsetMapper::new(TEXT, &surface).unwrap();
        let range = SurfaceRange {
            start: SurfacePoint { fragment: 2, offset: 16 },
            end: SurfacePoint { fragment: 2, offset: 24 },
        };
        assert_eq!(mapper.resolve_range(&range).unwrap(), (21, 29));

        // Backwards selection normalizes.
        let reversed = SurfaceRange { start: range.end, end: range.start };
        assert_eq!(mapper.resolve_range(&reversed).unwrap(), (21, 29));

        let in_decoration = SurfaceRange {
            start: SurfacePoint { fragment: 1, offset: 1 },
            end: SurfacePoint { fragment: 2, offset: 3 },
        };
        assert!(matches!(
            mapper.resolve_range(&in_decoration),
            Err(Error::TextNotFound(_))
        ));
    }

    #[test]
    fn unicode_offsets_count_chars() {
        let text = "café au lait";
        let surface = vec![SurfaceFragment::text(text)];
        let mapper = OffsetMapper::new(text, &surface).unwrap();
        assert_eq!(mapper.resolve("au", None).unwrap(), (5, 7));
        assert_eq!(char_slice(text, 5, 7), Some("au"));
    }
}
