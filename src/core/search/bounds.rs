//! Hamming distance bounds for the candidate prefilter.

use crate::core::fingerprint::HASH_BITS;
use crate::core::format::FormatCategory;
use serde::{Deserialize, Serialize};

/// Maximum distances a record may have to the query and still be verified.
///
/// A record passes when *either* hash is within its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashBounds {
    pub average: u32,
    pub perceptual: u32,
}

impl HashBounds {
    pub const fn new(average: u32, perceptual: u32) -> Self {
        Self { average, perceptual }
    }

    /// Both files came out of the same kind of pipeline
    pub const fn strict() -> Self {
        Self::new(10, 12)
    }

    /// RAW against a processed export
    pub const fn relaxed() -> Self {
        Self::new(20, 20)
    }

    /// Every record passes
    pub const fn disabled() -> Self {
        Self::new(HASH_BITS, HASH_BITS)
    }

    pub fn admits(&self, average_distance: u32, perceptual_distance: u32) -> bool {
        average_distance <= self.average || perceptual_distance <= self.perceptual
    }
}

/// How the formats of the query and a candidate relate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatRelation {
    /// Both RAW, or both non-RAW
    SameClass,
    /// Exactly one side is RAW
    CrossFormat,
}

impl FormatRelation {
    pub fn between(query: FormatCategory, candidate: FormatCategory) -> Self {
        let rendered = |category: FormatCategory| {
            matches!(category, FormatCategory::Standard | FormatCategory::Tiff)
        };

        if (query.is_raw() && rendered(candidate)) || (candidate.is_raw() && rendered(query)) {
            FormatRelation::CrossFormat
        } else {
            FormatRelation::SameClass
        }
    }

    pub fn is_cross_format(&self) -> bool {
        matches!(self, FormatRelation::CrossFormat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn either_hash_within_bound_admits() {
        let bounds = HashBounds::strict();
        assert!(bounds.admits(10, 64));
        assert!(bounds.admits(64, 12));
        assert!(!bounds.admits(11, 13));
    }

    #[test]
    fn disabled_bounds_admit_everything() {
        assert!(HashBounds::disabled().admits(HASH_BITS, HASH_BITS));
    }

    #[test]
    fn relaxed_is_wider_than_strict() {
        let (strict, relaxed) = (HashBounds::strict(), HashBounds::relaxed());
        assert!(relaxed.average > strict.average);
        assert!(relaxed.perceptual > strict.perceptual);
    }

    #[test]
    fn relaxed_bounds_stop_at_twenty_bits() {
        let relaxed = HashBounds::relaxed();
        assert!(relaxed.admits(20, HASH_BITS));
        assert!(relaxed.admits(HASH_BITS, 20));
        assert!(!relaxed.admits(21, 21));
    }

    #[test]
    fn relation_is_cross_only_for_raw_against_rendered() {
        use FormatCategory::*;

        assert_eq!(FormatRelation::between(Raw, Standard), FormatRelation::CrossFormat);
        assert_eq!(FormatRelation::between(Standard, Raw), FormatRelation::CrossFormat);
        assert_eq!(FormatRelation::between(Tiff, Raw), FormatRelation::CrossFormat);
        assert_eq!(FormatRelation::between(Raw, Raw), FormatRelation::SameClass);
        assert_eq!(FormatRelation::between(Standard, Tiff), FormatRelation::SameClass);
        assert_eq!(FormatRelation::between(Standard, Standard), FormatRelation::SameClass);
    }
}
