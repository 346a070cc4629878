//! Filename relation heuristic for RAW/export pairs.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

fn digit_runs() -> Option<&'static Regex> {
    static DIGITS: OnceLock<Option<Regex>> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"\d+").ok()).as_ref()
}

/// Whether two files look like renders of the same shot.
///
/// Stems (extension removed) are compared case-insensitively. They are
/// related if either contains the other, or if both carry the same
/// non-empty sequence of digit runs, e.g. `IMG_0042` and `DSC0042`.
pub fn filenames_related(a: &Path, b: &Path) -> bool {
    let (Some(a), Some(b)) = (stem(a), stem(b)) else {
        return false;
    };
    if a.is_empty() || b.is_empty() {
        return false;
    }

    if a.contains(&b) || b.contains(&a) {
        return true;
    }

    let (digits_a, digits_b) = (numbers(&a), numbers(&b));
    !digits_a.is_empty() && digits_a == digits_b
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.to_lowercase())
}

fn numbers(stem: &str) -> Vec<&str> {
    digit_runs()
        .map(|regex| regex.find_iter(stem).map(|m| m.as_str()).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn related(a: &str, b: &str) -> bool {
        filenames_related(Path::new(a), Path::new(b))
    }

    #[test]
    fn same_stem_different_extension() {
        assert!(related("/raw/IMG_0042.CR2", "/export/IMG_0042.JPG"));
    }

    #[test]
    fn case_insensitive_containment() {
        assert!(related("img_0042.cr2", "IMG_0042-edit.jpg"));
        assert!(related("IMG_0042-Edit.jpg", "img_0042.nef"));
    }

    #[test]
    fn equal_digit_runs() {
        assert!(related("DSC_0042.nef", "holiday-0042.jpg"));
        assert!(related("2023_07_15.arw", "IMG-2023-07-15.jpg"));
    }

    #[test]
    fn different_digits_are_unrelated() {
        assert!(!related("IMG_0042.CR2", "IMG_0043.JPG"));
        assert!(!related("DSC_12_34.nef", "DSC_1234.jpg"));
    }

    #[test]
    fn no_digits_and_no_containment_is_unrelated() {
        assert!(!related("sunset.cr2", "beach.jpg"));
    }
}
