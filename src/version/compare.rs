//! Package-manager version ordering (`vercmp` semantics).
//!
//! A version reads `[epoch:]pkgver[-pkgrel]`. Epochs compare numerically
//! (absent means 0), then pkgver, then pkgrel when both sides carry one.
//! Each part is compared segment by segment: runs of digits numerically,
//! runs of letters lexically, a numeric segment beats an alphabetic one
//! and a trailing alphabetic segment loses to nothing (`1.0a < 1.0`).

use log::warn;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The only form in which versions are ever compared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalVersion {
    pub epoch: u64,
    pub pkgver: String,
    /// Absent for upstream versions, which carry no release number.
    pub pkgrel: Option<String>,
}

impl CanonicalVersion {
    /// Split `[epoch:]pkgver[-pkgrel]`. The release is whatever follows the last `-`.
    pub fn parse(input: &str) -> Self {
        let digits = input.bytes().take_while(u8::is_ascii_digit).count();
        let (epoch, rest) = match input[digits..].strip_prefix(':') {
            Some(rest) => {
                let overflow = if digits == 0 { 0 } else { u64::MAX };
                (input[..digits].parse().unwrap_or(overflow), rest)
            }
            None => (0, input),
        };

        let (pkgver, pkgrel) = match rest.rfind('-') {
            Some(idx) => (&rest[..idx], Some(rest[idx + 1..].to_string())),
            None => (rest, None),
        };

        Self {
            epoch,
            pkgver: pkgver.to_string(),
            pkgrel,
        }
    }

    pub fn new(epoch: u64, pkgver: impl Into<String>, pkgrel: Option<String>) -> Self {
        Self {
            epoch,
            pkgver: pkgver.into(),
            pkgrel,
        }
    }

    /// Ordering of two canonical versions.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_segments(&self.pkgver, &other.pkgver))
            .then_with(|| match (&self.pkgrel, &other.pkgrel) {
                (Some(a), Some(b)) => compare_segments(a, b),
                _ => Ordering::Equal,
            })
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.pkgver)?;
        if let Some(rel) = &self.pkgrel {
            write!(f, "-{}", rel)?;
        }
        Ok(())
    }
}

/// Full `vercmp` over two version strings.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    CanonicalVersion::parse(a).compare(&CanonicalVersion::parse(b))
}

/// Segment-wise comparison of one version part.
pub fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0, 0);

    while i < one.len() && j < two.len() {
        let (sep_i, sep_j) = (i, j);
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= one.len() || j >= two.len() {
            break;
        }

        // Longer separator run wins: "1..0" > "1.0"
        let (sep_len_i, sep_len_j) = (i - sep_i, j - sep_j);
        if sep_len_i != sep_len_j {
            return sep_len_i.cmp(&sep_len_j);
        }

        let (start_i, start_j) = (i, j);
        let numeric = one[i].is_ascii_digit();
        if numeric {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        // Segment types differ; numbers are newer than letters
        if j == start_j {
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg_one = &one[start_i..i];
        let mut seg_two = &two[start_j..j];
        if numeric {
            seg_one = trim_leading_zeros(seg_one);
            seg_two = trim_leading_zeros(seg_two);
            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => {}
                longer => return longer,
            }
        }
        match seg_one.cmp(seg_two) {
            Ordering::Equal => {}
            other => return other,
        }
    }

    let one_done = i >= one.len();
    let two_done = j >= two.len();
    if one_done && two_done {
        return Ordering::Equal;
    }

    // A leftover alphabetic segment never beats an empty one
    if (one_done && !two[j].is_ascii_alphabetic()) || (!one_done && one[i].is_ascii_alphabetic()) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

fn trim_leading_zeros(segment: &[u8]) -> &[u8] {
    let zeros = segment.iter().take_while(|b| **b == b'0').count();
    &segment[zeros..]
}

/// How versions are ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareMode {
    /// Segment-aware package-manager ordering
    #[default]
    Package,
    /// Plain string ordering; reduced accuracy
    Lexical,
}

/// Whether a comparison result is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Exact,
    Reduced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub ordering: Ordering,
    pub accuracy: Accuracy,
}

/// Version comparator with a distinguishable lexical fallback.
///
/// In [`CompareMode::Package`] any input outside the version grammar
/// (empty, whitespace, control or non-ASCII characters) is compared
/// lexically instead, and the result is flagged [`Accuracy::Reduced`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Comparator {
    mode: CompareMode,
}

impl Comparator {
    pub fn new(mode: CompareMode) -> Self {
        if mode == CompareMode::Lexical {
            warn!("Version comparison is lexical; ordering results have reduced accuracy");
        }
        Self { mode }
    }

    pub fn compare(&self, a: &str, b: &str) -> Comparison {
        match self.mode {
            CompareMode::Lexical => Comparison {
                ordering: a.cmp(b),
                accuracy: Accuracy::Reduced,
            },
            CompareMode::Package if in_grammar(a) && in_grammar(b) => Comparison {
                ordering: vercmp(a, b),
                accuracy: Accuracy::Exact,
            },
            CompareMode::Package => {
                warn!(
                    "Cannot order '{}' and '{}' as package versions; comparing lexically (reduced accuracy)",
                    a, b
                );
                Comparison {
                    ordering: a.cmp(b),
                    accuracy: Accuracy::Reduced,
                }
            }
        }
    }

    /// Shorthand for the ordering alone.
    pub fn ordering(&self, a: &str, b: &str) -> Ordering {
        self.compare(a, b).ordering
    }

    /// Whether `candidate` orders strictly after `current`.
    pub fn is_newer(&self, candidate: &str, current: &str) -> bool {
        self.ordering(candidate, current) == Ordering::Greater
    }

    /// The highest version of an unordered collection; the first wins ties.
    pub fn pick_max<I, S>(&self, versions: I) -> Option<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut best: Option<String> = None;
        for version in versions {
            let version = version.as_ref();
            match &best {
                Some(current) if !self.is_newer(version, current) => {}
                _ => best = Some(version.to_string()),
            }
        }
        best
    }
}

fn in_grammar(version: &str) -> bool {
    !version.is_empty() && version.bytes().all(|b| b.is_ascii_graphic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use Ordering::{Equal, Greater, Less};

    #[test]
    fn test_parse_full_version() {
        let v = CanonicalVersion::parse("2:1.4.0-3");
        assert_eq!(v, CanonicalVersion::new(2, "1.4.0", Some("3".into())));
        assert_eq!(v.to_string(), "2:1.4.0-3");
    }

    #[test]
    fn test_parse_without_epoch_or_release() {
        let v = CanonicalVersion::parse("1.4.0");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.pkgver, "1.4.0");
        assert_eq!(v.pkgrel, None);
        assert_eq!(v.to_string(), "1.4.0");
    }

    #[test]
    fn test_parse_release_is_after_last_hyphen() {
        let v = CanonicalVersion::parse("1.0-rc1-2");
        assert_eq!(v.pkgver, "1.0-rc1");
        assert_eq!(v.pkgrel.as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_non_numeric_prefix_is_not_an_epoch() {
        let v = CanonicalVersion::parse("abc:1.0");
        assert_eq!(v.epoch, 0);
        assert_eq!(v.pkgver, "abc:1.0");
    }

    #[test]
    fn test_vercmp_reference_pairs() {
        let cases = [
            ("1.0", "1.0", Equal),
            ("1.0", "1.1", Less),
            ("1.2.0", "1.10.0", Less),
            ("1.0a", "1.0", Less),
            ("1.0.0", "1.0", Greater),
            ("1.0", "1.0.", Less),
            ("1.0alpha", "1.0beta", Less),
            ("1.0rc1", "1.0", Less),
            ("1.001", "1.1", Equal),
            ("1:1.0", "2.0", Greater),
            ("0:2.0", "2.0", Equal),
            ("1.0-1", "1.0-2", Less),
            ("1.0", "1.0-5", Equal),
            ("1.0-1.1", "1.0-1", Greater),
            ("2024_01_05", "2024_01_04", Greater),
            ("1..0", "1.0", Greater),
            ("1.a", "1.1", Less),
        ];

        for (a, b, expected) in cases {
            assert_eq!(vercmp(a, b), expected, "vercmp({}, {})", a, b);
        }
    }

    #[test]
    fn test_equal_components_compare_equal() {
        let a = CanonicalVersion::new(1, "3.2.1", Some("4".into()));
        let b = CanonicalVersion::parse("1:3.2.1-4");
        assert_eq!(a.compare(&b), Equal);
    }

    #[test]
    fn test_antisymmetry() {
        let samples = [
            "1.0", "1.0a", "1.0.0", "1.0.", "1:0.1", "2.0-1", "2.0-2", "1.0rc1", "1.0.1a", "10",
            "9.9", "1..0", "a", "1.0+git1", "1.0_beta",
        ];

        for a in samples {
            for b in samples {
                let forward = vercmp(a, b);
                let backward = vercmp(b, a);
                assert_eq!(forward, backward.reverse(), "vercmp({}, {})", a, b);
            }
        }
    }

    #[test]
    fn test_pick_max_uses_numeric_segments() {
        let comparator = Comparator::default();
        let max = comparator.pick_max(["1.2.0", "1.10.0", "1.3.0"]);
        assert_eq!(max.as_deref(), Some("1.10.0"));
    }

    #[test]
    fn test_pick_max_first_wins_ties_and_empty_is_none() {
        let comparator = Comparator::default();
        assert_eq!(comparator.pick_max(["1.01", "1.1"]).as_deref(), Some("1.01"));
        assert_eq!(comparator.pick_max(Vec::<String>::new()), None);
    }

    #[test]
    fn test_lexical_mode_is_flagged_reduced() {
        let comparator = Comparator::new(CompareMode::Lexical);
        let result = comparator.compare("1.10.0", "1.2.0");
        assert_eq!(result.ordering, Less);
        assert_eq!(result.accuracy, Accuracy::Reduced);
    }

    #[test]
    fn test_out_of_grammar_input_falls_back_with_reduced_accuracy() {
        let comparator = Comparator::default();

        let exact = comparator.compare("1.10.0", "1.2.0");
        assert_eq!(exact.ordering, Greater);
        assert_eq!(exact.accuracy, Accuracy::Exact);

        let degraded = comparator.compare("1.0 beta", "1.0");
        assert_eq!(degraded.accuracy, Accuracy::Reduced);
        assert_eq!(degraded.ordering, Greater);

        let empty = comparator.compare("", "1.0");
        assert_eq!(empty.accuracy, Accuracy::Reduced);
        assert_eq!(empty.ordering, Less);
    }
}
