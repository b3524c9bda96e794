//! Version handling: normalization, ordering and status classification.

mod compare;
mod normalize;
mod status;

pub use compare::{
    Accuracy, CanonicalVersion, CompareMode, Comparator, Comparison, compare_segments, vercmp,
};
pub use normalize::{DEFAULT_FORMAT, ExtractError, Extraction, apply_regex, normalize, to_pkgver};
pub(crate) use normalize::apply_compiled;
pub use status::{PackageStatus, StatusInput, VCS_SUFFIXES, classify, is_vcs_name};
