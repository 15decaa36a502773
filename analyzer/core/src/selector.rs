use std::collections::BTreeSet;

/// Returns true if every selector in `selectors` is also in `labels`.
///
/// This is a one-directional containment check over flattened `key:value` strings: extra labels
/// are ignored, matching is exact and case-sensitive, and an empty selector set is contained in
/// anything.
pub fn are_selectors_contained<S: AsRef<str>>(labels: &BTreeSet<String>, selectors: &[S]) -> bool {
    selectors.iter().all(|s| labels.contains(s.as_ref()))
}
