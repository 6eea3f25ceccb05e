//! Multi-source merge by identity key

use std::collections::HashSet;
use std::hash::Hash;

/// Keep every `primary` item in order, then append each `secondary` item whose
/// key was not produced by `primary`.
///
/// The seen-set is built from `primary` only, so two secondary items sharing a
/// key are both kept. Keys are compared exactly; two sources naming the same
/// device differently yield two items.
pub fn merge_by_key<T, K, F>(
    primary: Vec<T>,
    secondary: impl IntoIterator<Item = T>,
    key: F,
) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let seen: HashSet<K> = primary.iter().map(&key).collect();

    let mut merged = primary;
    merged.extend(secondary.into_iter().filter(|item| !seen.contains(&key(item))));
    merged
}
