//! Reading order for archive entries.

use std::cmp::Ordering;

use super::ArchiveEntry;

/// Integer value of the final path component up to its last `.`, if it has one.
fn numeric_stem(name: &str) -> Option<i64> {
    let name = name.rsplit('/').next().unwrap_or(name);
    let stem = match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    };
    stem.parse().ok()
}

/// Compare two entry names by the integer value of their stems.
///
/// Stems come from the final path component, so pages kept in a folder
/// (`ch/2.jpg`, `ch/10.jpg`) still sort by value. When either stem is not an
/// integer the full names are compared byte-wise.
pub fn compare_numeric(a: &str, b: &str) -> Ordering {
    match (numeric_stem(a), numeric_stem(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => a.as_bytes().cmp(b.as_bytes()),
    }
}

/// Sort entries into reading order.
///
/// `compare_numeric` is not transitive when numeric and non-numeric names
/// mix (`2` < `10` < `1a` < `2`), and `slice::sort_by` may panic on such
/// comparators. Insertion sort accepts any comparator; archives hold at most
/// a few hundred entries.
pub fn sort_numerically(entries: &mut [ArchiveEntry]) {
    for i in 1..entries.len() {
        let mut j = i;
        while j > 0 && compare_numeric(&entries[j - 1].name, &entries[j].name) == Ordering::Greater
        {
            entries.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(names: &[&str]) -> Vec<ArchiveEntry> {
        names
            .iter()
            .enumerate()
            .map(|(index, name)| ArchiveEntry {
                index,
                name: name.to_string(),
                size: 0,
            })
            .collect()
    }

    fn sorted(names: &[&str]) -> Vec<String> {
        let mut list = entries(names);
        sort_numerically(&mut list);
        list.into_iter().map(|e| e.name).collect()
    }

    #[test]
    fn test_numeric_names_sort_by_value() {
        assert_eq!(sorted(&["10.jpg", "2.jpg", "1.jpg"]), ["1.jpg", "2.jpg", "10.jpg"]);
    }

    #[test]
    fn test_one_to_twelve_in_reverse() {
        let names: Vec<String> = (1..=12).rev().map(|n| format!("{n}.jpg")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let expected: Vec<String> = (1..=12).map(|n| format!("{n}.jpg")).collect();
        assert_eq!(sorted(&refs), expected);
    }

    #[test]
    fn test_non_numeric_names_fall_back_to_bytes() {
        assert_eq!(sorted(&["cover.jpg", "3.jpg"]), ["3.jpg", "cover.jpg"]);
        assert_eq!(sorted(&["b.png", "a.png"]), ["a.png", "b.png"]);
    }

    #[test]
    fn test_leading_zeros_compare_numerically() {
        assert_eq!(compare_numeric("010.jpg", "9.jpg"), Ordering::Greater);
        assert_eq!(compare_numeric("007.png", "7.jpg"), Ordering::Equal);
    }

    #[test]
    fn test_stem_is_cut_at_last_dot() {
        // "1.5" does not parse as an integer, so this is a byte comparison
        assert_eq!(compare_numeric("1.5.jpg", "1.jpg"), Ordering::Less);
        assert_eq!(compare_numeric("12", "3"), Ordering::Greater);
    }

    #[test]
    fn test_nested_numeric_names_sort_by_value() {
        assert_eq!(
            sorted(&["ch/10.jpg", "ch/2.jpg", "ch/1.jpg"]),
            ["ch/1.jpg", "ch/2.jpg", "ch/10.jpg"]
        );
        assert_eq!(compare_numeric("b/1.jpg", "a/2.jpg"), Ordering::Less);
    }

    #[test]
    fn test_non_transitive_mix_does_not_panic() {
        let out = sorted(&["2.jpg", "10.jpg", "1a.jpg", "cover.png", "1.jpg"]);
        assert_eq!(out.len(), 5);
    }
}
