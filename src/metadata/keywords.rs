//! Keyword set arithmetic. Keywords compare case-insensitively; the first
//! spelling seen wins.

use std::collections::BTreeMap;

fn fold(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Keywords not in `excluded`, sorted and without duplicates.
pub fn subtract(keywords: &[String], excluded: &[String]) -> Vec<String> {
    let excluded: Vec<String> = excluded.iter().map(|k| fold(k)).collect();
    let mut kept: BTreeMap<String, String> = BTreeMap::new();
    for keyword in keywords {
        let key = fold(keyword);
        if key.is_empty() || excluded.contains(&key) {
            continue;
        }
        kept.entry(key).or_insert_with(|| keyword.trim().to_string());
    }
    sorted(kept)
}

/// Union of both lists, sorted and without duplicates.
pub fn merge(keywords: &[String], extra: &[String]) -> Vec<String> {
    let mut all: BTreeMap<String, String> = BTreeMap::new();
    for keyword in keywords.iter().chain(extra) {
        let key = fold(keyword);
        if !key.is_empty() {
            all.entry(key).or_insert_with(|| keyword.trim().to_string());
        }
    }
    sorted(all)
}

pub fn contains(keywords: &[String], keyword: &str) -> bool {
    let key = fold(keyword);
    keywords.iter().any(|k| fold(k) == key)
}

fn sorted(map: BTreeMap<String, String>) -> Vec<String> {
    let mut out: Vec<String> = map.into_values().collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn subtract_ignores_case() {
        let out = subtract(&list(&["Beach", "sunset", "Haarlem"]), &list(&["haarlem"]));
        assert_eq!(out, list(&["Beach", "sunset"]));
    }

    #[test]
    fn merge_deduplicates_and_sorts() {
        let out = merge(&list(&["sunset", "beach"]), &list(&["Beach", "archive", ""]));
        assert_eq!(out, list(&["archive", "beach", "sunset"]));
    }

    #[test]
    fn contains_ignores_case() {
        assert!(contains(&list(&["Sunset"]), "sunset"));
        assert!(!contains(&list(&["Sunset"]), "sun"));
    }
}
