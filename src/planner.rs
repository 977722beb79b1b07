//! Diff desired album memberships (from keywords) against the snapshot.

use std::collections::{BTreeMap, BTreeSet};

use crate::metadata::keywords;
use crate::snapshot::RemoteSnapshot;

fn fold(title: &str) -> String {
    title.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Only albums whose membership changes are touched.
    MembershipOnly,
    /// The photos were just re-uploaded: their capture date may have moved,
    /// so every existing album they belong to is touched as well.
    MetadataChanged,
}

/// The membership changes that bring the remote albums in line with the
/// photos' keywords. Keys are album titles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Photo names to add, in collection order. A title without a remote
    /// album means the album is created around its first photo.
    pub additions: BTreeMap<String, Vec<String>>,
    pub deletions: BTreeMap<String, Vec<String>>,
    pub touched: BTreeSet<String>,
    pub unchanged: usize,
    pub updated: usize,
}

impl ReconciliationPlan {
    /// `photos` yields each photo's name with its full keyword list.
    pub fn build<'a, I>(snapshot: &RemoteSnapshot, default_keywords: &[String], photos: I, mode: PlanMode) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let mut plan = Self::default();
        // One spelling per album title: the remote one when it exists,
        // otherwise the first keyword spelling seen.
        let mut titles: BTreeMap<String, String> =
            snapshot.albums().map(|a| (fold(&a.title), a.title.clone())).collect();

        for (name, photo_keywords) in photos {
            let desired: BTreeMap<String, String> = keywords::subtract(photo_keywords, default_keywords)
                .into_iter()
                .filter(|k| !snapshot.is_main(k) && snapshot.in_scope(k))
                .map(|k| (fold(&k), k))
                .collect();
            let observed: BTreeMap<String, String> = snapshot
                .memberships(name)
                .into_iter()
                .map(|t| (fold(t), t.to_string()))
                .collect();

            let mut changed = false;
            for (key, keyword) in &desired {
                if observed.contains_key(key) {
                    continue;
                }
                let title = titles.entry(key.clone()).or_insert_with(|| keyword.clone()).clone();
                plan.additions.entry(title.clone()).or_default().push(name.to_string());
                plan.touched.insert(title);
                changed = true;
            }
            for (key, title) in &observed {
                if desired.contains_key(key) {
                    continue;
                }
                plan.deletions.entry(title.clone()).or_default().push(name.to_string());
                plan.touched.insert(title.clone());
                changed = true;
            }

            if mode == PlanMode::MetadataChanged {
                for key in desired.keys() {
                    if let Some(album) = snapshot.album(key) {
                        plan.touched.insert(album.title.clone());
                    }
                }
            }

            if changed {
                log::debug!("{name}: membership changes planned");
                plan.updated += 1;
            } else {
                plan.unchanged += 1;
            }
        }
        plan
    }

    /// No membership change and nothing to re-sort.
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.touched.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemotePhoto;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn photo(id: &str, title: &str) -> RemotePhoto {
        RemotePhoto { id: id.into(), title: title.into(), date_taken: None }
    }

    /// main: p1, p2, p3; beach: p2, p3; no sunset album yet.
    fn snapshot() -> RemoteSnapshot {
        let mut snapshot = RemoteSnapshot::new("Haarlem", None);
        snapshot.insert_album("m", "Haarlem", "1");
        snapshot.insert_album("b", "beach", "2");
        snapshot.record_members("Haarlem", &[photo("1", "p1"), photo("2", "p2"), photo("3", "p3")]);
        snapshot.record_members("beach", &[photo("2", "p2"), photo("3", "p3")]);
        snapshot
    }

    fn build(snapshot: &RemoteSnapshot, photos: &[(&str, Vec<String>)], mode: PlanMode) -> ReconciliationPlan {
        ReconciliationPlan::build(
            snapshot,
            &list(&["haarlem"]),
            photos.iter().map(|(n, k)| (*n, k.as_slice())),
            mode,
        )
    }

    // ── diffing ──────────────────────────────────────────────────────

    #[test]
    fn adds_new_keyword_and_removes_dropped_one() {
        let snap = snapshot();
        let photos = [
            ("p1", list(&["sunset", "Haarlem"])),
            ("p2", list(&[])),
            ("p3", list(&["Beach"])),
        ];
        let plan = build(&snap, &photos, PlanMode::MembershipOnly);

        assert_eq!(plan.additions.get("sunset"), Some(&list(&["p1"])));
        assert_eq!(plan.deletions.get("beach"), Some(&list(&["p2"])));
        assert_eq!(plan.touched, BTreeSet::from(["beach".to_string(), "sunset".to_string()]));
        assert_eq!((plan.updated, plan.unchanged), (2, 1));
    }

    #[test]
    fn main_album_title_and_defaults_are_never_memberships() {
        let snap = snapshot();
        let photos = [("p1", list(&["haarlem", "HAARLEM "]))];
        let plan = build(&snap, &photos, PlanMode::MembershipOnly);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 1);
    }

    #[test]
    fn new_album_spelling_is_shared() {
        let snap = snapshot();
        let photos = [("p1", list(&["Sunset"])), ("p2", list(&["beach", "sunset"]))];
        let plan = build(&snap, &photos, PlanMode::MembershipOnly);
        assert_eq!(plan.additions.len(), 1);
        assert_eq!(plan.additions.get("Sunset"), Some(&list(&["p1", "p2"])));
    }

    #[test]
    fn scope_limits_desired_albums() {
        let mut snap = RemoteSnapshot::new("Haarlem", Some(&["sunset".to_string()].into()));
        snap.insert_album("m", "Haarlem", "1");
        snap.record_members("Haarlem", &[photo("1", "p1")]);
        let photos = [("p1", list(&["sunset", "beach"]))];
        let plan = build(&snap, &photos, PlanMode::MembershipOnly);
        assert_eq!(plan.additions.keys().collect::<Vec<_>>(), vec!["sunset"]);
    }

    #[test]
    fn metadata_change_touches_existing_albums() {
        let snap = snapshot();
        let photos = [("p3", list(&["beach"]))];
        assert!(build(&snap, &photos, PlanMode::MembershipOnly).touched.is_empty());
        let plan = build(&snap, &photos, PlanMode::MetadataChanged);
        assert_eq!(plan.touched, BTreeSet::from(["beach".to_string()]));
        assert_eq!(plan.unchanged, 1);
    }

    // ── idempotence ──────────────────────────────────────────────────

    #[test]
    fn applied_plan_yields_empty_plan() {
        let mut snap = snapshot();
        let photos = [
            ("p1", list(&["sunset"])),
            ("p2", list(&[])),
            ("p3", list(&["beach", "sunset"])),
        ];
        let plan = build(&snap, &photos, PlanMode::MembershipOnly);

        snap.insert_album("s", "sunset", "1");
        for (title, names) in &plan.additions {
            for name in names {
                snap.add_member(title, name);
            }
        }
        for (title, names) in &plan.deletions {
            for name in names {
                snap.remove_member(title, name);
            }
        }

        let again = build(&snap, &photos, PlanMode::MembershipOnly);
        assert!(again.additions.is_empty());
        assert!(again.deletions.is_empty());
        assert_eq!(again.unchanged, 3);
    }
}
