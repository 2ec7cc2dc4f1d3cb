//! Forward diff of a fresh observation against the persisted baseline.
//!
//! Only names present in the current observation are considered: a unit that
//! disappears from the portal is not reported.

use crate::record::{ObservationSet, UpdateSet};

/// Records in `current` that are new or whose `(mark, kind, status)` differs
/// from `baseline`. Without a baseline every record is new.
pub fn diff(current: &ObservationSet, baseline: Option<&ObservationSet>) -> UpdateSet {
    let Some(baseline) = baseline else {
        return current.clone();
    };

    current
        .iter()
        .filter(|(name, record)| {
            baseline
                .get(*name)
                .is_none_or(|prev| prev.grade_tuple() != record.grade_tuple())
        })
        .map(|(name, record)| (name.clone(), record.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn set(entries: &[(&str, &str, &str, &str)]) -> ObservationSet {
        entries
            .iter()
            .map(|(name, kind, mark, status)| {
                (
                    name.to_string(),
                    Record {
                        name: name.to_string(),
                        kind: kind.to_string(),
                        mark: mark.to_string(),
                        status: status.to_string(),
                    },
                )
            })
            .collect()
    }

    fn sample() -> ObservationSet {
        set(&[
            ("Analysis", "Modul", "1,3", "bestanden"),
            ("Datenbanken", "Modul", "", "angemeldet"),
            ("Projekt", "Teilmodul", "2,0", "bestanden"),
        ])
    }

    #[test]
    fn no_baseline_means_everything_is_new() {
        let s = sample();
        assert_eq!(diff(&s, None), s);
    }

    #[test]
    fn identical_baseline_means_no_updates() {
        let s = sample();
        assert!(diff(&s, Some(&s)).is_empty());
    }

    #[test]
    fn single_mark_change_is_reported_alone() {
        let before = sample();
        let mut after = sample();
        after.get_mut("Datenbanken").unwrap().mark = "1,7".into();
        after.get_mut("Datenbanken").unwrap().status = "bestanden".into();

        let updates = diff(&after, Some(&before));
        assert_eq!(updates.len(), 1);
        assert_eq!(updates["Datenbanken"], after["Datenbanken"]);
    }

    #[test]
    fn kind_or_status_change_counts() {
        let before = sample();
        let mut after = sample();
        after.get_mut("Projekt").unwrap().kind = "Modul".into();
        after.get_mut("Analysis").unwrap().status = "KR".into();

        let updates = diff(&after, Some(&before));
        assert_eq!(
            updates.keys().collect::<Vec<_>>(),
            vec!["Analysis", "Projekt"]
        );
    }

    #[test]
    fn new_names_always_included() {
        let before = sample();
        let mut after = sample();
        after.extend(set(&[("Compilerbau", "Modul", "", "angemeldet")]));

        let updates = diff(&after, Some(&before));
        assert!(updates.contains_key("Compilerbau"));
        assert_eq!(updates.len(), 1);
    }

    #[test]
    fn dropped_names_not_reported() {
        let before = sample();
        let mut after = sample();
        after.remove("Analysis");

        assert!(diff(&after, Some(&before)).is_empty());
    }

    #[test]
    fn updates_are_a_subset_of_current() {
        let before = set(&[("Analysis", "Modul", "5,0", "nicht bestanden")]);
        let after = sample();
        let updates = diff(&after, Some(&before));
        for (name, record) in &updates {
            assert_eq!(after.get(name), Some(record));
        }
    }

    #[test]
    fn empty_observation_yields_nothing() {
        let empty = ObservationSet::new();
        assert!(diff(&empty, Some(&sample())).is_empty());
        assert!(diff(&empty, None).is_empty());
    }
}
