use std::collections::BTreeSet;

use crate::models::{FilterSelection, VisitRecord};

/// Produces the subset of `records` matching every active column filter.
/// Within a column the selected values combine as OR; across columns the
/// constraints combine as AND. A column with an empty selection imposes
/// no constraint, so an unconstrained selection returns the full set.
pub fn apply(records: &[VisitRecord], selection: &FilterSelection) -> Vec<VisitRecord> {
    records
        .iter()
        .filter(|record| matches(record, selection))
        .cloned()
        .collect()
}

fn matches(record: &VisitRecord, selection: &FilterSelection) -> bool {
    column_allows(&selection.doctors, &record.doctor)
        && column_allows(&selection.cities, &record.city)
        && column_allows(&selection.genders, &record.gender)
        && column_allows(&selection.diagnoses, &record.diagnosis)
        && column_allows(&selection.insurance_statuses, &record.insurance_status)
}

fn column_allows(allowed: &BTreeSet<String>, value: &str) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(patient: &str, doctor: &str, city: &str, diagnosis: &str) -> VisitRecord {
        VisitRecord::new(
            patient,
            chrono::NaiveDate::from_ymd_opt(2026, 1, 5),
            doctor,
            city,
            "Female",
            diagnosis,
            "Insured",
            "Completed",
            Some(100.0),
            Some(4.0),
            "No",
            Some(22.0),
        )
    }

    fn sample() -> Vec<VisitRecord> {
        vec![
            record("P001", "Dr. Mehta", "Pune", "Hypertension"),
            record("P002", "Dr. Rao", "Mumbai", "Flu"),
            record("P003", "Dr. Rao", "Pune", "Diabetes"),
        ]
    }

    fn select(diagnoses: &[&str]) -> FilterSelection {
        FilterSelection {
            diagnoses: diagnoses.iter().map(|d| d.to_string()).collect(),
            ..FilterSelection::default()
        }
    }

    #[test]
    fn empty_selection_keeps_everything() {
        let records = sample();
        let filtered = apply(&records, &FilterSelection::default());
        assert_eq!(filtered, records);
    }

    #[test]
    fn columns_combine_as_and() {
        let records = sample();
        let selection = FilterSelection {
            doctors: ["Dr. Rao".to_string()].into(),
            cities: ["Pune".to_string()].into(),
            ..FilterSelection::default()
        };
        let filtered = apply(&records, &selection);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].patient_id, "P003");
    }

    #[test]
    fn values_within_a_column_combine_as_or() {
        let records = sample();
        let filtered = apply(&records, &select(&["Flu", "Diabetes"]));
        assert_eq!(filtered.len(), 2);
    }

    #[test]
    fn unmatched_value_yields_empty_not_error() {
        let records = sample();
        let filtered = apply(&records, &select(&["Asthma"]));
        assert!(filtered.is_empty());
    }

    #[test]
    fn apply_is_idempotent() {
        let records = sample();
        let selection = select(&["Flu"]);
        let once = apply(&records, &selection);
        let twice = apply(&once, &selection);
        assert_eq!(once, twice);
    }

    #[test]
    fn widening_a_selection_never_shrinks_the_result() {
        let records = sample();
        let narrow = apply(&records, &select(&["Flu"]));
        let wide = apply(&records, &select(&["Flu", "Hypertension"]));
        assert!(wide.len() >= narrow.len());
    }
}
