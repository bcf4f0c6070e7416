use std::collections::HashSet;

use crate::models::{KpiSummary, VisitRecord};

/// Status value marking a visit the patient did not attend.
const MISSED_STATUS: &str = "Missed";

/// Computes the five headline KPIs over one filtered set. Patient-level
/// figures use distinct `patient_id` cardinality since patients appear
/// once per visit. Every figure has a defined value on an empty set.
pub fn compute(records: &[VisitRecord]) -> KpiSummary {
    let total_patients = distinct_patients(records.iter());
    let chronic_patients = distinct_patients(records.iter().filter(|r| r.is_chronic()));

    let chronic_patient_pct = if total_patients == 0 {
        0.0
    } else {
        chronic_patients as f64 / total_patients as f64 * 100.0
    };

    let missed = records
        .iter()
        .filter(|r| r.status == MISSED_STATUS)
        .count();
    let missed_appointment_pct = if records.is_empty() {
        0.0
    } else {
        missed as f64 / records.len() as f64 * 100.0
    };

    // Missing bills count as zero toward revenue; missing scores are
    // excluded from the average rather than pulling it toward zero.
    let total_revenue: f64 = records.iter().map(|r| r.bill_amount.unwrap_or(0.0)).sum();

    let scores: Vec<f64> = records.iter().filter_map(|r| r.satisfaction_score).collect();
    let avg_satisfaction = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    KpiSummary {
        total_patients,
        chronic_patient_pct,
        missed_appointment_pct,
        total_revenue,
        avg_satisfaction,
    }
}

fn distinct_patients<'a>(records: impl Iterator<Item = &'a VisitRecord>) -> usize {
    records
        .map(|r| r.patient_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}
