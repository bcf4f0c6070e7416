use std::collections::BTreeSet;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Diagnoses counted as chronic conditions in the chronic-patient KPI.
pub const CHRONIC_DIAGNOSES: [&str; 3] = ["Hypertension", "Diabetes", "Obesity"];

/// Sentinel for date-derived fields when the source date failed to parse.
pub const UNKNOWN: &str = "Unknown";

/// One visit row after normalization. Derived fields (`month`,
/// `day_of_week`, `bmi_category`) are computed once at load and never
/// recomputed downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitRecord {
    pub patient_id: String,
    pub appointment_date: Option<NaiveDate>,
    pub doctor: String,
    pub city: String,
    pub gender: String,
    pub diagnosis: String,
    pub insurance_status: String,
    pub status: String,
    pub bill_amount: Option<f64>,
    pub satisfaction_score: Option<f64>,
    pub follow_up_required: String,
    pub bmi: Option<f64>,
    pub month: String,
    pub day_of_week: String,
    pub bmi_category: BmiCategory,
}

impl VisitRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        patient_id: impl Into<String>,
        appointment_date: Option<NaiveDate>,
        doctor: impl Into<String>,
        city: impl Into<String>,
        gender: impl Into<String>,
        diagnosis: impl Into<String>,
        insurance_status: impl Into<String>,
        status: impl Into<String>,
        bill_amount: Option<f64>,
        satisfaction_score: Option<f64>,
        follow_up_required: impl Into<String>,
        bmi: Option<f64>,
    ) -> Self {
        let month = appointment_date
            .map(|d| format!("{:04}-{:02}", d.year(), d.month()))
            .unwrap_or_else(|| UNKNOWN.to_string());
        let day_of_week = appointment_date
            .map(|d| d.format("%A").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());
        Self {
            patient_id: patient_id.into(),
            appointment_date,
            doctor: doctor.into(),
            city: city.into(),
            gender: gender.into(),
            diagnosis: diagnosis.into(),
            insurance_status: insurance_status.into(),
            status: status.into(),
            bill_amount,
            satisfaction_score,
            follow_up_required: follow_up_required.into(),
            bmi,
            month,
            day_of_week,
            bmi_category: BmiCategory::classify(bmi),
        }
    }

    pub fn is_chronic(&self) -> bool {
        CHRONIC_DIAGNOSES.contains(&self.diagnosis.as_str())
    }
}

/// Four-bucket BMI classification plus a bucket for missing values.
/// Lower bounds are half-open: exactly 18.5 is Normal, 25 Overweight,
/// 30 Obesity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obesity,
    Unknown,
}

impl BmiCategory {
    /// Ordinal order, used for the BMI distribution series.
    pub const ALL: [BmiCategory; 5] = [
        BmiCategory::Underweight,
        BmiCategory::Normal,
        BmiCategory::Overweight,
        BmiCategory::Obesity,
        BmiCategory::Unknown,
    ];

    pub fn classify(bmi: Option<f64>) -> Self {
        match bmi {
            None => BmiCategory::Unknown,
            Some(v) if v.is_nan() => BmiCategory::Unknown,
            Some(v) if v < 18.5 => BmiCategory::Underweight,
            Some(v) if v < 25.0 => BmiCategory::Normal,
            Some(v) if v < 30.0 => BmiCategory::Overweight,
            Some(_) => BmiCategory::Obesity,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obesity => "Obesity",
            BmiCategory::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The categorical filters a caller may constrain. An empty set leaves
/// that column unconstrained; values within a set combine as OR, sets
/// across columns combine as AND.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSelection {
    pub doctors: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub genders: BTreeSet<String>,
    pub diagnoses: BTreeSet<String>,
    pub insurance_statuses: BTreeSet<String>,
}

impl FilterSelection {
    pub fn is_unconstrained(&self) -> bool {
        self.doctors.is_empty()
            && self.cities.is_empty()
            && self.genders.is_empty()
            && self.diagnoses.is_empty()
            && self.insurance_statuses.is_empty()
    }

    /// Human-readable summary used in report headers.
    pub fn label(&self) -> String {
        let mut parts = Vec::new();
        for (name, values) in [
            ("doctor", &self.doctors),
            ("city", &self.cities),
            ("gender", &self.genders),
            ("diagnosis", &self.diagnoses),
            ("insurance", &self.insurance_statuses),
        ] {
            if !values.is_empty() {
                let joined = values.iter().cloned().collect::<Vec<_>>().join(", ");
                parts.push(format!("{name} in [{joined}]"));
            }
        }
        if parts.is_empty() {
            "all visits".to_string()
        } else {
            parts.join("; ")
        }
    }
}

/// The five headline indicators. `avg_satisfaction` is `None` when no
/// visit in the filtered set carries a score.
#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    pub total_patients: usize,
    pub chronic_patient_pct: f64,
    pub missed_appointment_pct: f64,
    pub total_revenue: f64,
    pub avg_satisfaction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateCount {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedSum {
    pub key: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyedCount {
    pub key: String,
    pub count: usize,
}

/// Argmax fact for one aggregation: the key holding the maximum value.
/// Ties resolve to the key earliest in the series order.
#[derive(Debug, Clone, PartialEq)]
pub struct Insight {
    pub key: String,
    pub value: f64,
}

/// All grouped aggregations over one filtered set, with their insights.
/// Empty series carry a `None` insight.
#[derive(Debug, Clone)]
pub struct AggregationSet {
    pub appointments_by_date: Vec<DateCount>,
    pub revenue_by_month: Vec<KeyedSum>,
    pub visits_by_diagnosis: Vec<KeyedCount>,
    pub visits_by_bmi_category: Vec<KeyedCount>,
    pub visits_by_follow_up: Vec<KeyedCount>,
    pub peak_appointment_day: Option<Insight>,
    pub top_revenue_month: Option<Insight>,
    pub top_diagnosis: Option<Insight>,
    pub top_bmi_category: Option<Insight>,
    pub top_follow_up: Option<Insight>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Line,
    Bar,
    HorizontalBar,
    Pie,
}

/// Chart-ready projection of one aggregation. `points` preserve the
/// series order; the renderer must not reorder them.
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub index: usize,
    pub slug: &'static str,
    pub title: String,
    pub kind: ChartKind,
    pub points: Vec<(String, f64)>,
}
