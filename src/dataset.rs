use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::VisitRecord;

/// Canonical column order, used for the export header row and required
/// of every input file (under any accepted header spelling).
pub const CANONICAL_COLUMNS: [&str; 12] = [
    "patient_id",
    "appointment_date",
    "doctor",
    "city",
    "gender",
    "diagnosis",
    "insurance_status",
    "status",
    "bill_amount",
    "satisfaction_score",
    "follow_up_required",
    "bmi",
];

/// Source headers that normalize to something other than their canonical
/// name.
const HEADER_ALIASES: [(&str, &str); 1] = [("checkup_status", "status")];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y", "%d-%m-%Y"];

/// Maps a raw header to its canonical column name, or `None` for columns
/// the engine does not use. Matching is case-, whitespace-, and
/// punctuation-insensitive so "Patient ID", "patient_id", and
/// "Follow-Up Required" all resolve.
pub fn canonical_column(raw: &str) -> Option<&'static str> {
    let mut normalized = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        match c {
            ' ' | '-' | '_' => {
                if !normalized.ends_with('_') {
                    normalized.push('_');
                }
            }
            _ => normalized.push(c),
        }
    }
    let normalized = HEADER_ALIASES
        .iter()
        .find(|(alias, _)| *alias == normalized)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(normalized.as_str());
    CANONICAL_COLUMNS
        .iter()
        .find(|canonical| **canonical == normalized)
        .copied()
}

/// Loads the full visit table. Missing file or missing required columns
/// are fatal; malformed values inside a row are coerced to missing and
/// never abort the load.
pub fn load(path: &Path) -> anyhow::Result<Vec<VisitRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open visit data at {}", path.display()))?;

    let headers = reader
        .headers()
        .with_context(|| format!("failed to read header row of {}", path.display()))?
        .clone();

    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (idx, raw) in headers.iter().enumerate() {
        if let Some(name) = canonical_column(raw) {
            columns.entry(name).or_insert(idx);
        } else {
            debug!(column = raw, "ignoring unrecognized column");
        }
    }
    for required in CANONICAL_COLUMNS {
        if !columns.contains_key(required) {
            bail!(
                "{} is missing required column '{required}'",
                path.display()
            );
        }
    }

    let mut records = Vec::new();
    for (idx, row) in reader.records().enumerate() {
        let row = row.with_context(|| format!("failed to read data row {}", idx + 2))?;
        records.push(parse_row(&row, &columns));
    }

    info!(rows = records.len(), path = %path.display(), "loaded visit dataset");
    Ok(records)
}

fn parse_row(row: &csv::StringRecord, columns: &HashMap<&'static str, usize>) -> VisitRecord {
    VisitRecord::new(
        field(row, columns, "patient_id"),
        parse_date(field(row, columns, "appointment_date")),
        field(row, columns, "doctor"),
        field(row, columns, "city"),
        field(row, columns, "gender"),
        field(row, columns, "diagnosis"),
        field(row, columns, "insurance_status"),
        field(row, columns, "status"),
        parse_number(field(row, columns, "bill_amount")),
        parse_number(field(row, columns, "satisfaction_score")),
        field(row, columns, "follow_up_required"),
        parse_number(field(row, columns, "bmi")),
    )
}

fn field<'r>(
    row: &'r csv::StringRecord,
    columns: &HashMap<&'static str, usize>,
    name: &str,
) -> &'r str {
    columns
        .get(name)
        .and_then(|&idx| row.get(idx))
        .unwrap_or("")
        .trim()
}

/// Lenient date parsing: tries each accepted format, yields `None`
/// rather than an error so a bad date only degrades derived fields.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Writes the record set as UTF-8 CSV with the canonical header row.
/// Missing values become empty fields so the file re-ingests cleanly.
pub fn export_csv(records: &[VisitRecord], path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create export file at {}", path.display()))?;
    writer.write_record(CANONICAL_COLUMNS)?;

    for record in records {
        writer.write_record(&[
            record.patient_id.clone(),
            record
                .appointment_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            record.doctor.clone(),
            record.city.clone(),
            record.gender.clone(),
            record.diagnosis.clone(),
            record.insurance_status.clone(),
            record.status.clone(),
            record.bill_amount.map(|v| v.to_string()).unwrap_or_default(),
            record
                .satisfaction_score
                .map(|v| v.to_string())
                .unwrap_or_default(),
            record.follow_up_required.clone(),
            record.bmi.map(|v| v.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush()?;
    info!(rows = records.len(), path = %path.display(), "exported visit rows");
    Ok(())
}

/// Small realistic sample so every command can be exercised out of the
/// box. Covers the chronic diagnoses, a missed visit, every BMI bucket,
/// and rows with missing date, bill, score, and bmi values.
pub fn seed_records() -> Vec<VisitRecord> {
    let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d);
    vec![
        VisitRecord::new(
            "P001",
            date(2026, 1, 5),
            "Dr. Mehta",
            "Pune",
            "Female",
            "Hypertension",
            "Insured",
            "Completed",
            Some(220.0),
            Some(4.5),
            "Yes",
            Some(31.2),
        ),
        VisitRecord::new(
            "P002",
            date(2026, 1, 5),
            "Dr. Mehta",
            "Pune",
            "Male",
            "Flu",
            "Uninsured",
            "Missed",
            Some(90.0),
            None,
            "No",
            Some(24.1),
        ),
        VisitRecord::new(
            "P003",
            date(2026, 1, 12),
            "Dr. Rao",
            "Mumbai",
            "Female",
            "Diabetes",
            "Insured",
            "Completed",
            Some(340.0),
            Some(3.8),
            "Yes",
            Some(27.6),
        ),
        VisitRecord::new(
            "P001",
            date(2026, 2, 2),
            "Dr. Mehta",
            "Pune",
            "Female",
            "Hypertension",
            "Insured",
            "Completed",
            Some(180.0),
            Some(4.0),
            "No",
            Some(30.8),
        ),
        VisitRecord::new(
            "P004",
            date(2026, 2, 9),
            "Dr. Iyer",
            "Delhi",
            "Male",
            "Migraine",
            "Uninsured",
            "Completed",
            Some(150.0),
            Some(2.9),
            "No",
            Some(17.9),
        ),
        VisitRecord::new(
            "P005",
            date(2026, 2, 9),
            "Dr. Rao",
            "Mumbai",
            "Female",
            "Obesity",
            "Insured",
            "Missed",
            None,
            None,
            "Yes",
            Some(33.4),
        ),
        VisitRecord::new(
            "P006",
            date(2026, 3, 3),
            "Dr. Iyer",
            "Delhi",
            "Male",
            "Flu",
            "Insured",
            "Completed",
            Some(75.0),
            Some(4.9),
            "No",
            Some(21.3),
        ),
        VisitRecord::new(
            "P007",
            None,
            "Dr. Rao",
            "Mumbai",
            "Male",
            "Diabetes",
            "Uninsured",
            "Completed",
            Some(410.0),
            Some(3.1),
            "Yes",
            None,
        ),
    ]
}

pub fn write_seed(path: &Path) -> anyhow::Result<()> {
    export_csv(&seed_records(), path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn headers_normalize_across_spellings() {
        assert_eq!(canonical_column("Patient ID"), Some("patient_id"));
        assert_eq!(canonical_column("  Appointment Date "), Some("appointment_date"));
        assert_eq!(canonical_column("Checkup Status"), Some("status"));
        assert_eq!(canonical_column("Follow-Up Required"), Some("follow_up_required"));
        assert_eq!(canonical_column("BMI"), Some("bmi"));
        assert_eq!(canonical_column("bill_amount"), Some("bill_amount"));
        assert_eq!(canonical_column("Payment Status"), None);
    }

    #[test]
    fn load_maps_headers_and_coerces_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("visits.csv");
        fs::write(
            &path,
            "Patient ID,Appointment Date,Doctor,City,Gender,Diagnosis,Insurance Status,Checkup Status,Bill Amount,Satisfaction Score,Follow-Up Required,BMI\n\
             P001,2026-01-05,Dr. Mehta,Pune,Female,Flu,Insured,Completed,120.5,4.2,Yes,22.0\n\
             P002,not-a-date,Dr. Rao,Mumbai,Male,Diabetes,Insured,Missed,oops,,No,\n",
        )
        .unwrap();

        let records = load(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].patient_id, "P001");
        assert_eq!(records[0].status, "Completed");
        assert_eq!(records[0].bill_amount, Some(120.5));
        assert_eq!(records[0].month, "2026-01");

        assert_eq!(records[1].appointment_date, None);
        assert_eq!(records[1].month, crate::models::UNKNOWN);
        assert_eq!(records[1].day_of_week, crate::models::UNKNOWN);
        assert_eq!(records[1].bill_amount, None);
        assert_eq!(records[1].satisfaction_score, None);
        assert_eq!(records[1].bmi, None);
    }

    #[test]
    fn load_accepts_alternate_date_formats() {
        assert_eq!(
            parse_date("2026-01-05"),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(
            parse_date("2026-01-05 14:30:00"),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(
            parse_date("01/05/2026"),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(parse_date("05-01-2026"), NaiveDate::from_ymd_opt(2026, 1, 5));
        assert_eq!(parse_date("soon"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn load_fails_on_missing_required_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.csv");
        fs::write(&path, "Patient ID,Doctor\nP001,Dr. Mehta\n").unwrap();

        let err = load(&path).unwrap_err().to_string();
        assert!(err.contains("missing required column"), "{err}");
    }

    #[test]
    fn load_fails_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("absent.csv")).is_err());
    }

    #[test]
    fn export_round_trips_modulo_derived_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let records = seed_records();

        export_csv(&records, &path).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, records);
    }
}
