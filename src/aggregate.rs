use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::{
    AggregationSet, BmiCategory, DateCount, Insight, KeyedCount, KeyedSum, VisitRecord,
};

/// Computes the five grouped series and their argmax insights over one
/// filtered set. Each series has a documented, deterministic order:
/// dates and months ascending, count rankings descending by count then
/// ascending by key, BMI buckets in ordinal category order. The insight
/// tie-break leans on that order: among keys tied for the maximum, the
/// one appearing first in the series wins.
pub fn compute(records: &[VisitRecord]) -> AggregationSet {
    let appointments_by_date = appointments_by_date(records);
    let revenue_by_month = revenue_by_month(records);
    let visits_by_diagnosis = ranked_counts(records, |r| &r.diagnosis);
    let visits_by_bmi_category = bmi_distribution(records);
    let visits_by_follow_up = ranked_counts(records, |r| &r.follow_up_required);

    let peak_appointment_day = first_max_by(&appointments_by_date, |p| p.count as f64)
        .map(|p| Insight {
            key: p.date.format("%Y-%m-%d").to_string(),
            value: p.count as f64,
        });
    let top_revenue_month = first_max_by(&revenue_by_month, |p| p.total).map(|p| Insight {
        key: p.key.clone(),
        value: p.total,
    });
    let top_diagnosis = count_insight(&visits_by_diagnosis);
    let top_bmi_category = count_insight(&visits_by_bmi_category);
    let top_follow_up = count_insight(&visits_by_follow_up);

    AggregationSet {
        appointments_by_date,
        revenue_by_month,
        visits_by_diagnosis,
        visits_by_bmi_category,
        visits_by_follow_up,
        peak_appointment_day,
        top_revenue_month,
        top_diagnosis,
        top_bmi_category,
        top_follow_up,
    }
}

/// Visit count per parsed appointment date, ascending. Rows whose date
/// failed to parse have no position on a time axis and are excluded
/// here; they still surface in the month series under the sentinel.
fn appointments_by_date(records: &[VisitRecord]) -> Vec<DateCount> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for record in records {
        if let Some(date) = record.appointment_date {
            *counts.entry(date).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .map(|(date, count)| DateCount { date, count })
        .collect()
}

/// Billed revenue per calendar month, ascending by month string; the
/// "Unknown" month sorts after every "YYYY-MM" key.
fn revenue_by_month(records: &[VisitRecord]) -> Vec<KeyedSum> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        *sums.entry(record.month.clone()).or_default() += record.bill_amount.unwrap_or(0.0);
    }
    sums.into_iter()
        .map(|(key, total)| KeyedSum { key, total })
        .collect()
}

/// Row count per key, descending by count with ties broken by ascending
/// key so the ranking is stable across runs.
fn ranked_counts<F>(records: &[VisitRecord], key: F) -> Vec<KeyedCount>
where
    F: Fn(&VisitRecord) -> &str,
{
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in records {
        *counts.entry(key(record).to_string()).or_default() += 1;
    }
    let mut ranked: Vec<KeyedCount> = counts
        .into_iter()
        .map(|(key, count)| KeyedCount { key, count })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked
}

/// Row count per BMI bucket in ordinal order (Underweight through
/// Unknown), omitting empty buckets.
fn bmi_distribution(records: &[VisitRecord]) -> Vec<KeyedCount> {
    let mut counts = [0usize; BmiCategory::ALL.len()];
    for record in records {
        counts[record.bmi_category as usize] += 1;
    }
    BmiCategory::ALL
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(category, count)| KeyedCount {
            key: category.to_string(),
            count,
        })
        .collect()
}

fn count_insight(series: &[KeyedCount]) -> Option<Insight> {
    first_max_by(series, |p| p.count as f64).map(|p| Insight {
        key: p.key.clone(),
        value: p.count as f64,
    })
}

/// First item carrying the maximum value; later ties never replace an
/// earlier winner.
fn first_max_by<T, F>(items: &[T], value: F) -> Option<&T>
where
    F: Fn(&T) -> f64,
{
    let mut best: Option<(&T, f64)> = None;
    for item in items {
        let candidate = value(item);
        match best {
            Some((_, current)) if candidate <= current => {}
            _ => best = Some((item, candidate)),
        }
    }
    best.map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics;

    fn visit(
        patient: &str,
        date: Option<NaiveDate>,
        diagnosis: &str,
        bill: Option<f64>,
        follow_up: &str,
        bmi: Option<f64>,
    ) -> VisitRecord {
        VisitRecord::new(
            patient,
            date,
            "Dr. Mehta",
            "Pune",
            "Female",
            diagnosis,
            "Insured",
            "Completed",
            bill,
            None,
            follow_up,
            bmi,
        )
    }

    fn day(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 1, d)
    }

    fn sample() -> Vec<VisitRecord> {
        vec![
            visit("P001", day(5), "Flu", Some(100.0), "Yes", Some(17.0)),
            visit("P002", day(5), "Flu", Some(50.0), "No", Some(24.0)),
            visit("P003", day(12), "Diabetes", Some(300.0), "No", Some(29.0)),
            visit("P004", NaiveDate::from_ymd_opt(2026, 2, 2), "Asthma", Some(80.0), "Yes", Some(31.0)),
            visit("P005", None, "Asthma", Some(40.0), "No", None),
        ]
    }

    #[test]
    fn appointment_series_is_date_ascending_and_skips_null_dates() {
        let aggs = compute(&sample());
        let dates: Vec<_> = aggs
            .appointments_by_date
            .iter()
            .map(|p| (p.date, p.count))
            .collect();
        assert_eq!(
            dates,
            vec![
                (day(5).unwrap(), 2),
                (day(12).unwrap(), 1),
                (NaiveDate::from_ymd_opt(2026, 2, 2).unwrap(), 1),
            ]
        );
        assert_eq!(
            aggs.peak_appointment_day,
            Some(Insight {
                key: "2026-01-05".to_string(),
                value: 2.0,
            })
        );
    }

    #[test]
    fn month_series_keeps_unknown_bucket_last() {
        let aggs = compute(&sample());
        let months: Vec<&str> = aggs.revenue_by_month.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(months, vec!["2026-01", "2026-02", "Unknown"]);
        assert_eq!(aggs.revenue_by_month[0].total, 450.0);
        assert_eq!(
            aggs.top_revenue_month,
            Some(Insight {
                key: "2026-01".to_string(),
                value: 450.0,
            })
        );
    }

    #[test]
    fn diagnosis_ranking_is_count_desc_then_key_asc() {
        let aggs = compute(&sample());
        let keys: Vec<&str> = aggs
            .visits_by_diagnosis
            .iter()
            .map(|p| p.key.as_str())
            .collect();
        // Asthma and Flu tie at 2; Asthma sorts first alphabetically.
        assert_eq!(keys, vec!["Asthma", "Flu", "Diabetes"]);
        assert_eq!(aggs.top_diagnosis.as_ref().unwrap().key, "Asthma");
    }

    #[test]
    fn bmi_series_follows_ordinal_order() {
        let aggs = compute(&sample());
        let keys: Vec<&str> = aggs
            .visits_by_bmi_category
            .iter()
            .map(|p| p.key.as_str())
            .collect();
        assert_eq!(keys, vec!["Underweight", "Normal", "Overweight", "Obesity", "Unknown"]);
        assert_eq!(
            aggs.visits_by_bmi_category.iter().map(|p| p.count).collect::<Vec<_>>(),
            vec![1, 1, 1, 1, 1]
        );
        // All buckets tie at 1; the ordinal-first bucket wins.
        assert_eq!(aggs.top_bmi_category.as_ref().unwrap().key, "Underweight");
    }

    #[test]
    fn follow_up_tie_resolves_to_first_ranked_key() {
        let records = vec![
            visit("P001", day(5), "Flu", Some(10.0), "Yes", None),
            visit("P002", day(6), "Flu", Some(10.0), "No", None),
        ];
        let aggs = compute(&records);
        // "No" and "Yes" tie; ranking is key-ascending within the tie.
        assert_eq!(aggs.top_follow_up.as_ref().unwrap().key, "No");
    }

    #[test]
    fn grouped_counts_reconcile_with_row_and_revenue_totals() {
        let records = sample();
        let aggs = compute(&records);
        let kpis = metrics::compute(&records);

        let diagnosis_total: usize = aggs.visits_by_diagnosis.iter().map(|p| p.count).sum();
        let bmi_total: usize = aggs.visits_by_bmi_category.iter().map(|p| p.count).sum();
        let follow_up_total: usize = aggs.visits_by_follow_up.iter().map(|p| p.count).sum();
        assert_eq!(diagnosis_total, records.len());
        assert_eq!(bmi_total, records.len());
        assert_eq!(follow_up_total, records.len());

        let month_revenue: f64 = aggs.revenue_by_month.iter().map(|p| p.total).sum();
        assert!((month_revenue - kpis.total_revenue).abs() < 1e-9);
    }

    #[test]
    fn empty_set_yields_empty_series_and_no_insights() {
        let aggs = compute(&[]);
        assert!(aggs.appointments_by_date.is_empty());
        assert!(aggs.revenue_by_month.is_empty());
        assert!(aggs.visits_by_diagnosis.is_empty());
        assert!(aggs.visits_by_bmi_category.is_empty());
        assert!(aggs.visits_by_follow_up.is_empty());
        assert!(aggs.peak_appointment_day.is_none());
        assert!(aggs.top_revenue_month.is_none());
        assert!(aggs.top_diagnosis.is_none());
        assert!(aggs.top_bmi_category.is_none());
        assert!(aggs.top_follow_up.is_none());
    }
}
