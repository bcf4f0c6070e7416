use std::fmt::Write;

use crate::aggregate;
use crate::metrics;
use crate::models::{AggregationSet, FilterSelection, Insight, KpiSummary, VisitRecord};

const EMPTY_LINE: &str = "No visits matched the current filters.";

/// Builds the markdown report for one filtered set: KPIs, the five
/// grouped series, and an insight/recommendation pair per non-empty
/// series. Formatting only; the aggregation results pass through
/// unchanged.
pub fn build_report(
    selection: &FilterSelection,
    total_rows: usize,
    filtered: &[VisitRecord],
) -> String {
    let kpis = metrics::compute(filtered);
    let aggs = aggregate::compute(filtered);

    let mut output = String::new();
    let _ = writeln!(output, "# Clinic Visit Analytics Report");
    let _ = writeln!(
        output,
        "Generated for {} ({} of {} visits)",
        selection.label(),
        filtered.len(),
        total_rows
    );

    write_kpi_section(&mut output, &kpis);
    write_appointments_section(&mut output, &aggs);
    write_revenue_section(&mut output, &aggs);
    write_diagnosis_section(&mut output, &aggs);
    write_bmi_section(&mut output, &aggs);
    write_follow_up_section(&mut output, &aggs);

    output
}

pub fn format_satisfaction(avg: Option<f64>) -> String {
    match avg {
        Some(value) => format!("{value:.2}"),
        None => "N/A".to_string(),
    }
}

fn write_kpi_section(output: &mut String, kpis: &KpiSummary) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Key Indicators");
    let _ = writeln!(output, "- Total patients: {}", kpis.total_patients);
    let _ = writeln!(output, "- Chronic patients: {:.2}%", kpis.chronic_patient_pct);
    let _ = writeln!(
        output,
        "- Missed appointments: {:.2}%",
        kpis.missed_appointment_pct
    );
    let _ = writeln!(output, "- Total revenue: {:.0}", kpis.total_revenue);
    let _ = writeln!(
        output,
        "- Average satisfaction: {}",
        format_satisfaction(kpis.avg_satisfaction)
    );
}

fn write_appointments_section(output: &mut String, aggs: &AggregationSet) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Appointments Over Time");
    if aggs.appointments_by_date.is_empty() {
        let _ = writeln!(output, "{EMPTY_LINE}");
        return;
    }
    for point in &aggs.appointments_by_date {
        let _ = writeln!(output, "- {}: {} appointments", point.date, point.count);
    }
    if let Some(peak) = &aggs.peak_appointment_day {
        write_insight_pair(
            output,
            &format!(
                "Peak appointment day: {} with {:.0} appointments.",
                peak.key, peak.value
            ),
            &format!(
                "Ensure adequate staff on {} to handle high patient load.",
                peak.key
            ),
        );
    }
}

fn write_revenue_section(output: &mut String, aggs: &AggregationSet) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Monthly Revenue Breakdown");
    if aggs.revenue_by_month.is_empty() {
        let _ = writeln!(output, "{EMPTY_LINE}");
        return;
    }
    for point in &aggs.revenue_by_month {
        let _ = writeln!(output, "- {}: {:.0}", point.key, point.total);
    }
    if let Some(top) = &aggs.top_revenue_month {
        write_insight_pair(
            output,
            &format!("Highest revenue month: {} ({:.0}).", top.key, top.value),
            "Review billing or promotions for low revenue months to increase earnings.",
        );
    }
}

fn write_diagnosis_section(output: &mut String, aggs: &AggregationSet) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Patient Count by Diagnosis");
    if aggs.visits_by_diagnosis.is_empty() {
        let _ = writeln!(output, "{EMPTY_LINE}");
        return;
    }
    for point in &aggs.visits_by_diagnosis {
        let _ = writeln!(output, "- {}: {} visits", point.key, point.count);
    }
    if let Some(top) = &aggs.top_diagnosis {
        write_insight_pair(
            output,
            &format!("Most common diagnosis: {} ({:.0} visits).", top.key, top.value),
            &format!(
                "Consider patient education or preventive programs for {}.",
                top.key
            ),
        );
    }
}

fn write_bmi_section(output: &mut String, aggs: &AggregationSet) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## BMI Distribution");
    if aggs.visits_by_bmi_category.is_empty() {
        let _ = writeln!(output, "{EMPTY_LINE}");
        return;
    }
    for point in &aggs.visits_by_bmi_category {
        let _ = writeln!(output, "- {}: {} visits", point.key, point.count);
    }
    if let Some(top) = &aggs.top_bmi_category {
        write_insight_pair(
            output,
            &format!("Majority BMI category: {} ({:.0} patients).", top.key, top.value),
            &format!("Develop wellness programs targeting {} patients.", top.key),
        );
    }
}

fn write_follow_up_section(output: &mut String, aggs: &AggregationSet) {
    let _ = writeln!(output);
    let _ = writeln!(output, "## Follow-Up Required");
    if aggs.visits_by_follow_up.is_empty() {
        let _ = writeln!(output, "{EMPTY_LINE}");
        return;
    }
    for point in &aggs.visits_by_follow_up {
        let _ = writeln!(output, "- {}: {} cases", point.key, point.count);
    }
    if let Some(top) = &aggs.top_follow_up {
        write_insight_pair(
            output,
            &format!("Most follow-up status: {} ({:.0} cases).", top.key, top.value),
            &format!(
                "Allocate resources to manage patients requiring '{}' follow-ups effectively.",
                top.key
            ),
        );
    }
}

fn write_insight_pair(output: &mut String, insight: &str, recommendation: &str) {
    let _ = writeln!(output, "**Insight:** {insight}");
    let _ = writeln!(output, "**Recommendation:** {recommendation}");
}

/// Formats one insight for terminal output.
pub fn insight_line(label: &str, insight: Option<&Insight>) -> String {
    match insight {
        Some(fact) => format!("- {label}: {} ({:.0})", fact.key, fact.value),
        None => format!("- {label}: no data"),
    }
}
