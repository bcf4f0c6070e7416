use std::path::{Path, PathBuf};

use anyhow::Context;
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{info, warn};

use crate::models::{AggregationSet, ChartKind, ChartSpec};

const CHART_SIZE: (u32, u32) = (1280, 720);

const SERIES_COLORS: [RGBColor; 8] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
    RGBColor(140, 86, 75),
    RGBColor(227, 119, 194),
    RGBColor(127, 127, 127),
];

/// Projects each non-empty aggregation to its chart descriptor. Chart
/// indices are fixed per aggregation, so output filenames stay stable
/// even when some series are empty.
pub fn chart_specs(aggs: &AggregationSet) -> Vec<ChartSpec> {
    let mut specs = Vec::new();

    if !aggs.appointments_by_date.is_empty() {
        specs.push(ChartSpec {
            index: 1,
            slug: "appointments_over_time",
            title: "Appointments Over Time".to_string(),
            kind: ChartKind::Line,
            points: aggs
                .appointments_by_date
                .iter()
                .map(|p| (p.date.format("%Y-%m-%d").to_string(), p.count as f64))
                .collect(),
        });
    }
    if !aggs.revenue_by_month.is_empty() {
        specs.push(ChartSpec {
            index: 2,
            slug: "monthly_revenue",
            title: "Monthly Revenue Breakdown".to_string(),
            kind: ChartKind::Bar,
            points: aggs
                .revenue_by_month
                .iter()
                .map(|p| (p.key.clone(), p.total))
                .collect(),
        });
    }
    if !aggs.visits_by_diagnosis.is_empty() {
        specs.push(ChartSpec {
            index: 3,
            slug: "diagnosis_breakdown",
            title: "Patient Count by Diagnosis".to_string(),
            kind: ChartKind::HorizontalBar,
            points: aggs
                .visits_by_diagnosis
                .iter()
                .map(|p| (p.key.clone(), p.count as f64))
                .collect(),
        });
    }
    if !aggs.visits_by_bmi_category.is_empty() {
        specs.push(ChartSpec {
            index: 4,
            slug: "bmi_distribution",
            title: "BMI Distribution".to_string(),
            kind: ChartKind::Pie,
            points: aggs
                .visits_by_bmi_category
                .iter()
                .map(|p| (p.key.clone(), p.count as f64))
                .collect(),
        });
    }
    if !aggs.visits_by_follow_up.is_empty() {
        specs.push(ChartSpec {
            index: 5,
            slug: "follow_up_required",
            title: "Follow-Up Required".to_string(),
            kind: ChartKind::Bar,
            points: aggs
                .visits_by_follow_up
                .iter()
                .map(|p| (p.key.clone(), p.count as f64))
                .collect(),
        });
    }

    specs
}

/// Renders every spec to `<out_dir>/chart_<index>_<slug>.png`. A failed
/// render is logged and skipped; the rest of the batch still runs.
/// Returns the paths that were written.
pub fn render_all(specs: &[ChartSpec], out_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create chart directory {}", out_dir.display()))?;

    let mut written = Vec::new();
    for spec in specs {
        let path = out_dir.join(format!("chart_{}_{}.png", spec.index, spec.slug));
        match render(spec, &path) {
            Ok(()) => {
                info!(chart = spec.slug, path = %path.display(), "wrote chart");
                written.push(path);
            }
            Err(err) => {
                warn!(chart = spec.slug, error = %err, "chart render failed, continuing");
            }
        }
    }
    Ok(written)
}

fn render(spec: &ChartSpec, path: &Path) -> anyhow::Result<()> {
    if spec.points.is_empty() {
        return Ok(());
    }
    let root = BitMapBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;
    match spec.kind {
        ChartKind::Line => draw_line(spec, &root)?,
        ChartKind::Bar => draw_bars(spec, &root)?,
        ChartKind::HorizontalBar => draw_horizontal_bars(spec, &root)?,
        ChartKind::Pie => draw_pie(spec, &root)?,
    }
    root.present()?;
    Ok(())
}

fn max_value(spec: &ChartSpec) -> f64 {
    let max = spec.points.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    if max <= 0.0 {
        1.0
    } else {
        max * 1.1
    }
}

fn draw_line<DB>(spec: &ChartSpec, root: &DrawingArea<DB, Shift>) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let count = spec.points.len();
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 32))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(56)
        .build_cartesian_2d(-0.5f64..count as f64 - 0.5, 0f64..max_value(spec))?;

    chart
        .configure_mesh()
        .x_labels(count.min(10))
        .x_label_formatter(&|x| point_label(&spec.points, *x))
        .y_desc("Appointments")
        .draw()?;

    let color = SERIES_COLORS[0];
    chart.draw_series(LineSeries::new(
        spec.points
            .iter()
            .enumerate()
            .map(|(i, (_, value))| (i as f64, *value)),
        color.stroke_width(2),
    ))?;
    chart.draw_series(
        spec.points
            .iter()
            .enumerate()
            .map(|(i, (_, value))| Circle::new((i as f64, *value), 4, color.filled())),
    )?;
    Ok(())
}

fn draw_bars<DB>(spec: &ChartSpec, root: &DrawingArea<DB, Shift>) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let count = spec.points.len() as i32;
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 32))
        .margin(16)
        .x_label_area_size(56)
        .y_label_area_size(64)
        .build_cartesian_2d((0..count).into_segmented(), 0f64..max_value(spec))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|segment| segment_label(&spec.points, segment))
        .draw()?;

    chart.draw_series(spec.points.iter().enumerate().map(|(i, (_, value))| {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        let mut bar = Rectangle::new(
            [
                (SegmentValue::Exact(i as i32), 0.0),
                (SegmentValue::Exact(i as i32 + 1), *value),
            ],
            color.filled(),
        );
        bar.set_margin(0, 0, 12, 12);
        bar
    }))?;
    Ok(())
}

fn draw_horizontal_bars<DB>(spec: &ChartSpec, root: &DrawingArea<DB, Shift>) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let count = spec.points.len() as i32;
    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 32))
        .margin(16)
        .x_label_area_size(48)
        .y_label_area_size(160)
        .build_cartesian_2d(0f64..max_value(spec), (0..count).into_segmented())?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_label_formatter(&|segment| segment_label(&spec.points, segment))
        .x_desc("Visits")
        .draw()?;

    chart.draw_series(spec.points.iter().enumerate().map(|(i, (_, value))| {
        let color = SERIES_COLORS[i % SERIES_COLORS.len()];
        let mut bar = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(i as i32)),
                (*value, SegmentValue::Exact(i as i32 + 1)),
            ],
            color.filled(),
        );
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;
    Ok(())
}

fn draw_pie<DB>(spec: &ChartSpec, root: &DrawingArea<DB, Shift>) -> anyhow::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let root = root.titled(&spec.title, ("sans-serif", 32))?;
    let (width, height) = root.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) * 0.35;

    let sizes: Vec<f64> = spec.points.iter().map(|(_, value)| *value).collect();
    let labels: Vec<String> = spec.points.iter().map(|(label, _)| label.clone()).collect();
    let colors: Vec<RGBColor> = spec
        .points
        .iter()
        .enumerate()
        .map(|(i, _)| SERIES_COLORS[i % SERIES_COLORS.len()])
        .collect();

    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    pie.start_angle(-90.0);
    pie.label_style(("sans-serif", 24).into_font());
    pie.percentages(("sans-serif", 18).into_font());
    root.draw(&pie)?;
    Ok(())
}

fn point_label(points: &[(String, f64)], x: f64) -> String {
    let idx = x.round();
    if idx < 0.0 {
        return String::new();
    }
    points
        .get(idx as usize)
        .map(|(label, _)| label.clone())
        .unwrap_or_default()
}

fn segment_label(points: &[(String, f64)], segment: &SegmentValue<i32>) -> String {
    let idx = match segment {
        SegmentValue::Exact(i) | SegmentValue::CenterOf(i) => *i,
        SegmentValue::Last => return String::new(),
    };
    if idx < 0 {
        return String::new();
    }
    points
        .get(idx as usize)
        .map(|(label, _)| label.clone())
        .unwrap_or_default()
}
