use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod aggregate;
mod charts;
mod dataset;
mod filter;
mod metrics;
mod models;
mod report;

use models::FilterSelection;

#[derive(Parser)]
#[command(name = "clinic-visit-analytics")]
#[command(about = "Filter, aggregate, and report on clinic visit records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Filter flags shared by every analysis command. Each flag repeats to
/// select several values; values within one flag combine as OR, flags
/// combine as AND.
#[derive(Args)]
struct FilterArgs {
    #[arg(long = "doctor")]
    doctors: Vec<String>,
    #[arg(long = "city")]
    cities: Vec<String>,
    #[arg(long = "gender")]
    genders: Vec<String>,
    #[arg(long = "diagnosis")]
    diagnoses: Vec<String>,
    #[arg(long = "insurance")]
    insurance_statuses: Vec<String>,
}

impl FilterArgs {
    fn into_selection(self) -> FilterSelection {
        FilterSelection {
            doctors: self.doctors.into_iter().collect(),
            cities: self.cities.into_iter().collect(),
            genders: self.genders.into_iter().collect(),
            diagnoses: self.diagnoses.into_iter().collect(),
            insurance_statuses: self.insurance_statuses.into_iter().collect(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a small realistic sample dataset
    Seed {
        #[arg(long, default_value = "clinic_visits.csv")]
        out: PathBuf,
    },
    /// Print the headline KPIs
    Kpis {
        #[arg(long, default_value = "clinic_visits.csv")]
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        /// Emit the KPIs as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the grouped aggregations and their insights
    Summary {
        #[arg(long, default_value = "clinic_visits.csv")]
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "clinic_visits.csv")]
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export the filtered rows as CSV
    Export {
        #[arg(long, default_value = "clinic_visits.csv")]
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "filtered_visits.csv")]
        out: PathBuf,
    },
    /// Render one PNG chart per non-empty aggregation
    Charts {
        #[arg(long, default_value = "clinic_visits.csv")]
        input: PathBuf,
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long = "out-dir", default_value = "charts")]
        out_dir: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Seed { out } => {
            dataset::write_seed(&out)?;
            println!("Sample dataset written to {}.", out.display());
        }
        Commands::Kpis {
            input,
            filters,
            json,
        } => {
            let records = dataset::load(&input)?;
            let selection = filters.into_selection();
            let filtered = filter::apply(&records, &selection);
            let kpis = metrics::compute(&filtered);

            if json {
                println!("{}", serde_json::to_string_pretty(&kpis)?);
            } else {
                println!("KPIs for {}:", selection.label());
                println!("- Total patients: {}", kpis.total_patients);
                println!("- Chronic patients: {:.2}%", kpis.chronic_patient_pct);
                println!("- Missed appointments: {:.2}%", kpis.missed_appointment_pct);
                println!("- Total revenue: {:.0}", kpis.total_revenue);
                println!(
                    "- Average satisfaction: {}",
                    report::format_satisfaction(kpis.avg_satisfaction)
                );
            }
        }
        Commands::Summary { input, filters } => {
            let records = dataset::load(&input)?;
            let selection = filters.into_selection();
            let filtered = filter::apply(&records, &selection);
            let aggs = aggregate::compute(&filtered);

            println!(
                "Aggregations for {} ({} of {} visits):",
                selection.label(),
                filtered.len(),
                records.len()
            );
            println!(
                "{}",
                report::insight_line("Peak appointment day", aggs.peak_appointment_day.as_ref())
            );
            println!(
                "{}",
                report::insight_line("Top revenue month", aggs.top_revenue_month.as_ref())
            );
            println!(
                "{}",
                report::insight_line("Most common diagnosis", aggs.top_diagnosis.as_ref())
            );
            println!(
                "{}",
                report::insight_line("Largest BMI category", aggs.top_bmi_category.as_ref())
            );
            println!(
                "{}",
                report::insight_line("Most follow-up status", aggs.top_follow_up.as_ref())
            );
        }
        Commands::Report {
            input,
            filters,
            out,
        } => {
            let records = dataset::load(&input)?;
            let selection = filters.into_selection();
            let filtered = filter::apply(&records, &selection);
            let rendered = report::build_report(&selection, records.len(), &filtered);
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write report to {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            input,
            filters,
            out,
        } => {
            let records = dataset::load(&input)?;
            let selection = filters.into_selection();
            let filtered = filter::apply(&records, &selection);
            dataset::export_csv(&filtered, &out)?;
            println!("Exported {} visits to {}.", filtered.len(), out.display());
        }
        Commands::Charts {
            input,
            filters,
            out_dir,
        } => {
            let records = dataset::load(&input)?;
            let selection = filters.into_selection();
            let filtered = filter::apply(&records, &selection);
            let specs = charts::chart_specs(&aggregate::compute(&filtered));
            let written = charts::render_all(&specs, &out_dir)?;
            println!(
                "Rendered {} of {} charts into {}.",
                written.len(),
                specs.len(),
                out_dir.display()
            );
        }
    }

    Ok(())
}
