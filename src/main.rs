use anyhow::Context;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

mod coord;
mod diagnostics;
mod index;
mod metrics;
mod report;
mod scan;
mod stats;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "champsim-report")]
#[command(about = "Aggregate ChampSim result logs into comparison tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a results tree and write the IPC and pinning-effect CSV tables.
    Report {
        /// Directory of champsim_*.txt result logs (scanned recursively).
        #[arg(long)]
        results: PathBuf,

        /// Output directory for the CSV tables.
        #[arg(short = 'o', long)]
        out: PathBuf,

        /// Also write the full report bundle as report.json.
        #[arg(long)]
        json: bool,
    },
    /// Print all workloads ranked by RBMPKI with intensity classes.
    Rank {
        #[arg(long)]
        results: PathBuf,

        /// Restrict to one error rate (e.g. 1e-7).
        #[arg(long)]
        rate: Option<String>,

        /// Restrict to one capacity token (e.g. 32gb).
        #[arg(long)]
        capacity: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Report { results, out, json } => run_report(&results, &out, json),
        Commands::Rank {
            results,
            rate,
            capacity,
        } => run_rank(&results, rate.as_deref(), capacity.as_deref()),
    }
}

fn run_report(results: &Path, out: &Path, json: bool) -> Result<()> {
    let index = scan::scan_results_dir(results)?;
    println!("{} records processed", index.len());
    if index.is_empty() {
        println!("no data found under {}", results.display());
        return Ok(());
    }

    let data = report::build_report_data(&index);

    fs::create_dir_all(out).with_context(|| {
        diagnostics::error_message(format!("create output directory {}", out.display()))
    })?;

    for table in &data.tables {
        let path = out.join(format!("ipc_{}_{}.csv", table.page, table.capacity));
        fs::write(&path, report::render_ipc_csv(table))
            .with_context(|| diagnostics::error_message(format!("write {}", path.display())))?;
        println!("Wrote {}", path.display());
    }

    let pinning_path = out.join("pinning_effect.csv");
    fs::write(&pinning_path, report::render_pinning_csv(&data.pinning)).with_context(|| {
        diagnostics::error_message(format!("write {}", pinning_path.display()))
    })?;
    println!("Wrote {}", pinning_path.display());

    let way_path = out.join("way_usage.csv");
    fs::write(&way_path, report::render_way_usage_csv(&data.way_usage))
        .with_context(|| diagnostics::error_message(format!("write {}", way_path.display())))?;
    println!("Wrote {}", way_path.display());

    if json {
        let json_path = out.join("report.json");
        fs::write(&json_path, serde_json::to_string_pretty(&data)?)
            .with_context(|| diagnostics::error_message(format!("write {}", json_path.display())))?;
        println!("Wrote {}", json_path.display());
    }

    Ok(())
}

fn run_rank(results: &Path, rate: Option<&str>, capacity: Option<&str>) -> Result<()> {
    let idx = scan::scan_results_dir(results)?;
    println!("{} records processed", idx.len());
    if idx.is_empty() {
        println!("no data found under {}", results.display());
        return Ok(());
    }

    let mut filter = index::CoordinateFilter::any();
    if let Some(rate) = rate {
        filter = filter.rate(rate);
    }
    if let Some(capacity) = capacity {
        filter = filter.capacity(capacity);
    }

    let ranking = report::build_rbmpki_ranking(&idx.by_coordinate(&filter));
    print!("{}", report::render_ranking_text(&ranking));
    Ok(())
}
