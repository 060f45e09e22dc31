use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use carsales_report::pipeline::{self, ReportConfig};
use carsales_report::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "carsales-report")]
#[command(about = "Generate the car sales chart report from a CSV or JSON table", long_about = None)]
struct Args {
    /// Input table (CSV, or JSON records for .json paths)
    #[arg(short, long, default_value = "car_sales.csv")]
    input: PathBuf,

    /// Directory the chart images are written to
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Image format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Png)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    env_logger::Builder::default()
        .filter_level(LevelFilter::Warn)
        .parse_env(env_logger::Env::default().filter_or("CARSALES_LOG", "warn,carsales_report=info"))
        .init();

    let args = Args::parse();
    let config = ReportConfig {
        input: args.input,
        out_dir: args.out_dir,
        format: args.format,
    };

    let written = pipeline::run(&config).context("Failed to generate report")?;
    log::info!("Wrote {} charts to {}", written.len(), config.out_dir.display());

    Ok(())
}
