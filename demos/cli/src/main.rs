use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use glance_core::SummarizeConfig;
use glance_fhir::summarize_bundle_str;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "glance-cli",
    about = "Summarize a FHIR JSON bundle into a patient-at-a-glance snapshot."
)]
struct Args {
    /// Path to the bundle JSON file.
    #[arg(short, long)]
    input: PathBuf,

    /// Hours a vital sign still counts as recent.
    #[arg(long)]
    vital_recent_hours: Option<u32>,

    /// Days a dated clinical event stays on the timeline.
    #[arg(long)]
    clinical_event_days: Option<u32>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data = std::fs::read_to_string(&args.input)
        .with_context(|| format!("could not read {:?}", args.input))?;

    let mut config = SummarizeConfig::default();
    if let Some(hours) = args.vital_recent_hours {
        config.vital_recent_hours = hours;
    }
    if let Some(days) = args.clinical_event_days {
        config.clinical_event_days = days;
    }

    let snapshot = summarize_bundle_str(&data, &config)?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);

    Ok(())
}
