//! FHIR R4 bundle screening into a `TimelineSnapshot`.
//!
//! The pipeline runs in fixed stages: ingestion classifies bundle entries
//! into a closed set of kinds, the critical extractor pulls out the
//! always-visible panel, the timeline builder windows and orders the events,
//! and the assembler stamps the snapshot. All recency decisions share one
//! clock reading taken at the public entry point.

mod critical;
mod fields;
mod ingest;
mod severity;
mod timeline;

use chrono::{DateTime, Utc};
use serde_json::Value;

use glance_core::{MalformedBundle, SummarizeConfig, TimelineSnapshot};

/// Summarize a bundle supplied as JSON text.
pub fn summarize_bundle_str(
    bundle_json: &str,
    config: &SummarizeConfig,
) -> Result<TimelineSnapshot, MalformedBundle> {
    let value: Value = serde_json::from_str(bundle_json)
        .map_err(|err| MalformedBundle::Unparseable(err.to_string()))?;
    summarize_bundle_value(&value, config)
}

/// Summarize a bundle already parsed into a `serde_json::Value`.
pub fn summarize_bundle_value(
    bundle: &Value,
    config: &SummarizeConfig,
) -> Result<TimelineSnapshot, MalformedBundle> {
    summarize_at(bundle, config, Utc::now())
}

fn summarize_at(
    bundle: &Value,
    config: &SummarizeConfig,
    generated_at: DateTime<Utc>,
) -> Result<TimelineSnapshot, MalformedBundle> {
    let classified = ingest::ingest(bundle)?;
    let critical = critical::extract(&classified, config, generated_at);
    let events = timeline::build(&classified, config, generated_at);
    Ok(TimelineSnapshot::assemble(generated_at, critical, events))
}
