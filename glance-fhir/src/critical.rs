//! Critical panel extraction: allergies, active therapy, chronic problems,
//! code status, alerts and the latest vitals.

use std::cmp::Reverse;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use glance_core::{CriticalItem, CriticalSummary, Severity, SummarizeConfig, VitalSnapshot};

use crate::ingest::{ClassifiedResource, ResourceKind};
use crate::severity;

/// Conditions whose onset lies at least this far back count as chronic even
/// without a problem-list category.
const CHRONIC_ONSET_DAYS: i64 = 90;

#[derive(Debug, Clone)]
struct CodeStatusRecord {
    value: String,
    recorded_at: Option<DateTime<Utc>>,
}

/// Walk the classified resources once and pull out everything the critical
/// panel shows. `generated_at` anchors the vital recency window.
pub(crate) fn extract(
    classified: &[ClassifiedResource],
    config: &SummarizeConfig,
    generated_at: DateTime<Utc>,
) -> CriticalSummary {
    let mut allergies = Vec::new();
    let mut medications = Vec::new();
    let mut chronic_conditions = Vec::new();
    let mut alerts = Vec::new();
    let mut code_status: Option<CodeStatusRecord> = None;
    let mut vitals: BTreeMap<String, VitalSnapshot> = BTreeMap::new();

    for resource in classified {
        match &resource.kind {
            ResourceKind::Allergy { .. } => {
                if !status_is(resource.status.as_deref(), &["active"]) {
                    continue;
                }
                allergies.push(item_from(resource));
            }
            ResourceKind::Medication => {
                if !status_is(resource.status.as_deref(), &["active", "intended"]) {
                    continue;
                }
                medications.push(item_from(resource));
            }
            ResourceKind::Condition {
                chronic_category,
                onset,
                ..
            } => {
                if !status_is(
                    resource.status.as_deref(),
                    &["active", "recurrence", "relapse"],
                ) {
                    continue;
                }
                // The record date bounds the onset from below when the
                // resource carries no onset field.
                let onset = onset.or(resource.occurred_at);
                if is_chronic(*chronic_category, onset, generated_at) {
                    chronic_conditions.push(item_from(resource));
                }
            }
            ResourceKind::Observation(facts) => {
                if facts.code_status {
                    if let Some(value) = &resource.detail {
                        code_status = match &code_status {
                            Some(existing)
                                if is_more_recent(existing.recorded_at, resource.occurred_at) =>
                            {
                                code_status.clone()
                            }
                            _ => Some(CodeStatusRecord {
                                value: value.clone(),
                                recorded_at: resource.occurred_at,
                            }),
                        };
                    }
                    continue;
                }

                if let (Some(name), Some(value)) = (&facts.vital_name, &resource.detail) {
                    upsert_vital(
                        &mut vitals,
                        VitalSnapshot {
                            name: name.clone(),
                            value: value.clone(),
                            recorded_at: resource.occurred_at,
                        },
                    );
                }

                if severity::classify(resource) >= Severity::High {
                    alerts.push(item_from(resource));
                }
            }
            ResourceKind::Flag => {
                if status_is(resource.status.as_deref(), &["active"]) {
                    alerts.push(item_from(resource));
                }
            }
            ResourceKind::Encounter
            | ResourceKind::Procedure
            | ResourceKind::Document { .. }
            | ResourceKind::Other => {}
        }
    }

    let window = Duration::hours(i64::from(config.vital_recent_hours));
    let mut recent_vitals: Vec<VitalSnapshot> = vitals
        .into_values()
        .filter(|vital| within_window(vital.recorded_at, generated_at, window))
        .collect();
    recent_vitals.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

    for list in [
        &mut allergies,
        &mut medications,
        &mut chronic_conditions,
        &mut alerts,
    ] {
        list.sort_by_key(|item| Reverse(item.severity));
    }

    CriticalSummary {
        allergies,
        medications,
        chronic_conditions,
        code_status: code_status.map(|record| record.value),
        alerts,
        recent_vitals,
    }
}

fn item_from(resource: &ClassifiedResource) -> CriticalItem {
    CriticalItem {
        label: resource.display.clone(),
        detail: resource.detail.clone(),
        severity: severity::classify(resource),
    }
}

/// Entries with no status at all are treated as current.
fn status_is(status: Option<&str>, allowed: &[&str]) -> bool {
    match status {
        None => true,
        Some(code) => allowed
            .iter()
            .any(|candidate| code.eq_ignore_ascii_case(candidate)),
    }
}

fn is_chronic(flagged: bool, onset: Option<DateTime<Utc>>, generated_at: DateTime<Utc>) -> bool {
    if flagged {
        return true;
    }
    match onset {
        Some(onset) => {
            generated_at.signed_duration_since(onset) >= Duration::days(CHRONIC_ONSET_DAYS)
        }
        None => false,
    }
}

/// Undated readings pass the filter.
fn within_window(
    recorded_at: Option<DateTime<Utc>>,
    generated_at: DateTime<Utc>,
    window: Duration,
) -> bool {
    match recorded_at {
        Some(instant) => generated_at.signed_duration_since(instant) <= window,
        None => true,
    }
}

fn upsert_vital(vitals: &mut BTreeMap<String, VitalSnapshot>, snapshot: VitalSnapshot) {
    match vitals.entry(snapshot.name.clone()) {
        Entry::Occupied(mut entry) => {
            if is_more_recent(snapshot.recorded_at, entry.get().recorded_at) {
                entry.insert(snapshot);
            }
        }
        Entry::Vacant(entry) => {
            entry.insert(snapshot);
        }
    }
}

/// True when `candidate` is strictly newer. Dated beats undated; a tie keeps
/// whatever is already in place.
fn is_more_recent(candidate: Option<DateTime<Utc>>, existing: Option<DateTime<Utc>>) -> bool {
    match (candidate, existing) {
        (Some(candidate), Some(existing)) => candidate > existing,
        (Some(_), None) => true,
        _ => false,
    }
}
