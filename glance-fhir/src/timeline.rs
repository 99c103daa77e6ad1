//! Timeline construction: per-kind event mapping, the clinical window,
//! duplicate suppression and ordering.

use std::cmp::Reverse;
use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use glance_core::{EventCategory, Severity, SummarizeConfig, TimelineEvent};

use crate::ingest::{ClassifiedResource, ResourceKind};
use crate::severity;

/// Turn classified resources into timeline events, newest first.
///
/// Dated events older than the clinical window are dropped; undated ones are
/// kept and sort to the tail in ingestion order. The first event to claim an
/// id wins, later duplicates are skipped.
pub(crate) fn build(
    classified: &[ClassifiedResource],
    config: &SummarizeConfig,
    generated_at: DateTime<Utc>,
) -> Vec<TimelineEvent> {
    let window = Duration::days(i64::from(config.clinical_event_days));
    let mut events = Vec::new();
    let mut seen = HashSet::new();

    for resource in classified {
        let severity = severity::classify(resource);
        let Some((category, title)) = categorize(resource, severity) else {
            continue;
        };

        if let Some(occurred_at) = resource.occurred_at {
            if generated_at.signed_duration_since(occurred_at) > window {
                tracing::debug!(id = %resource.id, "event outside the clinical window skipped");
                continue;
            }
        }

        let id = format!("{}-{}", resource.kind.slug(), resource.id);
        if !seen.insert(id.clone()) {
            tracing::debug!(id = %id, "duplicate event id skipped");
            continue;
        }

        events.push(TimelineEvent {
            id,
            category,
            title,
            detail: resource.detail.clone(),
            occurred_at: resource.occurred_at,
            severity,
            source: resource.source.clone(),
        });
    }

    events.sort_by_key(|event| Reverse(event.occurred_at));
    events
}

fn categorize(
    resource: &ClassifiedResource,
    severity: Severity,
) -> Option<(EventCategory, String)> {
    match &resource.kind {
        ResourceKind::Allergy { .. } => Some((
            EventCategory::Other,
            format!("Allergy documented: {}", resource.display),
        )),
        ResourceKind::Medication => Some((EventCategory::Medication, resource.display.clone())),
        ResourceKind::Condition { .. } => {
            Some((EventCategory::Condition, resource.display.clone()))
        }
        ResourceKind::Observation(facts) => {
            if facts.code_status {
                return Some((EventCategory::Observation, "Code status updated".to_string()));
            }
            // In-range vitals belong to the critical panel, not the timeline.
            if facts.vital_name.is_some() && severity < Severity::High {
                return None;
            }
            Some((EventCategory::Observation, resource.display.clone()))
        }
        ResourceKind::Encounter => Some((
            EventCategory::Encounter,
            format!("Encounter: {}", resource.display),
        )),
        ResourceKind::Procedure => Some((EventCategory::Procedure, resource.display.clone())),
        ResourceKind::Document { note } => {
            let category = if *note {
                EventCategory::Note
            } else {
                EventCategory::Document
            };
            Some((category, resource.display.clone()))
        }
        // Flags surface as alerts on the critical panel only.
        ResourceKind::Flag => None,
        ResourceKind::Other => Some((EventCategory::Other, resource.display.clone())),
    }
}
