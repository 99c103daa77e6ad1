//! Published data model for the patient-at-a-glance snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Windows that bound what counts as "recent" in the snapshot.
///
/// Both fields fall back to their defaults when absent from a JSON config,
/// so partially specified configs are accepted everywhere one is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SummarizeConfig {
    /// Hours before generation time a vital sign still counts as recent.
    #[serde(default = "default_vital_recent_hours")]
    pub vital_recent_hours: u32,
    /// Days before generation time a dated clinical event is retained.
    #[serde(default = "default_clinical_event_days")]
    pub clinical_event_days: u32,
}

fn default_vital_recent_hours() -> u32 {
    6
}

fn default_clinical_event_days() -> u32 {
    30
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            vital_recent_hours: default_vital_recent_hours(),
            clinical_event_days: default_clinical_event_days(),
        }
    }
}

/// Urgency classification shared by critical items and timeline events.
///
/// Variants are declared least to most urgent, so the derived ordering is
/// `critical > high > moderate > low > info`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Low,
    Moderate,
    High,
    Critical,
}

/// One curated entry of the critical overview (an allergy, a medication...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriticalItem {
    pub label: String,
    pub detail: Option<String>,
    pub severity: Severity,
}

/// Latest reading of one vital sign, value already rendered for display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VitalSnapshot {
    pub name: String,
    pub value: String,
    pub recorded_at: Option<DateTime<Utc>>,
}

/// High-priority subset a clinician should see before anything else.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CriticalSummary {
    pub allergies: Vec<CriticalItem>,
    pub medications: Vec<CriticalItem>,
    pub chronic_conditions: Vec<CriticalItem>,
    pub code_status: Option<String>,
    pub alerts: Vec<CriticalItem>,
    pub recent_vitals: Vec<VitalSnapshot>,
}

/// One normalized clinical occurrence on the timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    /// Derived as `<kind slug>-<resource id>` (e.g. `allergy-alg-1`), where
    /// the slug is the lowercase classified resource kind and the resource
    /// id falls back to the bundle entry position (`entry-3`). Identical
    /// input bundles therefore reproduce identical ids.
    pub id: String,
    pub category: EventCategory,
    pub title: String,
    pub detail: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub severity: Severity,
    pub source: Option<ResourceReference>,
}

/// Presentation grouping for timeline events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Encounter,
    Procedure,
    Condition,
    Medication,
    Observation,
    Document,
    Note,
    Other,
}

/// Back-link to the originating resource (FHIR reference, URL...).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceReference {
    pub system: Option<String>,
    pub reference: Option<String>,
    pub display: Option<String>,
}

/// The complete framework-neutral snapshot handed to rendering layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineSnapshot {
    pub generated_at: DateTime<Utc>,
    pub critical: CriticalSummary,
    pub events: Vec<TimelineEvent>,
}

impl TimelineSnapshot {
    /// Combine the two pipeline outputs under the instant the wall clock
    /// was read for this call. Events must already be ordered.
    pub fn assemble(
        generated_at: DateTime<Utc>,
        critical: CriticalSummary,
        events: Vec<TimelineEvent>,
    ) -> Self {
        Self {
            generated_at,
            critical,
            events,
        }
    }

    /// The curated critical overview.
    pub fn critical_panel(&self) -> &CriticalSummary {
        &self.critical
    }

    /// Chronologically ordered events, most recent first.
    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.events
    }
}

/// The single fatal failure: the input is not a recognizable bundle.
///
/// Per-resource problems never surface here; malformed entries are skipped
/// and the call still produces a complete snapshot.
#[derive(Debug, thiserror::Error)]
pub enum MalformedBundle {
    #[error("bundle JSON could not be parsed: {0}")]
    Unparseable(String),
    #[error("bundle must be a JSON object")]
    NotAnObject,
    #[error("expected resourceType \"Bundle\", found {found:?}")]
    NotABundle { found: Option<String> },
    #[error("bundle entry is missing or not an array")]
    EntriesNotAnArray,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Moderate);
        assert!(Severity::Moderate > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn severity_serializes_snake_case() {
        let rendered = serde_json::to_string(&Severity::Moderate).unwrap();
        assert_eq!(rendered, "\"moderate\"");
    }

    #[test]
    fn config_fields_fall_back_individually() {
        let config: SummarizeConfig = serde_json::from_str("{\"vital_recent_hours\":24}").unwrap();
        assert_eq!(config.vital_recent_hours, 24);
        assert_eq!(config.clinical_event_days, 30);

        let config: SummarizeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, SummarizeConfig::default());
    }

    #[test]
    fn summary_defaults_to_empty_sequences() {
        let summary = CriticalSummary::default();
        assert!(summary.allergies.is_empty());
        assert!(summary.recent_vitals.is_empty());
        assert!(summary.code_status.is_none());
    }
}
