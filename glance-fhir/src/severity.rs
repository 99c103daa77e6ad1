//! Severity classification shared by the critical panel and the timeline,
//! so the same resource never shows two different levels.

use glance_core::Severity;

use crate::ingest::{ClassifiedResource, ResourceKind};

/// Medications that warrant review whenever they appear on an active list.
const HIGH_ALERT_MEDICATIONS: &[&str] = &[
    "insulin",
    "heparin",
    "warfarin",
    "fentanyl",
    "morphine",
    "hydromorphone",
    "oxycodone",
    "methotrexate",
    "potassium chloride",
    "digoxin",
    "amiodarone",
    "norepinephrine",
    "epinephrine",
];

/// Map a classified resource onto the severity scale. Total: every input
/// lands on some level, and unrecognized codes never escalate.
pub(crate) fn classify(resource: &ClassifiedResource) -> Severity {
    match &resource.kind {
        ResourceKind::Allergy { criticality } => allergy_severity(criticality.as_deref()),
        ResourceKind::Observation(facts) => {
            if facts.code_status {
                Severity::Critical
            } else {
                interpretation_severity(&facts.interpretations)
            }
        }
        ResourceKind::Condition { severity_code, .. } => {
            condition_severity(severity_code.as_deref())
        }
        ResourceKind::Medication => medication_severity(&resource.display),
        ResourceKind::Flag => flag_severity(resource.status.as_deref()),
        ResourceKind::Procedure => Severity::Moderate,
        ResourceKind::Document { .. } => Severity::Low,
        ResourceKind::Encounter | ResourceKind::Other => Severity::Info,
    }
}

fn allergy_severity(criticality: Option<&str>) -> Severity {
    match criticality {
        Some("high") => Severity::Critical,
        Some("low") => Severity::Moderate,
        // An undocumented criticality still deserves a look.
        None => Severity::Moderate,
        // "unable-to-assess" and anything unrecognized.
        Some(_) => Severity::Info,
    }
}

/// Strongest level across the observation's interpretation codes. Handles
/// both the coded forms (`H`, `HH`, ...) and spelled-out display text.
fn interpretation_severity(codes: &[String]) -> Severity {
    let mut strongest = Severity::Info;
    for code in codes {
        let lower = code.to_lowercase();
        let level = if matches!(lower.as_str(), "hh" | "ll" | "aa") || lower.contains("critical") {
            Severity::Critical
        } else if matches!(lower.as_str(), "h" | "l" | "a")
            || lower.contains("abnormal")
            || lower.contains("high")
            || lower.contains("low")
        {
            Severity::High
        } else {
            Severity::Info
        };
        strongest = strongest.max(level);
    }
    strongest
}

fn condition_severity(code: Option<&str>) -> Severity {
    match code {
        Some(code) if code.to_lowercase().contains("severe") => Severity::High,
        _ => Severity::Low,
    }
}

fn medication_severity(name: &str) -> Severity {
    let normalized = name.to_lowercase();
    if HIGH_ALERT_MEDICATIONS
        .iter()
        .any(|drug| normalized.contains(drug))
    {
        Severity::High
    } else {
        Severity::Moderate
    }
}

fn flag_severity(status: Option<&str>) -> Severity {
    match status {
        None | Some("active") => Severity::High,
        Some(_) => Severity::Info,
    }
}
