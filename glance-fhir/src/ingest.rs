//! Bundle walking and per-resource classification.
//!
//! A bundle is screened once, front to back. Every entry either becomes a
//! [`ClassifiedResource`] or is skipped with a debug log line; only a
//! malformed envelope aborts the whole run.

use chrono::{DateTime, Utc};
use serde_json::Value;

use glance_core::{MalformedBundle, ResourceReference};

use crate::fields;

/// One bundle entry after classification, carrying the normalized fields
/// every later stage reads instead of the raw JSON.
#[derive(Debug, Clone)]
pub(crate) struct ClassifiedResource {
    pub id: String,
    pub kind: ResourceKind,
    pub status: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub display: String,
    pub detail: Option<String>,
    pub source: Option<ResourceReference>,
}

/// Closed set of resource shapes the pipeline understands. Facts that only
/// one downstream rule needs ride along on the variant.
#[derive(Debug, Clone)]
pub(crate) enum ResourceKind {
    Allergy {
        criticality: Option<String>,
    },
    Medication,
    Condition {
        severity_code: Option<String>,
        chronic_category: bool,
        onset: Option<DateTime<Utc>>,
    },
    Observation(ObservationFacts),
    Encounter,
    Procedure,
    Document {
        note: bool,
    },
    Flag,
    Other,
}

#[derive(Debug, Clone)]
pub(crate) struct ObservationFacts {
    pub interpretations: Vec<String>,
    pub vital_name: Option<String>,
    pub code_status: bool,
}

impl ResourceKind {
    /// Stable slug used as the prefix of timeline event ids.
    pub(crate) fn slug(&self) -> &'static str {
        match self {
            ResourceKind::Allergy { .. } => "allergy",
            ResourceKind::Medication => "medication",
            ResourceKind::Condition { .. } => "condition",
            ResourceKind::Observation(_) => "observation",
            ResourceKind::Encounter => "encounter",
            ResourceKind::Procedure => "procedure",
            ResourceKind::Document { .. } => "document",
            ResourceKind::Flag => "flag",
            ResourceKind::Other => "other",
        }
    }
}

/// Validate the bundle envelope and classify its entries.
///
/// The `entry` array must be present, even when empty. Entries that cannot
/// be classified are dropped, never turned into errors.
pub(crate) fn ingest(bundle: &Value) -> Result<Vec<ClassifiedResource>, MalformedBundle> {
    let root = bundle.as_object().ok_or(MalformedBundle::NotAnObject)?;

    match root.get("resourceType").and_then(Value::as_str) {
        Some("Bundle") => {}
        found => {
            return Err(MalformedBundle::NotABundle {
                found: found.map(str::to_string),
            })
        }
    }

    let entries = root
        .get("entry")
        .and_then(Value::as_array)
        .ok_or(MalformedBundle::EntriesNotAnArray)?;

    let mut classified = Vec::with_capacity(entries.len());
    for (position, entry) in entries.iter().enumerate() {
        let Some(resource) = entry.get("resource") else {
            tracing::debug!(position, "bundle entry has no resource, skipping");
            continue;
        };
        match classify_resource(resource, position) {
            Some(record) => classified.push(record),
            None => {
                let resource_type = resource
                    .get("resourceType")
                    .and_then(Value::as_str)
                    .unwrap_or("<missing>");
                tracing::debug!(position, resource_type, "bundle entry skipped");
            }
        }
    }

    Ok(classified)
}

fn classify_resource(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    match resource_type {
        "AllergyIntolerance" => allergy(resource, position),
        "MedicationStatement" | "MedicationRequest" => medication(resource, resource_type, position),
        "Condition" => condition(resource, position),
        "Observation" => observation(resource, position),
        "Encounter" => encounter(resource, position),
        "Procedure" => procedure(resource, position),
        "DocumentReference" | "Composition" => document(resource, position),
        "Flag" => flag(resource, position),
        other => unrecognized(resource, other, position),
    }
}

fn allergy(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let substance = resource.get("code").and_then(fields::codeable_text)?;

    let mut phrases = Vec::new();
    if let Some(categories) = resource.get("category").and_then(Value::as_array) {
        let listed: Vec<String> = categories
            .iter()
            .filter_map(Value::as_str)
            .map(fields::capitalize_first)
            .collect();
        if !listed.is_empty() {
            phrases.push(format!("Category: {}.", listed.join(", ")));
        }
    }
    if let Some(reactions) = summarize_reactions(resource) {
        phrases.push(format!("Reaction: {reactions}."));
    }

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Allergy {
            criticality: resource
                .get("criticality")
                .and_then(Value::as_str)
                .map(str::to_string),
        },
        status: fields::status_text(resource.get("clinicalStatus")),
        occurred_at: fields::datetime_field(
            resource,
            &["recordedDate", "onsetDateTime", "onsetDate"],
        ),
        display: substance,
        detail: join_phrases(phrases),
        source: make_reference(resource),
    })
}

fn medication(resource: &Value, resource_type: &str, position: usize) -> Option<ClassifiedResource> {
    let name = resource
        .get("medicationCodeableConcept")
        .and_then(fields::codeable_text)
        .or_else(|| {
            resource
                .get("medicationReference")
                .and_then(|reference| reference.get("display"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Medication not specified".to_string());

    let status = resource.get("status").and_then(Value::as_str);

    let mut phrases = Vec::new();
    phrases.push(match status.unwrap_or("unknown") {
        "active" => "Active medication.".to_string(),
        "intended" => "Planned therapy.".to_string(),
        "completed" => "Course completed.".to_string(),
        "on-hold" => "Therapy on hold.".to_string(),
        other => format!("Status {other}."),
    });

    if let Some(reason) = resource
        .get("reasonCode")
        .and_then(Value::as_array)
        .and_then(|reasons| reasons.first())
        .and_then(fields::codeable_text)
    {
        phrases.push(format!("Indication: {reason}."));
    }

    if let Some(dose_phrases) = summarize_dosage(resource) {
        phrases.extend(dose_phrases);
    }

    // Requests are dated by when they were authored, statements by when the
    // therapy was in effect.
    let timestamp_fields: &[&str] = if resource_type == "MedicationRequest" {
        &["authoredOn", "effectiveDateTime", "effectivePeriod"]
    } else {
        &["effectiveDateTime", "effectivePeriod", "dateAsserted", "authoredOn"]
    };

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Medication,
        status: status.map(str::to_string),
        occurred_at: fields::datetime_field(resource, timestamp_fields),
        display: name,
        detail: join_phrases(phrases),
        source: make_reference(resource),
    })
}

fn condition(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let name = resource.get("code").and_then(fields::codeable_text)?;

    let status = fields::status_text(resource.get("clinicalStatus"));
    let severity_code = fields::status_text(resource.get("severity"));

    let mut phrases = Vec::new();
    if let Some(status) = &status {
        phrases.push(format!("Status {status}."));
    }
    if let Some(severity_text) = &severity_code {
        phrases.push(format!("Severity {severity_text}."));
    }

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Condition {
            severity_code,
            chronic_category: fields::category_matches(resource, "problem-list")
                || fields::category_matches(resource, "chronic"),
            onset: fields::datetime_field(resource, &["onsetDateTime", "onsetPeriod", "onsetDate"]),
        },
        status,
        occurred_at: fields::datetime_field(
            resource,
            &["recordedDate", "onsetDateTime", "onsetDate", "assertedDate"],
        ),
        display: name,
        detail: join_phrases(phrases),
        source: make_reference(resource),
    })
}

fn observation(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let name = resource.get("code").and_then(fields::codeable_text)?;

    let code_status = observation_is_code_status(resource);
    let value = if code_status {
        observation_value_text(resource)?
    } else {
        summarize_observation_value(resource)?
    };

    let vital_name = if code_status {
        None
    } else {
        infer_vital_label(&name)
            .map(str::to_string)
            .or_else(|| fields::category_matches(resource, "vital").then(|| name.clone()))
    };

    let interpretations = resource
        .get("interpretation")
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(fields::codeable_text).collect())
        .unwrap_or_default();

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Observation(ObservationFacts {
            interpretations,
            vital_name,
            code_status,
        }),
        status: resource.get("status").and_then(Value::as_str).map(str::to_string),
        occurred_at: fields::datetime_field(
            resource,
            &["effectiveDateTime", "effectiveInstant", "effectivePeriod", "issued"],
        ),
        display: name,
        detail: Some(value),
        source: make_reference(resource),
    })
}

fn encounter(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let label = resource
        .get("class")
        .and_then(fields::codeable_text)
        .or_else(|| {
            resource
                .get("type")
                .and_then(Value::as_array)
                .and_then(|types| types.first())
                .and_then(fields::codeable_text)
        })
        .unwrap_or_else(|| "Encounter".to_string());

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Encounter,
        status: resource.get("status").and_then(Value::as_str).map(str::to_string),
        occurred_at: fields::datetime_field(resource, &["period"]),
        display: label,
        detail: resource
            .get("reasonCode")
            .and_then(Value::as_array)
            .and_then(|reasons| reasons.first())
            .and_then(fields::codeable_text),
        source: make_reference(resource),
    })
}

fn procedure(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let name = resource
        .get("code")
        .and_then(fields::codeable_text)
        .unwrap_or_else(|| "Procedure".to_string());

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Procedure,
        status: fields::status_text(resource.get("status")),
        occurred_at: fields::datetime_field(resource, &["performedDateTime", "performedPeriod"]),
        display: name,
        detail: fields::status_text(resource.get("status")),
        source: make_reference(resource),
    })
}

fn document(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let title = resource
        .get("type")
        .and_then(fields::codeable_text)
        .or_else(|| {
            resource
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .or_else(|| resource.get("title").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "Clinical document".to_string());

    let note = title.to_lowercase().contains("note");

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Document { note },
        status: resource.get("status").and_then(Value::as_str).map(str::to_string),
        occurred_at: fields::datetime_field(resource, &["date", "created"]),
        display: title,
        detail: resource
            .get("content")
            .and_then(Value::as_array)
            .and_then(|contents| contents.first())
            .and_then(|content| content.get("attachment"))
            .and_then(|attachment| attachment.get("title"))
            .and_then(Value::as_str)
            .map(str::to_string),
        source: make_reference(resource),
    })
}

fn flag(resource: &Value, position: usize) -> Option<ClassifiedResource> {
    let label = resource.get("code").and_then(fields::codeable_text)?;

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Flag,
        status: resource.get("status").and_then(Value::as_str).map(str::to_string),
        occurred_at: fields::datetime_field(resource, &["period"]),
        display: label,
        detail: resource
            .get("category")
            .and_then(Value::as_array)
            .and_then(|categories| categories.first())
            .and_then(fields::codeable_text),
        source: make_reference(resource),
    })
}

/// Unrecognized kinds are kept only when they carry a timestamp; an undated
/// mystery resource has no place on a timeline.
fn unrecognized(resource: &Value, resource_type: &str, position: usize) -> Option<ClassifiedResource> {
    let occurred_at = fields::datetime_field(resource, &["effectiveDateTime", "issued", "date"])?;

    let display = resource
        .get("code")
        .and_then(fields::codeable_text)
        .unwrap_or_else(|| resource_type.to_string());

    Some(ClassifiedResource {
        id: stable_id(resource, position),
        kind: ResourceKind::Other,
        status: resource.get("status").and_then(Value::as_str).map(str::to_string),
        occurred_at: Some(occurred_at),
        display,
        detail: None,
        source: make_reference(resource),
    })
}

/// Resource id, or the entry position when the server sent none. Positional
/// fallbacks keep two anonymous entries from colliding during dedup.
fn stable_id(resource: &Value, position: usize) -> String {
    resource
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("entry-{position}"))
}

fn make_reference(resource: &Value) -> Option<ResourceReference> {
    let resource_type = resource.get("resourceType").and_then(Value::as_str)?;
    let id = resource.get("id").and_then(Value::as_str)?;
    Some(ResourceReference {
        system: Some("FHIR".to_string()),
        reference: Some(format!("{resource_type}/{id}")),
        display: resource.get("code").and_then(fields::codeable_text),
    })
}

fn join_phrases(phrases: Vec<String>) -> Option<String> {
    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" "))
    }
}

fn summarize_reactions(resource: &Value) -> Option<String> {
    let reactions = resource.get("reaction")?.as_array()?;
    let mut parts = Vec::new();
    for reaction in reactions {
        if let Some(manifestations) = reaction.get("manifestation").and_then(Value::as_array) {
            for manifestation in manifestations {
                if let Some(text) = fields::codeable_text(manifestation) {
                    parts.push(text);
                }
            }
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn summarize_dosage(resource: &Value) -> Option<Vec<String>> {
    // Statements carry `dosage`, requests `dosageInstruction`.
    let dosage = resource
        .get("dosage")
        .or_else(|| resource.get("dosageInstruction"))?
        .as_array()?
        .first()?;
    let mut phrases = Vec::new();

    if let Some(text) = dosage.get("text").and_then(Value::as_str) {
        let cleaned = text.trim().trim_end_matches('.').to_string();
        if !cleaned.is_empty() {
            phrases.push(format!("{cleaned}."));
        }
    }

    if let Some(route) = dosage
        .get("route")
        .and_then(fields::codeable_text)
        .filter(|route| !route.is_empty())
    {
        phrases.push(format!("Administer via {route}."));
    }

    if let Some(rate) = dosage.get("rateQuantity").and_then(fields::quantity_text) {
        phrases.push(format!("Rate {rate}."));
    }

    if phrases.is_empty() {
        None
    } else {
        Some(phrases)
    }
}

fn observation_is_code_status(resource: &Value) -> bool {
    let Some(text) = resource.get("code").and_then(fields::codeable_text) else {
        return false;
    };
    let lower = text.to_lowercase();
    lower.contains("code status")
        || lower.contains("dnr")
        || lower.contains("do not resuscitate")
        || lower.contains("resuscitation status")
        || lower.contains("advance directive")
}

fn observation_value_text(resource: &Value) -> Option<String> {
    if let Some(value) = resource.get("valueCodeableConcept") {
        return fields::codeable_text(value);
    }
    if let Some(value) = resource.get("valueString").and_then(Value::as_str) {
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    None
}

fn summarize_observation_value(resource: &Value) -> Option<String> {
    if let Some(quantity) = resource.get("valueQuantity") {
        return fields::quantity_text(quantity);
    }

    if let Some(value_string) = resource.get("valueString").and_then(Value::as_str) {
        if !value_string.is_empty() {
            return Some(value_string.to_string());
        }
    }

    if let Some(value_concept) = resource.get("valueCodeableConcept") {
        if let Some(text) = fields::codeable_text(value_concept) {
            return Some(text);
        }
    }

    if let Some(components) = resource.get("component").and_then(Value::as_array) {
        if let Some(pressure) = summarize_blood_pressure(components) {
            return Some(pressure);
        }

        let mut parts = Vec::new();
        for component in components {
            let label = component
                .get("code")
                .and_then(fields::codeable_text)
                .unwrap_or_else(|| "Component".to_string());
            if let Some(quantity) = component.get("valueQuantity") {
                if let Some(value) = fields::quantity_text(quantity) {
                    parts.push(format!("{label}: {value}"));
                }
            }
        }
        if !parts.is_empty() {
            return Some(parts.join(" | "));
        }
    }

    None
}

fn summarize_blood_pressure(components: &[Value]) -> Option<String> {
    let mut systolic: Option<String> = None;
    let mut diastolic: Option<String> = None;
    let mut unit: Option<String> = None;

    for component in components {
        let label = component
            .get("code")
            .and_then(fields::codeable_text)
            .unwrap_or_default()
            .to_lowercase();

        if let Some(quantity) = component.get("valueQuantity") {
            if systolic.is_none() && label.contains("systolic") {
                if let Some(value) = fields::quantity_text(quantity) {
                    unit = quantity.get("unit").and_then(Value::as_str).map(str::to_string);
                    systolic = Some(value.split_whitespace().next().unwrap_or("").to_string());
                }
            }

            if diastolic.is_none() && label.contains("diastolic") {
                if let Some(value) = fields::quantity_text(quantity) {
                    unit = quantity.get("unit").and_then(Value::as_str).map(str::to_string);
                    diastolic = Some(value.split_whitespace().next().unwrap_or("").to_string());
                }
            }
        }
    }

    match (systolic, diastolic) {
        (Some(sys), Some(dia)) => {
            let unit = unit.unwrap_or_else(|| "mmHg".to_string());
            Some(format!("{sys}/{dia} {unit}"))
        }
        _ => None,
    }
}

fn infer_vital_label(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    if lower.contains("heart rate") || lower.contains("pulse") {
        Some("Heart rate")
    } else if lower.contains("spo2") || lower.contains("oxygen saturation") {
        Some("SpO2")
    } else if lower.contains("blood pressure") {
        Some("Blood pressure")
    } else if lower.contains("respiratory rate") {
        Some("Respiratory rate")
    } else if lower.contains("temperature") {
        Some("Temperature")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle_with(resources: Vec<Value>) -> Value {
        let entries: Vec<Value> = resources
            .into_iter()
            .map(|resource| json!({ "resource": resource }))
            .collect();
        json!({ "resourceType": "Bundle", "entry": entries })
    }

    #[test]
    fn rejects_non_object_payloads() {
        let err = ingest(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, MalformedBundle::NotAnObject));
    }

    #[test]
    fn rejects_wrong_resource_type() {
        let err = ingest(&json!({"resourceType": "Patient"})).unwrap_err();
        match err {
            MalformedBundle::NotABundle { found } => {
                assert_eq!(found.as_deref(), Some("Patient"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = ingest(&json!({"entry": []})).unwrap_err();
        assert!(matches!(err, MalformedBundle::NotABundle { found: None }));
    }

    #[test]
    fn rejects_missing_or_non_array_entries() {
        let err = ingest(&json!({"resourceType": "Bundle", "entry": {}})).unwrap_err();
        assert!(matches!(err, MalformedBundle::EntriesNotAnArray));

        let err = ingest(&json!({"resourceType": "Bundle"})).unwrap_err();
        assert!(matches!(err, MalformedBundle::EntriesNotAnArray));
    }

    #[test]
    fn empty_entry_array_is_a_valid_bundle() {
        let classified = ingest(&bundle_with(Vec::new())).unwrap();
        assert!(classified.is_empty());
    }

    #[test]
    fn allergy_requires_substance_text() {
        let classified = ingest(&bundle_with(vec![
            json!({"resourceType": "AllergyIntolerance", "id": "a1"}),
            json!({
                "resourceType": "AllergyIntolerance",
                "id": "a2",
                "code": {"text": "Penicillin"},
                "criticality": "high"
            }),
        ]))
        .unwrap();

        assert_eq!(classified.len(), 1);
        let record = &classified[0];
        assert_eq!(record.display, "Penicillin");
        assert_eq!(record.detail, None);
        assert!(matches!(
            &record.kind,
            ResourceKind::Allergy { criticality: Some(code) } if code == "high"
        ));
    }

    #[test]
    fn allergy_detail_collects_categories_and_reactions() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "AllergyIntolerance",
            "id": "a1",
            "code": {"text": "Peanut"},
            "category": ["food"],
            "reaction": [
                {"manifestation": [{"text": "Hives"}, {"text": "Anaphylaxis"}]}
            ]
        })]))
        .unwrap();

        assert_eq!(
            classified[0].detail.as_deref(),
            Some("Category: Food. Reaction: Hives, Anaphylaxis.")
        );
    }

    #[test]
    fn medication_name_falls_back_to_reference_display() {
        let classified = ingest(&bundle_with(vec![
            json!({
                "resourceType": "MedicationStatement",
                "id": "m1",
                "status": "active",
                "medicationReference": {"display": "Metoprolol 25 mg"},
                "dosage": [{"text": "Twice daily.", "route": {"text": "oral"}}]
            }),
            json!({
                "resourceType": "MedicationRequest",
                "id": "m2",
                "status": "active",
                "authoredOn": "2024-03-01T09:00:00Z",
                "medicationCodeableConcept": {"text": "Insulin glargine"},
                "dosageInstruction": [{"text": "10 units at bedtime"}]
            }),
        ]))
        .unwrap();

        assert_eq!(classified[0].display, "Metoprolol 25 mg");
        assert_eq!(
            classified[0].detail.as_deref(),
            Some("Active medication. Twice daily. Administer via oral.")
        );

        assert_eq!(classified[1].display, "Insulin glargine");
        assert_eq!(
            classified[1].detail.as_deref(),
            Some("Active medication. 10 units at bedtime.")
        );
        assert_eq!(
            classified[1].occurred_at.unwrap().to_rfc3339(),
            "2024-03-01T09:00:00+00:00"
        );
    }

    #[test]
    fn condition_captures_coded_severity_and_onset() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Condition",
            "id": "c1",
            "code": {"text": "Heart failure"},
            "clinicalStatus": {"coding": [{"code": "active"}]},
            "severity": {"coding": [{"display": "Severe"}]},
            "onsetDateTime": "2019-05-01",
            "recordedDate": "2024-03-01T12:00:00Z",
            "category": [{"coding": [{"code": "problem-list-item"}]}]
        })]))
        .unwrap();

        let record = &classified[0];
        assert_eq!(record.status.as_deref(), Some("active"));
        assert_eq!(
            record.occurred_at.unwrap().to_rfc3339(),
            "2024-03-01T12:00:00+00:00"
        );
        match &record.kind {
            ResourceKind::Condition { severity_code, chronic_category, onset } => {
                assert_eq!(severity_code.as_deref(), Some("Severe"));
                assert!(chronic_category);
                assert_eq!(onset.unwrap().to_rfc3339(), "2019-05-01T00:00:00+00:00");
            }
            other => panic!("unexpected kind: {other:?}"),
        }
        assert_eq!(
            record.detail.as_deref(),
            Some("Status active. Severity Severe.")
        );
    }

    #[test]
    fn observation_renders_blood_pressure_components() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Observation",
            "id": "bp1",
            "code": {"text": "Blood pressure panel"},
            "effectiveDateTime": "2024-03-04T06:00:00Z",
            "component": [
                {
                    "code": {"coding": [{"display": "Systolic blood pressure"}]},
                    "valueQuantity": {"value": 182.0, "unit": "mmHg"}
                },
                {
                    "code": {"coding": [{"display": "Diastolic blood pressure"}]},
                    "valueQuantity": {"value": 104.0, "unit": "mmHg"}
                }
            ]
        })]))
        .unwrap();

        let record = &classified[0];
        assert_eq!(record.detail.as_deref(), Some("182/104 mmHg"));
        match &record.kind {
            ResourceKind::Observation(facts) => {
                assert_eq!(facts.vital_name.as_deref(), Some("Blood pressure"));
                assert!(!facts.code_status);
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn observation_without_value_is_dropped() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Observation",
            "id": "o1",
            "code": {"text": "Hemoglobin"}
        })]))
        .unwrap();
        assert!(classified.is_empty());
    }

    #[test]
    fn code_status_observation_is_flagged() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Observation",
            "id": "cs1",
            "code": {"text": "Code status"},
            "valueCodeableConcept": {"text": "DNR"}
        })]))
        .unwrap();

        let record = &classified[0];
        assert_eq!(record.detail.as_deref(), Some("DNR"));
        assert!(matches!(
            &record.kind,
            ResourceKind::Observation(facts) if facts.code_status && facts.vital_name.is_none()
        ));
    }

    #[test]
    fn vital_category_backs_up_label_inference() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Observation",
            "id": "o2",
            "code": {"text": "Capillary refill"},
            "category": [{"coding": [{"code": "vital-signs"}]}],
            "valueString": "2 seconds"
        })]))
        .unwrap();

        assert!(matches!(
            &classified[0].kind,
            ResourceKind::Observation(facts) if facts.vital_name.as_deref() == Some("Capillary refill")
        ));
    }

    #[test]
    fn unknown_kinds_need_a_timestamp() {
        let classified = ingest(&bundle_with(vec![
            json!({"resourceType": "Immunization", "id": "i1"}),
            json!({
                "resourceType": "Immunization",
                "id": "i2",
                "date": "2024-03-02T10:00:00Z",
                "code": {"text": "Influenza vaccine"}
            }),
        ]))
        .unwrap();

        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].display, "Influenza vaccine");
        assert!(matches!(classified[0].kind, ResourceKind::Other));
    }

    #[test]
    fn missing_resource_id_uses_entry_position() {
        let classified = ingest(&bundle_with(vec![
            json!({"resourceType": "Procedure", "code": {"text": "Intubation"}}),
            json!({"resourceType": "Procedure", "code": {"text": "Central line"}}),
        ]))
        .unwrap();

        assert_eq!(classified[0].id, "entry-0");
        assert_eq!(classified[1].id, "entry-1");
        assert!(classified[0].source.is_none());
    }

    #[test]
    fn encounter_label_prefers_class_over_type() {
        let classified = ingest(&bundle_with(vec![json!({
            "resourceType": "Encounter",
            "id": "e1",
            "status": "in-progress",
            "class": {"coding": [{"display": "Emergency"}]},
            "type": [{"text": "Walk-in"}],
            "period": {"start": "2024-03-04T01:00:00Z"},
            "reasonCode": [{"text": "Chest pain"}]
        })]))
        .unwrap();

        let record = &classified[0];
        assert_eq!(record.display, "Emergency");
        assert_eq!(record.detail.as_deref(), Some("Chest pain"));
        assert_eq!(
            record.occurred_at.unwrap().to_rfc3339(),
            "2024-03-04T01:00:00+00:00"
        );
    }

    #[test]
    fn document_note_detection_uses_title() {
        let classified = ingest(&bundle_with(vec![
            json!({
                "resourceType": "DocumentReference",
                "id": "d1",
                "type": {"text": "Progress note"},
                "date": "2024-03-03T15:00:00Z",
                "content": [{"attachment": {"title": "ICU day 2"}}]
            }),
            json!({
                "resourceType": "Composition",
                "id": "d2",
                "title": "Discharge summary",
                "date": "2024-03-03T16:00:00Z"
            }),
        ]))
        .unwrap();

        assert!(matches!(classified[0].kind, ResourceKind::Document { note: true }));
        assert_eq!(classified[0].detail.as_deref(), Some("ICU day 2"));
        assert!(matches!(classified[1].kind, ResourceKind::Document { note: false }));
        assert_eq!(classified[1].display, "Discharge summary");
    }

    #[test]
    fn flag_requires_code_text() {
        let classified = ingest(&bundle_with(vec![
            json!({"resourceType": "Flag", "id": "f1", "status": "active"}),
            json!({
                "resourceType": "Flag",
                "id": "f2",
                "status": "active",
                "code": {"text": "Falls risk"},
                "category": [{"text": "Safety"}]
            }),
        ]))
        .unwrap();

        assert_eq!(classified.len(), 1);
        assert_eq!(classified[0].display, "Falls risk");
        assert_eq!(classified[0].detail.as_deref(), Some("Safety"));
        assert!(matches!(classified[0].kind, ResourceKind::Flag));
    }
}
