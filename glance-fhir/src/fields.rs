//! Field-level helpers for pulling display text, timestamps and quantities
//! out of loosely shaped FHIR JSON.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::Value;

/// Best display text of a CodeableConcept: `text`, then the first coding
/// `display`, then the first coding `code`.
pub(crate) fn codeable_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            return Some(text.trim().to_string());
        }
    }

    if let Some(codings) = value.get("coding").and_then(Value::as_array) {
        for coding in codings {
            if let Some(display) = coding.get("display").and_then(Value::as_str) {
                if !display.trim().is_empty() {
                    return Some(display.trim().to_string());
                }
            }
            if let Some(code) = coding.get("code").and_then(Value::as_str) {
                if !code.trim().is_empty() {
                    return Some(code.trim().to_string());
                }
            }
        }
    }

    None
}

/// Status-like fields arrive either as a plain code string or as a
/// CodeableConcept (`clinicalStatus` and friends).
pub(crate) fn status_text(value: Option<&Value>) -> Option<String> {
    let value = value?;
    if let Some(text) = codeable_text(value) {
        return Some(text);
    }
    value.as_str().map(str::to_string)
}

/// First parseable timestamp among `fields`, in priority order. A field may
/// hold a datetime string or a FHIR Period, whose `end` wins over `start`.
pub(crate) fn datetime_field(resource: &Value, fields: &[&str]) -> Option<DateTime<Utc>> {
    for field in fields {
        let Some(value) = resource.get(*field) else {
            continue;
        };

        if let Some(text) = value.as_str() {
            if let Some(instant) = parse_datetime(text) {
                return Some(instant);
            }
        }

        if let Some(period) = value.as_object() {
            if let Some(end) = period.get("end").and_then(Value::as_str) {
                if let Some(instant) = parse_datetime(end) {
                    return Some(instant);
                }
            }
            if let Some(start) = period.get("start").and_then(Value::as_str) {
                if let Some(instant) = parse_datetime(start) {
                    return Some(instant);
                }
            }
        }
    }
    None
}

/// RFC 3339 instants, plus date-only values (`2019-05-01`) read as midnight
/// UTC since FHIR allows reduced precision.
pub(crate) fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Some(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

/// Render a FHIR Quantity as `"<value> <unit>"`.
pub(crate) fn quantity_text(value: &Value) -> Option<String> {
    let magnitude = value.get("value")?.as_f64()?;
    let unit = value.get("unit").and_then(Value::as_str).unwrap_or("");
    let number = format_numeric(magnitude);
    if unit.is_empty() {
        Some(number)
    } else {
        Some(format!("{number} {unit}"))
    }
}

pub(crate) fn format_numeric(value: f64) -> String {
    if (value.fract() - 0.0).abs() < f64::EPSILON {
        format!("{value:.0}")
    } else if (value * 10.0).fract().abs() < f64::EPSILON {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// True when any entry of the resource's `category` array mentions
/// `keyword` in its text, coding display or coding code.
pub(crate) fn category_matches(resource: &Value, keyword: &str) -> bool {
    let Some(categories) = resource.get("category").and_then(Value::as_array) else {
        return false;
    };

    let needle = keyword.to_lowercase();

    categories.iter().any(|entry| {
        if let Some(text) = entry.get("text").and_then(Value::as_str) {
            if text.to_lowercase().contains(&needle) {
                return true;
            }
        }

        if let Some(codings) = entry.get("coding").and_then(Value::as_array) {
            for coding in codings {
                if let Some(display) = coding.get("display").and_then(Value::as_str) {
                    if display.to_lowercase().contains(&needle) {
                        return true;
                    }
                }
                if let Some(code) = coding.get("code").and_then(Value::as_str) {
                    if code.to_lowercase().contains(&needle) {
                        return true;
                    }
                }
            }
        }

        false
    })
}

pub(crate) fn capitalize_first(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
