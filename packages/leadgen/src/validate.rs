//! Result validation and normalization.
//!
//! Each scraped record is flattened to a raw field map, validated,
//! normalized, and merged back together before it may touch storage.
//! Fields without a companies column are dropped at the end.

use std::collections::HashMap;

use scraping::types::LeadRecord;

use crate::companies::COMPANY_COLUMNS;

/// Company names that mean "the site had no name".
const PLACEHOLDER_NAMES: &[&str] = &["unknown", "n/a", "-", "null", "none"];

/// Longest company name we accept before treating the value as noise.
const MAX_NAME_LENGTH: usize = 250;

/// Full pipeline: flatten, validate, normalize, merge, drop unknowns.
///
/// `None` means the record is unusable (no valid company name, or no
/// mappable fields at all) and must be counted as an error.
pub fn map_for_persistence(record: &LeadRecord) -> Option<HashMap<String, String>> {
    let raw = flatten(record);
    let validated = validate(&raw)?;
    let normalized = normalize(&validated);
    let merged = merge_fields(&raw, &validated, &normalized);

    if merged.is_empty() || !merged.contains_key("company_name") {
        return None;
    }
    Some(merged)
}

/// Flatten a record into string fields, including scalar extras.
pub fn flatten(record: &LeadRecord) -> HashMap<String, String> {
    let mut raw = HashMap::new();
    raw.insert("company_name".to_string(), record.company_name.clone());

    let optional = [
        ("website", &record.website),
        ("phone", &record.phone),
        ("email", &record.email),
        ("address", &record.address),
        ("city", &record.city),
        ("postal_code", &record.postal_code),
        ("description", &record.description),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            raw.insert(key.to_string(), value.clone());
        }
    }

    for (key, value) in &record.extra {
        let rendered = match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            serde_json::Value::Bool(b) => Some(b.to_string()),
            _ => None,
        };
        if let Some(rendered) = rendered {
            raw.entry(key.clone()).or_insert(rendered);
        }
    }

    raw
}

/// Trim values, drop empties, and reject records without a usable name.
pub fn validate(raw: &HashMap<String, String>) -> Option<HashMap<String, String>> {
    let name = raw.get("company_name")?.trim();
    if name.is_empty()
        || name.len() > MAX_NAME_LENGTH
        || PLACEHOLDER_NAMES.contains(&name.to_lowercase().as_str())
    {
        return None;
    }

    let validated = raw
        .iter()
        .map(|(key, value)| (key.clone(), value.trim().to_string()))
        .filter(|(_, value)| !value.is_empty())
        .collect();

    Some(validated)
}

/// Canonicalize field formats.
pub fn normalize(validated: &HashMap<String, String>) -> HashMap<String, String> {
    validated
        .iter()
        .map(|(key, value)| {
            let normalized = match key.as_str() {
                "website" => scraping::fetch::normalize_url(value),
                "email" => value.to_lowercase(),
                "phone" => collapse_whitespace(value),
                "city" | "company_name" => collapse_whitespace(value),
                _ => value.clone(),
            };
            (key.clone(), normalized)
        })
        .collect()
}

/// Merge the three maps and keep only known columns.
///
/// For `company_name` and `city` the precedence is
/// validated > raw > normalized; other fields take the most processed
/// value available.
pub fn merge_fields(
    raw: &HashMap<String, String>,
    validated: &HashMap<String, String>,
    normalized: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = HashMap::new();

    for column in COMPANY_COLUMNS {
        let value = if matches!(*column, "company_name" | "city") {
            validated
                .get(*column)
                .or_else(|| raw.get(*column))
                .or_else(|| normalized.get(*column))
        } else {
            normalized
                .get(*column)
                .or_else(|| validated.get(*column))
                .or_else(|| raw.get(*column))
        };

        if let Some(value) = value {
            if !value.trim().is_empty() {
                merged.insert(column.to_string(), value.clone());
            }
        }
    }

    merged
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}
