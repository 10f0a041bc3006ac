use crate::error::{FinancialStatementError, Result};
use crate::input::parse_amount;
use crate::schema::FinCategory;
use log::warn;
use serde_json::{Map, Value};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Line items of one statement period: item name to amount (`None` when the
/// source gave no usable number).
pub type LineItems = BTreeMap<String, Option<f64>>;

/// Statement periods keyed by year label, e.g. `"2023"`.
pub type YearlyItems = BTreeMap<String, LineItems>;

/// Lower-cases every object key, recursing through nested objects and arrays.
pub fn downcase_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut lowered = Map::with_capacity(map.len());
            for (key, inner) in map {
                lowered.insert(key.to_lowercase(), downcase_keys(inner));
            }
            Value::Object(lowered)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(downcase_keys).collect()),
        other => other,
    }
}

/// Parses a cleaned statement: either a list of single-year objects
/// (`[{"2023": {...}}, {"2022": {...}}]`) or one object keyed by year.
pub fn parse_yearly_items(value: &Value) -> Result<YearlyItems> {
    let mut years = YearlyItems::new();

    let mut absorb = |year: &str, body: &Value| -> Result<()> {
        let items = body.as_object().ok_or_else(|| {
            FinancialStatementError::InvalidArtifact(format!(
                "year '{}' must map to an object of line items",
                year
            ))
        })?;

        let entry = years.entry(year.to_string()).or_default();
        for (name, amount) in items {
            let parsed = match amount {
                Value::Null => None,
                Value::Number(n) => n.as_f64(),
                Value::String(s) => parse_amount(name, s)?,
                other => {
                    return Err(FinancialStatementError::InvalidArtifact(format!(
                        "line item '{}' in year '{}' has unsupported value {}",
                        name, year, other
                    )))
                }
            };
            match entry.entry(name.to_lowercase()) {
                Entry::Vacant(slot) => {
                    slot.insert(parsed);
                }
                Entry::Occupied(mut slot) => {
                    warn!(
                        "Line item '{}' repeats in year '{}' with different case; summing",
                        name, year
                    );
                    let merged = match (*slot.get(), parsed) {
                        (Some(a), Some(b)) => Some(a + b),
                        (a, b) => a.or(b),
                    };
                    slot.insert(merged);
                }
            }
        }
        Ok(())
    };

    match value {
        Value::Array(periods) => {
            for period in periods {
                let object = period.as_object().ok_or_else(|| {
                    FinancialStatementError::InvalidArtifact(
                        "each period must be an object keyed by year".to_string(),
                    )
                })?;
                for (year, body) in object {
                    absorb(year, body)?;
                }
            }
        }
        Value::Object(object) => {
            for (year, body) in object {
                absorb(year, body)?;
            }
        }
        other => {
            return Err(FinancialStatementError::InvalidArtifact(format!(
                "expected a list or object of yearly statements, got {}",
                other
            )))
        }
    }

    Ok(years)
}

/// Parses a coarse-typed artifact: a list of single-pair objects
/// (`[{"sales": "earnings"}, {"rent": null}]`) or one flat object.
///
/// Labels that are not a known category are kept as `None`.
pub fn parse_typed_items(value: &Value) -> Result<Vec<(String, Option<FinCategory>)>> {
    let mut typed = Vec::new();

    let mut absorb = |object: &Map<String, Value>| -> Result<()> {
        for (name, label) in object {
            let category = match label {
                Value::Null => None,
                Value::String(s) => FinCategory::from_label(s),
                other => {
                    return Err(FinancialStatementError::InvalidArtifact(format!(
                        "category of '{}' must be a string or null, got {}",
                        name, other
                    )))
                }
            };
            typed.push((name.to_lowercase(), category));
        }
        Ok(())
    };

    match value {
        Value::Array(entries) => {
            for entry in entries {
                let object = entry.as_object().ok_or_else(|| {
                    FinancialStatementError::InvalidArtifact(
                        "typed items must be objects".to_string(),
                    )
                })?;
                absorb(object)?;
            }
        }
        Value::Object(object) => absorb(object)?,
        other => {
            return Err(FinancialStatementError::InvalidArtifact(format!(
                "expected a list of typed items, got {}",
                other
            )))
        }
    }

    Ok(typed)
}

/// Groups item names by category; items typed `None` go to the second list.
pub fn partition_by_category(
    typed: &[(String, Option<FinCategory>)],
) -> (BTreeMap<FinCategory, Vec<String>>, Vec<String>) {
    let mut grouped: BTreeMap<FinCategory, Vec<String>> = BTreeMap::new();
    let mut untyped = Vec::new();

    for (name, category) in typed {
        match category {
            Some(category) => grouped.entry(*category).or_default().push(name.clone()),
            None => untyped.push(name.clone()),
        }
    }

    (grouped, untyped)
}

/// Cuts the JSON payload out of a model reply that may carry code fences or prose.
pub fn extract_json_payload(raw: &str) -> &str {
    let object = raw.find('{').zip(raw.rfind('}'));
    let array = raw.find('[').zip(raw.rfind(']'));

    let span = match (object, array) {
        (Some(o), Some(a)) => Some(if a.0 < o.0 { a } else { o }),
        (Some(o), None) => Some(o),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    };

    match span {
        Some((start, end)) if start <= end => &raw[start..=end],
        _ => raw.trim(),
    }
}
