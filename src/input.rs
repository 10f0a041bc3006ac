use crate::error::{FinancialStatementError, Result};
use crate::utils::downcase_keys;
use serde_json::Value;
use std::collections::BTreeMap;

/// A partial mapping of field values for one entity, plus the inputs of its
/// nested components.
///
/// A field is *supplied* when present with a non-null value; absent and null
/// fields are *unset* and left to defaults or derivation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldInput {
    values: BTreeMap<String, Option<f64>>,
    components: BTreeMap<String, FieldInput>,
}

impl FieldInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    pub fn with_component(mut self, name: impl Into<String>, input: FieldInput) -> Self {
        self.components.insert(name.into().to_lowercase(), input);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: Option<f64>) {
        self.values.insert(field.into().to_lowercase(), value);
    }

    /// Adds `amount` to a dotted field path such as `cogs.labor_cost`,
    /// treating an unset value as zero.
    pub fn add_to_path(&mut self, path: &str, amount: f64) {
        let (target, field) = self.split_path_mut(path);
        let slot = target.values.entry(field).or_insert(None);
        *slot = Some(slot.unwrap_or(0.0) + amount);
    }

    pub fn set_path(&mut self, path: &str, value: Option<f64>) {
        let (target, field) = self.split_path_mut(path);
        target.values.insert(field, value);
    }

    fn split_path_mut(&mut self, path: &str) -> (&mut FieldInput, String) {
        let path = path.to_lowercase();
        let mut segments: Vec<&str> = path.split('.').collect();
        let field = segments.pop().unwrap_or_default().to_string();

        let mut target = self;
        for segment in segments {
            target = target.components.entry(segment.to_string()).or_default();
        }
        (target, field)
    }

    /// The supplied value of `field`, or `None` when absent or null.
    pub fn supplied(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &Option<f64>)> {
        self.values.iter()
    }

    pub fn component(&self, name: &str) -> Option<&FieldInput> {
        self.components.get(name)
    }

    pub fn component_names(&self) -> impl Iterator<Item = &String> {
        self.components.keys()
    }

    /// The same input with every nested component input dropped.
    pub fn without_components(&self) -> FieldInput {
        FieldInput {
            values: self.values.clone(),
            components: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.components.is_empty()
    }

    /// Builds an input from a JSON object. Keys are lower-cased recursively,
    /// nested objects become component inputs, `null` leaves a field unset.
    pub fn from_json(value: &Value) -> Result<Self> {
        let normalized = downcase_keys(value.clone());
        Self::from_normalized(&normalized)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_json(&value)
    }

    fn from_normalized(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| FinancialStatementError::InvalidFieldValue {
                field: "<root>".to_string(),
                details: format!("expected a JSON object, got {}", value),
            })?;

        let mut input = FieldInput::new();
        for (key, entry) in object {
            match entry {
                Value::Object(_) => {
                    input
                        .components
                        .insert(key.clone(), Self::from_normalized(entry)?);
                }
                other => {
                    input.values.insert(key.clone(), parse_value(key, other)?);
                }
            }
        }
        Ok(input)
    }
}

fn parse_value(field: &str, value: &Value) -> Result<Option<f64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let number = n
                .as_f64()
                .ok_or_else(|| invalid(field, format!("{} is not representable", n)))?;
            Ok(Some(number))
        }
        Value::String(s) => parse_amount(field, s),
        other => Err(invalid(field, format!("unsupported value {}", other))),
    }
}

/// Parses an amount as written in statements: `1,234.50`, `$ 980`, `(1,200)`
/// for negatives. Blank, `-` and `n/a` mean no value.
pub fn parse_amount(field: &str, raw: &str) -> Result<Option<f64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed == "-"
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("na")
    {
        return Ok(None);
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '€' | '£' | ' '))
        .collect();

    let number: f64 = cleaned
        .parse()
        .map_err(|_| invalid(field, format!("'{}' is not a number", raw)))?;

    if !number.is_finite() {
        return Err(invalid(field, format!("'{}' is not finite", raw)));
    }

    Ok(Some(if negative { -number } else { number }))
}

fn invalid(field: &str, details: String) -> FinancialStatementError {
    FinancialStatementError::InvalidFieldValue {
        field: field.to_string(),
        details,
    }
}
