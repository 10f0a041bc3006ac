use crate::error::{FinancialStatementError, Result};
use crate::formula::{DerivationRule, Operand};
use crate::input::FieldInput;
use crate::registry::{layout, EntityLayout, FieldRole};
use crate::schema::EntityKind;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Already-resolved values of the components a composite entity reads from.
pub type ResolvedComponents<'a> = BTreeMap<&'static str, &'a BTreeMap<&'static str, f64>>;

/// Returns the rules of `kind` in an order where every rule comes after the
/// rules producing the sibling fields it reads.
///
/// Fails with `UnresolvableReference` when a rule reads a field the entity does
/// not declare, a component slot that does not exist, or when the rules form
/// a cycle.
pub fn dependency_order(kind: EntityKind) -> Result<Vec<&'static DerivationRule>> {
    let layout = layout(kind);
    let rules = layout.rules();

    let producers: HashMap<&str, usize> = rules
        .iter()
        .enumerate()
        .map(|(idx, rule)| (rule.target, idx))
        .collect();

    let mut in_degree = vec![0usize; rules.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];

    for (idx, rule) in rules.iter().enumerate() {
        if layout.field(rule.target).map(|f| f.role) != Some(FieldRole::Derived) {
            return Err(unresolvable(kind, rule.target, rule.target));
        }

        for operand in rule.formula.operands() {
            check_operand(layout, rule.target, operand)?;

            if let Operand::Field(name) = operand {
                if let Some(&producer) = producers.get(name) {
                    in_degree[idx] += 1;
                    dependents[producer].push(idx);
                }
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..rules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(rules.len());

    while let Some(idx) = ready.pop_front() {
        ordered.push(&rules[idx]);
        for &dependent in &dependents[idx] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.push_back(dependent);
            }
        }
    }

    if ordered.len() != rules.len() {
        let stuck = rules
            .iter()
            .enumerate()
            .find(|(i, _)| in_degree[*i] > 0)
            .map(|(_, r)| r.target)
            .unwrap_or_default();
        return Err(unresolvable(kind, stuck, stuck));
    }

    Ok(ordered)
}

fn check_operand(layout: &EntityLayout, target: &str, operand: Operand) -> Result<()> {
    let known = match operand {
        Operand::Field(name) => layout.field(name).is_some(),
        Operand::Component { component, field } => layout
            .component(component)
            .map(|slot| crate::registry::layout(slot.kind).field(field).is_some())
            .unwrap_or(false),
    };

    if known {
        Ok(())
    } else {
        Err(unresolvable(layout.kind, target, &operand.to_string()))
    }
}

fn unresolvable(kind: EntityKind, field: &str, reference: &str) -> FinancialStatementError {
    FinancialStatementError::UnresolvableReference {
        entity: kind.to_string(),
        field: field.to_string(),
        reference: reference.to_string(),
    }
}

/// Resolves every field of one entity from a partial input.
///
/// Supplied values win; unset inputs take their default (or fail when
/// required); unset derived fields are computed in dependency order from
/// sibling fields and the totals of already-resolved components.
pub struct Deriver {
    kind: EntityKind,
}

impl Deriver {
    pub fn new(kind: EntityKind) -> Self {
        Self { kind }
    }

    pub fn resolve(
        &self,
        input: &FieldInput,
        components: &ResolvedComponents<'_>,
    ) -> Result<BTreeMap<&'static str, f64>> {
        let layout = layout(self.kind);

        for (name, _) in input.fields() {
            if layout.field(name).is_none() {
                warn!("Ignoring unknown field '{}' for {}", name, self.kind);
            }
        }

        let mut values: BTreeMap<&'static str, f64> = BTreeMap::new();

        for field in layout.inputs() {
            let name = field.descriptor.name;
            let value = match (self.supplied(input, name)?, field.role) {
                (Some(value), _) => value,
                (None, FieldRole::Input { default: Some(default) }) => default,
                (None, _) => {
                    return Err(FinancialStatementError::MissingRequiredField {
                        entity: self.kind.to_string(),
                        field: name.to_string(),
                    })
                }
            };
            values.insert(name, value);
        }

        for rule in dependency_order(self.kind)? {
            if let Some(supplied) = self.supplied(input, rule.target)? {
                debug!("{}.{} supplied as {}", self.kind, rule.target, supplied);
                values.insert(rule.target, supplied);
                continue;
            }

            let computed = rule
                .formula
                .evaluate(|operand| match operand {
                    Operand::Field(name) => values.get(name).copied(),
                    Operand::Component { component, field } => components
                        .get(component)
                        .and_then(|resolved| resolved.get(field))
                        .copied(),
                })
                .map_err(|missing| unresolvable(self.kind, rule.target, &missing.to_string()))?;

            debug!("{}.{} derived as {}", self.kind, rule.target, computed);
            values.insert(rule.target, computed);
        }

        Ok(values)
    }

    /// Supplied value of `field`; NaN and infinities are rejected.
    fn supplied(&self, input: &FieldInput, field: &str) -> Result<Option<f64>> {
        match input.supplied(field) {
            Some(value) if !value.is_finite() => Err(FinancialStatementError::InvalidFieldValue {
                field: format!("{}.{}", self.kind, field),
                details: format!("{} is not a finite amount", value),
            }),
            other => Ok(other),
        }
    }
}
