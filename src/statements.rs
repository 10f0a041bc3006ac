//! Composite statements. They accept only resolved sub-statements, so every
//! component total is available before a composite field reads it.

use crate::balancer::BalanceVerifier;
use crate::config::NormalizerConfig;
use crate::derivation::ResolvedComponents;
use crate::entities::{
    Cogs, CurrentAssets, CurrentLiabilities, Equity, LongTermAssets, LongTermLiabilities,
    OperatingExpenses, ResolvedEntity,
};
use crate::error::{FinancialStatementError, Result};
use crate::input::FieldInput;
use crate::registry::layout;
use crate::schema::{EntityKind, FinCategory};
use log::{info, warn};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;

/// Splits `cogs.total_cogs` into `(Some("cogs"), "total_cogs")`.
fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once('.') {
        Some((component, field)) => (Some(component), field),
        None => (None, path),
    }
}

fn ignore_nested(kind: EntityKind, input: &FieldInput) {
    for name in input.component_names() {
        warn!(
            "Ignoring nested input '{}' for {}: components are passed resolved",
            name, kind
        );
    }
}

fn reject_unknown_components(kind: EntityKind, input: &FieldInput) -> Result<()> {
    let layout = layout(kind);
    for name in input.component_names() {
        if layout.component(name).is_none() {
            return Err(FinancialStatementError::UnknownComponent {
                entity: kind.to_string(),
                component: name.clone(),
            });
        }
    }
    Ok(())
}

fn component_input<'a>(input: &'a FieldInput, name: &str, empty: &'a FieldInput) -> &'a FieldInput {
    input.component(name).unwrap_or(empty)
}

fn flatten_into(out: &mut BTreeMap<String, f64>, prefix: Option<&str>, entity: &ResolvedEntity) {
    for (field, value) in entity.fields() {
        let key = match prefix {
            Some(prefix) => format!("{}.{}", prefix, field),
            None => field.to_string(),
        };
        out.insert(key, *value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeStatement {
    cogs: Cogs,
    operating_expenses: OperatingExpenses,
    entity: ResolvedEntity,
}

impl IncomeStatement {
    pub const KIND: EntityKind = EntityKind::IncomeStatement;

    /// Builds the statement from its own fields and resolved components.
    /// `revenue` and `tax_expenses` must be supplied.
    pub fn new(input: &FieldInput, cogs: Cogs, operating_expenses: OperatingExpenses) -> Result<Self> {
        ignore_nested(Self::KIND, input);

        let entity = {
            let mut components = ResolvedComponents::new();
            components.insert("cogs", cogs.fields());
            components.insert("operating_expenses", operating_expenses.fields());
            ResolvedEntity::resolve(Self::KIND, input, &components)?
        };

        let statement = Self {
            cogs,
            operating_expenses,
            entity,
        };
        info!(
            "Built income statement: revenue {}, net income {}",
            statement.revenue(),
            statement.net_income()
        );
        Ok(statement)
    }

    /// Builds the components from the nested `cogs` and `operating_expenses`
    /// objects of `input` (absent ones resolve to their defaults), then the
    /// statement itself.
    pub fn from_input(input: &FieldInput) -> Result<Self> {
        reject_unknown_components(Self::KIND, input)?;
        let empty = FieldInput::new();
        let cogs = Cogs::new(component_input(input, "cogs", &empty))?;
        let operating_expenses =
            OperatingExpenses::new(component_input(input, "operating_expenses", &empty))?;
        Self::new(&input.without_components(), cogs, operating_expenses)
    }

    pub fn cogs(&self) -> &Cogs {
        &self.cogs
    }

    pub fn operating_expenses(&self) -> &OperatingExpenses {
        &self.operating_expenses
    }

    pub fn revenue(&self) -> f64 {
        self.entity.value("revenue")
    }

    pub fn other_revenue(&self) -> f64 {
        self.entity.value("other_revenue")
    }

    pub fn interest_expenses(&self) -> f64 {
        self.entity.value("interest_expenses")
    }

    pub fn tax_expenses(&self) -> f64 {
        self.entity.value("tax_expenses")
    }

    pub fn extraordinary_expenses(&self) -> f64 {
        self.entity.value("extraordinary_expenses")
    }

    pub fn gross_profit(&self) -> f64 {
        self.entity.value("gross_profit")
    }

    pub fn ebit(&self) -> f64 {
        self.entity.value("ebit")
    }

    pub fn ebitda(&self) -> f64 {
        self.entity.value("ebitda")
    }

    pub fn ebt(&self) -> f64 {
        self.entity.value("ebt")
    }

    pub fn net_income(&self) -> f64 {
        self.entity.value("net_income")
    }

    pub fn total_expenses(&self) -> f64 {
        self.entity.value("total_expenses")
    }

    pub fn operating_margin(&self) -> f64 {
        self.entity.value("operating_margin")
    }

    pub fn net_margin(&self) -> f64 {
        self.entity.value("net_margin")
    }

    /// The statement's own fields, without component fields.
    pub fn fields(&self) -> &BTreeMap<&'static str, f64> {
        self.entity.fields()
    }

    fn component_entity(&self, name: &str) -> Option<&ResolvedEntity> {
        match name {
            "cogs" => Some(self.cogs.entity()),
            "operating_expenses" => Some(self.operating_expenses.entity()),
            _ => None,
        }
    }

    /// Looks up an own field (`ebit`) or a component field (`cogs.total_cogs`).
    pub fn get(&self, path: &str) -> Option<f64> {
        match split_path(path) {
            (None, field) => self.entity.get(field),
            (Some(component), field) => self.component_entity(component)?.get(field),
        }
    }

    pub fn category_of(&self, path: &str) -> Option<FinCategory> {
        match split_path(path) {
            (None, field) => self.entity.category_of(field),
            (Some(component), field) => self.component_entity(component)?.category_of(field),
        }
    }

    /// Every field of the statement and its components under qualified paths.
    pub fn qualified_fields(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        flatten_into(&mut out, None, &self.entity);
        flatten_into(&mut out, Some("cogs"), self.cogs.entity());
        flatten_into(&mut out, Some("operating_expenses"), self.operating_expenses.entity());
        out
    }
}

impl Serialize for IncomeStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let own = self.entity.fields();
        let mut map = serializer.serialize_map(Some(own.len() + 2))?;
        for (field, value) in own {
            map.serialize_entry(field, value)?;
        }
        map.serialize_entry("cogs", self.cogs.fields())?;
        map.serialize_entry("operating_expenses", self.operating_expenses.fields())?;
        map.end()
    }
}

/// The five resolved sections of a balance statement.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceComponents {
    pub current_assets: CurrentAssets,
    pub long_term_assets: LongTermAssets,
    pub current_liabilities: CurrentLiabilities,
    pub long_term_liabilities: LongTermLiabilities,
    pub equity: Equity,
}

impl BalanceComponents {
    /// Resolves each section from the matching nested object of `input`.
    pub fn from_input(input: &FieldInput) -> Result<Self> {
        reject_unknown_components(EntityKind::BalanceStatement, input)?;
        let empty = FieldInput::new();
        Ok(Self {
            current_assets: CurrentAssets::new(component_input(input, "current_assets", &empty))?,
            long_term_assets: LongTermAssets::new(component_input(
                input,
                "long_term_assets",
                &empty,
            ))?,
            current_liabilities: CurrentLiabilities::new(component_input(
                input,
                "current_liabilities",
                &empty,
            ))?,
            long_term_liabilities: LongTermLiabilities::new(component_input(
                input,
                "long_term_liabilities",
                &empty,
            ))?,
            equity: Equity::new(component_input(input, "equity", &empty))?,
        })
    }

    fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        match name {
            "current_assets" => Some(self.current_assets.entity()),
            "long_term_assets" => Some(self.long_term_assets.entity()),
            "current_liabilities" => Some(self.current_liabilities.entity()),
            "long_term_liabilities" => Some(self.long_term_liabilities.entity()),
            "equity" => Some(self.equity.entity()),
            _ => None,
        }
    }

    fn resolved(&self) -> ResolvedComponents<'_> {
        let mut components = ResolvedComponents::new();
        for slot in layout(EntityKind::BalanceStatement).components {
            if let Some(entity) = self.entity(slot.name) {
                components.insert(slot.name, entity.fields());
            }
        }
        components
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceStatement {
    components: BalanceComponents,
    entity: ResolvedEntity,
    balanced: bool,
}

impl BalanceStatement {
    pub const KIND: EntityKind = EntityKind::BalanceStatement;

    /// Builds with the default (strict) invariant policy.
    pub fn new(input: &FieldInput, components: BalanceComponents) -> Result<Self> {
        Self::build(input, components, &NormalizerConfig::default())
    }

    /// Resolves every total, then checks assets against liabilities plus
    /// equity under the configured policy.
    pub fn build(
        input: &FieldInput,
        components: BalanceComponents,
        config: &NormalizerConfig,
    ) -> Result<Self> {
        ignore_nested(Self::KIND, input);

        let entity = ResolvedEntity::resolve(Self::KIND, input, &components.resolved())?;
        let balanced = BalanceVerifier::from_config(config).verify(
            entity.value("total_assets"),
            entity.value("total_liabilities"),
            entity.value("total_equity"),
        )?;

        info!(
            "Built balance statement: total assets {}, liabilities and equity {}",
            entity.value("total_assets"),
            entity.value("total_liabilities_and_equity")
        );
        Ok(Self {
            components,
            entity,
            balanced,
        })
    }

    pub fn from_input(input: &FieldInput) -> Result<Self> {
        Self::from_input_with(input, &NormalizerConfig::default())
    }

    pub fn from_input_with(input: &FieldInput, config: &NormalizerConfig) -> Result<Self> {
        let components = BalanceComponents::from_input(input)?;
        Self::build(&input.without_components(), components, config)
    }

    pub fn components(&self) -> &BalanceComponents {
        &self.components
    }

    pub fn total_assets(&self) -> f64 {
        self.entity.value("total_assets")
    }

    pub fn total_liabilities(&self) -> f64 {
        self.entity.value("total_liabilities")
    }

    pub fn total_equity(&self) -> f64 {
        self.entity.value("total_equity")
    }

    pub fn total_liabilities_and_equity(&self) -> f64 {
        self.entity.value("total_liabilities_and_equity")
    }

    /// Always true under the strict policy; under warn-only, false when the
    /// totals disagree beyond the tolerance.
    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    pub fn fields(&self) -> &BTreeMap<&'static str, f64> {
        self.entity.fields()
    }

    pub fn get(&self, path: &str) -> Option<f64> {
        match split_path(path) {
            (None, field) => self.entity.get(field),
            (Some(component), field) => self.components.entity(component)?.get(field),
        }
    }

    pub fn category_of(&self, path: &str) -> Option<FinCategory> {
        match split_path(path) {
            (None, field) => self.entity.category_of(field),
            (Some(component), field) => self.components.entity(component)?.category_of(field),
        }
    }

    pub fn qualified_fields(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        flatten_into(&mut out, None, &self.entity);
        for slot in layout(Self::KIND).components {
            if let Some(entity) = self.components.entity(slot.name) {
                flatten_into(&mut out, Some(slot.name), entity);
            }
        }
        out
    }
}

impl Serialize for BalanceStatement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let own = self.entity.fields();
        let slots = layout(Self::KIND).components;
        let mut map = serializer.serialize_map(Some(own.len() + slots.len()))?;
        for (field, value) in own {
            map.serialize_entry(field, value)?;
        }
        for slot in slots {
            if let Some(entity) = self.components.entity(slot.name) {
                map.serialize_entry(slot.name, entity.fields())?;
            }
        }
        map.end()
    }
}
