//! Resolved entity values and the typed sub-statements built on them.

use crate::derivation::{Deriver, ResolvedComponents};
use crate::error::{FinancialStatementError, Result};
use crate::input::FieldInput;
use crate::registry::{category_of, describe, layout};
use crate::schema::{EntityKind, FieldDescriptor, FinCategory};
use serde::Serialize;
use std::collections::BTreeMap;
use std::ops::Deref;

/// Every field of one entity, fully resolved. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedEntity {
    kind: EntityKind,
    values: BTreeMap<&'static str, f64>,
}

impl ResolvedEntity {
    pub(crate) fn resolve(
        kind: EntityKind,
        input: &FieldInput,
        components: &ResolvedComponents<'_>,
    ) -> Result<Self> {
        let values = Deriver::new(kind).resolve(input, components)?;
        Ok(Self { kind, values })
    }

    /// Resolves an entity that has no components of its own.
    pub(crate) fn resolve_leaf(kind: EntityKind, input: &FieldInput) -> Result<Self> {
        if let Some(component) = input.component_names().next() {
            return Err(FinancialStatementError::UnknownComponent {
                entity: kind.to_string(),
                component: component.clone(),
            });
        }
        Self::resolve(kind, input, &ResolvedComponents::new())
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }

    pub fn fields(&self) -> &BTreeMap<&'static str, f64> {
        &self.values
    }

    pub fn category_of(&self, field: &str) -> Option<FinCategory> {
        category_of(self.kind, field)
    }

    pub fn descriptors(&self) -> &'static BTreeMap<&'static str, FieldDescriptor> {
        describe(self.kind)
    }

    pub fn total(&self) -> f64 {
        self.value(layout(self.kind).total)
    }

    // Resolution inserts every declared field, so lookups of declared names hit.
    pub(crate) fn value(&self, field: &str) -> f64 {
        self.get(field).unwrap_or_default()
    }
}

macro_rules! sub_statement {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(transparent)]
        pub struct $name(ResolvedEntity);

        impl $name {
            pub const KIND: EntityKind = $kind;

            pub fn new(input: &FieldInput) -> Result<Self> {
                ResolvedEntity::resolve_leaf(Self::KIND, input).map(Self)
            }

            pub fn entity(&self) -> &ResolvedEntity {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = ResolvedEntity;

            fn deref(&self) -> &ResolvedEntity {
                &self.0
            }
        }
    };
}

sub_statement!(
    /// Cash, receivables, inventory, prepaid expenses and short-term investments.
    CurrentAssets => EntityKind::CurrentAssets
);
sub_statement!(LongTermAssets => EntityKind::LongTermAssets);
sub_statement!(CurrentLiabilities => EntityKind::CurrentLiabilities);
sub_statement!(LongTermLiabilities => EntityKind::LongTermLiabilities);
sub_statement!(
    /// Equity section; treasury stock is subtracted from the total.
    Equity => EntityKind::Equity
);
sub_statement!(
    /// Cost of goods sold.
    Cogs => EntityKind::Cogs
);
sub_statement!(
    /// Operating expenses with SG&A, R&D and other-operating sub-totals.
    OperatingExpenses => EntityKind::OperatingExpenses
);

impl OperatingExpenses {
    pub fn depreciation(&self) -> f64 {
        self.value("depreciation")
    }

    pub fn amortization(&self) -> f64 {
        self.value("amortization")
    }

    pub fn total_sg_and_a(&self) -> f64 {
        self.value("total_sg_and_a")
    }

    pub fn total_r_and_d(&self) -> f64 {
        self.value("total_r_and_d")
    }

    pub fn total_other_operating(&self) -> f64 {
        self.value("total_other_operating")
    }
}
