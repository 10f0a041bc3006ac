//! # Financial Statement Normalizer
//!
//! A library for turning financial line items extracted from documents into
//! validated income and balance statements whose derived fields are computed
//! from a fixed dependency graph.
//!
//! ## Core Concepts
//!
//! - **Sub-statements**: groups of leaf fields with one total (current assets, COGS, ...)
//! - **Composite statements**: income and balance statements built from resolved sub-statements
//! - **Supplied wins**: any field given in the input is used verbatim; unset fields are derived
//! - **Balance invariant**: total assets must equal total liabilities plus total equity
//! - **Two-phase classification**: raw items are typed by category, then matched to known fields
//!
//! ## Example
//!
//! ```rust
//! use financial_statement_normalizer::*;
//!
//! let input = FieldInput::new()
//!     .with("revenue", 148_300.0)
//!     .with("tax_expenses", 78_000.0)
//!     .with_component("cogs", FieldInput::new().with("total_cogs", 54_000.0));
//!
//! let statement = StatementNormalizer::default()
//!     .build_income_statement(&input)
//!     .unwrap();
//!
//! assert_eq!(statement.gross_profit(), 94_300.0);
//! ```

pub mod artifacts;
pub mod balancer;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod derivation;
pub mod entities;
pub mod error;
pub mod extraction;
pub mod formula;
pub mod ingestion;
pub mod input;
pub mod llm;
pub mod registry;
pub mod schema;
pub mod statements;
pub mod utils;

pub use artifacts::{ArtifactKey, ArtifactStage, ArtifactStore};
pub use balancer::BalanceVerifier;
pub use catalog::{CatalogEntry, FieldCatalog};
pub use classifier::{CategoryClassifier, ClassificationReport, ClassificationService, FieldMapping};
pub use config::{InvariantPolicy, NormalizerConfig};
pub use derivation::dependency_order;
pub use entities::{
    Cogs, CurrentAssets, CurrentLiabilities, Equity, LongTermAssets, LongTermLiabilities,
    OperatingExpenses, ResolvedEntity,
};
pub use error::{FinancialStatementError, Result};
pub use extraction::{DocumentExtractor, DocumentPage, PageContent};
pub use ingestion::{assemble_input, AssembledInput};
pub use input::FieldInput;
pub use registry::{category_of, describe};
pub use schema::*;
pub use statements::{BalanceComponents, BalanceStatement, IncomeStatement};
pub use utils::*;

use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Statement {
    Income(IncomeStatement),
    Balance(BalanceStatement),
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        match self {
            Statement::Income(_) => StatementKind::Income,
            Statement::Balance(_) => StatementKind::Balance,
        }
    }

    pub fn fields(&self) -> &BTreeMap<&'static str, f64> {
        match self {
            Statement::Income(s) => s.fields(),
            Statement::Balance(s) => s.fields(),
        }
    }

    pub fn get(&self, path: &str) -> Option<f64> {
        match self {
            Statement::Income(s) => s.get(path),
            Statement::Balance(s) => s.get(path),
        }
    }

    pub fn category_of(&self, path: &str) -> Option<FinCategory> {
        match self {
            Statement::Income(s) => s.category_of(path),
            Statement::Balance(s) => s.category_of(path),
        }
    }

    pub fn qualified_fields(&self) -> BTreeMap<String, f64> {
        match self {
            Statement::Income(s) => s.qualified_fields(),
            Statement::Balance(s) => s.qualified_fields(),
        }
    }

    pub fn as_income(&self) -> Option<&IncomeStatement> {
        match self {
            Statement::Income(s) => Some(s),
            Statement::Balance(_) => None,
        }
    }

    pub fn as_balance(&self) -> Option<&BalanceStatement> {
        match self {
            Statement::Balance(s) => Some(s),
            Statement::Income(_) => None,
        }
    }
}

/// A statement built from raw items, with the classification that fed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedStatement {
    pub statement: Statement,
    pub classification: ClassificationReport,
    /// Mapped items whose amount was missing in the source.
    pub missing_amounts: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StatementNormalizer {
    config: NormalizerConfig,
}

impl StatementNormalizer {
    pub fn new(config: NormalizerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    pub fn build_income_statement(&self, input: &FieldInput) -> Result<IncomeStatement> {
        IncomeStatement::from_input(input)
    }

    pub fn build_balance_statement(&self, input: &FieldInput) -> Result<BalanceStatement> {
        BalanceStatement::from_input_with(input, &self.config)
    }

    pub fn build(&self, kind: StatementKind, input: &FieldInput) -> Result<Statement> {
        match kind {
            StatementKind::Income => self.build_income_statement(input).map(Statement::Income),
            StatementKind::Balance => self.build_balance_statement(input).map(Statement::Balance),
        }
    }

    /// Classifies raw items of one period, assembles the statement input from
    /// the mapping and builds the statement.
    pub async fn normalize(
        &self,
        kind: StatementKind,
        items: &LineItems,
        service: &dyn ClassificationService,
    ) -> Result<NormalizedStatement> {
        info!("Normalizing {} statement with {} line items", kind, items.len());

        let unknown = unknown_items(items);
        let classification = CategoryClassifier::with_config(service, &self.config)
            .classify_statement(&unknown, kind)
            .await?;

        self.build_from_classification(kind, items, classification)
    }

    /// Normalizes several periods of one statement. Item names are classified
    /// once across all periods.
    pub async fn normalize_years(
        &self,
        kind: StatementKind,
        years: &YearlyItems,
        service: &dyn ClassificationService,
    ) -> Result<BTreeMap<String, NormalizedStatement>> {
        let mut names: BTreeMap<String, Option<f64>> = BTreeMap::new();
        for items in years.values() {
            for (name, amount) in items {
                let slot = names.entry(name.clone()).or_insert(None);
                if slot.is_none() {
                    *slot = *amount;
                }
            }
        }

        info!(
            "Normalizing {} {} statements with {} distinct line items",
            years.len(),
            kind,
            names.len()
        );

        let classification = CategoryClassifier::with_config(service, &self.config)
            .classify_statement(&unknown_items(&names), kind)
            .await?;

        let mut normalized = BTreeMap::new();
        for (year, items) in years {
            debug!("Building {} statement for {}", kind, year);
            let report = ClassificationReport {
                statement: kind,
                types: restrict(&classification.types, items),
                mapping: restrict(&classification.mapping, items),
                unclassified: classification
                    .unclassified
                    .iter()
                    .filter(|name| items.contains_key(name.as_str()))
                    .cloned()
                    .collect(),
            };
            normalized.insert(year.clone(), self.build_from_classification(kind, items, report)?);
        }
        Ok(normalized)
    }

    fn build_from_classification(
        &self,
        kind: StatementKind,
        items: &LineItems,
        classification: ClassificationReport,
    ) -> Result<NormalizedStatement> {
        let assembled = assemble_input(items, &classification.mapping);
        debug!(
            "{} items unmapped, {} mapped without an amount",
            assembled.unmapped.len(),
            assembled.missing_amounts.len()
        );

        let statement = self.build(kind, &assembled.input)?;
        Ok(NormalizedStatement {
            statement,
            classification,
            missing_amounts: assembled.missing_amounts,
        })
    }
}

/// Raw items as matcher input; the amount goes along as a hint.
fn unknown_items(items: &LineItems) -> Vec<UnknownItem> {
    items
        .iter()
        .map(|(name, amount)| match amount {
            Some(amount) => UnknownItem::new(name.clone()).with_hint(amount.to_string()),
            None => UnknownItem::new(name.clone()),
        })
        .collect()
}

fn restrict<T: Clone>(map: &BTreeMap<String, T>, items: &LineItems) -> BTreeMap<String, T> {
    map.iter()
        .filter(|(name, _)| items.contains_key(name.as_str()))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_dispatches_by_kind() {
        let normalizer = StatementNormalizer::default();
        let income = normalizer
            .build(
                StatementKind::Income,
                &FieldInput::new()
                    .with("revenue", 100.0)
                    .with("tax_expenses", 10.0),
            )
            .unwrap();
        assert_eq!(income.kind(), StatementKind::Income);
        assert_eq!(income.get("net_income"), Some(90.0));
        assert!(income.as_balance().is_none());

        let balance = normalizer
            .build(StatementKind::Balance, &FieldInput::new())
            .unwrap();
        assert_eq!(balance.get("total_assets"), Some(0.0));
        assert!(balance.as_balance().unwrap().is_balanced());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = NormalizerConfig {
            balance_tolerance: f64::NAN,
            ..NormalizerConfig::default()
        };
        assert!(StatementNormalizer::new(config).is_err());
    }

    #[test]
    fn test_hints_carry_amounts() {
        let items: LineItems = [("sales".to_string(), Some(10.5)), ("misc".to_string(), None)]
            .into_iter()
            .collect();
        let unknown = unknown_items(&items);
        assert_eq!(unknown[0].name, "misc");
        assert_eq!(unknown[0].hint, None);
        assert_eq!(unknown[1].hint.as_deref(), Some("10.5"));
    }
}
