//! Two-phase line item classification.
//!
//! Raw items are first typed into coarse categories in one batch call, then
//! each category's items are matched against that category's known fields in
//! exactly one further call. A `None` outcome means "unclassifiable" and is
//! carried through, never raised.

use crate::catalog::FieldCatalog;
use crate::config::NormalizerConfig;
use crate::error::{FinancialStatementError, Result};
use crate::schema::{FinCategory, KnownItem, StatementKind, UnknownItem};
use crate::utils::partition_by_category;
use async_trait::async_trait;
use futures::future::try_join_all;
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

/// Unknown item name to known field path, or `None` when nothing fits.
pub type FieldMapping = BTreeMap<String, Option<String>>;

/// External semantic matcher. Implementations receive complete batches and
/// must not be called per item.
#[async_trait]
pub trait ClassificationService: Send + Sync {
    /// Assigns each item one of `categories`, or `None`.
    async fn classify_types(
        &self,
        items: &[UnknownItem],
        categories: &[FinCategory],
    ) -> Result<BTreeMap<String, Option<FinCategory>>>;

    /// Maps each unknown item to one of the known item names, or `None`.
    async fn classify_names(
        &self,
        unknown: &[UnknownItem],
        known: &[KnownItem],
    ) -> Result<FieldMapping>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub statement: StatementKind,
    /// Coarse category per raw item.
    pub types: BTreeMap<String, Option<FinCategory>>,
    /// Known field per raw item.
    pub mapping: FieldMapping,
    /// Items without a known field, from either phase.
    pub unclassified: Vec<String>,
}

impl ClassificationReport {
    pub fn mapped(&self) -> impl Iterator<Item = (&String, &String)> {
        self.mapping
            .iter()
            .filter_map(|(unknown, known)| known.as_ref().map(|k| (unknown, k)))
    }
}

pub struct CategoryClassifier<'a> {
    service: &'a dyn ClassificationService,
    max_attempts: u32,
}

impl<'a> CategoryClassifier<'a> {
    pub fn new(service: &'a dyn ClassificationService) -> Self {
        Self::with_config(service, &NormalizerConfig::default())
    }

    pub fn with_config(service: &'a dyn ClassificationService, config: &NormalizerConfig) -> Self {
        Self {
            service,
            max_attempts: config.max_classification_attempts.max(1),
        }
    }

    /// Maps `unknown` items of one category onto `known` candidates of the
    /// same category with a single service call.
    ///
    /// Every unknown item appears in the result. Answers naming a field
    /// outside `known` and items the service left out become `None`.
    pub async fn classify(
        &self,
        unknown: &[UnknownItem],
        known: &[KnownItem],
        category: FinCategory,
    ) -> Result<FieldMapping> {
        if unknown.is_empty() {
            return Ok(FieldMapping::new());
        }
        if known.is_empty() {
            debug!("No known {} fields; {} items left unmapped", category, unknown.len());
            return Ok(unknown.iter().map(|item| (item.name.clone(), None)).collect());
        }

        info!(
            "Matching {} {} items against {} known fields",
            unknown.len(),
            category,
            known.len()
        );
        let answer = self
            .with_retry(category.as_str(), || self.service.classify_names(unknown, known))
            .await?;

        let candidates: BTreeSet<&str> = known.iter().map(|k| k.name.as_str()).collect();
        let requested: BTreeSet<&str> = unknown.iter().map(|u| u.name.as_str()).collect();

        for extra in answer.keys().filter(|k| !requested.contains(k.as_str())) {
            debug!("Dropping unrequested {} answer '{}'", category, extra);
        }

        let mapping = unknown
            .iter()
            .map(|item| {
                let target = match answer.get(&item.name).cloned().flatten() {
                    Some(name) if candidates.contains(name.as_str()) => Some(name),
                    Some(name) => {
                        warn!(
                            "'{}' mapped to '{}', which is not a known {} field",
                            item.name, name, category
                        );
                        None
                    }
                    None => None,
                };
                (item.name.clone(), target)
            })
            .collect();

        Ok(mapping)
    }

    /// Coarse phase. Categories outside the statement's set become `None`.
    pub async fn coarse_types(
        &self,
        items: &[UnknownItem],
        statement: StatementKind,
    ) -> Result<Vec<(String, Option<FinCategory>)>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let allowed = statement.categories();
        info!("Typing {} {} statement items", items.len(), statement);
        let answer = self
            .with_retry("coarse", || self.service.classify_types(items, allowed))
            .await?;

        Ok(items
            .iter()
            .map(|item| {
                let category = match answer.get(&item.name).copied().flatten() {
                    Some(category) if allowed.contains(&category) => Some(category),
                    Some(category) => {
                        warn!(
                            "'{}' typed as {}, which a {} statement does not carry",
                            item.name, category, statement
                        );
                        None
                    }
                    None => None,
                };
                (item.name.clone(), category)
            })
            .collect())
    }

    /// Runs both phases for one statement. The fine phase issues one call per
    /// category concurrently.
    pub async fn classify_statement(
        &self,
        items: &[UnknownItem],
        statement: StatementKind,
    ) -> Result<ClassificationReport> {
        let typed = self.coarse_types(items, statement).await?;
        let (grouped, untyped) = partition_by_category(&typed);
        let catalog = FieldCatalog::for_statement(statement);

        let by_name: BTreeMap<&str, &UnknownItem> =
            items.iter().map(|item| (item.name.as_str(), item)).collect();

        let batches: Vec<(FinCategory, Vec<UnknownItem>, Vec<KnownItem>)> = grouped
            .iter()
            .map(|(category, names)| {
                let unknown = names
                    .iter()
                    .filter_map(|name| by_name.get(name.as_str()).map(|item| (*item).clone()))
                    .collect();
                (*category, unknown, catalog.known_items(*category))
            })
            .collect();

        let results = try_join_all(
            batches
                .iter()
                .map(|(category, unknown, known)| self.classify(unknown, known, *category)),
        )
        .await?;

        let mut mapping = FieldMapping::new();
        for name in &untyped {
            mapping.insert(name.clone(), None);
        }
        for result in results {
            mapping.extend(result);
        }

        let unclassified: Vec<String> = mapping
            .iter()
            .filter(|(_, known)| known.is_none())
            .map(|(name, _)| name.clone())
            .collect();

        info!(
            "Classified {} {} statement items, {} unclassified",
            mapping.len(),
            statement,
            unclassified.len()
        );

        Ok(ClassificationReport {
            statement,
            types: typed.into_iter().collect(),
            mapping,
            unclassified,
        })
    }

    async fn with_retry<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        "Classification call '{}' failed (attempt {}/{}): {}",
                        what, attempt, self.max_attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }
        Err(FinancialStatementError::ClassificationFailed(format!(
            "'{}' gave no usable answer after {} attempts: {}",
            what,
            self.max_attempts,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedService {
        names: FieldMapping,
        failures_left: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedService {
        fn new(names: &[(&str, Option<&str>)]) -> Self {
            Self {
                names: names
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.map(str::to_string)))
                    .collect(),
                failures_left: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(mut self, times: usize) -> Self {
            self.failures_left = AtomicUsize::new(times);
            self
        }
    }

    #[async_trait]
    impl ClassificationService for ScriptedService {
        async fn classify_types(
            &self,
            items: &[UnknownItem],
            _categories: &[FinCategory],
        ) -> Result<BTreeMap<String, Option<FinCategory>>> {
            Ok(items
                .iter()
                .map(|i| (i.name.clone(), Some(FinCategory::Expense)))
                .collect())
        }

        async fn classify_names(
            &self,
            _unknown: &[UnknownItem],
            _known: &[KnownItem],
        ) -> Result<FieldMapping> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(FinancialStatementError::ClassificationFailed(
                    "malformed reply".to_string(),
                ));
            }
            Ok(self.names.clone())
        }
    }

    fn known() -> Vec<KnownItem> {
        vec![
            KnownItem {
                name: "operating_expenses.office_supplies".to_string(),
                description: "Office supplies".to_string(),
            },
            KnownItem {
                name: "operating_expenses.consumables".to_string(),
                description: "Consumables".to_string(),
            },
        ]
    }

    #[tokio::test]
    async fn test_out_of_candidate_and_missing_answers_become_none() {
        let service = ScriptedService::new(&[
            ("stationery", Some("operating_expenses.office_supplies")),
            ("rent", Some("revenue")),
            ("ghost", Some("operating_expenses.consumables")),
        ]);
        let classifier = CategoryClassifier::new(&service);
        let unknown = vec![
            UnknownItem::new("stationery"),
            UnknownItem::new("rent"),
            UnknownItem::new("mystery"),
        ];

        let mapping = classifier
            .classify(&unknown, &known(), FinCategory::Expense)
            .await
            .unwrap();

        assert_eq!(mapping.len(), 3);
        assert_eq!(
            mapping["stationery"].as_deref(),
            Some("operating_expenses.office_supplies")
        );
        assert_eq!(mapping["rent"], None);
        assert_eq!(mapping["mystery"], None);
        assert!(!mapping.contains_key("ghost"));
    }

    #[tokio::test]
    async fn test_empty_unknown_skips_service() {
        let service = ScriptedService::new(&[]);
        let classifier = CategoryClassifier::new(&service);
        let mapping = classifier
            .classify(&[], &known(), FinCategory::Expense)
            .await
            .unwrap();
        assert!(mapping.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_until_success() {
        let service =
            ScriptedService::new(&[("stationery", Some("operating_expenses.office_supplies"))])
                .failing(2);
        let classifier = CategoryClassifier::new(&service);
        let mapping = classifier
            .classify(&[UnknownItem::new("stationery")], &known(), FinCategory::Expense)
            .await
            .unwrap();
        assert!(mapping["stationery"].is_some());
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_is_bounded() {
        let service = ScriptedService::new(&[]).failing(10);
        let config = NormalizerConfig {
            max_classification_attempts: 2,
            ..NormalizerConfig::default()
        };
        let classifier = CategoryClassifier::with_config(&service, &config);
        let result = classifier
            .classify(&[UnknownItem::new("x")], &known(), FinCategory::Expense)
            .await;
        assert!(matches!(
            result,
            Err(FinancialStatementError::ClassificationFailed(_))
        ));
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_coarse_types_outside_statement_become_none() {
        let service = ScriptedService::new(&[]);
        let classifier = CategoryClassifier::new(&service);
        let typed = classifier
            .coarse_types(&[UnknownItem::new("cash")], StatementKind::Balance)
            .await
            .unwrap();
        assert_eq!(typed, vec![("cash".to_string(), None)]);
    }
}
