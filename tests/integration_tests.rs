use async_trait::async_trait;
use financial_statement_normalizer::*;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Deterministic matcher driven by lookup tables.
struct TableMatcher {
    types: BTreeMap<&'static str, FinCategory>,
    names: BTreeMap<&'static str, &'static str>,
    type_calls: AtomicUsize,
    name_calls: Mutex<Vec<Vec<String>>>,
}

impl TableMatcher {
    fn new(
        types: &[(&'static str, FinCategory)],
        names: &[(&'static str, &'static str)],
    ) -> Self {
        Self {
            types: types.iter().copied().collect(),
            names: names.iter().copied().collect(),
            type_calls: AtomicUsize::new(0),
            name_calls: Mutex::new(Vec::new()),
        }
    }

    fn income() -> Self {
        Self::new(
            &[
                ("sales", FinCategory::Earning),
                ("cost of sales", FinCategory::Expense),
                ("advertising", FinCategory::Expense),
                ("stationery", FinCategory::Expense),
                ("printer paper", FinCategory::Expense),
                ("interest", FinCategory::Expense),
                ("income tax", FinCategory::Expense),
                ("flood loss", FinCategory::Expense),
                ("mystery item", FinCategory::Expense),
            ],
            &[
                ("sales", "revenue"),
                ("cost of sales", "cogs.total_cogs"),
                ("advertising", "operating_expenses.advertising_marketing"),
                ("stationery", "operating_expenses.office_supplies"),
                ("printer paper", "operating_expenses.office_supplies"),
                ("interest", "interest_expenses"),
                ("income tax", "tax_expenses"),
                ("flood loss", "extraordinary_expenses"),
            ],
        )
    }

    fn balance() -> Self {
        Self::new(
            &[
                ("cash", FinCategory::Asset),
                ("building", FinCategory::Asset),
                ("payables", FinCategory::Liability),
                ("bank loan", FinCategory::Liability),
                ("share capital", FinCategory::Equity),
            ],
            &[
                ("cash", "current_assets.cash_and_cash_equivalents"),
                ("building", "long_term_assets.property_plant_equipment"),
                ("payables", "current_liabilities.accounts_payable"),
                ("bank loan", "long_term_liabilities.long_term_debt"),
                ("share capital", "equity.common_stock"),
            ],
        )
    }
}

#[async_trait]
impl ClassificationService for TableMatcher {
    async fn classify_types(
        &self,
        items: &[UnknownItem],
        _categories: &[FinCategory],
    ) -> Result<BTreeMap<String, Option<FinCategory>>> {
        self.type_calls.fetch_add(1, Ordering::SeqCst);
        Ok(items
            .iter()
            .map(|item| (item.name.clone(), self.types.get(item.name.as_str()).copied()))
            .collect())
    }

    async fn classify_names(
        &self,
        unknown: &[UnknownItem],
        _known: &[KnownItem],
    ) -> Result<FieldMapping> {
        let mut batch: Vec<String> = unknown.iter().map(|u| u.name.clone()).collect();
        batch.sort();
        self.name_calls.lock().unwrap().push(batch);

        Ok(unknown
            .iter()
            .map(|item| {
                let target = self.names.get(item.name.as_str()).map(|t| t.to_string());
                (item.name.clone(), target)
            })
            .collect())
    }
}

fn income_items() -> LineItems {
    [
        ("sales", Some(148_300.0)),
        ("cost of sales", Some(54_000.0)),
        ("advertising", Some(23_000.0)),
        ("stationery", Some(35.0)),
        ("printer paper", Some(15.0)),
        ("interest", Some(2_300.0)),
        ("income tax", Some(78_000.0)),
        ("flood loss", Some(230.0)),
        ("mystery item", Some(5.0)),
        ("weird thing", Some(1.0)),
    ]
    .into_iter()
    .map(|(name, amount)| (name.to_string(), amount))
    .collect()
}

fn balance_input(equity_total: f64) -> FieldInput {
    FieldInput::new()
        .with_component(
            "current_assets",
            FieldInput::new().with("total_current_assets", 50_000.0),
        )
        .with_component(
            "long_term_assets",
            FieldInput::new().with("total_long_term_assets", 150_000.0),
        )
        .with_component(
            "current_liabilities",
            FieldInput::new().with("total_current_liabilities", 30_000.0),
        )
        .with_component(
            "long_term_liabilities",
            FieldInput::new().with("total_long_term_liabilities", 100_000.0),
        )
        .with_component("equity", FieldInput::new().with("total_equity", equity_total))
}

#[test]
fn test_current_assets_examples() -> anyhow::Result<()> {
    let summed = CurrentAssets::new(&FieldInput::from_json(&json!({
        "cash_and_cash_equivalents": 10000,
        "accounts_receivable": 5000,
        "inventory": 8000,
        "prepaid_expenses": 2000,
        "short_term_investments": 3000
    }))?)?;
    assert_eq!(summed.total(), 28_000.0);

    let supplied = CurrentAssets::new(&FieldInput::from_json(&json!({
        "cash_and_cash_equivalents": 1500,
        "total_current_assets": 25000
    }))?)?;
    assert_eq!(supplied.total(), 25_000.0);
    Ok(())
}

#[test]
fn test_balance_statement_consistent() -> anyhow::Result<()> {
    let statement = StatementNormalizer::default().build_balance_statement(&balance_input(70_000.0))?;

    assert_eq!(statement.total_assets(), 200_000.0);
    assert_eq!(statement.total_liabilities(), 130_000.0);
    assert_eq!(statement.total_liabilities_and_equity(), 200_000.0);
    assert!(statement.is_balanced());
    Ok(())
}

#[test]
fn test_balance_statement_inconsistent() {
    let result = StatementNormalizer::default().build_balance_statement(&balance_input(50_000.0));
    match result {
        Err(FinancialStatementError::InvariantViolation {
            total_assets,
            total_liabilities,
            total_equity,
            ..
        }) => {
            assert_eq!(total_assets, 200_000.0);
            assert_eq!(total_liabilities + total_equity, 180_000.0);
        }
        other => panic!("expected InvariantViolation, got {:?}", other),
    }
}

#[test]
fn test_balance_statement_warn_only() -> anyhow::Result<()> {
    let normalizer = StatementNormalizer::new(NormalizerConfig::warn_only())?;
    let statement = normalizer.build_balance_statement(&balance_input(50_000.0))?;
    assert!(!statement.is_balanced());
    assert_eq!(statement.total_liabilities_and_equity(), 180_000.0);
    Ok(())
}

#[test]
fn test_income_statement_from_json() -> anyhow::Result<()> {
    let input = FieldInput::from_json_str(
        r#"{
            "Revenue": 148300,
            "Other_Revenue": 0,
            "Interest_Expenses": 2300,
            "Tax_Expenses": 78000,
            "Extraordinary_Expenses": 230,
            "COGS": { "Total_COGS": 54000 },
            "Operating_Expenses": { "Advertising_Marketing": 23000, "Office_Supplies": 50 }
        }"#,
    )?;
    let statement = StatementNormalizer::default().build_income_statement(&input)?;

    assert_eq!(statement.gross_profit(), 94_300.0);
    assert_eq!(statement.ebit(), 94_300.0 - 23_050.0);
    assert_eq!(statement.ebt(), statement.ebit() - 2_300.0);
    assert_eq!(statement.net_income(), statement.ebt() - 78_000.0 + 230.0);
    assert_eq!(statement.get("operating_expenses.total_sg_and_a"), Some(23_050.0));
    Ok(())
}

#[test]
fn test_zero_revenue_margins() -> anyhow::Result<()> {
    let input = FieldInput::from_json(&json!({
        "revenue": 0,
        "tax_expenses": 500,
        "operating_expenses": { "office_supplies": 100 }
    }))?;
    let statement = StatementNormalizer::default().build_income_statement(&input)?;
    assert_eq!(statement.operating_margin(), 0.0);
    assert_eq!(statement.net_margin(), 0.0);
    assert_eq!(statement.net_income(), -600.0);
    Ok(())
}

#[test]
fn test_null_required_field_is_missing() {
    let input = FieldInput::from_json(&json!({ "revenue": null, "tax_expenses": 1 })).unwrap();
    let result = StatementNormalizer::default().build_income_statement(&input);
    assert!(matches!(
        result,
        Err(FinancialStatementError::MissingRequiredField { .. })
    ));
}

#[tokio::test]
async fn test_normalize_income_end_to_end() -> anyhow::Result<()> {
    let matcher = TableMatcher::income();
    let normalized = StatementNormalizer::default()
        .normalize(StatementKind::Income, &income_items(), &matcher)
        .await?;

    let statement = normalized.statement.as_income().expect("income statement");
    assert_eq!(statement.revenue(), 148_300.0);
    assert_eq!(statement.gross_profit(), 94_300.0);
    assert_eq!(statement.operating_expenses().total(), 23_050.0);
    assert_eq!(
        statement.get("operating_expenses.office_supplies"),
        Some(50.0)
    );
    assert_eq!(statement.net_income(), 94_300.0 - 23_050.0 - 2_300.0 - 78_000.0 + 230.0);

    let report = &normalized.classification;
    assert_eq!(report.mapping["mystery item"], None);
    assert_eq!(report.mapping["weird thing"], None);
    assert_eq!(report.types["weird thing"], None);
    assert_eq!(
        report.unclassified,
        vec!["mystery item".to_string(), "weird thing".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_one_call_per_category() -> anyhow::Result<()> {
    let matcher = TableMatcher::income();
    CategoryClassifier::new(&matcher)
        .classify_statement(
            &[
                UnknownItem::new("sales"),
                UnknownItem::new("advertising"),
                UnknownItem::new("interest"),
            ],
            StatementKind::Income,
        )
        .await?;

    assert_eq!(matcher.type_calls.load(Ordering::SeqCst), 1);
    let mut calls = matcher.name_calls.lock().unwrap().clone();
    calls.sort();
    assert_eq!(
        calls,
        vec![
            vec!["advertising".to_string(), "interest".to_string()],
            vec!["sales".to_string()],
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_classification_is_idempotent() -> anyhow::Result<()> {
    let matcher = TableMatcher::income();
    let classifier = CategoryClassifier::new(&matcher);
    let items: Vec<UnknownItem> = income_items()
        .keys()
        .map(|name| UnknownItem::new(name.clone()))
        .collect();

    let first = classifier.classify_statement(&items, StatementKind::Income).await?;
    let second = classifier.classify_statement(&items, StatementKind::Income).await?;
    assert_eq!(first, second);

    let catalog = FieldCatalog::for_statement(StatementKind::Income);
    let known = catalog.known_items(FinCategory::Expense);
    let unknown = vec![UnknownItem::new("stationery"), UnknownItem::new("mystery item")];
    let a = classifier.classify(&unknown, &known, FinCategory::Expense).await?;
    let b = classifier.classify(&unknown, &known, FinCategory::Expense).await?;
    assert_eq!(a, b);
    Ok(())
}

#[tokio::test]
async fn test_unclassified_item_round_trips_as_null() -> anyhow::Result<()> {
    let matcher = TableMatcher::income();
    let normalized = StatementNormalizer::default()
        .normalize(StatementKind::Income, &income_items(), &matcher)
        .await?;

    let value = serde_json::to_value(&normalized)?;
    assert!(value["classification"]["mapping"]["mystery item"].is_null());
    assert_eq!(
        value["classification"]["mapping"]["sales"],
        json!("revenue")
    );
    assert_eq!(value["statement"]["revenue"], json!(148_300.0));
    Ok(())
}

#[tokio::test]
async fn test_normalize_years_from_cleaned_artifact() -> anyhow::Result<()> {
    let root = std::env::temp_dir().join(format!("normalizer-it-{}", std::process::id()));
    let store = ArtifactStore::new(&root);
    let key = ArtifactKey::new(StatementKind::Balance, ArtifactStage::Cleaned, "acme");

    store.save(
        &key,
        &json!([
            { "2023": { "Cash": 50000, "Building": 150000, "Payables": 30000, "Bank Loan": 100000, "Share Capital": 70000 } },
            { "2022": { "Cash": 40000, "Building": 150000, "Payables": 30000, "Bank Loan": 100000, "Share Capital": 50000 } }
        ]),
    )?;
    let years = store.load_yearly_items(&key)?;

    let matcher = TableMatcher::balance();
    let normalizer = StatementNormalizer::new(NormalizerConfig::warn_only())?;
    let normalized = normalizer
        .normalize_years(StatementKind::Balance, &years, &matcher)
        .await?;

    assert_eq!(matcher.type_calls.load(Ordering::SeqCst), 1);
    assert_eq!(matcher.name_calls.lock().unwrap().len(), 3);

    let current = normalized["2023"].statement.as_balance().expect("balance");
    assert_eq!(current.total_assets(), 200_000.0);
    assert!(current.is_balanced());

    let previous = normalized["2022"].statement.as_balance().expect("balance");
    assert_eq!(previous.total_assets(), 190_000.0);
    assert_eq!(previous.total_liabilities_and_equity(), 180_000.0);
    assert!(!previous.is_balanced());

    let strict = StatementNormalizer::default()
        .normalize_years(StatementKind::Balance, &years, &matcher)
        .await;
    assert!(matches!(
        strict,
        Err(FinancialStatementError::InvariantViolation { .. })
    ));

    let _ = std::fs::remove_dir_all(&root);
    Ok(())
}

#[test]
fn test_registry_and_catalog() {
    let income = describe(EntityKind::IncomeStatement);
    assert_eq!(income["revenue"].category, FinCategory::Earning);
    assert_eq!(income["operating_margin"].category, FinCategory::Ratio);
    assert_eq!(
        category_of(EntityKind::Equity, "treasury_stock"),
        Some(FinCategory::Equity)
    );

    let catalog = FieldCatalog::for_statement(StatementKind::Balance);
    assert!(catalog.contains("equity.total_equity"));
    assert!(catalog.contains("total_equity"));
    assert!(catalog.to_json().is_ok());
}

#[test]
fn test_schema_generation() {
    let page = PageContent::schema_as_json().expect("page schema");
    assert!(page.contains("summary"));

    let coarse = CoarseTypeResponse::schema_as_json().expect("coarse schema");
    assert!(coarse.contains("earning"));

    assert!(NameMappingResponse::schema_as_json().is_ok());
}
