use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum FinCategory {
    #[schemars(description = "Resources owned by the company: cash, receivables, inventory, equipment (Balance Sheet)")]
    #[serde(alias = "assets")]
    Asset,

    #[schemars(description = "Obligations owed to creditors: payables, loans, accrued expenses (Balance Sheet)")]
    #[serde(alias = "liabilities")]
    Liability,

    #[schemars(description = "Owner's residual interest: share capital, retained earnings (Balance Sheet)")]
    Equity,

    #[schemars(description = "Money coming in or profit measures: revenue, other income, gross profit (Income Statement)")]
    #[serde(alias = "earnings")]
    Earning,

    #[schemars(description = "Money going out: cost of goods sold, operating expenses, interest, tax (Income Statement)")]
    #[serde(alias = "expenses")]
    Expense,

    #[schemars(description = "Dimensionless measure derived from other fields, e.g. a margin")]
    #[serde(alias = "ratios")]
    Ratio,
}

impl FinCategory {
    pub const ALL: [FinCategory; 6] = [
        FinCategory::Asset,
        FinCategory::Liability,
        FinCategory::Equity,
        FinCategory::Earning,
        FinCategory::Expense,
        FinCategory::Ratio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FinCategory::Asset => "asset",
            FinCategory::Liability => "liability",
            FinCategory::Equity => "equity",
            FinCategory::Earning => "earning",
            FinCategory::Expense => "expense",
            FinCategory::Ratio => "ratio",
        }
    }

    /// Parses the labels external services return, singular or plural, any case.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "asset" | "assets" => Some(FinCategory::Asset),
            "liability" | "liabilities" => Some(FinCategory::Liability),
            "equity" | "equities" => Some(FinCategory::Equity),
            "earning" | "earnings" => Some(FinCategory::Earning),
            "expense" | "expenses" => Some(FinCategory::Expense),
            "ratio" | "ratios" => Some(FinCategory::Ratio),
            _ => None,
        }
    }
}

impl fmt::Display for FinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every entity type that owns fields and derivation rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    CurrentAssets,
    LongTermAssets,
    CurrentLiabilities,
    LongTermLiabilities,
    Equity,
    Cogs,
    OperatingExpenses,
    IncomeStatement,
    BalanceStatement,
}

impl EntityKind {
    pub const ALL: [EntityKind; 9] = [
        EntityKind::CurrentAssets,
        EntityKind::LongTermAssets,
        EntityKind::CurrentLiabilities,
        EntityKind::LongTermLiabilities,
        EntityKind::Equity,
        EntityKind::Cogs,
        EntityKind::OperatingExpenses,
        EntityKind::IncomeStatement,
        EntityKind::BalanceStatement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::CurrentAssets => "CurrentAssets",
            EntityKind::LongTermAssets => "LongTermAssets",
            EntityKind::CurrentLiabilities => "CurrentLiabilities",
            EntityKind::LongTermLiabilities => "LongTermLiabilities",
            EntityKind::Equity => "Equity",
            EntityKind::Cogs => "COGS",
            EntityKind::OperatingExpenses => "OperatingExpenses",
            EntityKind::IncomeStatement => "IncomeStatement",
            EntityKind::BalanceStatement => "BalanceStatement",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Income,
    Balance,
}

impl StatementKind {
    pub fn entity(&self) -> EntityKind {
        match self {
            StatementKind::Income => EntityKind::IncomeStatement,
            StatementKind::Balance => EntityKind::BalanceStatement,
        }
    }

    /// Coarse categories a raw line item of this statement may be typed as.
    pub fn categories(&self) -> &'static [FinCategory] {
        match self {
            StatementKind::Income => &[FinCategory::Earning, FinCategory::Expense],
            StatementKind::Balance => &[
                FinCategory::Asset,
                FinCategory::Liability,
                FinCategory::Equity,
            ],
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            StatementKind::Income => "income",
            StatementKind::Balance => "balance",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Static metadata for one field of one entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub category: FinCategory,
}

/// A raw line item whose known field is not yet determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UnknownItem {
    #[schemars(description = "The line item label exactly as it appears in the source statement, lower-cased")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(description = "Optional context for the matcher, such as the signed amount")]
    pub hint: Option<String>,
}

impl UnknownItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// A candidate field the matcher may map unknown items onto.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KnownItem {
    #[schemars(description = "Qualified field path, e.g. 'cogs.total_cogs' or 'revenue'")]
    pub name: String,

    #[schemars(description = "What the field represents")]
    pub description: String,
}

/// Reply shape of the coarse typing phase: item name to category, or null.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CoarseTypeResponse(pub BTreeMap<String, Option<FinCategory>>);

/// Reply shape of the fine matching phase: unknown name to known name, or null.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct NameMappingResponse(pub BTreeMap<String, Option<String>>);

impl CoarseTypeResponse {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(CoarseTypeResponse)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}

impl NameMappingResponse {
    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(NameMappingResponse)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::generate_json_schema())
    }
}
