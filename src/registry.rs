//! Static field metadata for every entity type.
//!
//! Each entity is described by a [`EntityLayout`]: its fields (with description,
//! category and whether the field is a raw input or a derived value), the nested
//! components it reads from, and the name of its aggregate total. The tables are
//! compile-time constants; [`describe`] exposes them as a read-only mapping.

use crate::formula::{rules_for, DerivationRule};
use crate::schema::{EntityKind, FieldDescriptor, FinCategory};
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRole {
    /// Supplied by the caller. `default: None` marks a required field.
    Input { default: Option<f64> },
    /// Computed from other fields unless supplied.
    Derived,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub descriptor: FieldDescriptor,
    pub role: FieldRole,
}

/// A nested entity slot of a composite statement, e.g. `cogs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSlot {
    pub name: &'static str,
    pub kind: EntityKind,
}

#[derive(Debug, Clone, Copy)]
pub struct EntityLayout {
    pub kind: EntityKind,
    pub fields: &'static [FieldDef],
    pub components: &'static [ComponentSlot],
    /// The field representing the entity's aggregate total.
    pub total: &'static str,
}

impl EntityLayout {
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.descriptor.name == name)
    }

    pub fn component(&self, name: &str) -> Option<&'static ComponentSlot> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = &'static FieldDef> {
        self.fields
            .iter()
            .filter(|f| matches!(f.role, FieldRole::Input { .. }))
    }

    pub fn rules(&self) -> &'static [DerivationRule] {
        rules_for(self.kind)
    }
}

const fn leaf(
    name: &'static str,
    description: &'static str,
    category: FinCategory,
) -> FieldDef {
    FieldDef {
        descriptor: FieldDescriptor {
            name,
            description,
            category,
        },
        role: FieldRole::Input { default: Some(0.0) },
    }
}

const fn required(
    name: &'static str,
    description: &'static str,
    category: FinCategory,
) -> FieldDef {
    FieldDef {
        descriptor: FieldDescriptor {
            name,
            description,
            category,
        },
        role: FieldRole::Input { default: None },
    }
}

const fn derived(
    name: &'static str,
    description: &'static str,
    category: FinCategory,
) -> FieldDef {
    FieldDef {
        descriptor: FieldDescriptor {
            name,
            description,
            category,
        },
        role: FieldRole::Derived,
    }
}

use FinCategory::{Asset, Earning, Equity, Expense, Liability, Ratio};

#[rustfmt::skip]
const CURRENT_ASSETS_FIELDS: &[FieldDef] = &[
    leaf("cash_and_cash_equivalents", "Asset: Cash on hand and highly liquid instruments convertible to cash within three months.", Asset),
    leaf("accounts_receivable", "Asset: Amounts customers owe for goods or services already delivered.", Asset),
    leaf("inventory", "Asset: Raw materials, work in progress and finished goods held for sale.", Asset),
    leaf("prepaid_expenses", "Asset: Payments made in advance for goods or services to be received, such as insurance or rent.", Asset),
    leaf("short_term_investments", "Asset: Marketable securities expected to be sold or to mature within one year.", Asset),
    derived("total_current_assets", "Asset: Sum of all assets expected to be converted to cash within one year.", Asset),
];

#[rustfmt::skip]
const LONG_TERM_ASSETS_FIELDS: &[FieldDef] = &[
    leaf("property_plant_equipment", "Asset: Land, buildings, machinery and equipment used in operations, net of depreciation.", Asset),
    leaf("intangible_assets", "Asset: Non-physical assets such as patents, trademarks, goodwill and software.", Asset),
    leaf("long_term_investments", "Asset: Investments held for more than one year, such as bonds or equity stakes.", Asset),
    leaf("deferred_tax_assets", "Asset: Tax benefits recoverable in future periods from deductible temporary differences.", Asset),
    leaf("other_non_current_assets", "Asset: Any other asset not expected to be realised within one year.", Asset),
    derived("total_long_term_assets", "Asset: Sum of all assets held for more than one year.", Asset),
];

#[rustfmt::skip]
const CURRENT_LIABILITIES_FIELDS: &[FieldDef] = &[
    leaf("accounts_payable", "Liability: Amounts owed to suppliers for goods or services received.", Liability),
    leaf("short_term_loans", "Liability: Borrowings due for repayment within one year.", Liability),
    leaf("accrued_expenses", "Liability: Expenses incurred but not yet paid, such as wages or utilities.", Liability),
    leaf("deferred_revenue", "Liability: Payments received for goods or services not yet delivered.", Liability),
    leaf("current_portion_of_long_term_debt", "Liability: The part of long-term debt due within the next twelve months.", Liability),
    derived("total_current_liabilities", "Liability: Sum of all obligations due within one year.", Liability),
];

#[rustfmt::skip]
const LONG_TERM_LIABILITIES_FIELDS: &[FieldDef] = &[
    leaf("long_term_debt", "Liability: Loans and bonds payable after more than one year.", Liability),
    leaf("deferred_tax_liabilities", "Liability: Taxes owed in future periods from taxable temporary differences.", Liability),
    leaf("pension_liabilities", "Liability: Obligations for employee retirement benefits.", Liability),
    leaf("lease_liabilities", "Liability: Present value of lease payments due after one year.", Liability),
    leaf("other_non_current_liabilities", "Liability: Any other obligation not due within one year.", Liability),
    derived("total_long_term_liabilities", "Liability: Sum of all obligations due after more than one year.", Liability),
];

#[rustfmt::skip]
const EQUITY_FIELDS: &[FieldDef] = &[
    leaf("common_stock", "Equity: Par value of shares issued to shareholders.", Equity),
    leaf("retained_earnings", "Equity: Accumulated profits kept in the business rather than distributed.", Equity),
    leaf("additional_paid_in_capital", "Equity: Amounts shareholders paid above the par value of their shares.", Equity),
    leaf("treasury_stock", "Equity: Cost of shares the company bought back; reduces total equity.", Equity),
    derived("total_equity", "Equity: Shareholders' residual interest, common stock plus retained earnings plus paid-in capital less treasury stock.", Equity),
];

#[rustfmt::skip]
const COGS_FIELDS: &[FieldDef] = &[
    leaf("raw_materials_cost", "Expense: Cost of raw materials directly used in production; part of the Cost of Goods Sold.", Expense),
    leaf("labor_cost", "Expense: Wages and benefits of production staff; part of the Cost of Goods Sold.", Expense),
    leaf("manufacturing_overhead", "Expense: Indirect production costs such as factory utilities and equipment maintenance; part of the Cost of Goods Sold.", Expense),
    leaf("freight_and_shipping", "Expense: Cost of moving goods to customers or between facilities; part of the Cost of Goods Sold.", Expense),
    leaf("inventory_changes", "Expense: Adjustment for the change in inventory value over the period; part of the Cost of Goods Sold.", Expense),
    derived("total_cogs", "Expense: Total Cost of Goods Sold, combining materials, labor, overhead and freight.", Expense),
];

#[rustfmt::skip]
const OPERATING_EXPENSES_FIELDS: &[FieldDef] = &[
    leaf("sales_salaries", "Expense: Salaries of sales staff; part of SG&A.", Expense),
    leaf("advertising_marketing", "Expense: Advertising, promotion and marketing campaigns; part of SG&A.", Expense),
    leaf("sales_commissions", "Expense: Commissions paid on sales; part of SG&A.", Expense),
    leaf("sales_travel", "Expense: Travel costs of sales staff; part of SG&A.", Expense),
    leaf("executive_salaries", "Expense: Salaries of executives and management; part of SG&A.", Expense),
    leaf("office_rent_utilities", "Expense: Office rent, power, water and similar utilities; part of SG&A.", Expense),
    leaf("accounting_fees", "Expense: Bookkeeping, audit and accounting services; part of SG&A.", Expense),
    leaf("insurance", "Expense: Business insurance premiums; part of SG&A.", Expense),
    leaf("depreciation", "Expense: Allocation of the cost of tangible assets over their useful life; part of SG&A.", Expense),
    leaf("amortization", "Expense: Allocation of the cost of intangible assets over their useful life; part of SG&A.", Expense),
    leaf("bad_debt", "Expense: Receivables written off as uncollectable; part of SG&A.", Expense),
    leaf("consumables", "Expense: Consumable supplies used in day-to-day operations; part of SG&A.", Expense),
    leaf("office_supplies", "Expense: Stationery and other office supplies; part of SG&A.", Expense),
    leaf("professional_fees", "Expense: Legal, consulting and other professional services; part of SG&A.", Expense),
    leaf("permits_licenses_subscriptions", "Expense: Permits, licenses, software and membership subscriptions; part of SG&A.", Expense),
    leaf("freight_cartage_postage", "Expense: Courier, cartage and postage not attributable to production; part of SG&A.", Expense),
    leaf("hiring_fees", "Expense: Recruitment agency and hiring costs; part of SG&A.", Expense),
    derived("total_sg_and_a", "Expense: Total selling, general and administrative expenses.", Expense),
    leaf("r_and_d_salaries", "Expense: Salaries of research and development staff; part of R&D.", Expense),
    leaf("r_and_d_materials", "Expense: Materials consumed by research and development; part of R&D.", Expense),
    leaf("r_and_d_testing", "Expense: Testing and prototyping costs of research and development; part of R&D.", Expense),
    derived("total_r_and_d", "Expense: Total research and development expenses.", Expense),
    leaf("maintenance_repairs", "Expense: Maintenance and repairs of premises and equipment; other operating expense.", Expense),
    leaf("employee_benefits", "Expense: Employee benefits not charged to production; other operating expense.", Expense),
    leaf("training_development", "Expense: Staff training and development; other operating expense.", Expense),
    leaf("travel_meals", "Expense: Non-sales travel, meals and entertainment; other operating expense.", Expense),
    leaf("impairment_costs", "Expense: Write-downs of assets whose carrying value exceeds recoverable value; other operating expense.", Expense),
    leaf("donations", "Expense: Charitable donations and sponsorships; other operating expense.", Expense),
    derived("total_other_operating", "Expense: Total of other operating expenses not in SG&A or R&D.", Expense),
    derived("total_operating_expenses", "Expense: Total operating expenses, SG&A plus R&D plus other operating expenses.", Expense),
];

#[rustfmt::skip]
const INCOME_STATEMENT_FIELDS: &[FieldDef] = &[
    required("revenue", "Earning: Income from the sale of goods or services in the ordinary course of business.", Earning),
    leaf("other_revenue", "Earning: Income from activities outside the main business, such as interest or investment gains.", Earning),
    leaf("interest_expenses", "Expense: Interest paid on borrowings.", Expense),
    required("tax_expenses", "Expense: Income tax charged for the period.", Expense),
    leaf("extraordinary_expenses", "Expense: Unusual and infrequent items reported separately from operations.", Expense),
    derived("gross_profit", "Earning: Revenue plus other revenue less the Cost of Goods Sold.", Earning),
    derived("ebit", "Earning: Earnings before interest and taxes, gross profit less operating expenses.", Earning),
    derived("ebitda", "Earning: Earnings before interest, taxes, depreciation and amortization.", Earning),
    derived("ebt", "Earning: Earnings before taxes, EBIT less interest expenses.", Earning),
    derived("net_income", "Earning: Profit for the period after tax and extraordinary items.", Earning),
    derived("total_expenses", "Expense: Sum of cost of goods sold, operating, interest, tax and extraordinary expenses.", Expense),
    derived("operating_margin", "Ratio: EBIT as a fraction of revenue.", Ratio),
    derived("net_margin", "Ratio: Net income as a fraction of revenue.", Ratio),
];

#[rustfmt::skip]
const BALANCE_STATEMENT_FIELDS: &[FieldDef] = &[
    derived("total_assets", "Asset: Current plus long-term assets.", Asset),
    derived("total_liabilities", "Liability: Current plus long-term liabilities.", Liability),
    derived("total_equity", "Equity: Total shareholders' equity carried over from the equity section.", Equity),
    derived("total_liabilities_and_equity", "Equity: Total liabilities plus total equity; must equal total assets.", Equity),
];

const INCOME_STATEMENT_COMPONENTS: &[ComponentSlot] = &[
    ComponentSlot {
        name: "cogs",
        kind: EntityKind::Cogs,
    },
    ComponentSlot {
        name: "operating_expenses",
        kind: EntityKind::OperatingExpenses,
    },
];

const BALANCE_STATEMENT_COMPONENTS: &[ComponentSlot] = &[
    ComponentSlot {
        name: "current_assets",
        kind: EntityKind::CurrentAssets,
    },
    ComponentSlot {
        name: "long_term_assets",
        kind: EntityKind::LongTermAssets,
    },
    ComponentSlot {
        name: "current_liabilities",
        kind: EntityKind::CurrentLiabilities,
    },
    ComponentSlot {
        name: "long_term_liabilities",
        kind: EntityKind::LongTermLiabilities,
    },
    ComponentSlot {
        name: "equity",
        kind: EntityKind::Equity,
    },
];

pub fn layout(kind: EntityKind) -> &'static EntityLayout {
    const CURRENT_ASSETS: EntityLayout = EntityLayout {
        kind: EntityKind::CurrentAssets,
        fields: CURRENT_ASSETS_FIELDS,
        components: &[],
        total: "total_current_assets",
    };
    const LONG_TERM_ASSETS: EntityLayout = EntityLayout {
        kind: EntityKind::LongTermAssets,
        fields: LONG_TERM_ASSETS_FIELDS,
        components: &[],
        total: "total_long_term_assets",
    };
    const CURRENT_LIABILITIES: EntityLayout = EntityLayout {
        kind: EntityKind::CurrentLiabilities,
        fields: CURRENT_LIABILITIES_FIELDS,
        components: &[],
        total: "total_current_liabilities",
    };
    const LONG_TERM_LIABILITIES: EntityLayout = EntityLayout {
        kind: EntityKind::LongTermLiabilities,
        fields: LONG_TERM_LIABILITIES_FIELDS,
        components: &[],
        total: "total_long_term_liabilities",
    };
    const EQUITY: EntityLayout = EntityLayout {
        kind: EntityKind::Equity,
        fields: EQUITY_FIELDS,
        components: &[],
        total: "total_equity",
    };
    const COGS: EntityLayout = EntityLayout {
        kind: EntityKind::Cogs,
        fields: COGS_FIELDS,
        components: &[],
        total: "total_cogs",
    };
    const OPERATING_EXPENSES: EntityLayout = EntityLayout {
        kind: EntityKind::OperatingExpenses,
        fields: OPERATING_EXPENSES_FIELDS,
        components: &[],
        total: "total_operating_expenses",
    };
    const INCOME_STATEMENT: EntityLayout = EntityLayout {
        kind: EntityKind::IncomeStatement,
        fields: INCOME_STATEMENT_FIELDS,
        components: INCOME_STATEMENT_COMPONENTS,
        total: "net_income",
    };
    const BALANCE_STATEMENT: EntityLayout = EntityLayout {
        kind: EntityKind::BalanceStatement,
        fields: BALANCE_STATEMENT_FIELDS,
        components: BALANCE_STATEMENT_COMPONENTS,
        total: "total_assets",
    };

    match kind {
        EntityKind::CurrentAssets => &CURRENT_ASSETS,
        EntityKind::LongTermAssets => &LONG_TERM_ASSETS,
        EntityKind::CurrentLiabilities => &CURRENT_LIABILITIES,
        EntityKind::LongTermLiabilities => &LONG_TERM_LIABILITIES,
        EntityKind::Equity => &EQUITY,
        EntityKind::Cogs => &COGS,
        EntityKind::OperatingExpenses => &OPERATING_EXPENSES,
        EntityKind::IncomeStatement => &INCOME_STATEMENT,
        EntityKind::BalanceStatement => &BALANCE_STATEMENT,
    }
}

type Registry = BTreeMap<EntityKind, BTreeMap<&'static str, FieldDescriptor>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Field name to descriptor for one entity type.
pub fn describe(kind: EntityKind) -> &'static BTreeMap<&'static str, FieldDescriptor> {
    let registry = REGISTRY.get_or_init(|| {
        EntityKind::ALL
            .iter()
            .map(|&k| {
                let fields = layout(k)
                    .fields
                    .iter()
                    .map(|f| (f.descriptor.name, f.descriptor))
                    .collect();
                (k, fields)
            })
            .collect()
    });

    // Every kind is inserted at initialisation.
    &registry[&kind]
}

pub fn category_of(kind: EntityKind, field: &str) -> Option<FinCategory> {
    describe(kind).get(field).map(|d| d.category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_every_entity_has_its_total_field() {
        for kind in EntityKind::ALL {
            let layout = layout(kind);
            let total = layout.field(layout.total);
            assert!(total.is_some(), "{} missing total {}", kind, layout.total);
            assert_eq!(total.unwrap().role, FieldRole::Derived);
        }
    }

    #[test]
    fn test_field_names_unique_per_entity() {
        for kind in EntityKind::ALL {
            let mut seen = HashSet::new();
            for field in layout(kind).fields {
                assert!(
                    seen.insert(field.descriptor.name),
                    "duplicate field {} in {}",
                    field.descriptor.name,
                    kind
                );
            }
        }
    }

    #[test]
    fn test_describe_matches_layout() {
        let described = describe(EntityKind::Equity);
        assert_eq!(described.len(), 5);
        assert_eq!(
            described["treasury_stock"].category,
            FinCategory::Equity
        );
        assert_eq!(
            category_of(EntityKind::IncomeStatement, "net_margin"),
            Some(FinCategory::Ratio)
        );
        assert_eq!(category_of(EntityKind::IncomeStatement, "cash"), None);
    }

    #[test]
    fn test_required_income_fields_have_no_default() {
        let layout = layout(EntityKind::IncomeStatement);
        let required: Vec<&str> = layout
            .inputs()
            .filter(|f| f.role == FieldRole::Input { default: None })
            .map(|f| f.descriptor.name)
            .collect();
        assert_eq!(required, vec!["revenue", "tax_expenses"]);
    }

    #[test]
    fn test_descriptions_are_prefixed_with_category() {
        for kind in EntityKind::ALL {
            for field in layout(kind).fields {
                let prefix = field.descriptor.category.as_str();
                assert!(
                    field
                        .descriptor
                        .description
                        .to_lowercase()
                        .starts_with(prefix),
                    "{}.{} description does not start with '{}'",
                    kind,
                    field.descriptor.name,
                    prefix
                );
            }
        }
    }
}
