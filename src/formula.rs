//! Derivation rules for every entity type, declared as data.
//!
//! A rule computes one target field from operands that are either sibling
//! fields of the same entity or fields of a nested component. Together the
//! rules of an entity form its dependency graph; [`crate::derivation`] orders
//! and evaluates them.

use crate::schema::EntityKind;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum Operand {
    Field(&'static str),
    Component {
        component: &'static str,
        field: &'static str,
    },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Field(name) => f.write_str(name),
            Operand::Component { component, field } => write!(f, "{}.{}", component, field),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formula {
    /// `Σ add − Σ subtract`
    Sum {
        add: &'static [Operand],
        subtract: &'static [Operand],
    },
    /// `numerator / denominator`, defined as 0 when the denominator is 0.
    Ratio {
        numerator: Operand,
        denominator: Operand,
    },
}

impl Formula {
    pub fn operands(&self) -> Vec<Operand> {
        match self {
            Formula::Sum { add, subtract } => add.iter().chain(subtract.iter()).copied().collect(),
            Formula::Ratio {
                numerator,
                denominator,
            } => vec![*numerator, *denominator],
        }
    }

    /// Evaluates the formula, returning the first operand `lookup` cannot resolve.
    pub fn evaluate<F>(&self, lookup: F) -> std::result::Result<f64, Operand>
    where
        F: Fn(Operand) -> Option<f64>,
    {
        let resolve = |operand: &Operand| lookup(*operand).ok_or(*operand);

        match self {
            Formula::Sum { add, subtract } => {
                let mut total = 0.0;
                for operand in add.iter() {
                    total += resolve(operand)?;
                }
                for operand in subtract.iter() {
                    total -= resolve(operand)?;
                }
                Ok(total)
            }
            Formula::Ratio {
                numerator,
                denominator,
            } => {
                let numerator = resolve(numerator)?;
                let denominator = resolve(denominator)?;
                if denominator == 0.0 {
                    Ok(0.0)
                } else {
                    Ok(numerator / denominator)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivationRule {
    pub target: &'static str,
    pub formula: Formula,
}

use Operand::{Component, Field};

const CURRENT_ASSETS_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_current_assets",
    formula: Formula::Sum {
        add: &[
            Field("cash_and_cash_equivalents"),
            Field("accounts_receivable"),
            Field("inventory"),
            Field("prepaid_expenses"),
            Field("short_term_investments"),
        ],
        subtract: &[],
    },
}];

const LONG_TERM_ASSETS_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_long_term_assets",
    formula: Formula::Sum {
        add: &[
            Field("property_plant_equipment"),
            Field("intangible_assets"),
            Field("long_term_investments"),
            Field("deferred_tax_assets"),
            Field("other_non_current_assets"),
        ],
        subtract: &[],
    },
}];

const CURRENT_LIABILITIES_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_current_liabilities",
    formula: Formula::Sum {
        add: &[
            Field("accounts_payable"),
            Field("short_term_loans"),
            Field("accrued_expenses"),
            Field("deferred_revenue"),
            Field("current_portion_of_long_term_debt"),
        ],
        subtract: &[],
    },
}];

const LONG_TERM_LIABILITIES_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_long_term_liabilities",
    formula: Formula::Sum {
        add: &[
            Field("long_term_debt"),
            Field("deferred_tax_liabilities"),
            Field("pension_liabilities"),
            Field("lease_liabilities"),
            Field("other_non_current_liabilities"),
        ],
        subtract: &[],
    },
}];

const EQUITY_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_equity",
    formula: Formula::Sum {
        add: &[
            Field("common_stock"),
            Field("retained_earnings"),
            Field("additional_paid_in_capital"),
        ],
        subtract: &[Field("treasury_stock")],
    },
}];

const COGS_RULES: &[DerivationRule] = &[DerivationRule {
    target: "total_cogs",
    formula: Formula::Sum {
        add: &[
            Field("raw_materials_cost"),
            Field("labor_cost"),
            Field("manufacturing_overhead"),
            Field("freight_and_shipping"),
            Field("inventory_changes"),
        ],
        subtract: &[],
    },
}];

// total_operating_expenses is listed first; evaluation order comes from the graph.
const OPERATING_EXPENSES_RULES: &[DerivationRule] = &[
    DerivationRule {
        target: "total_operating_expenses",
        formula: Formula::Sum {
            add: &[
                Field("total_sg_and_a"),
                Field("total_r_and_d"),
                Field("total_other_operating"),
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_sg_and_a",
        formula: Formula::Sum {
            add: &[
                Field("sales_salaries"),
                Field("advertising_marketing"),
                Field("sales_commissions"),
                Field("sales_travel"),
                Field("executive_salaries"),
                Field("office_rent_utilities"),
                Field("accounting_fees"),
                Field("insurance"),
                Field("depreciation"),
                Field("amortization"),
                Field("bad_debt"),
                Field("consumables"),
                Field("office_supplies"),
                Field("professional_fees"),
                Field("permits_licenses_subscriptions"),
                Field("freight_cartage_postage"),
                Field("hiring_fees"),
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_r_and_d",
        formula: Formula::Sum {
            add: &[
                Field("r_and_d_salaries"),
                Field("r_and_d_materials"),
                Field("r_and_d_testing"),
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_other_operating",
        formula: Formula::Sum {
            add: &[
                Field("maintenance_repairs"),
                Field("employee_benefits"),
                Field("training_development"),
                Field("travel_meals"),
                Field("impairment_costs"),
                Field("donations"),
            ],
            subtract: &[],
        },
    },
];

const INCOME_STATEMENT_RULES: &[DerivationRule] = &[
    DerivationRule {
        target: "gross_profit",
        formula: Formula::Sum {
            add: &[Field("revenue"), Field("other_revenue")],
            subtract: &[Component {
                component: "cogs",
                field: "total_cogs",
            }],
        },
    },
    DerivationRule {
        target: "ebit",
        formula: Formula::Sum {
            add: &[Field("gross_profit")],
            subtract: &[Component {
                component: "operating_expenses",
                field: "total_operating_expenses",
            }],
        },
    },
    DerivationRule {
        target: "ebitda",
        formula: Formula::Sum {
            add: &[
                Field("ebit"),
                Component {
                    component: "operating_expenses",
                    field: "depreciation",
                },
                Component {
                    component: "operating_expenses",
                    field: "amortization",
                },
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "ebt",
        formula: Formula::Sum {
            add: &[Field("ebit")],
            subtract: &[Field("interest_expenses")],
        },
    },
    DerivationRule {
        target: "net_income",
        formula: Formula::Sum {
            add: &[Field("ebt"), Field("extraordinary_expenses")],
            subtract: &[Field("tax_expenses")],
        },
    },
    DerivationRule {
        target: "total_expenses",
        formula: Formula::Sum {
            add: &[
                Component {
                    component: "cogs",
                    field: "total_cogs",
                },
                Component {
                    component: "operating_expenses",
                    field: "total_operating_expenses",
                },
                Field("interest_expenses"),
                Field("tax_expenses"),
                Field("extraordinary_expenses"),
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "operating_margin",
        formula: Formula::Ratio {
            numerator: Field("ebit"),
            denominator: Field("revenue"),
        },
    },
    DerivationRule {
        target: "net_margin",
        formula: Formula::Ratio {
            numerator: Field("net_income"),
            denominator: Field("revenue"),
        },
    },
];

const BALANCE_STATEMENT_RULES: &[DerivationRule] = &[
    DerivationRule {
        target: "total_assets",
        formula: Formula::Sum {
            add: &[
                Component {
                    component: "current_assets",
                    field: "total_current_assets",
                },
                Component {
                    component: "long_term_assets",
                    field: "total_long_term_assets",
                },
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_liabilities",
        formula: Formula::Sum {
            add: &[
                Component {
                    component: "current_liabilities",
                    field: "total_current_liabilities",
                },
                Component {
                    component: "long_term_liabilities",
                    field: "total_long_term_liabilities",
                },
            ],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_equity",
        formula: Formula::Sum {
            add: &[Component {
                component: "equity",
                field: "total_equity",
            }],
            subtract: &[],
        },
    },
    DerivationRule {
        target: "total_liabilities_and_equity",
        formula: Formula::Sum {
            add: &[Field("total_liabilities"), Field("total_equity")],
            subtract: &[],
        },
    },
];

pub fn rules_for(kind: EntityKind) -> &'static [DerivationRule] {
    match kind {
        EntityKind::CurrentAssets => CURRENT_ASSETS_RULES,
        EntityKind::LongTermAssets => LONG_TERM_ASSETS_RULES,
        EntityKind::CurrentLiabilities => CURRENT_LIABILITIES_RULES,
        EntityKind::LongTermLiabilities => LONG_TERM_LIABILITIES_RULES,
        EntityKind::Equity => EQUITY_RULES,
        EntityKind::Cogs => COGS_RULES,
        EntityKind::OperatingExpenses => OPERATING_EXPENSES_RULES,
        EntityKind::IncomeStatement => INCOME_STATEMENT_RULES,
        EntityKind::BalanceStatement => BALANCE_STATEMENT_RULES,
    }
}
