//! Financial statement line items.
//!
//! Each statement is declared once through [`line_item_statement!`], which
//! produces the struct, its serde names and the [`LineItems`] descriptor.
//! The warehouse derives column names and DDL from the same descriptor, so
//! the in-memory names and the persisted names cannot drift apart.
//!
//! Absent line items deserialize to `0.0`. Names used by older stores are
//! accepted as aliases.

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical, ordered description of a statement's numeric line items.
pub trait LineItems: Copy + Default + PartialEq {
    /// Human-readable statement name, used in error messages.
    const STATEMENT: &'static str;
    /// Canonical field names in declaration order.
    const FIELDS: &'static [&'static str];

    /// Values in [`Self::FIELDS`] order.
    fn values(&self) -> Vec<f64>;

    /// Rebuild a statement from values in [`Self::FIELDS`] order.
    fn from_values(values: &[f64]) -> Result<Self, ValidationError>;

    /// Look up one line item by its canonical name.
    fn get(&self, field: &str) -> Option<f64> {
        let index = Self::FIELDS.iter().position(|name| *name == field)?;
        self.values().get(index).copied()
    }

    fn is_all_zero(&self) -> bool {
        self.values().iter().all(|value| *value == 0.0)
    }
}

macro_rules! line_item_statement {
    (
        $(#[$meta:meta])*
        $name:ident as $label:literal {
            $( $(#[alias = $alias:literal])? $field:ident ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
        #[serde(default)]
        pub struct $name {
            $(
                $(#[serde(alias = $alias)])?
                pub $field: f64,
            )+
        }

        impl LineItems for $name {
            const STATEMENT: &'static str = $label;
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn values(&self) -> Vec<f64> {
                vec![$(self.$field),+]
            }

            fn from_values(values: &[f64]) -> Result<Self, ValidationError> {
                if values.len() != Self::FIELDS.len() {
                    return Err(ValidationError::LineItemCount {
                        statement: Self::STATEMENT,
                        expected: Self::FIELDS.len(),
                        actual: values.len(),
                    });
                }

                let mut items = values.iter().copied();
                Ok(Self {
                    $($field: items.next().unwrap_or_default()),+
                })
            }
        }
    };
}

line_item_statement! {
    /// Income statement for one reporting period.
    IncomeStatement as "income statement" {
        revenue,
        cost_of_revenue,
        gross_profit,
        operating_expense,
        #[alias = "selling_general_and_admin"]
        selling_general_and_administrative_expenses,
        depreciation_and_amortization,
        research_and_development,
        other_operating_expenses,
        operating_income_loss,
        interest_and_debt_expense,
        income_tax_expense_benefit,
        net_income_loss,
        basic_average_shares,
        diluted_average_shares,
        common_stock_dividends,
    }
}

line_item_statement! {
    /// Balance sheet as of the report date.
    BalanceSheet as "balance sheet" {
        assets,
        current_assets,
        cash,
        accounts_receivable,
        inventory,
        prepaid_expenses,
        other_current_assets,
        noncurrent_assets,
        long_term_investments,
        fixed_assets,
        intangible_assets,
        non_current_prepaid_expense,
        other_noncurrent_assets,
        liabilities,
        current_liabilities,
        accounts_payable,
        interest_payable,
        wages,
        other_current_liabilities,
        noncurrent_liabilities,
        long_term_debt,
        other_noncurrent_liabilities,
        commitments_and_contingencies,
        equity,
        #[alias = "equity_attributable_to_noncontrolling"]
        equity_attributable_to_noncontrolling_interest,
        equity_attributable_to_parent,
        liabilities_and_equity,
    }
}

line_item_statement! {
    /// Cash flow statement for one reporting period.
    CashFlowStatement as "cash flow statement" {
        #[alias = "net_cash_flow_from_operating"]
        net_cash_flow_from_operating_activities,
        #[alias = "net_cash_flow_from_investing"]
        net_cash_flow_from_investing_activities,
        #[alias = "net_cash_flow_from_financing"]
        net_cash_flow_from_financing_activities,
        net_cash_flow,
    }
}
