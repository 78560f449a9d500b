use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::Date;

use crate::{BalanceSheet, CashFlowStatement, IncomeStatement, LineItems, ValidationError};

/// Fiscal quarter covered by a fundamental snapshot.
///
/// Serialized as its label (`"Q2"`); read from a label, a digit string or
/// a bare integer (`2`), the form the store persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "FiscalPeriodRepr", into = "String")]
pub enum FiscalPeriod {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl FiscalPeriod {
    pub const ALL: [Self; 4] = [Self::Q1, Self::Q2, Self::Q3, Self::Q4];

    /// Quarter number, 1 through 4.
    pub const fn as_i32(self) -> i32 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
        }
    }
}

impl Display for FiscalPeriod {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i64> for FiscalPeriod {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Q1),
            2 => Ok(Self::Q2),
            3 => Ok(Self::Q3),
            4 => Ok(Self::Q4),
            other => Err(ValidationError::InvalidFiscalPeriod {
                value: other.to_string(),
            }),
        }
    }
}

impl TryFrom<i32> for FiscalPeriod {
    type Error = ValidationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<FiscalPeriod> for i32 {
    fn from(value: FiscalPeriod) -> Self {
        value.as_i32()
    }
}

impl FromStr for FiscalPeriod {
    type Err = ValidationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let digits = trimmed
            .strip_prefix('Q')
            .or_else(|| trimmed.strip_prefix('q'))
            .unwrap_or(trimmed);
        digits
            .parse::<i64>()
            .ok()
            .and_then(|quarter| Self::try_from(quarter).ok())
            .ok_or_else(|| ValidationError::InvalidFiscalPeriod {
                value: input.to_owned(),
            })
    }
}

impl TryFrom<String> for FiscalPeriod {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FiscalPeriodRepr {
    Number(i64),
    Label(String),
}

impl TryFrom<FiscalPeriodRepr> for FiscalPeriod {
    type Error = ValidationError;

    fn try_from(value: FiscalPeriodRepr) -> Result<Self, Self::Error> {
        match value {
            FiscalPeriodRepr::Number(quarter) => Self::try_from(quarter),
            FiscalPeriodRepr::Label(label) => label.parse(),
        }
    }
}

impl From<FiscalPeriod> for String {
    fn from(value: FiscalPeriod) -> Self {
        value.as_str().to_owned()
    }
}

/// All reported statement figures of one security for one fiscal period.
///
/// Every snapshot carries exactly one statement of each kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub report_date: Date,
    pub fiscal_period: FiscalPeriod,
    pub income_statement: IncomeStatement,
    pub balance_sheet: BalanceSheet,
    pub cash_flow_statement: CashFlowStatement,
}

impl FundamentalSnapshot {
    pub fn new(
        report_date: Date,
        fiscal_period: FiscalPeriod,
        income_statement: IncomeStatement,
        balance_sheet: BalanceSheet,
        cash_flow_statement: CashFlowStatement,
    ) -> Self {
        Self {
            report_date,
            fiscal_period,
            income_statement,
            balance_sheet,
            cash_flow_statement,
        }
    }

    /// Snapshot whose three statements are all zero.
    pub fn zeroed(report_date: Date, fiscal_period: FiscalPeriod) -> Self {
        Self::new(
            report_date,
            fiscal_period,
            IncomeStatement::default(),
            BalanceSheet::default(),
            CashFlowStatement::default(),
        )
    }

    pub fn builder(report_date: Date, fiscal_period: FiscalPeriod) -> SnapshotBuilder {
        SnapshotBuilder::new(report_date, fiscal_period)
    }
}

/// Assembles a snapshot from statements that may arrive separately.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    report_date: Date,
    fiscal_period: FiscalPeriod,
    income_statement: Option<IncomeStatement>,
    balance_sheet: Option<BalanceSheet>,
    cash_flow_statement: Option<CashFlowStatement>,
}

impl SnapshotBuilder {
    pub fn new(report_date: Date, fiscal_period: FiscalPeriod) -> Self {
        Self {
            report_date,
            fiscal_period,
            income_statement: None,
            balance_sheet: None,
            cash_flow_statement: None,
        }
    }

    pub fn income_statement(mut self, statement: IncomeStatement) -> Self {
        self.income_statement = Some(statement);
        self
    }

    pub fn balance_sheet(mut self, statement: BalanceSheet) -> Self {
        self.balance_sheet = Some(statement);
        self
    }

    pub fn cash_flow_statement(mut self, statement: CashFlowStatement) -> Self {
        self.cash_flow_statement = Some(statement);
        self
    }

    /// Fails on the first missing statement, checked in income, balance, cash flow order.
    pub fn build(self) -> Result<FundamentalSnapshot, ValidationError> {
        let income_statement = self.income_statement.ok_or(ValidationError::MissingStatement {
            statement: IncomeStatement::STATEMENT,
        })?;
        let balance_sheet = self.balance_sheet.ok_or(ValidationError::MissingStatement {
            statement: BalanceSheet::STATEMENT,
        })?;
        let cash_flow_statement =
            self.cash_flow_statement
                .ok_or(ValidationError::MissingStatement {
                    statement: CashFlowStatement::STATEMENT,
                })?;

        Ok(FundamentalSnapshot::new(
            self.report_date,
            self.fiscal_period,
            income_statement,
            balance_sheet,
            cash_flow_statement,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn converts_quarter_numbers_both_ways() {
        for period in FiscalPeriod::ALL {
            let number = i64::from(period.as_i32());
            assert_eq!(FiscalPeriod::try_from(number).expect("valid"), period);
        }
    }

    #[test]
    fn rejects_out_of_range_quarters() {
        for value in [0_i64, 5, -1, 12] {
            let err = FiscalPeriod::try_from(value).expect_err("must fail");
            assert!(matches!(err, ValidationError::InvalidFiscalPeriod { .. }));
        }
    }

    #[test]
    fn parses_labels_and_digits() {
        assert_eq!("Q3".parse::<FiscalPeriod>().expect("label"), FiscalPeriod::Q3);
        assert_eq!("q1".parse::<FiscalPeriod>().expect("label"), FiscalPeriod::Q1);
        assert_eq!("4".parse::<FiscalPeriod>().expect("digit"), FiscalPeriod::Q4);
        assert!("Q5".parse::<FiscalPeriod>().is_err());
        assert!("H1".parse::<FiscalPeriod>().is_err());
    }

    #[test]
    fn deserializes_integers_labels_and_digit_strings() {
        for input in ["2", "\"Q2\"", "\"2\""] {
            let period: FiscalPeriod = serde_json::from_str(input).expect("valid period");
            assert_eq!(period, FiscalPeriod::Q2);
        }
        assert_eq!(
            serde_json::to_string(&FiscalPeriod::Q2).expect("serialize"),
            "\"Q2\""
        );

        let err = serde_json::from_str::<FiscalPeriod>("7").expect_err("out of range");
        assert!(err.to_string().contains("invalid fiscal period '7'"));
    }

    #[test]
    fn builder_rejects_snapshot_with_only_income_statement() {
        let err = FundamentalSnapshot::builder(date!(2024 - 03 - 31), FiscalPeriod::Q1)
            .income_statement(IncomeStatement::default())
            .build()
            .expect_err("must fail");
        assert_eq!(
            err,
            ValidationError::MissingStatement {
                statement: "balance sheet"
            }
        );
    }

    #[test]
    fn builder_accepts_complete_snapshot() {
        let snapshot = FundamentalSnapshot::builder(date!(2024 - 06 - 30), FiscalPeriod::Q2)
            .cash_flow_statement(CashFlowStatement::default())
            .balance_sheet(BalanceSheet::default())
            .income_statement(IncomeStatement::default())
            .build()
            .expect("complete");
        assert_eq!(
            snapshot,
            FundamentalSnapshot::zeroed(date!(2024 - 06 - 30), FiscalPeriod::Q2)
        );
    }

    #[test]
    fn deserialization_requires_every_statement() {
        let json = r#"{
            "report_date": "2024-06-30",
            "fiscal_period": "Q2",
            "income_statement": {"revenue": 10.0}
        }"#;
        assert!(serde_json::from_str::<FundamentalSnapshot>(json).is_err());
    }
}
